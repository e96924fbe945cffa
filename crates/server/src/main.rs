use std::sync::Arc;

use chrono::Utc;
use clap::Parser;
use tokio::sync::Notify;
use tracing::info;

use attackwatch_core::config::{load_dotenv, Config};
use attackwatch_server::cli::{Cli, Command};
use attackwatch_server::state::AppState;
use attackwatch_server::{router, rule_runner, startup};

async fn serve(state: Arc<AppState>) -> anyhow::Result<()> {
    let shutdown = Arc::new(Notify::new());
    let rule_loop = rule_runner::spawn_rule_loop(&state, shutdown.clone());

    let app = router::build_router(state.clone());
    let addr = state.config.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);
    info!("API docs at http://{}/docs", addr);

    let runner = state.runner.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl_c");
            }
            info!("shutdown requested");
            runner.abort();
            shutdown.notify_one();
        })
        .await?;

    if let Some(handle) = rule_loop {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "rule loop task failed");
        }
    }
    info!("server stopped");
    Ok(())
}

async fn evaluate_once(state: &AppState) -> anyhow::Result<()> {
    let summary = state.runner.run_evaluation_pass(Utc::now()).await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    load_dotenv();
    let config = Config::from_env();
    config.log_summary();

    let state = startup::build_app_state(config).await?;

    match cli.command() {
        Command::Serve => serve(state).await?,
        Command::Evaluate => evaluate_once(&state).await?,
        Command::Generate { count } => {
            let inserted = startup::generate_into(&state, count).await?;
            println!("{} synthetic attacks generated.", inserted);
        }
    }

    Ok(())
}

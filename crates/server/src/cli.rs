//! CLI argument parsing.

use clap::{Parser, Subcommand};

/// Attack notification server.
#[derive(Parser, Debug)]
#[command(name = "attackwatch", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Start the HTTP server and the scheduled evaluation loop (default).
    Serve,
    /// Run one evaluation pass and print its summary as JSON.
    Evaluate,
    /// Insert synthetic attacks into the configured store.
    Generate {
        /// Number of attacks to create.
        #[arg(long, short = 'n', default_value_t = 100)]
        count: usize,
    },
}

impl Cli {
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Serve)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_is_the_default() {
        let cli = Cli::try_parse_from(["attackwatch"]).unwrap();
        assert_eq!(cli.command(), Command::Serve);
    }

    #[test]
    fn generate_count_defaults_to_100() {
        let cli = Cli::try_parse_from(["attackwatch", "generate"]).unwrap();
        assert_eq!(cli.command(), Command::Generate { count: 100 });

        let cli = Cli::try_parse_from(["attackwatch", "generate", "--count", "25"]).unwrap();
        assert_eq!(cli.command(), Command::Generate { count: 25 });
    }

    #[test]
    fn unknown_subcommand_is_rejected() {
        assert!(Cli::try_parse_from(["attackwatch", "import"]).is_err());
    }
}

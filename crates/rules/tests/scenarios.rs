//! End-to-end evaluation scenarios against the in-memory store.

use std::sync::Arc;

use attackwatch_core::{
    AttackEvent, AttackRef, DetailMap, DetailValue, GeoLocation, NotificationRule, RuleInput,
    MATCHED_COUNT_KEY,
};
use attackwatch_rules::{
    EventStore, MemoryStore, NotificationStore, PassRunner, RuleEvaluator, RuleStore,
};
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

fn attack(severity: i32, src: &str, dst: &str, ts: DateTime<Utc>) -> AttackEvent {
    let loc = |country: &str| GeoLocation {
        latitude: 40.7,
        longitude: -74.0,
        country: country.to_string(),
    };
    AttackEvent {
        id: Uuid::new_v4(),
        attack_type: "DDoS".to_string(),
        severity,
        source: loc(src),
        destination: loc(dst),
        timestamp: ts,
        extra: DetailMap::new(),
    }
}

fn rule(yaml: &str) -> RuleInput {
    serde_yaml::from_str(yaml).unwrap()
}

async fn seeded(rules: &[&str], now: DateTime<Utc>) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    let events: Vec<AttackEvent> = [8, 9, 10]
        .into_iter()
        .map(|s| attack(s, "USA", "Germany", now - Duration::minutes(2)))
        .collect();
    store.insert_many(&events).await.unwrap();
    for yaml in rules {
        store
            .create(NotificationRule::from_input(rule(yaml), now))
            .await
            .unwrap();
    }
    store
}

fn runner(store: &Arc<MemoryStore>) -> PassRunner {
    PassRunner::new(RuleEvaluator::new(
        store.clone(),
        store.clone(),
        store.clone(),
    ))
}

#[tokio::test]
async fn ddos_per_event_then_rerun() {
    let now = Utc::now();
    let store = seeded(
        &["{name: ddos, attack_type: DDoS, country: USA, min_severity: 8, cooldown_minutes: 0}"],
        now,
    )
    .await;
    let runner = runner(&store);

    let first = runner.run_evaluation_pass(now).await.unwrap();
    let second = runner
        .run_evaluation_pass(now + Duration::seconds(30))
        .await
        .unwrap();

    assert_eq!(first.notifications_created, 3);
    assert_eq!(second.notifications_created, 0);
    assert_eq!(store.list(Some("ddos"), 100).await.unwrap().len(), 3);
}

#[tokio::test]
async fn ddos_volume_reports_matched_count() {
    let now = Utc::now();
    let store = seeded(
        &["{name: ddos-volume, attack_type: DDoS, country: USA, min_severity: 8, threshold_count: 3}"],
        now,
    )
    .await;

    let summary = runner(&store).run_evaluation_pass(now).await.unwrap();
    assert_eq!(summary.notifications_created, 1);

    let listed = store.list(None, 100).await.unwrap();
    assert_eq!(listed[0].attack_id, AttackRef::Volume);
    assert_eq!(listed[0].details[MATCHED_COUNT_KEY], DetailValue::Integer(3));
    assert_eq!(
        serde_json::to_value(&listed[0].attack_id).unwrap(),
        serde_json::json!("threshold")
    );
}

#[tokio::test]
async fn destination_country_matches() {
    let now = Utc::now();
    let store = seeded(&["{name: germany, country: Germany}"], now).await;

    let summary = runner(&store).run_evaluation_pass(now).await.unwrap();
    assert_eq!(summary.notifications_created, 3);
}

#[tokio::test]
async fn concurrent_passes_do_not_duplicate() {
    let now = Utc::now();
    let store = seeded(
        &[
            "{name: per-event, attack_type: DDoS}",
            "{name: volume, threshold_count: 2}",
        ],
        now,
    )
    .await;

    // Separate runners share no mutex, like two server processes.
    let a = runner(&store);
    let b = runner(&store);
    let (ra, rb) = tokio::join!(a.run_evaluation_pass(now), b.run_evaluation_pass(now));
    let total = ra.unwrap().notifications_created + rb.unwrap().notifications_created;

    assert_eq!(total, 4);
    assert_eq!(store.list(Some("per-event"), 100).await.unwrap().len(), 3);
    assert_eq!(store.list(Some("volume"), 100).await.unwrap().len(), 1);
}

#[tokio::test]
async fn cooldown_window_end_to_end() {
    let now = Utc::now();
    let store = seeded(&["{name: vol, threshold_count: 1, cooldown_minutes: 10}"], now).await;
    let runner = runner(&store);

    let counts = [
        (now, 1),
        (now + Duration::minutes(5), 0),
        (now + Duration::minutes(11), 1),
    ];
    for (at, expected) in counts {
        let summary = runner.run_evaluation_pass(at).await.unwrap();
        assert_eq!(summary.notifications_created, expected, "pass at {at}");
    }
}

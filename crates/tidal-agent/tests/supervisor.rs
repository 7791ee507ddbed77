//! Supervisor behaviour against in-process providers and a scripted feed.

mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use tidal_agent::{Reconciled, Supervisor};
use tidal_core::{Action, ConfigMap, Policy, PolicyStrategy, PolicyTarget, RunRequest};

use common::*;

struct Harness {
    source: Arc<FeedSource>,
    target: Arc<RecordingTarget>,
    /// Registered as target "broken"; every count fails.
    broken: Arc<RecordingTarget>,
    strategy: Arc<FixedStrategy>,
    supervisor: Arc<Supervisor>,
}

async fn harness(actions: Vec<Action>, default_interval: Duration) -> Harness {
    let source = FeedSource::new();
    let target = RecordingTarget::new(2);
    let broken = RecordingTarget::failing("api down");
    let strategy = FixedStrategy::new(actions);

    let providers = providers();
    providers.targets.register_local("local", target.clone()).await;
    providers.targets.register_local("broken", broken.clone()).await;
    providers
        .metric_sources
        .register_local("local", Arc::new(FixedSource(80.0)))
        .await;
    providers
        .strategies
        .register_local("fixed", strategy.clone())
        .await;

    let supervisor = Arc::new(Supervisor::new(
        source.clone(),
        Arc::new(providers),
        default_interval,
    ));
    Harness {
        source,
        target,
        broken,
        strategy,
        supervisor,
    }
}

/// Let spawned tasks run without moving past any pending tick.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

// ── Reconciliation ─────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn reconcile_converges_to_latest_set() {
    let h = harness(vec![], Duration::from_secs(1)).await;

    let r = h.supervisor.reconcile(policies(&["a", "b", "c"])).await;
    assert_eq!(r, Reconciled { started: 3, stopped: 0 });
    assert_eq!(h.supervisor.active_policies().await, vec!["a", "b", "c"]);

    let r = h.supervisor.reconcile(policies(&["b", "d"])).await;
    assert_eq!(r, Reconciled { started: 1, stopped: 2 });
    assert_eq!(h.supervisor.active_policies().await, vec!["b", "d"]);

    let r = h.supervisor.reconcile(Vec::new()).await;
    assert_eq!(r, Reconciled { started: 0, stopped: 2 });
    assert!(h.supervisor.active_policies().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn same_set_twice_changes_nothing() {
    let h = harness(vec![], Duration::from_secs(1)).await;

    h.supervisor.reconcile(policies(&["a", "b"])).await;
    let r = h.supervisor.reconcile(policies(&["b", "a"])).await;
    assert_eq!(r, Reconciled::default());
    assert_eq!(h.supervisor.active_policies().await, vec!["a", "b"]);
}

#[tokio::test(start_paused = true)]
async fn removed_policy_stops_ticking() {
    let h = harness(vec![], Duration::from_secs(1)).await;
    let set = policies(&["a", "b"]);
    h.source.load(&set);
    h.supervisor.reconcile(set).await;

    tokio::time::sleep(Duration::from_millis(2_500)).await;
    assert_eq!(h.source.gets("a"), 2);
    assert_eq!(h.source.gets("b"), 2);

    h.supervisor.reconcile(policies(&["b"])).await;
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(h.source.gets("a"), 2);
    assert_eq!(h.source.gets("b"), 5);
}

#[tokio::test(start_paused = true)]
async fn surviving_policy_keeps_its_monitor() {
    let h = harness(vec![], Duration::from_secs(1)).await;
    h.source.load(&policies(&["a", "b"]));
    h.supervisor.reconcile(policies(&["a"])).await;

    // A restarted monitor would not have ticked at 1s.
    tokio::time::sleep(Duration::from_millis(500)).await;
    h.supervisor.reconcile(policies(&["a", "b"])).await;
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(h.source.gets("a"), 1);
}

// ── Cycle isolation ────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn failing_cycles_do_not_stop_any_monitor() {
    let h = harness(vec![Action::new(4, "scale out")], Duration::from_secs(1)).await;
    let good = policy("good");
    let mut bad = policy("bad");
    bad.target.name = "broken".to_string();
    let mut ghost = policy("ghost");
    ghost.strategy.name = "missing".to_string();
    let set = vec![good, bad, ghost];

    h.source.load(&set);
    h.supervisor.reconcile(set).await;

    tokio::time::sleep(Duration::from_millis(3_500)).await;

    assert_eq!(h.broken.count_calls(), 3);
    assert_eq!(h.source.gets("ghost"), 3);
    let scaled = h.target.scaled();
    assert_eq!(scaled.len(), 3);
    assert!(scaled.iter().all(|(_, config)| config["job"] == "good"));
}

#[tokio::test(start_paused = true)]
async fn empty_result_never_scales() {
    let h = harness(vec![], Duration::from_secs(1)).await;
    h.source.load(&policies(&["a"]));
    h.supervisor.reconcile(policies(&["a"])).await;

    tokio::time::sleep(Duration::from_millis(3_500)).await;
    assert_eq!(h.strategy.requests.lock().unwrap().len(), 3);
    assert!(h.target.scaled().is_empty());
}

// ── Run loop ───────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn run_follows_feed_and_ignores_errors() {
    let h = harness(vec![], Duration::from_secs(1)).await;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let run = tokio::spawn({
        let supervisor = h.supervisor.clone();
        async move { supervisor.run(shutdown_rx).await }
    });
    settle().await;

    h.source.publish(policies(&["a", "b"])).await;
    settle().await;
    assert_eq!(h.supervisor.active_policies().await, vec!["a", "b"]);

    h.source.fail("disk gone").await;
    settle().await;
    assert_eq!(h.supervisor.active_policies().await, vec!["a", "b"]);

    h.source.publish(policies(&["c"])).await;
    settle().await;
    assert_eq!(h.supervisor.active_policies().await, vec!["c"]);

    shutdown_tx.send(true).unwrap();
    run.await.unwrap();
    assert!(h.supervisor.active_policies().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_every_monitor() {
    let h = harness(vec![], Duration::from_secs(1)).await;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let run = tokio::spawn({
        let supervisor = h.supervisor.clone();
        async move { supervisor.run(shutdown_rx).await }
    });
    settle().await;

    h.source.publish(policies(&["a", "b", "c", "d"])).await;
    tokio::time::sleep(Duration::from_millis(2_500)).await;
    assert_eq!(h.source.total_gets(), 8);

    shutdown_tx.send(true).unwrap();
    run.await.unwrap();

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(h.source.total_gets(), 8);
}

// ── End to end ─────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn single_policy_cycle_scales_once_with_policy_arguments() {
    let source = FeedSource::new();
    let target = RecordingTarget::new(2);
    let strategy = FixedStrategy::new(vec![Action::new(4, "scale out")]);

    let providers = providers();
    providers
        .targets
        .register_local("local-cluster", target.clone())
        .await;
    providers
        .metric_sources
        .register_local("local-cluster", Arc::new(FixedSource(80.0)))
        .await;
    providers
        .strategies
        .register_local("target-value", strategy.clone())
        .await;
    let supervisor = Arc::new(Supervisor::new(
        source.clone(),
        Arc::new(providers),
        Duration::from_secs(5),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let run = tokio::spawn({
        let supervisor = supervisor.clone();
        async move { supervisor.run(shutdown_rx).await }
    });
    settle().await;

    let job = ConfigMap::from([("job".to_string(), "web".to_string())]);
    let strategy_config = ConfigMap::from([("target".to_string(), "50".to_string())]);
    source
        .publish(vec![Policy {
            id: "p1".to_string(),
            source: "local-cluster".to_string(),
            query: "cpu".to_string(),
            target: PolicyTarget {
                name: "local-cluster".to_string(),
                config: job.clone(),
            },
            strategy: PolicyStrategy {
                name: "target-value".to_string(),
                min: 1,
                max: 10,
                config: strategy_config.clone(),
            },
            interval: Duration::ZERO,
        }])
        .await;

    // One cycle at the 5s default interval.
    tokio::time::sleep(Duration::from_millis(5_500)).await;
    shutdown_tx.send(true).unwrap();
    run.await.unwrap();

    assert_eq!(
        *strategy.requests.lock().unwrap(),
        vec![RunRequest {
            current_count: 2,
            min_count: 1,
            max_count: 10,
            current_value: 80.0,
            config: strategy_config,
        }]
    );
    assert_eq!(target.scaled(), vec![(Action::new(4, "scale out"), job)]);
}

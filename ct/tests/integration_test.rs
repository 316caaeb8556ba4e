//! End-to-end tests of the completion coordinator against the simulated remote

use std::sync::Arc;
use std::time::{Duration, Instant};

use commandtracker::config::SimConfig;
use commandtracker::{
    AwaitOutcome, Command, CommandService, CompletionCoordinator, CoordinatorState, FinalizedBy, PushMode, Response,
    SimScript, SimulatedRemote,
};
use serde_json::json;

fn remote() -> SimulatedRemote {
    SimulatedRemote::spawn(&SimConfig::default())
}

async fn track(remote: &SimulatedRemote, script: SimScript) -> Arc<CompletionCoordinator> {
    let handle = remote.submit_script(script).await.unwrap();
    Arc::new(CompletionCoordinator::new(handle))
}

#[tokio::test]
async fn test_push_completes_before_first_poll_interval() {
    let remote = remote();
    let coordinator = track(&remote, SimScript::default().with_duration(Duration::from_millis(50))).await;

    let started = Instant::now();
    let outcome = coordinator.wait(10, Duration::from_millis(500)).await;

    assert_eq!(outcome, AwaitOutcome::Completed(Arc::new(Response::ok("done"))));
    assert!(started.elapsed() < Duration::from_millis(400));
    assert_eq!(coordinator.state(), CoordinatorState::Finalized);
    assert_eq!(coordinator.stats().finalized_by, Some(FinalizedBy::Push));
}

#[tokio::test]
async fn test_poll_observes_outcome_when_push_is_lost() {
    let remote = remote();
    let coordinator = track(
        &remote,
        SimScript::default()
            .with_duration(Duration::from_millis(30))
            .with_outcome(Response::error("Quota", "Exceeded").with_detail("limit", "10"))
            .with_push(PushMode::Drop),
    )
    .await;

    let outcome = coordinator.wait(20, Duration::from_millis(25)).await;

    let response = outcome.response().unwrap();
    assert!(response.is_error());
    assert_eq!(coordinator.stats().finalized_by, Some(FinalizedBy::Poll));
}

#[tokio::test]
async fn test_times_out_when_command_never_finishes() {
    let remote = remote();
    let coordinator = track(
        &remote,
        SimScript::default()
            .with_duration(Duration::from_secs(60))
            .with_push(PushMode::Drop),
    )
    .await;

    let started = Instant::now();
    let outcome = coordinator.wait(3, Duration::from_millis(100)).await;
    let elapsed = started.elapsed();

    assert_eq!(outcome, AwaitOutcome::TimedOut);
    assert!(elapsed >= Duration::from_millis(250), "returned too early: {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(1000), "returned too late: {:?}", elapsed);
    assert_eq!(coordinator.state(), CoordinatorState::Pending);
    assert_eq!(coordinator.response(), None);
}

#[tokio::test]
async fn test_cancel_then_poll_observes_cancelled() {
    let remote = remote();
    let coordinator = track(
        &remote,
        SimScript::default()
            .with_duration(Duration::from_secs(60))
            .with_push(PushMode::Drop),
    )
    .await;

    assert!(coordinator.cancel().await);
    assert_eq!(coordinator.state(), CoordinatorState::Cancelling);

    let outcome = coordinator.wait(20, Duration::from_millis(20)).await;
    assert_eq!(outcome, AwaitOutcome::Completed(Arc::new(Response::Cancelled)));
    assert_eq!(coordinator.state(), CoordinatorState::Finalized);
    assert!(!coordinator.cancel().await);
}

#[tokio::test]
async fn test_natural_completion_wins_over_slow_cancel() {
    let remote = remote();
    let coordinator = track(
        &remote,
        SimScript::default()
            .with_duration(Duration::from_millis(20))
            .with_cancel_latency(Duration::from_secs(30)),
    )
    .await;

    assert!(coordinator.cancel().await);
    let outcome = coordinator.wait(10, Duration::from_millis(50)).await;

    assert_eq!(outcome, AwaitOutcome::Completed(Arc::new(Response::ok("done"))));
}

#[tokio::test]
async fn test_cancel_rejected_by_remote() {
    let remote = remote();
    let coordinator = track(
        &remote,
        SimScript::default()
            .with_duration(Duration::from_millis(30))
            .with_honor_cancel(false),
    )
    .await;

    assert!(!coordinator.cancel().await);
    assert_eq!(coordinator.state(), CoordinatorState::Pending);

    let outcome = coordinator.wait(10, Duration::from_millis(50)).await;
    assert_eq!(outcome, AwaitOutcome::Completed(Arc::new(Response::ok("done"))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_waiters_observe_one_response() {
    let remote = remote();
    let coordinator = track(
        &remote,
        SimScript::default()
            .with_duration(Duration::from_millis(40))
            .with_push(PushMode::DelayMs(10)),
    )
    .await;

    let waiters: Vec<_> = (0..16)
        .map(|_| {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.wait(20, Duration::from_millis(15)).await })
        })
        .collect();

    let mut responses = Vec::new();
    for waiter in waiters {
        let outcome = waiter.await.unwrap();
        responses.push(outcome.response().cloned().unwrap());
    }

    let first = &responses[0];
    assert!(responses.iter().all(|r| Arc::ptr_eq(r, first)));
    assert_eq!(coordinator.stats().commits, 1);
    assert_eq!(coordinator.stats().poll_runs, 1);
}

#[tokio::test]
async fn test_transport_failures_are_retried() {
    let remote = remote();
    let coordinator = track(
        &remote,
        SimScript::default()
            .with_duration(Duration::from_millis(10))
            .with_push(PushMode::Drop)
            .with_status_failures(3),
    )
    .await;

    let outcome = coordinator.wait(20, Duration::from_millis(20)).await;

    assert!(outcome.response().unwrap().is_ok());
    let stats = coordinator.stats();
    assert_eq!(stats.transport_failures, 3);
    assert!(stats.status_queries >= 4);
}

#[tokio::test]
async fn test_wait_again_after_timeout() {
    let remote = remote();
    let coordinator = track(
        &remote,
        SimScript::default()
            .with_duration(Duration::from_millis(150))
            .with_push(PushMode::Drop),
    )
    .await;

    assert!(coordinator.wait(2, Duration::from_millis(20)).await.is_timed_out());

    let outcome = coordinator.wait(20, Duration::from_millis(25)).await;
    assert!(outcome.response().unwrap().is_ok());
    assert_eq!(coordinator.stats().poll_runs, 2);
}

#[tokio::test]
async fn test_push_arrives_before_coordinator_exists() {
    let remote = remote();
    let handle = remote
        .submit_script(SimScript::default().with_duration(Duration::from_millis(1)))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let coordinator = CompletionCoordinator::new(handle);

    assert_eq!(coordinator.state(), CoordinatorState::Finalized);
    let outcome = coordinator.wait(0, Duration::ZERO).await;
    assert_eq!(outcome, AwaitOutcome::Completed(Arc::new(Response::ok("done"))));
}

#[tokio::test]
async fn test_submit_through_command_service() {
    let remote = remote();
    let service: &dyn CommandService = &remote;
    let handle = service
        .submit(Command::new("duplicate").with_args(json!({"duration_ms": 10, "outcome": {"status": "ok", "data": 42}})))
        .await
        .unwrap();

    let coordinator = CompletionCoordinator::new(handle);
    let outcome = coordinator.wait(10, Duration::from_millis(20)).await;
    assert_eq!(outcome, AwaitOutcome::Completed(Arc::new(Response::ok(42))));
}

#[tokio::test]
async fn test_remote_shutdown_surfaces_as_timeout() {
    let remote = remote();
    let coordinator = track(
        &remote,
        SimScript::default()
            .with_duration(Duration::from_secs(60))
            .with_push(PushMode::Drop),
    )
    .await;
    remote.shutdown().await.unwrap();

    let outcome = coordinator.wait(3, Duration::from_millis(10)).await;
    assert!(outcome.is_timed_out());
    assert_eq!(coordinator.stats().transport_failures, 3);
    assert!(!coordinator.cancel().await);
}

// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Tests for restart admission and status reporting during restarts.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use futures::future::join_all;
use gamefleet_manager::error::{Error, ErrorKind};
use gamefleet_manager::restart::RestartSupervisor;
use gamefleet_manager::runner::{MockCall, MockRunner};

async fn wait_until_idle(supervisor: &RestartSupervisor, instance: &str) {
    for _ in 0..200 {
        if !supervisor.is_restarting(instance) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("{instance} never left the restarting state");
}

#[tokio::test]
async fn test_concurrent_restarts_admit_exactly_one() {
    let runner = Arc::new(MockRunner::gated());
    runner.add_instance("alpha").await;
    let supervisor = Arc::new(RestartSupervisor::new(runner.clone()));

    let attempts = (0..8).map(|_| {
        let supervisor = supervisor.clone();
        async move { supervisor.restart("alpha").await }
    });
    let results = join_all(attempts).await;

    let mut admitted = Vec::new();
    let mut conflicts = 0;
    for result in results {
        match result {
            Ok(handle) => admitted.push(handle),
            Err(e) => {
                assert_eq!(e.kind(), ErrorKind::Conflict);
                assert!(matches!(e, Error::AlreadyRestarting(_)));
                conflicts += 1;
            }
        }
    }
    assert_eq!(admitted.len(), 1);
    assert_eq!(conflicts, 7);
    assert!(supervisor.is_restarting("alpha"));

    runner.release_restart();
    admitted.pop().unwrap().wait().await.unwrap();

    assert!(!supervisor.is_restarting("alpha"));
    assert_eq!(runner.restart_count("alpha").await, 1);
}

#[tokio::test]
async fn test_eligible_again_after_completion() {
    let runner = Arc::new(MockRunner::new());
    runner.add_instance("alpha").await;
    let supervisor = RestartSupervisor::new(runner.clone());

    supervisor.restart("alpha").await.unwrap().wait().await.unwrap();
    supervisor.restart("alpha").await.unwrap().wait().await.unwrap();

    assert_eq!(runner.restart_count("alpha").await, 2);
}

#[tokio::test]
async fn test_eligible_again_after_failed_restart() {
    let mut runner = MockRunner::new();
    runner.fail_restart = true;
    let runner = Arc::new(runner);
    runner.add_instance("alpha").await;
    let supervisor = RestartSupervisor::new(runner.clone());

    let first = supervisor.restart("alpha").await.unwrap();
    assert!(first.wait().await.is_err());
    assert!(!supervisor.is_restarting("alpha"));

    let second = supervisor.restart("alpha").await.unwrap();
    assert!(second.wait().await.is_err());
}

#[tokio::test]
async fn test_detached_restart_still_completes() {
    let runner = Arc::new(MockRunner::new());
    runner.add_instance("alpha").await;
    let supervisor = RestartSupervisor::new(runner.clone());

    drop(supervisor.restart("alpha").await.unwrap());
    wait_until_idle(&supervisor, "alpha").await;

    assert_eq!(runner.restart_count("alpha").await, 1);
}

#[tokio::test]
async fn test_starting_health_is_conflict_and_registry_untouched() {
    let runner = Arc::new(MockRunner::new());
    runner.add_instance_with_health("alpha", "starting").await;
    let supervisor = RestartSupervisor::new(runner.clone());

    let err = supervisor.restart("alpha").await.unwrap_err();
    assert!(matches!(err, Error::CurrentlyStarting(_)));
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert!(supervisor.registry().snapshot().is_empty());

    let calls = runner.calls().await;
    assert!(!calls.contains(&MockCall::Signal("alpha".to_string())));
    assert!(!calls.contains(&MockCall::Restart("alpha".to_string())));
}

#[tokio::test]
async fn test_unmanaged_instance_not_found() {
    let runner = Arc::new(MockRunner::new());
    runner.add_instance("alpha").await;
    let supervisor = RestartSupervisor::new(runner.clone());

    let err = supervisor.restart("ghost").await.unwrap_err();
    assert!(matches!(err, Error::InstanceNotFound(_)));
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(!supervisor.is_restarting("ghost"));
}

#[tokio::test]
async fn test_healthy_after_starting_can_restart() {
    let runner = Arc::new(MockRunner::new());
    runner.add_instance_with_health("alpha", "starting").await;
    let supervisor = RestartSupervisor::new(runner.clone());

    assert!(supervisor.restart("alpha").await.is_err());
    runner.set_health("alpha", "healthy").await;
    supervisor.restart("alpha").await.unwrap().wait().await.unwrap();
}

#[tokio::test]
async fn test_status_reports_restarting_while_in_flight() {
    let ctx = TestContext::with_runner(MockRunner::gated());
    ctx.runner.add_instance("alpha").await;
    ctx.runner.add_instance("beta").await;

    let handle = ctx.state.supervisor.restart("alpha").await.unwrap();

    let all = ctx.state.aggregator.status_of_all().await.unwrap();
    assert!(all["alpha"].restarting);
    assert!(!all["beta"].restarting);

    ctx.runner.release_restart();
    handle.wait().await.unwrap();

    let alpha = ctx.state.aggregator.status_of("alpha").await.unwrap();
    assert!(!alpha.restarting);
}

#[tokio::test]
async fn test_unmanaged_name_absent_from_aggregate() {
    let ctx = TestContext::new();
    ctx.runner.add_instance("alpha").await;

    let err = ctx.state.aggregator.status_of("ghost").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let all = ctx.state.aggregator.status_of_all().await.unwrap();
    assert!(all.contains_key("alpha"));
    assert!(!all.contains_key("ghost"));
}

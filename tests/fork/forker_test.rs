//! Role gating and fork creation.

use std::sync::atomic::{AtomicUsize, Ordering};

use forkline::config::Config;
use forkline::fork::{ForkHandle, Forker, Role};
use forkline::process::ProcessState;

#[test]
fn master_forks_are_live_and_unstarted() {
    let forker = Forker::new(Role::Master, Config::default());
    let fork = forker.fork().unwrap();

    let bridge = fork.bridge().expect("master fork is live");
    assert_eq!(bridge.state(), ProcessState::Unstarted);
    let exe = std::env::current_exe().unwrap();
    assert_eq!(bridge.label(), exe.to_string_lossy());
    fork.dispose();
}

#[test]
fn fork_never_forks_again() {
    let forker = Forker::new(Role::Fork, Config::default());
    for _ in 0..3 {
        let fork = forker.fork().unwrap();
        assert!(matches!(fork, ForkHandle::Inert));
        fork.start().unwrap();
    }
}

#[test]
fn role_gates_run_exactly_one_side() {
    let calls = AtomicUsize::new(0);
    for role in [Role::Master, Role::Fork] {
        let forker = Forker::new(role, Config::default());
        forker.run_as_master(|| calls.fetch_add(1, Ordering::SeqCst));
        forker.run_as_fork(|| calls.fetch_add(10, Ordering::SeqCst));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 11);
}

#[tokio::test]
async fn async_gates_follow_role() {
    let master = Forker::new(Role::Master, Config::default());
    assert_eq!(master.run_as_master_async(|| async { "m" }).await, Some("m"));
    assert_eq!(master.run_as_fork_async(|| async { "f" }).await, None);

    let fork = Forker::new(Role::Fork, Config::default());
    assert_eq!(fork.run_as_fork_async(|| async { "f" }).await, Some("f"));
    assert_eq!(fork.run_as_master_async(|| async { "m" }).await, None);
}

#[test]
fn test_process_is_master() {
    // The test harness is started without the fork marker.
    assert_eq!(Role::detect(&Config::default().fork), Role::Master);
    assert!(!Forker::from_env(Config::default()).is_fork());
}

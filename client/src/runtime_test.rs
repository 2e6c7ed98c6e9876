use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::*;

#[test]
fn spawn_without_runtime_is_none() {
    assert!(spawn(async {}).is_none());
}

#[test]
fn timeout_without_runtime_runs_unbounded() {
    let outcome = futures::executor::block_on(timeout(Duration::from_millis(1), async { 7 }));
    assert_eq!(outcome, Ok(7));
}

#[tokio::test(start_paused = true)]
async fn timeout_elapses_on_a_pending_future() {
    let outcome = timeout(Duration::from_secs(5), std::future::pending::<()>()).await;
    assert_eq!(outcome, Err(Elapsed));
}

#[tokio::test(start_paused = true)]
async fn aborted_task_never_runs_its_tail() {
    let ran = Arc::new(AtomicBool::new(false));
    let flag = ran.clone();
    let task = spawn(async move {
        sleep(Duration::from_secs(10)).await;
        flag.store(true, Ordering::SeqCst);
    })
    .unwrap();

    task.abort();
    task.join().await;
    sleep(Duration::from_secs(20)).await;
    assert!(!ran.load(Ordering::SeqCst));
}

#[tokio::test]
async fn join_waits_for_completion() {
    let ran = Arc::new(AtomicBool::new(false));
    let flag = ran.clone();
    spawn(async move { flag.store(true, Ordering::SeqCst) }).unwrap().join().await;
    assert!(ran.load(Ordering::SeqCst));
}

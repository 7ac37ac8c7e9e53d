// tests/runtime_fake_executor.rs

mod common;
use crate::common::builders::{PipelineBuilder, TaskConfigBuilder};
use crate::common::{init_tracing, medallion_pipeline};

use std::error::Error;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::time::{Duration, timeout};

use dagline::dag::{NodeState, ScheduledTask, Scheduler};
use dagline::engine::{
    CancelReason, CoreRuntime, Notifier, PipelineOutcome, RunReport, Runtime, RuntimeEvent,
    TaskOutcome,
};
use dagline::exec::ExecutorBackend;
use dagline_test_utils::fake_executor::{FakeExecutor, executed_nodes};

type TestResult = Result<(), Box<dyn Error>>;

fn chain() -> Scheduler {
    let cfg = PipelineBuilder::new()
        .with_task("slow", TaskConfigBuilder::new().build())
        .with_task("next", TaskConfigBuilder::new().after("slow").build())
        .build();
    Scheduler::from_config(&cfg).unwrap()
}

/// Records the outcome of every notification.
#[derive(Clone, Default)]
struct RecordingNotifier {
    seen: Arc<Mutex<Vec<PipelineOutcome>>>,
}

impl Notifier for RecordingNotifier {
    fn notify<'a>(
        &'a self,
        report: &'a RunReport,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        Box::pin(async move {
            self.seen.lock().unwrap().push(report.outcome);
            Ok(())
        })
    }
}

/// A notifier that always fails.
struct BrokenNotifier;

impl Notifier for BrokenNotifier {
    fn notify<'a>(
        &'a self,
        _report: &'a RunReport,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        Box::pin(async { Err::<(), _>(anyhow::anyhow!("smtp unreachable")) })
    }
}

/// Accepts tasks and never reports back.
struct SilentExecutor {
    accepted: Arc<Mutex<Vec<String>>>,
}

impl ExecutorBackend for SilentExecutor {
    fn spawn_ready_tasks(
        &mut self,
        tasks: Vec<ScheduledTask>,
    ) -> Pin<Box<dyn Future<Output = dagline::errors::Result<()>> + Send + '_>> {
        let accepted = Arc::clone(&self.accepted);
        Box::pin(async move {
            for t in tasks {
                accepted.lock().unwrap().push(t.node.to_string());
            }
            Ok(())
        })
    }
}

#[tokio::test]
async fn runtime_with_fake_executor_runs_pipeline_to_end_state() -> TestResult {
    init_tracing();

    let scheduler = Scheduler::from_config(&medallion_pipeline())?;
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(16);
    let executor = FakeExecutor::new(rt_tx.clone()).fail("test");
    let log = executor.log();
    let notifier = RecordingNotifier::default();

    let core = CoreRuntime::new(scheduler, "scv_dbt_pipeline", 4);
    let runtime = Runtime::new(core, rt_rx, executor).with_notifier(notifier.clone());

    let report = match timeout(Duration::from_secs(3), runtime.run()).await {
        Ok(result) => result?,
        Err(_) => panic!("runtime did not finish within 3 seconds"),
    };

    assert_eq!(
        executed_nodes(&log),
        vec!["start", "validate", "run", "test", "notify_failure", "end"]
    );
    assert_eq!(report.outcome, PipelineOutcome::Failure);
    assert_eq!(report.state_of("output"), Some(NodeState::UpstreamFailed));
    assert_eq!(report.state_of("notify_success"), Some(NodeState::Skipped));
    assert_eq!(report.state_of("end"), Some(NodeState::Succeeded));
    assert!(report.total_duration_ms.is_some());
    assert_eq!(report.cancelled, None);

    assert_eq!(*notifier.seen.lock().unwrap(), vec![PipelineOutcome::Failure]);
    Ok(())
}

#[tokio::test]
async fn scripted_failures_are_retried() -> TestResult {
    init_tracing();

    let cfg = PipelineBuilder::new()
        .with_task("flaky", TaskConfigBuilder::new().retries(2).build())
        .build();
    let scheduler = Scheduler::from_config(&cfg)?;
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(16);
    let executor = FakeExecutor::new(rt_tx.clone()).outcomes(
        "flaky",
        vec![TaskOutcome::failed("1"), TaskOutcome::TimedOut(Duration::from_millis(5))],
    );
    let log = executor.log();

    let runtime = Runtime::new(CoreRuntime::new(scheduler, "p", 1), rt_rx, executor);
    let report = timeout(Duration::from_secs(3), runtime.run()).await??;

    assert_eq!(
        *log.lock().unwrap(),
        vec![
            ("flaky".to_string(), 1),
            ("flaky".to_string(), 2),
            ("flaky".to_string(), 3)
        ]
    );
    assert!(report.is_success());
    assert_eq!(report.nodes["flaky"].attempts, 3);
    Ok(())
}

#[tokio::test]
async fn expired_deadline_cancels_and_drains() -> TestResult {
    init_tracing();

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(16);
    let executor = FakeExecutor::new(rt_tx.clone()).delay("slow", Duration::from_millis(300));
    let log = executor.log();

    let runtime = Runtime::new(CoreRuntime::new(chain(), "p", 2), rt_rx, executor)
        .with_timeout(Some(Duration::from_millis(50)));
    let report = timeout(Duration::from_secs(3), runtime.run()).await??;

    assert_eq!(executed_nodes(&log), vec!["slow"]);
    assert_eq!(report.cancelled, Some(CancelReason::Timeout));
    // The in-flight body was allowed to finish.
    assert_eq!(report.state_of("slow"), Some(NodeState::Succeeded));
    assert_eq!(report.state_of("next"), Some(NodeState::Skipped));
    Ok(())
}

#[tokio::test]
async fn cancel_request_stops_new_work() -> TestResult {
    init_tracing();

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(16);
    let executor = FakeExecutor::new(rt_tx.clone())
        .delay("slow", Duration::from_millis(200))
        .fail("slow");

    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let _ = tx.send(RuntimeEvent::CancelRequested).await;
        });
    }

    let runtime = Runtime::new(CoreRuntime::new(chain(), "p", 2), rt_rx, executor);
    let report = timeout(Duration::from_secs(3), runtime.run()).await??;

    assert_eq!(report.cancelled, Some(CancelReason::Requested));
    assert_eq!(report.state_of("slow"), Some(NodeState::Failed));
    assert_eq!(report.state_of("next"), Some(NodeState::Skipped));
    assert!(!report.is_success());
    Ok(())
}

#[tokio::test]
async fn closed_event_channel_finalizes_in_flight_nodes() -> TestResult {
    init_tracing();

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(16);
    drop(rt_tx);
    let accepted = Arc::new(Mutex::new(Vec::new()));
    let executor = SilentExecutor {
        accepted: Arc::clone(&accepted),
    };

    let runtime = Runtime::new(CoreRuntime::new(chain(), "p", 2), rt_rx, executor);
    let report = timeout(Duration::from_secs(3), runtime.run()).await??;

    assert_eq!(*accepted.lock().unwrap(), vec!["slow".to_string()]);
    assert_eq!(report.state_of("slow"), Some(NodeState::Failed));
    assert_eq!(report.state_of("next"), Some(NodeState::Skipped));
    assert!(report.nodes.values().all(|n| n.state.is_terminal()));
    Ok(())
}

#[tokio::test]
async fn notifier_failures_do_not_change_the_outcome() -> TestResult {
    init_tracing();

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(16);
    let executor = FakeExecutor::new(rt_tx.clone());
    let recorder = RecordingNotifier::default();

    let runtime = Runtime::new(CoreRuntime::new(chain(), "p", 2), rt_rx, executor)
        .with_notifier(BrokenNotifier)
        .with_notifier(recorder.clone());
    let report = timeout(Duration::from_secs(3), runtime.run()).await??;

    assert!(report.is_success());
    assert_eq!(*recorder.seen.lock().unwrap(), vec![PipelineOutcome::Success]);
    Ok(())
}

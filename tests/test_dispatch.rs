use std::sync::{Arc, Mutex};

use tokio_fsm_engine::{DispatchOutcome, Fsm, FsmError, TaskError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Stage {
    Waiting,
    Generated,
    Submitted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Signal {
    E0,
    E1,
    E2,
    E3,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
enum PipelineError {
    #[error("generator unavailable: {0}")]
    Generator(String),
}

type Log = Arc<Mutex<Vec<&'static str>>>;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

fn logging(
    log: &Log,
    entry: &'static str,
) -> impl Fn() -> std::future::Ready<Result<(), PipelineError>> + Send + Sync + 'static {
    let log = Arc::clone(log);
    move || {
        log.lock().unwrap().push(entry);
        std::future::ready(Ok(()))
    }
}

fn pipeline(log: &Log) -> Fsm<Stage, Signal, PipelineError> {
    Fsm::builder(Stage::Waiting)
        .name("pipeline")
        .transition(Stage::Waiting, Signal::E0, Stage::Generated, logging(log, "generate"))
        .transition(Stage::Generated, Signal::E2, Stage::Submitted, logging(log, "submit"))
        .transition(Stage::Submitted, Signal::E3, Stage::Waiting, logging(log, "complete"))
        .transition(Stage::Generated, Signal::E1, Stage::Waiting, logging(log, "validation_failed"))
        .build()
}

#[tokio::test]
async fn test_success_cycle_returns_to_waiting() {
    init_tracing();
    let log = Log::default();
    let mut fsm = pipeline(&log);
    let handle = fsm.handle();

    handle.submit(Signal::E0);
    handle.submit(Signal::E2);
    handle.submit(Signal::E3);

    assert_eq!(
        fsm.step().await.unwrap(),
        DispatchOutcome::Transitioned {
            from: Stage::Waiting,
            event: Signal::E0,
            to: Stage::Generated,
        }
    );
    assert_eq!(handle.current_state(), Stage::Generated);
    fsm.step().await.unwrap();
    assert_eq!(handle.current_state(), Stage::Submitted);
    fsm.step().await.unwrap();

    assert_eq!(fsm.current_state(), Stage::Waiting);
    assert_eq!(*log.lock().unwrap(), vec!["generate", "submit", "complete"]);
}

#[tokio::test]
async fn test_failure_edge_returns_to_waiting() {
    init_tracing();
    let log = Log::default();
    let (handle, task) = pipeline(&log).spawn();

    handle.submit(Signal::E0);
    handle.submit(Signal::E1);
    handle.shutdown_graceful();

    assert_eq!(task.await.unwrap(), Stage::Waiting);
    assert_eq!(*log.lock().unwrap(), vec!["generate", "validation_failed"]);
}

#[tokio::test]
async fn test_unsupported_event_keeps_state() {
    init_tracing();
    let log = Log::default();
    let mut fsm = pipeline(&log);
    let handle = fsm.handle();

    handle.submit(Signal::E2);

    assert_eq!(
        fsm.step().await.unwrap(),
        DispatchOutcome::Unsupported {
            state: Stage::Waiting,
            event: Signal::E2,
        }
    );
    assert_eq!(fsm.current_state(), Stage::Waiting);
    assert_eq!(handle.current_event(), Some(Signal::E2));
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_loop_survives_unsupported_events() {
    init_tracing();
    let log = Log::default();
    let (handle, task) = pipeline(&log).spawn();

    handle.submit(Signal::E3);
    handle.submit(Signal::E1);
    handle.submit(Signal::E0);
    handle.wait_for_state(Stage::Generated).await.unwrap();

    handle.shutdown_immediate();
    assert_eq!(task.await.unwrap(), Stage::Generated);
    assert_eq!(*log.lock().unwrap(), vec!["generate"]);
}

#[tokio::test]
async fn test_empty_queue_step() {
    let log = Log::default();
    let mut fsm = pipeline(&log);

    assert_eq!(fsm.step().await.unwrap(), DispatchOutcome::Empty);
    assert_eq!(fsm.handle().current_event(), None);
    assert_eq!(fsm.current_state(), Stage::Waiting);
}

#[tokio::test]
async fn test_events_processed_in_submission_order() {
    init_tracing();
    let order = Arc::new(Mutex::new(Vec::new()));
    let mut builder = Fsm::<u8, u32, PipelineError>::builder(0);
    for tag in 0..64 {
        let order = Arc::clone(&order);
        builder = builder.transition(0, tag, 0, move || {
            let order = Arc::clone(&order);
            async move {
                tokio::task::yield_now().await;
                order.lock().unwrap().push(tag);
                Ok(())
            }
        });
    }
    let fsm = builder.build();
    let handle = fsm.handle();

    let sequence: Vec<u32> = (0..64).rev().chain(0..64).collect();
    for tag in &sequence {
        handle.submit(*tag);
    }
    let task = tokio::spawn(fsm.run());
    handle.shutdown_graceful();

    assert_eq!(task.await.unwrap().unwrap(), 0);
    assert_eq!(*order.lock().unwrap(), sequence);
}

#[tokio::test]
async fn test_action_failure_is_fatal_and_state_not_advanced() {
    init_tracing();
    let log = Log::default();
    let fsm = Fsm::<Stage, Signal, PipelineError>::builder(Stage::Waiting)
        .transition(Stage::Waiting, Signal::E0, Stage::Generated, || async {
            Err(PipelineError::Generator("seed missing".into()))
        })
        .transition(Stage::Waiting, Signal::E3, Stage::Waiting, logging(&log, "unreachable"))
        .build();
    let (handle, task) = fsm.spawn();

    handle.submit(Signal::E0);
    handle.submit(Signal::E3);

    match task.await {
        Err(TaskError::Fsm(FsmError::ActionFailed {
            state,
            event,
            error,
        })) => {
            assert_eq!(state, Stage::Waiting);
            assert_eq!(event, Signal::E0);
            assert_eq!(error, PipelineError::Generator("seed missing".into()));
        }
        other => panic!("expected action failure, got {other:?}"),
    }
    assert_eq!(handle.current_state(), Stage::Waiting);
    assert_eq!(handle.pending_events(), 1);
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_step_reports_action_failure() {
    let mut fsm = Fsm::<Stage, Signal, PipelineError>::builder(Stage::Generated)
        .transition(Stage::Generated, Signal::E2, Stage::Submitted, || async {
            Err(PipelineError::Generator("offline".into()))
        })
        .build();
    fsm.handle().submit(Signal::E2);

    let err = fsm.step().await.unwrap_err();

    assert_eq!(*err.state(), Stage::Generated);
    assert_eq!(
        err.to_string(),
        "action for event E2 in state Generated failed: generator unavailable: offline"
    );
    assert_eq!(fsm.current_state(), Stage::Generated);
}

#[tokio::test]
async fn test_duplicate_registration_last_wins() {
    let log = Log::default();
    let mut fsm = Fsm::builder(Stage::Waiting)
        .transition(Stage::Waiting, Signal::E0, Stage::Generated, logging(&log, "first"))
        .transition(Stage::Waiting, Signal::E0, Stage::Submitted, logging(&log, "second"))
        .build();
    assert_eq!(fsm.table().len(), 1);

    fsm.handle().submit(Signal::E0);
    fsm.step().await.unwrap();

    assert_eq!(fsm.current_state(), Stage::Submitted);
    assert_eq!(*log.lock().unwrap(), vec!["second"]);
}

//! Background execution of a run.
//!
//! `spawn_run` drives a `Run` on its own thread and reports progress as
//! `RunEvent`s over a channel, so a front end never blocks on the
//! filesystem.

use crate::job::{CancelFlag, Organizer};
use crate::model::{RunConfig, RunSummary, TransferResult};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub enum RunEvent {
    /// The configuration was accepted; `total` entries will be processed
    Started { run_id: Uuid, total: usize },
    /// One entry is done (succeeded, skipped or failed)
    FileCompleted(TransferResult),
    /// The run ended, normally or on cancel
    Finished(RunSummary),
    /// The configuration was rejected; nothing was touched
    Rejected(String),
}

/// Handle to a run executing on a background thread.
pub struct RunHandle {
    events: Receiver<RunEvent>,
    cancel: CancelFlag,
    thread: JoinHandle<Option<RunSummary>>,
}

impl RunHandle {
    /// Events in the order they happened. The channel disconnects once the
    /// worker is done.
    pub fn events(&self) -> &Receiver<RunEvent> {
        &self.events
    }

    /// Ask the run to stop after the file in flight.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the worker to exit.
    ///
    /// # Returns
    /// The final summary, or `None` if the run was rejected or the worker
    /// panicked.
    pub fn join(self) -> Option<RunSummary> {
        self.thread.join().unwrap_or_else(|_| {
            warn!("run worker panicked");
            None
        })
    }
}

/// Spawn a background worker thread to execute a run.
pub fn spawn_run(organizer: Organizer, config: RunConfig) -> RunHandle {
    let (tx, rx) = unbounded::<RunEvent>();
    let cancel = organizer.cancel_flag();

    let thread = thread::spawn(move || execute_run(&organizer, config, &tx));

    RunHandle {
        events: rx,
        cancel,
        thread,
    }
}

fn execute_run(
    organizer: &Organizer,
    config: RunConfig,
    tx: &Sender<RunEvent>,
) -> Option<RunSummary> {
    let mut run = match organizer.run(config) {
        Ok(run) => run,
        Err(e) => {
            let _ = tx.send(RunEvent::Rejected(e.to_string()));
            return None;
        }
    };

    let run_id = run.id();
    let _ = tx.send(RunEvent::Started {
        run_id,
        total: run.remaining(),
    });

    for result in run.by_ref() {
        if tx.send(RunEvent::FileCompleted(result)).is_err() {
            // Nobody is listening any more; finish quietly
            debug!(run_id = %run_id, "event receiver dropped");
        }
    }

    let summary = run.finish();
    let _ = tx.send(RunEvent::Finished(summary.clone()));
    Some(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DateFormat, TransferMode, TransferStatus};
    use std::fs;

    #[test]
    fn test_worker_streams_events_in_order() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        fs::create_dir(&src).expect("Failed to create src dir");
        fs::write(src.join("a.txt"), b"a").unwrap();
        fs::write(src.join("b.txt"), b"b").unwrap();

        let config = RunConfig::new(
            &src,
            temp_dir.path().join("dst"),
            DateFormat::YearMonthDay,
            TransferMode::Copy,
        );
        let handle = spawn_run(Organizer::new(), config);
        let events: Vec<RunEvent> = handle.events().iter().collect();

        assert!(matches!(events.first(), Some(RunEvent::Started { total: 2, .. })));
        let completed: Vec<_> = events
            .iter()
            .filter_map(|event| match event {
                RunEvent::FileCompleted(result) => Some(result.status),
                _ => None,
            })
            .collect();
        assert_eq!(completed, [TransferStatus::Succeeded, TransferStatus::Succeeded]);
        assert!(matches!(events.last(), Some(RunEvent::Finished(summary)) if summary.succeeded == 2));

        let summary = handle.join().expect("summary expected");
        assert_eq!(summary.total(), 2);
    }

    #[test]
    fn test_worker_reports_rejected_config() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let config = RunConfig::new(
            temp_dir.path().join("missing"),
            temp_dir.path().join("dst"),
            DateFormat::DayMonthYear,
            TransferMode::Move,
        );

        let handle = spawn_run(Organizer::new(), config);
        let events: Vec<RunEvent> = handle.events().iter().collect();

        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], RunEvent::Rejected(msg) if msg.contains("not found")));
        assert!(handle.join().is_none());
    }

    #[test]
    fn test_worker_cancel_before_start() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        fs::create_dir(&src).expect("Failed to create src dir");
        fs::write(src.join("a.txt"), b"a").unwrap();

        let organizer = Organizer::new();
        organizer.cancel_flag().cancel();
        let config = RunConfig::new(&src, temp_dir.path().join("dst"), DateFormat::DayMonthYear, TransferMode::Copy);

        let summary = spawn_run(organizer, config).join().expect("summary expected");
        assert!(summary.cancelled);
        assert_eq!(summary.total(), 0);
        assert!(src.join("a.txt").exists());
    }
}

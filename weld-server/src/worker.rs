//! Persistence worker: drains the handoff queue one session at a time.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;

use chrono::Local;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use weld_core::registry::StandRegistry;
use weld_core::session::Session;
use weld_core::sink::RecordSink;
use weld_core::transform::{self, PersistError};

/// FIFO between connection handlers and the worker.
pub fn handoff_queue() -> (UnboundedSender<Session>, UnboundedReceiver<Session>) {
    mpsc::unbounded_channel()
}

/// What happened to one session.
#[derive(Debug)]
pub enum Outcome {
    Persisted(PathBuf),
    /// No stand registered for the source address; nothing written.
    Unregistered,
    Failed(PersistError),
}

pub struct Worker<S> {
    registry: Arc<StandRegistry>,
    sink: S,
    archive_root: PathBuf,
}

impl<S: RecordSink> Worker<S> {
    pub fn new(registry: Arc<StandRegistry>, sink: S, archive_root: impl Into<PathBuf>) -> Self {
        Self {
            registry,
            sink,
            archive_root: archive_root.into(),
        }
    }

    #[cfg(test)]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Turn one session into a report. Timestamped with local time at processing.
    pub fn process(&self, session: &Session) -> Outcome {
        let Some(stand) = self.registry.lookup(session.source_ip()) else {
            return Outcome::Unregistered;
        };
        let at = Local::now().naive_local();
        match transform::persist(&self.sink, session, stand, at, &self.archive_root) {
            Ok(path) => Outcome::Persisted(path),
            Err(e) => Outcome::Failed(e),
        }
    }

    /// Block on the queue until every sender is gone.
    pub fn run(self, mut queue: UnboundedReceiver<Session>) {
        while let Some(session) = queue.blocking_recv() {
            let ip = session.source_ip();
            match self.process(&session) {
                Outcome::Persisted(path) => {
                    tracing::info!(ip, path = %path.display(), "report saved")
                }
                Outcome::Unregistered => tracing::info!(ip, "unregistered source, session dropped"),
                Outcome::Failed(e) => tracing::error!(ip, error = %e, "report failed"),
            }
        }
        tracing::debug!("handoff queue closed, worker exiting");
    }
}

/// Run `worker` on its own OS thread.
pub fn spawn_worker<S>(
    worker: Worker<S>,
    queue: UnboundedReceiver<Session>,
) -> std::io::Result<JoinHandle<()>>
where
    S: RecordSink + Send + 'static,
{
    std::thread::Builder::new()
        .name("persistence".into())
        .spawn(move || worker.run(queue))
}

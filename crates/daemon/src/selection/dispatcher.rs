//! Asynchronous send of a selection snapshot.
//!
//! A [`SendDispatcher`] runs as its own task. It walks the snapshot in
//! ascending index order, hands each file to a [`TransferSink`], and posts a
//! single [`SessionEvent::TransferComplete`] back to the session that
//! spawned it. Per-file failures are recorded and never stop the walk.

use std::collections::BTreeMap;
use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::event::SessionEvent;
use crate::files::SandboxRoot;

/// Per-file transfer failures.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("file not found: {0}")]
    NotFound(String),

    #[error("not a regular file: {0}")]
    NotAFile(String),

    #[error("IO error sending {name}: {source}")]
    Io {
        name: String,
        #[source]
        source: io::Error,
    },
}

/// Destination for files picked in a selection session.
pub trait TransferSink: Send + Sync + 'static {
    /// Send one file. Returns the number of bytes handed off.
    fn send_file(
        &self,
        index: usize,
        name: &str,
    ) -> impl Future<Output = Result<u64, TransferError>> + Send;
}

/// Sink that checks each file is still a regular file under the served root
/// and records it. Moving the bytes belongs to whoever consumes the report.
#[derive(Debug, Clone)]
pub struct RootSink {
    root: SandboxRoot,
}

impl RootSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: SandboxRoot::new(root),
        }
    }
}

impl TransferSink for RootSink {
    async fn send_file(&self, index: usize, name: &str) -> Result<u64, TransferError> {
        let path = self.root.resolve(name);
        let metadata = tokio::fs::metadata(&path).await.map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                TransferError::NotFound(name.to_string())
            } else {
                TransferError::Io {
                    name: name.to_string(),
                    source: e,
                }
            }
        })?;

        if !metadata.is_file() {
            return Err(TransferError::NotAFile(name.to_string()));
        }

        info!(index, file = %name, size = metadata.len(), "Sending file");
        Ok(metadata.len())
    }
}

/// A file handed off successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentFile {
    pub index: usize,
    pub name: String,
    pub bytes: u64,
}

/// A file whose transfer failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedFile {
    pub index: usize,
    pub name: String,
    pub error: String,
}

/// Outcome of one dispatch, in snapshot order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub sent: Vec<SentFile>,
    pub failed: Vec<FailedFile>,
}

impl DispatchReport {
    /// Number of files attempted.
    pub fn attempted(&self) -> usize {
        self.sent.len() + self.failed.len()
    }

    pub fn all_sent(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.sent.iter().map(|f| f.bytes).sum()
    }
}

/// Runs the send for a snapshot of a session's selection.
pub struct SendDispatcher<S> {
    sink: Arc<S>,
}

impl<S> Clone for SendDispatcher<S> {
    fn clone(&self) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
        }
    }
}

impl<S: TransferSink> SendDispatcher<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink: Arc::new(sink),
        }
    }

    /// Spawn the send as its own task. The completion is posted to `events`
    /// when there is one; if the session has gone away it is dropped. The
    /// snapshot is attempted either way.
    pub fn spawn(
        &self,
        snapshot: BTreeMap<usize, String>,
        events: Option<mpsc::Sender<SessionEvent>>,
    ) -> JoinHandle<()> {
        let sink = Arc::clone(&self.sink);
        tokio::spawn(async move {
            let report = dispatch(sink.as_ref(), snapshot).await;
            let Some(events) = events else {
                debug!(sent = report.sent.len(), "No session to report to, dropping report");
                return;
            };
            if events
                .send(SessionEvent::TransferComplete(report))
                .await
                .is_err()
            {
                debug!("Session closed before transfer completed, dropping report");
            }
        })
    }
}

async fn dispatch<S: TransferSink>(sink: &S, snapshot: BTreeMap<usize, String>) -> DispatchReport {
    let mut report = DispatchReport::default();

    for (index, name) in snapshot {
        match sink.send_file(index, &name).await {
            Ok(bytes) => {
                debug!(index, file = %name, bytes, "File sent");
                report.sent.push(SentFile { index, name, bytes });
            }
            Err(e) => {
                warn!(index, file = %name, error = %e, "Best-effort transfer failed");
                report.failed.push(FailedFile {
                    index,
                    name,
                    error: e.to_string(),
                });
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Records the order files arrive in; fails any name starting with "bad".
    #[derive(Default)]
    struct RecordingSink {
        seen: Mutex<Vec<(usize, String)>>,
    }

    impl TransferSink for RecordingSink {
        async fn send_file(&self, index: usize, name: &str) -> Result<u64, TransferError> {
            self.seen.lock().unwrap().push((index, name.to_string()));
            if name.starts_with("bad") {
                Err(TransferError::NotFound(name.to_string()))
            } else {
                Ok(name.len() as u64)
            }
        }
    }

    fn snapshot(items: &[(usize, &str)]) -> BTreeMap<usize, String> {
        items.iter().map(|(i, n)| (*i, n.to_string())).collect()
    }

    async fn completion(
        dispatcher: &SendDispatcher<RecordingSink>,
        items: &[(usize, &str)],
    ) -> DispatchReport {
        let (tx, mut rx) = mpsc::channel(1);
        dispatcher.spawn(snapshot(items), Some(tx)).await.unwrap();
        match rx.recv().await {
            Some(SessionEvent::TransferComplete(report)) => report,
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_spawn_walks_index_order() {
        let dispatcher = SendDispatcher::new(RecordingSink::default());

        let report = completion(&dispatcher, &[(5, "e"), (0, "a"), (2, "c")]).await;

        let order: Vec<usize> = report.sent.iter().map(|f| f.index).collect();
        assert_eq!(order, vec![0, 2, 5]);
        assert_eq!(report.attempted(), 3);
        assert!(report.all_sent());
    }

    #[tokio::test]
    async fn test_failures_do_not_abort() {
        let dispatcher = SendDispatcher::new(RecordingSink::default());

        let report = completion(&dispatcher, &[(0, "a"), (1, "bad.txt"), (2, "ccc")]).await;

        assert_eq!(report.attempted(), 3);
        assert_eq!(report.sent.len(), 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].index, 1);
        assert_eq!(report.failed[0].error, "file not found: bad.txt");
        assert_eq!(report.total_bytes(), 4);
        assert!(!report.all_sent());
    }

    #[tokio::test]
    async fn test_spawn_without_session_still_sends() {
        let sink = RecordingSink::default();
        let dispatcher = SendDispatcher::new(sink);

        dispatcher
            .spawn(snapshot(&[(0, "a"), (1, "b")]), None)
            .await
            .unwrap();

        assert_eq!(dispatcher.sink.seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_spawn_posts_single_completion() {
        let dispatcher = SendDispatcher::new(RecordingSink::default());
        let (tx, mut rx) = mpsc::channel(4);

        dispatcher
            .spawn(snapshot(&[(0, "a"), (2, "c")]), Some(tx))
            .await
            .unwrap();

        match rx.recv().await {
            Some(SessionEvent::TransferComplete(report)) => {
                assert_eq!(report.sent.len(), 2);
                assert_eq!(report.sent[1].name, "c");
            }
            other => panic!("unexpected event: {:?}", other),
        }
        // The sender moved into the task is gone, so nothing else can arrive.
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_spawn_with_closed_session_is_silent() {
        let dispatcher = SendDispatcher::new(RecordingSink::default());
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        // Must complete without panicking.
        dispatcher.spawn(snapshot(&[(0, "a")]), Some(tx)).await.unwrap();
    }

    #[tokio::test]
    async fn test_root_sink() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), "hello").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        let sink = RootSink::new(dir.path());

        assert_eq!(sink.send_file(0, "a.txt").await.unwrap(), 5);
        assert!(matches!(
            sink.send_file(1, "gone.txt").await,
            Err(TransferError::NotFound(_))
        ));
        assert!(matches!(
            sink.send_file(2, "sub").await,
            Err(TransferError::NotAFile(_))
        ));
    }
}

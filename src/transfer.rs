//! Bulk parallel transfers between the local file system and the DFS.
//!
//! A fixed-size pool of workers drains a bounded job queue; each worker
//! performs whole file-level transfers through the composite client, so
//! nothing mutable is shared across files.

use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::fs::DfsClient;
use crate::path;

/// Receives transfer lifecycle events. Byte counts are cumulative per
/// file, reported as data flows through the counting stream wrappers.
pub trait ProgressListener: Send + Sync {
    fn started(&self, source: &str, destination: &str) {
        let _ = (source, destination);
    }
    fn bytes(&self, source: &str, transferred: u64) {
        let _ = (source, transferred);
    }
    fn completed(&self, result: &TransferResult) {
        let _ = result;
    }
    fn failed(&self, result: &TransferResult) {
        let _ = result;
    }
}

/// Outcome of one file-level transfer.
#[derive(Debug, Clone)]
pub struct TransferResult {
    pub source: String,
    pub destination: String,
    pub ok: bool,
    pub error: Option<String>,
    pub bytes: u64,
    pub elapsed_ms: u64,
}

/// All per-file outcomes of one bulk operation.
#[derive(Debug)]
pub struct TransferReport {
    pub results: Vec<TransferResult>,
}

impl TransferReport {
    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.ok).count()
    }

    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| !r.ok).count()
    }
}

/// Completion marker of a dispatched bulk operation.
pub struct TransferHandle {
    total: usize,
    join: JoinHandle<Vec<TransferResult>>,
}

impl TransferHandle {
    /// Number of file-level tasks dispatched.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Waits for every worker to finish and collects the report.
    pub async fn wait(self) -> Result<TransferReport> {
        let results =
            self.join.await.map_err(|e| Error::infra_with("transfer pool failed", e))?;
        Ok(TransferReport { results })
    }
}

#[derive(Debug, Copy, Clone)]
enum Direction {
    Upload,
    Download,
}

struct Job {
    source: String,
    destination: String,
    direction: Direction,
}

/// Fans independent file-level transfers across a worker pool.
pub struct TransferManager {
    client: Arc<DfsClient>,
    workers: usize,
    listener: Option<Arc<dyn ProgressListener>>,
}

impl TransferManager {
    /// `workers` is the fixed pool size; it must be at least 1.
    pub fn new(client: Arc<DfsClient>, workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(Error::InvalidArgument("worker pool size must be at least 1".into()));
        }
        Ok(TransferManager { client, workers, listener: None })
    }

    /// Attaches a progress listener to every subsequent operation.
    pub fn with_listener(mut self, listener: Arc<dyn ProgressListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Copies one local file to `remote`.
    pub fn upload(&self, local: impl Into<PathBuf>, remote: &str) -> Result<TransferHandle> {
        path::require_absolute(remote)?;
        let local = local.into();
        Ok(self.dispatch(vec![Job {
            source: local.to_string_lossy().into_owned(),
            destination: remote.to_string(),
            direction: Direction::Upload,
        }]))
    }

    /// Copies one remote file to `local`.
    pub fn download(&self, remote: &str, local: impl Into<PathBuf>) -> Result<TransferHandle> {
        path::require_absolute(remote)?;
        let local = local.into();
        Ok(self.dispatch(vec![Job {
            source: remote.to_string(),
            destination: local.to_string_lossy().into_owned(),
            direction: Direction::Download,
        }]))
    }

    /// Uploads every regular file directly inside `local_dir` (one level
    /// deep, no recursion) to `remote_dir`.
    pub async fn upload_directory(
        &self,
        local_dir: impl AsRef<Path>,
        remote_dir: &str,
    ) -> Result<TransferHandle> {
        path::require_absolute(remote_dir)?;
        let local_dir = local_dir.as_ref();
        let mut entries = tokio::fs::read_dir(local_dir).await.map_err(Error::CallerStream)?;
        let mut jobs = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(Error::CallerStream)? {
            let file_type = entry.file_type().await.map_err(Error::CallerStream)?;
            if !file_type.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            jobs.push(Job {
                source: entry.path().to_string_lossy().into_owned(),
                destination: path::join(remote_dir, &[&name])?,
                direction: Direction::Upload,
            });
        }
        Ok(self.dispatch(jobs))
    }

    /// Downloads every regular file directly inside `remote_dir` (one
    /// level deep, no recursion) into `local_dir`.
    pub async fn download_directory(
        &self,
        remote_dir: &str,
        local_dir: impl AsRef<Path>,
    ) -> Result<TransferHandle> {
        let entries = self.client.list(remote_dir).await?;
        let local_dir = local_dir.as_ref();
        let jobs = entries
            .into_iter()
            .filter(|summary| summary.is_file())
            .map(|summary| Job {
                destination: local_dir.join(&summary.name).to_string_lossy().into_owned(),
                source: summary.path,
                direction: Direction::Download,
            })
            .collect();
        Ok(self.dispatch(jobs))
    }

    fn dispatch(&self, jobs: Vec<Job>) -> TransferHandle {
        let total = jobs.len();
        let (tx, rx) = async_channel::bounded(total.max(1));
        for job in jobs {
            // Capacity covers every job, so this cannot fail.
            let _ = tx.try_send(job);
        }
        tx.close();

        let mut workers = Vec::with_capacity(self.workers);
        for _ in 0..self.workers {
            let rx = rx.clone();
            let client = Arc::clone(&self.client);
            let listener = self.listener.clone();
            workers.push(tokio::spawn(async move {
                let mut results = Vec::new();
                while let Ok(job) = rx.recv().await {
                    results.push(run_job(&client, listener.clone(), job).await);
                }
                results
            }));
        }

        let join = tokio::spawn(async move {
            let mut all = Vec::new();
            for worker in workers {
                match worker.await {
                    Ok(mut results) => all.append(&mut results),
                    Err(err) => warn!(error = %err, "transfer worker aborted"),
                }
            }
            all
        });
        TransferHandle { total, join }
    }
}

async fn run_job(
    client: &DfsClient,
    listener: Option<Arc<dyn ProgressListener>>,
    job: Job,
) -> TransferResult {
    if let Some(listener) = &listener {
        listener.started(&job.source, &job.destination);
    }
    let start = Instant::now();
    let outcome = match job.direction {
        Direction::Upload => upload_one(client, &listener, &job).await,
        Direction::Download => download_one(client, &listener, &job).await,
    };
    let elapsed_ms = start.elapsed().as_millis() as u64;
    let result = match outcome {
        Ok(bytes) => TransferResult {
            source: job.source,
            destination: job.destination,
            ok: true,
            error: None,
            bytes,
            elapsed_ms,
        },
        Err(err) => TransferResult {
            source: job.source,
            destination: job.destination,
            ok: false,
            error: Some(err.to_string()),
            bytes: 0,
            elapsed_ms,
        },
    };
    match (&listener, result.ok) {
        (Some(listener), true) => listener.completed(&result),
        (Some(listener), false) => listener.failed(&result),
        _ => {}
    }
    info!(
        source = %result.source,
        destination = %result.destination,
        ok = result.ok,
        bytes = result.bytes,
        "transfer finished"
    );
    result
}

async fn upload_one(
    client: &DfsClient,
    listener: &Option<Arc<dyn ProgressListener>>,
    job: &Job,
) -> Result<u64> {
    let file = tokio::fs::File::open(&job.source).await.map_err(Error::CallerStream)?;
    let mut reader = CountingReader {
        inner: file,
        count: 0,
        source: job.source.clone(),
        listener: listener.clone(),
    };
    client.copy_from_source(&job.destination, &mut reader).await
}

async fn download_one(
    client: &DfsClient,
    listener: &Option<Arc<dyn ProgressListener>>,
    job: &Job,
) -> Result<u64> {
    let file = tokio::fs::File::create(&job.destination).await.map_err(Error::CallerStream)?;
    let mut writer = CountingWriter {
        inner: file,
        count: 0,
        source: job.source.clone(),
        listener: listener.clone(),
    };
    let bytes = client.copy_to_sink(&job.source, &mut writer).await?;
    writer.inner.flush().await.map_err(Error::CallerStream)?;
    Ok(bytes)
}

/// Counts bytes flowing out of a local file on upload.
struct CountingReader<R> {
    inner: R,
    count: u64,
    source: String,
    listener: Option<Arc<dyn ProgressListener>>,
}

impl<R: AsyncRead + Unpin> AsyncRead for CountingReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let me = self.get_mut();
        let before = buf.filled().len();
        match Pin::new(&mut me.inner).poll_read(cx, buf) {
            Poll::Ready(Ok(())) => {
                let n = buf.filled().len() - before;
                if n > 0 {
                    me.count += n as u64;
                    if let Some(listener) = &me.listener {
                        listener.bytes(&me.source, me.count);
                    }
                }
                Poll::Ready(Ok(()))
            }
            other => other,
        }
    }
}

/// Counts bytes flowing into a local file on download.
struct CountingWriter<W> {
    inner: W,
    count: u64,
    source: String,
    listener: Option<Arc<dyn ProgressListener>>,
}

impl<W: AsyncWrite + Unpin> AsyncWrite for CountingWriter<W> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        let me = self.get_mut();
        match Pin::new(&mut me.inner).poll_write(cx, buf) {
            Poll::Ready(Ok(n)) => {
                me.count += n as u64;
                if let Some(listener) = &me.listener {
                    listener.bytes(&me.source, me.count);
                }
                Poll::Ready(Ok(n))
            }
            other => other,
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

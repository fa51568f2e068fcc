//! Bounded background analysis queue.
//!
//! Uploads submitted for asynchronous analysis go onto a bounded channel
//! consumed by a fixed number of worker tasks. A full channel rejects the
//! upload instead of spawning more work. Every job's progress is kept in a
//! shared status table that clients poll by id; finished records beyond
//! the configured cap are evicted oldest first.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, error, info};
use uuid::Uuid;

use invcheck_core::{AnalysisResult, InvoiceAnalyzer};

use super::confidence_log::LowConfidenceLog;

/// Job lifecycle as reported to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Completed {
        result: serde_json::Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        result_file: Option<String>,
    },
    Failed {
        error: String,
    },
}

/// A job's status together with the uploaded filename.
#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub job_id: Uuid,
    pub filename: String,
    #[serde(flatten)]
    pub status: JobStatus,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("Job queue is full")]
    QueueFull,

    #[error("Job queue is shut down")]
    Closed,
}

struct Job {
    id: Uuid,
    filename: String,
    bytes: Vec<u8>,
}

impl JobStatus {
    fn is_finished(&self) -> bool {
        matches!(self, JobStatus::Completed { .. } | JobStatus::Failed { .. })
    }
}

/// Job records by id. Queued and running jobs are always kept.
struct JobTable {
    records: HashMap<Uuid, JobRecord>,
    finished: VecDeque<Uuid>,
    max_finished: usize,
}

impl JobTable {
    fn new(max_finished: usize) -> Self {
        Self {
            records: HashMap::new(),
            finished: VecDeque::new(),
            max_finished: max_finished.max(1),
        }
    }

    fn insert(&mut self, record: JobRecord) {
        let id = record.job_id;
        let finished = record.status.is_finished();
        self.records.insert(id, record);

        if !finished {
            return;
        }
        self.finished.push_back(id);
        while self.finished.len() > self.max_finished {
            if let Some(old) = self.finished.pop_front() {
                self.records.remove(&old);
                debug!("Evicted job record {}", old);
            }
        }
    }

    fn remove(&mut self, id: &Uuid) {
        self.records.remove(id);
    }

    fn get(&self, id: &Uuid) -> Option<&JobRecord> {
        self.records.get(id)
    }
}

type StatusMap = Arc<RwLock<JobTable>>;

/// Handle to the queue; cheap to clone.
#[derive(Clone)]
pub struct JobQueue {
    sender: mpsc::Sender<Job>,
    statuses: StatusMap,
}

impl JobQueue {
    /// Spawn `workers` worker tasks on the current runtime.
    pub fn start(
        analyzer: Arc<InvoiceAnalyzer>,
        log: Arc<LowConfidenceLog>,
        results_dir: PathBuf,
        workers: usize,
        capacity: usize,
        max_records: usize,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        let statuses: StatusMap = Arc::new(RwLock::new(JobTable::new(max_records)));

        for worker in 0..workers.max(1) {
            let ctx = WorkerContext {
                analyzer: analyzer.clone(),
                log: log.clone(),
                results_dir: results_dir.clone(),
                statuses: statuses.clone(),
            };
            tokio::spawn(worker_loop(worker, receiver.clone(), ctx));
        }

        info!(
            "Job queue started: {} workers, capacity {}, keeping {} finished jobs",
            workers.max(1),
            capacity.max(1),
            max_records.max(1)
        );

        Self { sender, statuses }
    }

    /// Enqueue an upload without waiting for room.
    pub async fn submit(&self, filename: String, bytes: Vec<u8>) -> Result<Uuid, SubmitError> {
        let id = Uuid::new_v4();
        self.set(id, &filename, JobStatus::Queued).await;

        let job = Job {
            id,
            filename,
            bytes,
        };
        if let Err(e) = self.sender.try_send(job) {
            self.statuses.write().await.remove(&id);
            return Err(match e {
                mpsc::error::TrySendError::Full(_) => SubmitError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => SubmitError::Closed,
            });
        }

        debug!("Queued job {}", id);
        Ok(id)
    }

    pub async fn status(&self, id: Uuid) -> Option<JobRecord> {
        self.statuses.read().await.get(&id).cloned()
    }

    async fn set(&self, id: Uuid, filename: &str, status: JobStatus) {
        set_status(&self.statuses, id, filename, status).await;
    }
}

struct WorkerContext {
    analyzer: Arc<InvoiceAnalyzer>,
    log: Arc<LowConfidenceLog>,
    results_dir: PathBuf,
    statuses: StatusMap,
}

async fn set_status(statuses: &StatusMap, id: Uuid, filename: &str, status: JobStatus) {
    statuses.write().await.insert(JobRecord {
        job_id: id,
        filename: filename.to_string(),
        status,
    });
}

async fn worker_loop(worker: usize, receiver: Arc<Mutex<mpsc::Receiver<Job>>>, ctx: WorkerContext) {
    loop {
        let job = { receiver.lock().await.recv().await };
        let Some(job) = job else {
            debug!("Worker {} stopping: queue closed", worker);
            break;
        };

        let Job {
            id,
            filename,
            bytes,
        } = job;
        set_status(&ctx.statuses, id, &filename, JobStatus::Running).await;
        info!("Worker {} running job {} ({})", worker, id, filename);

        let analyzer = ctx.analyzer.clone();
        let log = ctx.log.clone();
        let results_dir = ctx.results_dir.clone();
        let name = filename.clone();

        let outcome = tokio::task::spawn_blocking(move || -> anyhow::Result<(AnalysisResult, PathBuf)> {
            let result = analyzer.analyze(&name, bytes)?;
            log.record_or_warn(&result);
            let path = write_result(&results_dir, &name, id, &result)?;
            Ok((result, path))
        })
        .await;

        let status = match outcome {
            Ok(Ok((result, path))) => {
                info!("Job {} completed, result written to {}", id, path.display());
                JobStatus::Completed {
                    result: serde_json::to_value(&result).unwrap_or_default(),
                    result_file: Some(path.display().to_string()),
                }
            }
            Ok(Err(e)) => {
                error!("Job {} ({}) failed: {:#}", id, filename, e);
                JobStatus::Failed {
                    error: e.to_string(),
                }
            }
            Err(e) => {
                error!("Job {} ({}) panicked: {}", id, filename, e);
                JobStatus::Failed {
                    error: "Internal error while analyzing the document".to_string(),
                }
            }
        };

        set_status(&ctx.statuses, id, &filename, status).await;
    }
}

/// Write `result` as `<stem>_<YYYYmmdd_HHMMSS>_<job>.json` under `dir`.
fn write_result(dir: &Path, filename: &str, id: Uuid, result: &AnalysisResult) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;

    let stem = Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("upload");
    let short_id = id.simple().to_string();
    let path = dir.join(format!(
        "{}_{}_{}.json",
        stem,
        Local::now().format("%Y%m%d_%H%M%S"),
        &short_id[..8]
    ));

    std::fs::write(&path, serde_json::to_string_pretty(result)?)?;
    Ok(path)
}

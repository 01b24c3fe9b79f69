//! File-backed broker. Each pool's queue is a JSON-lines file that survives
//! restarts; the in-memory copy is authoritative while the process runs.

use std::collections::{HashMap, VecDeque};
use std::fs::{create_dir_all, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::core::{Broker, BrokerError, BrokerReceipt, Job};

fn io_err(e: impl std::fmt::Display) -> BrokerError {
    BrokerError::Io(e.to_string())
}

/// JSON-lines broker rooted at a directory. Disk writes from `enqueue` run on
/// tokio's blocking pool so a caller's timeout can give up on them.
pub struct FileBroker {
    inner: Arc<FileQueues>,
}

struct FileQueues {
    dir: PathBuf,
    max_depth: usize,
    queues: Mutex<HashMap<String, VecDeque<Job>>>,
}

impl FileBroker {
    /// Open (or create) a broker directory, loading any queued jobs.
    pub fn open(dir: impl AsRef<Path>, max_depth: usize) -> Result<Self, BrokerError> {
        let dir = dir.as_ref().to_path_buf();
        create_dir_all(&dir).map_err(io_err)?;
        let inner = FileQueues {
            dir,
            max_depth,
            queues: Mutex::new(HashMap::new()),
        };
        inner.load_from_disk()?;
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Pop the oldest job for `pool` and persist the shortened queue.
    pub fn dequeue(&self, pool: &str) -> Result<Option<Job>, BrokerError> {
        self.inner.dequeue(pool)
    }
}

impl FileQueues {
    fn file_path(&self, pool: &str) -> PathBuf {
        self.dir.join(format!("{pool}.jsonl"))
    }

    fn load_from_disk(&self) -> Result<(), BrokerError> {
        let mut queues = self.queues.lock();
        for entry in std::fs::read_dir(&self.dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
                continue;
            }
            let Some(pool) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let file = OpenOptions::new().read(true).open(&path).map_err(io_err)?;
            let mut jobs = VecDeque::new();
            for line in BufReader::new(file).lines() {
                let line = line.map_err(io_err)?;
                if line.trim().is_empty() {
                    continue;
                }
                jobs.push_back(serde_json::from_str::<Job>(&line).map_err(io_err)?);
            }
            tracing::debug!(pool, jobs = jobs.len(), "restored queue from disk");
            queues.insert(pool.to_string(), jobs);
        }
        Ok(())
    }

    fn append_to_disk(&self, pool: &str, line: &str) -> Result<(), BrokerError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.file_path(pool))
            .map_err(io_err)?;
        writeln!(file, "{line}").map_err(io_err)
    }

    fn rewrite_disk(&self, pool: &str, jobs: &VecDeque<Job>) -> Result<(), BrokerError> {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(self.file_path(pool))
            .map_err(io_err)?;
        for job in jobs {
            let line = serde_json::to_string(job).map_err(io_err)?;
            writeln!(file, "{line}").map_err(io_err)?;
        }
        Ok(())
    }

    fn enqueue(&self, pool: &str, job: Job) -> Result<BrokerReceipt, BrokerError> {
        let line = serde_json::to_string(&job).map_err(io_err)?;
        let mut queues = self.queues.lock();
        let jobs = queues.entry(pool.to_string()).or_default();
        if jobs.len() >= self.max_depth {
            return Err(BrokerError::QueueFull(pool.to_string()));
        }
        self.append_to_disk(pool, &line)?;
        let broker_id = format!("{pool}:{}", job.id);
        jobs.push_back(job);
        Ok(BrokerReceipt {
            broker_id,
            position: jobs.len() as u64,
        })
    }

    fn dequeue(&self, pool: &str) -> Result<Option<Job>, BrokerError> {
        let mut queues = self.queues.lock();
        let Some(jobs) = queues.get_mut(pool) else {
            return Ok(None);
        };
        let job = jobs.pop_front();
        self.rewrite_disk(pool, jobs)?;
        Ok(job)
    }
}

#[async_trait]
impl Broker for FileBroker {
    async fn enqueue(&self, pool: &str, job: &Job) -> Result<BrokerReceipt, BrokerError> {
        let inner = Arc::clone(&self.inner);
        let pool = pool.to_string();
        let job = job.clone();
        tokio::task::spawn_blocking(move || inner.enqueue(&pool, job))
            .await
            .map_err(io_err)?
    }

    async fn queue_depth(&self, pool: &str) -> Result<u64, BrokerError> {
        Ok(self.inner.queues.lock().get(pool).map_or(0, VecDeque::len) as u64)
    }
}

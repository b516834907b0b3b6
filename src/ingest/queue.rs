// Background ingestion queue with a bounded channel for backpressure

use super::{IngestReport, IngestionPipeline};
use crate::embedding::EmbeddingProvider;
use crate::error::{FolioError, Result};
use crate::storage::{NoteRepository, ProcessingStatus};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{self, JoinSet};

/// Transcript waiting to be ingested
#[derive(Debug, Clone)]
pub struct IngestJob {
    pub note_id: i64,
    pub folder_id: i64,
    pub transcript: String,
}

/// Snapshot of queue counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub submitted: u64,
    pub succeeded: u64,
    pub failed: u64,
}

#[derive(Default)]
struct Counters {
    submitted: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> QueueStats {
        QueueStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Everything a job needs, shared by all jobs
struct JobContext {
    pipeline: Arc<IngestionPipeline>,
    notes: Arc<NoteRepository>,
    embedder: Arc<dyn EmbeddingProvider>,
}

/// Fire-and-forget ingestion
///
/// Jobs for different notes run concurrently on the blocking pool. Jobs for
/// the same note run one after another, in submission order. Outcomes are
/// logged and recorded as the note's processing status.
pub struct IngestQueue {
    job_tx: mpsc::Sender<IngestJob>,
    worker: Option<tokio::task::JoinHandle<()>>,
    counters: Arc<Counters>,
}

impl IngestQueue {
    /// Start the queue worker; must be called inside a tokio runtime
    pub fn start(
        pipeline: Arc<IngestionPipeline>,
        notes: Arc<NoteRepository>,
        embedder: Arc<dyn EmbeddingProvider>,
        capacity: usize,
    ) -> Self {
        let (job_tx, job_rx) = mpsc::channel(capacity.max(1));
        let counters = Arc::new(Counters::default());
        let context = Arc::new(JobContext {
            pipeline,
            notes,
            embedder,
        });

        let worker = Some(tokio::spawn(queue_worker(job_rx, context, counters.clone())));

        Self {
            job_tx,
            worker,
            counters,
        }
    }

    /// Queue a job, waiting while the queue is full
    pub async fn submit(&self, job: IngestJob) -> Result<()> {
        let note_id = job.note_id;
        self.job_tx
            .send(job)
            .await
            .map_err(|_| FolioError::Queue("ingestion queue is closed".to_string()))?;

        self.counters.submitted.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("Queued ingestion of note {}", note_id);
        Ok(())
    }

    /// Queue a job without waiting; fails when the queue is full
    pub fn try_submit(&self, job: IngestJob) -> Result<()> {
        let note_id = job.note_id;
        self.job_tx.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                FolioError::Queue(format!("ingestion queue is full, note {} rejected", note_id))
            }
            mpsc::error::TrySendError::Closed(_) => {
                FolioError::Queue("ingestion queue is closed".to_string())
            }
        })?;

        self.counters.submitted.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("Queued ingestion of note {}", note_id);
        Ok(())
    }

    pub fn stats(&self) -> QueueStats {
        self.counters.snapshot()
    }

    /// Stop accepting jobs and wait for every queued job to finish
    pub async fn shutdown(mut self) -> QueueStats {
        drop(self.job_tx);

        if let Some(handle) = self.worker.take() {
            tracing::info!("Waiting for ingestion queue to drain...");
            if let Err(e) = handle.await {
                tracing::error!("Ingestion queue worker stopped abnormally: {}", e);
            }
        }

        let stats = self.counters.snapshot();
        tracing::info!(
            "Ingestion queue drained: {} succeeded, {} failed",
            stats.succeeded,
            stats.failed
        );
        stats
    }
}

async fn queue_worker(
    mut job_rx: mpsc::Receiver<IngestJob>,
    context: Arc<JobContext>,
    counters: Arc<Counters>,
) {
    let mut tasks: JoinSet<Result<IngestReport>> = JoinSet::new();
    let mut task_notes: HashMap<task::Id, i64> = HashMap::new();
    let mut backlog: HashMap<i64, VecDeque<IngestJob>> = HashMap::new();

    loop {
        tokio::select! {
            Some(job) = job_rx.recv() => {
                // A note with a task in flight has an entry in the backlog
                match backlog.get_mut(&job.note_id) {
                    Some(waiting) => waiting.push_back(job),
                    None => {
                        backlog.insert(job.note_id, VecDeque::new());
                        spawn_job(&mut tasks, &mut task_notes, &context, job);
                    }
                }
            }

            Some(joined) = tasks.join_next_with_id(), if !tasks.is_empty() => {
                let (task_id, result) = match joined {
                    Ok((task_id, result)) => (task_id, result),
                    Err(e) => (
                        e.id(),
                        Err(FolioError::Queue(format!("ingestion task stopped abnormally: {}", e))),
                    ),
                };
                let Some(note_id) = task_notes.remove(&task_id) else {
                    tracing::error!("Ingestion task {} finished without a note", task_id);
                    continue;
                };

                match result {
                    Ok(report) => {
                        counters.succeeded.fetch_add(1, Ordering::Relaxed);
                        tracing::info!(
                            "Background ingestion of note {} stored {} chunks",
                            note_id,
                            report.stored
                        );
                    }
                    Err(e) => {
                        counters.failed.fetch_add(1, Ordering::Relaxed);
                        tracing::error!("Background ingestion of note {} failed: {}", note_id, e);
                        if matches!(e, FolioError::Queue(_)) {
                            // The job never got to record its own outcome
                            if let Err(e) = context
                                .notes
                                .set_processing_status(note_id, ProcessingStatus::Failed)
                            {
                                tracing::warn!("Could not mark note {} failed: {}", note_id, e);
                            }
                        }
                    }
                }

                match backlog.get_mut(&note_id).and_then(VecDeque::pop_front) {
                    Some(next) => spawn_job(&mut tasks, &mut task_notes, &context, next),
                    None => {
                        backlog.remove(&note_id);
                    }
                }
            }

            // Channel closed and nothing left running
            else => break,
        }
    }
}

fn spawn_job(
    tasks: &mut JoinSet<Result<IngestReport>>,
    task_notes: &mut HashMap<task::Id, i64>,
    context: &Arc<JobContext>,
    job: IngestJob,
) {
    let note_id = job.note_id;
    let context = context.clone();
    let handle = tasks.spawn_blocking(move || {
        run_tracked(
            &context.pipeline,
            &context.notes,
            context.embedder.as_ref(),
            &job,
        )
    });
    task_notes.insert(handle.id(), note_id);
}

/// Run a job, recording `processing` and then `done` or `failed` on the note
pub(crate) fn run_tracked(
    pipeline: &IngestionPipeline,
    notes: &NoteRepository,
    embedder: &dyn EmbeddingProvider,
    job: &IngestJob,
) -> Result<IngestReport> {
    notes.set_processing_status(job.note_id, ProcessingStatus::Processing)?;

    let result = pipeline.ingest(&job.transcript, job.note_id, job.folder_id, embedder);

    let status = if result.is_ok() {
        ProcessingStatus::Done
    } else {
        ProcessingStatus::Failed
    };
    if let Err(e) = notes.set_processing_status(job.note_id, status) {
        tracing::warn!(
            "Could not record status {} for note {}: {}",
            status,
            job.note_id,
            e
        );
    }

    result
}

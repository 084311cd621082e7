// THEORY:
// A single batch is always rendered sequentially, but independent batches have
// nothing in common and can run side by side. `ParallelPipeline` owns a small
// pool of tokio workers; each submitted request becomes one `BatchTask`, is
// dispatched round-robin to a worker, and is rendered on the blocking thread
// pool so the async runtime stays responsive.
//
// Every batch owns its own request (and so its own base image, mask and
// background). Events flow back over an unbounded channel per batch, in seed
// order. A worker never waits on a consumer, so a handle that is held but not
// drained cannot hold up the batches queued behind it; its events buffer
// instead. Dropping the receiving side, or cancelling the handle, stops the
// batch after the variant currently in progress.

use crate::error::Result;
use crate::pipeline::{BatchEvent, CancellationToken, VariantPipeline, VariantRequest, VariantResult};
use futures::Stream;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub struct BatchTask {
    pub batch_id: u64,
    pub request: VariantRequest,
    pub token: CancellationToken,
    pub event_sender: mpsc::UnboundedSender<Result<BatchEvent>>,
}

pub struct WorkerPool {
    task_sender: mpsc::UnboundedSender<BatchTask>,
    dispatcher: JoinHandle<()>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `worker_count` workers plus a dispatcher. Must be called inside a tokio runtime.
    pub fn new(worker_count: usize) -> Self {
        let worker_count = worker_count.max(1);
        let (task_sender, mut task_receiver) = mpsc::unbounded_channel::<BatchTask>();

        let (worker_senders, worker_receivers): (Vec<_>, Vec<_>) = (0..worker_count)
            .map(|_| mpsc::unbounded_channel::<BatchTask>())
            .unzip();

        // Spawn dispatcher
        let dispatcher = tokio::spawn(async move {
            let mut worker_idx = 0;
            while let Some(task) = task_receiver.recv().await {
                if let Err(mpsc::error::SendError(task)) = worker_senders[worker_idx].send(task) {
                    warn!(batch_id = task.batch_id, worker_idx, "worker is gone, dropping batch");
                }
                worker_idx = (worker_idx + 1) % worker_count;
            }
        });

        // Spawn workers
        let workers = worker_receivers
            .into_iter()
            .enumerate()
            .map(|(worker_idx, mut worker_receiver)| {
                tokio::spawn(async move {
                    while let Some(task) = worker_receiver.recv().await {
                        let batch_id = task.batch_id;
                        debug!(batch_id, worker_idx, "batch picked up");
                        if let Err(err) = tokio::task::spawn_blocking(move || Self::run_batch(task)).await {
                            warn!(batch_id, worker_idx, error = %err, "batch task panicked");
                        }
                    }
                })
            })
            .collect();

        Self {
            task_sender,
            dispatcher,
            workers,
        }
    }

    /// Renders one batch to completion, cancellation, or until nobody is listening.
    fn run_batch(task: BatchTask) {
        let BatchTask {
            batch_id,
            request,
            token,
            event_sender,
        } = task;

        let pipeline = match VariantPipeline::new(request) {
            Ok(pipeline) => pipeline,
            Err(err) => {
                let _ = event_sender.send(Err(err));
                return;
            }
        };

        for event in pipeline.run_with_cancellation(token) {
            if event_sender.send(event).is_err() {
                debug!(batch_id, "receiver dropped, stopping batch");
                return;
            }
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    fn dispatch(&self, task: BatchTask) -> std::result::Result<(), BatchTask> {
        self.task_sender.send(task).map_err(|mpsc::error::SendError(task)| task)
    }

    /// Stops accepting work and waits for running batches to finish.
    pub async fn shutdown(self) {
        drop(self.task_sender);
        let _ = self.dispatcher.await;
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}

/// Receiving side of one submitted batch.
pub struct BatchHandle {
    batch_id: u64,
    token: CancellationToken,
    receiver: mpsc::UnboundedReceiver<Result<BatchEvent>>,
}

impl BatchHandle {
    pub fn batch_id(&self) -> u64 {
        self.batch_id
    }

    /// Stops the batch before its next variant.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub async fn next_event(&mut self) -> Option<Result<BatchEvent>> {
        self.receiver.recv().await
    }

    /// The batch's events as a stream, ending after the terminal event.
    pub fn into_stream(self) -> impl Stream<Item = Result<BatchEvent>> + Send {
        futures::stream::unfold(self.receiver, |mut receiver| async move {
            receiver.recv().await.map(|event| (event, receiver))
        })
    }

    /// Waits for the whole batch and returns its variants in seed order.
    pub async fn collect_results(mut self) -> Result<Vec<VariantResult>> {
        let mut results = Vec::new();
        while let Some(event) = self.next_event().await {
            if let BatchEvent::Variant(result) = event? {
                results.push(result);
            }
        }
        Ok(results)
    }
}

/// Runs independent batches concurrently on a shared worker pool.
pub struct ParallelPipeline {
    worker_pool: WorkerPool,
    batch_counter: AtomicU64,
}

impl ParallelPipeline {
    /// One worker per CPU.
    pub fn new() -> Self {
        Self::with_workers(num_cpus::get())
    }

    pub fn with_workers(worker_count: usize) -> Self {
        Self {
            worker_pool: WorkerPool::new(worker_count),
            batch_counter: AtomicU64::new(0),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_pool.worker_count()
    }

    /// Number of batches submitted so far.
    pub fn submitted(&self) -> usize {
        self.batch_counter.load(Ordering::Relaxed) as usize
    }

    /// Validates `request` and queues it. Invalid requests are rejected here and never reach a worker.
    pub fn submit(&self, request: VariantRequest) -> Result<BatchHandle> {
        request.validate()?;
        let batch_id = self.batch_counter.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        let (event_sender, receiver) = mpsc::unbounded_channel();

        let task = BatchTask {
            batch_id,
            request,
            token: token.clone(),
            event_sender,
        };
        if let Err(task) = self.worker_pool.dispatch(task) {
            // Pool is shut down; the handle will simply report nothing.
            warn!(batch_id = task.batch_id, "worker pool is closed");
        }

        Ok(BatchHandle {
            batch_id,
            token,
            receiver,
        })
    }

    pub async fn shutdown(self) {
        self.worker_pool.shutdown().await;
    }
}

impl Default for ParallelPipeline {
    fn default() -> Self {
        Self::new()
    }
}

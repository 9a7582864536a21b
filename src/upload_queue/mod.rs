//! Upload Queue (§4.2): a process-wide FIFO with bounded concurrent workers,
//! fixed-delay retry, and a dead-letter directory for exhausted items.
//!
//! Grounded in the teacher's job dispatcher (`job_scheduling/job_queue_runner.rs`):
//! an `interval`-driven `tokio::select!` loop that pops work under a
//! concurrency bound and spawns each item's execution, with cancellation
//! draining in-flight workers before returning.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Semaphore};
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::UploadQueueConfig;
use crate::database::repositories::SegmentRepository;
use crate::storage::blob::BlobLayout;
use crate::storage::ObjectStore;

/// One pending replication of a local blob to the object store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadItem {
    pub local_path: String,
    pub object_key: String,
    pub content_type: String,
    pub segment_id: Option<i32>,
    #[serde(default)]
    pub retries: u32,
}

pub struct UploadQueue {
    queue: Mutex<VecDeque<UploadItem>>,
    in_flight: AtomicUsize,
    semaphore: Arc<Semaphore>,
    object_store: Arc<dyn ObjectStore>,
    blobs: sandboxed_file_manager::SandboxedManager,
    segments: Arc<SegmentRepository>,
    config: UploadQueueConfig,
}

impl UploadQueue {
    pub fn new(
        object_store: Arc<dyn ObjectStore>,
        blobs: sandboxed_file_manager::SandboxedManager,
        segments: Arc<SegmentRepository>,
        config: UploadQueueConfig,
    ) -> Arc<Self> {
        let workers = config.workers.max(1);
        Arc::new(Self {
            queue: Mutex::new(VecDeque::new()),
            in_flight: AtomicUsize::new(0),
            semaphore: Arc::new(Semaphore::new(workers)),
            object_store,
            blobs,
            segments,
            config,
        })
    }

    pub async fn enqueue(&self, item: UploadItem) {
        self.queue.lock().await.push_back(item);
    }

    pub async fn depth(&self) -> usize {
        self.queue.lock().await.len()
    }

    /// Drains the dead-letter directory back into the queue with
    /// `retries` reset to zero (§4.2, admin `retry-failed`).
    pub async fn retry_failed(self: &Arc<Self>) -> usize {
        let files = match self.blobs.list_files(BlobLayout::failed_uploads_dir()).await {
            Ok(files) => files,
            Err(e) => {
                warn!(error = %e, "failed to list dead-letter directory");
                return 0;
            }
        };

        let mut recovered = 0;
        for file in files {
            let Ok(bytes) = self.blobs.read(&file).await else {
                continue;
            };
            let Ok(mut item) = serde_json::from_slice::<UploadItem>(&bytes) else {
                warn!(file, "dead-letter entry is not a valid upload item, skipping");
                continue;
            };
            item.retries = 0;
            self.enqueue(item).await;
            if let Err(e) = self.blobs.remove_file(&file).await {
                warn!(file, error = %e, "failed to remove recovered dead-letter entry");
            }
            recovered += 1;
        }
        recovered
    }

    /// Runs the dispatcher loop until `cancellation_token` fires, then waits
    /// for in-flight workers to finish before returning.
    pub async fn run(self: Arc<Self>, cancellation_token: CancellationToken) {
        info!(workers = self.config.workers, "upload queue dispatcher starting");
        let mut tick = interval(Duration::from_secs(1));

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    self.dispatch_ready().await;
                }
                _ = cancellation_token.cancelled() => {
                    info!("upload queue received cancellation, draining in-flight workers");
                    self.wait_for_drain().await;
                    break;
                }
            }
        }
        info!("upload queue dispatcher stopped");
    }

    async fn dispatch_ready(self: &Arc<Self>) {
        loop {
            let permit = match self.semaphore.clone().try_acquire_owned() {
                Ok(permit) => permit,
                Err(_) => return,
            };
            let item = {
                let mut queue = self.queue.lock().await;
                queue.pop_front()
            };
            let Some(item) = item else {
                drop(permit);
                return;
            };

            self.in_flight.fetch_add(1, Ordering::SeqCst);
            let this = Arc::clone(self);
            tokio::spawn(async move {
                this.run_item(item).await;
                this.in_flight.fetch_sub(1, Ordering::SeqCst);
                drop(permit);
            });
        }
    }

    async fn run_item(self: &Arc<Self>, item: UploadItem) {
        debug!(object_key = %item.object_key, retries = item.retries, "uploading item");
        let bytes = match self.blobs.read(&item.local_path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(object_key = %item.object_key, error = %e, "failed to read local blob, treating as permanent failure");
                self.dead_letter(item).await;
                return;
            }
        };

        match self.object_store.put_bytes(&item.object_key, bytes, &item.content_type).await {
            Ok(()) => {
                if let Some(segment_id) = item.segment_id {
                    if let Err(e) = self.segments.set_s3_key(segment_id, &item.object_key).await {
                        error!(segment_id, error = %e, "failed to record object key on segment");
                    }
                }
                info!(object_key = %item.object_key, "upload succeeded");
            }
            Err(e) if e.is_transient() && item.retries < self.config.max_retries => {
                let mut next = item;
                next.retries += 1;
                warn!(object_key = %next.object_key, retries = next.retries, error = %e, "upload failed, retrying");
                let delay = Duration::from_secs(self.config.retry_delay_secs);
                let this = Arc::clone(self);
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    this.enqueue(next).await;
                });
            }
            Err(e) => {
                error!(object_key = %item.object_key, error = %e, "upload exhausted retries, moving to dead letter");
                self.dead_letter(item).await;
            }
        }
    }

    async fn dead_letter(&self, item: UploadItem) {
        let file_name = format!("{}{}.json", BlobLayout::failed_uploads_dir(), uuid::Uuid::new_v4());
        match serde_json::to_vec(&item) {
            Ok(bytes) => {
                if let Err(e) = self.blobs.write(&file_name, bytes).await {
                    error!(object_key = %item.object_key, error = %e, "failed to write dead-letter snapshot");
                }
            }
            Err(e) => error!(object_key = %item.object_key, error = %e, "failed to serialize dead-letter snapshot"),
        }
    }

    async fn wait_for_drain(&self) {
        const MAX_WAIT: Duration = Duration::from_secs(30);
        let started = tokio::time::Instant::now();
        while self.in_flight.load(Ordering::SeqCst) > 0 {
            if started.elapsed() > MAX_WAIT {
                warn!("upload queue drain timed out with workers still in flight");
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::StorageError;
    use async_trait::async_trait;
    use sea_orm::{DatabaseBackend, MockDatabase};

    struct AlwaysPermanentFail;

    #[async_trait]
    impl ObjectStore for AlwaysPermanentFail {
        async fn put_file(&self, _key: &str, _local_path: &std::path::Path, _content_type: &str) -> Result<(), StorageError> {
            Err(StorageError::permanent("bucket does not exist"))
        }
        async fn put_bytes(&self, _key: &str, _bytes: Vec<u8>, _content_type: &str) -> Result<(), StorageError> {
            Err(StorageError::permanent("bucket does not exist"))
        }
        async fn get_bytes(&self, _key: &str) -> Result<Vec<u8>, StorageError> {
            Err(StorageError::permanent("bucket does not exist"))
        }
        async fn delete(&self, _key: &str) -> Result<(), StorageError> {
            Ok(())
        }
        async fn delete_prefix(&self, _prefix: &str) -> Result<(), StorageError> {
            Ok(())
        }
        fn public_url(&self, key: &str) -> String {
            format!("https://example.invalid/{key}")
        }
    }

    async fn test_queue(config: UploadQueueConfig) -> (Arc<UploadQueue>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let blobs = sandboxed_file_manager::SandboxedManager::builder()
            .base_directory(dir.path())
            .build()
            .await
            .unwrap();
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();
        let segments = Arc::new(SegmentRepository::new(Arc::new(db)));
        let queue = UploadQueue::new(Arc::new(AlwaysPermanentFail), blobs, segments, config);
        (queue, dir)
    }

    #[tokio::test]
    async fn permanent_failure_is_dead_lettered_not_requeued() {
        let (queue, _dir) = test_queue(UploadQueueConfig {
            workers: 1,
            retry_delay_secs: 0,
            max_retries: 3,
        })
        .await;

        queue.blobs.write("channel.mp3", b"not really mp3 bytes".to_vec()).await.unwrap();
        queue
            .run_item(UploadItem {
                local_path: "channel.mp3".into(),
                object_key: "sessions/s1/ch01.mp3".into(),
                content_type: "audio/mpeg".into(),
                segment_id: None,
                retries: 0,
            })
            .await;

        assert_eq!(queue.depth().await, 0);
        let dead = queue.blobs.list_files(BlobLayout::failed_uploads_dir()).await.unwrap();
        assert_eq!(dead.len(), 1);
    }

    #[tokio::test]
    async fn retry_failed_drains_dead_letter_back_into_queue_with_retries_reset() {
        let (queue, _dir) = test_queue(UploadQueueConfig {
            workers: 1,
            retry_delay_secs: 0,
            max_retries: 0,
        })
        .await;

        queue
            .run_item(UploadItem {
                local_path: "missing.mp3".into(),
                object_key: "sessions/s1/ch02.mp3".into(),
                content_type: "audio/mpeg".into(),
                segment_id: None,
                retries: 5,
            })
            .await;
        assert_eq!(queue.blobs.list_files(BlobLayout::failed_uploads_dir()).await.unwrap().len(), 1);

        let recovered = queue.retry_failed().await;
        assert_eq!(recovered, 1);
        assert_eq!(queue.depth().await, 1);
        assert!(queue.blobs.list_files(BlobLayout::failed_uploads_dir()).await.unwrap().is_empty());

        let requeued = queue.queue.lock().await;
        assert_eq!(requeued.front().unwrap().retries, 0);
    }
}

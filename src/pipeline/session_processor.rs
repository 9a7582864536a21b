//! Session Processor (§4.6): drives every channel of a `complete` session
//! through the Channel Processor, then retires the work directory and
//! resolves final session status.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::database::entities::sessions::SessionStatus;
use crate::database::repositories::SessionRepository;
use crate::pipeline::channel_processor::ChannelProcessor;

#[derive(Debug, Error)]
pub enum SessionProcessError {
    #[error("session {0} not found")]
    NotFound(String),
    #[error("session {0} is already {1}")]
    InvalidState(String, SessionStatus),
    #[error("session {0} has no segments to process")]
    NoSegments(String),
}

pub struct SessionProcessResult {
    pub succeeded_channels: Vec<i32>,
    pub failed_channels: Vec<i32>,
    pub final_status: SessionStatus,
}

pub struct SessionProcessor {
    sessions: Arc<SessionRepository>,
    segments: Arc<crate::database::repositories::SegmentRepository>,
    channel_processor: Arc<ChannelProcessor>,
    work_root: PathBuf,
}

impl SessionProcessor {
    pub fn new(
        sessions: Arc<SessionRepository>,
        segments: Arc<crate::database::repositories::SegmentRepository>,
        channel_processor: Arc<ChannelProcessor>,
        work_root: PathBuf,
    ) -> Self {
        Self {
            sessions,
            segments,
            channel_processor,
            work_root,
        }
    }

    /// Processes every channel of `session_id` in turn, continuing past
    /// per-channel failures (§4.6 step 4). A session with at least one
    /// successful channel is `processed`; one with none is `failed`.
    pub async fn process(&self, session_id: &str) -> Result<SessionProcessResult, SessionProcessError> {
        let session = self
            .sessions
            .find_by_id(session_id)
            .await
            .map_err(|_| SessionProcessError::NotFound(session_id.to_string()))?
            .ok_or_else(|| SessionProcessError::NotFound(session_id.to_string()))?;

        if matches!(session.status, SessionStatus::Processing | SessionStatus::Processed) {
            return Err(SessionProcessError::InvalidState(session_id.to_string(), session.status));
        }

        let existing_segments = self
            .segments
            .find_by_session(session_id)
            .await
            .map_err(|_| SessionProcessError::NoSegments(session_id.to_string()))?;
        if existing_segments.is_empty() {
            if let Err(e) = self.sessions.set_status(session_id, SessionStatus::Failed).await {
                warn!(session_id, error = %e, "failed to mark segment-less session failed");
            }
            return Err(SessionProcessError::NoSegments(session_id.to_string()));
        }

        if let Err(e) = self.sessions.set_status(session_id, SessionStatus::Processing).await {
            warn!(session_id, error = %e, "failed to mark session processing");
        }

        let total_channels = session.channels as u32;
        let mut succeeded_channels = Vec::new();
        let mut failed_channels = Vec::new();

        for channel_number in 1..=session.channels {
            let report = self
                .channel_processor
                .process(session_id, channel_number, total_channels)
                .await;
            if report.success {
                succeeded_channels.push(channel_number);
            } else {
                failed_channels.push(channel_number);
            }
        }

        let session_dir = self.work_root.join(session_id);
        if let Err(e) = tokio::fs::remove_dir_all(&session_dir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(session_id, error = %e, "failed to purge session work directory");
            }
        }

        let final_status = if succeeded_channels.is_empty() {
            SessionStatus::Failed
        } else {
            SessionStatus::Processed
        };
        if let Err(e) = self.sessions.set_status(session_id, final_status).await {
            warn!(session_id, error = %e, "failed to set final session status");
        }

        info!(
            session_id,
            succeeded = succeeded_channels.len(),
            failed = failed_channels.len(),
            status = %final_status,
            "session processing complete"
        );

        Ok(SessionProcessResult {
            succeeded_channels,
            failed_channels,
            final_status,
        })
    }
}

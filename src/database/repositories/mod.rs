//! SeaORM repository implementations, one per Metadata Store table (§3).
//!
//! All work across SQLite, PostgreSQL, and MySQL through the same SeaORM
//! entity definitions.

pub mod annotation;
pub mod channel_setting;
pub mod pipeline_run;
pub mod processed_channel;
pub mod recording;
pub mod segment;
pub mod session;
pub mod traits;

pub use annotation::AnnotationRepository;
pub use channel_setting::ChannelSettingRepository;
pub use pipeline_run::PipelineRunRepository;
pub use processed_channel::{ChannelOutcome, ProcessedChannelRepository};
pub use recording::RecordingRepository;
pub use segment::{NewSegment, SegmentRepository};
pub use session::SessionRepository;

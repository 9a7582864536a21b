//! SeaORM entity definitions for the Metadata Store (§3).

pub mod annotations;
pub mod channel_settings;
pub mod pipeline_runs;
pub mod processed_channels;
pub mod recordings;
pub mod segments;
pub mod sessions;

pub mod prelude {
    pub use super::annotations::Entity as Annotations;
    pub use super::channel_settings::Entity as ChannelSettings;
    pub use super::pipeline_runs::Entity as PipelineRuns;
    pub use super::processed_channels::Entity as ProcessedChannels;
    pub use super::recordings::Entity as Recordings;
    pub use super::segments::Entity as Segments;
    pub use super::sessions::Entity as Sessions;
}

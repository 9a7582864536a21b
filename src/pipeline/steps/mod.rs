//! The Default Channel Pipeline: nine named Steps (§4.5).

mod analyze_audio;
mod concatenate;
mod encode_mp3;
mod extract_channel;
mod generate_hls;
mod generate_peaks;
mod normalize_audio;
mod prefetch_flac;
#[cfg(test)]
mod tests_support;
mod upload;

pub use analyze_audio::AnalyzeAudioStep;
pub use concatenate::ConcatenateStep;
pub use encode_mp3::EncodeMp3Step;
pub use extract_channel::ExtractChannelStep;
pub use generate_hls::GenerateHlsStep;
pub use generate_peaks::GeneratePeaksStep;
pub use normalize_audio::NormalizeAudioStep;
pub use prefetch_flac::PrefetchFlacStep;
pub use upload::{UploadHlsStep, UploadMp3Step, UploadPeaksStep};

use std::sync::Arc;

use crate::audio_toolbox::AudioToolbox;
use crate::config::{ObjectStoreConfig, PipelineConfig};
use crate::database::repositories::{ChannelSettingRepository, SegmentRepository};
use crate::pipeline::step::Step;
use crate::storage::ObjectStore;
use sandboxed_file_manager::SandboxedManager;

/// Collaborators shared by every Default Channel Pipeline step, grouped so
/// constructing the nine-step list doesn't require nine separate argument
/// lists.
#[derive(Clone)]
pub struct StepDeps {
    pub toolbox: Arc<dyn AudioToolbox>,
    pub blobs: SandboxedManager,
    pub object_store: Option<Arc<dyn ObjectStore>>,
    pub object_store_config: ObjectStoreConfig,
    pub segments: Arc<SegmentRepository>,
    pub channel_settings: Arc<ChannelSettingRepository>,
    pub config: PipelineConfig,
}

/// Builds the ordered, fixed Default Channel Pipeline (§4.5): nine named
/// steps, with the ninth ("upload") expanded into three concrete Steps, one
/// per artifact.
pub fn default_channel_pipeline(deps: StepDeps) -> Vec<Arc<dyn Step>> {
    vec![
        Arc::new(PrefetchFlacStep::new(deps.clone())),
        Arc::new(ExtractChannelStep::new(deps.clone())),
        Arc::new(ConcatenateStep::new(deps.clone())),
        Arc::new(AnalyzeAudioStep::new(deps.clone())),
        Arc::new(NormalizeAudioStep::new(deps.clone())),
        Arc::new(EncodeMp3Step::new(deps.clone())),
        Arc::new(GeneratePeaksStep::new(deps.clone())),
        Arc::new(GenerateHlsStep::new(deps.clone())),
        Arc::new(UploadMp3Step::new(deps.clone())),
        Arc::new(UploadPeaksStep::new(deps.clone())),
        Arc::new(UploadHlsStep::new(deps)),
    ]
}

/// The first five steps shared by every narrower regeneration variant: a
/// channel's audio has to be reconstituted from its source segments before
/// any downstream artifact can be regenerated, since work directories are
/// purged at the end of normal session processing.
fn reconstitution_steps(deps: &StepDeps) -> Vec<Arc<dyn Step>> {
    vec![
        Arc::new(PrefetchFlacStep::new(deps.clone())),
        Arc::new(ExtractChannelStep::new(deps.clone())),
        Arc::new(ConcatenateStep::new(deps.clone())),
        Arc::new(AnalyzeAudioStep::new(deps.clone())),
        Arc::new(NormalizeAudioStep::new(deps.clone())),
    ]
}

/// Narrower variant for `/session/regenerate-mp3` and
/// `/session/regenerate-mp3-channel`: rebuilds the mp3 master only.
pub fn mp3_only_pipeline(deps: StepDeps) -> Vec<Arc<dyn Step>> {
    let mut steps = reconstitution_steps(&deps);
    steps.push(Arc::new(EncodeMp3Step::new(deps.clone())));
    steps.push(Arc::new(UploadMp3Step::new(deps)));
    steps
}

/// Narrower variant for `/session/regenerate-peaks-channel`: rebuilds peaks
/// and the HLS rendition only. HLS is segmented from the encoded mp3 (§4.5
/// step 8), so this variant re-encodes the mp3 master too, but only uploads
/// peaks and HLS — the mp3 is a local intermediate here, not a published
/// artifact of this regeneration.
pub fn peaks_hls_only_pipeline(deps: StepDeps) -> Vec<Arc<dyn Step>> {
    let mut steps = reconstitution_steps(&deps);
    steps.push(Arc::new(EncodeMp3Step::new(deps.clone())));
    steps.push(Arc::new(GeneratePeaksStep::new(deps.clone())));
    steps.push(Arc::new(GenerateHlsStep::new(deps.clone())));
    steps.push(Arc::new(UploadPeaksStep::new(deps.clone())));
    steps.push(Arc::new(UploadHlsStep::new(deps)));
    steps
}

use std::sync::Arc;

use crate::adapters::{FfmpegAdapter, FsWindowsAdapter};
use crate::app::{convert_interactor::ConvertInteractor, track_pipeline::TrackPipeline};
use crate::domain::model::RunConfig;
use crate::ports::{FsPort, TranscodePort};

pub trait AppContainer: Send + Sync {
    fn track_pipeline(&self) -> Arc<TrackPipeline>;
    fn convert_interactor(&self) -> Arc<ConvertInteractor>;
}

/// Wires the ffmpeg/qaac and filesystem adapters into the interactors
pub struct DefaultAppContainer {
    track_pipeline: Arc<TrackPipeline>,
    convert_interactor: Arc<ConvertInteractor>,
}

impl DefaultAppContainer {
    pub fn new(config: RunConfig) -> Self {
        let transcode_port = Arc::new(FfmpegAdapter::new(config.tools.clone()));
        let fs_port = Arc::new(FsWindowsAdapter::new());
        Self::with_ports(config, transcode_port, fs_port)
    }

    pub fn with_ports(
        config: RunConfig,
        transcode_port: Arc<dyn TranscodePort>,
        fs_port: Arc<dyn FsPort>,
    ) -> Self {
        let track_pipeline = Arc::new(TrackPipeline::new(
            config.clone(),
            Arc::clone(&transcode_port),
            Arc::clone(&fs_port),
        ));

        let convert_interactor = Arc::new(ConvertInteractor::new(
            config,
            Arc::clone(&transcode_port),
            Arc::clone(&fs_port),
        ));

        Self {
            track_pipeline,
            convert_interactor,
        }
    }
}

impl AppContainer for DefaultAppContainer {
    fn track_pipeline(&self) -> Arc<TrackPipeline> {
        Arc::clone(&self.track_pipeline)
    }

    fn convert_interactor(&self) -> Arc<ConvertInteractor> {
        Arc::clone(&self.convert_interactor)
    }
}

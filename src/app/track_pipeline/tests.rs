use super::*;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use crate::adapters::FsWindowsAdapter;
use crate::domain::errors::FailureKind;
use crate::engine::NoProgress;
use crate::planner::SeekBounds;
use crate::ports::{DecodeStream, EncodeSink};

const FRAME: usize = 2352;

const CUE: &str = "PERFORMER \"Artist\"\r\n\
TITLE \"Album\"\r\n\
FILE \"disc.flac\" WAVE\r\n\
  TRACK 01 AUDIO\r\n\
    TITLE \"One\"\r\n\
    INDEX 01 00:00:00\r\n\
  TRACK 02 AUDIO\r\n\
    TITLE \"Two\"\r\n\
    INDEX 01 00:00:02\r\n\
  TRACK 03 AUDIO\r\n\
    TITLE \"Three\"\r\n\
    INDEX 01 00:00:05\r\n";

fn pattern(frames: usize) -> Vec<u8> {
    (0..frames * FRAME).map(|i| (i % 253) as u8).collect()
}

struct MemoryDecoder {
    data: Arc<Vec<u8>>,
    offset: usize,
    consumed: Arc<AtomicUsize>,
    /// End of stream carries a non-zero exit
    exit_failure: bool,
    terminate_failure: bool,
}

#[async_trait]
impl DecodeStream for MemoryDecoder {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, DomainError> {
        if self.exit_failure && self.offset == self.data.len() {
            return Err(DomainError::process("ffmpeg", "exited with exit status: 1"));
        }
        let n = buf.len().min(700).min(self.data.len() - self.offset);
        buf[..n].copy_from_slice(&self.data[self.offset..self.offset + n]);
        self.offset += n;
        self.consumed.fetch_add(n, Ordering::SeqCst);
        Ok(n)
    }

    async fn terminate(&mut self) -> Result<(), DomainError> {
        if self.terminate_failure {
            return Err(DomainError::process("ffmpeg", "exited with exit status: 1"));
        }
        Ok(())
    }
}

/// Encoder that writes whatever it received to its output on finish
struct FileSink {
    output: PathBuf,
    data: Vec<u8>,
    failing: bool,
}

#[async_trait]
impl EncodeSink for FileSink {
    async fn write_all(&mut self, buf: &[u8]) -> Result<(), DomainError> {
        if self.failing && !self.data.is_empty() {
            return Err(DomainError::process("ffmpeg", "broken pipe"));
        }
        self.data.extend_from_slice(buf);
        Ok(())
    }

    async fn finish(&mut self, _grace: Duration) -> Result<(), DomainError> {
        if self.failing {
            return Err(DomainError::process("ffmpeg", "exited with 1"));
        }
        std::fs::write(&self.output, &self.data).map_err(|e| DomainError::FsFail(e.to_string()))
    }
}

#[derive(Default)]
struct FakeTranscoder {
    pcm: Arc<Vec<u8>>,
    consumed: Arc<AtomicUsize>,
    decoders: AtomicUsize,
    wav_decodes: AtomicUsize,
    fail_title: Option<String>,
    decoder_exit_failure: bool,
    decoder_terminate_failure: bool,
    seeks: Mutex<Vec<SeekBounds>>,
}

impl FakeTranscoder {
    fn with_pcm(frames: usize) -> Self {
        Self {
            pcm: Arc::new(pattern(frames)),
            ..Self::default()
        }
    }
}

#[async_trait]
impl TranscodePort for FakeTranscoder {
    async fn spawn_decoder(
        &self,
        _source: &Path,
        _pcm: &PcmFormat,
    ) -> Result<Box<dyn DecodeStream>, DomainError> {
        self.decoders.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryDecoder {
            data: Arc::clone(&self.pcm),
            offset: 0,
            consumed: Arc::clone(&self.consumed),
            exit_failure: self.decoder_exit_failure,
            terminate_failure: self.decoder_terminate_failure,
        }))
    }

    async fn spawn_encoder(&self, job: &EncodeJob<'_>) -> Result<Box<dyn EncodeSink>, DomainError> {
        let failing = job
            .tags
            .iter()
            .any(|(tag, value)| *tag == MetadataTag::Title && Some(value) == self.fail_title.as_ref());
        Ok(Box::new(FileSink {
            output: job.output.clone(),
            data: Vec::new(),
            failing,
        }))
    }

    async fn run(&self, job: &EncodeJob<'_>) -> Result<(), DomainError> {
        if let EncodeInput::File { seek: Some(seek), .. } = &job.input {
            self.seeks.lock().unwrap().push(seek.clone());
            std::fs::write(&job.output, format!("{} {}", seek.start, seek.duration))
                .map_err(|e| DomainError::FsFail(e.to_string()))?;
        }
        Ok(())
    }

    async fn decode_to_wav(&self, _source: &Path, _wav: &Path) -> Result<(), DomainError> {
        self.wav_decodes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn disc(dir: &TempDir) -> PathBuf {
    std::fs::write(dir.path().join("disc.cue"), CUE).unwrap();
    let image = dir.path().join("disc.flac");
    std::fs::write(&image, b"").unwrap();
    image
}

fn config() -> RunConfig {
    RunConfig {
        pipeline: PipelineSettings {
            chunk_size: 1000,
            rename_attempts: 2,
            encoder_grace: Duration::from_millis(100),
        },
        ..RunConfig::default()
    }
}

/// Real filesystem with injectable rename and directory failures
#[derive(Default)]
struct FlakyFs {
    inner: FsWindowsAdapter,
    /// Renames that fail before one succeeds
    rename_failures: AtomicUsize,
    renames: AtomicUsize,
    /// 1-based `create_dir_all` call that fails
    failing_dir_call: Option<usize>,
    dir_calls: AtomicUsize,
}

#[async_trait]
impl FsPort for FlakyFs {
    async fn exists(&self, path: &Path) -> bool {
        self.inner.exists(path).await
    }

    async fn safe_alias(&self, path: &Path) -> PathBuf {
        self.inner.safe_alias(path).await
    }

    async fn create_dir_all(&self, path: &Path) -> Result<(), DomainError> {
        let call = self.dir_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.failing_dir_call == Some(call) {
            return Err(DomainError::DirectoryCreate {
                path: path.to_path_buf(),
                message: "access denied".to_string(),
            });
        }
        self.inner.create_dir_all(path).await
    }

    async fn temp_output_path(&self, final_dest: &Path, extension: &str) -> Result<PathBuf, DomainError> {
        self.inner.temp_output_path(final_dest, extension).await
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<(), DomainError> {
        self.renames.fetch_add(1, Ordering::SeqCst);
        let remaining = self.rename_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.rename_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(DomainError::FsFail("file in use".to_string()));
        }
        self.inner.rename(from, to).await
    }

    async fn remove_file(&self, path: &Path) -> Result<(), DomainError> {
        self.inner.remove_file(path).await
    }
}

fn pipeline(config: RunConfig, transcoder: &Arc<FakeTranscoder>) -> TrackPipeline {
    TrackPipeline::new(
        config,
        Arc::clone(transcoder) as Arc<dyn TranscodePort>,
        Arc::new(FsWindowsAdapter::new()),
    )
}

fn pipeline_on(config: RunConfig, transcoder: &Arc<FakeTranscoder>, fs: &Arc<FlakyFs>) -> TrackPipeline {
    TrackPipeline::new(
        config,
        Arc::clone(transcoder) as Arc<dyn TranscodePort>,
        Arc::clone(fs) as Arc<dyn FsPort>,
    )
}

fn temp_leftovers(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().starts_with(TEMP_PREFIX))
        .count()
}

#[tokio::test]
async fn test_each_track_gets_its_exact_byte_range() {
    let dir = TempDir::new().unwrap();
    let image = disc(&dir);
    let transcoder = Arc::new(FakeTranscoder::with_pcm(10));
    let pcm = pattern(10);

    let report = pipeline(config(), &transcoder)
        .extract(&image, &NoProgress)
        .await
        .unwrap();

    assert_eq!(report.renamed_count(), 3);
    assert!(report.tracks.iter().all(|t| !t.underrun));
    assert_eq!(transcoder.decoders.load(Ordering::SeqCst), 1);
    assert_eq!(std::fs::read(dir.path().join("01 One.mp3")).unwrap(), &pcm[..2 * FRAME]);
    assert_eq!(std::fs::read(dir.path().join("02 Two.mp3")).unwrap(), &pcm[2 * FRAME..5 * FRAME]);
    assert_eq!(std::fs::read(dir.path().join("03 Three.mp3")).unwrap(), &pcm[5 * FRAME..]);
    assert_eq!(report.bytes_streamed, pcm.len() as u64);
    assert_eq!(temp_leftovers(dir.path()), 0);
}

#[tokio::test]
async fn test_excluded_tracks_do_not_shift_offsets() {
    let dir = TempDir::new().unwrap();
    let image = disc(&dir);
    let transcoder = Arc::new(FakeTranscoder::with_pcm(10));
    let pcm = pattern(10);

    let config = RunConfig {
        selection: TrackSelection::parse("2").unwrap(),
        ..config()
    };
    let report = pipeline(config, &transcoder).extract(&image, &NoProgress).await.unwrap();

    assert_eq!(report.renamed_count(), 1);
    assert_eq!(report.skipped_count(), 2);
    assert_eq!(std::fs::read(dir.path().join("02 Two.mp3")).unwrap(), &pcm[2 * FRAME..5 * FRAME]);
    assert!(!dir.path().join("01 One.mp3").exists());
    assert!(!dir.path().join("03 Three.mp3").exists());
    // Nothing after the last selected track is read
    assert_eq!(transcoder.consumed.load(Ordering::SeqCst), 5 * FRAME);
}

#[tokio::test]
async fn test_rerun_over_complete_output_is_a_no_op() {
    let dir = TempDir::new().unwrap();
    let image = disc(&dir);
    let transcoder = Arc::new(FakeTranscoder::with_pcm(10));
    let pipeline = pipeline(config(), &transcoder);

    pipeline.extract(&image, &NoProgress).await.unwrap();
    let before = std::fs::read(dir.path().join("02 Two.mp3")).unwrap();

    let report = pipeline.extract(&image, &NoProgress).await.unwrap();
    assert_eq!(report.skipped_count(), 3);
    assert!(report.tracks.iter().all(|t| t.outcome
        == TrackOutcome::Skipped {
            reason: SkipReason::AlreadyPresent
        }));
    assert_eq!(transcoder.decoders.load(Ordering::SeqCst), 1);
    assert_eq!(std::fs::read(dir.path().join("02 Two.mp3")).unwrap(), before);
}

#[tokio::test]
async fn test_failed_encoder_keeps_later_tracks_aligned() {
    let dir = TempDir::new().unwrap();
    let image = disc(&dir);
    let transcoder = Arc::new(FakeTranscoder {
        fail_title: Some("Two".to_string()),
        ..FakeTranscoder::with_pcm(10)
    });
    let pcm = pattern(10);

    let report = pipeline(config(), &transcoder).extract(&image, &NoProgress).await.unwrap();

    assert!(report.has_failures());
    assert!(matches!(
        report.tracks[1].outcome,
        TrackOutcome::Failed {
            kind: FailureKind::ExternalProcess,
            ..
        }
    ));
    assert_eq!(report.tracks[1].bytes, 3 * FRAME as u64);
    assert!(!dir.path().join("02 Two.mp3").exists());
    assert_eq!(std::fs::read(dir.path().join("03 Three.mp3")).unwrap(), &pcm[5 * FRAME..]);
    assert_eq!(temp_leftovers(dir.path()), 0);
}

#[tokio::test]
async fn test_failed_decoder_leaves_no_output_behind() {
    let dir = TempDir::new().unwrap();
    let image = disc(&dir);
    let transcoder = Arc::new(FakeTranscoder {
        decoder_exit_failure: true,
        ..FakeTranscoder::with_pcm(0)
    });
    let pipeline = pipeline(config(), &transcoder);

    let report = pipeline.extract(&image, &NoProgress).await.unwrap();

    assert!(report.has_failures());
    assert_eq!(report.failed_count(), 3);
    assert!(report.tracks.iter().all(|t| matches!(
        t.outcome,
        TrackOutcome::Failed {
            kind: FailureKind::ExternalProcess,
            ..
        }
    )));
    assert!(!dir.path().join("01 One.mp3").exists());
    assert!(!dir.path().join("03 Three.mp3").exists());
    assert_eq!(temp_leftovers(dir.path()), 0);

    // Nothing was cached, so a second run decodes again
    pipeline.extract(&image, &NoProgress).await.unwrap();
    assert_eq!(transcoder.decoders.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_decoder_failure_mid_image_fails_the_remaining_tracks() {
    let dir = TempDir::new().unwrap();
    let image = disc(&dir);
    let transcoder = Arc::new(FakeTranscoder {
        decoder_exit_failure: true,
        ..FakeTranscoder::with_pcm(3)
    });
    let pcm = pattern(3);

    let report = pipeline(config(), &transcoder).extract(&image, &NoProgress).await.unwrap();

    assert_eq!(report.tracks[0].outcome, TrackOutcome::Renamed);
    assert_eq!(std::fs::read(dir.path().join("01 One.mp3")).unwrap(), &pcm[..2 * FRAME]);
    assert!(report.tracks[1].outcome.is_failed());
    assert!(report.tracks[2].outcome.is_failed());
    assert!(!dir.path().join("02 Two.mp3").exists());
    assert!(!dir.path().join("03 Three.mp3").exists());
    assert_eq!(temp_leftovers(dir.path()), 0);
}

#[tokio::test]
async fn test_decoder_failure_on_termination_is_reported() {
    let dir = TempDir::new().unwrap();
    let image = disc(&dir);
    let transcoder = Arc::new(FakeTranscoder {
        decoder_terminate_failure: true,
        ..FakeTranscoder::with_pcm(10)
    });

    let config = RunConfig {
        selection: TrackSelection::parse("1").unwrap(),
        ..config()
    };
    let report = pipeline(config, &transcoder).extract(&image, &NoProgress).await.unwrap();

    assert_eq!(report.renamed_count(), 1);
    assert!(report.decoder_error.is_some());
    assert!(report.has_failures());
}

#[tokio::test]
async fn test_rename_retries_until_the_file_is_released() {
    let dir = TempDir::new().unwrap();
    let image = disc(&dir);
    let transcoder = Arc::new(FakeTranscoder::with_pcm(10));
    let fs = Arc::new(FlakyFs {
        rename_failures: AtomicUsize::new(1),
        ..FlakyFs::default()
    });

    let config = RunConfig {
        selection: TrackSelection::parse("1").unwrap(),
        ..config()
    };
    let report = pipeline_on(config, &transcoder, &fs).extract(&image, &NoProgress).await.unwrap();

    assert_eq!(report.tracks[0].outcome, TrackOutcome::Renamed);
    assert_eq!(fs.renames.load(Ordering::SeqCst), 2);
    assert!(dir.path().join("01 One.mp3").is_file());
    assert_eq!(temp_leftovers(dir.path()), 0);
}

#[tokio::test]
async fn test_exhausted_rename_keeps_the_temporary_file() {
    let dir = TempDir::new().unwrap();
    let image = disc(&dir);
    let transcoder = Arc::new(FakeTranscoder::with_pcm(10));
    let fs = Arc::new(FlakyFs {
        rename_failures: AtomicUsize::new(usize::MAX),
        ..FlakyFs::default()
    });

    let config = RunConfig {
        selection: TrackSelection::parse("1").unwrap(),
        ..config()
    };
    let report = pipeline_on(config, &transcoder, &fs).extract(&image, &NoProgress).await.unwrap();

    assert!(matches!(
        report.tracks[0].outcome,
        TrackOutcome::Failed {
            kind: FailureKind::RenameRetryExhausted,
            ..
        }
    ));
    assert_eq!(fs.renames.load(Ordering::SeqCst), 2);
    assert!(!dir.path().join("01 One.mp3").exists());
    assert_eq!(temp_leftovers(dir.path()), 1);
}

#[tokio::test]
async fn test_directory_failure_on_one_track_keeps_the_next_aligned() {
    let dir = TempDir::new().unwrap();
    let image = disc(&dir);
    let transcoder = Arc::new(FakeTranscoder::with_pcm(10));
    let fs = Arc::new(FlakyFs {
        failing_dir_call: Some(2),
        ..FlakyFs::default()
    });
    let pcm = pattern(10);

    let report = pipeline_on(config(), &transcoder, &fs).extract(&image, &NoProgress).await.unwrap();

    assert!(matches!(
        report.tracks[1].outcome,
        TrackOutcome::Failed {
            kind: FailureKind::DirectoryCreate,
            ..
        }
    ));
    assert_eq!(report.tracks[1].bytes, 3 * FRAME as u64);
    assert_eq!(std::fs::read(dir.path().join("01 One.mp3")).unwrap(), &pcm[..2 * FRAME]);
    assert_eq!(std::fs::read(dir.path().join("03 Three.mp3")).unwrap(), &pcm[5 * FRAME..]);
    assert_eq!(temp_leftovers(dir.path()), 0);
}

#[tokio::test]
async fn test_short_stream_flags_underrun_but_not_on_final_track() {
    let dir = TempDir::new().unwrap();
    let image = disc(&dir);
    let transcoder = Arc::new(FakeTranscoder::with_pcm(3));

    let report = pipeline(config(), &transcoder).extract(&image, &NoProgress).await.unwrap();

    assert_eq!(report.renamed_count(), 3);
    assert!(!report.tracks[0].underrun);
    assert!(report.tracks[1].underrun);
    assert_eq!(report.tracks[1].bytes, FRAME as u64);
    assert!(!report.tracks[2].underrun);
}

#[tokio::test]
async fn test_seek_strategy_decodes_once_and_cuts_by_timestamp() {
    let dir = TempDir::new().unwrap();
    let image = disc(&dir);
    let transcoder = Arc::new(FakeTranscoder::default());

    let config = RunConfig {
        strategy: DecodeStrategy::Seek,
        ..config()
    };
    let report = pipeline(config, &transcoder).extract(&image, &NoProgress).await.unwrap();

    assert_eq!(report.renamed_count(), 3);
    assert_eq!(transcoder.decoders.load(Ordering::SeqCst), 0);
    assert_eq!(transcoder.wav_decodes.load(Ordering::SeqCst), 1);

    let seeks = transcoder.seeks.lock().unwrap();
    assert_eq!(seeks.len(), 3);
    assert_eq!(seeks[0].start_ms, 0);
    assert_eq!(seeks[1].start_ms, CueTime::from_frames(2).to_millis());
    assert_eq!(seeks[2].start_ms, CueTime::from_frames(5).to_millis());
    assert!(dir.path().join("03 Three.mp3").exists());
}

#[tokio::test]
async fn test_seek_strategy_skips_decode_when_nothing_selected() {
    let dir = TempDir::new().unwrap();
    let image = disc(&dir);
    let transcoder = Arc::new(FakeTranscoder::default());

    let config = RunConfig {
        strategy: DecodeStrategy::Seek,
        selection: TrackSelection::parse("7").unwrap(),
        ..config()
    };
    let report = pipeline(config, &transcoder).extract(&image, &NoProgress).await.unwrap();

    assert_eq!(report.skipped_count(), 3);
    assert_eq!(transcoder.wav_decodes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_destination_root_receives_tracks() {
    let dir = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let image = disc(&dir);
    let transcoder = Arc::new(FakeTranscoder::with_pcm(10));

    let config = RunConfig {
        dest_root: Some(out.path().to_path_buf()),
        preserve: 1,
        ..config()
    };
    let report = pipeline(config, &transcoder).extract(&image, &NoProgress).await.unwrap();

    assert_eq!(report.renamed_count(), 3);
    assert!(out.path().join("01 One.mp3").is_file());
    assert!(!dir.path().join("01 One.mp3").exists());
}

#[tokio::test]
async fn test_missing_cue_sheet_fails_the_image() {
    let dir = TempDir::new().unwrap();
    let image = dir.path().join("lonely.flac");
    std::fs::write(&image, b"").unwrap();
    let transcoder = Arc::new(FakeTranscoder::with_pcm(1));

    let result = pipeline(config(), &transcoder).extract(&image, &NoProgress).await;

    assert!(matches!(result, Err(DomainError::CueNotFound(_))));
    assert_eq!(transcoder.decoders.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_directory_sources_extract_every_image() {
    let root = TempDir::new().unwrap();
    for (album, image) in [("A", "disc.flac"), ("B", "disc.wav")] {
        let album = root.path().join(album);
        std::fs::create_dir_all(&album).unwrap();
        std::fs::write(album.join("disc.cue"), CUE).unwrap();
        std::fs::write(album.join(image), b"").unwrap();
    }
    std::fs::write(root.path().join("notes.txt"), b"").unwrap();

    let images = TrackPipeline::collect_images(root.path()).unwrap();
    assert_eq!(
        images,
        vec![root.path().join("A").join("disc.flac"), root.path().join("B").join("disc.wav")]
    );

    let transcoder = Arc::new(FakeTranscoder::with_pcm(10));
    let pipeline = pipeline(config(), &transcoder);
    for image in &images {
        let report = pipeline.extract(image, &NoProgress).await.unwrap();
        assert_eq!(report.renamed_count(), 3);
    }
    assert_eq!(transcoder.decoders.load(Ordering::SeqCst), 2);
    assert!(root.path().join("A").join("03 Three.mp3").is_file());
    assert!(root.path().join("B").join("03 Three.mp3").is_file());
}

#[test]
fn test_file_source_is_taken_as_given() {
    let images = TrackPipeline::collect_images(Path::new("Album.ape")).unwrap();
    assert_eq!(images, vec![PathBuf::from("Album.ape")]);
}

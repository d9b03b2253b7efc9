//! Command-line argument definitions

use std::path::PathBuf;

use clap::Args;

/// Output options shared by `extract` and `convert`
#[derive(Args, Debug, Clone, Default)]
pub struct EncodeOptions {
    /// Output format: mp3, ogg, opus, wma, aac, he-aac or any ffmpeg extension
    #[arg(short = 't', long = "type", env = "CUESPLIT_FORMAT")]
    pub format: Option<String>,

    /// Quality: a VBR factor or a bitrate, depending on the format
    #[arg(short, long, env = "CUESPLIT_QUALITY")]
    pub quality: Option<String>,

    /// Destination root (default: next to the source)
    #[arg(short, long, env = "CUESPLIT_DEST_DIR")]
    pub dest_dir: Option<PathBuf>,

    /// Trailing source path segments kept under the destination root
    #[arg(short, long)]
    pub preserve: Option<usize>,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the extract command
#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// Disc images to split, or directories searched for .ape, .flac and .wav images
    #[arg(required = true, num_args = 1..)]
    pub sources: Vec<PathBuf>,

    #[command(flatten)]
    pub encode: EncodeOptions,

    /// Metadata added to every track, as KEY=VALUE (repeatable)
    #[arg(short = 'm', long = "meta")]
    pub metadata: Vec<String>,

    /// Cue sheet to use instead of the one next to the image
    #[arg(short, long)]
    pub cue: Option<PathBuf>,

    /// Tracks to extract, e.g. "1,3,5" (default: all)
    #[arg(short = 'l', long = "list")]
    pub track_list: Option<String>,

    /// stream: one decoder piped into per-track encoders; seek: decode once, cut by timestamp
    #[arg(long, env = "CUESPLIT_STRATEGY")]
    pub strategy: Option<String>,
}

/// Arguments for the convert command
#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Directories (or single files) to convert
    #[arg(required = true, num_args = 1..)]
    pub dirs: Vec<PathBuf>,

    #[command(flatten)]
    pub encode: EncodeOptions,
}

/// Arguments for the inspect command
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Cue sheet to inspect
    pub cue: PathBuf,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

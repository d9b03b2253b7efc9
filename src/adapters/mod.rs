// Adapters - External system implementations

pub mod exec_ffmpeg;
pub mod fs_windows;
pub mod toml_config;

// Re-export adapters
pub use exec_ffmpeg::FfmpegAdapter;
pub use fs_windows::FsWindowsAdapter;
pub use toml_config::TomlConfigAdapter;

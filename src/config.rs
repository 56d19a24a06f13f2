//! Command line and application settings

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "trellis-viewer", version, about = "Scene graph viewer on wgpu")]
pub struct CliArgs {
    /// Wavefront OBJ file to show instead of the demo scene
    #[arg(long = "wf", value_name = "PATH")]
    pub wavefront: Option<PathBuf>,

    /// Initial window width
    #[arg(long, default_value_t = 800)]
    pub width: u32,

    /// Initial window height
    #[arg(long, default_value_t = 540)]
    pub height: u32,

    /// Present with vertical sync
    #[arg(long)]
    pub vsync: bool,

    /// Number of frames kept for the timing plots
    #[arg(long, default_value_t = 120)]
    pub stats_frames: usize,

    /// Edge length of the texture atlas built for OBJ models
    #[arg(long, default_value_t = 1024)]
    pub atlas_size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub vsync: bool,
    pub stats_frames: usize,
    pub atlas_size: u32,
    pub wavefront: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "trellis".to_string(),
            width: 800,
            height: 540,
            vsync: false,
            stats_frames: 120,
            atlas_size: 1024,
            wavefront: None,
        }
    }
}

impl From<CliArgs> for AppConfig {
    fn from(args: CliArgs) -> Self {
        Self {
            width: args.width.max(1),
            height: args.height.max(1),
            vsync: args.vsync,
            stats_frames: args.stats_frames.max(1),
            atlas_size: args.atlas_size.max(1),
            wavefront: args.wavefront,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::from(CliArgs::parse_from(["trellis-viewer"]));
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_wavefront_path_and_overrides() {
        let args = CliArgs::parse_from([
            "trellis-viewer",
            "--wf=assets/teapot.obj",
            "--width",
            "1280",
            "--vsync",
            "--atlas-size",
            "512",
        ]);
        let config = AppConfig::from(args);
        assert_eq!(config.wavefront, Some(PathBuf::from("assets/teapot.obj")));
        assert_eq!(config.width, 1280);
        assert_eq!(config.height, 540);
        assert!(config.vsync);
        assert_eq!(config.atlas_size, 512);
    }

    #[test]
    fn test_zero_sizes_are_clamped() {
        let config = AppConfig::from(CliArgs::parse_from([
            "trellis-viewer",
            "--stats-frames",
            "0",
            "--height",
            "0",
        ]));
        assert_eq!(config.stats_frames, 1);
        assert_eq!(config.height, 1);
    }

    #[test]
    fn test_rejects_unknown_flags() {
        assert!(CliArgs::try_parse_from(["trellis-viewer", "--fullscreen"]).is_err());
    }
}

use anyhow::Context;
use clap::Parser;
use dockcast::config::DockConfig;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dockcast")]
#[command(about = "Floating application dock with ad-hoc screen recording")]
#[command(version)]
struct Args {
    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory receiving recordings
    #[arg(long)]
    recordings_dir: Option<PathBuf>,

    /// Window list poll interval in milliseconds
    #[arg(long)]
    refresh_interval_ms: Option<u64>,

    /// Screen sampling interval in milliseconds
    #[arg(long)]
    frame_interval_ms: Option<u64>,

    /// Record without system audio
    #[arg(long)]
    no_system_audio: bool,

    /// Record without the microphone
    #[arg(long)]
    no_microphone: bool,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "dockcast=debug")]
    log_level: String,
}

impl Args {
    fn into_config(self) -> anyhow::Result<DockConfig> {
        let mut config = match &self.config {
            Some(path) => DockConfig::load(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => DockConfig::default(),
        };

        if let Some(dir) = self.recordings_dir {
            config.recordings_dir = dir;
        }
        if let Some(ms) = self.refresh_interval_ms {
            config.refresh_interval_ms = ms;
        }
        if let Some(ms) = self.frame_interval_ms {
            config.frame_interval_ms = ms;
        }
        if self.no_system_audio {
            config.capture_system_audio = false;
        }
        if self.no_microphone {
            config.capture_microphone = false;
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    dockcast::init_tracing(&args.log_level);

    let config = args.into_config()?;
    dockcast::run(config).await?;
    Ok(())
}

//! Aliyun OSS Uploadr - forum uploads to Aliyun Object Storage Service
//!
//! Runs the plugin's upload hooks from the command line.

use aliyun_oss_uploadr::config::{Config, NumericSetting};
use aliyun_oss_uploadr::plugin::AdminHeader;
use aliyun_oss_uploadr::upload::{FileDescriptor, ImageDescriptor};
use aliyun_oss_uploadr::{metrics, Plugin};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Aliyun OSS Uploadr - store forum images and files in Aliyun OSS
#[derive(Parser, Debug)]
#[command(name = "aliyun-oss-uploadr")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (settings are read from OSS_* variables when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Upload ceiling in KiB, overriding the configuration
    #[arg(long)]
    maximum_file_size: Option<String>,

    /// Edge length of resized remote images, overriding the configuration
    #[arg(long)]
    profile_image_dimension: Option<String>,

    /// Print Prometheus metrics after the command
    #[arg(long)]
    metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a file from disk
    UploadFile {
        path: PathBuf,
        /// Name reported back to the forum (defaults to the file name)
        #[arg(long)]
        name: Option<String>,
    },
    /// Upload an image from disk or resize and upload a remote one
    UploadImage {
        #[arg(long, conflicts_with = "url", required_unless_present = "url")]
        path: Option<PathBuf>,
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        name: Option<String>,
        /// Declared size in bytes for remote images
        #[arg(long, default_value_t = 0)]
        size: u64,
    },
    /// Print the admin navigation entry as JSON
    AdminMenu,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging on stderr; stdout carries results
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_level.to_lowercase()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .json()
        .init();

    info!("Starting Aliyun OSS Uploadr v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match args.config {
        Some(ref path) => {
            let config = Config::load(path)?;
            info!("Loaded configuration from {:?}", path);
            config
        }
        None => Config::from_env(),
    };
    if let Some(max) = args.maximum_file_size {
        config.uploads.maximum_file_size = Some(NumericSetting::Text(max));
    }
    if let Some(dimension) = args.profile_image_dimension {
        config.uploads.profile_image_dimension = Some(NumericSetting::Text(dimension));
    }
    config.validate()?;

    let plugin = Plugin::new(config)?;
    plugin.load();

    match args.command {
        Command::UploadFile { path, name } => {
            let size = file_size(&path).await;
            let result = plugin
                .upload_file(Some(FileDescriptor {
                    name,
                    path: Some(path),
                    size,
                }))
                .await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::UploadImage {
            path,
            url,
            name,
            size,
        } => {
            let size = match path {
                Some(ref p) => file_size(p).await,
                None => size,
            };
            let result = plugin
                .upload_image(Some(ImageDescriptor {
                    name,
                    path,
                    url,
                    size,
                }))
                .await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::AdminMenu => {
            let header = plugin.admin_menu(AdminHeader::default());
            println!("{}", serde_json::to_string_pretty(&header)?);
        }
    }

    plugin.deactivate();

    if args.metrics {
        print!("{}", metrics::gather());
    }

    Ok(())
}

/// Size on disk; a missing file reports 0 and fails later when read
async fn file_size(path: &Path) -> u64 {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.len())
        .unwrap_or(0)
}

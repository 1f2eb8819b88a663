use crate::constants::{DEFAULT_BATCH_SIZE, DEFAULT_EXTENSIONS};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "bulk-uploader",
    about = "Upload large image collections to a size-limited ingestion endpoint",
    long_about = "bulk-uploader sends every image in a directory to the bulk upload API in batches. \
                  When the server rejects a request as too large the batch size is halved and the \
                  same images are retried, so no image is skipped or sent twice. Read-only commands \
                  fetch previously uploaded data and consensus results.",
    version,
    after_help = "EXAMPLES:\n  \
    bulk-uploader upload ./images --url https://example.com --token TOKEN\n  \
    bulk-uploader upload ./images --url http://localhost:3000 --token TOKEN --batch-size 5\n  \
    bulk-uploader upload ./images --url https://example.com --token TOKEN --dry-run\n  \
    bulk-uploader list --url https://example.com --token TOKEN --include-data\n  \
    bulk-uploader consensus image001.jpg --url https://example.com --token TOKEN\n  \
    bulk-uploader consensus image001.jpg --url https://example.com --token TOKEN --crop ./image001.jpg --out ./cropped.jpg\n  \
    bulk-uploader export ./exports --url https://example.com --token TOKEN"
)]
pub struct Args {
    #[arg(short, long, global = true, help = "Only print errors")]
    pub quiet: bool,

    #[arg(short, long, global = true, help = "Print per-request details")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(
        about = "Upload all images in a directory",
        long_about = "Scan a directory for image files, encode them, and upload them in batches. \
                      Oversized batches are split automatically; other failures are counted and \
                      reported. Exits with status 1 if any image could not be prepared or uploaded."
    )]
    Upload {
        #[arg(help = "Directory containing images to upload")]
        directory: PathBuf,

        #[arg(
            long = "url",
            visible_alias = "api-url",
            help = "Base URL or full API endpoint",
            long_help = "Base URL of the server or the full bulk upload endpoint. \
                         /api/v1/images/upload-bulk is appended unless the URL already ends in /upload-bulk."
        )]
        url: String,

        #[arg(long, help = "API authentication token")]
        token: String,

        #[arg(
            short = 'b',
            long,
            default_value_t = DEFAULT_BATCH_SIZE,
            help = "Number of images per batch",
            long_help = "Initial number of images per request. Halved automatically whenever the \
                         server answers 413 Payload Too Large. Use smaller batches for remote servers."
        )]
        batch_size: usize,

        #[arg(
            short = 'e',
            long,
            num_args = 1..,
            default_values_t = default_extension_args(),
            help = "Image file extensions to include (case-insensitive)"
        )]
        extensions: Vec<String>,

        #[arg(long, help = "Optional participant ID; attaches empty crop/orientation lists")]
        user_id: Option<String>,

        #[arg(long, help = "List the files that would be uploaded without uploading")]
        dry_run: bool,

        #[arg(short, long, help = "Include images in subdirectories")]
        recursive: bool,

        #[arg(
            long,
            help = "Per-request timeout in seconds",
            long_help = "Per-request timeout in seconds (default: 300). A timed out batch is counted as failed."
        )]
        timeout: Option<u64>,
    },

    #[command(about = "List uploaded images, optionally with classification statistics")]
    List {
        #[arg(long = "url", visible_alias = "api-url", help = "Base URL of the server")]
        url: String,

        #[arg(long, help = "API authentication token")]
        token: String,

        #[arg(long, help = "Include crop, orientation and consensus data")]
        include_data: bool,
    },

    #[command(about = "Show stored crop and orientation data for one image")]
    Data {
        #[arg(help = "Image filename as uploaded")]
        filename: String,

        #[arg(long = "url", visible_alias = "api-url", help = "Base URL of the server")]
        url: String,

        #[arg(long, help = "API authentication token")]
        token: String,
    },

    #[command(about = "Show the consensus crop and orientation for one image")]
    Consensus {
        #[arg(help = "Image filename as uploaded")]
        filename: String,

        #[arg(long = "url", visible_alias = "api-url", help = "Base URL of the server")]
        url: String,

        #[arg(long, help = "API authentication token")]
        token: String,

        #[arg(
            long,
            value_name = "INPUT",
            requires = "out",
            help = "Local copy of the image to crop to the consensus box"
        )]
        crop: Option<PathBuf>,

        #[arg(long, value_name = "OUTPUT", requires = "crop", help = "Where to save the cropped image")]
        out: Option<PathBuf>,
    },

    #[command(
        about = "Export all classification data to JSON and CSV",
        long_about = "Fetch every image with its crop, orientation and consensus data and write \
                      classifications_<timestamp>.json (full data), classifications_summary_<timestamp>.csv \
                      (one row per image) and classifications_detailed_<timestamp>.csv (one row per \
                      participant per image) into the output directory."
    )]
    Export {
        #[arg(default_value = "exports", help = "Output directory (created if missing)")]
        output_dir: PathBuf,

        #[arg(long = "url", visible_alias = "api-url", help = "Base URL of the server")]
        url: String,

        #[arg(long, help = "API authentication token")]
        token: String,
    },
}

fn default_extension_args() -> Vec<String> {
    DEFAULT_EXTENSIONS.iter().map(|ext| ext.to_string()).collect()
}

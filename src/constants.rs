pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const MIN_BATCH_SIZE: usize = 1;

pub const DEFAULT_TIMEOUT_SECS: u64 = 300;
pub const API_TIMEOUT_SECS: u64 = 60;

/// Substituted when an image header cannot be decoded.
pub const FALLBACK_WIDTH: u32 = 1920;
pub const FALLBACK_HEIGHT: u32 = 1080;

pub const DEFAULT_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif", ".webp"];

pub const UPLOAD_BULK_SUFFIX: &str = "/upload-bulk";
pub const UPLOAD_BULK_PATH: &str = "/api/v1/images/upload-bulk";
pub const LIST_PATH: &str = "/api/v1/images/list";
pub const DATA_PATH: &str = "/api/v1/images/data";
pub const CONSENSUS_PATH: &str = "/api/consensus";

/// Chunk size the ingestion server uses internally; informational only.
pub const SERVER_CHUNK_SIZE: usize = 50;

/// Headroom kept free when checking whether encoded payloads fit in memory.
pub const MIN_AVAILABLE_MEMORY_MIB: u64 = 256;

pub const PROGRESS_BAR_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}";

pub const SUMMARY_RULE_WIDTH: usize = 60;

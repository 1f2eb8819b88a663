use crate::constants::{MIN_AVAILABLE_MEMORY_MIB, MIN_BATCH_SIZE, UPLOAD_BULK_PATH, UPLOAD_BULK_SUFFIX};
use crate::error::{Result, UploadError};
use crate::utils::encoded_len;
use reqwest::Url;
use std::fs;
use std::path::PathBuf;
use sysinfo::{MemoryRefreshKind, RefreshKind, System};

pub fn validate_batch_size(batch_size: usize) -> Result<usize> {
    if batch_size < MIN_BATCH_SIZE {
        return Err(UploadError::InvalidBatchSize(batch_size));
    }
    Ok(batch_size)
}

pub fn validate_token(token: &str) -> Result<()> {
    if token.trim().is_empty() {
        return Err(UploadError::MissingToken);
    }
    Ok(())
}

/// Only well-formed http(s) URLs with a host are accepted; anything else is
/// rejected before a client is built.
pub fn validate_url(url: &str) -> Result<()> {
    let invalid = || UploadError::InvalidUrl(url.to_string());
    let trimmed = url.trim();
    let rest = trimmed
        .strip_prefix("http://")
        .or_else(|| trimmed.strip_prefix("https://"))
        .ok_or_else(invalid)?;
    if rest.is_empty() || rest.starts_with('/') {
        return Err(invalid());
    }

    let parsed = Url::parse(trimmed).map_err(|_| invalid())?;
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(invalid());
    }
    Ok(())
}

/// Turns a base URL or a full endpoint into the bulk upload endpoint.
///
/// A URL already ending in `/upload-bulk` is used as is; otherwise trailing
/// slashes are removed and `/api/v1/images/upload-bulk` is appended.
pub fn resolve_upload_url(url: &str) -> String {
    let url = url.trim();
    if url.ends_with(UPLOAD_BULK_SUFFIX) {
        return url.to_string();
    }
    format!("{}{}", url.trim_end_matches('/'), UPLOAD_BULK_PATH)
}

/// Inverse of `resolve_upload_url` for the read-only endpoints.
pub fn resolve_base_url(url: &str) -> String {
    let url = url.trim().trim_end_matches('/');
    url.strip_suffix(UPLOAD_BULK_PATH)
        .unwrap_or(url)
        .trim_end_matches('/')
        .to_string()
}

/// Estimated size of all encoded payloads held in memory during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadEstimate {
    pub raw_bytes: u64,
    pub encoded_bytes: u64,
}

impl PayloadEstimate {
    pub fn encoded_mib(&self) -> u64 {
        self.encoded_bytes.div_ceil(1024 * 1024)
    }
}

/// Sums the on-disk sizes of `files` and the base64 size they will occupy.
/// Files whose metadata cannot be read are ignored here; preparation will
/// report them.
pub fn estimate_payload_memory(files: &[PathBuf]) -> PayloadEstimate {
    files
        .iter()
        .filter_map(|path| fs::metadata(path).ok())
        .fold(
            PayloadEstimate {
                raw_bytes: 0,
                encoded_bytes: 0,
            },
            |acc, meta| PayloadEstimate {
                raw_bytes: acc.raw_bytes + meta.len(),
                encoded_bytes: acc.encoded_bytes + encoded_len(meta.len()),
            },
        )
}

/// Returns the available memory in MiB when the estimate does not fit with
/// the configured headroom, `None` when it does.
pub fn check_available_memory(estimate: &PayloadEstimate) -> Option<u64> {
    // sysinfo 0.30+ returns bytes
    let mut sys = System::new_with_specifics(RefreshKind::new().with_memory(MemoryRefreshKind::new()));
    sys.refresh_memory();
    let available_mem_mib = sys.available_memory() / (1024 * 1024);

    if estimate.encoded_mib() + MIN_AVAILABLE_MEMORY_MIB > available_mem_mib {
        Some(available_mem_mib)
    } else {
        None
    }
}

use crate::constants::{FALLBACK_HEIGHT, FALLBACK_WIDTH};
use crate::error::PrepareError;
use crate::utils::create_progress_bar;
use crate::{verbose, warn};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::ImageReader;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// Transport-ready form of one image file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    pub filename: String,
    /// Base64 of the raw file bytes.
    pub image_data: String,
    pub width: u32,
    pub height: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crops: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orientations: Option<Vec<Value>>,
}

impl ImageRecord {
    pub fn new(filename: impl Into<String>, bytes: &[u8], width: u32, height: u32) -> Self {
        Self {
            filename: filename.into(),
            image_data: encode_payload(bytes),
            width,
            height,
            crops: None,
            orientations: None,
        }
    }

    /// Attaches empty crop/orientation lists, which registers the image for a participant.
    pub fn with_placeholders(mut self) -> Self {
        self.crops = Some(Vec::new());
        self.orientations = Some(Vec::new());
        self
    }

    pub fn payload_len(&self) -> usize {
        self.image_data.len()
    }
}

pub fn encode_payload(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub fn decode_payload(text: &str) -> std::result::Result<Vec<u8>, base64::DecodeError> {
    STANDARD.decode(text)
}

/// Reads the pixel dimensions from an in-memory image header.
///
/// Falls back to 1920x1080 when the format is unknown or the header is
/// unreadable. This never fails.
pub fn probe_dimensions(path: &Path, bytes: &[u8]) -> (u32, u32) {
    let probed = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(image::ImageError::IoError)
        .and_then(|reader| reader.into_dimensions());

    match probed {
        Ok((width, height)) if width > 0 && height > 0 => (width, height),
        Ok((width, height)) => {
            warn!(
                "Could not get dimensions for {}: reported {}x{}",
                path.display(),
                width,
                height
            );
            (FALLBACK_WIDTH, FALLBACK_HEIGHT)
        }
        Err(e) => {
            warn!("Could not get dimensions for {}: {}", path.display(), e);
            (FALLBACK_WIDTH, FALLBACK_HEIGHT)
        }
    }
}

/// Builds the upload record for one file.
///
/// # Arguments
/// * `path` - Image file to read
/// * `user_id` - When non-empty, the record carries empty crop/orientation lists
///
/// # Returns
/// * `Ok(ImageRecord)` - Encoded record, with fallback dimensions if probing failed
/// * `Err(PrepareError)` - If the file cannot be read or has no usable name
pub fn prepare_image_record(
    path: &Path,
    user_id: Option<&str>,
) -> std::result::Result<ImageRecord, PrepareError> {
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| PrepareError::InvalidFileName(path.to_path_buf()))?;

    let bytes = fs::read(path).map_err(|source| PrepareError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let (width, height) = probe_dimensions(path, &bytes);
    let record = ImageRecord::new(filename, &bytes, width, height);

    verbose!(
        "Prepared {} ({}x{}, {} encoded bytes)",
        filename,
        width,
        height,
        record.payload_len()
    );

    Ok(match user_id {
        Some(id) if !id.is_empty() => record.with_placeholders(),
        _ => record,
    })
}

#[derive(Debug)]
pub struct PreparationFailure {
    pub path: PathBuf,
    pub error: PrepareError,
}

impl PreparationFailure {
    pub fn filename(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

#[derive(Debug, Default)]
pub struct PreparedRecords {
    pub records: Vec<ImageRecord>,
    pub failures: Vec<PreparationFailure>,
}

/// Prepares every path in parallel, keeping the input order of the
/// successfully encoded records.
pub fn prepare_records(paths: &[PathBuf], user_id: Option<&str>) -> PreparedRecords {
    let progress = create_progress_bar(paths.len() as u64, "Preparing images");

    let outcomes: Vec<_> = paths
        .par_iter()
        .map(|path| {
            let outcome = prepare_image_record(path, user_id);
            progress.inc(1);
            (path, outcome)
        })
        .collect();

    progress.finish_and_clear();

    let mut prepared = PreparedRecords::default();
    for (path, outcome) in outcomes {
        match outcome {
            Ok(record) => prepared.records.push(record),
            Err(error) => {
                warn!("{}", error);
                prepared.failures.push(PreparationFailure {
                    path: path.clone(),
                    error,
                });
            }
        }
    }

    prepared
}

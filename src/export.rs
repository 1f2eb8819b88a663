use crate::api::{Crop, ImageListing, OrientationKind, StoredImage};
use crate::error::Result;
use crate::info;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

const SUMMARY_HEADER: [&str; 12] = [
    "filename",
    "width",
    "height",
    "submission_count",
    "consensus_crop_x",
    "consensus_crop_y",
    "consensus_crop_width",
    "consensus_crop_height",
    "consensus_orientation",
    "total_crops",
    "total_orientations",
    "unfits",
];

const DETAILED_HEADER: [&str; 9] = [
    "filename",
    "image_width",
    "image_height",
    "user_id",
    "crop_x",
    "crop_y",
    "crop_width",
    "crop_height",
    "orientation",
];

/// The three files written by one export run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPaths {
    pub json: PathBuf,
    pub summary_csv: PathBuf,
    pub detailed_csv: PathBuf,
}

impl ExportPaths {
    pub fn new(dir: &Path, timestamp: &str) -> Self {
        Self {
            json: dir.join(format!("classifications_{}.json", timestamp)),
            summary_csv: dir.join(format!("classifications_summary_{}.csv", timestamp)),
            detailed_csv: dir.join(format!("classifications_detailed_{}.csv", timestamp)),
        }
    }
}

#[derive(Debug)]
pub struct ExportReport {
    pub paths: ExportPaths,
    pub listing: ImageListing,
    /// Rows in the detailed CSV, one per participant per image.
    pub submission_rows: usize,
}

/// Local time formatted for export file names, e.g. `20240131_142500`.
pub fn export_timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

fn optional<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// One row per image: consensus box and orientation plus submission counts.
pub fn write_summary_csv<W: Write>(writer: W, images: &[StoredImage]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(SUMMARY_HEADER)?;

    for img in images {
        let crop = img.consensus_crop;
        wtr.write_record([
            img.filename.clone(),
            img.width.to_string(),
            img.height.to_string(),
            img.submission_count.to_string(),
            optional(crop.map(|c| c.x)),
            optional(crop.map(|c| c.y)),
            optional(crop.map(|c| c.width)),
            optional(crop.map(|c| c.height)),
            optional(img.consensus_orientation.map(|o| o.as_str())),
            img.crops.len().to_string(),
            img.orientations.len().to_string(),
            img.unfits.len().to_string(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

/// One row per participant per image, joining crops and orientations on
/// `user_id`. Participants are ordered by id within each image.
///
/// # Returns
/// * `Ok(usize)` - Number of data rows written
pub fn write_detailed_csv<W: Write>(writer: W, images: &[StoredImage]) -> Result<usize> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(DETAILED_HEADER)?;
    let mut rows = 0;

    for img in images {
        let mut by_user: BTreeMap<&str, (Option<&Crop>, Option<OrientationKind>)> = BTreeMap::new();
        for crop in &img.crops {
            by_user.entry(crop.user_id.as_str()).or_default().0 = Some(crop);
        }
        for orientation in &img.orientations {
            by_user.entry(orientation.user_id.as_str()).or_default().1 = Some(orientation.orientation);
        }

        for (user_id, (crop, orientation)) in by_user {
            wtr.write_record([
                img.filename.clone(),
                img.width.to_string(),
                img.height.to_string(),
                user_id.to_string(),
                optional(crop.map(|c| c.x)),
                optional(crop.map(|c| c.y)),
                optional(crop.map(|c| c.width)),
                optional(crop.map(|c| c.height)),
                optional(orientation.map(|o| o.as_str())),
            ])?;
            rows += 1;
        }
    }

    wtr.flush()?;
    Ok(rows)
}

/// Writes the raw listing as pretty JSON, then the summary and detailed CSVs,
/// into `dir` (created if missing).
///
/// # Arguments
/// * `raw` - Response body of the list endpoint with `include_data=true`
/// * `dir` - Output directory
/// * `timestamp` - Suffix shared by the three file names
pub fn export_classifications(raw: &Value, dir: &Path, timestamp: &str) -> Result<ExportReport> {
    let listing = ImageListing::deserialize(raw)?;
    fs::create_dir_all(dir)?;
    let paths = ExportPaths::new(dir, timestamp);

    info!("💾 Exporting to JSON: {}", paths.json.display());
    let mut json = BufWriter::new(File::create(&paths.json)?);
    serde_json::to_writer_pretty(&mut json, raw)?;
    json.flush()?;
    info!("✅ Exported {} images to {}", listing.images.len(), paths.json.display());

    info!("💾 Exporting summary to CSV: {}", paths.summary_csv.display());
    write_summary_csv(BufWriter::new(File::create(&paths.summary_csv)?), &listing.images)?;
    info!("✅ Exported {} images to {}", listing.images.len(), paths.summary_csv.display());

    info!("💾 Exporting detailed submissions to CSV: {}", paths.detailed_csv.display());
    let submission_rows =
        write_detailed_csv(BufWriter::new(File::create(&paths.detailed_csv)?), &listing.images)?;
    info!("✅ Exported detailed submission data to {}", paths.detailed_csv.display());

    Ok(ExportReport {
        paths,
        listing,
        submission_rows,
    })
}

use crate::constants::{CONSENSUS_PATH, DATA_PATH, LIST_PATH};
use crate::error::{Result, UploadError};
use crate::transport::build_http_client;
use crate::validation::{resolve_base_url, validate_token, validate_url};
use crate::verbose;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrientationKind {
    Side,
    Front,
}

impl OrientationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrientationKind::Side => "side",
            OrientationKind::Front => "front",
        }
    }
}

/// One participant's crop submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Crop {
    pub user_id: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// One participant's orientation submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Orientation {
    pub user_id: String,
    pub orientation: OrientationKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl CropBox {
    /// Pixel rectangle `(x, y, width, height)` clipped to an image of the
    /// given size, or `None` if nothing of the box lies inside it.
    pub fn to_pixels(&self, image_width: u32, image_height: u32) -> Option<(u32, u32, u32, u32)> {
        let x = self.x.max(0.0).round() as u32;
        let y = self.y.max(0.0).round() as u32;
        if x >= image_width || y >= image_height {
            return None;
        }

        let width = (self.width.max(0.0).round() as u32).min(image_width - x);
        let height = (self.height.max(0.0).round() as u32).min(image_height - y);
        if width == 0 || height == 0 {
            return None;
        }
        Some((x, y, width, height))
    }
}

/// Crops a local image to `crop` and saves it to `output`.
///
/// # Arguments
/// * `input` - Source image; any format the `image` crate can decode
/// * `output` - Destination; the format follows its extension
/// * `crop` - Box in source pixel coordinates
///
/// # Returns
/// * `Ok((width, height))` - Dimensions of the saved image
/// * `Err(UploadError)` - If the image cannot be read or written, or the box misses it
pub fn apply_consensus_crop(input: &Path, output: &Path, crop: &CropBox) -> Result<(u32, u32)> {
    let img = image::open(input)?;
    let (x, y, width, height) = crop.to_pixels(img.width(), img.height()).ok_or_else(|| {
        UploadError::InvalidCrop(format!(
            "box {}x{} at ({}, {}) lies outside {} ({}x{})",
            crop.width,
            crop.height,
            crop.x,
            crop.y,
            input.display(),
            img.width(),
            img.height()
        ))
    })?;

    img.crop_imm(x, y, width, height).save(output)?;
    verbose!("Saved {}x{} crop to {}", width, height, output.display());
    Ok((width, height))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unfit {
    pub user_id: String,
}

/// One image as returned by the list and data endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredImage {
    pub filename: String,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub crops: Vec<Crop>,
    #[serde(default)]
    pub orientations: Vec<Orientation>,
    #[serde(default)]
    pub unfits: Vec<Unfit>,
    #[serde(default)]
    pub consensus_crop: Option<CropBox>,
    #[serde(default)]
    pub consensus_orientation: Option<OrientationKind>,
    #[serde(default)]
    pub submission_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageListing {
    pub images: Vec<StoredImage>,
    #[serde(default)]
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Consensus {
    pub filename: String,
    pub image_width: u32,
    pub image_height: u32,
    pub consensus_crop: CropBox,
    pub consensus_orientation: OrientationKind,
    pub submission_count: usize,
    #[serde(default)]
    pub orientation_counts: BTreeMap<String, usize>,
}

/// Aggregate counts over a listing fetched with `include_data=true`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingStats {
    pub total: usize,
    pub with_crops: usize,
    pub with_orientations: usize,
    pub with_consensus: usize,
    pub with_unfits: usize,
    pub total_submissions: usize,
    pub front: usize,
    pub side: usize,
}

impl ListingStats {
    pub fn from_images(images: &[StoredImage]) -> Self {
        images.iter().fold(
            Self {
                total: images.len(),
                ..Self::default()
            },
            |mut stats, img| {
                stats.with_crops += usize::from(!img.crops.is_empty());
                stats.with_orientations += usize::from(!img.orientations.is_empty());
                stats.with_consensus += usize::from(img.consensus_crop.is_some());
                stats.with_unfits += usize::from(!img.unfits.is_empty());
                stats.total_submissions += img.submission_count;
                match img.consensus_orientation {
                    Some(OrientationKind::Front) => stats.front += 1,
                    Some(OrientationKind::Side) => stats.side += 1,
                    None => {}
                }
                stats
            },
        )
    }

    pub fn unclassified(&self) -> usize {
        self.total - self.front - self.side
    }

    pub fn average_submissions(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.total_submissions as f64 / self.total as f64
    }
}

#[derive(Debug, Clone)]
pub struct ApiOptions {
    pub base_url: String,
    pub token: String,
    pub timeout: Duration,
}

impl ApiOptions {
    /// Accepts either a base URL or the full upload endpoint.
    pub fn new(url: &str, token: impl Into<String>, timeout: Duration) -> Result<Self> {
        validate_url(url)?;
        let token = token.into();
        validate_token(&token)?;

        Ok(Self {
            base_url: resolve_base_url(url),
            token,
            timeout,
        })
    }
}

pub struct ApiClient {
    options: ApiOptions,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new(options: ApiOptions) -> Result<Self> {
        let client = build_http_client(options.timeout)?;
        Ok(Self { options, client })
    }

    pub fn base_url(&self) -> &str {
        &self.options.base_url
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = format!("{}{}", self.options.base_url, path);
        verbose!("GET {} {:?}", url, query);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.options.token)
            .query(query)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status == StatusCode::NOT_FOUND {
            let filename = query
                .iter()
                .find(|(key, _)| *key == "filename")
                .map(|(_, value)| value.to_string())
                .unwrap_or(url);
            return Err(UploadError::NotFound(filename));
        }
        if !status.is_success() {
            return Err(UploadError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }

    /// `GET /api/v1/images/list`, optionally with crop/orientation data.
    pub async fn list_images(&self, include_data: bool) -> Result<ImageListing> {
        if include_data {
            self.get_json(LIST_PATH, &[("include_data", "true")]).await
        } else {
            self.get_json(LIST_PATH, &[]).await
        }
    }

    /// Full listing with classification data, kept as raw JSON for archiving.
    pub async fn list_images_raw(&self) -> Result<Value> {
        self.get_json(LIST_PATH, &[("include_data", "true")]).await
    }

    /// `GET /api/v1/images/data?filename=`
    pub async fn image_data(&self, filename: &str) -> Result<StoredImage> {
        self.get_json(DATA_PATH, &[("filename", filename)]).await
    }

    /// `GET /api/consensus?filename=`; a 404 means no image or no crops yet.
    pub async fn consensus(&self, filename: &str) -> Result<Consensus> {
        self.get_json(CONSENSUS_PATH, &[("filename", filename)]).await
    }
}

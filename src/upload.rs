use crate::batch::BatchUploader;
use crate::constants::{DEFAULT_TIMEOUT_SECS, SERVER_CHUNK_SIZE, SUMMARY_RULE_WIDTH};
use crate::encoder::prepare_records;
use crate::error::{Result, UploadError};
use crate::scan::collect_image_files;
use crate::summary::UploadSummary;
use crate::transport::{HttpTransport, Transport};
use crate::utils::format_file_size;
use crate::validation::{
    check_available_memory, estimate_payload_memory, resolve_upload_url, validate_batch_size,
    validate_token, validate_url,
};
use crate::{info, verbose, warn};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Connection settings for the bulk upload endpoint.
#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub endpoint: String,
    pub token: String,
    pub batch_size: usize,
    pub timeout: Duration,
}

impl UploadOptions {
    /// Validates the settings and resolves `url` to the full upload endpoint.
    pub fn new(
        url: &str,
        token: impl Into<String>,
        batch_size: usize,
        timeout_secs: Option<u64>,
    ) -> Result<Self> {
        validate_url(url)?;
        let token = token.into();
        validate_token(&token)?;

        Ok(Self {
            endpoint: resolve_upload_url(url),
            token,
            batch_size: validate_batch_size(batch_size)?,
            timeout: Duration::from_secs(timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
        })
    }
}

/// Which files to pick up and how to describe them.
#[derive(Debug, Clone)]
pub struct UploadPlan {
    pub directory: PathBuf,
    /// Lowercase, without leading dots.
    pub extensions: Vec<String>,
    pub recursive: bool,
    pub user_id: Option<String>,
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparationFailureReport {
    pub filename: String,
    pub error: String,
}

#[derive(Debug, Clone, Default)]
pub struct UploadReport {
    pub candidates: usize,
    pub prepared: usize,
    pub preparation_failures: Vec<PreparationFailureReport>,
    /// `None` for a dry run.
    pub summary: Option<UploadSummary>,
}

impl UploadReport {
    fn dry_run(candidates: usize) -> Self {
        Self {
            candidates,
            ..Self::default()
        }
    }

    /// A run succeeds when every candidate was prepared and uploaded, and
    /// the run was not interrupted. A dry run always succeeds.
    pub fn is_success(&self) -> bool {
        let upload_ok = self
            .summary
            .as_ref()
            .map(|s| !s.has_failures() && !s.interrupted)
            .unwrap_or(true);
        upload_ok && self.preparation_failures.is_empty()
    }
}

/// Validates the directory and lists the files that match the plan.
pub fn discover_candidates(plan: &UploadPlan) -> Result<Vec<PathBuf>> {
    let files = collect_image_files(&plan.directory, &plan.extensions, plan.recursive)?;
    if files.is_empty() {
        return Err(UploadError::NoImageFilesFound {
            dir: plan.directory.clone(),
            extensions: plan
                .extensions
                .iter()
                .map(|ext| format!(".{}", ext))
                .collect::<Vec<_>>()
                .join(", "),
        });
    }
    Ok(files)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn print_dry_run(files: &[PathBuf]) {
    info!("\n🔍 Dry run - would upload:");
    for file in files {
        info!("  • {}", display_name(file));
    }
    info!("\nTotal: {} images", files.len());
}

/// Handles one CLI upload run against the HTTP endpoint.
///
/// # Returns
/// * `Ok(UploadReport)` - The run completed (possibly with per-item failures)
/// * `Err(UploadError)` - Nothing could be attempted: bad directory, no
///   matching files, or every file failed to prepare
pub fn run_upload(plan: &UploadPlan, options: &UploadOptions) -> Result<UploadReport> {
    info!("🌐 API Endpoint: {}", options.endpoint);

    let files = discover_candidates(plan)?;
    info!("📁 Found {} images in {}", files.len(), plan.directory.display());

    if plan.dry_run {
        print_dry_run(&files);
        return Ok(UploadReport::dry_run(files.len()));
    }

    let transport = HttpTransport::new(&options.endpoint, &options.token, options.timeout)?;
    upload_files(transport, &files, plan.user_id.as_deref(), options.batch_size)
}

/// Prepares `files` and uploads them through `transport`, then prints the summary.
pub fn upload_files<T: Transport>(
    transport: T,
    files: &[PathBuf],
    user_id: Option<&str>,
    batch_size: usize,
) -> Result<UploadReport> {
    let uploader = BatchUploader::new(transport, batch_size)?;

    let estimate = estimate_payload_memory(files);
    verbose!(
        "Estimated payload: {} on disk, {} encoded",
        format_file_size(estimate.raw_bytes),
        format_file_size(estimate.encoded_bytes)
    );
    if let Some(available_mib) = check_available_memory(&estimate) {
        warn!(
            "Encoded images need about {} MiB but only {} MiB is available",
            estimate.encoded_mib(),
            available_mib
        );
    }

    info!("\n📦 Preparing images...");
    let prepared = prepare_records(files, user_id);
    info!("✅ Prepared {} images", prepared.records.len());

    let preparation_failures: Vec<PreparationFailureReport> = prepared
        .failures
        .iter()
        .map(|failure| PreparationFailureReport {
            filename: failure.filename(),
            error: failure.error.to_string(),
        })
        .collect();

    if !preparation_failures.is_empty() {
        warn!("Warning: Failed to prepare {} images", preparation_failures.len());
    }
    if prepared.records.is_empty() {
        return Err(UploadError::NothingToUpload(files.len()));
    }

    info!("{}", "─".repeat(SUMMARY_RULE_WIDTH));
    verbose!("Server processes in chunks of {}", SERVER_CHUNK_SIZE);

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| UploadError::Runtime(format!("Failed to create runtime: {}", e)))?;
    let summary = runtime.block_on(uploader.upload_until(&prepared.records, interrupt_signal()));

    let report = UploadReport {
        candidates: files.len(),
        prepared: prepared.records.len(),
        preparation_failures,
        summary: Some(summary),
    };
    print_summary(&report);

    Ok(report)
}

/// Resolves on Ctrl-C. If the handler cannot be installed it never resolves.
async fn interrupt_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

pub fn print_summary(report: &UploadReport) {
    let Some(summary) = &report.summary else {
        return;
    };

    let rule = "=".repeat(SUMMARY_RULE_WIDTH);
    info!("\n{}", rule);
    info!("📊 Upload Summary");
    info!("{}", rule);
    info!("Total images processed: {}", report.prepared);
    info!("✅ Successful uploads: {}", summary.total_successful);
    info!("❌ Failed uploads: {}", summary.total_failed);

    if summary.interrupted {
        info!(
            "⏹️  Interrupted after {} of {} images",
            summary.total_resolved(),
            report.prepared
        );
    }

    if !report.preparation_failures.is_empty() {
        info!("⚠️  Failed to prepare: {}", report.preparation_failures.len());
        for failure in &report.preparation_failures {
            info!("  • {}: {}", failure.filename, failure.error);
        }
    }

    if report.is_success() {
        info!("\n🎉 Upload complete!");
    }
}

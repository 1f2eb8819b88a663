use anyhow::Context;
use bulk_uploader::api::{apply_consensus_crop, ApiClient, ApiOptions, ListingStats};
use bulk_uploader::cli::{Args, Commands};
use bulk_uploader::constants::API_TIMEOUT_SECS;
use bulk_uploader::export::{export_classifications, export_timestamp};
use bulk_uploader::logger::{set_quiet_mode, set_verbose_mode};
use bulk_uploader::scan::normalize_extensions;
use bulk_uploader::upload::{run_upload, UploadOptions, UploadPlan};
use bulk_uploader::utils::percentage;
use bulk_uploader::{error, info};
use clap::Parser;
use std::process::ExitCode;
use std::time::Duration;

fn main() -> ExitCode {
    let args = Args::parse();
    set_quiet_mode(args.quiet);
    set_verbose_mode(args.verbose);

    match run(args.command) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns whether the command fully succeeded.
fn run(command: Commands) -> anyhow::Result<bool> {
    match command {
        Commands::Upload {
            directory,
            url,
            token,
            batch_size,
            extensions,
            user_id,
            dry_run,
            recursive,
            timeout,
        } => {
            let options = UploadOptions::new(&url, token, batch_size, timeout)?;
            let plan = UploadPlan {
                directory,
                extensions: normalize_extensions(&extensions),
                recursive,
                user_id,
                dry_run,
            };
            let report = run_upload(&plan, &options)?;
            Ok(report.is_success())
        }
        Commands::List {
            url,
            token,
            include_data,
        } => {
            show_listing(&api_client(&url, token)?, include_data)?;
            Ok(true)
        }
        Commands::Data {
            filename,
            url,
            token,
        } => {
            let client = api_client(&url, token)?;
            let image = block_on(client.image_data(&filename))??;
            println!("{}", serde_json::to_string_pretty(&image)?);
            Ok(true)
        }
        Commands::Consensus {
            filename,
            url,
            token,
            crop,
            out,
        } => {
            let client = api_client(&url, token)?;
            let consensus = block_on(client.consensus(&filename))??;

            match (crop, out) {
                (Some(input), Some(output)) => {
                    let (width, height) =
                        apply_consensus_crop(&input, &output, &consensus.consensus_crop)
                            .with_context(|| format!("failed to crop {}", input.display()))?;
                    info!("✂️  Cropped {} with consensus data:", filename);
                    info!(
                        "  Crop: x={} y={} width={} height={}",
                        consensus.consensus_crop.x,
                        consensus.consensus_crop.y,
                        consensus.consensus_crop.width,
                        consensus.consensus_crop.height
                    );
                    info!("  Orientation: {}", consensus.consensus_orientation.as_str());
                    info!("  Based on {} submissions", consensus.submission_count);
                    info!("💾 Saved {}x{} image to {}", width, height, output.display());
                }
                _ => println!("{}", serde_json::to_string_pretty(&consensus)?),
            }
            Ok(true)
        }
        Commands::Export {
            output_dir,
            url,
            token,
        } => {
            let client = api_client(&url, token)?;
            info!("📥 Fetching all image data from {}...", client.base_url());
            let raw = block_on(client.list_images_raw())?
                .with_context(|| format!("failed to fetch image data from {}", client.base_url()))?;

            let report = export_classifications(&raw, &output_dir, &export_timestamp())?;
            print_statistics(&ListingStats::from_images(&report.listing.images));

            info!("✅ Export complete!");
            info!("\n📁 Files created:");
            info!("   • {} (full data)", report.paths.json.display());
            info!("   • {} (consensus summary)", report.paths.summary_csv.display());
            info!("   • {} (per-submission details)", report.paths.detailed_csv.display());
            Ok(true)
        }
    }
}

fn api_client(url: &str, token: String) -> anyhow::Result<ApiClient> {
    let options = ApiOptions::new(url, token, Duration::from_secs(API_TIMEOUT_SECS))?;
    Ok(ApiClient::new(options)?)
}

fn block_on<F: std::future::Future>(future: F) -> anyhow::Result<F::Output> {
    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    Ok(runtime.block_on(future))
}

fn show_listing(client: &ApiClient, include_data: bool) -> anyhow::Result<()> {
    info!("📥 Fetching image list from {}...", client.base_url());
    let listing = block_on(client.list_images(include_data))?
        .with_context(|| format!("failed to fetch image list from {}", client.base_url()))?;

    for image in &listing.images {
        println!("{}\t{}x{}", image.filename, image.width, image.height);
    }

    if !include_data {
        info!("\nTotal: {} images", listing.images.len());
        return Ok(());
    }

    print_statistics(&ListingStats::from_images(&listing.images));
    Ok(())
}

fn print_statistics(stats: &ListingStats) {
    let rule = "=".repeat(70);
    info!("\n{}", rule);
    info!("📊 Classification Statistics");
    info!("{}", rule);
    info!("Total images: {}", stats.total);
    info!(
        "Images with crop data: {} ({:.1}%)",
        stats.with_crops,
        percentage(stats.with_crops, stats.total)
    );
    info!(
        "Images with orientation data: {} ({:.1}%)",
        stats.with_orientations,
        percentage(stats.with_orientations, stats.total)
    );
    info!(
        "Images with consensus: {} ({:.1}%)",
        stats.with_consensus,
        percentage(stats.with_consensus, stats.total)
    );
    info!(
        "Images marked unfit: {} ({:.1}%)",
        stats.with_unfits,
        percentage(stats.with_unfits, stats.total)
    );
    info!("\nTotal submissions: {}", stats.total_submissions);
    info!("Average submissions per image: {:.2}", stats.average_submissions());
    info!("\nConsensus Orientations:");
    info!("  • Front: {} ({:.1}%)", stats.front, percentage(stats.front, stats.total));
    info!("  • Side: {} ({:.1}%)", stats.side, percentage(stats.side, stats.total));
    info!(
        "  • Unclassified: {} ({:.1}%)",
        stats.unclassified(),
        percentage(stats.unclassified(), stats.total)
    );
    info!("{}", rule);
}

//! Acquire command handler
//!
//! Builds an `AcquisitionConfig` from an optional TOML file and the command
//! line, picks the range source and runs the driver.

use crate::cli::AcquireArgs;
use anyhow::{Context, Result};
use ramcap::source::DEV_MEM;
use ramcap::{
    Acquisition, AcquisitionConfig, AcquisitionReport, DigestOutcome, ImageSource, IomemMap,
    PhysicalMemory, RangeOutcome, RangeSource,
};
use std::path::Path;

/// Handle the acquire command
pub fn handle(args: &AcquireArgs) -> Result<()> {
    let config = resolve_config(args)?
        .validate()
        .context("Invalid configuration")?;
    let source = open_source(args)?;

    let report = Acquisition::new(config)
        .run(&*source)
        .context("Acquisition failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }

    Ok(())
}

/// Merge the config file (if any) with command-line flags
///
/// Flags win; boolean flags can only switch a setting on.
pub fn resolve_config(args: &AcquireArgs) -> Result<AcquisitionConfig> {
    let mut config = match &args.config {
        Some(path) => AcquisitionConfig::load(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => AcquisitionConfig::default(),
    };

    if let Some(path) = &args.path {
        config.path = Some(path.clone());
    }
    if let Some(format) = &args.format {
        config.format = Some(format.clone());
    }
    if let Some(digest) = &args.digest {
        config.digest = Some(digest.clone());
    }
    if let Some(timeout) = args.timeout {
        config.timeout_ms = Some(timeout);
    }
    config.direct_io |= args.dio;
    config.localhost_only |= args.localhostonly;
    config.compress |= args.compress;
    config.pad_leading_gap |= args.pad_leading_gap;

    Ok(config)
}

/// Pick the memory to acquire: an image file or a memory device
pub fn open_source(args: &AcquireArgs) -> Result<Box<dyn RangeSource>> {
    if let Some(image) = &args.image {
        tracing::debug!("Reading from image {}", image.display());
        let source = match &args.iomem {
            Some(listing) => ImageSource::open(image, load_iomem(listing)?.into_ranges()),
            None => ImageSource::open_whole(image),
        }
        .with_context(|| format!("Failed to open image {}", image.display()))?;
        return Ok(Box::new(source));
    }

    let map = match &args.iomem {
        Some(listing) => load_iomem(listing)?,
        None => IomemMap::load().context("Failed to read /proc/iomem (are you root?)")?,
    };
    let device = args.device.as_deref().unwrap_or(Path::new(DEV_MEM));
    tracing::debug!("Reading {} ranges from {}", map.ranges().len(), device.display());
    let memory = PhysicalMemory::open_with(device, map)
        .with_context(|| format!("Failed to open {}", device.display()))?;
    Ok(Box::new(memory))
}

fn load_iomem(path: &Path) -> Result<IomemMap> {
    IomemMap::load_from(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn print_summary(report: &AcquisitionReport) {
    println!("Destination: {}", report.destination);
    print!("Format:      {}", report.format);
    if report.compressed {
        print!(" (zlib)");
    }
    println!();
    if let Some(mode) = report.write_mode {
        println!("Write mode:  {:?}", mode);
    }
    println!();

    for (index, range) in report.ranges.iter().enumerate() {
        let status = match &range.outcome {
            RangeOutcome::Complete => "ok".to_string(),
            RangeOutcome::Compensated => format!("{} pages zero-filled", range.failed_pages),
            RangeOutcome::TimedOut { at } => format!("timed out at {:#x}", at),
            RangeOutcome::Failed { at, error } => format!("failed at {:#x}: {}", at, error),
        };
        println!("  [{:>3}] {}  {}", index, range.range, status);
    }

    println!();
    println!(
        "Acquired {} ranges: {} bytes ({} on the wire, {} padding)",
        report.ranges.len(),
        report.logical_bytes,
        report.wire_bytes,
        report.padding_bytes
    );
    if report.pages_failed() > 0 || report.ranges_timed_out() > 0 {
        println!(
            "Warning: {} pages failed, {} ranges timed out",
            report.pages_failed(),
            report.ranges_timed_out()
        );
    }

    if !report.digest_matches_image() && !matches!(report.digest, DigestOutcome::Disabled) {
        println!(
            "Warning: digest covers {} bytes that were zero-filled in the image",
            report.digest_unwritten_bytes
        );
    }

    match &report.digest {
        DigestOutcome::Disabled => {}
        DigestOutcome::Written {
            algorithm,
            hex,
            destination,
        } => println!("{}: {} -> {}", algorithm, hex, destination),
        DigestOutcome::Failed { algorithm, reason } => {
            println!("{}: not written ({})", algorithm, reason)
        }
    }
}

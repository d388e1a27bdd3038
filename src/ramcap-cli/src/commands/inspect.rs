//! Inspect command handler
//!
//! Lists the ranges recorded in an uncompressed lime image.

use anyhow::{Context, Result};
use ramcap::{scan_structured, ScannedRange};
use std::fs::File;
use std::path::Path;

/// Handle the inspect command
pub fn handle(image: &Path) -> Result<()> {
    let ranges = scan(image)?;

    println!("{}: {} ranges", image.display(), ranges.len());
    println!();
    println!("  {:>5}  {:<37}  {:>14}  {:>12}", "#", "range", "size", "offset");
    for (index, scanned) in ranges.iter().enumerate() {
        println!(
            "  {:>5}  {:<37}  {:>14}  {:>#12x}",
            index,
            scanned.range.to_string(),
            scanned.range.len(),
            scanned.payload_offset
        );
    }

    let total: u64 = ranges.iter().map(|s| s.range.len()).sum();
    println!();
    println!("Total: {} bytes ({} MB)", total, total / 1_000_000);

    Ok(())
}

fn scan(image: &Path) -> Result<Vec<ScannedRange>> {
    let mut file =
        File::open(image).with_context(|| format!("Failed to open {}", image.display()))?;
    scan_structured(&mut file).with_context(|| format!("{} is not a valid lime image", image.display()))
}

//! Copying assets and package files into an export directory.

use anyhow::{Context, Result};
use log::debug;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::lockfile::PackageRecord;
use crate::runtime::Runtime;

/// What to do when the destination file already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CopyPolicy {
    pub overwrite: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOutcome {
    Copied,
    /// The destination existed and was replaced.
    Overwrote,
    /// The destination existed with the same content.
    SkippedIdentical,
    /// The destination existed with different content and was left alone.
    SkippedConflict,
}

/// Summary of a [`materialize_packages`] run.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MaterializeReport {
    pub copied: usize,
    pub overwritten: usize,
    pub skipped: usize,
    pub conflicts: Vec<PathBuf>,
}

impl MaterializeReport {
    pub fn record(&mut self, dest: &Path, outcome: CopyOutcome) {
        match outcome {
            CopyOutcome::Copied => self.copied += 1,
            CopyOutcome::Overwrote => self.overwritten += 1,
            CopyOutcome::SkippedIdentical => self.skipped += 1,
            CopyOutcome::SkippedConflict => {
                self.skipped += 1;
                self.conflicts.push(dest.to_path_buf());
            }
        }
    }
}

/// Copy `src` to `dest`, creating parent directories.
///
/// An existing `dest` whose bytes differ from `src` always produces a stale
/// export warning; `policy` decides whether it is then replaced.
#[tracing::instrument(skip(runtime))]
pub fn copy_file<R: Runtime>(
    runtime: &R,
    src: &Path,
    dest: &Path,
    policy: CopyPolicy,
) -> Result<CopyOutcome> {
    if runtime.exists(dest) {
        let identical = runtime.read(src)? == runtime.read(dest)?;
        if !identical {
            eprintln!(
                "\nSource and destination copies differ: {}\nThis is probably because your shinylive sources have been updated and differ from the copy in the exported app.\nYou probably should remove the export directory and re-export the application.",
                dest.display()
            );
        }

        if !policy.overwrite {
            debug!("Skipping {:?}", dest);
            return Ok(if identical {
                CopyOutcome::SkippedIdentical
            } else {
                CopyOutcome::SkippedConflict
            });
        }
        debug!("Overwriting {:?}", dest);
        runtime.remove_file(dest)?;
        copy_new(runtime, src, dest)?;
        return Ok(CopyOutcome::Overwrote);
    }

    copy_new(runtime, src, dest)?;
    Ok(CopyOutcome::Copied)
}

fn copy_new<R: Runtime>(runtime: &R, src: &Path, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        runtime.create_dir_all(parent)?;
    }
    runtime
        .copy(src, dest)
        .with_context(|| format!("Failed to copy {:?} to {:?}", src, dest))?;
    Ok(())
}

/// Copy each package's file from `<assets>/shinylive/pyodide` to `<dest>/shinylive/pyodide`.
///
/// A file name seen earlier in `records` is not copied twice.
#[tracing::instrument(skip(runtime, records))]
pub fn materialize_packages<R: Runtime>(
    runtime: &R,
    assets_dir: &Path,
    dest_dir: &Path,
    records: &[PackageRecord],
    policy: CopyPolicy,
) -> Result<MaterializeReport> {
    let src_dir = assets_dir.join("shinylive").join("pyodide");
    let out_dir = dest_dir.join("shinylive").join("pyodide");

    let mut report = MaterializeReport::default();
    let mut seen = HashSet::new();
    for record in records {
        if !seen.insert(record.file_name.as_str()) {
            continue;
        }
        let dest = out_dir.join(&record.file_name);
        let outcome = copy_file(runtime, &src_dir.join(&record.file_name), &dest, policy)?;
        report.record(&dest, outcome);
    }

    debug!(
        "Materialized {} package files ({} copied, {} skipped)",
        seen.len(),
        report.copied,
        report.skipped
    );
    Ok(report)
}

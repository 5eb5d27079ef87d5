//! Pre-scanner: expands `include_paths` globs against the project root
//! and feeds every match through the analyzer before resolution starts.
//!
//! The only place glob matching happens; the resolver itself never
//! globs.

use log::{debug, info};
use walkdir::WalkDir;

use crate::analyzer::FileAnalyzer;
use crate::diagnostics::Diagnostics;
use crate::error::{AnalyzeError, CoreError};
use crate::paths::{build_globset, PathResolver};
use crate::store::Store;

/// Analyze every file under the root matching `include_patterns` and
/// not matching `exclude_patterns`. Returns how many files were
/// analyzed or refreshed.
pub fn scan_include_paths(
    store: &mut Store,
    analyzer: &FileAnalyzer,
    paths: &PathResolver,
    include_patterns: &[String],
    exclude_patterns: &[String],
    diagnostics: &mut Diagnostics,
) -> Result<usize, CoreError> {
    if include_patterns.is_empty() {
        return Ok(0);
    }
    let include = build_globset(include_patterns)?;
    let exclude = build_globset(exclude_patterns)?;

    let mut scanned = 0;
    for entry in WalkDir::new(paths.root())
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = paths.relative_to_root(entry.path());
        if !include.is_match(&rel) || exclude.is_match(&rel) {
            continue;
        }
        match analyzer.analyze(store, entry.path(), diagnostics) {
            Ok(_) => {
                scanned += 1;
                if scanned % 500 == 0 {
                    info!("pre-scanned {scanned} files...");
                }
            }
            Err(AnalyzeError::NotPhp(path)) => {
                debug!("pre-scan skipped non-PHP file: {}", path.display());
            }
            Err(AnalyzeError::Store(err)) => return Err(CoreError::Store(err)),
            Err(err) => {
                diagnostics.warn(rel, None, format!("pre-scan failed: {err}"));
            }
        }
    }

    info!("pre-scan analyzed {scanned} files");
    Ok(scanned)
}

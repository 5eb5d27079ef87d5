//! Load-order computation: the closure walk turned into the plan the
//! emitter consumes.
//!
//! Ordering policy: dependees before dependents; scripts land where
//! their include edge demands; back edges are cut deterministically in
//! edge insertion order and reported, with extends/implements cycles
//! called out loudly because a class hierarchy cannot actually load
//! cyclically at runtime.

use std::collections::HashSet;

use log::warn;

use crate::autoload::AutoloadEngine;
use crate::diagnostics::Diagnostics;
use crate::error::CoreError;
use crate::store::{EdgeKind, FileKind, Store};

/// One file of the packed artifact, in load order.
#[derive(Debug, Clone)]
pub struct PlannedFile {
    pub id: i64,
    pub path: String,
    pub absolute_path: String,
    pub content: String,
    pub class_kind: FileKind,
    pub is_entry: bool,
    pub skip_ast: bool,
    pub ast_root: Option<i64>,
    /// Lines carrying require/include statements the resolver bound;
    /// the emitter elides them to avoid double-loading.
    pub resolved_include_lines: Vec<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct LoadPlan {
    /// Dependees first; the entry file is last.
    pub files: Vec<PlannedFile>,
    pub cycle_count: usize,
}

/// The boundary the packed-artifact writer implements. The core hands
/// over ordered files; how they are concatenated or rebuilt is not its
/// contract.
pub trait ArtifactEmitter {
    fn emit(&mut self, plan: &LoadPlan) -> Result<(), anyhow::Error>;
}

/// Compute the load order for the registered entry file.
pub fn load_order(store: &Store, diagnostics: &mut Diagnostics) -> Result<LoadPlan, CoreError> {
    let entry = store.entry_file()?.ok_or(CoreError::NoEntry)?;
    let closure = store.required_files_closure(entry.id)?;

    for cycle in &closure.cycles {
        let source = store
            .file_by_id(cycle.source_file_id)?
            .map(|f| f.path)
            .unwrap_or_else(|| cycle.source_file_id.to_string());
        let target = store
            .file_by_id(cycle.target_file_id)?
            .map(|f| f.path)
            .unwrap_or_else(|| cycle.target_file_id.to_string());
        if matches!(cycle.kind, EdgeKind::Extends | EdgeKind::Implements) {
            // Impossible at runtime; the output will parse but the
            // hierarchy is broken at the source.
            diagnostics.warn(
                source.clone(),
                None,
                format!(
                    "class hierarchy cycle: {} edge back to {target}",
                    cycle.kind.as_str()
                ),
            );
            warn!("hierarchy cycle {source} -> {target}");
        } else {
            diagnostics.warn(
                source.clone(),
                None,
                format!("dependency cycle broken at {} edge to {target}", cycle.kind.as_str()),
            );
        }
    }

    let mut planned = Vec::with_capacity(closure.files.len());
    let mut seen: HashSet<i64> = HashSet::new();

    // Always-loaded files (autoload `files` rules) come before anything
    // the graph demands, matching runtime autoloader behavior.
    let engine = AutoloadEngine::from_store(store)?;
    for path in engine.always_loaded_files() {
        if let Some(row) = store.file_by_path(path)? {
            if seen.insert(row.id) {
                planned.push(plan_file(store, row)?);
            }
        }
    }

    for file in closure.files {
        if seen.insert(file.id) {
            planned.push(plan_file(store, file)?);
        }
    }

    Ok(LoadPlan {
        files: planned,
        cycle_count: closure.cycles.len(),
    })
}

fn plan_file(store: &Store, row: crate::store::FileRow) -> Result<PlannedFile, CoreError> {
    let resolved_include_lines = store
        .edges_of(row.id)?
        .into_iter()
        .filter(|e| e.kind.is_include_like() && e.is_resolved)
        .map(|e| e.line)
        .collect();
    Ok(PlannedFile {
        id: row.id,
        path: row.path,
        absolute_path: row.absolute_path,
        content: row.raw_content.unwrap_or_default(),
        class_kind: row.class_kind,
        is_entry: row.is_entry,
        skip_ast: row.skip_ast,
        ast_root: row.ast_root,
        resolved_include_lines,
    })
}

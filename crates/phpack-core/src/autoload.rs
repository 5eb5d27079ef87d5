//! Autoload rule engine: maps fully-qualified names to candidate files.
//!
//! Resolution order, first hit wins: classmap entries, then prefix maps
//! sorted by (prefix length desc, priority desc), then legacy prefix
//! maps. `files` rules never resolve symbols; they are carried for the
//! emitter, which loads them unconditionally.
//!
//! Every candidate is verified before it is returned: the file must
//! actually declare the requested name in the expected namespace, so a
//! stale rule falls through to the next one instead of poisoning the
//! graph.

use std::path::PathBuf;

use log::{debug, warn};
use regex::Regex;
use serde_json::Value;
use walkdir::WalkDir;

use crate::error::StoreError;
use crate::paths::PathResolver;
use crate::store::{RuleKind, RuleRow, Store};
use crate::FileProvider;

/// Priority assigned to rules from the project configuration; external
/// (composer) rules sit below so project mappings win ties.
pub const CONFIG_RULE_PRIORITY: i64 = 200;
pub const EXTERNAL_RULE_PRIORITY: i64 = 100;

pub struct AutoloadEngine {
    rules: Vec<RuleRow>,
}

impl AutoloadEngine {
    /// Snapshot the rule table. Rules are written once at startup and
    /// read-only afterwards, so the snapshot stays valid for the run.
    pub fn from_store(store: &Store) -> Result<Self, StoreError> {
        Ok(Self {
            rules: store.autoload_rules_ordered()?,
        })
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Paths of `files` rules, in registration order.
    pub fn always_loaded_files(&self) -> Vec<&str> {
        let mut rules: Vec<&RuleRow> = self
            .rules
            .iter()
            .filter(|r| r.kind == RuleKind::Files)
            .collect();
        rules.sort_by_key(|r| r.id);
        rules.iter().map(|r| r.path.as_str()).collect()
    }

    /// Locate the file expected to define `fqn`.
    pub fn find_file_for_symbol(
        &self,
        fs: &dyn FileProvider,
        paths: &PathResolver,
        fqn: &str,
    ) -> Option<PathBuf> {
        let fqn = fqn.trim_start_matches('\\');

        for rule in self.rules.iter().filter(|r| r.kind == RuleKind::Classmap) {
            if rule.prefix.as_deref() == Some(fqn) {
                let candidate = paths.absolute_of(&rule.path);
                if fs.exists(&candidate) {
                    return Some(candidate);
                }
            }
        }

        // The rule snapshot is already ordered longest-prefix-first.
        for rule in self.rules.iter().filter(|r| r.kind == RuleKind::PrefixMap) {
            let Some(prefix) = rule.prefix.as_deref() else {
                continue;
            };
            let Some(suffix) = strip_prefix(fqn, prefix) else {
                continue;
            };
            let candidate = paths.absolute_of(&join_base(
                &rule.path,
                &format!("{}.php", suffix.replace('\\', "/")),
            ));
            if fs.exists(&candidate) && verify_definition(fs, &candidate, fqn) {
                return Some(candidate);
            }
        }

        for rule in self
            .rules
            .iter()
            .filter(|r| r.kind == RuleKind::LegacyPrefixMap)
        {
            if let Some(prefix) = rule.prefix.as_deref() {
                // Legacy prefixes may end in `_` rather than `\`.
                let prefix = prefix.trim_start_matches('\\').trim_end_matches('\\');
                if !fqn.starts_with(prefix) {
                    continue;
                }
            }
            // PSR-0: the whole FQN maps under the base dir, with
            // underscores in the class segment acting as separators.
            let (namespace, class) = match fqn.rsplit_once('\\') {
                Some((ns, class)) => (ns, class),
                None => ("", fqn),
            };
            let mut rel = String::new();
            if !namespace.is_empty() {
                rel.push_str(&namespace.replace('\\', "/"));
                rel.push('/');
            }
            rel.push_str(&class.replace('_', "/"));
            let candidate = paths.absolute_of(&join_base(&rule.path, &format!("{rel}.php")));
            if fs.exists(&candidate) && verify_definition(fs, &candidate, fqn) {
                return Some(candidate);
            }
        }

        None
    }
}

/// Join a rule's base directory to a relative candidate; an empty base
/// means the project root.
fn join_base(base: &str, rel: &str) -> String {
    let base = base.trim_end_matches('/');
    if base.is_empty() {
        rel.to_string()
    } else {
        format!("{base}/{rel}")
    }
}

fn strip_prefix<'a>(fqn: &'a str, prefix: &str) -> Option<&'a str> {
    let prefix = prefix.trim_start_matches('\\').trim_end_matches('\\');
    if prefix.is_empty() {
        return Some(fqn);
    }
    let rest = fqn.strip_prefix(prefix)?;
    rest.strip_prefix('\\')
}

/// Check that `path` really declares `fqn`: a class/interface/trait with
/// the right short name, in the right namespace. A cheap text scan, not
/// a parse; mismatches are logged and the caller tries the next rule.
pub fn verify_definition(fs: &dyn FileProvider, path: &std::path::Path, fqn: &str) -> bool {
    let Ok(content) = fs.read_file(path) else {
        return false;
    };
    let (namespace, short) = match fqn.rsplit_once('\\') {
        Some((ns, short)) => (ns, short),
        None => ("", fqn),
    };

    let decl = Regex::new(&format!(
        r"(?m)(^|\s)(abstract\s+|final\s+)?(class|interface|trait|enum)\s+{}(\s|\{{|$)",
        regex::escape(short)
    ))
    .ok();
    let Some(decl) = decl else { return false };
    if !decl.is_match(&content) {
        return false;
    }

    // A global-namespace symbol only needs the declaration itself.
    if namespace.is_empty() {
        return true;
    }

    let ns = Regex::new(&format!(
        r"(?m)namespace\s+{}\s*[;{{]",
        regex::escape(namespace)
    ))
    .ok();
    match ns {
        Some(ns) if ns.is_match(&content) => true,
        _ => {
            debug!("namespace mismatch in {}: wanted {namespace}", path.display());
            false
        }
    }
}

/// Register rules from a composer-style autoload section. Accepts either
/// a whole `composer.json` document or just its `autoload` object.
pub fn register_composer_autoload(
    store: &Store,
    paths: &PathResolver,
    fs: &dyn FileProvider,
    doc: &Value,
    priority: i64,
) -> Result<usize, StoreError> {
    let autoload = doc.get("autoload").unwrap_or(doc);
    let mut registered = 0;

    if let Some(map) = autoload.get("psr-4").and_then(Value::as_object) {
        for (prefix, target) in map {
            for dir in string_or_list(target) {
                store.add_autoload_rule(RuleKind::PrefixMap, Some(prefix), &dir, priority)?;
                registered += 1;
            }
        }
    }

    if let Some(map) = autoload.get("psr-0").and_then(Value::as_object) {
        for (prefix, target) in map {
            for dir in string_or_list(target) {
                store.add_autoload_rule(
                    RuleKind::LegacyPrefixMap,
                    Some(prefix),
                    &dir,
                    priority,
                )?;
                registered += 1;
            }
        }
    }

    if let Some(entries) = autoload.get("classmap").and_then(Value::as_array) {
        for entry in entries.iter().filter_map(Value::as_str) {
            registered += register_classmap_path(store, paths, fs, entry, priority)?;
        }
    }

    if let Some(entries) = autoload.get("files").and_then(Value::as_array) {
        for entry in entries.iter().filter_map(Value::as_str) {
            store.add_autoload_rule(RuleKind::Files, None, entry, priority)?;
            registered += 1;
        }
    }

    Ok(registered)
}

/// Expand one classmap config entry (a file or a directory tree) into
/// direct FQN-to-file rules, the way composer generates its classmap.
fn register_classmap_path(
    store: &Store,
    paths: &PathResolver,
    fs: &dyn FileProvider,
    entry: &str,
    priority: i64,
) -> Result<usize, StoreError> {
    let abs = paths.absolute_of(entry);
    let mut registered = 0;

    let mut files = Vec::new();
    if fs.is_directory(&abs) {
        for item in WalkDir::new(&abs).into_iter().filter_map(Result::ok) {
            if item.file_type().is_file()
                && item
                    .path()
                    .extension()
                    .is_some_and(|e| e.eq_ignore_ascii_case("php"))
            {
                files.push(item.path().to_path_buf());
            }
        }
        files.sort();
    } else if fs.exists(&abs) {
        files.push(abs);
    } else {
        warn!("classmap path does not exist: {entry}");
        return Ok(0);
    }

    for file in files {
        let Ok(content) = fs.read_file(&file) else {
            continue;
        };
        for fqn in scan_definitions(&content) {
            let rel = paths.relative_to_root(&file);
            store.add_autoload_rule(RuleKind::Classmap, Some(&fqn), &rel, priority)?;
            registered += 1;
        }
    }
    Ok(registered)
}

/// Scan source text for type declarations and return their FQNs.
fn scan_definitions(content: &str) -> Vec<String> {
    let ns_re = Regex::new(r"(?m)^\s*namespace\s+([^;{\s]+)\s*[;{]").expect("static pattern");
    let decl_re = Regex::new(
        r"(?m)^\s*(?:abstract\s+|final\s+)?(?:class|interface|trait|enum)\s+(\w+)",
    )
    .expect("static pattern");

    let namespace = ns_re
        .captures(content)
        .map(|c| c[1].to_string())
        .unwrap_or_default();

    decl_re
        .captures_iter(content)
        .map(|c| {
            if namespace.is_empty() {
                c[1].to_string()
            } else {
                format!("{namespace}\\{}", &c[1])
            }
        })
        .collect()
}

/// Parse a `kind:prefix:path` rule string from the command line, e.g.
/// `psr4:App\:src/` or `files::bootstrap/helpers.php`.
pub fn register_rule_spec(store: &Store, spec: &str) -> Result<bool, StoreError> {
    let mut parts = spec.splitn(3, ':');
    let (Some(kind), Some(prefix), Some(path)) = (parts.next(), parts.next(), parts.next()) else {
        return Ok(false);
    };
    let Some(kind) = RuleKind::from_str(kind) else {
        return Ok(false);
    };
    let prefix = if prefix.is_empty() { None } else { Some(prefix) };
    store.add_autoload_rule(kind, prefix, path, CONFIG_RULE_PRIORITY)?;
    Ok(true)
}

fn string_or_list(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

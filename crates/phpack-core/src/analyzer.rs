//! Per-file analysis: read, hash, classify, parse, and persist symbols
//! plus typed dependency edges.
//!
//! One file's writes are atomic: the prior symbol/edge rows are replaced
//! inside the same transaction that inserts the new ones. A file whose
//! content hash is unchanged is not re-analyzed.

use std::path::Path;

use log::{debug, warn};
use sha2::{Digest, Sha256};

use phpack_ast::{AstNode, Flow, IncludeKind, NodeKind, Visitor};

use crate::diagnostics::Diagnostics;
use crate::error::{AnalyzeError, StoreError};
use crate::paths::PathResolver;
use crate::store::{EdgeKind, FileKind, NewFile, Store, SymbolKind};
use crate::FileProvider;

/// Composer generates these; their definitions are runtime plumbing the
/// packed artifact replaces, so they are classified and never parsed.
const GENERATED_AUTOLOAD_SUFFIXES: &[&str] = &[
    "vendor/autoload.php",
    "vendor/composer/autoload_real.php",
    "vendor/composer/autoload_static.php",
    "vendor/composer/autoload_classmap.php",
    "vendor/composer/autoload_files.php",
    "vendor/composer/autoload_namespaces.php",
    "vendor/composer/autoload_psr4.php",
    "vendor/composer/ClassLoader.php",
];

#[derive(Debug, Clone, Default)]
pub struct AnalyzeOptions {
    /// Persist the decomposed AST rows alongside symbols and edges.
    pub store_asts: bool,
    /// Paths matching these globs are never analyzed, no matter how
    /// they are reached.
    pub exclude: Option<globset::GlobSet>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyzeOutcome {
    /// Parsed and persisted; symbols/edges replaced.
    Analyzed(i64),
    /// Content hash matched the stored row; nothing written.
    Unchanged(i64),
    /// Stored for textual inclusion only (vendor, composer-generated,
    /// or unparsable).
    Stored(i64),
}

impl AnalyzeOutcome {
    pub fn file_id(&self) -> i64 {
        match self {
            AnalyzeOutcome::Analyzed(id)
            | AnalyzeOutcome::Unchanged(id)
            | AnalyzeOutcome::Stored(id) => *id,
        }
    }
}

pub struct FileAnalyzer<'a> {
    paths: &'a PathResolver,
    fs: &'a dyn FileProvider,
    options: AnalyzeOptions,
}

impl<'a> FileAnalyzer<'a> {
    pub fn new(paths: &'a PathResolver, fs: &'a dyn FileProvider, options: AnalyzeOptions) -> Self {
        Self { paths, fs, options }
    }

    /// Analyze one file given by absolute or root-relative path.
    pub fn analyze(
        &self,
        store: &mut Store,
        path: &Path,
        diagnostics: &mut Diagnostics,
    ) -> Result<AnalyzeOutcome, AnalyzeError> {
        let abs = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.paths.absolute_of(&path.to_string_lossy())
        };
        let rel = self.paths.relative_to_root(&abs);

        if !rel.to_ascii_lowercase().ends_with(".php") {
            return Err(AnalyzeError::NotPhp(abs));
        }
        if let Some(exclude) = &self.options.exclude {
            if exclude.is_match(&rel) {
                return Err(AnalyzeError::Excluded(abs));
            }
        }

        let content = self
            .fs
            .read_file(&abs)
            .map_err(|e| AnalyzeError::Unreadable {
                path: abs.clone(),
                message: e.to_string(),
            })?;

        if !content.contains("<?php") && !content.contains("<?") {
            return Err(AnalyzeError::NotPhp(abs));
        }

        let content_hash = hex_digest(content.as_bytes());
        if let Some(existing) = store.file_by_path(&rel)? {
            if existing.content_hash == content_hash {
                debug!("unchanged, skipping analysis: {rel}");
                return Ok(AnalyzeOutcome::Unchanged(existing.id));
            }
        }

        // Composer-generated autoload plumbing: classify, never parse.
        if GENERATED_AUTOLOAD_SUFFIXES.iter().any(|s| rel.ends_with(s)) {
            let id = store.upsert_file(&NewFile {
                path: &rel,
                absolute_path: &abs.to_string_lossy(),
                content_hash: &content_hash,
                raw_content: Some(&content),
                class_kind: FileKind::AutoloadConfig,
                skip_ast: true,
            })?;
            debug!("classified composer-generated file: {rel}");
            return Ok(AnalyzeOutcome::Stored(id));
        }

        // Vendor files are included verbatim; their internals do not
        // grow the graph.
        if rel.starts_with("vendor/") || rel.contains("/vendor/") {
            let id = store.upsert_file(&NewFile {
                path: &rel,
                absolute_path: &abs.to_string_lossy(),
                content_hash: &content_hash,
                raw_content: Some(&content),
                class_kind: FileKind::Vendor,
                skip_ast: true,
            })?;
            debug!("stored vendor file: {rel}");
            return Ok(AnalyzeOutcome::Stored(id));
        }

        let ast = match phpack_ast::parse_resolved(content.as_bytes(), &rel) {
            Ok(ast) => ast,
            Err(err) => {
                warn!("parse failed, file kept textually: {err}");
                diagnostics.warn(rel.clone(), Some(err.line), format!("parse error: {}", err.message));
                let id = store.upsert_file(&NewFile {
                    path: &rel,
                    absolute_path: &abs.to_string_lossy(),
                    content_hash: &content_hash,
                    raw_content: Some(&content),
                    class_kind: FileKind::Script,
                    skip_ast: true,
                })?;
                return Ok(AnalyzeOutcome::Stored(id));
            }
        };

        let class_bearing = has_type_declaration(&ast.root);
        let class_kind = if class_bearing {
            FileKind::ClassBearing
        } else {
            FileKind::Script
        };

        let store_asts = self.options.store_asts;
        let id = store.transaction(|tx| {
            let id = tx.upsert_file(&NewFile {
                path: &rel,
                absolute_path: &abs.to_string_lossy(),
                content_hash: &content_hash,
                raw_content: Some(&content),
                class_kind,
                skip_ast: false,
            })?;
            tx.delete_symbols_of(id)?;
            tx.delete_edges_of(id)?;
            tx.delete_ast_nodes_of(id)?;

            let mut extraction = Extraction {
                store: tx,
                file_id: id,
                conditional_depth: 0,
                type_stack: Vec::new(),
                symbols: 0,
                edges: 0,
                err: None,
            };
            phpack_ast::walk(&ast.root, &mut extraction);
            let (symbols, edges) = (extraction.symbols, extraction.edges);
            if let Some(err) = extraction.err {
                return Err(err);
            }

            if store_asts {
                let root_id = persist_ast(tx, id, &ast.root, None, 0)?;
                tx.set_ast_root(id, root_id)?;
            }

            debug!("analyzed {rel}: {symbols} symbols, {edges} edges");
            Ok(id)
        })?;

        Ok(AnalyzeOutcome::Analyzed(id))
    }
}

pub(crate) fn hex_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

fn has_type_declaration(node: &AstNode) -> bool {
    if matches!(
        node.kind,
        NodeKind::Class { name: Some(_), .. } | NodeKind::Interface { .. } | NodeKind::Trait { .. }
    ) {
        return true;
    }
    node.children.iter().any(has_type_declaration)
}

fn namespace_of(fqn: &str) -> &str {
    match fqn.rsplit_once('\\') {
        Some((ns, _)) => ns,
        None => "",
    }
}

fn short_of(fqn: &str) -> &str {
    fqn.rsplit('\\').next().unwrap_or(fqn)
}

/// Single-pass symbol and edge extraction over the resolved AST.
struct Extraction<'a> {
    store: &'a Store,
    file_id: i64,
    conditional_depth: u32,
    /// Symbol ids of the enclosing class-like declarations; `None` for
    /// anonymous classes.
    type_stack: Vec<Option<i64>>,
    symbols: usize,
    edges: usize,
    err: Option<StoreError>,
}

impl Extraction<'_> {
    fn conditional(&self) -> bool {
        self.conditional_depth > 0
    }

    fn add_symbol(
        &mut self,
        kind: SymbolKind,
        fqn: &str,
        visibility: &str,
        parent: Option<i64>,
    ) -> Option<i64> {
        match self.store.add_symbol(
            self.file_id,
            kind,
            short_of(fqn),
            fqn,
            namespace_of(fqn),
            visibility,
            parent,
        ) {
            Ok(id) => {
                self.symbols += 1;
                Some(id)
            }
            Err(err) => {
                self.err = Some(err);
                None
            }
        }
    }

    fn add_class_edge(&mut self, kind: EdgeKind, fqn: &str, line: u32) {
        match self.store.add_edge(
            self.file_id,
            kind,
            Some(fqn),
            line,
            self.conditional(),
            "",
        ) {
            Ok(_) => self.edges += 1,
            Err(err) => self.err = Some(err),
        }
    }

    fn add_include_edge(&mut self, kind: IncludeKind, context: &str, line: u32) {
        let kind = match kind {
            IncludeKind::Include => EdgeKind::Include,
            IncludeKind::IncludeOnce => EdgeKind::IncludeOnce,
            IncludeKind::Require => EdgeKind::Require,
            IncludeKind::RequireOnce => EdgeKind::RequireOnce,
        };
        match self
            .store
            .add_edge(self.file_id, kind, None, line, self.conditional(), context)
        {
            Ok(_) => self.edges += 1,
            Err(err) => self.err = Some(err),
        }
    }

    fn supertype_edges(
        &mut self,
        extends: Option<&phpack_ast::Name>,
        implements: &[phpack_ast::Name],
        line: u32,
    ) {
        if let Some(fqn) = extends.and_then(|n| n.resolved.as_deref()) {
            self.add_class_edge(EdgeKind::Extends, fqn, line);
        }
        for name in implements {
            if let Some(fqn) = name.resolved.as_deref() {
                self.add_class_edge(EdgeKind::Implements, fqn, line);
            }
        }
    }

    fn enclosing_symbol(&self) -> Option<i64> {
        self.type_stack.last().copied().flatten()
    }
}

impl Visitor for Extraction<'_> {
    fn enter(&mut self, node: &AstNode) -> Flow {
        if self.err.is_some() {
            return Flow::Skip;
        }
        match &node.kind {
            NodeKind::Conditional => self.conditional_depth += 1,

            NodeKind::Class {
                name,
                extends,
                implements,
                is_abstract,
                is_final,
            } => {
                let symbol_id = match (name, &node.fqcn) {
                    (Some(_), Some(fqn)) => {
                        let visibility = if *is_abstract {
                            "abstract"
                        } else if *is_final {
                            "final"
                        } else {
                            "public"
                        };
                        self.add_symbol(SymbolKind::Class, fqn, visibility, None)
                    }
                    // Anonymous classes contribute edges, not symbols.
                    _ => None,
                };
                self.type_stack.push(symbol_id);
                self.supertype_edges(extends.as_ref(), implements, node.start_line);
            }

            NodeKind::Interface { extends, .. } => {
                let symbol_id = node
                    .fqcn
                    .as_deref()
                    .and_then(|fqn| self.add_symbol(SymbolKind::Interface, fqn, "public", None));
                self.type_stack.push(symbol_id);
                self.supertype_edges(None, extends, node.start_line);
            }

            NodeKind::Trait { .. } => {
                let symbol_id = node
                    .fqcn
                    .as_deref()
                    .and_then(|fqn| self.add_symbol(SymbolKind::Trait, fqn, "public", None));
                self.type_stack.push(symbol_id);
            }

            NodeKind::UseTrait { names } => {
                for name in names {
                    if let Some(fqn) = name.resolved.as_deref() {
                        self.add_class_edge(EdgeKind::UseTrait, fqn, node.start_line);
                    }
                }
            }

            NodeKind::Function { .. } => {
                if let Some(fqn) = node.fqcn.as_deref() {
                    self.add_symbol(SymbolKind::Function, fqn, "public", None);
                }
            }

            NodeKind::Method { visibility, .. } => {
                if let Some(fqn) = node.fqcn.as_deref() {
                    let parent = self.enclosing_symbol();
                    self.add_symbol(SymbolKind::Method, fqn, visibility.as_str(), parent);
                }
            }

            NodeKind::Property {
                names, visibility, ..
            } => {
                let parent = self.enclosing_symbol();
                if let Some(class) = node.fqcn.as_deref().and_then(|f| f.split_once("::")) {
                    let (class, _) = class;
                    for name in names {
                        let fqn = format!("{class}::${name}");
                        self.add_symbol(SymbolKind::Property, &fqn, visibility.as_str(), parent);
                    }
                }
            }

            NodeKind::New { class } => {
                if let Some(fqn) = class.as_ref().and_then(|n| n.resolved.as_deref()) {
                    self.add_class_edge(EdgeKind::New, fqn, node.start_line);
                }
            }

            NodeKind::StaticCall { class, .. } => {
                if let Some(fqn) = class.as_ref().and_then(|n| n.resolved.as_deref()) {
                    self.add_class_edge(EdgeKind::StaticCall, fqn, node.start_line);
                }
            }

            NodeKind::ClassConstFetch { class, .. } => {
                if let Some(fqn) = class.as_ref().and_then(|n| n.resolved.as_deref()) {
                    self.add_class_edge(EdgeKind::ClassConstFetch, fqn, node.start_line);
                }
            }

            NodeKind::Include { kind } => {
                let context = include_context(node);
                self.add_include_edge(*kind, &context, node.start_line);
            }

            _ => {}
        }
        Flow::Continue
    }

    fn leave(&mut self, node: &AstNode) {
        match &node.kind {
            NodeKind::Conditional => {
                self.conditional_depth = self.conditional_depth.saturating_sub(1);
            }
            NodeKind::Class { .. } | NodeKind::Interface { .. } | NodeKind::Trait { .. } => {
                self.type_stack.pop();
            }
            _ => {}
        }
    }
}

/// Fold an include argument into its context string: the literal value
/// when the expression reduces to string literals and `__DIR__`,
/// `"dynamic"` for an unfoldable concatenation, `"complex"` otherwise.
fn include_context(node: &AstNode) -> String {
    let Some(arg) = node.children.first() else {
        return "complex".to_string();
    };
    let arg = unwrap_parens(arg);
    match &arg.kind {
        NodeKind::StringLiteral { value } => value.clone(),
        NodeKind::MagicDir => "__DIR__".to_string(),
        NodeKind::Concat => fold(arg).unwrap_or_else(|| "dynamic".to_string()),
        _ => "complex".to_string(),
    }
}

fn unwrap_parens(node: &AstNode) -> &AstNode {
    match &node.kind {
        NodeKind::Other { raw }
            if raw == "parenthesized_expression" && node.children.len() == 1 =>
        {
            unwrap_parens(&node.children[0])
        }
        _ => node,
    }
}

fn fold(node: &AstNode) -> Option<String> {
    let node = unwrap_parens(node);
    match &node.kind {
        NodeKind::StringLiteral { value } => Some(value.clone()),
        NodeKind::MagicDir => Some("__DIR__".to_string()),
        NodeKind::Concat => {
            if node.children.len() != 2 {
                return None;
            }
            let left = fold(&node.children[0])?;
            let right = fold(&node.children[1])?;
            Some(format!("{left}{right}"))
        }
        _ => None,
    }
}

fn persist_ast(
    store: &Store,
    file_id: i64,
    node: &AstNode,
    parent: Option<i64>,
    position: i64,
) -> Result<i64, StoreError> {
    let attributes = match &node.kind {
        NodeKind::Root | NodeKind::Other { .. } => None,
        kind => serde_json::to_string(kind).ok(),
    };
    let id = store.add_ast_node(
        file_id,
        parent,
        node.kind.type_name(),
        node.fqcn.as_deref(),
        position,
        node.start_line,
        node.end_line,
        attributes.as_deref(),
    )?;
    for (index, child) in node.children.iter().enumerate() {
        persist_ast(store, file_id, child, Some(id), index as i64)?;
    }
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryFileProvider;

    fn analyzer_env() -> (PathResolver, InMemoryFileProvider) {
        (PathResolver::new("/proj"), InMemoryFileProvider::new())
    }

    fn analyze(
        store: &mut Store,
        paths: &PathResolver,
        fs: &InMemoryFileProvider,
        path: &str,
    ) -> AnalyzeOutcome {
        let analyzer = FileAnalyzer::new(paths, fs, AnalyzeOptions::default());
        let mut diagnostics = Diagnostics::new();
        analyzer
            .analyze(store, Path::new(path), &mut diagnostics)
            .expect("analysis should succeed")
    }

    #[test]
    fn symbols_and_edges_extracted() {
        let (paths, fs) = analyzer_env();
        fs.add_file(
            "/proj/src/Controller.php",
            r#"<?php
namespace App;

use Core\Engine;

class Controller extends Base implements Contract
{
    use Helpers;

    public function run()
    {
        $engine = new Engine();
        return Registry::get('db');
    }
}
"#,
        );

        let mut store = Store::open_in_memory().unwrap();
        let outcome = analyze(&mut store, &paths, &fs, "/proj/src/Controller.php");
        let AnalyzeOutcome::Analyzed(id) = outcome else {
            panic!("expected analysis, got {outcome:?}");
        };

        let symbols = store.symbols_of(id).unwrap();
        let fqns: Vec<&str> = symbols.iter().map(|s| s.fqn.as_str()).collect();
        assert!(fqns.contains(&"App\\Controller"));
        assert!(fqns.contains(&"App\\Controller::run"));

        let edges = store.edges_of(id).unwrap();
        let kinds: Vec<(EdgeKind, &str)> = edges
            .iter()
            .map(|e| (e.kind, e.target_symbol.as_deref().unwrap_or("")))
            .collect();
        assert!(kinds.contains(&(EdgeKind::Extends, "App\\Base")));
        assert!(kinds.contains(&(EdgeKind::Implements, "App\\Contract")));
        assert!(kinds.contains(&(EdgeKind::UseTrait, "App\\Helpers")));
        assert!(kinds.contains(&(EdgeKind::New, "Core\\Engine")));
        assert!(kinds.contains(&(EdgeKind::StaticCall, "App\\Registry")));

        let row = store.file_by_id(id).unwrap().unwrap();
        assert_eq!(row.class_kind, FileKind::ClassBearing);
    }

    #[test]
    fn unchanged_file_writes_nothing() {
        let (paths, fs) = analyzer_env();
        fs.add_file("/proj/a.php", "<?php\nclass A {}\n");

        let mut store = Store::open_in_memory().unwrap();
        let first = analyze(&mut store, &paths, &fs, "/proj/a.php");
        assert!(matches!(first, AnalyzeOutcome::Analyzed(_)));

        let second = analyze(&mut store, &paths, &fs, "/proj/a.php");
        assert!(matches!(second, AnalyzeOutcome::Unchanged(_)));
        assert_eq!(first.file_id(), second.file_id());
    }

    #[test]
    fn reanalysis_replaces_rows() {
        let (paths, fs) = analyzer_env();
        fs.add_file("/proj/a.php", "<?php\nclass A {}\nclass B {}\n");

        let mut store = Store::open_in_memory().unwrap();
        let id = analyze(&mut store, &paths, &fs, "/proj/a.php").file_id();
        assert_eq!(store.symbols_of(id).unwrap().len(), 2);

        fs.add_file("/proj/a.php", "<?php\nclass A {}\n");
        let id2 = analyze(&mut store, &paths, &fs, "/proj/a.php").file_id();
        assert_eq!(id, id2);
        assert_eq!(store.symbols_of(id).unwrap().len(), 1);
    }

    #[test]
    fn conditional_includes_flagged() {
        let (paths, fs) = analyzer_env();
        fs.add_file(
            "/proj/main.php",
            r#"<?php
if (PHP_VERSION_ID >= 80000) {
    require 'v8.php';
} else {
    require 'v7.php';
}
require 'always.php';
"#,
        );

        let mut store = Store::open_in_memory().unwrap();
        let id = analyze(&mut store, &paths, &fs, "/proj/main.php").file_id();

        let edges = store.edges_of(id).unwrap();
        assert_eq!(edges.len(), 3);
        let by_ctx = |ctx: &str| edges.iter().find(|e| e.context == ctx).unwrap();
        assert!(by_ctx("v8.php").is_conditional);
        assert!(by_ctx("v7.php").is_conditional);
        assert!(!by_ctx("always.php").is_conditional);
    }

    #[test]
    fn dir_concat_folds_into_context() {
        let (paths, fs) = analyzer_env();
        fs.add_file(
            "/proj/a/b.php",
            "<?php\nrequire __DIR__ . '/x.php';\nrequire $path . '/y.php';\nrequire $path;\n",
        );

        let mut store = Store::open_in_memory().unwrap();
        let id = analyze(&mut store, &paths, &fs, "/proj/a/b.php").file_id();

        let edges = store.edges_of(id).unwrap();
        let contexts: Vec<&str> = edges.iter().map(|e| e.context.as_str()).collect();
        assert_eq!(contexts, vec!["__DIR__/x.php", "dynamic", "complex"]);
    }

    #[test]
    fn vendor_files_are_opaque() {
        let (paths, fs) = analyzer_env();
        fs.add_file(
            "/proj/vendor/acme/lib.php",
            "<?php\nclass VendorThing { public function f() { return new Inner(); } }\n",
        );

        let mut store = Store::open_in_memory().unwrap();
        let outcome = analyze(&mut store, &paths, &fs, "/proj/vendor/acme/lib.php");
        let AnalyzeOutcome::Stored(id) = outcome else {
            panic!("expected stored, got {outcome:?}");
        };

        let row = store.file_by_id(id).unwrap().unwrap();
        assert_eq!(row.class_kind, FileKind::Vendor);
        assert!(row.skip_ast);
        assert!(store.edges_of(id).unwrap().is_empty());
        assert!(store.symbols_of(id).unwrap().is_empty());
    }

    #[test]
    fn non_php_rejected() {
        let (paths, fs) = analyzer_env();
        fs.add_file("/proj/run.sh", "#!/bin/sh\necho hi\n");
        fs.add_file("/proj/data.php", "just text, no opening tag\n");

        let mut store = Store::open_in_memory().unwrap();
        let analyzer = FileAnalyzer::new(&paths, &fs, AnalyzeOptions::default());
        let mut diagnostics = Diagnostics::new();

        let err = analyzer
            .analyze(&mut store, Path::new("/proj/run.sh"), &mut diagnostics)
            .unwrap_err();
        assert!(matches!(err, AnalyzeError::NotPhp(_)));

        let err = analyzer
            .analyze(&mut store, Path::new("/proj/data.php"), &mut diagnostics)
            .unwrap_err();
        assert!(matches!(err, AnalyzeError::NotPhp(_)));
    }

    #[test]
    fn parse_failure_keeps_file_textually() {
        let (paths, fs) = analyzer_env();
        fs.add_file("/proj/broken.php", "<?php class {\n");

        let mut store = Store::open_in_memory().unwrap();
        let analyzer = FileAnalyzer::new(&paths, &fs, AnalyzeOptions::default());
        let mut diagnostics = Diagnostics::new();
        let outcome = analyzer
            .analyze(&mut store, Path::new("/proj/broken.php"), &mut diagnostics)
            .unwrap();

        let AnalyzeOutcome::Stored(id) = outcome else {
            panic!("expected stored, got {outcome:?}");
        };
        let row = store.file_by_id(id).unwrap().unwrap();
        assert!(row.skip_ast);
        assert_eq!(diagnostics.warning_count(), 1);
    }

    #[test]
    fn excluded_paths_never_analyzed() {
        let (paths, fs) = analyzer_env();
        fs.add_file("/proj/src/SkippedTest.php", "<?php\nclass SkippedTest {}\n");

        let exclude = crate::paths::build_globset(&["**/*Test.php".to_string()]).unwrap();
        let analyzer = FileAnalyzer::new(
            &paths,
            &fs,
            AnalyzeOptions {
                store_asts: false,
                exclude: Some(exclude),
            },
        );
        let mut store = Store::open_in_memory().unwrap();
        let mut diagnostics = Diagnostics::new();

        let err = analyzer
            .analyze(&mut store, Path::new("/proj/src/SkippedTest.php"), &mut diagnostics)
            .unwrap_err();
        assert!(matches!(err, AnalyzeError::Excluded(_)));
        assert!(store.file_by_path("src/SkippedTest.php").unwrap().is_none());
    }

    #[test]
    fn ast_rows_persisted_on_request() {
        let (paths, fs) = analyzer_env();
        fs.add_file("/proj/a.php", "<?php\nnamespace App;\nclass A {}\n");

        let mut store = Store::open_in_memory().unwrap();
        let analyzer = FileAnalyzer::new(
            &paths,
            &fs,
            AnalyzeOptions {
                store_asts: true,
                ..Default::default()
            },
        );
        let mut diagnostics = Diagnostics::new();
        let id = analyzer
            .analyze(&mut store, Path::new("/proj/a.php"), &mut diagnostics)
            .unwrap()
            .file_id();

        let row = store.file_by_id(id).unwrap().unwrap();
        assert!(row.ast_root.is_some());
        assert!(store.ast_node_count(id).unwrap() >= 2);
    }
}

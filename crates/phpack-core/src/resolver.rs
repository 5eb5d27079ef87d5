//! The resolution fixpoint: binds unresolved edges to target files,
//! pulling newly discovered files through the analyzer as it goes.
//!
//! Each pass walks every pending edge; a pass that binds nothing ends
//! the loop. Edges that cannot be bound are warned about once and left
//! unresolved; edges satisfied by the host runtime are flagged so later
//! runs skip them too.

use std::collections::HashSet;
use std::path::PathBuf;

use log::{debug, info};

use crate::analyzer::FileAnalyzer;
use crate::autoload::AutoloadEngine;
use crate::diagnostics::Diagnostics;
use crate::error::{AnalyzeError, CoreError};
use crate::paths::{basename, normalize, PathResolver};
use crate::runtime::RuntimeIndex;
use crate::store::{EdgeRow, FileKind, FileRow, Store, SymbolKind};
use crate::FileProvider;

#[derive(Debug, Clone, Copy, Default)]
pub struct ResolutionStats {
    pub passes: usize,
    pub resolved: usize,
    pub external: usize,
    pub unresolved: usize,
}

enum Target {
    File(PathBuf),
    External,
    Unknown,
}

pub struct DependencyResolver<'a> {
    paths: &'a PathResolver,
    fs: &'a dyn FileProvider,
    runtime: &'a dyn RuntimeIndex,
    analyzer: &'a FileAnalyzer<'a>,
    engine: AutoloadEngine,
    /// Edge ids already warned about; warnings are rate-limited to one
    /// per edge for the lifetime of the resolver.
    warned: HashSet<i64>,
}

impl<'a> DependencyResolver<'a> {
    pub fn new(
        paths: &'a PathResolver,
        fs: &'a dyn FileProvider,
        runtime: &'a dyn RuntimeIndex,
        analyzer: &'a FileAnalyzer<'a>,
        engine: AutoloadEngine,
    ) -> Self {
        Self {
            paths,
            fs,
            runtime,
            analyzer,
            engine,
            warned: HashSet::new(),
        }
    }

    pub fn engine(&self) -> &AutoloadEngine {
        &self.engine
    }

    /// Run passes until no edge transitions from unresolved to resolved.
    pub fn run_fixpoint(
        &mut self,
        store: &mut Store,
        diagnostics: &mut Diagnostics,
    ) -> Result<ResolutionStats, CoreError> {
        let mut stats = ResolutionStats::default();

        loop {
            stats.passes += 1;
            let pending = store.unresolved_edges()?;
            if pending.is_empty() {
                break;
            }

            let mut progressed = false;
            for edge in pending {
                match self.resolve_target(store, &edge, diagnostics)? {
                    Target::File(abs) => {
                        if self.bind(store, &edge, &abs, diagnostics)? {
                            stats.resolved += 1;
                            progressed = true;
                        }
                    }
                    Target::External => {
                        store.mark_edge_external(edge.id)?;
                        stats.external += 1;
                        progressed = true;
                    }
                    Target::Unknown => {}
                }
            }

            if !progressed {
                break;
            }
        }

        stats.unresolved = store.stats()?.unresolved_edges as usize;
        info!(
            "resolution fixpoint: {} passes, {} bound, {} external, {} unresolved",
            stats.passes, stats.resolved, stats.external, stats.unresolved
        );
        Ok(stats)
    }

    /// Bind `edge` to the file at `abs`, analyzing it first if the store
    /// has not seen it.
    fn bind(
        &mut self,
        store: &mut Store,
        edge: &EdgeRow,
        abs: &std::path::Path,
        diagnostics: &mut Diagnostics,
    ) -> Result<bool, CoreError> {
        let rel = self.paths.relative_to_root(abs);
        let target = match store.file_by_path(&rel)? {
            Some(row) => row,
            None => {
                match self.analyzer.analyze(store, abs, diagnostics) {
                    Ok(_) => {
                        debug!("discovered {rel} while resolving edge {}", edge.id);
                    }
                    Err(AnalyzeError::Store(err)) => return Err(CoreError::Store(err)),
                    Err(err) => {
                        self.warn_once(diagnostics, edge, format!("target rejected: {err}"));
                        return Ok(false);
                    }
                }
                match store.file_by_path(&rel)? {
                    Some(row) => row,
                    None => {
                        self.warn_once(
                            diagnostics,
                            edge,
                            format!("target {rel} missing after analysis"),
                        );
                        return Ok(false);
                    }
                }
            }
        };

        store.resolve_edge(edge.id, target.id)?;
        self.backfill_vendor_symbol(store, edge, &target)?;
        Ok(true)
    }

    /// Vendor files are stored unparsed; record the symbol the edge
    /// asked for so the index can answer for it next time.
    fn backfill_vendor_symbol(
        &self,
        store: &Store,
        edge: &EdgeRow,
        target: &FileRow,
    ) -> Result<(), CoreError> {
        if target.class_kind != FileKind::Vendor || edge.kind.is_include_like() {
            return Ok(());
        }
        let Some(fqn) = edge.target_symbol.as_deref() else {
            return Ok(());
        };
        let short = fqn.rsplit('\\').next().unwrap_or(fqn);
        let namespace = fqn.rsplit_once('\\').map(|(ns, _)| ns).unwrap_or("");
        store.add_symbol(
            target.id,
            SymbolKind::Class,
            short,
            fqn,
            namespace,
            "public",
            None,
        )?;
        Ok(())
    }

    fn resolve_target(
        &mut self,
        store: &Store,
        edge: &EdgeRow,
        diagnostics: &mut Diagnostics,
    ) -> Result<Target, CoreError> {
        if edge.kind.is_include_like() {
            self.resolve_include(store, edge, diagnostics)
        } else {
            self.resolve_class(store, edge, diagnostics)
        }
    }

    fn resolve_include(
        &mut self,
        store: &Store,
        edge: &EdgeRow,
        diagnostics: &mut Diagnostics,
    ) -> Result<Target, CoreError> {
        let context = edge.context.as_str();
        if context.is_empty() || context == "dynamic" || context == "complex" {
            self.warn_once(
                diagnostics,
                edge,
                format!(
                    "cannot resolve {} with a non-literal argument ({})",
                    edge.kind.as_str(),
                    if context.is_empty() { "empty" } else { context },
                ),
            );
            return Ok(Target::Unknown);
        }

        let Some(source) = store.file_by_id(edge.source_file_id)? else {
            return Ok(Target::Unknown);
        };

        if let Some(abs) = self
            .paths
            .resolve_literal_include(self.fs, context, &source.path)
        {
            return Ok(Target::File(abs));
        }

        // Fall back to the store: exact path, then basename.
        if let Some(row) = store.file_by_path(&normalize(context))? {
            return Ok(Target::File(self.paths.absolute_of(&row.path)));
        }
        let by_name = store.files_by_basename(basename(context))?;
        if let Some(row) = by_name.first() {
            return Ok(Target::File(self.paths.absolute_of(&row.path)));
        }

        self.warn_once(
            diagnostics,
            edge,
            format!("include target not found: {context}"),
        );
        Ok(Target::Unknown)
    }

    fn resolve_class(
        &mut self,
        store: &Store,
        edge: &EdgeRow,
        diagnostics: &mut Diagnostics,
    ) -> Result<Target, CoreError> {
        let Some(fqn) = edge.target_symbol.as_deref() else {
            return Ok(Target::Unknown);
        };

        // The symbol index first: files already analyzed answer without
        // touching the rules. Ambiguity here is fatal.
        if let Some(row) = store.find_file_by_symbol(fqn)? {
            return Ok(Target::File(self.paths.absolute_of(&row.path)));
        }

        if let Some(abs) = self.engine.find_file_for_symbol(self.fs, self.paths, fqn) {
            return Ok(Target::File(abs));
        }

        if self.runtime.is_builtin_symbol(fqn) {
            debug!("externally satisfied: {fqn}");
            return Ok(Target::External);
        }

        self.warn_once(diagnostics, edge, format!("class not found: {fqn}"));
        Ok(Target::Unknown)
    }

    fn warn_once(&mut self, diagnostics: &mut Diagnostics, edge: &EdgeRow, body: String) {
        if self.warned.insert(edge.id) {
            diagnostics.warn(format!("edge #{}", edge.id), Some(edge.line), body);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::AnalyzeOptions;
    use crate::runtime::PhpRuntime;
    use crate::store::RuleKind;
    use crate::InMemoryFileProvider;
    use std::path::Path;

    struct Fixture {
        paths: PathResolver,
        fs: InMemoryFileProvider,
        store: Store,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                paths: PathResolver::new("/proj"),
                fs: InMemoryFileProvider::new(),
                store: Store::open_in_memory().unwrap(),
            }
        }

        fn analyze(&mut self, path: &str) -> i64 {
            let analyzer =
                FileAnalyzer::new(&self.paths, &self.fs, AnalyzeOptions::default());
            let mut diagnostics = Diagnostics::new();
            analyzer
                .analyze(&mut self.store, Path::new(path), &mut diagnostics)
                .unwrap()
                .file_id()
        }

        fn resolve(&mut self) -> (ResolutionStats, Diagnostics) {
            let analyzer =
                FileAnalyzer::new(&self.paths, &self.fs, AnalyzeOptions::default());
            let runtime = PhpRuntime::new();
            let engine = AutoloadEngine::from_store(&self.store).unwrap();
            let mut resolver =
                DependencyResolver::new(&self.paths, &self.fs, &runtime, &analyzer, engine);
            let mut diagnostics = Diagnostics::new();
            let stats = resolver
                .run_fixpoint(&mut self.store, &mut diagnostics)
                .unwrap();
            (stats, diagnostics)
        }
    }

    #[test]
    fn chain_of_requires_resolves_transitively() {
        let mut fx = Fixture::new();
        fx.fs.add_file("/proj/main.php", "<?php\nrequire 'a.php';\n");
        fx.fs.add_file("/proj/a.php", "<?php\nrequire 'b.php';\n");
        fx.fs.add_file("/proj/b.php", "<?php\n$x = 1;\n");

        fx.analyze("/proj/main.php");
        let (stats, diagnostics) = fx.resolve();

        assert_eq!(stats.resolved, 2);
        assert_eq!(stats.unresolved, 0);
        assert!(diagnostics.is_empty());
        assert!(fx.store.file_by_path("b.php").unwrap().is_some());
    }

    #[test]
    fn autoload_discovery_through_new() {
        let mut fx = Fixture::new();
        fx.fs
            .add_file("/proj/main.php", "<?php\n$f = new App\\Foo();\n");
        fx.fs
            .add_file("/proj/src/Foo.php", "<?php\nnamespace App;\nclass Foo {}\n");
        fx.store
            .add_autoload_rule(RuleKind::PrefixMap, Some("App\\"), "src/", 200)
            .unwrap();

        fx.analyze("/proj/main.php");
        let (stats, diagnostics) = fx.resolve();

        assert_eq!(stats.resolved, 1);
        assert!(diagnostics.is_empty());
        let foo = fx.store.file_by_path("src/Foo.php").unwrap().unwrap();
        assert_eq!(foo.class_kind, FileKind::ClassBearing);
    }

    #[test]
    fn builtins_flagged_external_not_missing() {
        let mut fx = Fixture::new();
        fx.fs.add_file(
            "/proj/main.php",
            "<?php\nthrow new RuntimeException('x');\n",
        );

        fx.analyze("/proj/main.php");
        let (stats, diagnostics) = fx.resolve();

        assert_eq!(stats.external, 1);
        assert_eq!(stats.unresolved, 0);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn missing_symbol_warns_once_across_passes() {
        let mut fx = Fixture::new();
        fx.fs.add_file(
            "/proj/main.php",
            "<?php\nnew Ghost();\nrequire 'real.php';\n",
        );
        fx.fs.add_file("/proj/real.php", "<?php\n$y = 2;\n");

        fx.analyze("/proj/main.php");
        let (stats, diagnostics) = fx.resolve();

        // The require resolves; the ghost stays, warned exactly once
        // even though the fixpoint ran additional passes.
        assert_eq!(stats.resolved, 1);
        assert_eq!(stats.unresolved, 1);
        assert_eq!(diagnostics.warning_count(), 1);
    }

    #[test]
    fn vendor_target_gets_symbol_backfilled() {
        let mut fx = Fixture::new();
        fx.fs.add_file(
            "/proj/main.php",
            "<?php\n$c = new Acme\\Client();\n",
        );
        fx.fs.add_file(
            "/proj/vendor/acme/src/Client.php",
            "<?php\nnamespace Acme;\nclass Client {}\n",
        );
        fx.store
            .add_autoload_rule(RuleKind::PrefixMap, Some("Acme\\"), "vendor/acme/src/", 100)
            .unwrap();

        fx.analyze("/proj/main.php");
        let (stats, _) = fx.resolve();

        assert_eq!(stats.resolved, 1);
        let vendor = fx
            .store
            .file_by_path("vendor/acme/src/Client.php")
            .unwrap()
            .unwrap();
        assert_eq!(vendor.class_kind, FileKind::Vendor);
        let symbols = fx.store.symbols_of(vendor.id).unwrap();
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].fqn, "Acme\\Client");

        // A second symbol lookup now hits the store directly.
        let hit = fx.store.find_file_by_symbol("Acme\\Client").unwrap();
        assert_eq!(hit.unwrap().id, vendor.id);
    }

    #[test]
    fn fixpoint_is_stable_on_rerun() {
        let mut fx = Fixture::new();
        fx.fs.add_file("/proj/main.php", "<?php\nrequire 'a.php';\n");
        fx.fs.add_file("/proj/a.php", "<?php\n$x = 1;\n");

        fx.analyze("/proj/main.php");
        let (first, _) = fx.resolve();
        assert_eq!(first.resolved, 1);

        let (second, _) = fx.resolve();
        assert_eq!(second.resolved, 0);
        assert_eq!(second.unresolved, 0);
    }
}

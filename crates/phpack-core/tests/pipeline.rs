//! End-to-end pipeline tests: analyze an on-disk project, resolve to
//! fixpoint, and check the emitted load order.

use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;

use phpack_core::{
    load_order, AnalyzeOptions, AutoloadEngine, DependencyResolver, Diagnostics, FileAnalyzer,
    FileKind, NativeFileProvider, PathResolver, PhpRuntime, RuleKind, Store,
};

struct Project {
    _dir: TempDir,
    root: PathBuf,
    store: Store,
}

impl Project {
    fn new(files: &[(&str, &str)]) -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root = dir.path().to_path_buf();
        for (path, content) in files {
            let full = root.join(path);
            if let Some(parent) = full.parent() {
                fs::create_dir_all(parent).expect("mkdirs");
            }
            fs::write(full, content).expect("write fixture");
        }
        Self {
            _dir: dir,
            root,
            store: Store::open_in_memory().expect("store"),
        }
    }

    fn paths(&self) -> PathResolver {
        PathResolver::new(self.root.to_string_lossy().to_string())
    }

    fn add_rule(&self, kind: RuleKind, prefix: Option<&str>, path: &str) {
        self.store
            .add_autoload_rule(kind, prefix, path, 200)
            .expect("rule");
    }

    /// Analyze the entry, mark it, run the fixpoint, compute the order.
    fn run(&mut self, entry: &str) -> (Vec<String>, Diagnostics) {
        let paths = self.paths();
        let fs_provider = NativeFileProvider::new();
        let analyzer = FileAnalyzer::new(&paths, &fs_provider, AnalyzeOptions::default());
        let runtime = PhpRuntime::new();
        let mut diagnostics = Diagnostics::new();

        let outcome = analyzer
            .analyze(&mut self.store, &self.root.join(entry), &mut diagnostics)
            .expect("entry analysis");
        self.store.mark_entry(outcome.file_id()).expect("mark entry");

        let engine = AutoloadEngine::from_store(&self.store).expect("engine");
        let mut resolver =
            DependencyResolver::new(&paths, &fs_provider, &runtime, &analyzer, engine);
        resolver
            .run_fixpoint(&mut self.store, &mut diagnostics)
            .expect("fixpoint");

        let plan = load_order(&self.store, &mut diagnostics).expect("load order");
        let order = plan.files.iter().map(|f| f.path.clone()).collect();
        (order, diagnostics)
    }
}

#[test]
fn linear_require_chain() {
    let mut project = Project::new(&[
        ("main.php", "<?php\nrequire 'a.php';\n"),
        ("a.php", "<?php\nrequire 'b.php';\n"),
        ("b.php", "<?php\n$x = 1;\n"),
    ]);

    let (order, diagnostics) = project.run("main.php");
    assert_eq!(order, vec!["b.php", "a.php", "main.php"]);
    assert!(diagnostics.is_empty(), "unexpected: {diagnostics:?}");
}

#[test]
fn autoload_discovery_via_prefix_map() {
    let mut project = Project::new(&[
        ("main.php", "<?php\n$f = new App\\Foo();\n"),
        ("src/Foo.php", "<?php\nnamespace App;\nclass Foo {}\n"),
    ]);
    project.add_rule(RuleKind::PrefixMap, Some("App\\"), "src/");

    let (order, diagnostics) = project.run("main.php");
    assert_eq!(order, vec!["src/Foo.php", "main.php"]);
    assert!(diagnostics.is_empty(), "unexpected: {diagnostics:?}");
}

#[test]
fn class_hierarchy_orders_base_first() {
    let mut project = Project::new(&[
        ("main.php", "<?php\n$c = new HomeController();\n"),
        (
            "HomeController.php",
            "<?php\nclass HomeController extends BaseController {}\n",
        ),
        (
            "BaseController.php",
            "<?php\nabstract class BaseController {}\n",
        ),
    ]);
    project.add_rule(RuleKind::PrefixMap, Some(""), "");

    let (order, diagnostics) = project.run("main.php");
    assert_eq!(
        order,
        vec!["BaseController.php", "HomeController.php", "main.php"]
    );
    assert!(diagnostics.is_empty(), "unexpected: {diagnostics:?}");
}

#[test]
fn conditional_includes_both_recorded_and_ordered() {
    let mut project = Project::new(&[
        (
            "main.php",
            "<?php\nif (PHP_VERSION_ID >= 80000) {\n    require 'v8.php';\n} else {\n    require 'v7.php';\n}\n",
        ),
        ("v8.php", "<?php\nfunction impl() { return 8; }\n"),
        ("v7.php", "<?php\nfunction impl() { return 7; }\n"),
    ]);

    let (order, diagnostics) = project.run("main.php");
    assert_eq!(order.len(), 3);
    assert_eq!(order.last().map(String::as_str), Some("main.php"));
    assert!(order.contains(&"v8.php".to_string()));
    assert!(order.contains(&"v7.php".to_string()));
    assert!(diagnostics.is_empty(), "unexpected: {diagnostics:?}");

    let entry = project.store.entry_file().unwrap().unwrap();
    let edges = project.store.edges_of(entry.id).unwrap();
    assert_eq!(edges.len(), 2);
    assert!(edges.iter().all(|e| e.is_conditional && e.is_resolved));
}

#[test]
fn cyclic_requires_emit_once_with_warning() {
    let mut project = Project::new(&[
        ("a.php", "<?php\nrequire 'b.php';\nclass A {}\n"),
        ("b.php", "<?php\nrequire 'a.php';\nclass B {}\n"),
    ]);

    let (order, diagnostics) = project.run("a.php");
    assert_eq!(order, vec!["b.php", "a.php"]);
    assert_eq!(diagnostics.warning_count(), 1);
    assert!(diagnostics[0].body.contains("cycle"));
}

#[test]
fn vendor_files_included_opaquely() {
    let mut project = Project::new(&[
        ("main.php", "<?php\n$c = new Acme\\Client();\n"),
        (
            "vendor/acme/lib/Client.php",
            "<?php\nnamespace Acme;\nclass Client {\n    public function go() { return new Untracked(); }\n}\n",
        ),
    ]);
    project.add_rule(RuleKind::PrefixMap, Some("Acme\\"), "vendor/acme/lib/");

    let (order, diagnostics) = project.run("main.php");
    assert_eq!(order, vec!["vendor/acme/lib/Client.php", "main.php"]);
    assert!(diagnostics.is_empty(), "unexpected: {diagnostics:?}");

    let vendor = project
        .store
        .file_by_path("vendor/acme/lib/Client.php")
        .unwrap()
        .unwrap();
    assert_eq!(vendor.class_kind, FileKind::Vendor);
    assert!(vendor.skip_ast);
    // Opaque: the vendor file's own `new` produced no edges.
    assert!(project.store.edges_of(vendor.id).unwrap().is_empty());
}

#[test]
fn empty_entry_closure_is_just_the_entry() {
    let mut project = Project::new(&[("main.php", "#!/usr/bin/env php\n<?php\n")]);

    let (order, diagnostics) = project.run("main.php");
    assert_eq!(order, vec!["main.php"]);
    assert!(diagnostics.is_empty(), "unexpected: {diagnostics:?}");
}

#[test]
fn trait_cycle_through_entry_terminates() {
    let mut project = Project::new(&[
        (
            "main.php",
            "<?php\nclass Runner {\n    use Shared;\n}\n",
        ),
        (
            "Shared.php",
            "<?php\ntrait Shared {\n    public function name() { return Runner::class; }\n}\n",
        ),
    ]);
    project.add_rule(RuleKind::PrefixMap, Some(""), "");

    let (order, _diagnostics) = project.run("main.php");
    assert_eq!(order.len(), 2);
    assert_eq!(order[0], "Shared.php");
    assert_eq!(order[1], "main.php");
}

#[test]
fn dir_include_resolves_relative_to_source_file() {
    let mut project = Project::new(&[
        ("main.php", "<?php\nrequire 'sub/loader.php';\n"),
        ("sub/loader.php", "<?php\nrequire __DIR__ . '/impl.php';\n"),
        ("sub/impl.php", "<?php\n$ok = true;\n"),
    ]);

    let (order, diagnostics) = project.run("main.php");
    assert_eq!(order, vec!["sub/impl.php", "sub/loader.php", "main.php"]);
    assert!(diagnostics.is_empty(), "unexpected: {diagnostics:?}");
}

#[test]
fn rerunning_pipeline_is_idempotent() {
    let mut project = Project::new(&[
        ("main.php", "<?php\nrequire 'a.php';\nnew App\\Svc();\n"),
        ("a.php", "<?php\n$x = 1;\n"),
        ("src/Svc.php", "<?php\nnamespace App;\nclass Svc {}\n"),
    ]);
    project.add_rule(RuleKind::PrefixMap, Some("App\\"), "src/");

    let (first, _) = project.run("main.php");
    let stats_before = project.store.stats().unwrap();

    let (second, diagnostics) = project.run("main.php");
    let stats_after = project.store.stats().unwrap();

    assert_eq!(first, second);
    assert_eq!(stats_before.files, stats_after.files);
    assert_eq!(stats_before.symbols, stats_after.symbols);
    assert_eq!(stats_before.edges, stats_after.edges);
    assert!(diagnostics.is_empty(), "unexpected: {diagnostics:?}");
}

#[test]
fn unresolved_symbol_does_not_fail_pipeline() {
    let mut project = Project::new(&[(
        "main.php",
        "<?php\nnew Phantom\\Service();\nrequire 'real.php';\n",
    ), ("real.php", "<?php\n$v = 1;\n")]);

    let (order, diagnostics) = project.run("main.php");
    assert_eq!(order, vec!["real.php", "main.php"]);
    assert_eq!(diagnostics.warning_count(), 1);
    assert!(diagnostics[0].body.contains("Phantom\\Service"));
}

#[test]
fn exception_hierarchy_recognized_as_external() {
    let mut project = Project::new(&[(
        "main.php",
        "<?php\ntry {\n    throw new RuntimeException('boom');\n} catch (RuntimeException $e) {\n}\n",
    )]);

    let (order, diagnostics) = project.run("main.php");
    assert_eq!(order, vec!["main.php"]);
    assert!(diagnostics.is_empty(), "unexpected: {diagnostics:?}");
}

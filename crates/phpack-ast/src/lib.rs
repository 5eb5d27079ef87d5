//! Parser adapter for the phpack dependency engine.
//!
//! Wraps tree-sitter-php behind a closed node variant set
//! ([`ast::NodeKind`]) plus a name-resolution pass that attaches
//! fully-qualified names to declarations and class references. Callers
//! get exactly the constructs the dependency engine models; everything
//! else survives as a generic node whose children are still traversed.

pub mod ast;
pub mod names;
pub mod parser;
pub mod visit;

pub use ast::{
    Ast, AstNode, IncludeKind, MemberVisibility, Name, NameForm, NodeKind, UseEntry, UseKind,
};
pub use names::resolve_names;
pub use parser::{parse, ParseError};
pub use visit::{walk, Flow, Visitor};

/// Parse and resolve in one step; what the analyzer calls.
pub fn parse_resolved(source: &[u8], filename: &str) -> Result<Ast, ParseError> {
    let mut ast = parse(source, filename)?;
    resolve_names(&mut ast);
    Ok(ast)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(src: &str) -> Ast {
        parse_resolved(src.as_bytes(), "test.php").expect("source should parse")
    }

    fn find<'a>(node: &'a AstNode, pred: &dyn Fn(&AstNode) -> bool) -> Option<&'a AstNode> {
        if pred(node) {
            return Some(node);
        }
        node.children.iter().find_map(|c| find(c, pred))
    }

    #[test]
    fn class_declaration_with_supertypes() {
        let ast = parse_ok(
            r#"<?php
namespace App;

use Core\Contracts\Renderable as View;

class HomeController extends BaseController implements View, \Countable
{
    use Loggable;

    private $service;

    public function index() {}
}
"#,
        );

        let class = find(&ast.root, &|n| matches!(n.kind, NodeKind::Class { .. }))
            .expect("class node");
        assert_eq!(class.fqcn.as_deref(), Some("App\\HomeController"));

        let NodeKind::Class {
            extends,
            implements,
            ..
        } = &class.kind
        else {
            unreachable!()
        };
        assert_eq!(
            extends.as_ref().and_then(|n| n.resolved.as_deref()),
            Some("App\\BaseController")
        );
        let implemented: Vec<_> = implements
            .iter()
            .filter_map(|n| n.resolved.as_deref())
            .collect();
        assert_eq!(
            implemented,
            vec!["Core\\Contracts\\Renderable", "Countable"]
        );

        let use_trait = find(&ast.root, &|n| {
            matches!(n.kind, NodeKind::UseTrait { .. })
        })
        .expect("use-trait node");
        let NodeKind::UseTrait { names } = &use_trait.kind else {
            unreachable!()
        };
        assert_eq!(names[0].resolved.as_deref(), Some("App\\Loggable"));

        let method = find(&ast.root, &|n| matches!(n.kind, NodeKind::Method { .. }))
            .expect("method node");
        assert_eq!(method.fqcn.as_deref(), Some("App\\HomeController::index"));
    }

    #[test]
    fn new_expression_resolves_through_alias() {
        let ast = parse_ok(
            r#"<?php
namespace App;
use Vendor\Widget;
$w = new Widget();
$x = new Local();
$y = new \Outside\Thing();
"#,
        );

        let mut resolved = Vec::new();
        collect_new(&ast.root, &mut resolved);
        assert_eq!(
            resolved,
            vec!["Vendor\\Widget", "App\\Local", "Outside\\Thing"]
        );
    }

    fn collect_new(node: &AstNode, out: &mut Vec<String>) {
        if let NodeKind::New { class: Some(name) } = &node.kind {
            if let Some(fqcn) = &name.resolved {
                out.push(fqcn.clone());
            }
        }
        for child in &node.children {
            collect_new(child, out);
        }
    }

    #[test]
    fn static_references_skip_relative_scopes() {
        let ast = parse_ok(
            r#"<?php
namespace App;
class A {
    public function go() {
        self::helper();
        Registry::lookup('x');
        $v = Config::VERSION;
    }
}
"#,
        );

        let call = find(&ast.root, &|n| {
            matches!(&n.kind, NodeKind::StaticCall { class: Some(_), .. })
        })
        .expect("one named static call");
        assert_eq!(call.fqcn.as_deref(), Some("App\\Registry"));

        let fetch = find(&ast.root, &|n| {
            matches!(&n.kind, NodeKind::ClassConstFetch { class: Some(_), .. })
        })
        .expect("const fetch");
        assert_eq!(fetch.fqcn.as_deref(), Some("App\\Config"));
    }

    #[test]
    fn include_argument_shapes() {
        let ast = parse_ok(
            r#"<?php
require 'lib/a.php';
require_once __DIR__ . '/b.php';
include $dynamic;
"#,
        );

        let includes: Vec<&AstNode> = {
            let mut out = Vec::new();
            collect_includes(&ast.root, &mut out);
            out
        };
        assert_eq!(includes.len(), 3);

        assert!(matches!(
            includes[0].children.first().map(|c| &c.kind),
            Some(NodeKind::StringLiteral { value }) if value == "lib/a.php"
        ));
        assert!(matches!(
            includes[1].children.first().map(|c| &c.kind),
            Some(NodeKind::Concat)
        ));
        let concat = includes[1].children.first().unwrap();
        assert!(matches!(concat.children[0].kind, NodeKind::MagicDir));
    }

    fn collect_includes<'a>(node: &'a AstNode, out: &mut Vec<&'a AstNode>) {
        if matches!(node.kind, NodeKind::Include { .. }) {
            out.push(node);
        }
        for child in &node.children {
            collect_includes(child, out);
        }
    }

    #[test]
    fn anonymous_class_keeps_supertypes_but_no_target() {
        let ast = parse_ok(
            r#"<?php
namespace App;
$h = new class extends Base implements Contract {
    public function run() {}
};
"#,
        );

        let new_node = find(&ast.root, &|n| matches!(n.kind, NodeKind::New { .. }))
            .expect("new node");
        let NodeKind::New { class } = &new_node.kind else {
            unreachable!()
        };
        assert!(class.is_none());

        let anon = find(new_node, &|n| {
            matches!(&n.kind, NodeKind::Class { name: None, .. })
        })
        .expect("anonymous class body");
        let NodeKind::Class { extends, .. } = &anon.kind else {
            unreachable!()
        };
        assert_eq!(
            extends.as_ref().and_then(|n| n.resolved.as_deref()),
            Some("App\\Base")
        );
    }

    #[test]
    fn conditional_wraps_both_branches() {
        let ast = parse_ok(
            r#"<?php
if (PHP_VERSION_ID >= 80000) {
    require 'v8.php';
} else {
    require 'v7.php';
}
"#,
        );
        let conditional = find(&ast.root, &|n| matches!(n.kind, NodeKind::Conditional))
            .expect("conditional node");
        let mut includes = Vec::new();
        collect_includes(conditional, &mut includes);
        assert_eq!(includes.len(), 2);
    }

    #[test]
    fn broken_source_is_a_parse_error() {
        let err = parse_resolved(b"<?php class {", "broken.php").unwrap_err();
        assert_eq!(err.file, "broken.php");
        assert!(err.line >= 1);
    }

    #[test]
    fn group_use_expands_entries() {
        let ast = parse_ok(
            r#"<?php
namespace App;
use Core\{Router, Http\Request as Req};
new Router();
new Req();
"#,
        );
        let mut resolved = Vec::new();
        collect_new(&ast.root, &mut resolved);
        assert_eq!(resolved, vec!["Core\\Router", "Core\\Http\\Request"]);
    }
}

//! Name resolution: attaches fully-qualified names to declarations and
//! class-like references.
//!
//! PHP scoping rules as the engine needs them: a file-scoped
//! `namespace Foo;` applies to every following sibling statement, a
//! braced `namespace Foo { … }` applies to its body, and `use` aliases
//! accumulate until the namespace changes. Resolution of a written name:
//! a leading `\` means absolute; otherwise the first segment is checked
//! against the alias table; otherwise the current namespace is prefixed.

use std::collections::HashMap;

use crate::ast::{Ast, AstNode, Name, NodeKind, UseKind};

#[derive(Debug, Clone, Default)]
struct Scope {
    namespace: String,
    aliases: HashMap<String, String>,
}

impl Scope {
    fn with_namespace(namespace: String) -> Self {
        Self {
            namespace,
            aliases: HashMap::new(),
        }
    }

    fn qualify(&self, short: &str) -> String {
        if self.namespace.is_empty() {
            short.to_string()
        } else {
            format!("{}\\{}", self.namespace, short)
        }
    }

    fn resolve(&self, name: &Name) -> String {
        let written = name.text.as_str();
        if let Some(rest) = written.strip_prefix('\\') {
            return rest.to_string();
        }
        let (first, rest) = match written.split_once('\\') {
            Some((first, rest)) => (first, Some(rest)),
            None => (written, None),
        };
        if let Some(target) = self.aliases.get(first) {
            return match rest {
                Some(rest) => format!("{target}\\{rest}"),
                None => target.clone(),
            };
        }
        self.qualify(written)
    }
}

/// Run the resolution pass over a freshly parsed tree.
pub fn resolve_names(ast: &mut Ast) {
    let mut scope = Scope::default();
    resolve_sequence(&mut ast.root.children, &mut scope, None);
}

/// Siblings are resolved in order so that an unbraced `namespace` or a
/// `use` statement affects everything after it.
fn resolve_sequence(nodes: &mut [AstNode], scope: &mut Scope, enclosing: Option<&str>) {
    for node in nodes {
        resolve_node(node, scope, enclosing);
    }
}

fn resolve_name_in(scope: &Scope, name: &mut Name) {
    if name.is_relative_keyword() {
        return;
    }
    name.resolved = Some(scope.resolve(name));
}

fn resolve_node(node: &mut AstNode, scope: &mut Scope, enclosing: Option<&str>) {
    match &mut node.kind {
        NodeKind::Namespace { name } => {
            let namespace = name.clone().unwrap_or_default();
            node.fqcn = name.clone();
            if node.children.is_empty() {
                *scope = Scope::with_namespace(namespace);
            } else {
                let mut inner = Scope::with_namespace(namespace);
                resolve_sequence(&mut node.children, &mut inner, None);
            }
            return;
        }
        NodeKind::Use { entries } => {
            for entry in entries.iter() {
                // Function and const imports never feed class resolution.
                if entry.kind == UseKind::Class {
                    scope
                        .aliases
                        .insert(entry.alias.clone(), entry.target.clone());
                }
            }
            return;
        }
        NodeKind::Class {
            name,
            extends,
            implements,
            ..
        } => {
            if let Some(extends) = extends {
                resolve_name_in(scope, extends);
            }
            for name in implements.iter_mut() {
                resolve_name_in(scope, name);
            }
            let fqcn = name.as_deref().map(|n| scope.qualify(n));
            node.fqcn = fqcn.clone();
            let mut inner = scope.clone();
            resolve_sequence(&mut node.children, &mut inner, fqcn.as_deref());
            return;
        }
        NodeKind::Interface { name, extends } => {
            for name in extends.iter_mut() {
                resolve_name_in(scope, name);
            }
            let fqcn = scope.qualify(name);
            node.fqcn = Some(fqcn.clone());
            let mut inner = scope.clone();
            resolve_sequence(&mut node.children, &mut inner, Some(&fqcn));
            return;
        }
        NodeKind::Trait { name } => {
            let fqcn = scope.qualify(name);
            node.fqcn = Some(fqcn.clone());
            let mut inner = scope.clone();
            resolve_sequence(&mut node.children, &mut inner, Some(&fqcn));
            return;
        }
        NodeKind::UseTrait { names } => {
            for name in names.iter_mut() {
                resolve_name_in(scope, name);
            }
        }
        NodeKind::Function { name } => {
            node.fqcn = Some(scope.qualify(name));
        }
        NodeKind::Method { name, .. } => {
            node.fqcn = enclosing.map(|class| format!("{class}::{name}"));
        }
        NodeKind::Property { names, .. } => {
            node.fqcn = match (enclosing, names.first()) {
                (Some(class), Some(first)) => Some(format!("{class}::${first}")),
                _ => None,
            };
        }
        NodeKind::New { class } => {
            if let Some(class) = class {
                resolve_name_in(scope, class);
                node.fqcn = class.resolved.clone();
            }
        }
        NodeKind::StaticCall { class, .. } | NodeKind::ClassConstFetch { class, .. } => {
            if let Some(class) = class {
                resolve_name_in(scope, class);
                node.fqcn = class.resolved.clone();
            }
        }
        _ => {}
    }

    let mut inner = scope.clone();
    resolve_sequence(&mut node.children, &mut inner, enclosing);
}

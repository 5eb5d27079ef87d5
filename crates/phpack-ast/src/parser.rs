//! Conversion from the tree-sitter-php parse tree to the closed variant
//! set in [`crate::ast`].
//!
//! The grammar is consumed by node kind strings; anything unrecognized
//! becomes [`NodeKind::Other`] with its named children converted, so the
//! traversal never loses nested constructs.

use tree_sitter::{Node, Parser};

use crate::ast::{
    Ast, AstNode, IncludeKind, MemberVisibility, Name, NodeKind, UseEntry, UseKind,
};

#[derive(Debug, Clone, thiserror::Error)]
#[error("parse error in {file}:{line}: {message}")]
pub struct ParseError {
    pub file: String,
    pub line: u32,
    pub message: String,
}

/// Parse PHP source into the adapter AST.
///
/// tree-sitter is error-tolerant; a tree containing error nodes is
/// rejected here so malformed files surface as a [`ParseError`] the
/// analyzer can log and skip.
pub fn parse(source: &[u8], filename: &str) -> Result<Ast, ParseError> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_php::LANGUAGE_PHP.into())
        .map_err(|e| ParseError {
            file: filename.to_string(),
            line: 0,
            message: format!("grammar load failed: {e}"),
        })?;

    let tree = parser.parse(source, None).ok_or_else(|| ParseError {
        file: filename.to_string(),
        line: 0,
        message: "parser returned no tree".to_string(),
    })?;

    let root = tree.root_node();
    if root.has_error() {
        let (line, what) = first_error(root);
        return Err(ParseError {
            file: filename.to_string(),
            line,
            message: what,
        });
    }

    let mut out = AstNode::new(NodeKind::Root, 1, line_of_end(root));
    convert_children(root, source, &mut out.children);
    Ok(Ast { root: out })
}

fn first_error(node: Node) -> (u32, String) {
    if node.is_error() {
        return (line_of(node), "syntax error".to_string());
    }
    if node.is_missing() {
        return (line_of(node), format!("missing {}", node.kind()));
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.has_error() {
            return first_error(child);
        }
    }
    (line_of(node), "syntax error".to_string())
}

fn line_of(node: Node) -> u32 {
    node.start_position().row as u32 + 1
}

fn line_of_end(node: Node) -> u32 {
    node.end_position().row as u32 + 1
}

fn text<'a>(node: Node, source: &'a [u8]) -> &'a str {
    node.utf8_text(source).unwrap_or_default()
}

/// Extract a written class-like name, if the node is one.
fn name_of(node: Node, source: &[u8]) -> Option<Name> {
    match node.kind() {
        "name" | "qualified_name" => Some(Name::new(text(node, source))),
        _ => None,
    }
}

fn convert_children(node: Node, source: &[u8], out: &mut Vec<AstNode>) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if let Some(converted) = convert(child, source) {
            out.push(converted);
        }
    }
}

fn node_with_children(node: Node, source: &[u8], kind: NodeKind) -> AstNode {
    let mut out = AstNode::new(kind, line_of(node), line_of_end(node));
    convert_children(node, source, &mut out.children);
    out
}

fn convert(node: Node, source: &[u8]) -> Option<AstNode> {
    match node.kind() {
        // Trivia and raw text between PHP tags carry no structure.
        "comment" | "php_tag" | "text" | "text_interpolation" => None,

        "namespace_definition" => Some(convert_namespace(node, source)),
        "namespace_use_declaration" => Some(convert_use(node, source)),
        "class_declaration" => Some(convert_class(node, source)),
        "interface_declaration" => Some(convert_interface(node, source)),
        "trait_declaration" => Some(convert_trait(node, source)),
        "use_declaration" => Some(convert_use_trait(node, source)),
        "function_definition" => Some(convert_function(node, source)),
        "method_declaration" => Some(convert_method(node, source)),
        "property_declaration" => Some(convert_property(node, source)),
        "object_creation_expression" => Some(convert_new(node, source)),
        "scoped_call_expression" => Some(convert_static_call(node, source)),
        "class_constant_access_expression" => Some(convert_const_fetch(node, source)),

        "include_expression" => Some(convert_include(node, source, IncludeKind::Include)),
        "include_once_expression" => Some(convert_include(node, source, IncludeKind::IncludeOnce)),
        "require_expression" => Some(convert_include(node, source, IncludeKind::Require)),
        "require_once_expression" => Some(convert_include(node, source, IncludeKind::RequireOnce)),

        "if_statement" | "else_if_clause" | "else_clause" | "try_statement"
        | "catch_clause" | "finally_clause" | "switch_statement" | "match_expression"
        | "conditional_expression" => {
            Some(node_with_children(node, source, NodeKind::Conditional))
        }

        "string" | "encapsed_string" => convert_string(node, source),

        "binary_expression" => {
            let op = node
                .child_by_field_name("operator")
                .map(|o| text(o, source).to_string())
                .unwrap_or_default();
            if op == "." {
                let mut out = AstNode::new(NodeKind::Concat, line_of(node), line_of_end(node));
                for field in ["left", "right"] {
                    if let Some(side) = node.child_by_field_name(field) {
                        if let Some(converted) = convert(side, source) {
                            out.children.push(converted);
                        } else {
                            // An operand we dropped (comment-only?) makes
                            // the concat unfoldable; keep the arity honest.
                            out.children.push(AstNode::new(
                                NodeKind::Other { raw: side.kind().to_string() },
                                line_of(side),
                                line_of_end(side),
                            ));
                        }
                    }
                }
                Some(out)
            } else {
                Some(node_with_children(
                    node,
                    source,
                    NodeKind::Other { raw: "binary_expression".to_string() },
                ))
            }
        }

        "name" | "magic_constant" if text(node, source) == "__DIR__" => {
            Some(AstNode::new(NodeKind::MagicDir, line_of(node), line_of_end(node)))
        }

        other => Some(node_with_children(
            node,
            source,
            NodeKind::Other { raw: other.to_string() },
        )),
    }
}

fn convert_namespace(node: Node, source: &[u8]) -> AstNode {
    let name = node
        .child_by_field_name("name")
        .map(|n| text(n, source).to_string());
    let mut out = AstNode::new(
        NodeKind::Namespace { name },
        line_of(node),
        line_of_end(node),
    );
    // Braced form only: the body becomes the namespace's children. The
    // unbraced form scopes the siblings that follow it, which the
    // name-resolution pass handles.
    if let Some(body) = node.child_by_field_name("body") {
        convert_children(body, source, &mut out.children);
    }
    out
}

fn convert_use(node: Node, source: &[u8]) -> AstNode {
    let mut kind = UseKind::Class;
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "function" => kind = UseKind::Function,
            "const" => kind = UseKind::Const,
            _ => {}
        }
    }

    let mut entries = Vec::new();
    let mut group_prefix: Option<String> = None;
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "namespace_name" => {
                group_prefix = Some(text(child, source).to_string());
            }
            "namespace_use_clause" => {
                if let Some(entry) = use_clause(child, source, None, kind) {
                    entries.push(entry);
                }
            }
            "namespace_use_group" => {
                let mut inner = child.walk();
                for clause in child.named_children(&mut inner) {
                    if matches!(
                        clause.kind(),
                        "namespace_use_clause" | "namespace_use_group_clause"
                    ) {
                        if let Some(entry) =
                            use_clause(clause, source, group_prefix.as_deref(), kind)
                        {
                            entries.push(entry);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    AstNode::new(NodeKind::Use { entries }, line_of(node), line_of_end(node))
}

fn use_clause(
    clause: Node,
    source: &[u8],
    prefix: Option<&str>,
    kind: UseKind,
) -> Option<UseEntry> {
    let mut target: Option<String> = None;
    let mut alias: Option<String> = None;

    let mut cursor = clause.walk();
    for child in clause.named_children(&mut cursor) {
        match child.kind() {
            "name" | "qualified_name" | "namespace_name" if target.is_none() => {
                target = Some(text(child, source).trim_start_matches('\\').to_string());
            }
            "namespace_aliasing_clause" => {
                let mut inner = child.walk();
                for n in child.named_children(&mut inner) {
                    if n.kind() == "name" {
                        alias = Some(text(n, source).to_string());
                    }
                }
            }
            _ => {}
        }
    }

    let target = target?;
    let target = match prefix {
        Some(p) => format!("{}\\{}", p.trim_end_matches('\\'), target),
        None => target,
    };
    let alias = alias.unwrap_or_else(|| {
        target
            .rsplit('\\')
            .next()
            .unwrap_or(target.as_str())
            .to_string()
    });
    Some(UseEntry { target, alias, kind })
}

/// Shared by named and anonymous classes; the latter pass `name = None`
/// and hang off an `object_creation_expression`.
fn class_node(node: Node, source: &[u8], name: Option<String>) -> AstNode {
    let mut extends = None;
    let mut implements = Vec::new();
    let mut is_abstract = false;
    let mut is_final = false;

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "abstract_modifier" => is_abstract = true,
            "final_modifier" => is_final = true,
            "base_clause" => {
                let mut inner = child.walk();
                for n in child.named_children(&mut inner) {
                    if extends.is_none() {
                        extends = name_of(n, source);
                    }
                }
            }
            "class_interface_clause" => {
                let mut inner = child.walk();
                for n in child.named_children(&mut inner) {
                    if let Some(name) = name_of(n, source) {
                        implements.push(name);
                    }
                }
            }
            _ => {}
        }
    }

    let mut out = AstNode::new(
        NodeKind::Class {
            name,
            extends,
            implements,
            is_abstract,
            is_final,
        },
        line_of(node),
        line_of_end(node),
    );
    if let Some(body) = node.child_by_field_name("body") {
        convert_children(body, source, &mut out.children);
    } else {
        // Anonymous classes keep the body as a direct declaration_list
        // child of the creation expression.
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if child.kind() == "declaration_list" {
                convert_children(child, source, &mut out.children);
            }
        }
    }
    out
}

fn convert_class(node: Node, source: &[u8]) -> AstNode {
    let name = node
        .child_by_field_name("name")
        .map(|n| text(n, source).to_string());
    class_node(node, source, name)
}

fn convert_interface(node: Node, source: &[u8]) -> AstNode {
    let name = node
        .child_by_field_name("name")
        .map(|n| text(n, source).to_string())
        .unwrap_or_default();

    let mut extends = Vec::new();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "base_clause" {
            let mut inner = child.walk();
            for n in child.named_children(&mut inner) {
                if let Some(name) = name_of(n, source) {
                    extends.push(name);
                }
            }
        }
    }

    let mut out = AstNode::new(
        NodeKind::Interface { name, extends },
        line_of(node),
        line_of_end(node),
    );
    if let Some(body) = node.child_by_field_name("body") {
        convert_children(body, source, &mut out.children);
    }
    out
}

fn convert_trait(node: Node, source: &[u8]) -> AstNode {
    let name = node
        .child_by_field_name("name")
        .map(|n| text(n, source).to_string())
        .unwrap_or_default();
    let mut out = AstNode::new(NodeKind::Trait { name }, line_of(node), line_of_end(node));
    if let Some(body) = node.child_by_field_name("body") {
        convert_children(body, source, &mut out.children);
    }
    out
}

fn convert_use_trait(node: Node, source: &[u8]) -> AstNode {
    let mut names = Vec::new();
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if let Some(name) = name_of(child, source) {
            names.push(name);
        }
    }
    AstNode::new(
        NodeKind::UseTrait { names },
        line_of(node),
        line_of_end(node),
    )
}

fn convert_function(node: Node, source: &[u8]) -> AstNode {
    let name = node
        .child_by_field_name("name")
        .map(|n| text(n, source).to_string())
        .unwrap_or_default();
    node_with_children(node, source, NodeKind::Function { name })
}

fn member_modifiers(node: Node, source: &[u8]) -> (MemberVisibility, bool, bool, bool) {
    let mut visibility = MemberVisibility::Public;
    let mut is_static = false;
    let mut is_abstract = false;
    let mut is_final = false;
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "visibility_modifier" => {
                visibility = match text(child, source) {
                    "private" => MemberVisibility::Private,
                    "protected" => MemberVisibility::Protected,
                    _ => MemberVisibility::Public,
                }
            }
            "static_modifier" => is_static = true,
            "abstract_modifier" => is_abstract = true,
            "final_modifier" => is_final = true,
            _ => {}
        }
    }
    (visibility, is_static, is_abstract, is_final)
}

fn convert_method(node: Node, source: &[u8]) -> AstNode {
    let name = node
        .child_by_field_name("name")
        .map(|n| text(n, source).to_string())
        .unwrap_or_default();
    let (visibility, is_static, is_abstract, is_final) = member_modifiers(node, source);
    node_with_children(
        node,
        source,
        NodeKind::Method {
            name,
            visibility,
            is_static,
            is_abstract,
            is_final,
        },
    )
}

fn convert_property(node: Node, source: &[u8]) -> AstNode {
    let (visibility, is_static, _, _) = member_modifiers(node, source);
    let mut names = Vec::new();
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() == "property_element" {
            let mut inner = child.walk();
            for n in child.named_children(&mut inner) {
                if n.kind() == "variable_name" {
                    names.push(text(n, source).trim_start_matches('$').to_string());
                }
            }
        }
    }
    node_with_children(
        node,
        source,
        NodeKind::Property {
            names,
            visibility,
            is_static,
        },
    )
}

fn convert_new(node: Node, source: &[u8]) -> AstNode {
    // Anonymous classes appear either as a nested node or as a body
    // hanging directly off the creation expression, depending on the
    // grammar revision; both shapes collapse to a nameless Class child.
    let mut anon: Option<Node> = None;
    let mut has_inline_body = false;
    let mut class: Option<Name> = None;
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "anonymous_class" | "anonymous_class_declaration" => anon = Some(child),
            "declaration_list" => has_inline_body = true,
            _ => {
                if class.is_none() {
                    class = name_of(child, source);
                }
            }
        }
    }

    let anonymous = anon.is_some() || has_inline_body;
    let mut out = AstNode::new(
        NodeKind::New {
            class: if anonymous { None } else { class },
        },
        line_of(node),
        line_of_end(node),
    );
    if let Some(anon) = anon {
        out.children.push(class_node(anon, source, None));
    } else if has_inline_body {
        out.children.push(class_node(node, source, None));
    } else {
        // Convert arguments so nested creations are reached.
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if child.kind() == "arguments" {
                convert_children(child, source, &mut out.children);
            }
        }
    }
    out
}

fn scope_name(node: Node, source: &[u8]) -> Option<Name> {
    // `self::` / `static::` / `parent::` parse as relative_scope and
    // never name a concrete class; dynamic scopes (`$x::`) are dropped
    // the same way.
    name_of(node, source)
}

fn convert_static_call(node: Node, source: &[u8]) -> AstNode {
    let class = node
        .child_by_field_name("scope")
        .and_then(|s| scope_name(s, source));
    let method = node
        .child_by_field_name("name")
        .map(|n| text(n, source).to_string());
    node_with_children(node, source, NodeKind::StaticCall { class, method })
}

fn convert_const_fetch(node: Node, source: &[u8]) -> AstNode {
    let mut class: Option<Name> = None;
    let mut constant: Option<String> = None;
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if class.is_none() {
            if let Some(name) = scope_name(child, source) {
                class = Some(name);
                continue;
            }
        }
        if child.kind() == "name" {
            constant = Some(text(child, source).to_string());
        }
    }
    AstNode::new(
        NodeKind::ClassConstFetch { class, constant },
        line_of(node),
        line_of_end(node),
    )
}

fn convert_include(node: Node, source: &[u8], kind: IncludeKind) -> AstNode {
    let mut out = AstNode::new(NodeKind::Include { kind }, line_of(node), line_of_end(node));
    convert_children(node, source, &mut out.children);
    out
}

fn convert_string(node: Node, source: &[u8]) -> Option<AstNode> {
    let mut value = String::new();
    let mut literal = true;
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "string_content" => value.push_str(text(child, source)),
            "escape_sequence" => value.push_str(&unescape(text(child, source))),
            // Interpolation makes the value dynamic.
            _ => literal = false,
        }
    }
    let kind = if literal {
        NodeKind::StringLiteral { value }
    } else {
        NodeKind::Other { raw: node.kind().to_string() }
    };
    Some(AstNode::new(kind, line_of(node), line_of_end(node)))
}

fn unescape(seq: &str) -> String {
    match seq {
        "\\\\" => "\\".to_string(),
        "\\'" => "'".to_string(),
        "\\\"" => "\"".to_string(),
        "\\n" => "\n".to_string(),
        "\\r" => "\r".to_string(),
        "\\t" => "\t".to_string(),
        "\\$" => "$".to_string(),
        other => other.to_string(),
    }
}

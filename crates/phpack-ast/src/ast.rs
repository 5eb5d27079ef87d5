//! The closed node variant set produced by the parser adapter.
//!
//! Every PHP construct the dependency engine cares about gets its own
//! variant; everything else falls through to [`NodeKind::Other`], which
//! keeps its children so traversals still reach nested constructs (a
//! `new` inside a closure inside a match arm, for example).

use serde::Serialize;

/// A parsed file. The root node always has kind [`NodeKind::Root`].
#[derive(Debug, Clone)]
pub struct Ast {
    pub root: AstNode,
}

#[derive(Debug, Clone)]
pub struct AstNode {
    pub kind: NodeKind,
    /// 1-indexed line span.
    pub start_line: u32,
    pub end_line: u32,
    /// Fully-qualified name attached by the name-resolution pass: the
    /// declared FQN for definitions, the referenced FQN for class
    /// references. `None` for everything else.
    pub fqcn: Option<String>,
    pub children: Vec<AstNode>,
}

impl AstNode {
    pub fn new(kind: NodeKind, start_line: u32, end_line: u32) -> Self {
        Self {
            kind,
            start_line,
            end_line,
            fqcn: None,
            children: Vec::new(),
        }
    }
}

/// How a name was written at the reference site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NameForm {
    /// `\App\Foo` — already absolute.
    FullyQualified,
    /// `Sub\Foo` — relative to an alias or the current namespace.
    Qualified,
    /// `Foo`
    Unqualified,
}

/// A class-like name reference, before and after resolution.
#[derive(Debug, Clone, Serialize)]
pub struct Name {
    /// The name exactly as written (leading `\` preserved).
    pub text: String,
    pub form: NameForm,
    /// Set by the name-resolution pass; never carries a leading `\`.
    pub resolved: Option<String>,
}

impl Name {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let form = if text.starts_with('\\') {
            NameForm::FullyQualified
        } else if text.contains('\\') {
            NameForm::Qualified
        } else {
            NameForm::Unqualified
        };
        Self {
            text,
            form,
            resolved: None,
        }
    }

    /// `self`, `static` and `parent` never name a concrete class.
    pub fn is_relative_keyword(&self) -> bool {
        matches!(
            self.text.to_ascii_lowercase().as_str(),
            "self" | "static" | "parent"
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UseKind {
    Class,
    Function,
    Const,
}

/// One binding introduced by a `use` statement (group uses are expanded
/// into one entry per clause).
#[derive(Debug, Clone, Serialize)]
pub struct UseEntry {
    /// Aliased target, without a leading `\`.
    pub target: String,
    pub alias: String,
    pub kind: UseKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IncludeKind {
    Include,
    IncludeOnce,
    Require,
    RequireOnce,
}

impl IncludeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncludeKind::Include => "include",
            IncludeKind::IncludeOnce => "include_once",
            IncludeKind::Require => "require",
            IncludeKind::RequireOnce => "require_once",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MemberVisibility {
    Public,
    Protected,
    Private,
}

impl MemberVisibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberVisibility::Public => "public",
            MemberVisibility::Protected => "protected",
            MemberVisibility::Private => "private",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "node")]
pub enum NodeKind {
    Root,
    /// `namespace Foo;` has no children (it scopes the following
    /// siblings); `namespace Foo { … }` carries its body as children.
    Namespace { name: Option<String> },
    Use { entries: Vec<UseEntry> },
    Class {
        /// `None` for anonymous classes.
        name: Option<String>,
        extends: Option<Name>,
        implements: Vec<Name>,
        is_abstract: bool,
        is_final: bool,
    },
    Interface {
        name: String,
        extends: Vec<Name>,
    },
    Trait { name: String },
    /// `use SomeTrait;` inside a class body.
    UseTrait { names: Vec<Name> },
    Function { name: String },
    Method {
        name: String,
        visibility: MemberVisibility,
        is_static: bool,
        is_abstract: bool,
        is_final: bool,
    },
    Property {
        names: Vec<String>,
        visibility: MemberVisibility,
        is_static: bool,
    },
    /// `new Foo(…)`; `class` is `None` for anonymous classes and dynamic
    /// class expressions (`new $x`).
    New { class: Option<Name> },
    StaticCall {
        class: Option<Name>,
        method: Option<String>,
    },
    ClassConstFetch {
        class: Option<Name>,
        constant: Option<String>,
    },
    Include { kind: IncludeKind },
    /// Any syntactic construct that makes execution of its body
    /// conditional: if/elseif/else, try/catch/finally, switch, match,
    /// ternary.
    Conditional,
    StringLiteral { value: String },
    /// The `__DIR__` magic constant.
    MagicDir,
    /// String concatenation (`.`), exactly two children.
    Concat,
    /// Fallthrough for node types the engine does not model; children
    /// are converted and traversed as usual.
    Other { raw: String },
}

impl NodeKind {
    /// Stable type tag used for the stored-AST table.
    pub fn type_name(&self) -> &'static str {
        match self {
            NodeKind::Root => "root",
            NodeKind::Namespace { .. } => "namespace",
            NodeKind::Use { .. } => "use",
            NodeKind::Class { .. } => "class",
            NodeKind::Interface { .. } => "interface",
            NodeKind::Trait { .. } => "trait",
            NodeKind::UseTrait { .. } => "use_trait",
            NodeKind::Function { .. } => "function",
            NodeKind::Method { .. } => "method",
            NodeKind::Property { .. } => "property",
            NodeKind::New { .. } => "new",
            NodeKind::StaticCall { .. } => "static_call",
            NodeKind::ClassConstFetch { .. } => "class_const_fetch",
            NodeKind::Include { .. } => "include",
            NodeKind::Conditional => "conditional",
            NodeKind::StringLiteral { .. } => "string",
            NodeKind::MagicDir => "magic_dir",
            NodeKind::Concat => "concat",
            NodeKind::Other { .. } => "other",
        }
    }
}

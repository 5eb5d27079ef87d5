//! Enter/leave traversal over the adapter AST.

use crate::ast::AstNode;

/// Returned by [`Visitor::enter`] to control descent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Skip the node's children; `leave` is not called for skipped nodes.
    Skip,
}

pub trait Visitor {
    fn enter(&mut self, _node: &AstNode) -> Flow {
        Flow::Continue
    }

    fn leave(&mut self, _node: &AstNode) {}
}

pub fn walk<V: Visitor>(node: &AstNode, visitor: &mut V) {
    if visitor.enter(node) == Flow::Skip {
        return;
    }
    for child in &node.children {
        walk(child, visitor);
    }
    visitor.leave(node);
}

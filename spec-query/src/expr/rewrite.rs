//! Structural rewriting of expression trees
//!
//! [`ExprRewriter`] walks every node and rebuilds the tree bottom-up. Each
//! hook defaults to recursing into the node's children, so an implementation
//! only overrides the node kinds it cares about.

use super::node::{Expr, ParamId};

/// Visitor that produces a rewritten copy of an expression tree
pub trait ExprRewriter {
    /// Rewrite any node, dispatching on its kind
    fn rewrite(&mut self, expr: &Expr) -> Expr {
        match expr {
            Expr::Param(id) => self.rewrite_param(*id),
            Expr::Literal(value) => Expr::Literal(value.clone()),
            Expr::Member { target, field } => self.rewrite_member(target, field),
            Expr::Compare { op, lhs, rhs } => Expr::Compare {
                op: *op,
                lhs: Box::new(self.rewrite(lhs)),
                rhs: Box::new(self.rewrite(rhs)),
            },
            Expr::Logical { op, lhs, rhs } => Expr::Logical {
                op: *op,
                lhs: Box::new(self.rewrite(lhs)),
                rhs: Box::new(self.rewrite(rhs)),
            },
            Expr::Not(inner) => Expr::Not(Box::new(self.rewrite(inner))),
            Expr::Arith { op, lhs, rhs } => Expr::Arith {
                op: *op,
                lhs: Box::new(self.rewrite(lhs)),
                rhs: Box::new(self.rewrite(rhs)),
            },
            Expr::Call {
                target,
                method,
                args,
            } => self.rewrite_call(target, method, args),
        }
    }

    fn rewrite_param(&mut self, id: ParamId) -> Expr {
        Expr::Param(id)
    }

    fn rewrite_member(&mut self, target: &Expr, field: &str) -> Expr {
        Expr::Member {
            target: Box::new(self.rewrite(target)),
            field: field.to_string(),
        }
    }

    fn rewrite_call(&mut self, target: &Expr, method: &str, args: &[Expr]) -> Expr {
        Expr::Call {
            target: Box::new(self.rewrite(target)),
            method: method.to_string(),
            args: args.iter().map(|arg| self.rewrite(arg)).collect(),
        }
    }
}

/// Replaces references to one specific parameter with another
///
/// Only `Param` nodes equal to `old` change; other parameters, literals and
/// the shape of the tree are preserved.
#[derive(Debug, Clone, Copy)]
pub struct ParameterReplacer {
    old: ParamId,
    new: ParamId,
}

impl ParameterReplacer {
    #[must_use]
    pub const fn new(old: ParamId, new: ParamId) -> Self {
        Self { old, new }
    }
}

impl ExprRewriter for ParameterReplacer {
    fn rewrite_param(&mut self, id: ParamId) -> Expr {
        if id == self.old {
            Expr::Param(self.new)
        } else {
            Expr::Param(id)
        }
    }
}

/// Rebind `body` from parameter `old` to parameter `new`
#[must_use]
pub fn replace_parameter(body: &Expr, old: ParamId, new: ParamId) -> Expr {
    ParameterReplacer::new(old, new).rewrite(body)
}

//! Predicate combinator
//!
//! Two predicates each own their parameter. Combining them allocates one
//! fresh parameter, rebinds both bodies to it with [`ParameterReplacer`] and
//! joins the bodies with a logical node. The result is a plain tree with no
//! invocation of either input, so a store translator sees every node.

use super::node::{Expr, LogicalOp, ParamId};
use super::predicate::Predicate;
use super::rewrite::replace_parameter;

/// Join two predicates over the same entity type with `op`
#[must_use]
pub fn combine<T>(lhs: &Predicate<T>, rhs: &Predicate<T>, op: LogicalOp) -> Predicate<T> {
    let param = ParamId::fresh();
    let left = replace_parameter(lhs.body(), lhs.param(), param);
    let right = replace_parameter(rhs.body(), rhs.param(), param);

    let body = Expr::Logical {
        op,
        lhs: Box::new(left),
        rhs: Box::new(right),
    };
    Predicate::from_parts(param, body)
}

impl<T> Predicate<T> {
    /// `self AND other`
    #[must_use]
    pub fn and_also(&self, other: &Self) -> Self {
        combine(self, other, LogicalOp::And)
    }

    /// `self OR other`
    #[must_use]
    pub fn or_else(&self, other: &Self) -> Self {
        combine(self, other, LogicalOp::Or)
    }
}

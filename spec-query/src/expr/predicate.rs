//! Typed boolean predicates over one entity
//!
//! A [`Predicate<T>`] owns exactly one parameter placeholder and a body that
//! refers to it. Bodies are built from a closure that receives the parameter
//! as an expression:
//!
//! ```rust
//! use serde::{Deserialize, Serialize};
//! use spec_query::expr::Predicate;
//!
//! #[derive(Serialize, Deserialize)]
//! struct User {
//!     name: String,
//!     age: i64,
//! }
//!
//! let adults = Predicate::<User>::new(|u| u.field("age").ge(18));
//! let named_a = Predicate::<User>::new(|u| u.field("name").call("starts_with", ["A"]));
//! let both = adults.and_also(&named_a);
//!
//! let ada = User { name: "Ada".into(), age: 36 };
//! assert!(both.test(&ada).unwrap());
//! ```

use std::fmt;
use std::marker::PhantomData;

use serde::Serialize;

use super::eval::{EvalError, Interpreter};
use super::node::{Expr, ParamId};
use super::value::Value;

/// Boolean function of one `T`, represented as an inspectable tree
pub struct Predicate<T> {
    param: ParamId,
    body: Expr,
    // fn pointer keeps the predicate Send + Sync whatever T is
    _entity: PhantomData<fn(&T) -> bool>,
}

impl<T> Predicate<T> {
    /// Build a predicate from a body over a fresh parameter
    pub fn new(build: impl FnOnce(Expr) -> Expr) -> Self {
        let param = ParamId::fresh();
        let body = build(Expr::param(param));
        Self::from_parts(param, body)
    }

    /// Assemble a predicate from an existing parameter and body
    ///
    /// The body is expected to reference no parameter other than `param`.
    #[must_use]
    pub const fn from_parts(param: ParamId, body: Expr) -> Self {
        Self {
            param,
            body,
            _entity: PhantomData,
        }
    }

    /// Predicate that accepts every entity
    #[must_use]
    pub fn always() -> Self {
        Self::new(|_| Expr::lit(true))
    }

    #[must_use]
    pub const fn param(&self) -> ParamId {
        self.param
    }

    #[must_use]
    pub const fn body(&self) -> &Expr {
        &self.body
    }

    /// Logical negation, bound to the same parameter
    #[must_use]
    pub fn not(&self) -> Self {
        Self::from_parts(self.param, self.body.clone().negate())
    }

    /// Whether the predicate holds for a document
    pub fn matches(&self, subject: &Value) -> Result<bool, EvalError> {
        Interpreter::new(self.param, subject).eval_bool(&self.body)
    }
}

impl<T: Serialize> Predicate<T> {
    /// Whether the predicate holds for an entity
    ///
    /// The entity is viewed through its serde representation, the same view
    /// stores use for persisted documents.
    pub fn test(&self, entity: &T) -> Result<bool, EvalError> {
        let subject = serde_json::to_value(entity)
            .map(Value::from)
            .map_err(|e| EvalError::Serialization(e.to_string()))?;
        self.matches(&subject)
    }
}

impl<T> Clone for Predicate<T> {
    fn clone(&self) -> Self {
        Self::from_parts(self.param, self.body.clone())
    }
}

impl<T> PartialEq for Predicate<T> {
    fn eq(&self, other: &Self) -> bool {
        self.param == other.param && self.body == other.body
    }
}

impl<T> fmt::Debug for Predicate<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predicate")
            .field("param", &self.param)
            .field("body", &self.body)
            .finish()
    }
}

impl<T> fmt::Display for Predicate<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} => {}", self.param, self.body)
    }
}

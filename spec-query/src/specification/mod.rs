//! Reusable query specifications
//!
//! A [`Specification<T>`] describes which `T` records a caller wants and in
//! what shape: a filter, related data to eager-load, an ordering and a
//! skip/take window. It says nothing about how a store executes the query;
//! the [`evaluator`](crate::evaluator) turns it into a deferred query.
//!
//! Specifications are frozen values. They are assembled through
//! [`SpecificationBuilder`] and then only read.
//!
//! # Named specifications
//!
//! A reusable query is an ordinary type that converts into a specification:
//!
//! ```rust
//! use spec_query::expr::Predicate;
//! use spec_query::specification::{Ordering, Specification};
//!
//! struct Customer;
//!
//! /// Active customers from one country, most recent first
//! struct ActiveCustomersIn<'a>(&'a str);
//!
//! impl From<ActiveCustomersIn<'_>> for Specification<Customer> {
//!     fn from(named: ActiveCustomersIn<'_>) -> Self {
//!         let country = named.0.to_string();
//!         Specification::define(|b| {
//!             b.add_criteria(Predicate::new(|c| c.field("active").eq(true)))
//!                 .add_criteria(Predicate::new(|c| c.field("country").eq(country)))
//!                 .apply_order_by(Ordering::desc(|c| c.field("signed_up")))
//!         })
//!     }
//! }
//!
//! let spec: Specification<Customer> = ActiveCustomersIn("NO").into();
//! assert!(spec.criteria().is_some());
//! ```

mod builder;
mod include;
mod ordering;
mod pagination;

use std::fmt;

pub use builder::SpecificationBuilder;
pub use include::Include;
pub use ordering::{Ordering, SortDirection, SortKey};
pub use pagination::Pagination;

use crate::expr::Predicate;

/// Filter, includes, ordering and window for a query over `T`
pub struct Specification<T> {
    criteria: Option<Predicate<T>>,
    includes: Vec<Include<T>>,
    order_by: Option<Ordering<T>>,
    skip: Option<usize>,
    take: Option<usize>,
}

impl<T> Specification<T> {
    #[must_use]
    pub fn builder() -> SpecificationBuilder<T> {
        SpecificationBuilder::new()
    }

    /// Build a specification from a builder transformation
    pub fn define(
        configure: impl FnOnce(SpecificationBuilder<T>) -> SpecificationBuilder<T>,
    ) -> Self {
        configure(SpecificationBuilder::new()).build()
    }

    /// Matches every record with no ordering or window
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Combined filter; `None` means no filtering
    #[must_use]
    pub const fn criteria(&self) -> Option<&Predicate<T>> {
        self.criteria.as_ref()
    }

    #[must_use]
    pub fn includes(&self) -> &[Include<T>] {
        &self.includes
    }

    #[must_use]
    pub const fn order_by(&self) -> Option<&Ordering<T>> {
        self.order_by.as_ref()
    }

    #[must_use]
    pub const fn skip(&self) -> Option<usize> {
        self.skip
    }

    #[must_use]
    pub const fn take(&self) -> Option<usize> {
        self.take
    }

    /// Whether a window is set without an ordering to make it stable
    #[must_use]
    pub const fn is_unordered_window(&self) -> bool {
        self.order_by.is_none() && (self.skip.is_some() || self.take.is_some())
    }
}

impl<T> Default for Specification<T> {
    fn default() -> Self {
        Self {
            criteria: None,
            includes: Vec::new(),
            order_by: None,
            skip: None,
            take: None,
        }
    }
}

impl<T> Clone for Specification<T> {
    fn clone(&self) -> Self {
        Self {
            criteria: self.criteria.clone(),
            includes: self.includes.clone(),
            order_by: self.order_by.clone(),
            skip: self.skip,
            take: self.take,
        }
    }
}

impl<T> fmt::Debug for Specification<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Specification")
            .field("criteria", &self.criteria)
            .field("includes", &self.includes)
            .field("order_by", &self.order_by)
            .field("skip", &self.skip)
            .field("take", &self.take)
            .finish()
    }
}

impl<T> From<SpecificationBuilder<T>> for Specification<T> {
    fn from(builder: SpecificationBuilder<T>) -> Self {
        builder.build()
    }
}

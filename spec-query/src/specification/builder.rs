use std::fmt;

use super::{Include, Ordering, Pagination, Specification};
use crate::expr::Predicate;

/// Accumulates the parts of a [`Specification`]
///
/// Every method consumes the builder and returns it, so a specification is
/// assembled in one expression and frozen by [`build`](Self::build).
///
/// # Example
///
/// ```rust
/// use spec_query::expr::Predicate;
/// use spec_query::specification::{Ordering, Specification};
///
/// struct Invoice;
///
/// let spec = Specification::<Invoice>::builder()
///     .add_criteria(Predicate::new(|i| i.field("paid").eq(false)))
///     .add_criteria(Predicate::new(|i| i.field("total").gt(100)))
///     .add_include("customer")
///     .apply_order_by(Ordering::desc(|i| i.field("due")))
///     .apply_paging(0, 25)
///     .build();
///
/// assert!(spec.criteria().is_some());
/// assert_eq!(spec.take(), Some(25));
/// ```
pub struct SpecificationBuilder<T> {
    spec: Specification<T>,
}

impl<T> SpecificationBuilder<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            spec: Specification::default(),
        }
    }

    /// Add a filter, AND-ed with any filter already present
    #[must_use]
    pub fn add_criteria(mut self, predicate: Predicate<T>) -> Self {
        self.spec.criteria = Some(match self.spec.criteria.take() {
            Some(existing) => existing.and_also(&predicate),
            None => predicate,
        });
        self
    }

    /// Append an eager-loading directive; duplicates are kept
    #[must_use]
    pub fn add_include(mut self, include: impl Into<Include<T>>) -> Self {
        self.spec.includes.push(include.into());
        self
    }

    /// Set the ordering, replacing any earlier one
    #[must_use]
    pub fn apply_order_by(mut self, ordering: Ordering<T>) -> Self {
        self.spec.order_by = Some(ordering);
        self
    }

    /// Set both ends of the result window
    #[must_use]
    pub fn apply_paging(mut self, skip: usize, take: usize) -> Self {
        self.spec.skip = Some(skip);
        self.spec.take = Some(take);
        self
    }

    #[must_use]
    pub fn apply_pagination(self, pagination: Pagination) -> Self {
        self.apply_paging(pagination.offset, pagination.limit)
    }

    /// Skip without bounding the number of results
    #[must_use]
    pub fn apply_skip(mut self, skip: usize) -> Self {
        self.spec.skip = Some(skip);
        self
    }

    /// Bound the number of results without skipping
    #[must_use]
    pub fn apply_take(mut self, take: usize) -> Self {
        self.spec.take = Some(take);
        self
    }

    #[must_use]
    pub fn build(self) -> Specification<T> {
        self.spec
    }
}

impl<T> Default for SpecificationBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for SpecificationBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpecificationBuilder")
            .field("spec", &self.spec)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{Expr, LogicalOp};
    use proptest::prelude::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Device {
        id: i64,
        online: bool,
        battery: i64,
    }

    #[test]
    fn test_empty_builder_yields_empty_spec() {
        let spec = SpecificationBuilder::<Device>::new().build();
        assert!(spec.criteria().is_none());
        assert!(spec.includes().is_empty());
        assert!(spec.order_by().is_none());
        assert_eq!(spec.skip(), None);
        assert_eq!(spec.take(), None);
    }

    #[test]
    fn test_repeated_criteria_fold_into_single_root() {
        let online = Predicate::<Device>::new(|d| d.field("online").eq(true));
        let charged = Predicate::<Device>::new(|d| d.field("battery").ge(50));
        let low_id = Predicate::<Device>::new(|d| d.field("id").lt(100));

        let spec = SpecificationBuilder::new()
            .add_criteria(online.clone())
            .add_criteria(charged.clone())
            .add_criteria(low_id.clone())
            .build();
        let criteria = spec.criteria().expect("criteria");

        // ((online AND charged) AND low_id)
        match criteria.body() {
            Expr::Logical { op, lhs, .. } => {
                assert_eq!(*op, LogicalOp::And);
                assert!(matches!(**lhs, Expr::Logical { op: LogicalOp::And, .. }));
            }
            other => panic!("expected a logical root, got {:?}", other),
        }
        assert_eq!(criteria.body().parameters().len(), 1);

        for (online_flag, battery, id) in [(true, 80, 5), (true, 10, 5), (false, 80, 5), (true, 80, 500)] {
            let device = Device {
                id,
                online: online_flag,
                battery,
            };
            let expected = online.test(&device).unwrap()
                && charged.test(&device).unwrap()
                && low_id.test(&device).unwrap();
            assert_eq!(criteria.test(&device).unwrap(), expected);
        }
    }

    #[test]
    fn test_single_criteria_is_kept_as_is() {
        let online = Predicate::<Device>::new(|d| d.field("online").eq(true));
        let spec = SpecificationBuilder::new().add_criteria(online.clone()).build();
        assert_eq!(spec.criteria(), Some(&online));
    }

    #[test]
    fn test_includes_keep_order_and_duplicates() {
        let spec = SpecificationBuilder::<Device>::new()
            .add_include("owner")
            .add_include("readings.sensor")
            .add_include("owner")
            .build();
        let paths: Vec<String> = spec.includes().iter().map(ToString::to_string).collect();
        assert_eq!(paths, ["owner", "readings.sensor", "owner"]);
    }

    #[test]
    fn test_order_by_last_write_wins() {
        let spec = SpecificationBuilder::<Device>::new()
            .apply_order_by(Ordering::asc(|d| d.field("id")))
            .apply_order_by(Ordering::desc(|d| d.field("battery")))
            .build();
        let ordering = spec.order_by().expect("ordering");
        assert_eq!(ordering.keys().len(), 1);
        assert!(ordering.primary().to_string().ends_with(".battery desc"));
    }

    #[test]
    fn test_paging_variants() {
        let both = SpecificationBuilder::<Device>::new().apply_paging(10, 5).build();
        assert_eq!((both.skip(), both.take()), (Some(10), Some(5)));

        let skip_only = SpecificationBuilder::<Device>::new().apply_skip(3).build();
        assert_eq!((skip_only.skip(), skip_only.take()), (Some(3), None));

        let take_only = SpecificationBuilder::<Device>::new().apply_take(7).build();
        assert_eq!((take_only.skip(), take_only.take()), (None, Some(7)));

        let paged = SpecificationBuilder::<Device>::new()
            .apply_pagination(Pagination::page(3, 4))
            .build();
        assert_eq!((paged.skip(), paged.take()), (Some(8), Some(4)));
    }

    const ORDERINGS: [[usize; 3]; 6] = [
        [0, 1, 2],
        [0, 2, 1],
        [1, 0, 2],
        [1, 2, 0],
        [2, 0, 1],
        [2, 1, 0],
    ];

    proptest! {
        #[test]
        fn prop_criteria_order_does_not_change_matches(
            id in -20i64..20,
            online in any::<bool>(),
            battery in 0i64..100,
            max_id in -20i64..20,
            min_battery in 0i64..100,
            want_online in any::<bool>(),
        ) {
            let device = Device { id, online, battery };
            let criteria = [
                Predicate::<Device>::new(|d| d.field("online").eq(want_online)),
                Predicate::<Device>::new(|d| d.field("battery").ge(min_battery)),
                Predicate::<Device>::new(|d| d.field("id").plus(1).lt(max_id)),
            ];
            let expected = criteria.iter().all(|p| p.test(&device).unwrap());

            for order in ORDERINGS {
                let spec = order
                    .iter()
                    .fold(SpecificationBuilder::new(), |b, &i| b.add_criteria(criteria[i].clone()))
                    .build();
                prop_assert_eq!(spec.criteria().unwrap().test(&device).unwrap(), expected);
            }
        }
    }
}

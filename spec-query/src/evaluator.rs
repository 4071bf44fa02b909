//! Translating specifications into deferred queries
//!
//! The evaluator applies the parts of a [`Specification`] to a query source
//! in a fixed order:
//!
//! 1. criteria (`filter`)
//! 2. includes, in insertion order
//! 3. ordering (`order_by`, then `then_by` per tie-breaker)
//! 4. skip
//! 5. take
//!
//! Paging always sees the filtered, ordered sequence. Nothing executes here;
//! translation failures surface when a store runs the resulting plan.

use tracing::trace;

use crate::query::Queryable;
use crate::specification::Specification;

/// Applies a specification to a query source
pub trait SpecificationEvaluator: Send + Sync {
    fn evaluate<T, Q: Queryable<T>>(&self, source: Q, spec: &Specification<T>) -> Q;
}

/// Stateless evaluator using the documented step order
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultEvaluator;

impl SpecificationEvaluator for DefaultEvaluator {
    fn evaluate<T, Q: Queryable<T>>(&self, source: Q, spec: &Specification<T>) -> Q {
        trace!(
            criteria = spec.criteria().is_some(),
            includes = spec.includes().len(),
            ordered = spec.order_by().is_some(),
            skip = ?spec.skip(),
            take = ?spec.take(),
            "Evaluating specification"
        );

        let mut query = source;
        if let Some(criteria) = spec.criteria() {
            query = query.filter(criteria);
        }
        query = spec
            .includes()
            .iter()
            .fold(query, |query, include| query.include(include));
        if let Some(ordering) = spec.order_by() {
            query = ordering.apply(query);
        }
        if let Some(skip) = spec.skip() {
            query = query.skip(skip);
        }
        if let Some(take) = spec.take() {
            query = query.take(take);
        }
        query
    }
}

/// Evaluate `spec` against `source` with the [`DefaultEvaluator`]
pub fn evaluate<T, Q: Queryable<T>>(source: Q, spec: &Specification<T>) -> Q {
    DefaultEvaluator.evaluate(source, spec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Predicate;
    use crate::query::{Query, QueryOp};
    use crate::specification::{Include, Ordering, SortKey};

    struct Song;

    /// Records each call as a short label
    #[derive(Default)]
    struct Recorder(Vec<String>);

    impl Queryable<Song> for Recorder {
        fn filter(mut self, _: &Predicate<Song>) -> Self {
            self.0.push("filter".into());
            self
        }

        fn include(mut self, include: &Include<Song>) -> Self {
            self.0.push(format!("include:{}", include));
            self
        }

        fn order_by(mut self, key: &SortKey<Song>) -> Self {
            self.0.push(format!("order_by:{}", key.direction()));
            self
        }

        fn then_by(mut self, key: &SortKey<Song>) -> Self {
            self.0.push(format!("then_by:{}", key.direction()));
            self
        }

        fn skip(mut self, count: usize) -> Self {
            self.0.push(format!("skip:{}", count));
            self
        }

        fn take(mut self, count: usize) -> Self {
            self.0.push(format!("take:{}", count));
            self
        }
    }

    #[test]
    fn test_fixed_application_order() {
        // builder calls deliberately out of evaluation order
        let spec = Specification::<Song>::builder()
            .apply_paging(2, 3)
            .apply_order_by(Ordering::asc(|s| s.field("album")).then_desc(|s| s.field("track")))
            .add_include("artist")
            .add_criteria(Predicate::new(|s| s.field("length").gt(60)))
            .add_include("album.label")
            .build();

        let calls = evaluate(Recorder::default(), &spec).0;
        assert_eq!(
            calls,
            [
                "filter",
                "include:artist",
                "include:album.label",
                "order_by:asc",
                "then_by:desc",
                "skip:2",
                "take:3",
            ]
        );
    }

    #[test]
    fn test_absent_parts_are_skipped() {
        let calls = evaluate(Recorder::default(), &Specification::<Song>::all()).0;
        assert!(calls.is_empty());

        let take_only = Specification::<Song>::define(|b| b.apply_take(4));
        assert_eq!(evaluate(Recorder::default(), &take_only).0, ["take:4"]);

        let skip_only = Specification::<Song>::define(|b| b.apply_skip(4));
        assert_eq!(evaluate(Recorder::default(), &skip_only).0, ["skip:4"]);
    }

    #[test]
    fn test_evaluation_is_deterministic() {
        let spec = Specification::<Song>::define(|b| {
            b.add_criteria(Predicate::new(|s| s.field("explicit").eq(false)))
                .add_include("artist")
                .apply_order_by(Ordering::by(SortKey::field("title")))
                .apply_paging(5, 5)
        });

        let first = DefaultEvaluator.evaluate(Query::<Song>::new("songs"), &spec).into_plan();
        let second = DefaultEvaluator.evaluate(Query::<Song>::new("songs"), &spec).into_plan();
        assert_eq!(first, second);
        assert!(matches!(first.ops()[0], QueryOp::Filter { .. }));
        assert_eq!(first.ops().len(), 5);
    }
}

//! Specification-driven repository over a [`Session`]

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use tracing::{debug, error};

use super::error::{RepositoryError, RepositoryErrorKind, RepositoryOperation};
use super::traits::{Entity, Repository, RepositoryResult};
use crate::config::RepositoryConfig;
use crate::evaluator::{DefaultEvaluator, SpecificationEvaluator};
use crate::query::{Query, QueryPlan};
use crate::specification::Specification;
use crate::store::{Change, CommitReceipt, Document, FetchMode, Session, StoreError};

/// [`Repository`] that evaluates specifications into query plans
///
/// Reads evaluate the specification against a fresh [`Query`] and hand the
/// resulting plan to the session's store. Writes stage one change and commit
/// it immediately.
///
/// # Example
///
/// ```rust
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), spec_query::repository::RepositoryError> {
/// use std::sync::Arc;
/// use serde::{Deserialize, Serialize};
/// use spec_query::expr::Predicate;
/// use spec_query::repository::{Entity, Repository, SpecRepository};
/// use spec_query::specification::Specification;
/// use spec_query::store::{MemoryStore, Session};
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// struct Task {
///     id: Option<u64>,
///     done: bool,
/// }
///
/// impl Entity for Task {
///     const COLLECTION: &'static str = "tasks";
///     fn id(&self) -> Option<u64> {
///         self.id
///     }
/// }
///
/// let session = Arc::new(Session::new(Arc::new(MemoryStore::new())));
/// let tasks = SpecRepository::<Task>::new(session);
///
/// tasks.add(Task { id: None, done: false }).await?;
/// tasks.add(Task { id: None, done: true }).await?;
///
/// let open = Specification::<Task>::define(|b| {
///     b.add_criteria(Predicate::new(|t| t.field("done").eq(false)))
/// });
/// assert_eq!(tasks.count(&open).await?, 1);
/// # Ok(())
/// # }
/// ```
pub struct SpecRepository<T, E = DefaultEvaluator> {
    session: Arc<Session>,
    evaluator: E,
    log_query_plans: bool,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> SpecRepository<T> {
    pub fn new(session: Arc<Session>) -> Self {
        Self {
            session,
            evaluator: DefaultEvaluator,
            log_query_plans: false,
            _entity: PhantomData,
        }
    }
}

impl<T: Entity, E: SpecificationEvaluator> SpecRepository<T, E> {
    /// Replace the evaluator used to turn specifications into plans
    pub fn with_evaluator<F: SpecificationEvaluator>(self, evaluator: F) -> SpecRepository<T, F> {
        SpecRepository {
            session: self.session,
            evaluator,
            log_query_plans: self.log_query_plans,
            _entity: PhantomData,
        }
    }

    /// Apply repository settings from configuration
    #[must_use]
    pub fn with_config(mut self, config: &RepositoryConfig) -> Self {
        self.log_query_plans = config.log_query_plans;
        self
    }

    #[must_use]
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Plan the store would execute for `spec`
    pub fn plan(&self, spec: &Specification<T>) -> QueryPlan {
        self.evaluator
            .evaluate(Query::<T>::new(T::COLLECTION), spec)
            .into_plan()
    }

    fn store_error(operation: RepositoryOperation) -> impl Fn(StoreError) -> RepositoryError {
        move |err| {
            error!(
                entity = T::entity_name(),
                operation = %operation,
                error = %err,
                "Store operation failed"
            );
            RepositoryError::from_store(operation, err).with_entity_type(T::entity_name())
        }
    }

    async fn fetch(
        &self,
        operation: RepositoryOperation,
        plan: &QueryPlan,
        mode: FetchMode,
    ) -> RepositoryResult<Vec<T>> {
        if self.log_query_plans {
            debug!(
                entity = T::entity_name(),
                operation = %operation,
                plan = %plan,
                "Executing query plan"
            );
        } else {
            debug!(entity = T::entity_name(), operation = %operation, "Executing query");
        }

        let documents = self
            .session
            .fetch(plan, mode)
            .await
            .map_err(Self::store_error(operation))?;
        documents
            .into_iter()
            .map(|document| decode(operation, document))
            .collect()
    }

    async fn commit(
        &self,
        operation: RepositoryOperation,
        change: Change,
        entity_id: Option<u64>,
    ) -> RepositoryResult<CommitReceipt> {
        debug!(entity = T::entity_name(), operation = %operation, id = ?entity_id, "Committing change");
        self.session.stage(change).await;
        self.session.save_changes().await.map_err(|err| {
            let error = Self::store_error(operation)(err);
            match entity_id {
                Some(id) => error.with_entity(T::entity_name(), id.to_string()),
                None => error,
            }
        })
    }

    fn encode(operation: RepositoryOperation, entity: &T) -> RepositoryResult<Document> {
        serde_json::to_value(entity).map_err(|e| {
            RepositoryError::serialization_error(operation, e.to_string())
                .with_entity_type(T::entity_name())
        })
    }

    fn require_id(operation: RepositoryOperation, entity: &T) -> RepositoryResult<u64> {
        entity.id().ok_or_else(|| {
            RepositoryError::validation_failed(operation, "entity has not been persisted")
                .with_entity_type(T::entity_name())
        })
    }
}

fn decode<T: Entity>(operation: RepositoryOperation, document: Document) -> RepositoryResult<T> {
    serde_json::from_value(document).map_err(|e| {
        RepositoryError::serialization_error(operation, e.to_string())
            .with_entity_type(T::entity_name())
    })
}

impl<T: Entity, E: SpecificationEvaluator> Repository<T> for SpecRepository<T, E> {
    async fn list_all(&self) -> RepositoryResult<Vec<T>> {
        let plan = QueryPlan::new(T::COLLECTION);
        self.fetch(RepositoryOperation::ListAll, &plan, FetchMode::All)
            .await
    }

    async fn list(&self, spec: &Specification<T>) -> RepositoryResult<Vec<T>> {
        let plan = self.plan(spec);
        self.fetch(RepositoryOperation::List, &plan, FetchMode::All)
            .await
    }

    async fn first_or_default(&self, spec: &Specification<T>) -> RepositoryResult<Option<T>> {
        let plan = self.plan(spec);
        let rows = self
            .fetch(RepositoryOperation::FirstOrDefault, &plan, FetchMode::First)
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn count(&self, spec: &Specification<T>) -> RepositoryResult<u64> {
        let plan = self.plan(spec);
        if self.log_query_plans {
            debug!(
                entity = T::entity_name(),
                operation = %RepositoryOperation::Count,
                plan = %plan,
                "Counting query plan"
            );
        }
        self.session
            .count(&plan)
            .await
            .map_err(Self::store_error(RepositoryOperation::Count))
    }

    async fn add(&self, entity: T) -> RepositoryResult<T> {
        let operation = RepositoryOperation::Add;
        let document = Self::encode(operation, &entity)?;
        let receipt = self
            .commit(operation, Change::insert(T::COLLECTION, document), entity.id())
            .await?;

        let stored = receipt.inserted.into_iter().next().ok_or_else(|| {
            RepositoryError::new(
                operation,
                RepositoryErrorKind::Other,
                "store reported no inserted document",
            )
            .with_entity_type(T::entity_name())
        })?;
        decode(operation, stored)
    }

    async fn update(&self, entity: &T) -> RepositoryResult<()> {
        let operation = RepositoryOperation::Update;
        let id = Self::require_id(operation, entity)?;
        let document = Self::encode(operation, entity)?;
        self.commit(operation, Change::update(T::COLLECTION, id, document), Some(id))
            .await?;
        Ok(())
    }

    async fn delete(&self, entity: &T) -> RepositoryResult<()> {
        let operation = RepositoryOperation::Delete;
        let id = Self::require_id(operation, entity)?;
        self.commit(operation, Change::delete(T::COLLECTION, id), Some(id))
            .await?;
        Ok(())
    }
}

impl<T, E: fmt::Debug> fmt::Debug for SpecRepository<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpecRepository")
            .field("entity", &std::any::type_name::<T>())
            .field("evaluator", &self.evaluator)
            .field("log_query_plans", &self.log_query_plans)
            .finish()
    }
}

#[cfg(all(test, feature = "memory-store"))]
mod tests {
    use super::*;
    use crate::expr::Predicate;
    use crate::query::Queryable;
    use crate::specification::{Ordering, Pagination};
    use crate::store::{MemoryStore, Relation};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Customer {
        id: Option<u64>,
        name: String,
        country: String,
        active: bool,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        orders: Vec<Order>,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Order {
        id: Option<u64>,
        customer_id: u64,
        total: i64,
    }

    impl Entity for Customer {
        const COLLECTION: &'static str = "customers";

        fn id(&self) -> Option<u64> {
            self.id
        }
    }

    impl Entity for Order {
        const COLLECTION: &'static str = "orders";

        fn id(&self) -> Option<u64> {
            self.id
        }
    }

    fn customer(name: &str, country: &str, active: bool) -> Customer {
        Customer {
            id: None,
            name: name.to_string(),
            country: country.to_string(),
            active,
            orders: Vec::new(),
        }
    }

    fn setup() -> (Arc<MemoryStore>, SpecRepository<Customer>, SpecRepository<Order>) {
        let store = Arc::new(
            MemoryStore::new()
                .with_relation(Relation::has_many("customers", "orders", "orders", "customer_id")),
        );
        let session = Arc::new(Session::new(store.clone()));
        let customers = SpecRepository::new(session.clone());
        let orders = SpecRepository::new(session);
        (store, customers, orders)
    }

    fn by_id(id: u64) -> Specification<Customer> {
        Specification::define(|b| b.add_criteria(Predicate::new(|c| c.field("id").eq(id as i64))))
    }

    fn ids(customers: &[Customer]) -> Vec<u64> {
        customers.iter().filter_map(|c| c.id).collect()
    }

    #[tokio::test]
    async fn test_add_then_find_round_trip() {
        let (_, customers, _) = setup();
        let added = customers.add(customer("Ada", "UK", true)).await.unwrap();
        let id = added.id.expect("assigned id");

        let found = customers.first_or_default(&by_id(id)).await.unwrap();
        assert_eq!(found, Some(added));
    }

    #[tokio::test]
    async fn test_first_or_default_without_match_is_none() {
        let (_, customers, _) = setup();
        customers.add(customer("Ada", "UK", true)).await.unwrap();
        assert_eq!(customers.first_or_default(&by_id(999)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_ordered_paging_selects_window() {
        let (_, customers, _) = setup();
        for i in 0..10 {
            customers
                .add(customer(&format!("c{}", i), "NO", true))
                .await
                .unwrap();
        }

        let spec = Specification::define(|b| {
            b.apply_order_by(Ordering::asc(|c| c.field("id")))
                .apply_paging(2, 3)
        });
        assert_eq!(ids(&customers.list(&spec).await.unwrap()), [3, 4, 5]);

        let last_page = Specification::define(|b| {
            b.apply_order_by(Ordering::asc(|c| c.field("id")))
                .apply_pagination(Pagination::page(4, 3))
        });
        assert_eq!(ids(&customers.list(&last_page).await.unwrap()), [10]);
    }

    #[tokio::test]
    async fn test_unordered_window_size() {
        let (_, customers, _) = setup();
        for i in 0..5 {
            customers
                .add(customer(&format!("c{}", i), "NO", true))
                .await
                .unwrap();
        }
        let spec = Specification::<Customer>::define(|b| b.apply_take(3));
        assert_eq!(customers.list(&spec).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_empty_specification_lists_everything() {
        let (_, customers, _) = setup();
        customers.add(customer("Ada", "UK", true)).await.unwrap();
        customers.add(customer("Bo", "SE", false)).await.unwrap();

        let all = customers.list(&Specification::all()).await.unwrap();
        assert_eq!(all, customers.list_all().await.unwrap());
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_composed_criteria_and_count() {
        let (_, customers, _) = setup();
        customers.add(customer("Ada", "UK", true)).await.unwrap();
        customers.add(customer("Bo", "UK", false)).await.unwrap();
        customers.add(customer("Cy", "FR", true)).await.unwrap();

        let active_uk = Specification::define(|b| {
            b.add_criteria(Predicate::new(|c| c.field("active").eq(true)))
                .add_criteria(Predicate::new(|c| c.field("country").eq("UK")))
        });
        let found = customers.list(&active_uk).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Ada");
        assert_eq!(customers.count(&active_uk).await.unwrap(), 1);
        assert_eq!(customers.count(&Specification::all()).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let (store, customers, _) = setup();
        let mut ada = customers.add(customer("Ada", "UK", true)).await.unwrap();

        ada.active = false;
        customers.update(&ada).await.unwrap();
        let reloaded = customers
            .first_or_default(&by_id(ada.id.unwrap()))
            .await
            .unwrap()
            .unwrap();
        assert!(!reloaded.active);

        customers.delete(&ada).await.unwrap();
        assert_eq!(store.document_count("customers").await, 0);

        let err = customers.update(&ada).await.unwrap_err();
        assert_eq!(err.kind, RepositoryErrorKind::ConcurrencyConflict);
        assert_eq!(err.operation, RepositoryOperation::Update);
        assert_eq!(err.entity_id.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_unsaved_entity_cannot_be_updated() {
        let (_, customers, _) = setup();
        let err = customers
            .delete(&customer("Ghost", "UK", true))
            .await
            .unwrap_err();
        assert_eq!(err.kind, RepositoryErrorKind::ValidationFailed);
        assert_eq!(err.entity_type.as_deref(), Some("Customer"));
    }

    #[tokio::test]
    async fn test_constraint_violation_leaves_store_unchanged() {
        let (store, customers, _) = setup();
        let ada = customers.add(customer("Ada", "UK", true)).await.unwrap();

        let mut duplicate = customer("Imposter", "UK", true);
        duplicate.id = ada.id;
        let err = customers.add(duplicate).await.unwrap_err();

        assert_eq!(err.kind, RepositoryErrorKind::ConstraintViolation);
        assert_eq!(err.message, "customers with id 1 already exists");
        assert_eq!(store.document_count("customers").await, 1);
        assert_eq!(customers.session().pending().await, 0);
    }

    #[tokio::test]
    async fn test_connectivity_loss_is_retriable() {
        let (store, customers, _) = setup();
        customers.add(customer("Ada", "UK", true)).await.unwrap();

        store.disconnect();
        let read = customers.list_all().await.unwrap_err();
        let write = customers
            .add(customer("Bo", "UK", true))
            .await
            .unwrap_err();
        assert_eq!(read.kind, RepositoryErrorKind::ConnectionFailed);
        assert!(read.is_retriable());
        assert_eq!(write.operation, RepositoryOperation::Add);
        assert!(write.is_retriable());

        store.reconnect();
        assert_eq!(customers.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_untranslatable_criteria_fail_at_materialization() {
        let (_, customers, _) = setup();
        customers.add(customer("Ada", "UK", true)).await.unwrap();

        let spec = Specification::define(|b| {
            b.add_criteria(Predicate::new(|c| {
                c.field("name").call("sounds_like", ["Ada"])
            }))
        });
        let err = customers.list(&spec).await.unwrap_err();
        assert_eq!(err.kind, RepositoryErrorKind::TranslationFailed);
        assert!(err.message.contains("sounds_like"));
    }

    #[tokio::test]
    async fn test_include_loads_related_entities() {
        let (_, customers, orders) = setup();
        let ada = customers.add(customer("Ada", "UK", true)).await.unwrap();
        let bo = customers.add(customer("Bo", "UK", true)).await.unwrap();
        for (owner, total) in [(&ada, 10), (&ada, 25), (&bo, 40)] {
            orders
                .add(Order {
                    id: None,
                    customer_id: owner.id.unwrap(),
                    total,
                })
                .await
                .unwrap();
        }

        let spec = Specification::define(|b| {
            b.add_include("orders")
                .apply_order_by(Ordering::asc(|c| c.field("name")))
        });
        let loaded = customers.list(&spec).await.unwrap();
        let totals: Vec<i64> = loaded[0].orders.iter().map(|o| o.total).collect();
        assert_eq!(totals, [10, 25]);
        assert_eq!(loaded[1].orders.len(), 1);

        let without = customers.list_all().await.unwrap();
        assert!(without.iter().all(|c| c.orders.is_empty()));
    }

    #[tokio::test]
    async fn test_update_after_include_does_not_store_related_entities() {
        let (store, customers, orders) = setup();
        let ada = customers.add(customer("Ada", "UK", true)).await.unwrap();
        let order = orders
            .add(Order {
                id: None,
                customer_id: ada.id.unwrap(),
                total: 10,
            })
            .await
            .unwrap();

        let with_orders = Specification::define(|b| b.add_include("orders"));
        let mut loaded = customers.list(&with_orders).await.unwrap().remove(0);
        assert_eq!(loaded.orders, [order.clone()]);

        loaded.name = "Ada L".to_string();
        customers.update(&loaded).await.unwrap();
        orders.delete(&order).await.unwrap();

        let all = customers.list_all().await.unwrap();
        assert_eq!(all[0].name, "Ada L");
        assert!(all[0].orders.is_empty());
        assert!(store.snapshot("customers").await[0].get("orders").is_none());
    }

    /// Ignores paging so every matching row is returned
    #[derive(Debug)]
    struct Unpaged;

    impl SpecificationEvaluator for Unpaged {
        fn evaluate<T, Q: Queryable<T>>(&self, source: Q, spec: &Specification<T>) -> Q {
            match spec.criteria() {
                Some(criteria) => source.filter(criteria),
                None => source,
            }
        }
    }

    #[tokio::test]
    async fn test_injected_evaluator_is_used() {
        let (_, customers, _) = setup();
        for i in 0..4 {
            customers
                .add(customer(&format!("c{}", i), "NO", true))
                .await
                .unwrap();
        }
        let customers = customers.with_evaluator(Unpaged);
        let spec = Specification::<Customer>::define(|b| b.apply_paging(1, 1));

        assert_eq!(customers.plan(&spec).ops().len(), 0);
        assert_eq!(customers.list(&spec).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_plan_records_evaluation_order() {
        let (_, customers, _) = setup();
        let customers = customers.with_config(&RepositoryConfig {
            default_page_size: 10,
            log_query_plans: true,
        });
        let spec = Specification::define(|b| {
            b.apply_take(3)
                .add_criteria(Predicate::new(|c| c.field("active").eq(true)))
                .add_include("orders")
        });
        let text = customers.plan(&spec).to_string();
        assert!(text.starts_with("customers: filter("), "{}", text);
        assert!(text.ends_with("-> include(orders) -> take(3)"), "{}", text);
        assert!(customers.list(&spec).await.unwrap().is_empty());
    }
}

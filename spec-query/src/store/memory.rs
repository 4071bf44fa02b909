//! In-memory document store
//!
//! Collections are maps from `u64` id to JSON document. Query plans are
//! executed by interpreting each recorded step over a snapshot of the
//! collection, so everything a [`QueryPlan`] can express is supported.
//!
//! # Example
//!
//! ```rust
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), spec_query::store::StoreError> {
//! use serde_json::json;
//! use spec_query::query::QueryPlan;
//! use spec_query::store::{Change, DataStore, FetchMode, MemoryStore, Relation};
//!
//! let store = MemoryStore::new()
//!     .with_relation(Relation::has_many("authors", "books", "books", "author_id"));
//!
//! store
//!     .commit(vec![
//!         Change::insert("authors", json!({"id": 1, "name": "Le Guin"})),
//!         Change::insert("books", json!({"id": null, "author_id": 1, "title": "Lathe"})),
//!     ])
//!     .await?;
//!
//! let authors = store.fetch(&QueryPlan::new("authors"), FetchMode::All).await?;
//! assert_eq!(authors.len(), 1);
//! # Ok(())
//! # }
//! ```

use std::cmp::Ordering as CmpOrdering;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, trace, warn};

use super::{Change, CommitReceipt, DataStore, Document, FetchMode, StoreError, StoreResult};
use crate::expr::{Interpreter, Value};
use crate::query::{PlanSortKey, QueryOp, QueryPlan};
use crate::specification::SortDirection;

/// How a navigation on one collection reaches records of another
#[derive(Debug, Clone, PartialEq, Eq)]
enum RelationKind {
    /// Target records whose `foreign_key` equals the owner's id
    HasMany { foreign_key: String },
    /// The target record whose id equals the owner's `local_key`
    BelongsTo { local_key: String },
}

/// A navigation that includes can load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    owner: String,
    navigation: String,
    target: String,
    kind: RelationKind,
}

impl Relation {
    /// `owner.navigation` is the list of `target` records pointing back via `foreign_key`
    pub fn has_many(
        owner: impl Into<String>,
        navigation: impl Into<String>,
        target: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            navigation: navigation.into(),
            target: target.into(),
            kind: RelationKind::HasMany {
                foreign_key: foreign_key.into(),
            },
        }
    }

    /// `owner.navigation` is the single `target` record referenced by `local_key`
    pub fn belongs_to(
        owner: impl Into<String>,
        navigation: impl Into<String>,
        target: impl Into<String>,
        local_key: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            navigation: navigation.into(),
            target: target.into(),
            kind: RelationKind::BelongsTo {
                local_key: local_key.into(),
            },
        }
    }

    fn resolve(&self, tables: &Tables, owner: &Document) -> Document {
        let empty = BTreeMap::new();
        let targets = tables.rows.get(&self.target).unwrap_or(&empty);
        match &self.kind {
            RelationKind::HasMany { foreign_key } => {
                let owner_id = owner.get("id").and_then(Document::as_u64);
                let related = targets
                    .values()
                    .filter(|doc| {
                        owner_id.is_some()
                            && doc.get(foreign_key).and_then(Document::as_u64) == owner_id
                    })
                    .cloned()
                    .collect();
                Document::Array(related)
            }
            RelationKind::BelongsTo { local_key } => owner
                .get(local_key)
                .and_then(Document::as_u64)
                .and_then(|id| targets.get(&id))
                .cloned()
                .unwrap_or(Document::Null),
        }
    }
}

/// Nested include paths, merged so a navigation loads once per plan
#[derive(Debug, Default)]
struct IncludeTree(BTreeMap<String, IncludeTree>);

impl IncludeTree {
    fn insert(&mut self, path: &[String]) {
        if let Some((head, rest)) = path.split_first() {
            self.0.entry(head.clone()).or_default().insert(rest);
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Tables {
    rows: HashMap<String, BTreeMap<u64, Document>>,
    next_ids: HashMap<String, u64>,
}

impl Tables {
    fn apply(
        &mut self,
        change: Change,
        unique: &[(String, String)],
        receipt: &mut CommitReceipt,
    ) -> StoreResult<()> {
        match change {
            Change::Insert {
                collection,
                mut document,
            } => {
                let id = match document.get("id") {
                    None | Some(Document::Null) => self.allocate_id(&collection),
                    Some(explicit) => {
                        let id = explicit.as_u64().ok_or_else(|| {
                            StoreError::Serialization(format!(
                                "id of {} document must be an unsigned integer, got {}",
                                collection, explicit
                            ))
                        })?;
                        if self.contains(&collection, id) {
                            return Err(StoreError::ConstraintViolation(format!(
                                "{} with id {} already exists",
                                collection, id
                            )));
                        }
                        self.reserve_id(&collection, id);
                        id
                    }
                };
                set_id(&mut document, &collection, id)?;
                self.check_unique(&collection, id, &document, unique)?;
                self.rows
                    .entry(collection)
                    .or_default()
                    .insert(id, document.clone());
                receipt.inserted.push(document);
            }
            Change::Update {
                collection,
                id,
                mut document,
            } => {
                if !self.contains(&collection, id) {
                    return Err(StoreError::ConcurrencyConflict(format!(
                        "{} with id {} does not exist",
                        collection, id
                    )));
                }
                set_id(&mut document, &collection, id)?;
                self.check_unique(&collection, id, &document, unique)?;
                self.rows.entry(collection).or_default().insert(id, document);
                receipt.updated += 1;
            }
            Change::Delete { collection, id } => {
                let removed = self
                    .rows
                    .get_mut(&collection)
                    .and_then(|table| table.remove(&id));
                if removed.is_none() {
                    return Err(StoreError::ConcurrencyConflict(format!(
                        "{} with id {} does not exist",
                        collection, id
                    )));
                }
                receipt.deleted += 1;
            }
        }
        Ok(())
    }

    fn contains(&self, collection: &str, id: u64) -> bool {
        self.rows
            .get(collection)
            .is_some_and(|table| table.contains_key(&id))
    }

    fn allocate_id(&mut self, collection: &str) -> u64 {
        let next = self.next_ids.entry(collection.to_string()).or_insert(1);
        let id = *next;
        *next += 1;
        id
    }

    fn reserve_id(&mut self, collection: &str, id: u64) {
        let next = self.next_ids.entry(collection.to_string()).or_insert(1);
        *next = (*next).max(id.saturating_add(1));
    }

    fn check_unique(
        &self,
        collection: &str,
        id: u64,
        document: &Document,
        unique: &[(String, String)],
    ) -> StoreResult<()> {
        let Some(table) = self.rows.get(collection) else {
            return Ok(());
        };
        for (_, field) in unique.iter().filter(|(c, _)| c == collection) {
            let Some(value) = document.get(field).filter(|v| !v.is_null()) else {
                continue;
            };
            let clash = table
                .iter()
                .any(|(other_id, other)| *other_id != id && other.get(field) == Some(value));
            if clash {
                return Err(StoreError::ConstraintViolation(format!(
                    "duplicate value {} for unique field {}.{}",
                    value, collection, field
                )));
            }
        }
        Ok(())
    }
}

fn set_id(document: &mut Document, collection: &str, id: u64) -> StoreResult<()> {
    match document.as_object_mut() {
        Some(fields) => {
            fields.insert("id".to_string(), Document::from(id));
            Ok(())
        }
        None => Err(StoreError::Serialization(format!(
            "{} documents must be JSON objects",
            collection
        ))),
    }
}

/// Process-local store of JSON documents
pub struct MemoryStore {
    tables: RwLock<Tables>,
    relations: Vec<Relation>,
    unique: Vec<(String, String)>,
    connected: AtomicBool,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            relations: Vec::new(),
            unique: Vec::new(),
            connected: AtomicBool::new(true),
        }
    }

    /// Register a navigation that includes can load
    #[must_use]
    pub fn with_relation(mut self, relation: Relation) -> Self {
        self.relations.push(relation);
        self
    }

    /// Reject commits that would store two documents with the same `field` value
    #[must_use]
    pub fn with_unique(mut self, collection: impl Into<String>, field: impl Into<String>) -> Self {
        self.unique.push((collection.into(), field.into()));
        self
    }

    /// Make every subsequent call fail with [`StoreError::ConnectionFailed`]
    pub fn disconnect(&self) {
        warn!("Memory store disconnected");
        self.connected.store(false, AtomicOrdering::SeqCst);
    }

    pub fn reconnect(&self) {
        self.connected.store(true, AtomicOrdering::SeqCst);
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(AtomicOrdering::SeqCst)
    }

    /// Number of documents currently stored in `collection`
    pub async fn document_count(&self, collection: &str) -> usize {
        self.tables
            .read()
            .await
            .rows
            .get(collection)
            .map_or(0, BTreeMap::len)
    }

    /// Copy of a collection in id order
    pub async fn snapshot(&self, collection: &str) -> Vec<Document> {
        self.tables
            .read()
            .await
            .rows
            .get(collection)
            .map(|table| table.values().cloned().collect())
            .unwrap_or_default()
    }

    fn ensure_connected(&self) -> StoreResult<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(StoreError::ConnectionFailed(
                "memory store is disconnected".to_string(),
            ))
        }
    }

    /// Drop loaded navigation fields so related data is never stored inline
    fn detach_navigations(&self, change: &mut Change) {
        let (collection, document) = match change {
            Change::Insert {
                collection,
                document,
            }
            | Change::Update {
                collection,
                document,
                ..
            } => (collection, document),
            Change::Delete { .. } => return,
        };
        if let Some(fields) = document.as_object_mut() {
            for relation in self.relations.iter().filter(|r| r.owner == *collection) {
                fields.remove(&relation.navigation);
            }
        }
    }

    fn relation(&self, owner: &str, navigation: &str) -> StoreResult<&Relation> {
        self.relations
            .iter()
            .find(|r| r.owner == owner && r.navigation == navigation)
            .ok_or_else(|| {
                StoreError::Translation(format!(
                    "no navigation `{}` is registered on {}",
                    navigation, owner
                ))
            })
    }

    fn execute(&self, tables: &Tables, plan: &QueryPlan) -> StoreResult<Vec<Document>> {
        let collection = plan.collection();
        let mut rows: Vec<Document> = tables
            .rows
            .get(collection)
            .map(|table| table.values().cloned().collect())
            .unwrap_or_default();
        let mut includes = IncludeTree::default();
        let mut sort_keys: Vec<&PlanSortKey> = Vec::new();

        for op in plan.ops() {
            match op {
                QueryOp::Filter { param, body } => {
                    let mut kept = Vec::with_capacity(rows.len());
                    for row in rows {
                        let subject = Value::from(&row);
                        if Interpreter::new(*param, &subject).eval_bool(body)? {
                            kept.push(row);
                        }
                    }
                    rows = kept;
                }
                QueryOp::Include { path } => {
                    includes.insert(path);
                    for row in &mut rows {
                        self.load(tables, collection, row, &includes)?;
                    }
                }
                QueryOp::OrderBy(key) => {
                    sort_keys = vec![key];
                    rows = sort_rows(rows, &sort_keys)?;
                }
                QueryOp::ThenBy(key) => {
                    sort_keys.push(key);
                    rows = sort_rows(rows, &sort_keys)?;
                }
                QueryOp::Skip { count } => {
                    let skipped = (*count).min(rows.len());
                    rows.drain(..skipped);
                }
                QueryOp::Take { count } => rows.truncate(*count),
            }
        }
        Ok(rows)
    }

    fn load(
        &self,
        tables: &Tables,
        collection: &str,
        row: &mut Document,
        includes: &IncludeTree,
    ) -> StoreResult<()> {
        for (navigation, nested) in &includes.0 {
            let relation = self.relation(collection, navigation)?;
            let mut related = relation.resolve(tables, row);
            if let Document::Array(items) = &mut related {
                for item in items {
                    self.load(tables, &relation.target, item, nested)?;
                }
            } else if related.is_object() {
                self.load(tables, &relation.target, &mut related, nested)?;
            }
            if let Some(fields) = row.as_object_mut() {
                fields.insert(navigation.clone(), related);
            }
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Stable sort by the composite key; the primary key comes first
fn sort_rows(rows: Vec<Document>, keys: &[&PlanSortKey]) -> StoreResult<Vec<Document>> {
    let mut keyed = Vec::with_capacity(rows.len());
    for row in rows {
        let subject = Value::from(&row);
        let values = keys
            .iter()
            .map(|key| Interpreter::new(key.param, &subject).eval(&key.key))
            .collect::<Result<Vec<_>, _>>()?;
        keyed.push((values, row));
    }

    keyed.sort_by(|(a, _), (b, _)| {
        a.iter()
            .zip(b)
            .zip(keys)
            .map(|((x, y), key)| match key.direction {
                SortDirection::Ascending => x.total_cmp(y),
                SortDirection::Descending => y.total_cmp(x),
            })
            .find(|ordering| *ordering != CmpOrdering::Equal)
            .unwrap_or(CmpOrdering::Equal)
    });
    Ok(keyed.into_iter().map(|(_, row)| row).collect())
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn fetch(&self, plan: &QueryPlan, mode: FetchMode) -> StoreResult<Vec<Document>> {
        self.ensure_connected()?;
        let tables = self.tables.read().await;
        let mut rows = self.execute(&tables, plan).map_err(|e| {
            debug!(plan = %plan, error = %e, "Plan execution failed");
            e
        })?;
        if mode == FetchMode::First {
            rows.truncate(1);
        }
        trace!(plan = %plan, rows = rows.len(), "Fetched documents");
        Ok(rows)
    }

    async fn count(&self, plan: &QueryPlan) -> StoreResult<u64> {
        self.ensure_connected()?;
        let tables = self.tables.read().await;
        let rows = self.execute(&tables, plan)?;
        Ok(rows.len() as u64)
    }

    async fn commit(&self, changes: Vec<Change>) -> StoreResult<CommitReceipt> {
        self.ensure_connected()?;
        let mut tables = self.tables.write().await;

        // applied to a copy; the live tables change only if every change succeeds
        let mut next = tables.clone();
        let mut receipt = CommitReceipt::default();
        for mut change in changes {
            self.detach_navigations(&mut change);
            next.apply(change, &self.unique, &mut receipt)?;
        }
        *tables = next;

        debug!(
            inserted = receipt.inserted.len(),
            updated = receipt.updated,
            deleted = receipt.deleted,
            "Committed changes"
        );
        Ok(receipt)
    }
}

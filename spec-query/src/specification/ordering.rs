//! Sort keys and compound orderings

use std::fmt;
use std::marker::PhantomData;

use crate::expr::{Expr, ParamId};
use crate::query::Queryable;

/// Direction for ordering results
///
/// ```rust
/// use spec_query::specification::SortDirection;
///
/// assert_eq!(SortDirection::Ascending.to_string(), "asc");
/// assert_eq!(SortDirection::Descending.to_string(), "desc");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    /// Smallest key first
    #[default]
    Ascending,
    /// Largest key first
    Descending,
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ascending => write!(f, "asc"),
            Self::Descending => write!(f, "desc"),
        }
    }
}

/// One key of an ordering: an expression over `T` and a direction
pub struct SortKey<T> {
    param: ParamId,
    key: Expr,
    direction: SortDirection,
    _entity: PhantomData<fn(&T)>,
}

impl<T> SortKey<T> {
    /// Key selected by `select` over a fresh parameter
    pub fn new(select: impl FnOnce(Expr) -> Expr, direction: SortDirection) -> Self {
        let param = ParamId::fresh();
        Self {
            param,
            key: select(Expr::param(param)),
            direction,
            _entity: PhantomData,
        }
    }

    pub fn asc(select: impl FnOnce(Expr) -> Expr) -> Self {
        Self::new(select, SortDirection::Ascending)
    }

    pub fn desc(select: impl FnOnce(Expr) -> Expr) -> Self {
        Self::new(select, SortDirection::Descending)
    }

    /// Ascending by a top-level field
    pub fn field(name: &str) -> Self {
        Self::asc(|e| e.field(name))
    }

    #[must_use]
    pub const fn param(&self) -> ParamId {
        self.param
    }

    #[must_use]
    pub const fn key(&self) -> &Expr {
        &self.key
    }

    #[must_use]
    pub const fn direction(&self) -> SortDirection {
        self.direction
    }

    /// The same key in the opposite direction
    #[must_use]
    pub fn reversed(&self) -> Self {
        let direction = match self.direction {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        };
        Self {
            direction,
            ..self.clone()
        }
    }
}

impl<T> Clone for SortKey<T> {
    fn clone(&self) -> Self {
        Self {
            param: self.param,
            key: self.key.clone(),
            direction: self.direction,
            _entity: PhantomData,
        }
    }
}

impl<T> fmt::Debug for SortKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SortKey")
            .field("param", &self.param)
            .field("key", &self.key)
            .field("direction", &self.direction)
            .finish()
    }
}

impl<T> fmt::Display for SortKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.key, self.direction)
    }
}

/// Primary sort key followed by tie-breakers
///
/// Applying an ordering turns a query into an ordered query: the primary
/// key goes through [`Queryable::order_by`] and each tie-breaker through
/// [`Queryable::then_by`].
///
/// # Example
///
/// ```rust
/// use spec_query::specification::Ordering;
///
/// struct Product;
///
/// let by_price_then_name = Ordering::<Product>::desc(|p| p.field("price"))
///     .then_asc(|p| p.field("name"));
/// assert_eq!(by_price_then_name.keys().len(), 2);
/// ```
pub struct Ordering<T> {
    primary: SortKey<T>,
    then: Vec<SortKey<T>>,
}

impl<T> Ordering<T> {
    #[must_use]
    pub const fn by(primary: SortKey<T>) -> Self {
        Self {
            primary,
            then: Vec::new(),
        }
    }

    pub fn asc(select: impl FnOnce(Expr) -> Expr) -> Self {
        Self::by(SortKey::asc(select))
    }

    pub fn desc(select: impl FnOnce(Expr) -> Expr) -> Self {
        Self::by(SortKey::desc(select))
    }

    #[must_use]
    pub fn then(mut self, key: SortKey<T>) -> Self {
        self.then.push(key);
        self
    }

    #[must_use]
    pub fn then_asc(self, select: impl FnOnce(Expr) -> Expr) -> Self {
        self.then(SortKey::asc(select))
    }

    #[must_use]
    pub fn then_desc(self, select: impl FnOnce(Expr) -> Expr) -> Self {
        self.then(SortKey::desc(select))
    }

    #[must_use]
    pub const fn primary(&self) -> &SortKey<T> {
        &self.primary
    }

    /// All keys, primary first
    #[must_use]
    pub fn keys(&self) -> Vec<&SortKey<T>> {
        std::iter::once(&self.primary).chain(&self.then).collect()
    }

    /// Order `source` by the primary key, then by each tie-breaker
    pub fn apply<Q: Queryable<T>>(&self, source: Q) -> Q {
        self.then
            .iter()
            .fold(source.order_by(&self.primary), |query, key| query.then_by(key))
    }
}

impl<T> Clone for Ordering<T> {
    fn clone(&self) -> Self {
        Self {
            primary: self.primary.clone(),
            then: self.then.clone(),
        }
    }
}

impl<T> fmt::Debug for Ordering<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.keys()).finish()
    }
}

impl<T> From<SortKey<T>> for Ordering<T> {
    fn from(primary: SortKey<T>) -> Self {
        Self::by(primary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ticket;

    #[test]
    fn test_keys_keep_declaration_order() {
        let ordering = Ordering::<Ticket>::asc(|t| t.field("priority"))
            .then_desc(|t| t.field("opened_at"))
            .then(SortKey::field("id"));

        let rendered: Vec<String> = ordering.keys().iter().map(|k| k.to_string()).collect();
        assert_eq!(rendered.len(), 3);
        assert!(rendered[0].ends_with(".priority asc"));
        assert!(rendered[1].ends_with(".opened_at desc"));
        assert!(rendered[2].ends_with(".id asc"));
    }

    #[test]
    fn test_reversed_key() {
        let key = SortKey::<Ticket>::field("id");
        let reversed = key.reversed();
        assert_eq!(reversed.direction(), SortDirection::Descending);
        assert_eq!(reversed.key(), key.key());
        assert_eq!(reversed.param(), key.param());
    }
}

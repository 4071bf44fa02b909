//! Eager-loading directives

use std::fmt;
use std::marker::PhantomData;

/// Navigation path naming related data to load alongside `T`
///
/// A path has at least one segment. `orders` loads the `orders` navigation
/// of each root entity; `orders.lines` additionally loads `lines` on every
/// loaded order.
///
/// # Example
///
/// ```rust
/// use spec_query::specification::Include;
///
/// struct Customer;
///
/// let nested = Include::<Customer>::new("orders").then_include("lines");
/// assert_eq!(nested.to_string(), "orders.lines");
/// assert_eq!(Include::<Customer>::from("orders.lines"), nested);
/// ```
pub struct Include<T> {
    path: Vec<String>,
    _entity: PhantomData<fn(&T)>,
}

impl<T> Include<T> {
    /// Include a single navigation of the root entity
    pub fn new(navigation: impl Into<String>) -> Self {
        Self {
            path: vec![navigation.into()],
            _entity: PhantomData,
        }
    }

    /// Extend the path one level deeper
    #[must_use]
    pub fn then_include(mut self, navigation: impl Into<String>) -> Self {
        self.path.push(navigation.into());
        self
    }

    /// Navigation names from the root outwards
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.path
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.path.len()
    }
}

/// Parse a dotted path such as `orders.lines`
impl<T> From<&str> for Include<T> {
    fn from(path: &str) -> Self {
        let mut segments = path.split('.');
        let first = segments.next().unwrap_or_default();
        segments.fold(Self::new(first), |include, segment| include.then_include(segment))
    }
}

impl<T> Clone for Include<T> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            _entity: PhantomData,
        }
    }
}

impl<T> PartialEq for Include<T> {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl<T> Eq for Include<T> {}

impl<T> fmt::Debug for Include<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Include").field(&self.path).finish()
    }
}

impl<T> fmt::Display for Include<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.join("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Order;

    #[test]
    fn test_dotted_path_parsing() {
        let include = Include::<Order>::from("customer.address");
        assert_eq!(include.segments(), ["customer", "address"]);
        assert_eq!(include.depth(), 2);
    }

    #[test]
    fn test_single_segment() {
        let include = Include::<Order>::from("lines");
        assert_eq!(include, Include::new("lines"));
        assert_eq!(include.to_string(), "lines");
    }
}

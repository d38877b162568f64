use std::collections::hash_map::{self, HashMap};
use std::fmt;

// Attributes — Typed key/value parameters of a node
//
// Each value is one of four variants. Lookups never fail: `get` returns the
// caller's default when the key is missing *or* holds a different variant,
// so `attrs.get("stride", 1)` on a node whose stride was stored as a float
// silently yields 1.

/// One attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
    Float(f32),
    Int(i32),
    Ints(Vec<i32>),
    Bool(bool),
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attribute::Float(v) => write!(f, "{}", v),
            Attribute::Int(v) => write!(f, "{}", v),
            Attribute::Ints(v) => write!(f, "{:?}", v),
            Attribute::Bool(v) => write!(f, "{}", v),
        }
    }
}

impl From<f32> for Attribute {
    fn from(v: f32) -> Self {
        Attribute::Float(v)
    }
}

impl From<i32> for Attribute {
    fn from(v: i32) -> Self {
        Attribute::Int(v)
    }
}

impl From<Vec<i32>> for Attribute {
    fn from(v: Vec<i32>) -> Self {
        Attribute::Ints(v)
    }
}

impl From<bool> for Attribute {
    fn from(v: bool) -> Self {
        Attribute::Bool(v)
    }
}

/// Rust types an [`Attribute`] can be read back as.
pub trait FromAttribute: Sized {
    /// `None` unless `attr` holds exactly this type's variant.
    fn from_attribute(attr: &Attribute) -> Option<Self>;
}

impl FromAttribute for f32 {
    fn from_attribute(attr: &Attribute) -> Option<Self> {
        match attr {
            Attribute::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromAttribute for i32 {
    fn from_attribute(attr: &Attribute) -> Option<Self> {
        match attr {
            Attribute::Int(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromAttribute for Vec<i32> {
    fn from_attribute(attr: &Attribute) -> Option<Self> {
        match attr {
            Attribute::Ints(v) => Some(v.clone()),
            _ => None,
        }
    }
}

impl FromAttribute for bool {
    fn from_attribute(attr: &Attribute) -> Option<Self> {
        match attr {
            Attribute::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

/// Attribute bag of a node.
///
/// # Example
/// ```
/// use saga::Attributes;
///
/// let attrs = Attributes::new().with("stride", 2).with("pad", 0);
/// assert_eq!(attrs.get("stride", 1), 2);
/// assert_eq!(attrs.get("dilation", 1), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes(HashMap<String, Attribute>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Attribute>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Attribute>) {
        self.0.insert(key.into(), value.into());
    }

    /// Typed lookup with fallback.
    pub fn get<T: FromAttribute>(&self, key: &str, default: T) -> T {
        self.0
            .get(key)
            .and_then(T::from_attribute)
            .unwrap_or(default)
    }

    /// Typed lookup without fallback.
    pub fn try_get<T: FromAttribute>(&self, key: &str) -> Option<T> {
        self.0.get(key).and_then(T::from_attribute)
    }

    pub fn raw(&self, key: &str) -> Option<&Attribute> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> hash_map::Iter<'_, String, Attribute> {
        self.0.iter()
    }
}

impl<K: Into<String>> FromIterator<(K, Attribute)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, Attribute)>>(iter: I) -> Self {
        Attributes(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

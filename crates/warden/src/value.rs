//! Values held in store fields
//!
//! A field holds plain JSON-like data, a nested store, or a lazy provider.
//! JSON containers have value semantics (cloning copies them); nested stores
//! are [`SharedStore`] handles with reference semantics.

use crate::store::Store;
use serde_json::{Map, Number, Value as JsonValue};
use std::cell::{Ref, RefCell, RefMut};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// Zero-argument function realizing a field on access
///
/// A provider may return plain data or a store. Returning a clone of an
/// existing [`SharedStore`] hands out a back-reference to that store.
pub type Provider = Rc<dyn Fn() -> StoreValue>;

/// Object payload
pub type StoreMap = BTreeMap<String, StoreValue>;

/// Reference-semantics handle to a nested store
///
/// All clones point to the same store. Equality is identity: two handles
/// are equal only when they share an allocation.
#[derive(Clone)]
pub struct SharedStore(Rc<RefCell<Store>>);

impl SharedStore {
    pub fn new(store: Store) -> Self {
        SharedStore(Rc::new(RefCell::new(store)))
    }

    /// Borrow the store and apply a read function.
    pub fn with<R>(&self, f: impl FnOnce(&Store) -> R) -> R {
        f(&self.0.borrow())
    }

    /// Borrow the store mutably and apply a mutation function.
    ///
    /// Panics if the store is already borrowed. Store operations reached
    /// through paths never call this; they use the `try_` borrows.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut Store) -> R) -> R {
        f(&mut self.0.borrow_mut())
    }

    /// Direct shared borrow, for callers that need to hold it
    pub fn borrow(&self) -> Ref<'_, Store> {
        self.0.borrow()
    }

    /// Shared borrow, or `None` while a write holds the store
    pub fn try_borrow(&self) -> Option<Ref<'_, Store>> {
        self.0.try_borrow().ok()
    }

    /// Mutable borrow, or `None` while the store is in use
    pub fn try_borrow_mut(&self) -> Option<RefMut<'_, Store>> {
        self.0.try_borrow_mut().ok()
    }

    /// Returns true if this handle points at `store`.
    pub(crate) fn holds(&self, store: &Store) -> bool {
        std::ptr::eq(self.0.as_ptr(), store)
    }

    pub fn ptr_eq(&self, other: &SharedStore) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Returns true if this is the only handle to the store.
    pub fn is_exclusively_owned(&self) -> bool {
        Rc::strong_count(&self.0) == 1
    }
}

impl PartialEq for SharedStore {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for SharedStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow_mut() {
            Ok(store) => fmt::Debug::fmt(&*store, f),
            Err(_) => f.write_str("Store(<borrowed>)"),
        }
    }
}

impl From<Store> for SharedStore {
    fn from(store: Store) -> Self {
        SharedStore::new(store)
    }
}

/// Field value
#[derive(Clone, Default)]
pub enum StoreValue {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<StoreValue>),
    Object(StoreMap),
    /// Nested store with its own type and default policy
    Store(SharedStore),
    /// Provider invoked whenever the field is traversed
    Lazy(Provider),
}

impl StoreValue {
    /// Wrap a closure as a lazy provider
    pub fn lazy(provider: impl Fn() -> StoreValue + 'static) -> Self {
        StoreValue::Lazy(Rc::new(provider))
    }

    /// Empty object
    pub fn object() -> Self {
        StoreValue::Object(StoreMap::new())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            StoreValue::Null => "null",
            StoreValue::Bool(_) => "bool",
            StoreValue::Number(_) => "number",
            StoreValue::String(_) => "string",
            StoreValue::Array(_) => "array",
            StoreValue::Object(_) => "object",
            StoreValue::Store(_) => "store",
            StoreValue::Lazy(_) => "provider",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, StoreValue::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            StoreValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            StoreValue::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            StoreValue::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            StoreValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[StoreValue]> {
        match self {
            StoreValue::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&StoreMap> {
        match self {
            StoreValue::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_store(&self) -> Option<&SharedStore> {
        match self {
            StoreValue::Store(store) => Some(store),
            _ => None,
        }
    }

    /// Child at `segment` of an object (by key) or array (by index)
    pub fn get(&self, segment: &str) -> Option<&StoreValue> {
        match self {
            StoreValue::Object(map) => map.get(segment),
            StoreValue::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        }
    }

    /// Owned variant of [`get`](Self::get)
    pub(crate) fn into_child(self, segment: &str) -> Option<StoreValue> {
        match self {
            StoreValue::Object(mut map) => map.remove(segment),
            StoreValue::Array(mut items) => {
                let index = segment.parse::<usize>().ok()?;
                (index < items.len()).then(|| items.swap_remove(index))
            }
            _ => None,
        }
    }

    /// JSON snapshot
    ///
    /// Nested stores export their readable entries. A nested store that is
    /// already in use, including one met again through a cycle, exports an
    /// empty object. Providers are not invoked: they are left out of objects
    /// and become `null` in arrays.
    pub fn to_json(&self) -> JsonValue {
        match self {
            StoreValue::Null | StoreValue::Lazy(_) => JsonValue::Null,
            StoreValue::Bool(b) => JsonValue::Bool(*b),
            StoreValue::Number(n) => JsonValue::Number(n.clone()),
            StoreValue::String(s) => JsonValue::String(s.clone()),
            StoreValue::Array(items) => {
                JsonValue::Array(items.iter().map(StoreValue::to_json).collect())
            }
            StoreValue::Object(map) => JsonValue::Object(
                map.iter()
                    .filter(|(_, v)| !matches!(v, StoreValue::Lazy(_)))
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            StoreValue::Store(store) => JsonValue::Object(
                store
                    .try_borrow_mut()
                    .map(|s| s.entries())
                    .unwrap_or_default(),
            ),
        }
    }
}

impl PartialEq for StoreValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (StoreValue::Null, StoreValue::Null) => true,
            (StoreValue::Bool(a), StoreValue::Bool(b)) => a == b,
            (StoreValue::Number(a), StoreValue::Number(b)) => a == b,
            (StoreValue::String(a), StoreValue::String(b)) => a == b,
            (StoreValue::Array(a), StoreValue::Array(b)) => a == b,
            (StoreValue::Object(a), StoreValue::Object(b)) => a == b,
            (StoreValue::Store(a), StoreValue::Store(b)) => a == b,
            (StoreValue::Lazy(a), StoreValue::Lazy(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl PartialEq<JsonValue> for StoreValue {
    fn eq(&self, other: &JsonValue) -> bool {
        match self {
            StoreValue::Lazy(_) => false,
            _ => self.to_json() == *other,
        }
    }
}

impl fmt::Debug for StoreValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreValue::Null => write!(f, "Null"),
            StoreValue::Bool(b) => write!(f, "Bool({})", b),
            StoreValue::Number(n) => write!(f, "Number({})", n),
            StoreValue::String(s) => write!(f, "String({:?})", s),
            StoreValue::Array(items) => f.debug_list().entries(items).finish(),
            StoreValue::Object(map) => f.debug_map().entries(map).finish(),
            StoreValue::Store(store) => fmt::Debug::fmt(store, f),
            StoreValue::Lazy(_) => write!(f, "Lazy(<provider>)"),
        }
    }
}

impl From<JsonValue> for StoreValue {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => StoreValue::Null,
            JsonValue::Bool(b) => StoreValue::Bool(b),
            JsonValue::Number(n) => StoreValue::Number(n),
            JsonValue::String(s) => StoreValue::String(s),
            JsonValue::Array(items) => {
                StoreValue::Array(items.into_iter().map(StoreValue::from).collect())
            }
            JsonValue::Object(map) => StoreValue::from(map),
        }
    }
}

impl From<Map<String, JsonValue>> for StoreValue {
    fn from(map: Map<String, JsonValue>) -> Self {
        StoreValue::Object(
            map.into_iter()
                .map(|(k, v)| (k, StoreValue::from(v)))
                .collect(),
        )
    }
}

impl From<bool> for StoreValue {
    fn from(b: bool) -> Self {
        StoreValue::Bool(b)
    }
}

impl From<i32> for StoreValue {
    fn from(n: i32) -> Self {
        StoreValue::Number(n.into())
    }
}

impl From<i64> for StoreValue {
    fn from(n: i64) -> Self {
        StoreValue::Number(n.into())
    }
}

impl From<u64> for StoreValue {
    fn from(n: u64) -> Self {
        StoreValue::Number(n.into())
    }
}

/// Non-finite floats have no JSON representation and become `Null`.
impl From<f64> for StoreValue {
    fn from(n: f64) -> Self {
        Number::from_f64(n)
            .map(StoreValue::Number)
            .unwrap_or(StoreValue::Null)
    }
}

impl From<&str> for StoreValue {
    fn from(s: &str) -> Self {
        StoreValue::String(s.to_string())
    }
}

impl From<String> for StoreValue {
    fn from(s: String) -> Self {
        StoreValue::String(s)
    }
}

impl From<Vec<StoreValue>> for StoreValue {
    fn from(items: Vec<StoreValue>) -> Self {
        StoreValue::Array(items)
    }
}

impl From<StoreMap> for StoreValue {
    fn from(map: StoreMap) -> Self {
        StoreValue::Object(map)
    }
}

impl From<SharedStore> for StoreValue {
    fn from(store: SharedStore) -> Self {
        StoreValue::Store(store)
    }
}

impl From<Store> for StoreValue {
    fn from(store: Store) -> Self {
        StoreValue::Store(SharedStore::new(store))
    }
}

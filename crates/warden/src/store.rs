//! Permission-gated hierarchical store
//!
//! Fields are addressed with colon-delimited paths. Each store checks only
//! the segment that leaves it: the first segment on reads, the terminal
//! segment on writes. Crossing into a nested store hands the remaining
//! segments to that store, which applies its own type's permissions.
//! Plain JSON data inside a field is indexed structurally without further
//! checks.

use crate::audit::{AuditEvent, AuditLogger};
use crate::error::{Operation, StoreError, StoreResult};
use crate::options::StoreOptions;
use crate::path::{StorePath, SEPARATOR};
use crate::permission::Permission;
use crate::preprocess::Preprocessor;
use crate::registry::TypeKey;
use crate::resolver::{PermissionResolver, Resolution};
use crate::value::{SharedStore, StoreMap, StoreValue};
use serde_json::{Map, Value as JsonValue};
use std::borrow::Cow;
use std::fmt;

/// A typed collection of permission-checked fields
pub struct Store {
    type_key: TypeKey,
    default_policy: Permission,
    fields: StoreMap,
    options: StoreOptions,
}

impl Store {
    /// Base-type store with default options
    pub fn new() -> Self {
        Self::with_options(TypeKey::base(), StoreOptions::default())
    }

    /// Store of a registered type, using default options
    pub fn of_type(type_key: impl Into<TypeKey>) -> Self {
        Self::with_options(type_key, StoreOptions::default())
    }

    /// Store of `type_key` using `options` for registry, audit and defaults
    pub fn with_options(type_key: impl Into<TypeKey>, options: StoreOptions) -> Self {
        let type_key = type_key.into();
        if !options.registry.contains(&type_key) {
            log::warn!(
                "store created with undefined type '{}'; only its default policy applies",
                type_key
            );
        }
        Self {
            type_key,
            default_policy: options.default_policy,
            fields: StoreMap::new(),
            options,
        }
    }

    pub fn with_default_policy(mut self, policy: Permission) -> Self {
        self.default_policy = policy;
        self
    }

    /// Initialize a field without any permission check.
    ///
    /// This is the constructor-time escape hatch used to seed fields that
    /// callers are not allowed to write themselves.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<StoreValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn into_shared(self) -> SharedStore {
        SharedStore::new(self)
    }

    pub fn type_key(&self) -> &TypeKey {
        &self.type_key
    }

    pub fn default_policy(&self) -> Permission {
        self.default_policy
    }

    pub fn set_default_policy(&mut self, policy: Permission) {
        self.default_policy = policy;
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn resolver(&self) -> PermissionResolver<'_> {
        PermissionResolver::new(&self.options.registry, &self.type_key, self.default_policy)
    }

    /// How the permission of `field` is decided
    pub fn resolution(&self, field: &str) -> Resolution {
        self.resolver().resolve(field)
    }

    /// Effective permission of `field`
    pub fn permission_for(&self, field: &str) -> Permission {
        self.resolver().permission(field)
    }

    pub fn allowed_to_read(&self, field: &str) -> bool {
        self.resolver().can_read(field)
    }

    pub fn allowed_to_write(&self, field: &str) -> bool {
        self.resolver().can_write(field)
    }

    /// Read the value at `path`.
    ///
    /// Returns `Ok(None)` when the data runs out before the path does. A
    /// path ending on a nested store returns a handle to that store.
    pub fn read(&self, path: &str) -> StoreResult<Option<StoreValue>> {
        let path = StorePath::parse(path);
        self.read_segments(path.segments(), &path)
    }

    fn read_segments(
        &self,
        segments: &[String],
        path: &StorePath,
    ) -> StoreResult<Option<StoreValue>> {
        let Some((first, rest)) = segments.split_first() else {
            return Ok(None);
        };

        gate(&self.resolver(), &*self.options.audit, Operation::Read, first, path)?;

        let Some(value) = self.fields.get(first) else {
            log::trace!("read {}: no field '{}'", path, first);
            return Ok(None);
        };

        let mut value = self.realize(first, Cow::Borrowed(value));
        let mut name = first;
        let mut segments = rest;

        loop {
            let Some((segment, rest)) = segments.split_first() else {
                return Ok(Some(value.into_owned()));
            };

            if let StoreValue::Store(child) = value.as_ref() {
                log::trace!("read {}: entering nested store at '{}'", path, name);
                let Some(store) = child.try_borrow() else {
                    return Err(busy(Operation::Read, name, path));
                };
                return store.read_segments(segments, path);
            }

            let next = match value {
                Cow::Borrowed(v) => v.get(segment).map(Cow::Borrowed),
                Cow::Owned(v) => v.into_child(segment).map(Cow::Owned),
            };

            match next {
                Some(next) => value = self.realize(segment, next),
                None => return Ok(None),
            }
            name = segment;
            segments = rest;
        }
    }

    /// Invoke providers until a concrete value remains
    fn realize<'v>(&self, field: &str, mut value: Cow<'v, StoreValue>) -> Cow<'v, StoreValue> {
        while let StoreValue::Lazy(provider) = value.as_ref() {
            let realized = provider();
            self.options.audit.log(AuditEvent::ProviderInvoked {
                field: field.to_string(),
            });
            value = Cow::Owned(realized);
        }
        value
    }

    /// Write `value` at `path`, returning the value as stored.
    ///
    /// Missing intermediate locations are created as empty objects. Only the
    /// terminal segment is permission-checked; if it is denied, nothing
    /// created along the way is kept.
    ///
    /// A numeric segment under an array addresses an element, padding the
    /// array with nulls when the index lies at most [`MAX_ARRAY_GAP`] past its
    /// end. Any other segment under an array, including a farther index,
    /// turns the array into an object keyed by element index (`"0"`, `"1"`,
    /// ...) so the existing elements are kept next to the new key.
    ///
    /// A path that loops back into this store through a provider or a nested
    /// handle continues here. Reaching a store held by an unrelated borrow
    /// fails with [`StoreError::Busy`].
    pub fn write(&mut self, path: &str, value: impl Into<StoreValue>) -> StoreResult<StoreValue> {
        let path = StorePath::parse(path);
        let value = Preprocessor::new(&self.options).run(value.into(), path.as_str());
        match self.write_segments(path.segments(), &path, value)? {
            Step::Written(value) => Ok(value),
            Step::Reenter { field, .. } => Err(busy(Operation::Write, &field, &path)),
        }
    }

    fn write_segments(
        &mut self,
        segments: &[String],
        path: &StorePath,
        value: StoreValue,
    ) -> StoreResult<Step> {
        let step = {
            let Store {
                type_key,
                default_policy,
                fields,
                options,
            } = &mut *self;
            let writer = Writer {
                resolver: PermissionResolver::new(&options.registry, type_key, *default_policy),
                audit: &*options.audit,
                path,
            };
            writer.write_field(fields, segments, value)?
        };

        match step {
            Step::Reenter {
                target,
                remaining,
                value,
                ..
            } if target.holds(self) => {
                log::trace!("write {}: path loops back into its own store", path);
                let rest = &path.segments()[path.len() - remaining..];
                self.write_segments(rest, path, value)
            }
            step => Ok(step),
        }
    }

    /// Merge top-level entries into this store.
    ///
    /// Fields that are not writable are skipped and their names returned.
    /// An existing nested store absorbs an object by merging it through its
    /// own permissions; any other field is overwritten.
    pub fn write_entries(&mut self, entries: impl Into<StoreValue>) -> Vec<String> {
        match Preprocessor::new(&self.options).run(entries.into(), "") {
            StoreValue::Object(map) => self.merge_entries(map),
            other => {
                log::debug!("write_entries ignored a non-object {}", other.type_name());
                Vec::new()
            }
        }
    }

    pub(crate) fn merge_entries(&mut self, entries: StoreMap) -> Vec<String> {
        let mut skipped = Vec::new();

        for (key, incoming) in entries {
            if !self.allowed_to_write(&key) {
                self.options.audit.log(AuditEvent::EntrySkipped { field: key.clone() });
                skipped.push(key);
                continue;
            }

            let child = match self.fields.get(&key) {
                Some(StoreValue::Store(child)) => child.clone(),
                _ => {
                    self.fields.insert(key, incoming);
                    continue;
                }
            };

            let nested = match incoming {
                StoreValue::Object(map) => map,
                StoreValue::Store(other) if other.ptr_eq(&child) => continue,
                StoreValue::Store(other) => {
                    let snapshot = if other.holds(self) {
                        Some(self.entries())
                    } else {
                        other.try_borrow().map(|store| store.entries())
                    };
                    match snapshot.map(StoreValue::from) {
                        Some(StoreValue::Object(map)) => map,
                        _ => {
                            log::debug!("write_entries: incoming store for '{}' is in use", key);
                            continue;
                        }
                    }
                }
                other => {
                    log::debug!(
                        "write_entries: kept store at '{}', ignored incoming {}",
                        key,
                        other.type_name()
                    );
                    continue;
                }
            };

            let inner = if child.holds(self) {
                self.merge_entries(nested)
            } else {
                match child.try_borrow_mut() {
                    Some(mut store) => store.merge_entries(nested),
                    None => {
                        log::warn!("write_entries: nested store at '{}' is in use", key);
                        self.options
                            .audit
                            .log(AuditEvent::EntrySkipped { field: key.clone() });
                        skipped.push(key);
                        continue;
                    }
                }
            };
            skipped.extend(inner.into_iter().map(|field| format!("{}:{}", key, field)));
        }

        skipped
    }

    /// JSON snapshot of every readable field
    ///
    /// Nested stores contribute their own readable entries. Providers are
    /// not invoked and do not appear.
    pub fn entries(&self) -> Map<String, JsonValue> {
        let resolver = self.resolver();
        self.fields
            .iter()
            .filter(|(key, value)| {
                !matches!(value, StoreValue::Lazy(_)) && resolver.can_read(key)
            })
            .map(|(key, value)| (key.clone(), value.to_json()))
            .collect()
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("type", &self.type_key.as_str())
            .field("default_policy", &self.default_policy)
            .field("fields", &self.fields)
            .finish()
    }
}

/// Check one permission and record the outcome
fn gate(
    resolver: &PermissionResolver<'_>,
    audit: &dyn AuditLogger,
    operation: Operation,
    field: &str,
    path: &StorePath,
) -> StoreResult<()> {
    let granted = match operation {
        Operation::Read => resolver.can_read(field),
        Operation::Write => resolver.can_write(field),
    };

    audit.log(AuditEvent::PermissionCheck {
        operation,
        field: field.to_string(),
        path: path.to_string(),
        granted,
    });

    if granted {
        Ok(())
    } else {
        Err(StoreError::PermissionDenied {
            operation,
            field: field.to_string(),
            path: path.to_string(),
        })
    }
}

fn busy(operation: Operation, field: &str, path: impl fmt::Display) -> StoreError {
    StoreError::Busy {
        operation,
        field: field.to_string(),
        path: path.to_string(),
    }
}

/// Arrays are padded with nulls at most this many slots past their end
pub const MAX_ARRAY_GAP: usize = 1024;

/// Outcome of a write inside one store
enum Step {
    Written(StoreValue),
    /// The path continues in `target`, which an enclosing write already
    /// holds. `remaining` counts the path segments still to apply there.
    Reenter {
        target: SharedStore,
        field: String,
        remaining: usize,
        value: StoreValue,
    },
}

/// Write traversal over one store's fields
///
/// Holds the store's permission view separately from its field map so the
/// map can be borrowed mutably while permissions are checked.
struct Writer<'a> {
    resolver: PermissionResolver<'a>,
    audit: &'a dyn AuditLogger,
    path: &'a StorePath,
}

impl Writer<'_> {
    fn check(&self, field: &str) -> StoreResult<()> {
        gate(&self.resolver, self.audit, Operation::Write, field, self.path)
    }

    /// Write into an object-like map
    fn write_field(
        &self,
        fields: &mut StoreMap,
        segments: &[String],
        value: StoreValue,
    ) -> StoreResult<Step> {
        let Some((first, rest)) = segments.split_first() else {
            return Ok(Step::Written(value));
        };

        if rest.is_empty() {
            self.check(first)?;
            fields.insert(first.clone(), value.clone());
            return Ok(Step::Written(value));
        }

        match fields.get_mut(first) {
            Some(slot) => self.write_slot(slot, first, rest, value),
            None => {
                let mut fresh = StoreValue::object();
                let step = self.write_slot(&mut fresh, first, rest, value)?;
                if let Step::Written(_) = step {
                    log::trace!("write {}: created object at '{}'", self.path, first);
                    fields.insert(first.clone(), fresh);
                }
                Ok(step)
            }
        }
    }

    /// Write `rest` (never empty) beneath the value held in `slot`
    fn write_slot(
        &self,
        slot: &mut StoreValue,
        name: &str,
        rest: &[String],
        value: StoreValue,
    ) -> StoreResult<Step> {
        match slot {
            StoreValue::Store(child) => self.enter(child, name, rest, value),
            StoreValue::Lazy(provider) => {
                let provider = provider.clone();
                self.audit.log(AuditEvent::ProviderInvoked {
                    field: name.to_string(),
                });
                match provider() {
                    StoreValue::Store(child) => self.enter(&child, name, rest, value),
                    realized @ (StoreValue::Object(_) | StoreValue::Array(_)) => {
                        self.replace(slot, realized, name, rest, value)
                    }
                    _ => self.replace(slot, StoreValue::object(), name, rest, value),
                }
            }
            StoreValue::Object(map) => self.write_field(map, rest, value),
            StoreValue::Array(items) => {
                let Some((segment, tail)) = rest.split_first() else {
                    return Ok(Step::Written(value));
                };
                let index = match segment.parse::<usize>() {
                    Ok(index) if index <= items.len().saturating_add(MAX_ARRAY_GAP) => index,
                    _ => {
                        log::debug!(
                            "write {}: array at '{}' keyed by index to hold '{}'",
                            self.path,
                            name,
                            segment
                        );
                        let keyed = StoreValue::Object(keyed_by_index(items));
                        return self.replace(slot, keyed, name, rest, value);
                    }
                };

                if tail.is_empty() {
                    self.check(segment)?;
                    place(items, index, value.clone());
                    return Ok(Step::Written(value));
                }

                match items.get_mut(index) {
                    Some(element) => self.write_slot(element, segment, tail, value),
                    None => {
                        let mut fresh = StoreValue::object();
                        let step = self.write_slot(&mut fresh, segment, tail, value)?;
                        if let Step::Written(_) = step {
                            place(items, index, fresh);
                        }
                        Ok(step)
                    }
                }
            }
            _ => self.replace(slot, StoreValue::object(), name, rest, value),
        }
    }

    /// Continue the write inside a nested store
    fn enter(
        &self,
        child: &SharedStore,
        name: &str,
        rest: &[String],
        value: StoreValue,
    ) -> StoreResult<Step> {
        log::trace!("write {}: entering nested store at '{}'", self.path, name);
        match child.try_borrow_mut() {
            Some(mut store) => store.write_segments(rest, self.path, value),
            None => Ok(Step::Reenter {
                target: child.clone(),
                field: name.to_string(),
                remaining: rest.len(),
                value,
            }),
        }
    }

    /// Write beneath a detached `container`, installing it in `slot` only
    /// once the write has gone through
    fn replace(
        &self,
        slot: &mut StoreValue,
        mut container: StoreValue,
        name: &str,
        rest: &[String],
        value: StoreValue,
    ) -> StoreResult<Step> {
        let step = self.write_slot(&mut container, name, rest, value)?;
        if let Step::Written(_) = step {
            *slot = container;
        }
        Ok(step)
    }
}

/// Set `items[index]`, padding with nulls past the end
fn place(items: &mut Vec<StoreValue>, index: usize, value: StoreValue) {
    if index < items.len() {
        items[index] = value;
    } else {
        items.resize(index, StoreValue::Null);
        items.push(value);
    }
}

fn keyed_by_index(items: &[StoreValue]) -> StoreMap {
    items
        .iter()
        .enumerate()
        .map(|(index, item)| (index.to_string(), item.clone()))
        .collect()
}

/// Store operations through a shared handle.
///
/// While a write holds the store, reads and writes through another handle
/// fail with [`StoreError::Busy`], `entries` is empty and permission queries
/// answer `false`.
impl SharedStore {
    pub fn read(&self, path: &str) -> StoreResult<Option<StoreValue>> {
        match self.try_borrow() {
            Some(store) => store.read(path),
            None => Err(busy(Operation::Read, first_segment(path), path)),
        }
    }

    pub fn write(&self, path: &str, value: impl Into<StoreValue>) -> StoreResult<StoreValue> {
        match self.try_borrow_mut() {
            Some(mut store) => store.write(path, value),
            None => Err(busy(Operation::Write, first_segment(path), path)),
        }
    }

    /// Returns the skipped field names; all of them when the store is busy.
    pub fn write_entries(&self, entries: impl Into<StoreValue>) -> Vec<String> {
        match self.try_borrow_mut() {
            Some(mut store) => store.write_entries(entries),
            None => {
                log::warn!("write_entries on a store that is already in use");
                match entries.into() {
                    StoreValue::Object(map) => map.into_keys().collect(),
                    _ => Vec::new(),
                }
            }
        }
    }

    pub fn entries(&self) -> Map<String, JsonValue> {
        self.try_borrow()
            .map(|store| store.entries())
            .unwrap_or_default()
    }

    pub fn allowed_to_read(&self, field: &str) -> bool {
        self.try_borrow()
            .is_some_and(|store| store.allowed_to_read(field))
    }

    pub fn allowed_to_write(&self, field: &str) -> bool {
        self.try_borrow()
            .is_some_and(|store| store.allowed_to_write(field))
    }
}

fn first_segment(path: &str) -> &str {
    path.split(SEPARATOR).next().unwrap_or(path)
}

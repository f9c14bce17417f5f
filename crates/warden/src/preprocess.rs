//! Promotion of sentinel-tagged objects into child stores
//!
//! Incoming values are copied recursively. Wherever an object carries the
//! sentinel key (`"store"` unless configured otherwise) with an object
//! value, that value is merged into a new base-type store placed under the
//! sentinel key. The merge goes through the new store's own permissions:
//! fields its type or default policy makes unwritable are dropped.

use crate::audit::AuditEvent;
use crate::options::StoreOptions;
use crate::registry::TypeKey;
use crate::store::Store;
use crate::value::{StoreMap, StoreValue};

pub struct Preprocessor<'a> {
    options: &'a StoreOptions,
}

impl<'a> Preprocessor<'a> {
    pub fn new(options: &'a StoreOptions) -> Self {
        Self { options }
    }

    /// Preprocess `value` destined for location `at` (used for audit only)
    pub fn run(&self, value: StoreValue, at: &str) -> StoreValue {
        match value {
            StoreValue::Object(map) => StoreValue::Object(
                map.into_iter()
                    .map(|(key, child)| {
                        let location = join(at, &key);
                        let child = match child {
                            StoreValue::Object(inner) if key == self.options.sentinel_key => {
                                self.promote(inner, &location)
                            }
                            other => self.run(other, &location),
                        };
                        (key, child)
                    })
                    .collect(),
            ),
            StoreValue::Array(items) => StoreValue::Array(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(index, item)| self.run(item, &join(at, &index.to_string())))
                    .collect(),
            ),
            other => other,
        }
    }

    fn promote(&self, fields: StoreMap, at: &str) -> StoreValue {
        let mut store = Store::with_options(TypeKey::base(), self.options.clone());
        if let StoreValue::Object(fields) = self.run(StoreValue::Object(fields), at) {
            let skipped = store.merge_entries(fields);
            if !skipped.is_empty() {
                log::debug!(
                    "promoted store at '{}' dropped unwritable fields: {}",
                    at,
                    skipped.join(", ")
                );
            }
        }

        log::debug!("promoted object at '{}' to a child store", at);
        self.options
            .audit
            .log(AuditEvent::StorePromoted { at: at.to_string() });
        StoreValue::from(store)
    }
}

fn join(at: &str, key: &str) -> String {
    if at.is_empty() {
        key.to_string()
    } else {
        format!("{}:{}", at, key)
    }
}

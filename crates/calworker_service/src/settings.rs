//! Named settings.

use crate::collections::SETTINGS;
use crate::error::ServiceResult;
use calworker_bridge::StreamHandle;
use calworker_protocol::{Setting, Value};
use calworker_store::{ChangeType, Store, TypedCollection};
use std::fmt;

/// Settings, one value per name.
#[derive(Clone)]
pub struct Settings {
    store: Store,
    settings: TypedCollection<Setting>,
}

impl Settings {
    pub(crate) fn new(store: Store) -> Self {
        Self {
            settings: store.collection(SETTINGS),
            store,
        }
    }

    /// Returns a setting's value, or `None` if it was never set.
    pub fn get(&self, id: &str) -> ServiceResult<Option<Value>> {
        Ok(self.settings.get(id)?.map(|setting| setting.value))
    }

    /// Sets a setting's value.
    pub fn set(&self, id: &str, value: Value) -> ServiceResult<Setting> {
        let setting = Setting {
            id: id.to_string(),
            value,
        };
        self.settings.put(id, &setting)?;
        tracing::debug!(setting = %id, "setting stored");
        Ok(setting)
    }

    /// Writes the value of setting `id` to `stream` now and whenever it
    /// changes. A missing or removed setting is written as `null`.
    pub fn observe(&self, id: &str, stream: &StreamHandle) {
        let initial = match self.get(id) {
            Ok(value) => value.unwrap_or(Value::Null),
            Err(e) => {
                tracing::warn!(setting = %id, error = %e, "could not read setting");
                Value::Null
            }
        };

        let listener = self.store.listen(SETTINGS, {
            let id = id.to_string();
            let stream = stream.clone();
            move |change| {
                if change.id != id {
                    return;
                }
                let value = match change.change_type {
                    ChangeType::Delete => Value::Null,
                    _ => change.document.get("value").cloned().unwrap_or(Value::Null),
                };
                stream.write_value(value);
            }
        });
        let store = self.store.clone();
        stream.on_cancel(move || {
            store.unlisten(listener);
        });
        stream.write_value(initial);
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings").finish_non_exhaustive()
    }
}

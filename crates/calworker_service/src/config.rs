//! Service configuration.

use crate::collections::{ACCOUNT_ID, CALENDARS, CALENDAR_ID, EVENTS};
use calworker_protocol::ProviderCapabilities;
use calworker_store::StoreConfig;
use std::collections::BTreeMap;

/// Provider type of accounts that live only on the device.
pub const LOCAL_PROVIDER: &str = "Local";

/// Provider type of CalDAV accounts.
pub const CALDAV_PROVIDER: &str = "Caldav";

/// Capabilities of every known provider type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderCatalog {
    providers: BTreeMap<String, ProviderCapabilities>,
}

impl ProviderCatalog {
    /// Creates a catalog with no providers.
    pub fn empty() -> Self {
        Self {
            providers: BTreeMap::new(),
        }
    }

    /// Adds or replaces a provider.
    pub fn with_provider(
        mut self,
        provider_type: impl Into<String>,
        capabilities: ProviderCapabilities,
    ) -> Self {
        self.providers.insert(provider_type.into(), capabilities);
        self
    }

    /// Returns the capabilities of a provider type.
    pub fn get(&self, provider_type: &str) -> Option<ProviderCapabilities> {
        self.providers.get(provider_type).copied()
    }

    /// Returns true if accounts of this provider type sync with a server.
    pub fn can_sync(&self, provider_type: &str) -> bool {
        self.get(provider_type).is_some_and(|caps| caps.can_sync)
    }

    /// Returns the known provider types, sorted.
    pub fn provider_types(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }
}

impl Default for ProviderCatalog {
    fn default() -> Self {
        Self::empty()
            .with_provider(
                LOCAL_PROVIDER,
                ProviderCapabilities {
                    has_account_settings: false,
                    can_sync: false,
                },
            )
            .with_provider(
                CALDAV_PROVIDER,
                ProviderCapabilities {
                    has_account_settings: true,
                    can_sync: true,
                },
            )
    }
}

/// Configuration for a [`crate::CalendarService`].
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Service name, used by the bridge in logs.
    pub name: String,
    /// Store configuration.
    pub store: StoreConfig,
    /// Known provider types.
    pub providers: ProviderCatalog,
    /// Presets that may back at most one account.
    pub single_instance_presets: Vec<String>,
}

impl ServiceConfig {
    /// Creates a configuration with the default store and provider catalog.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            store: default_store(),
            providers: ProviderCatalog::default(),
            single_instance_presets: vec!["local".to_string()],
        }
    }

    /// Sets the store configuration.
    ///
    /// The calendar and event lookup indexes are added if missing.
    pub fn with_store(mut self, store: StoreConfig) -> Self {
        self.store = with_lookup_indexes(store);
        self
    }

    /// Sets the provider catalog.
    pub fn with_providers(mut self, providers: ProviderCatalog) -> Self {
        self.providers = providers;
        self
    }

    /// Marks a preset as single-instance.
    pub fn with_single_instance_preset(mut self, preset: impl Into<String>) -> Self {
        let preset = preset.into();
        if !self.single_instance_presets.contains(&preset) {
            self.single_instance_presets.push(preset);
        }
        self
    }

    /// Returns true if at most one account may use `preset`.
    pub fn is_single_instance(&self, preset: &str) -> bool {
        self.single_instance_presets.iter().any(|p| p == preset)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::new("calendar")
    }
}

fn default_store() -> StoreConfig {
    with_lookup_indexes(StoreConfig::default())
}

fn with_lookup_indexes(mut store: StoreConfig) -> StoreConfig {
    for (collection, field) in [(CALENDARS, ACCOUNT_ID), (EVENTS, CALENDAR_ID)] {
        let present = store
            .indexes
            .iter()
            .any(|i| i.collection == collection && i.field == field);
        if !present {
            store = store.with_index(collection, field);
        }
    }
    store
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog() {
        let catalog = ProviderCatalog::default();
        assert!(!catalog.can_sync(LOCAL_PROVIDER));
        assert!(catalog.can_sync(CALDAV_PROVIDER));
        assert!(catalog.get("Exchange").is_none());
        assert_eq!(catalog.provider_types().collect::<Vec<_>>(), ["Caldav", "Local"]);
    }

    #[test]
    fn store_gets_lookup_indexes_once() {
        let config = ServiceConfig::default()
            .with_store(StoreConfig::new("test").with_index(CALENDARS, ACCOUNT_ID));
        assert_eq!(config.store.name, "test");
        assert_eq!(config.store.indexes.len(), 2);
    }

    #[test]
    fn single_instance_presets() {
        let config = ServiceConfig::default()
            .with_single_instance_preset("local")
            .with_single_instance_preset("work");
        assert_eq!(config.single_instance_presets, ["local", "work"]);
        assert!(config.is_single_instance("work"));
        assert!(!config.is_single_instance("google"));
    }
}

//! Configuration for the bridge client.

/// Configuration for a [`crate::BridgeClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Name of the remote service, used in logs.
    pub service_name: String,
    /// Whether updates that arrive before any listener is attached are kept
    /// and replayed to the first listener.
    pub buffer_early_updates: bool,
}

impl ClientConfig {
    /// Creates a configuration for the named service.
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            buffer_early_updates: true,
        }
    }

    /// Sets whether early updates are buffered.
    pub fn with_buffer_early_updates(mut self, buffer: bool) -> Self {
        self.buffer_early_updates = buffer;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new("calendar")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_builder() {
        let config = ClientConfig::new("worker").with_buffer_early_updates(false);
        assert_eq!(config.service_name, "worker");
        assert!(!config.buffer_early_updates);
        assert!(ClientConfig::default().buffer_early_updates);
    }
}

//! Application state

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use printwarden_hub::Connector;
use printwarden_moonraker::Monitor;

/// Shared application state: the runtime that owns every monitor, the
/// optional controller connector, and the root cancellation token all
/// background work hangs off.
pub struct AppState {
    monitors: HashMap<String, Arc<Monitor>>,
    keys: Vec<String>,
    connector: Option<Arc<Connector>>,
    root: CancellationToken,
}

impl AppState {
    /// `keys` preserves the configuration order for stable listings.
    pub fn new(
        monitors: HashMap<String, Arc<Monitor>>,
        keys: Vec<String>,
        connector: Option<Arc<Connector>>,
        root: CancellationToken,
    ) -> Self {
        Self {
            monitors,
            keys,
            connector,
            root,
        }
    }

    pub fn monitor(&self, key: &str) -> Option<&Arc<Monitor>> {
        self.monitors.get(key)
    }

    /// Monitors in configuration order.
    pub fn monitors(&self) -> impl Iterator<Item = (&str, &Arc<Monitor>)> {
        self.keys
            .iter()
            .filter_map(|key| self.monitors.get(key).map(|monitor| (key.as_str(), monitor)))
    }

    /// Stop everything: cancel the root token (which also drains the HTTP
    /// server), then stop the connector and the monitors.
    pub fn shutdown(&self) {
        self.root.cancel();

        if let Some(connector) = &self.connector {
            connector.stop();
        }
        for monitor in self.monitors.values() {
            monitor.stop();
        }

        info!("supervisor shut down");
    }
}

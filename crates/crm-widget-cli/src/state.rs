//! Application state wiring the widget ports to their infra implementations.
//!
//! The coordinator is generic over its API, storage and realtime ports;
//! `AppState` pins them to the concrete reqwest, filesystem and
//! tokio-tungstenite implementations.

use std::path::PathBuf;

use crm_widget_core::storage::session_store::SessionStore;
use crm_widget_core::widget::SessionCoordinator;
use crm_widget_infra::api::HttpApiClient;
use crm_widget_infra::config::{load_widget_config, resolve_data_dir};
use crm_widget_infra::realtime::WsConnector;
use crm_widget_infra::storage::FileStorage;
use crm_widget_types::config::WidgetConfig;

use crate::cli::ConfigArgs;

/// Coordinator type pinned to infra implementations.
pub type ConcreteCoordinator = SessionCoordinator<HttpApiClient, FileStorage, WsConnector>;

/// Resolved configuration and local storage for one CLI invocation.
pub struct AppState {
    pub config: WidgetConfig,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Resolve the data directory, load `widget.toml` and apply CLI overrides.
    pub async fn init(overrides: &ConfigArgs) -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        tokio::fs::create_dir_all(&data_dir).await?;

        let mut config = load_widget_config(&data_dir).await;
        overrides.apply(&mut config);

        Ok(Self { config, data_dir })
    }

    pub fn storage(&self) -> FileStorage {
        FileStorage::new(&self.data_dir)
    }

    pub fn session_store(&self) -> SessionStore<FileStorage> {
        SessionStore::new(self.storage())
    }

    pub fn api_client(&self) -> anyhow::Result<HttpApiClient> {
        Ok(HttpApiClient::from_config(&self.config)?)
    }
}

//! Mount guard for embedding the widget.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crm_widget_types::config::WidgetConfig;
use crm_widget_types::error::ConfigError;
use tracing::{debug, info};

use crate::api::WidgetApi;
use crate::realtime::transport::RealtimeConnector;
use crate::storage::kv_store::KeyValueStorage;
use crate::widget::coordinator::SessionCoordinator;

/// Owns the "already mounted" flag of one embedding page.
///
/// The first successful [`WidgetHost::mount`] builds the coordinator and
/// starts its bootstrap in the background; later calls are no-ops.
#[derive(Debug, Default)]
pub struct WidgetHost {
    mounted: AtomicBool,
}

impl WidgetHost {
    pub const fn new() -> Self {
        Self {
            mounted: AtomicBool::new(false),
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    /// Validate `config` and mount the widget.
    ///
    /// Returns `Ok(None)` when a widget is already mounted. Must be called
    /// from within a tokio runtime.
    pub fn mount<A, S, C>(
        &self,
        config: WidgetConfig,
        api: A,
        storage: S,
        connector: C,
    ) -> Result<Option<Arc<SessionCoordinator<A, S, C>>>, ConfigError>
    where
        A: WidgetApi,
        S: KeyValueStorage,
        C: RealtimeConnector,
    {
        config.validate()?;
        if self.mounted.swap(true, Ordering::SeqCst) {
            debug!("widget already mounted, ignoring mount");
            return Ok(None);
        }

        info!(workspace_id = %config.workspace_id, "mounting chat widget");
        let coordinator = Arc::new(SessionCoordinator::new(config, api, storage, connector));
        let bootstrap = Arc::clone(&coordinator);
        tokio::spawn(async move {
            // failures are surfaced through the view's notice slot
            let _ = bootstrap.start().await;
        });
        Ok(Some(coordinator))
    }
}

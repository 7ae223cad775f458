use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use devcluster_provider::CloudProvider;
use devcluster_store::Store;

use crate::allocator::Allocator;
use crate::config::Config;
use crate::coordinator::{Coordinator, CoordinatorError};
use crate::{reaper, resume};

/// Explicit value bundling Store, CloudProvider, config and the allocator's
/// mutex, passed into workers, the reaper and HTTP handlers. Replaces the
/// module-wide singletons pattern flagged in spec §9 — no hidden globals.
pub struct Runtime {
    pub store: Arc<dyn Store>,
    pub provider: Arc<dyn CloudProvider>,
    pub coordinator: Arc<Coordinator>,
    pub config: Config,
}

impl Runtime {
    pub fn new(store: Arc<dyn Store>, provider: Arc<dyn CloudProvider>, account_id: String, config: Config) -> Self {
        let allocator = Arc::new(Allocator::new(store.clone(), provider.clone(), account_id));
        let coordinator = Arc::new(Coordinator::new(store.clone(), provider.clone(), allocator, config.clone()));
        Self {
            store,
            provider,
            coordinator,
            config,
        }
    }

    /// Runs the Resume Procedure once, synchronously.
    pub async fn resume(&self) -> Result<(), CoordinatorError> {
        resume::run(&self.coordinator).await
    }

    /// Spawns the Expiry Reaper's background loop.
    pub fn spawn_reaper(&self, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        let coordinator = self.coordinator.clone();
        let interval = Duration::from_secs(self.config.reaper_interval_sec);
        tokio::spawn(reaper::run(coordinator, interval, cancel))
    }
}

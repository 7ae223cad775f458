use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::Instant;

use devcluster_provider::{CloudProvider, ProviderError};
use devcluster_store::{Cluster, ClusterStatus, RequestStatus, Store, StoreError};

use crate::allocator::{Allocator, AllocatorError};
use crate::config::Config;
use crate::naming::{self, NamingError};

const CREATE_CLUSTER_ATTEMPTS: u32 = 6;
const CREATE_CLUSTER_BACKOFF: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Naming(#[from] NamingError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Allocator(#[from] AllocatorError),

    #[error("exhausted {CREATE_CLUSTER_ATTEMPTS} CreateCluster attempts: {0}")]
    CreateExhausted(String),
}

/// Invoked by the worker whenever a cluster it drives becomes ready, so the
/// Request Coordinator can re-check whether the whole Request is done.
/// Mirrors the teacher's publish-closure pattern for decoupling a worker
/// loop from its caller.
#[async_trait]
pub trait CompletionNotifier: Send + Sync {
    async fn notify_cluster_ready(&self, request_id: &str);
}

/// One worker drives one cluster through
/// `NAMING → CREATING → ASSIGNING → POLLING → terminal`.
pub struct ProvisioningWorker {
    store: Arc<dyn Store>,
    provider: Arc<dyn CloudProvider>,
    allocator: Arc<Allocator>,
    config: Config,
    notifier: Arc<dyn CompletionNotifier>,
}

impl ProvisioningWorker {
    pub fn new(
        store: Arc<dyn Store>,
        provider: Arc<dyn CloudProvider>,
        allocator: Arc<Allocator>,
        config: Config,
        notifier: Arc<dyn CompletionNotifier>,
    ) -> Self {
        Self {
            store,
            provider,
            allocator,
            config,
            notifier,
        }
    }

    /// Full pipeline, starting at NAMING.
    pub async fn run(&self, request_id: &str, zone: &str, no_subnet: bool) {
        match self.create(request_id, zone, no_subnet).await {
            Ok(cluster_id) => self.poll_until_ready(request_id, &cluster_id).await,
            Err(err) => {
                tracing::error!(request_id, error = %err, "provisioning worker aborted before polling");
            }
        }
    }

    /// Resume-only entry point: skip NAMING/CREATING/ASSIGNING and continue
    /// polling an already-created cluster.
    pub async fn resume_polling(&self, request_id: &str, cluster_id: &str) {
        self.poll_until_ready(request_id, cluster_id).await;
    }

    pub(crate) async fn create(&self, request_id: &str, zone: &str, no_subnet: bool) -> Result<String, WorkerError> {
        let name = naming::allocate_unique_name(self.store.as_ref(), zone).await?;

        let mut last_err: Option<ProviderError> = None;
        let mut created = None;
        for attempt in 0..CREATE_CLUSTER_ATTEMPTS {
            match self.provider.create_cluster(&name, zone, no_subnet).await {
                Ok(result) => {
                    created = Some(result);
                    break;
                }
                Err(err) => {
                    tracing::warn!(name, attempt, error = %err, "CreateCluster attempt failed");
                    last_err = Some(err);
                    if attempt + 1 < CREATE_CLUSTER_ATTEMPTS {
                        tokio::time::sleep(CREATE_CLUSTER_BACKOFF).await;
                    }
                }
            }
        }

        let created = match created {
            Some(c) => c,
            None => {
                let text = last_err.map(|e| e.to_string()).unwrap_or_default();
                self.store
                    .update_request_status(request_id, RequestStatus::Failed, &text)
                    .await?;
                return Err(WorkerError::CreateExhausted(text));
            }
        };

        let cluster = Cluster {
            id: created.cluster_id.clone(),
            request_id: request_id.to_string(),
            provider_request_id: created.provider_request_id,
            name,
            hostname: String::new(),
            master_url: String::new(),
            status: ClusterStatus::Provisioning,
            error: String::new(),
            public_vlan: created.public_vlan,
            private_vlan: created.private_vlan,
        };
        self.store.replace_cluster(&cluster).await?;

        // Allocator failure aborts the worker with the Request status
        // unchanged; the cluster row stays Provisioning for the reaper or
        // resume logic to pick up later.
        self.allocator.assign_user(&cluster.id).await?;

        Ok(cluster.id)
    }

    pub(crate) async fn poll_until_ready(&self, request_id: &str, cluster_id: &str) {
        let deadline = Instant::now() + Duration::from_secs(self.config.api_call_timeout_sec);
        let retry = Duration::from_secs(self.config.api_call_retry_sec);

        loop {
            if Instant::now() >= deadline {
                let text = format!(
                    "cluster {cluster_id} still not ready after {} seconds",
                    self.config.api_call_timeout_sec
                );
                self.mark_status(request_id, cluster_id, ClusterStatus::Failed, &text).await;
                return;
            }

            match self.provider.get_cluster(cluster_id).await {
                Err(ProviderError::NotFound) => {
                    if let Ok(local) = self.store.get_cluster(cluster_id).await
                        && local.status != ClusterStatus::Deleted {
                            self.mark_status(request_id, cluster_id, ClusterStatus::Deleted, "not found upstream")
                                .await;
                        }
                    return;
                }
                Err(other) => {
                    self.mark_status(request_id, cluster_id, ClusterStatus::Failed, &other.to_string())
                        .await;
                    tokio::time::sleep(retry).await;
                }
                Ok(snapshot) => {
                    let is_normal = snapshot.is_normal();
                    if let Ok(mut cluster) = self.store.get_cluster(cluster_id).await {
                        cluster.hostname = snapshot.hostname;
                        cluster.master_url = snapshot.master_url;
                        cluster.status = if is_normal {
                            ClusterStatus::Normal
                        } else {
                            ClusterStatus::Provisioning
                        };
                        cluster.error.clear();
                        if let Err(err) = self.store.replace_cluster(&cluster).await {
                            tracing::error!(cluster_id, error = %err, "failed to persist polled cluster state");
                        }
                        if cluster.is_ready() {
                            self.notifier.notify_cluster_ready(request_id).await;
                            return;
                        }
                    }
                    tokio::time::sleep(retry).await;
                }
            }
        }
    }

    async fn mark_status(&self, request_id: &str, cluster_id: &str, status: ClusterStatus, error: &str) {
        if let Ok(mut cluster) = self.store.get_cluster(cluster_id).await {
            if status == ClusterStatus::Failed {
                tracing::warn!(
                    request_id,
                    cluster_id,
                    error,
                    "cluster failed; request will stay Provisioning until the reaper or an operator intervenes"
                );
            }
            cluster.status = status;
            cluster.error = error.to_string();
            if let Err(err) = self.store.replace_cluster(&cluster).await {
                tracing::error!(cluster_id, error = %err, "failed to persist cluster status");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use devcluster_provider::mock::MockProvider;
    use devcluster_store::memory::MemoryStore;
    use devcluster_store::{Request, RequestStatus};

    use super::*;

    struct NullNotifier(AtomicUsize);

    #[async_trait]
    impl CompletionNotifier for NullNotifier {
        async fn notify_cluster_ready(&self, _request_id: &str) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn test_config() -> Config {
        Config {
            account_id: "acct-1".to_string(),
            idp_name: "idp".to_string(),
            api_call_retry_sec: 1,
            api_call_timeout_sec: 30,
            reaper_interval_sec: 60,
            oauth_client_id: "client".to_string(),
            dashboard_url: "https://dash.example.com".to_string(),
            callback_url: "https://dash.example.com/callback".to_string(),
            scholars_guide_url: "https://guide.example.com".to_string(),
        }
    }

    async fn seed_request(store: &Arc<dyn Store>, requested: i32) -> String {
        let request = Request {
            id: "req-1".to_string(),
            requested_by: "tester".to_string(),
            created_unix: 0,
            requested,
            zone: "lon06".to_string(),
            delete_in_hours: 100,
            no_subnet: false,
            status: RequestStatus::Provisioning,
            error: String::new(),
        };
        store.insert_request(&request).await.unwrap();
        request.id
    }

    #[tokio::test(start_paused = true)]
    async fn create_exhaustion_marks_request_failed_and_creates_no_cluster() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let request_id = seed_request(&store, 1).await;
        let provider = Arc::new(MockProvider::new());
        provider.always_fail_create_cluster();
        let allocator = Arc::new(Allocator::new(store.clone(), provider.clone(), "acct-1".to_string()));
        let notifier: Arc<dyn CompletionNotifier> = Arc::new(NullNotifier(AtomicUsize::new(0)));
        let worker = ProvisioningWorker::new(store.clone(), provider, allocator, test_config(), notifier);

        let err = worker.create(&request_id, "lon06", false).await.unwrap_err();
        assert!(matches!(err, WorkerError::CreateExhausted(_)));

        let request = store.get_request(&request_id).await.unwrap();
        assert_eq!(request.status, RequestStatus::Failed);
        assert!(store.get_clusters_by_request(&request_id).await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn poll_on_upstream_not_found_marks_deleted_once_then_stops() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let request_id = seed_request(&store, 1).await;
        let cluster = Cluster {
            id: "cl-1".to_string(),
            request_id: request_id.clone(),
            provider_request_id: String::new(),
            name: "rhd-lon06-test-1".to_string(),
            hostname: String::new(),
            master_url: String::new(),
            status: ClusterStatus::Provisioning,
            error: String::new(),
            public_vlan: String::new(),
            private_vlan: String::new(),
        };
        store.replace_cluster(&cluster).await.unwrap();

        let provider = Arc::new(MockProvider::new());
        let allocator = Arc::new(Allocator::new(store.clone(), provider.clone(), "acct-1".to_string()));
        let notifier: Arc<dyn CompletionNotifier> = Arc::new(NullNotifier(AtomicUsize::new(0)));
        let worker = ProvisioningWorker::new(store.clone(), provider, allocator, test_config(), notifier);

        worker.poll_until_ready(&request_id, "cl-1").await;

        let persisted = store.get_cluster("cl-1").await.unwrap();
        assert_eq!(persisted.status, ClusterStatus::Deleted);
    }
}

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use devcluster_provider::{CloudProvider, ProviderError};
use devcluster_store::{Cluster, ClusterFilter, ClusterStatus, Request, RequestStatus, Store, StoreError, User};

use crate::allocator::{Allocator, AllocatorError};
use crate::config::Config;
use crate::urls::{self, ClusterUrls};
use crate::worker::{CompletionNotifier, ProvisioningWorker};

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Allocator(#[from] AllocatorError),
}

#[derive(Debug, Clone)]
pub struct ClusterView {
    pub cluster: Cluster,
    pub user: Option<User>,
    pub urls: ClusterUrls,
}

#[derive(Debug, Clone)]
pub struct RequestWithClusters {
    pub request: Request,
    pub clusters: Vec<ClusterView>,
}

/// Accepts new requests, fans out Provisioning Workers, aggregates
/// per-request status, and exposes read queries.
pub struct Coordinator {
    store: Arc<dyn Store>,
    provider: Arc<dyn CloudProvider>,
    allocator: Arc<Allocator>,
    config: Config,
}

impl Coordinator {
    pub fn new(
        store: Arc<dyn Store>,
        provider: Arc<dyn CloudProvider>,
        allocator: Arc<Allocator>,
        config: Config,
    ) -> Self {
        Self {
            store,
            provider,
            allocator,
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Insert a Request row, then spawn `n` Provisioning Workers for it. The
    /// creation phase (NAMING/CREATING/ASSIGNING) runs sequentially inside a
    /// single background task to bound unique-name contention; once a
    /// cluster clears ASSIGNING, its polling loop is spawned as its own
    /// task so clusters within the Request poll concurrently (spec §5).
    pub async fn create_request(
        self: &Arc<Self>,
        requested_by: &str,
        n: u32,
        zone: &str,
        delete_in_hours: i64,
        no_subnet: bool,
    ) -> Result<Request, CoordinatorError> {
        let request = Request {
            id: Uuid::new_v4().to_string(),
            requested_by: requested_by.to_string(),
            created_unix: chrono::Utc::now().timestamp(),
            requested: n as i32,
            zone: zone.to_string(),
            delete_in_hours,
            no_subnet,
            status: RequestStatus::Provisioning,
            error: String::new(),
        };
        self.store.insert_request(&request).await?;

        let coordinator = self.clone();
        let zone = zone.to_string();
        let request_id = request.id.clone();
        tokio::spawn(async move {
            coordinator.drive_new_request(request_id, zone, n, no_subnet).await;
        });

        Ok(request)
    }

    pub(crate) async fn drive_new_request(self: Arc<Self>, request_id: String, zone: String, n: u32, no_subnet: bool) {
        let worker = Arc::new(self.new_worker());
        for _ in 0..n {
            let worker = worker.clone();
            let request_id = request_id.clone();
            let zone = zone.clone();
            match worker.create(&request_id, &zone, no_subnet).await {
                Ok(cluster_id) => {
                    tokio::spawn(async move {
                        worker.poll_until_ready(&request_id, &cluster_id).await;
                    });
                }
                Err(err) => {
                    tracing::error!(request_id, error = %err, "provisioning worker aborted before polling");
                }
            }
        }
    }

    fn new_worker(self: &Arc<Self>) -> ProvisioningWorker {
        ProvisioningWorker::new(
            self.store.clone(),
            self.provider.clone(),
            self.allocator.clone(),
            self.config.clone(),
            self.clone(),
        )
    }

    /// Used by the Resume Procedure to restart a worker for a cluster that
    /// is already past ASSIGNING.
    pub fn worker(self: &Arc<Self>) -> ProvisioningWorker {
        self.new_worker()
    }

    pub async fn get_request_with_clusters(&self, id: &str) -> Result<RequestWithClusters, CoordinatorError> {
        let request = self.store.get_request(id).await?;
        let clusters = self.store.get_clusters_by_request(id).await?;
        let mut views = Vec::with_capacity(clusters.len());
        for cluster in clusters {
            views.push(self.view_of(cluster).await?);
        }
        Ok(RequestWithClusters {
            request,
            clusters: views,
        })
    }

    pub async fn get_clusters_by_zone(&self, zone: &str) -> Result<Vec<ClusterView>, CoordinatorError> {
        let filter = ClusterFilter {
            zone: Some(zone.to_string()),
            exclude_status: vec![ClusterStatus::Deleted],
        };
        let clusters = self.store.get_clusters_by_filter(&filter).await?;
        let mut views = Vec::with_capacity(clusters.len());
        for cluster in clusters {
            views.push(self.view_of(cluster).await?);
        }
        Ok(views)
    }

    async fn view_of(&self, cluster: Cluster) -> Result<ClusterView, CoordinatorError> {
        let user = match self.store.get_user_by_cluster_id(&cluster.id).await {
            Ok(user) => Some(user),
            Err(StoreError::NotFound) => None,
            Err(other) => return Err(other.into()),
        };
        let hostname = if cluster.hostname.is_empty() {
            None
        } else {
            Some(cluster.hostname.as_str())
        };
        let user_creds = user.as_ref().map(|u| (u.id.as_str(), u.password.as_str()));
        let urls = urls::synthesize(&self.config, hostname, user_creds);
        Ok(ClusterView { cluster, user, urls })
    }

    pub async fn delete_cluster(&self, id: &str) -> Result<(), CoordinatorError> {
        self.provider.delete_cluster(id).await?;
        self.allocator.recycle_user(id).await?;
        let mut cluster = self.store.get_cluster(id).await?;
        cluster.status = ClusterStatus::Deleted;
        cluster.error.clear();
        self.store.replace_cluster(&cluster).await?;
        Ok(())
    }

    /// Count child clusters; if count >= requested and every child is
    /// `Deleted` or ready, atomically update the request to `Ready`. The
    /// write is an unconditional status update, so concurrent callers
    /// racing to the same conclusion is safe (spec §5).
    pub async fn set_ready_if_done(&self, request_id: &str) -> Result<(), CoordinatorError> {
        let request = self.store.get_request(request_id).await?;
        let clusters = self.store.get_clusters_by_request(request_id).await?;
        let done = clusters.len() as i32 >= request.requested
            && clusters
                .iter()
                .all(|c| c.status == ClusterStatus::Deleted || c.is_ready());
        if done {
            self.store
                .update_request_status(request_id, RequestStatus::Ready, "")
                .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl CompletionNotifier for Coordinator {
    async fn notify_cluster_ready(&self, request_id: &str) {
        if let Err(err) = self.set_ready_if_done(request_id).await {
            tracing::error!(request_id, error = %err, "failed to check request completion");
        }
    }
}

#[cfg(test)]
mod tests {
    use devcluster_provider::mock::MockProvider;
    use devcluster_store::memory::MemoryStore;

    use super::*;
    use crate::config::Config;

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

    async fn new_coordinator() -> (Coordinator, Arc<dyn Store>, Arc<MockProvider>) {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let provider = Arc::new(MockProvider::new());
        let allocator = Arc::new(Allocator::new(store.clone(), provider.clone(), "acct-1".to_string()));
        let coordinator = Coordinator::new(store.clone(), provider.clone(), allocator, test_config());
        (coordinator, store, provider)
    }

    fn ready_cluster(id: &str, request_id: &str) -> Cluster {
        Cluster {
            id: id.to_string(),
            request_id: request_id.to_string(),
            provider_request_id: String::new(),
            name: format!("rhd-lon06-test-{id}"),
            hostname: format!("host-{id}"),
            master_url: format!("master-{id}"),
            status: ClusterStatus::Normal,
            error: String::new(),
            public_vlan: String::new(),
            private_vlan: String::new(),
        }
    }

    async fn seed_request(store: &Arc<dyn Store>, requested: i32) -> Request {
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
        request
    }

    #[tokio::test]
    async fn set_ready_if_done_is_idempotent() {
        let (coordinator, store, _provider) = new_coordinator().await;
        let request = seed_request(&store, 1).await;
        store.replace_cluster(&ready_cluster("cl-1", &request.id)).await.unwrap();

        coordinator.set_ready_if_done(&request.id).await.unwrap();
        let after_first = store.get_request(&request.id).await.unwrap();
        coordinator.set_ready_if_done(&request.id).await.unwrap();
        let after_second = store.get_request(&request.id).await.unwrap();

        assert_eq!(after_first.status, RequestStatus::Ready);
        assert_eq!(after_second.status, RequestStatus::Ready);
    }

    #[tokio::test]
    async fn set_ready_if_done_waits_for_the_requested_count() {
        let (coordinator, store, _provider) = new_coordinator().await;
        let request = seed_request(&store, 2).await;
        store.replace_cluster(&ready_cluster("cl-1", &request.id)).await.unwrap();

        coordinator.set_ready_if_done(&request.id).await.unwrap();

        let unchanged = store.get_request(&request.id).await.unwrap();
        assert_eq!(unchanged.status, RequestStatus::Provisioning);
    }

    #[tokio::test]
    async fn delete_cluster_marks_deleted_and_returns_the_user_to_the_pool() {
        let (coordinator, store, provider) = new_coordinator().await;
        let request = seed_request(&store, 1).await;

        let provisioned = provider.create_cluster("rhd-lon06-test-1", "lon06", false).await.unwrap();
        let mut cluster = ready_cluster(&provisioned.cluster_id, &request.id);
        cluster.name = "rhd-lon06-test-1".to_string();
        store.replace_cluster(&cluster).await.unwrap();

        let created = provider.create_cloud_directory_user("rh-dev-a").await.unwrap();
        let user = devcluster_store::User {
            id: "rh-dev-a".to_string(),
            cloud_direct_id: created.id,
            email: created.email,
            password: created.password.clone(),
            cluster_id: cluster.id.clone(),
            policy_id: "policy-1".to_string(),
            recycled_unix: 0,
        };
        store.insert_user(&user).await.unwrap();

        coordinator.delete_cluster(&cluster.id).await.unwrap();

        let deleted = store.get_cluster(&cluster.id).await.unwrap();
        assert_eq!(deleted.status, ClusterStatus::Deleted);

        let recycled = store.get_user_by_cluster_id("").await.unwrap();
        assert_eq!(recycled.id, "rh-dev-a");
        assert!(recycled.policy_id.is_empty());
        assert!(recycled.recycled_unix > 0);
        assert_ne!(recycled.password, created.password);
    }
}


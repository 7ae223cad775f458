use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{
    Cluster, ClusterFilter, Request, RequestStatus, Store, StoreError, StoreResult, User,
};

/// In-memory `Store`, used by unit/integration tests in place of a live
/// database. Mirrors the Postgres implementation's contract exactly.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    requests: Vec<Request>,
    clusters: Vec<Cluster>,
    users: Vec<User>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_request(&self, request: &Request) -> StoreResult<()> {
        self.replace_request(request).await
    }

    async fn replace_request(&self, request: &Request) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        if let Some(existing) = inner.requests.iter_mut().find(|r| r.id == request.id) {
            *existing = request.clone();
        } else {
            inner.requests.push(request.clone());
        }
        Ok(())
    }

    async fn update_request_status(
        &self,
        id: &str,
        status: RequestStatus,
        error: &str,
    ) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        let request = inner
            .requests
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(StoreError::NotFound)?;
        request.status = status;
        request.error = error.to_string();
        Ok(())
    }

    async fn get_request(&self, id: &str) -> StoreResult<Request> {
        let inner = self.inner.lock().await;
        inner
            .requests
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn get_all_requests(&self) -> StoreResult<Vec<Request>> {
        Ok(self.inner.lock().await.requests.clone())
    }

    async fn get_requests_by_status(&self, status: RequestStatus) -> StoreResult<Vec<Request>> {
        Ok(self
            .inner
            .lock()
            .await
            .requests
            .iter()
            .filter(|r| r.status == status)
            .cloned()
            .collect())
    }

    async fn replace_cluster(&self, cluster: &Cluster) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        if let Some(existing) = inner.clusters.iter_mut().find(|c| c.id == cluster.id) {
            *existing = cluster.clone();
        } else {
            inner.clusters.push(cluster.clone());
        }
        Ok(())
    }

    async fn get_cluster(&self, id: &str) -> StoreResult<Cluster> {
        let inner = self.inner.lock().await;
        inner
            .clusters
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn get_cluster_by_name(&self, name: &str) -> StoreResult<Cluster> {
        let inner = self.inner.lock().await;
        inner
            .clusters
            .iter()
            .find(|c| c.name == name)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn get_clusters_by_request(&self, request_id: &str) -> StoreResult<Vec<Cluster>> {
        Ok(self
            .inner
            .lock()
            .await
            .clusters
            .iter()
            .filter(|c| c.request_id == request_id)
            .cloned()
            .collect())
    }

    async fn get_clusters_by_filter(&self, filter: &ClusterFilter) -> StoreResult<Vec<Cluster>> {
        let inner = self.inner.lock().await;
        let request_zones: std::collections::HashMap<&str, &str> = inner
            .requests
            .iter()
            .map(|r| (r.id.as_str(), r.zone.as_str()))
            .collect();
        Ok(inner
            .clusters
            .iter()
            .filter(|c| {
                if filter.exclude_status.contains(&c.status) {
                    return false;
                }
                if let Some(zone) = &filter.zone
                    && request_zones.get(c.request_id.as_str()) != Some(&zone.as_str()) {
                        return false;
                    }
                true
            })
            .cloned()
            .collect())
    }

    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        self.replace_user(user).await
    }

    async fn replace_user(&self, user: &User) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        if let Some(existing) = inner.users.iter_mut().find(|u| u.id == user.id) {
            *existing = user.clone();
        } else {
            inner.users.push(user.clone());
        }
        Ok(())
    }

    async fn get_all_users(&self) -> StoreResult<Vec<User>> {
        Ok(self.inner.lock().await.users.clone())
    }

    async fn get_user_by_cluster_id(&self, cluster_id: &str) -> StoreResult<User> {
        let inner = self.inner.lock().await;
        let mut matches: Vec<&User> = inner
            .users
            .iter()
            .filter(|u| u.cluster_id == cluster_id)
            .collect();
        matches.sort_by_key(|u| u.recycled_unix);
        matches.first().map(|u| (*u).clone()).ok_or(StoreError::NotFound)
    }
}

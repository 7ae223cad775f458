pub mod error;
pub mod memory;
pub mod model;
pub mod postgres;

pub use error::StoreError;
pub use model::{Cluster, ClusterStatus, Request, RequestStatus, User};

use async_trait::async_trait;

pub type StoreResult<T> = Result<T, StoreError>;

/// Filter set for `GetClustersByFilter`. `None` fields are unconstrained.
#[derive(Debug, Clone, Default)]
pub struct ClusterFilter {
    pub zone: Option<String>,
    pub exclude_status: Vec<ClusterStatus>,
}

/// Durable persistence of Requests, Clusters and Users.
///
/// All lookups return [`StoreError::NotFound`] when no record matches;
/// writes must be observable to subsequent reads in the same process. No
/// transaction across the three entities is required or offered.
#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_request(&self, request: &Request) -> StoreResult<()>;
    async fn replace_request(&self, request: &Request) -> StoreResult<()>;
    async fn update_request_status(
        &self,
        id: &str,
        status: RequestStatus,
        error: &str,
    ) -> StoreResult<()>;
    async fn get_request(&self, id: &str) -> StoreResult<Request>;
    async fn get_all_requests(&self) -> StoreResult<Vec<Request>>;
    async fn get_requests_by_status(&self, status: RequestStatus) -> StoreResult<Vec<Request>>;

    async fn replace_cluster(&self, cluster: &Cluster) -> StoreResult<()>;
    async fn get_cluster(&self, id: &str) -> StoreResult<Cluster>;
    async fn get_cluster_by_name(&self, name: &str) -> StoreResult<Cluster>;
    async fn get_clusters_by_request(&self, request_id: &str) -> StoreResult<Vec<Cluster>>;
    async fn get_clusters_by_filter(&self, filter: &ClusterFilter) -> StoreResult<Vec<Cluster>>;

    async fn insert_user(&self, user: &User) -> StoreResult<()>;
    async fn replace_user(&self, user: &User) -> StoreResult<()>;
    async fn get_all_users(&self) -> StoreResult<Vec<User>>;
    /// `cluster_id == ""` looks up the least-recently-recycled free user
    /// (`recycled_unix ASC`, so never-recycled `0` rows sort first).
    async fn get_user_by_cluster_id(&self, cluster_id: &str) -> StoreResult<User>;
}

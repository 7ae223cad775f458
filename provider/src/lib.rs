pub mod client;
pub mod error;
pub mod mock;
pub mod token;
pub mod types;

pub use error::ProviderError;
pub use types::{CloudDirectoryUser, ClusterSnapshot, CreateClusterResult, IamUser, Location, Vlan, VlanType};

use async_trait::async_trait;

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Token management; zone/vlan lookup; cluster create/get/delete;
/// directory-user create/password-rotate; IAM lookup; access-policy
/// create/delete.
#[async_trait]
pub trait CloudProvider: Send + Sync {
    async fn get_zones(&self) -> ProviderResult<Vec<Location>>;
    async fn get_vlans(&self, zone: &str) -> ProviderResult<Vec<Vlan>>;
    async fn create_cluster(
        &self,
        name: &str,
        zone: &str,
        no_subnet: bool,
    ) -> ProviderResult<CreateClusterResult>;
    async fn get_cluster(&self, id: &str) -> ProviderResult<ClusterSnapshot>;
    async fn delete_cluster(&self, id: &str) -> ProviderResult<()>;

    async fn create_cloud_directory_user(&self, username: &str) -> ProviderResult<CloudDirectoryUser>;
    async fn update_cloud_directory_user_password(
        &self,
        id: &str,
    ) -> ProviderResult<CloudDirectoryUser>;
    async fn get_iam_user_by_user_id(&self, user_id: &str) -> ProviderResult<IamUser>;

    async fn create_access_policy(
        &self,
        account_id: &str,
        iam_user_id: &str,
        cluster_id: &str,
    ) -> ProviderResult<String>;
    async fn delete_access_policy(&self, policy_id: &str) -> ProviderResult<()>;
}

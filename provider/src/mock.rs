use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::types::{CloudDirectoryUser, ClusterSnapshot, CreateClusterResult, IamUser, Location, Vlan, VlanType};
use crate::{CloudProvider, ProviderError, ProviderResult};

#[derive(Default)]
struct ClusterState {
    state: String,
    hostname: String,
    master_url: String,
    deleted: bool,
}

#[derive(Default)]
struct DirectoryUser {
    username: String,
    email: String,
}

/// In-memory `CloudProvider` used to drive the end-to-end scenarios in
/// `devcluster-core`'s tests without a live cloud API.
#[derive(Default)]
pub struct MockProvider {
    clusters: Mutex<HashMap<String, ClusterState>>,
    directory_users: Mutex<HashMap<String, DirectoryUser>>,
    fail_policy_delete: Mutex<HashSet<String>>,
    fail_policy_create_for_cluster: Mutex<HashSet<String>>,
    fail_create_cluster: Mutex<bool>,
    next_id: AtomicU64,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc_id(&self, prefix: &str) -> String {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        format!("{prefix}-{n}")
    }

    /// Test hook: push a cluster straight to `Normal` with the given
    /// hostname/masterURL, as if the upstream finished provisioning.
    pub fn set_ready(&self, cluster_id: &str, hostname: &str, master_url: &str) {
        let mut clusters = self.clusters.lock().unwrap();
        if let Some(c) = clusters.get_mut(cluster_id) {
            c.state = "normal".to_string();
            c.hostname = hostname.to_string();
            c.master_url = master_url.to_string();
        }
    }

    /// Test hook: configure `DeleteAccessPolicy` to fail for this policy id.
    pub fn fail_delete_access_policy_for(&self, policy_id: &str) {
        self.fail_policy_delete
            .lock()
            .unwrap()
            .insert(policy_id.to_string());
    }

    /// Test hook: configure `CreateAccessPolicy` to fail for this cluster id.
    pub fn fail_create_access_policy_for(&self, cluster_id: &str) {
        self.fail_policy_create_for_cluster
            .lock()
            .unwrap()
            .insert(cluster_id.to_string());
    }

    /// Test hook: make every subsequent `CreateCluster` call fail.
    pub fn always_fail_create_cluster(&self) {
        *self.fail_create_cluster.lock().unwrap() = true;
    }
}

#[async_trait]
impl CloudProvider for MockProvider {
    async fn get_zones(&self) -> ProviderResult<Vec<Location>> {
        Ok(vec![
            Location {
                id: "lon06".to_string(),
                display_name: "London 06".to_string(),
                kind: "dc".to_string(),
            },
            Location {
                id: "wdc02".to_string(),
                display_name: "Washington 02".to_string(),
                kind: "dc".to_string(),
            },
        ])
    }

    async fn get_vlans(&self, _zone: &str) -> ProviderResult<Vec<Vlan>> {
        Ok(vec![
            Vlan {
                id: self.alloc_id("pub-vlan"),
                vlan_type: VlanType::Public,
            },
            Vlan {
                id: self.alloc_id("priv-vlan"),
                vlan_type: VlanType::Private,
            },
        ])
    }

    async fn create_cluster(
        &self,
        name: &str,
        zone: &str,
        _no_subnet: bool,
    ) -> ProviderResult<CreateClusterResult> {
        if *self.fail_create_cluster.lock().unwrap() {
            return Err(ProviderError::Other(
                "mock: configured to fail CreateCluster".to_string(),
            ));
        }
        let vlans = self.get_vlans(zone).await?;
        let cluster_id = self.alloc_id(&format!("cl-{name}"));
        self.clusters.lock().unwrap().insert(
            cluster_id.clone(),
            ClusterState {
                state: "deploying".to_string(),
                hostname: String::new(),
                master_url: String::new(),
                deleted: false,
            },
        );
        Ok(CreateClusterResult {
            cluster_id: cluster_id.clone(),
            provider_request_id: self.alloc_id("req"),
            public_vlan: vlans
                .iter()
                .find(|v| v.vlan_type == VlanType::Public)
                .unwrap()
                .id
                .clone(),
            private_vlan: vlans
                .iter()
                .find(|v| v.vlan_type == VlanType::Private)
                .unwrap()
                .id
                .clone(),
        })
    }

    async fn get_cluster(&self, id: &str) -> ProviderResult<ClusterSnapshot> {
        let clusters = self.clusters.lock().unwrap();
        let c = clusters.get(id).ok_or(ProviderError::NotFound)?;
        if c.deleted {
            return Err(ProviderError::NotFound);
        }
        Ok(ClusterSnapshot {
            id: id.to_string(),
            state: c.state.clone(),
            hostname: c.hostname.clone(),
            master_url: c.master_url.clone(),
        })
    }

    async fn delete_cluster(&self, id: &str) -> ProviderResult<()> {
        let mut clusters = self.clusters.lock().unwrap();
        match clusters.get_mut(id) {
            None => Err(ProviderError::NotFound),
            Some(c) if c.deleted => Err(ProviderError::NotFound),
            Some(c) => {
                c.deleted = true;
                Ok(())
            }
        }
    }

    async fn create_cloud_directory_user(&self, username: &str) -> ProviderResult<CloudDirectoryUser> {
        let id = self.alloc_id("cdu");
        let email = format!("{username}@devcluster.example.com");
        self.directory_users.lock().unwrap().insert(
            id.clone(),
            DirectoryUser {
                username: username.to_string(),
                email: email.clone(),
            },
        );
        Ok(CloudDirectoryUser {
            id,
            username: username.to_string(),
            email,
            password: self.alloc_id("pw"),
        })
    }

    async fn update_cloud_directory_user_password(&self, id: &str) -> ProviderResult<CloudDirectoryUser> {
        let users = self.directory_users.lock().unwrap();
        let user = users.get(id).ok_or(ProviderError::NotFound)?;
        Ok(CloudDirectoryUser {
            id: id.to_string(),
            username: user.username.clone(),
            email: user.email.clone(),
            password: self.alloc_id("pw"),
        })
    }

    async fn get_iam_user_by_user_id(&self, user_id: &str) -> ProviderResult<IamUser> {
        Ok(IamUser {
            id: format!("iam-{user_id}"),
        })
    }

    async fn create_access_policy(
        &self,
        _account_id: &str,
        _iam_user_id: &str,
        cluster_id: &str,
    ) -> ProviderResult<String> {
        if self
            .fail_policy_create_for_cluster
            .lock()
            .unwrap()
            .contains(cluster_id)
        {
            return Err(ProviderError::Other(
                "mock: configured to fail CreateAccessPolicy".to_string(),
            ));
        }
        Ok(self.alloc_id("policy"))
    }

    async fn delete_access_policy(&self, policy_id: &str) -> ProviderResult<()> {
        if self
            .fail_policy_delete
            .lock()
            .unwrap()
            .contains(policy_id)
        {
            return Err(ProviderError::Other(
                "mock: configured to fail DeleteAccessPolicy".to_string(),
            ));
        }
        Ok(())
    }
}

use serde::{Deserialize, Serialize};

/// A datacenter zone as reported by the cloud provider's location listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub id: String,
    pub display_name: String,
    pub kind: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VlanType {
    Public,
    Private,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vlan {
    pub id: String,
    pub vlan_type: VlanType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateClusterResult {
    pub cluster_id: String,
    pub provider_request_id: String,
    pub public_vlan: String,
    pub private_vlan: String,
}

/// A point-in-time snapshot returned by `GetCluster`, merged into the local
/// `Cluster` row by the Provisioning Worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    pub id: String,
    pub state: String,
    pub hostname: String,
    pub master_url: String,
}

impl ClusterSnapshot {
    pub fn is_normal(&self) -> bool {
        self.state.eq_ignore_ascii_case("normal")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudDirectoryUser {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IamUser {
    pub id: String,
}

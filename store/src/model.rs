use serde::{Deserialize, Serialize};

/// Status of a batch provisioning intent. Persisted as text, not a SQL enum
/// type, matching the teacher's plain-column schema style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestStatus {
    Provisioning,
    Ready,
    Failed,
    Expired,
    FailedToExpire,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Provisioning => "provisioning",
            RequestStatus::Ready => "ready",
            RequestStatus::Failed => "failed",
            RequestStatus::Expired => "expired",
            RequestStatus::FailedToExpire => "failed_to_expire",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "provisioning" => RequestStatus::Provisioning,
            "ready" => RequestStatus::Ready,
            "failed" => RequestStatus::Failed,
            "expired" => RequestStatus::Expired,
            "failed_to_expire" => RequestStatus::FailedToExpire,
            _ => return None,
        })
    }
}

/// Status of a single provisioned workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClusterStatus {
    Provisioning,
    Normal,
    Failed,
    Deleted,
    Deleting,
    FailedToDelete,
}

impl ClusterStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClusterStatus::Provisioning => "provisioning",
            ClusterStatus::Normal => "normal",
            ClusterStatus::Failed => "failed",
            ClusterStatus::Deleted => "deleted",
            ClusterStatus::Deleting => "deleting",
            ClusterStatus::FailedToDelete => "failed_to_delete",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "provisioning" => ClusterStatus::Provisioning,
            "normal" => ClusterStatus::Normal,
            "failed" => ClusterStatus::Failed,
            "deleted" => ClusterStatus::Deleted,
            "deleting" => ClusterStatus::Deleting,
            "failed_to_delete" => ClusterStatus::FailedToDelete,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: String,
    pub requested_by: String,
    pub created_unix: i64,
    pub requested: i32,
    pub zone: String,
    pub delete_in_hours: i64,
    pub no_subnet: bool,
    pub status: RequestStatus,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cluster {
    pub id: String,
    pub request_id: String,
    pub provider_request_id: String,
    pub name: String,
    pub hostname: String,
    pub master_url: String,
    pub status: ClusterStatus,
    pub error: String,
    pub public_vlan: String,
    pub private_vlan: String,
}

impl Cluster {
    /// `state == Normal ∧ hostname != "" ∧ masterURL != ""`.
    pub fn is_ready(&self) -> bool {
        self.status == ClusterStatus::Normal && !self.hostname.is_empty() && !self.master_url.is_empty()
    }

    /// Not ready, not Failed, not Deleted.
    pub fn is_provisioning_pending(&self) -> bool {
        !self.is_ready() && self.status != ClusterStatus::Failed && self.status != ClusterStatus::Deleted
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub cloud_direct_id: String,
    pub email: String,
    pub password: String,
    pub cluster_id: String,
    pub policy_id: String,
    pub recycled_unix: i64,
}

impl User {
    pub fn is_free(&self) -> bool {
        self.cluster_id.is_empty()
    }
}

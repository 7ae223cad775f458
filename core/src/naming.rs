use chrono::Utc;
use fnv::FnvHasher;
use std::hash::Hasher;
use thiserror::Error;
use uuid::Uuid;

use devcluster_store::{ClusterStatus, Store, StoreError};

#[derive(Debug, Error)]
pub enum NamingError {
    #[error("exhausted {0} attempts generating a unique cluster name")]
    UniqueNameExhausted(u32),

    #[error(transparent)]
    Store(#[from] StoreError),
}

const MAX_NAMING_ATTEMPTS: u32 = 100;

fn fnv32_uuid() -> u32 {
    let uuid = Uuid::new_v4();
    let mut hasher = FnvHasher::default();
    hasher.write(uuid.as_bytes());
    hasher.finish() as u32
}

/// `rhd-<zone>-<MMM dd>-<fnv32(uuid v4)>`.
pub fn generate_cluster_name(zone: &str) -> String {
    let now = Utc::now();
    format!("rhd-{zone}-{}-{:x}", now.format("%b%d"), fnv32_uuid())
}

/// Login for a pooled directory user.
pub fn user_login(index: u64) -> String {
    format!("rh-dev-{index}")
}

/// Generates a cluster name and verifies it is unique: acceptable iff no row
/// exists with that name, or the existing row's status is `Deleted`.
pub async fn allocate_unique_name(store: &dyn Store, zone: &str) -> Result<String, NamingError> {
    allocate_unique_name_with(store, || generate_cluster_name(zone)).await
}

/// Same retry/uniqueness contract as [`allocate_unique_name`], but takes the
/// name generator as a closure so tests can drive deterministic collisions.
pub async fn allocate_unique_name_with<F>(store: &dyn Store, mut gen_name: F) -> Result<String, NamingError>
where
    F: FnMut() -> String,
{
    for _ in 0..MAX_NAMING_ATTEMPTS {
        let candidate = gen_name();
        match store.get_cluster_by_name(&candidate).await {
            Err(StoreError::NotFound) => return Ok(candidate),
            Ok(existing) if existing.status == ClusterStatus::Deleted => return Ok(candidate),
            Ok(_) => continue,
            Err(other) => return Err(other.into()),
        }
    }
    Err(NamingError::UniqueNameExhausted(MAX_NAMING_ATTEMPTS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use devcluster_store::{Cluster, ClusterStatus, memory::MemoryStore};

    fn cluster(name: &str, status: ClusterStatus) -> Cluster {
        Cluster {
            id: name.to_string(),
            request_id: "req-1".to_string(),
            provider_request_id: String::new(),
            name: name.to_string(),
            hostname: String::new(),
            master_url: String::new(),
            status,
            error: String::new(),
            public_vlan: String::new(),
            private_vlan: String::new(),
        }
    }

    #[tokio::test]
    async fn collision_with_live_row_retries_until_unique() {
        let store = MemoryStore::new();
        store
            .replace_cluster(&cluster("rhd-lon06-Jan02-42", ClusterStatus::Provisioning))
            .await
            .unwrap();

        let mut candidates = ["rhd-lon06-Jan02-42", "rhd-lon06-Jan02-43"].into_iter();
        let name = allocate_unique_name_with(&store, || candidates.next().unwrap().to_string())
            .await
            .unwrap();

        assert_eq!(name, "rhd-lon06-Jan02-43");
        assert!(store.get_cluster_by_name("rhd-lon06-Jan02-42").await.is_ok());
        assert!(matches!(
            store.get_cluster_by_name("rhd-lon06-Jan02-43").await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn collision_with_deleted_row_is_accepted() {
        let store = MemoryStore::new();
        store
            .replace_cluster(&cluster("rhd-lon06-Jan02-42", ClusterStatus::Deleted))
            .await
            .unwrap();

        let name = allocate_unique_name_with(&store, || "rhd-lon06-Jan02-42".to_string())
            .await
            .unwrap();

        assert_eq!(name, "rhd-lon06-Jan02-42");
    }

    #[tokio::test]
    async fn exhaustion_after_max_attempts_is_terminal() {
        let store = MemoryStore::new();
        store
            .replace_cluster(&cluster("dup", ClusterStatus::Provisioning))
            .await
            .unwrap();

        let err = allocate_unique_name_with(&store, || "dup".to_string()).await.unwrap_err();
        assert!(matches!(err, NamingError::UniqueNameExhausted(MAX_NAMING_ATTEMPTS)));
    }
}

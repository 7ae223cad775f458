use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;

use devcluster_provider::{CloudProvider, ProviderError};
use devcluster_store::{Store, StoreError, User};

#[derive(Debug, Error)]
pub enum AllocatorError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Serializes the "pick a free user and atomically assign it to a cluster"
/// step. The mutex guards only the read-free/write-bind critical section;
/// the access-policy network call happens outside it (spec §4.3/§5) to
/// avoid head-of-line blocking.
pub struct Allocator {
    store: Arc<dyn Store>,
    provider: Arc<dyn CloudProvider>,
    account_id: String,
    bind_lock: Mutex<()>,
}

impl Allocator {
    pub fn new(store: Arc<dyn Store>, provider: Arc<dyn CloudProvider>, account_id: String) -> Self {
        Self {
            store,
            provider,
            account_id,
            bind_lock: Mutex::new(()),
        }
    }

    pub async fn assign_user(&self, cluster_id: &str) -> Result<User, AllocatorError> {
        let mut user = {
            let _guard = self.bind_lock.lock().await;
            let mut user = self.store.get_user_by_cluster_id("").await?;
            user.cluster_id = cluster_id.to_string();
            self.store.replace_user(&user).await?;
            user
        };

        match self.bind_policy(cluster_id, &user.id).await {
            Ok(policy_id) => {
                user.policy_id = policy_id;
                self.store.replace_user(&user).await?;
                Ok(user)
            }
            Err(err) => {
                user.cluster_id = String::new();
                if let Err(rollback_err) = self.store.replace_user(&user).await {
                    tracing::error!(
                        user_id = %user.id,
                        error = %rollback_err,
                        "failed to roll back user binding after access-policy failure; user is stuck bound"
                    );
                }
                Err(err)
            }
        }
    }

    async fn bind_policy(&self, cluster_id: &str, user_id: &str) -> Result<String, AllocatorError> {
        let iam_user = self.provider.get_iam_user_by_user_id(user_id).await?;
        let policy_id = self
            .provider
            .create_access_policy(&self.account_id, &iam_user.id, cluster_id)
            .await?;
        Ok(policy_id)
    }

    pub async fn recycle_user(&self, cluster_id: &str) -> Result<(), AllocatorError> {
        let mut user = match self.store.get_user_by_cluster_id(cluster_id).await {
            Err(StoreError::NotFound) => return Ok(()),
            Err(other) => return Err(other.into()),
            Ok(user) => user,
        };

        self.provider.delete_access_policy(&user.policy_id).await?;
        let rotated = self
            .provider
            .update_cloud_directory_user_password(&user.cloud_direct_id)
            .await?;

        user.policy_id.clear();
        user.cluster_id.clear();
        user.password = rotated.password;
        user.recycled_unix = chrono::Utc::now().timestamp();
        self.store.replace_user(&user).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devcluster_provider::mock::MockProvider;
    use devcluster_store::memory::MemoryStore;

    /// Registers a directory user with the mock provider (so later
    /// `UpdateCloudDirectoryUserPassword` calls resolve) and returns the pool
    /// `User` row, with `recycled_unix` overridden to the requested value.
    async fn user(provider: &MockProvider, login: &str, recycled_unix: i64) -> User {
        let created = provider.create_cloud_directory_user(login).await.unwrap();
        User {
            id: login.to_string(),
            cloud_direct_id: created.id,
            email: created.email,
            password: created.password,
            cluster_id: String::new(),
            policy_id: String::new(),
            recycled_unix,
        }
    }

    struct Fixture {
        allocator: Allocator,
        store: Arc<MemoryStore>,
        provider: Arc<MockProvider>,
    }

    async fn seeded_allocator(logins_and_recycled: &[(&str, i64)]) -> Fixture {
        let provider = MockProvider::new();
        let mut users = Vec::new();
        for (login, recycled) in logins_and_recycled {
            users.push(user(&provider, login, *recycled).await);
        }
        let store = Arc::new(MemoryStore::new());
        for u in &users {
            store.insert_user(u).await.unwrap();
        }
        let provider = Arc::new(provider);
        let allocator = Allocator::new(store.clone(), provider.clone(), "acct-1".to_string());
        Fixture {
            allocator,
            store,
            provider,
        }
    }

    #[tokio::test]
    async fn free_user_selection_prefers_never_recycled_then_least_recently_recycled() {
        let fx = seeded_allocator(&[("rh-dev-a", 0), ("rh-dev-b", 100), ("rh-dev-c", 200)]).await;

        let first = fx.allocator.assign_user("cluster-1").await.unwrap();
        let second = fx.allocator.assign_user("cluster-2").await.unwrap();
        let third = fx.allocator.assign_user("cluster-3").await.unwrap();

        assert_eq!(first.id, "rh-dev-a");
        assert_eq!(second.id, "rh-dev-b");
        assert_eq!(third.id, "rh-dev-c");
        assert!(!first.policy_id.is_empty());
    }

    #[tokio::test]
    async fn policy_create_failure_rolls_back_the_binding() {
        let fx = seeded_allocator(&[("rh-dev-a", 0)]).await;
        fx.provider.fail_create_access_policy_for("cluster-1");

        let err = fx.allocator.assign_user("cluster-1").await.unwrap_err();
        assert!(matches!(err, AllocatorError::Provider(_)));

        let rolled_back = fx.store.get_user_by_cluster_id("").await.unwrap();
        assert_eq!(rolled_back.id, "rh-dev-a");
        assert!(rolled_back.policy_id.is_empty());
    }

    #[tokio::test]
    async fn recycle_clears_binding_rotates_password_and_stamps_recycled_time() {
        let fx = seeded_allocator(&[("rh-dev-a", 0)]).await;
        let bound = fx.allocator.assign_user("cluster-1").await.unwrap();
        let original_password = bound.password.clone();

        fx.allocator.recycle_user("cluster-1").await.unwrap();

        let recycled = fx.store.get_user_by_cluster_id("").await.unwrap();
        assert_eq!(recycled.id, "rh-dev-a");
        assert!(recycled.cluster_id.is_empty());
        assert!(recycled.policy_id.is_empty());
        assert!(recycled.recycled_unix > 0);
        assert_ne!(recycled.password, original_password);
    }

    #[tokio::test]
    async fn recycle_of_unbound_cluster_is_a_benign_no_op() {
        let fx = seeded_allocator(&[]).await;
        fx.allocator.recycle_user("no-such-cluster").await.unwrap();
    }
}

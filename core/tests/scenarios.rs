//! End-to-end scenarios driving the full provisioning/expiry pipeline
//! against an in-memory store and a mock cloud provider.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use devcluster_core::Runtime;
use devcluster_core::config::Config;
use devcluster_provider::mock::MockProvider;
use devcluster_provider::CloudProvider;
use devcluster_store::memory::MemoryStore;
use devcluster_store::{ClusterStatus, RequestStatus, Store, User};

fn test_config() -> Config {
    Config {
        account_id: "acct-1".to_string(),
        idp_name: "idp".to_string(),
        api_call_retry_sec: 1,
        api_call_timeout_sec: 30,
        reaper_interval_sec: 1,
        oauth_client_id: "client".to_string(),
        dashboard_url: "https://dash.example.com".to_string(),
        callback_url: "https://dash.example.com/callback".to_string(),
        scholars_guide_url: "https://guide.example.com".to_string(),
    }
}

async fn seed_users(store: &Arc<dyn Store>, provider: &MockProvider, n: usize) {
    for i in 0..n {
        let login = format!("rh-dev-{i}");
        let created = provider.create_cloud_directory_user(&login).await.unwrap();
        store
            .insert_user(&User {
                id: login,
                cloud_direct_id: created.id,
                email: created.email,
                password: created.password,
                cluster_id: String::new(),
                policy_id: String::new(),
                recycled_unix: 0,
            })
            .await
            .unwrap();
    }
}

/// Polls `store` until `request_id` has exactly `n` Cluster rows, returning
/// their ids. Panics if `n` rows never materialize.
async fn wait_for_cluster_ids(store: &Arc<dyn Store>, request_id: &str, n: usize) -> Vec<String> {
    for _ in 0..1000 {
        let clusters = store.get_clusters_by_request(request_id).await.unwrap();
        if clusters.len() >= n {
            return clusters.into_iter().map(|c| c.id).collect();
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("{n} cluster rows for request {request_id} never appeared");
}

async fn wait_for_request_status(store: &Arc<dyn Store>, request_id: &str, status: RequestStatus) {
    for _ in 0..1000 {
        let request = store.get_request(request_id).await.unwrap();
        if request.status == status {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let actual = store.get_request(request_id).await.unwrap();
    panic!("request {request_id} never reached {status:?}, last seen {:?}", actual.status);
}

async fn wait_for_cluster_status(store: &Arc<dyn Store>, cluster_id: &str, status: ClusterStatus) {
    for _ in 0..1000 {
        let cluster = store.get_cluster(cluster_id).await.unwrap();
        if cluster.status == status {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("cluster {cluster_id} never reached {status:?}");
}

/// S1 — happy path, 2 clusters from a 3-user pool.
#[tokio::test(start_paused = true)]
async fn happy_path_two_clusters() {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let provider = Arc::new(MockProvider::new());
    seed_users(&store, &provider, 3).await;

    let runtime = Arc::new(Runtime::new(store.clone(), provider.clone(), "acct-1".to_string(), test_config()));
    let request = runtime
        .coordinator
        .create_request("alice", 2, "lon06", 100, false)
        .await
        .unwrap();

    let cluster_ids = wait_for_cluster_ids(&store, &request.id, 2).await;
    for id in &cluster_ids {
        provider.set_ready(id, &format!("host-{id}"), &format!("master-{id}"));
    }
    wait_for_request_status(&store, &request.id, RequestStatus::Ready).await;

    let clusters = store.get_clusters_by_request(&request.id).await.unwrap();
    assert_eq!(clusters.len(), 2);
    for c in &clusters {
        assert_eq!(c.status, ClusterStatus::Normal);
        assert!(!c.hostname.is_empty());
        assert!(!c.master_url.is_empty());
    }

    let users = store.get_all_users().await.unwrap();
    let bound: Vec<_> = users.iter().filter(|u| !u.cluster_id.is_empty()).collect();
    let free: Vec<_> = users.iter().filter(|u| u.cluster_id.is_empty()).collect();
    assert_eq!(bound.len(), 2);
    assert_eq!(free.len(), 1);
    assert_eq!(free[0].recycled_unix, 0);
}

/// S2 — after a simulated crash, Resume restarts the poller for an
/// already-created cluster and fills the deficit with a fresh pipeline.
#[tokio::test(start_paused = true)]
async fn resume_restarts_pending_worker_and_fills_deficit() {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let provider = Arc::new(MockProvider::new());
    seed_users(&store, &provider, 3).await;

    let runtime = Arc::new(Runtime::new(store.clone(), provider.clone(), "acct-1".to_string(), test_config()));

    let request = devcluster_store::Request {
        id: "req-resume".to_string(),
        requested_by: "bob".to_string(),
        created_unix: chrono::Utc::now().timestamp(),
        requested: 2,
        zone: "lon06".to_string(),
        delete_in_hours: 100,
        no_subnet: false,
        status: RequestStatus::Provisioning,
        error: String::new(),
    };
    store.insert_request(&request).await.unwrap();

    // Simulates the one cluster that survived a crash mid-poll: already
    // created upstream and locally persisted, but not yet Normal.
    let provisioned = provider.create_cluster("rhd-lon06-resume-1", "lon06", false).await.unwrap();
    let survivor = devcluster_store::Cluster {
        id: provisioned.cluster_id.clone(),
        request_id: request.id.clone(),
        provider_request_id: provisioned.provider_request_id,
        name: "rhd-lon06-resume-1".to_string(),
        hostname: String::new(),
        master_url: String::new(),
        status: ClusterStatus::Provisioning,
        error: String::new(),
        public_vlan: provisioned.public_vlan,
        private_vlan: provisioned.private_vlan,
    };
    store.replace_cluster(&survivor).await.unwrap();

    runtime.resume().await.unwrap();

    let cluster_ids = wait_for_cluster_ids(&store, &request.id, 2).await;
    for id in &cluster_ids {
        provider.set_ready(id, &format!("host-{id}"), &format!("master-{id}"));
    }
    wait_for_request_status(&store, &request.id, RequestStatus::Ready).await;

    let clusters = store.get_clusters_by_request(&request.id).await.unwrap();
    assert_eq!(clusters.len(), 2);
    assert!(clusters.iter().all(|c| c.status == ClusterStatus::Normal));
}

/// S3 — an expired request has all its clusters deleted and their users
/// recycled back to the free pool.
#[tokio::test(start_paused = true)]
async fn expiry_reaper_deletes_clusters_and_recycles_users() {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let provider = Arc::new(MockProvider::new());
    seed_users(&store, &provider, 3).await;

    let runtime = Arc::new(Runtime::new(store.clone(), provider.clone(), "acct-1".to_string(), test_config()));
    let request = runtime
        .coordinator
        .create_request("bob", 3, "wdc02", 0, false)
        .await
        .unwrap();

    let cluster_ids = wait_for_cluster_ids(&store, &request.id, 3).await;
    for id in &cluster_ids {
        provider.set_ready(id, &format!("host-{id}"), &format!("master-{id}"));
    }
    wait_for_request_status(&store, &request.id, RequestStatus::Ready).await;

    let cancel = CancellationToken::new();
    let reaper = runtime.spawn_reaper(cancel.clone());

    wait_for_request_status(&store, &request.id, RequestStatus::Expired).await;
    cancel.cancel();
    reaper.await.unwrap();

    for id in &cluster_ids {
        let cluster = store.get_cluster(id).await.unwrap();
        assert_eq!(cluster.status, ClusterStatus::Deleted);
        assert!(matches!(
            provider.get_cluster(id).await,
            Err(devcluster_provider::ProviderError::NotFound)
        ));
    }

    let users = store.get_all_users().await.unwrap();
    assert!(users.iter().all(|u| u.cluster_id.is_empty()));
    assert!(users.iter().all(|u| u.recycled_unix > 0));
}

/// S4 — if recycling one cluster's user fails (here, `DeleteAccessPolicy`),
/// that cluster ends `FailedToDelete` and the request `FailedToExpire`,
/// while its siblings still delete cleanly.
#[tokio::test(start_paused = true)]
async fn expiry_reaper_reports_failed_to_expire_when_one_delete_fails() {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let provider = Arc::new(MockProvider::new());
    seed_users(&store, &provider, 3).await;

    let runtime = Arc::new(Runtime::new(store.clone(), provider.clone(), "acct-1".to_string(), test_config()));
    let request = runtime
        .coordinator
        .create_request("carol", 3, "wdc02", 0, false)
        .await
        .unwrap();

    let cluster_ids = wait_for_cluster_ids(&store, &request.id, 3).await;
    for id in &cluster_ids {
        provider.set_ready(id, &format!("host-{id}"), &format!("master-{id}"));
    }
    wait_for_request_status(&store, &request.id, RequestStatus::Ready).await;

    let doomed = &cluster_ids[0];
    let bound_user = store.get_user_by_cluster_id(doomed).await.unwrap();
    provider.fail_delete_access_policy_for(&bound_user.policy_id);

    let cancel = CancellationToken::new();
    let reaper = runtime.spawn_reaper(cancel.clone());

    wait_for_cluster_status(&store, doomed, ClusterStatus::FailedToDelete).await;
    wait_for_request_status(&store, &request.id, RequestStatus::FailedToExpire).await;
    cancel.cancel();
    reaper.await.unwrap();

    for id in &cluster_ids[1..] {
        let cluster = store.get_cluster(id).await.unwrap();
        assert_eq!(cluster.status, ClusterStatus::Deleted);
    }

    let still_bound = store.get_user_by_cluster_id(doomed).await.unwrap();
    assert_eq!(still_bound.id, bound_user.id);
}

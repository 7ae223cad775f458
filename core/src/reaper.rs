use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use devcluster_store::{ClusterStatus, RequestStatus};

use crate::coordinator::Coordinator;

/// Periodic scan: delete expired clusters, recycle their users, update
/// request status. Runs forever; every error is logged and the next tick
/// resumes (spec §4.7). `cancel` lets the binary shut down promptly instead
/// of waiting out a sleep — a purely ambient concern, not a change to the
/// reaper's business semantics (see the Open Question 3 note in DESIGN.md).
pub async fn run(coordinator: Arc<Coordinator>, interval: Duration, cancel: CancellationToken) {
    loop {
        if let Err(err) = tick(&coordinator).await {
            tracing::error!(error = %err, "expiry reaper tick failed");
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("expiry reaper shutting down");
                return;
            }
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

async fn tick(coordinator: &Arc<Coordinator>) -> Result<(), devcluster_store::StoreError> {
    let now = chrono::Utc::now().timestamp();
    let requests = coordinator.store().get_all_requests().await?;

    for request in requests {
        if request.status == RequestStatus::Expired {
            continue;
        }
        let expires_at = request.created_unix + request.delete_in_hours * 3600;
        if now < expires_at {
            continue;
        }

        let clusters = coordinator.store().get_clusters_by_request(&request.id).await?;
        let mut all_succeeded = true;

        for cluster in clusters {
            if cluster.status == ClusterStatus::Deleted || cluster.status == ClusterStatus::Deleting {
                continue;
            }
            if let Err(err) = coordinator.delete_cluster(&cluster.id).await {
                all_succeeded = false;
                tracing::error!(cluster_id = %cluster.id, error = %err, "reaper failed to delete expired cluster");
                if let Ok(mut c) = coordinator.store().get_cluster(&cluster.id).await {
                    c.status = ClusterStatus::FailedToDelete;
                    c.error = err.to_string();
                    let _ = coordinator.store().replace_cluster(&c).await;
                }
            }
        }

        if all_succeeded {
            coordinator
                .store()
                .update_request_status(&request.id, RequestStatus::Expired, "")
                .await?;
        } else {
            coordinator
                .store()
                .update_request_status(
                    &request.id,
                    RequestStatus::FailedToExpire,
                    "unable to delete some clusters",
                )
                .await?;
        }
    }

    Ok(())
}

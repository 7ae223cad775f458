use std::sync::Arc;

use devcluster_store::RequestStatus;

use crate::coordinator::{Coordinator, CoordinatorError};

/// Runs once, synchronously, at startup before serving. Scans `Provisioning`
/// Requests and restarts work for pending or missing clusters; never resets
/// a status — workers themselves converge them.
pub async fn run(coordinator: &Arc<Coordinator>) -> Result<(), CoordinatorError> {
    let requests = coordinator.store().get_requests_by_status(RequestStatus::Provisioning).await?;

    for request in requests {
        let clusters = coordinator.store().get_clusters_by_request(&request.id).await?;

        for cluster in &clusters {
            if cluster.is_provisioning_pending() {
                let worker = Arc::new(coordinator.worker());
                let request_id = request.id.clone();
                let cluster_id = cluster.id.clone();
                tokio::spawn(async move {
                    worker.resume_polling(&request_id, &cluster_id).await;
                });
            }
        }

        let deficit = request.requested.saturating_sub(clusters.len() as i32);
        if deficit > 0 {
            let coordinator = coordinator.clone();
            let request_id = request.id.clone();
            let zone = request.zone.clone();
            let no_subnet = request.no_subnet;
            tokio::spawn(async move {
                coordinator
                    .drive_new_request(request_id, zone, deficit as u32, no_subnet)
                    .await;
            });
        }
    }

    Ok(())
}

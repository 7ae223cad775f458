use async_trait::async_trait;
use deadpool_postgres::Pool;
use tokio_postgres::Row;

use crate::{
    Cluster, ClusterFilter, ClusterStatus, Request, RequestStatus, Store, StoreError, StoreResult,
    User,
};

/// `deadpool-postgres`-backed `Store`. Schema is created idempotently at
/// startup via `init_schema`, matching the teacher's migration-free style.
pub struct PostgresStore {
    pool: Pool,
}

impl PostgresStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub async fn init_schema(&self) -> StoreResult<()> {
        let client = self.pool.get().await?;
        client
            .batch_execute(
                "
                CREATE TABLE IF NOT EXISTS requests (
                    id TEXT PRIMARY KEY,
                    requested_by TEXT NOT NULL,
                    created_unix BIGINT NOT NULL,
                    requested INT NOT NULL,
                    zone TEXT NOT NULL,
                    delete_in_hours BIGINT NOT NULL,
                    no_subnet BOOLEAN NOT NULL,
                    status TEXT NOT NULL,
                    error TEXT NOT NULL DEFAULT ''
                );
                CREATE INDEX IF NOT EXISTS requests_status_idx ON requests (status);

                CREATE TABLE IF NOT EXISTS clusters (
                    id TEXT PRIMARY KEY,
                    request_id TEXT NOT NULL REFERENCES requests (id),
                    provider_request_id TEXT NOT NULL DEFAULT '',
                    name TEXT NOT NULL,
                    hostname TEXT NOT NULL DEFAULT '',
                    master_url TEXT NOT NULL DEFAULT '',
                    status TEXT NOT NULL,
                    error TEXT NOT NULL DEFAULT '',
                    public_vlan TEXT NOT NULL DEFAULT '',
                    private_vlan TEXT NOT NULL DEFAULT ''
                );
                CREATE INDEX IF NOT EXISTS clusters_request_id_idx ON clusters (request_id);
                CREATE INDEX IF NOT EXISTS clusters_name_idx ON clusters (name);

                CREATE TABLE IF NOT EXISTS users (
                    id TEXT PRIMARY KEY,
                    cloud_direct_id TEXT NOT NULL,
                    email TEXT NOT NULL,
                    password TEXT NOT NULL,
                    cluster_id TEXT NOT NULL DEFAULT '',
                    policy_id TEXT NOT NULL DEFAULT '',
                    recycled_unix BIGINT NOT NULL DEFAULT 0
                );
                CREATE INDEX IF NOT EXISTS users_cluster_id_idx ON users (cluster_id);
                ",
            )
            .await?;
        Ok(())
    }
}

fn row_to_request(row: &Row) -> StoreResult<Request> {
    let status: String = row.get("status");
    Ok(Request {
        id: row.get("id"),
        requested_by: row.get("requested_by"),
        created_unix: row.get("created_unix"),
        requested: row.get("requested"),
        zone: row.get("zone"),
        delete_in_hours: row.get("delete_in_hours"),
        no_subnet: row.get("no_subnet"),
        status: RequestStatus::parse(&status)
            .ok_or_else(|| StoreError::Other(format!("unknown request status {status}")))?,
        error: row.get("error"),
    })
}

fn row_to_cluster(row: &Row) -> StoreResult<Cluster> {
    let status: String = row.get("status");
    Ok(Cluster {
        id: row.get("id"),
        request_id: row.get("request_id"),
        provider_request_id: row.get("provider_request_id"),
        name: row.get("name"),
        hostname: row.get("hostname"),
        master_url: row.get("master_url"),
        status: ClusterStatus::parse(&status)
            .ok_or_else(|| StoreError::Other(format!("unknown cluster status {status}")))?,
        error: row.get("error"),
        public_vlan: row.get("public_vlan"),
        private_vlan: row.get("private_vlan"),
    })
}

fn row_to_user(row: &Row) -> User {
    User {
        id: row.get("id"),
        cloud_direct_id: row.get("cloud_direct_id"),
        email: row.get("email"),
        password: row.get("password"),
        cluster_id: row.get("cluster_id"),
        policy_id: row.get("policy_id"),
        recycled_unix: row.get("recycled_unix"),
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn insert_request(&self, request: &Request) -> StoreResult<()> {
        self.replace_request(request).await
    }

    async fn replace_request(&self, request: &Request) -> StoreResult<()> {
        let client = self.pool.get().await?;
        client
            .execute(
                "INSERT INTO requests (id, requested_by, created_unix, requested, zone, delete_in_hours, no_subnet, status, error)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                 ON CONFLICT (id) DO UPDATE SET
                    requested_by = EXCLUDED.requested_by,
                    created_unix = EXCLUDED.created_unix,
                    requested = EXCLUDED.requested,
                    zone = EXCLUDED.zone,
                    delete_in_hours = EXCLUDED.delete_in_hours,
                    no_subnet = EXCLUDED.no_subnet,
                    status = EXCLUDED.status,
                    error = EXCLUDED.error",
                &[
                    &request.id,
                    &request.requested_by,
                    &request.created_unix,
                    &request.requested,
                    &request.zone,
                    &request.delete_in_hours,
                    &request.no_subnet,
                    &request.status.as_str(),
                    &request.error,
                ],
            )
            .await?;
        Ok(())
    }

    async fn update_request_status(
        &self,
        id: &str,
        status: RequestStatus,
        error: &str,
    ) -> StoreResult<()> {
        let client = self.pool.get().await?;
        let updated = client
            .execute(
                "UPDATE requests SET status = $2, error = $3 WHERE id = $1",
                &[&id, &status.as_str(), &error],
            )
            .await?;
        if updated == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn get_request(&self, id: &str) -> StoreResult<Request> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt("SELECT * FROM requests WHERE id = $1", &[&id])
            .await?
            .ok_or(StoreError::NotFound)?;
        row_to_request(&row)
    }

    async fn get_all_requests(&self) -> StoreResult<Vec<Request>> {
        let client = self.pool.get().await?;
        let rows = client.query("SELECT * FROM requests", &[]).await?;
        rows.iter().map(row_to_request).collect()
    }

    async fn get_requests_by_status(&self, status: RequestStatus) -> StoreResult<Vec<Request>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT * FROM requests WHERE status = $1",
                &[&status.as_str()],
            )
            .await?;
        rows.iter().map(row_to_request).collect()
    }

    async fn replace_cluster(&self, cluster: &Cluster) -> StoreResult<()> {
        let client = self.pool.get().await?;
        client
            .execute(
                "INSERT INTO clusters (id, request_id, provider_request_id, name, hostname, master_url, status, error, public_vlan, private_vlan)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                 ON CONFLICT (id) DO UPDATE SET
                    request_id = EXCLUDED.request_id,
                    provider_request_id = EXCLUDED.provider_request_id,
                    name = EXCLUDED.name,
                    hostname = EXCLUDED.hostname,
                    master_url = EXCLUDED.master_url,
                    status = EXCLUDED.status,
                    error = EXCLUDED.error,
                    public_vlan = EXCLUDED.public_vlan,
                    private_vlan = EXCLUDED.private_vlan",
                &[
                    &cluster.id,
                    &cluster.request_id,
                    &cluster.provider_request_id,
                    &cluster.name,
                    &cluster.hostname,
                    &cluster.master_url,
                    &cluster.status.as_str(),
                    &cluster.error,
                    &cluster.public_vlan,
                    &cluster.private_vlan,
                ],
            )
            .await?;
        Ok(())
    }

    async fn get_cluster(&self, id: &str) -> StoreResult<Cluster> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt("SELECT * FROM clusters WHERE id = $1", &[&id])
            .await?
            .ok_or(StoreError::NotFound)?;
        row_to_cluster(&row)
    }

    async fn get_cluster_by_name(&self, name: &str) -> StoreResult<Cluster> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt("SELECT * FROM clusters WHERE name = $1", &[&name])
            .await?
            .ok_or(StoreError::NotFound)?;
        row_to_cluster(&row)
    }

    async fn get_clusters_by_request(&self, request_id: &str) -> StoreResult<Vec<Cluster>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT * FROM clusters WHERE request_id = $1",
                &[&request_id],
            )
            .await?;
        rows.iter().map(row_to_cluster).collect()
    }

    async fn get_clusters_by_filter(&self, filter: &ClusterFilter) -> StoreResult<Vec<Cluster>> {
        let client = self.pool.get().await?;
        let exclude: Vec<&str> = filter.exclude_status.iter().map(|s| s.as_str()).collect();
        let rows = match &filter.zone {
            Some(zone) => {
                client
                    .query(
                        "SELECT c.* FROM clusters c
                         JOIN requests r ON r.id = c.request_id
                         WHERE r.zone = $1 AND NOT (c.status = ANY($2))",
                        &[zone, &exclude],
                    )
                    .await?
            }
            None => {
                client
                    .query(
                        "SELECT * FROM clusters WHERE NOT (status = ANY($1))",
                        &[&exclude],
                    )
                    .await?
            }
        };
        rows.iter().map(row_to_cluster).collect()
    }

    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        self.replace_user(user).await
    }

    async fn replace_user(&self, user: &User) -> StoreResult<()> {
        let client = self.pool.get().await?;
        client
            .execute(
                "INSERT INTO users (id, cloud_direct_id, email, password, cluster_id, policy_id, recycled_unix)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)
                 ON CONFLICT (id) DO UPDATE SET
                    cloud_direct_id = EXCLUDED.cloud_direct_id,
                    email = EXCLUDED.email,
                    password = EXCLUDED.password,
                    cluster_id = EXCLUDED.cluster_id,
                    policy_id = EXCLUDED.policy_id,
                    recycled_unix = EXCLUDED.recycled_unix",
                &[
                    &user.id,
                    &user.cloud_direct_id,
                    &user.email,
                    &user.password,
                    &user.cluster_id,
                    &user.policy_id,
                    &user.recycled_unix,
                ],
            )
            .await?;
        Ok(())
    }

    async fn get_all_users(&self) -> StoreResult<Vec<User>> {
        let client = self.pool.get().await?;
        let rows = client.query("SELECT * FROM users", &[]).await?;
        Ok(rows.iter().map(row_to_user).collect())
    }

    async fn get_user_by_cluster_id(&self, cluster_id: &str) -> StoreResult<User> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                "SELECT * FROM users WHERE cluster_id = $1 ORDER BY recycled_unix ASC LIMIT 1",
                &[&cluster_id],
            )
            .await?
            .ok_or(StoreError::NotFound)?;
        Ok(row_to_user(&row))
    }
}

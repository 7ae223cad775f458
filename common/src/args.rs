use clap::Parser;

#[derive(Parser, Debug, Clone)]
pub struct PostgresArgs {
    #[arg(long, env = "POSTGRES_HOST", default_value = "localhost")]
    pub postgres_host: String,

    #[arg(long, env = "POSTGRES_PORT", default_value_t = 5432)]
    pub postgres_port: u16,

    #[arg(long, env = "POSTGRES_DATABASE", default_value = "postgres")]
    pub postgres_database: String,

    #[arg(long, env = "POSTGRES_USERNAME", default_value = "postgres")]
    pub postgres_username: String,

    #[arg(long, env = "POSTGRES_PASSWORD")]
    pub postgres_password: Option<String>,

    #[arg(long, env = "POSTGRES_CA_CERT")]
    pub postgres_ca_cert: Option<String>,

    #[arg(long, env = "POSTGRES_SSL_MODE", default_value = "prefer")]
    pub postgres_ssl_mode: String,
}

/// Credentials and endpoints for the cloud provider backing cluster provisioning.
#[derive(Parser, Debug, Clone)]
pub struct CloudArgs {
    #[arg(long, env = "CLOUD_API_KEY", required = true)]
    pub cloud_api_key: String,

    #[arg(long, env = "CLOUD_ACCOUNT_ID", required = true)]
    pub cloud_account_id: String,

    #[arg(long, env = "CLOUD_TENANT_ID", required = true)]
    pub cloud_tenant_id: String,

    #[arg(long, env = "CLOUD_IDP_NAME", default_value = "devcluster")]
    pub cloud_idp_name: String,

    /// Seconds between polling attempts while waiting on the cloud provider.
    #[arg(long, env = "CLOUD_API_CALL_RETRY_SEC", default_value_t = 30)]
    pub cloud_api_call_retry_sec: u64,

    /// Deadline, in seconds, for a single cluster to become ready.
    #[arg(long, env = "CLOUD_API_CALL_TIMEOUT_SEC", default_value_t = 10_800)]
    pub cloud_api_call_timeout_sec: u64,
}

/// Interval configuration for the background expiry reaper.
#[derive(Parser, Debug, Clone)]
pub struct ReaperArgs {
    #[arg(long, env = "REAPER_INTERVAL_SEC", default_value_t = 300)]
    pub reaper_interval_sec: u64,
}

/// Runtime configuration consumed by the core (spec §6). Bindings from
/// env/flags are an external concern handled by the `devcluster` binary.
#[derive(Debug, Clone)]
pub struct Config {
    pub account_id: String,
    pub idp_name: String,
    /// Seconds between polling attempts while waiting on the cloud provider.
    pub api_call_retry_sec: u64,
    /// Deadline, in seconds, for a single cluster to become ready.
    pub api_call_timeout_sec: u64,
    /// Interval, in seconds, between Expiry Reaper ticks.
    pub reaper_interval_sec: u64,

    /// OAuth client id used when synthesizing `loginUrl`.
    pub oauth_client_id: String,
    /// Dashboard URL echoed back as the `state` parameter of `loginUrl`.
    pub dashboard_url: String,
    /// OAuth callback URL used when synthesizing `loginUrl`.
    pub callback_url: String,
    /// Base URL of the workshop guide, used when synthesizing `workshopUrl`.
    pub scholars_guide_url: String,
}

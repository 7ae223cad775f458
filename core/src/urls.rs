use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};

use crate::config::Config;

/// Contractual presentation URLs attached to a `GetRequestWithClusters`
/// response. Shapes are fixed (spec §6) — consumers rely on them.
#[derive(Debug, Clone, Default)]
pub struct ClusterUrls {
    pub identity_provider_url: String,
    pub login_url: String,
    pub console_url: Option<String>,
    pub workshop_url: Option<String>,
}

fn encode(s: &str) -> String {
    utf8_percent_encode(s, NON_ALPHANUMERIC).to_string()
}

/// Synthesize presentation URLs for a cluster. `hostname`/`user` are `None`
/// when the cluster has no ready hostname or no bound user yet — in that
/// case `console_url`/`workshop_url` stay unset.
pub fn synthesize(
    config: &Config,
    hostname: Option<&str>,
    user: Option<(&str, &str)>,
) -> ClusterUrls {
    let identity_provider_url = format!("https://cloud.ibm.com/authorize/{}", config.idp_name);

    let login_url = format!(
        "https://iam.cloud.ibm.com/identity/devcluster/authorize?client_id={}&response_type=code&state={}&redirect_uri={}",
        config.oauth_client_id,
        encode(&config.dashboard_url),
        encode(&config.callback_url),
    );

    let mut urls = ClusterUrls {
        identity_provider_url,
        login_url: login_url.clone(),
        console_url: None,
        workshop_url: None,
    };

    if let (Some(hostname), Some((user_id, password))) = (hostname, user)
        && !hostname.is_empty() {
            urls.console_url = Some(format!("https://console-openshift-console.{hostname}"));
            urls.workshop_url = Some(format!(
                "{}?CLUSTER_SUBDOMAIN={hostname}&USERNAME={user_id}&PASSWORD={password}&LOGIN={}&PROJECT=workshop",
                config.scholars_guide_url,
                encode(&login_url),
            ));
        }

    urls
}

use clap::{Parser, Subcommand};
use devcluster_common::args::{CloudArgs, PostgresArgs, ReaperArgs};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the provisioning service: resume in-flight work, start the
    /// expiry reaper, serve the (unauthenticated) HTTP surface.
    Serve(ServeArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct UrlArgs {
    /// OAuth client id used when synthesizing `loginUrl`.
    #[arg(long, env = "OAUTH_CLIENT_ID", default_value = "devcluster")]
    pub oauth_client_id: String,

    /// Dashboard URL echoed back as the `state` parameter of `loginUrl`.
    #[arg(
        long,
        env = "DASHBOARD_URL",
        default_value = "https://dashboard.devcluster.example.com"
    )]
    pub dashboard_url: String,

    /// OAuth callback URL used when synthesizing `loginUrl`.
    #[arg(
        long,
        env = "CALLBACK_URL",
        default_value = "https://devcluster.example.com/callback"
    )]
    pub callback_url: String,

    /// Base URL of the workshop guide, used when synthesizing `workshopUrl`.
    #[arg(
        long,
        env = "SCHOLARS_GUIDE_URL",
        default_value = "https://scholars-guide.devcluster.example.com/workshop"
    )]
    pub scholars_guide_url: String,
}

#[derive(Parser, Debug)]
pub struct ServeArgs {
    #[command(flatten)]
    pub postgres: PostgresArgs,

    #[command(flatten)]
    pub cloud: CloudArgs,

    #[command(flatten)]
    pub reaper: ReaperArgs,

    #[command(flatten)]
    pub urls: UrlArgs,

    /// IBM Cloud Kubernetes Service API endpoint.
    #[arg(long, env = "CLOUD_API_ENDPOINT", default_value = "https://containers.cloud.ibm.com")]
    pub cloud_api_endpoint: String,

    /// IBM IAM token endpoint.
    #[arg(long, env = "CLOUD_IAM_ENDPOINT", default_value = "https://iam.cloud.ibm.com")]
    pub cloud_iam_endpoint: String,

    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,
}

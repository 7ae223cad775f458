use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;

use devcluster_core::config::Config;
use devcluster_core::Runtime;
use devcluster_provider::client::{Client, ClientConfig};
use devcluster_store::postgres::PostgresStore;

mod args;
mod handlers;
mod server;

use args::{Cli, Commands, ServeArgs};

#[tokio::main]
async fn main() -> Result<()> {
    devcluster_common::init();

    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => run_serve(args).await,
    }
}

async fn run_serve(args: ServeArgs) -> Result<()> {
    let pool = devcluster_common::postgres::create_pool(args.postgres).await;
    let store = Arc::new(PostgresStore::new(pool));
    store
        .init_schema()
        .await
        .context("failed to initialize database schema")?;

    let provider = Arc::new(Client::new(ClientConfig {
        api_endpoint: args.cloud_api_endpoint,
        iam_endpoint: args.cloud_iam_endpoint,
        api_key: args.cloud.cloud_api_key,
        account_id: args.cloud.cloud_account_id.clone(),
        tenant_id: args.cloud.cloud_tenant_id,
    }));

    let config = Config {
        account_id: args.cloud.cloud_account_id,
        idp_name: args.cloud.cloud_idp_name,
        api_call_retry_sec: args.cloud.cloud_api_call_retry_sec,
        api_call_timeout_sec: args.cloud.cloud_api_call_timeout_sec,
        reaper_interval_sec: args.reaper.reaper_interval_sec,
        oauth_client_id: args.urls.oauth_client_id,
        dashboard_url: args.urls.dashboard_url,
        callback_url: args.urls.callback_url,
        scholars_guide_url: args.urls.scholars_guide_url,
    };
    let account_id = config.account_id.clone();

    let runtime = Arc::new(Runtime::new(store, provider, account_id, config));

    runtime
        .resume()
        .await
        .context("resume procedure failed at startup")?;

    let cancel = CancellationToken::new();
    let reaper = runtime.spawn_reaper(cancel.clone());

    let result = server::run_server(args.port, runtime).await;

    cancel.cancel();
    let _ = reaper.await;

    result
}

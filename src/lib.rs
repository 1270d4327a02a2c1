pub mod config;
pub mod secrets;
pub mod server;

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use client::{RadiusClient, correlator::Strategy};
use codec::{Dictionary, Endpoint};
use config::Config;
use secrets::StaticSecrets;
use service::{
    Router, RouterOptions,
    handlers::{DefaultHandler, ProxyHandler},
};

/// In order to let integration tests start the server from the crate,
/// a function replaces the main function body: build the dictionary
/// and the pipelines from configuration, bind the sockets, then run
/// until interrupted.
pub async fn server_main(config: Arc<Config>) -> anyhow::Result<()> {
    let mut dictionary = Dictionary::default();
    for path in &config.server.dictionaries {
        dictionary
            .load_file(path)
            .with_context(|| format!("loading dictionary {:?}", path))?;
    }

    let dictionary = Arc::new(dictionary);
    let secrets = StaticSecrets::from_table(&config.secrets)?;
    let options = RouterOptions {
        dedup_ttl: Duration::from_millis(config.dedup.ttl_ms),
        dedup_capacity: config.dedup.capacity,
        handler_budget: Duration::from_millis(config.dedup.budget_ms),
    };

    let router = Arc::new(Router::new(
        dictionary.clone(),
        secrets.clone(),
        DefaultHandler::new(config.users.clone()),
        options.clone(),
    ));

    router.spawn_evictor();
    server::run(config.server.auth_listen, config.server.threads, router.clone()).await?;
    server::run(config.server.acct_listen, config.server.threads, router).await?;

    if config.proxy.enabled {
        let upstream = config
            .proxy
            .upstream
            .context("proxy enabled without an upstream address")?;
        let upstream = Endpoint::new(upstream, config.proxy.upstream_secret.clone());

        let upstream_client = Arc::new(
            RadiusClient::builder()
                .with_dictionary(dictionary.clone())
                .with_strategy(Strategy::ProxyState)
                .with_retry(
                    config.proxy.attempts,
                    Duration::from_millis(config.proxy.timeout_ms),
                )
                .build()
                .await?,
        );

        let proxy = Arc::new(Router::new(
            dictionary,
            secrets,
            ProxyHandler::new(upstream_client, move |_: &codec::Packet, _: std::net::SocketAddr| {
                Some(upstream.clone())
            }),
            options,
        ));

        proxy.spawn_evictor();
        server::run(config.proxy.listen, config.server.threads, proxy).await?;
    }

    tokio::signal::ctrl_c().await?;
    log::info!("interrupted, shutting down");
    Ok(())
}

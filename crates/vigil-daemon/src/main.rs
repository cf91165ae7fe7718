//! Wires every concrete filter into a `Pipeline`, starts the control
//! plane, the reader/worker fleet and the feed refresher, then waits for
//! ctrl-c to tear everything back down.

mod config;

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use vigil_core::time::SystemClock;
use vigil_core::CountryList;
use vigil_engine::{FeedRefresher, Pipeline, QueueCoordinator, QueueCoordinatorConfig};
use vigil_filters::{
    AsnFeedFilter, DomainFeedFilter, DomainListFilter, GeoFilter, IpListFilter, Ja3FeedFilter,
    RateLimiterFilter, SubnetFeedFilter,
};
use vigil_logger::Logger;

const FIREHOL_LEVEL1: &str = "https://iplists.firehol.org/files/firehol_level1.netset";
const SPAMHAUS_DROP: &str = "https://www.spamhaus.org/drop/drop.txt";
const IPLOCATE_ZIP: &str = "https://iplocate.io/downloads/asn-country-ipv4.zip";
const STEVENBLACK_HOSTS: &str = "https://raw.githubusercontent.com/StevenBlack/hosts/master/hosts";
const SOMEONEWHOCARES_HOSTS: &str = "https://someonewhocares.org/hosts/zero/hosts";
const SSLBL_JA3: &str = "https://sslbl.abuse.ch/blacklist/ja3_fingerprints.csv";

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("debug"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn install_metrics_recorder() {
    if let Err(err) = metrics_exporter_prometheus::PrometheusBuilder::new().install() {
        tracing::error!(%err, "failed to install prometheus metrics recorder");
    }
}

fn build_pipeline(args: &config::Args) -> Arc<Pipeline> {
    let country_deny = Arc::new(CountryList::new());
    let geo = Arc::new(GeoFilter::new("geo-country-deny", IPLOCATE_ZIP, Arc::clone(&country_deny)));

    Arc::new(Pipeline {
        ip_allow: Arc::new(IpListFilter::allow_list("subnet-allow")),
        rate_limiter: Arc::new(RateLimiterFilter::new(
            "rate-limiter",
            args.rate_limiter_rate,
            args.rate_limiter_burst,
            args.rate_limiter_cache_size,
            args.rate_limiter_cache_ttl(),
        )),
        ip_deny: Arc::new(IpListFilter::deny_list("subnet-deny")),
        subnet_feeds: vec![
            Arc::new(SubnetFeedFilter::new("firehol-level1", vec![FIREHOL_LEVEL1.to_string()])),
            Arc::new(SubnetFeedFilter::new("spamhaus-drop", vec![SPAMHAUS_DROP.to_string()])),
        ],
        asn_feeds: vec![Arc::new(AsnFeedFilter::new("spamhaus-asndrop", SPAMHAUS_DROP, geo.asn_table()))],
        geo,
        domain_allow: Arc::new(DomainListFilter::allow_list("domain-allow")),
        domain_deny: Arc::new(DomainListFilter::deny_list("domain-deny")),
        domain_feeds: vec![
            Arc::new(DomainFeedFilter::new("stevenblack-hosts", vec![STEVENBLACK_HOSTS.to_string()])),
            Arc::new(DomainFeedFilter::new("someonewhocares-hosts", vec![SOMEONEWHOCARES_HOSTS.to_string()])),
        ],
        ja3: Arc::new(Ja3FeedFilter::new("sslbl-ja3", SSLBL_JA3)),
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = config::Args::parse();
    init_tracing(&args.log_level);
    install_metrics_recorder();

    let credentials = vigil_control::Credentials::from_env()?;
    let store = vigil_control::Store::connect(&args.db_path).await?;

    let pipeline = build_pipeline(&args);

    let list_handles = vigil_control::ListHandles {
        subnet_allow: Arc::clone(&pipeline.ip_allow),
        subnet_deny: Arc::clone(&pipeline.ip_deny),
        domain_allow: Arc::clone(&pipeline.domain_allow),
        domain_deny: Arc::clone(&pipeline.domain_deny),
        country_deny: pipeline.geo.country_deny(),
    };
    let control_state = vigil_control::AppState { lists: list_handles, store, credentials };
    vigil_control::hydrate(&control_state).await?;

    let control_addr = args.api_addr.clone();
    let control_task = tokio::spawn(async move {
        if let Err(err) = vigil_control::serve(&control_addr, control_state).await {
            tracing::error!(%err, "control plane exited");
        }
    });

    let (logger, logger_handles) = Logger::spawn(args.logger_queue_len, args.loggers_count);
    let http = reqwest::Client::new();

    let coordinator_config = QueueCoordinatorConfig {
        readers: args.readers_count(),
        workers_per_reader: args.workers_count,
        reader_queue_len: args.reader_queue_len,
        max_packet_len: args.max_packet_len,
        load_timeout: args.update_timeout(),
    };
    let coordinator =
        QueueCoordinator::start(Arc::clone(&pipeline), logger.clone(), http.clone(), coordinator_config).await?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let refresher = FeedRefresher::new(
        Arc::clone(&pipeline),
        http,
        args.update_interval(),
        args.update_timeout(),
        Arc::new(SystemClock),
        logger.clone(),
    );
    let refresher_task = tokio::spawn(refresher.run(shutdown_rx));

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received, tearing down");

    let _ = shutdown_tx.send(());
    coordinator.shutdown().await;
    control_task.abort();
    let _ = refresher_task.await;
    drop(logger);
    for handle in logger_handles {
        let _ = handle.await;
    }

    Ok(())
}

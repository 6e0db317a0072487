use clap::Parser;
use kmon::pool::BlockingPool;
use kmon::sink::SinkFanOut;
use kmon::{ClusterCollector, KmonConfig, Scraper};
use kmon_metrics::{MetricsServer, MetricsStore};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "kmon-server",
    about = "Scrape broker metrics and serve them for Prometheus",
    long_about = "Scrape broker metrics and serve them for Prometheus.\n\n\
                  The Kafka topic sink ([sinks.topic]) needs a build with the `kafka` \
                  feature; other builds reject a config that sets it.",
    version
)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "kmon.toml")]
    config: PathBuf,

    /// Override the listen address from the config file
    #[arg(long)]
    listen: Option<SocketAddr>,

    /// Validate the config file and the sinks it names, then exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = KmonConfig::load(&cli.config)?;

    let pool = BlockingPool::new(config.blocking_pool_size);
    let sinks = Arc::new(SinkFanOut::from_config(&config.sinks, pool.clone())?);
    if cli.check {
        info!(
            path = %cli.config.display(),
            clusters = config.clusters.len(),
            sinks = ?sinks.names(),
            "config is valid"
        );
        return Ok(());
    }

    let store = MetricsStore::new();
    info!(sinks = ?sinks.names(), "sinks configured");

    let mut collectors = Vec::new();
    for cluster in &config.clusters {
        let scraper = Scraper::for_config(&cluster.name, &cluster.scrape, pool.clone())?;
        let collector = Arc::new(ClusterCollector::new(scraper, store.clone(), sinks.clone()));
        collectors.push(collector.clone());

        let description = cluster.description();
        let period = config.scrape_interval();
        info!(
            cluster = %cluster.name,
            brokers = description.nodes.len(),
            method = cluster.scrape.kind.as_str(),
            "starting collector"
        );

        // Cycles of one cluster never overlap: the next tick waits for this one.
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                collector.run_cycle(&description).await;
            }
        });
    }

    if collectors.is_empty() {
        warn!("no clusters configured, serving an empty snapshot");
    }

    let addr = cli.listen.unwrap_or(config.listen_addr);
    let server = MetricsServer::new(addr, store);

    tokio::select! {
        result = server.start() => result?,
        _ = signal::ctrl_c() => info!("Shutting down"),
    }

    for collector in &collectors {
        collector.shutdown();
    }
    pool.close();
    Ok(())
}

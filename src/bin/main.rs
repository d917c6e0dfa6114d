//! mesos-dns binary entry point.

use clap::Parser;
use mesos_dns::{telemetry, Config, DnsServer};
use std::net::IpAddr;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// DNS-based service discovery for Mesos.
#[derive(Parser, Debug)]
#[command(name = "mesos-dns")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (JSON or TOML).
    #[arg(short = 'j', long)]
    config: Option<PathBuf>,

    /// Comma separated list of Mesos masters (host:port).
    #[arg(short, long, value_delimiter = ',')]
    masters: Vec<String>,

    /// Frequency in seconds at which records are regenerated.
    #[arg(short = 's', long)]
    refresh_seconds: Option<u32>,

    /// TTL for served A and SRV records.
    #[arg(short, long)]
    ttl: Option<u32>,

    /// Cluster domain name.
    #[arg(short, long)]
    domain: Option<String>,

    /// Port to listen on for DNS requests.
    #[arg(short, long)]
    port: Option<u16>,

    /// Comma separated list of upstream resolver IPs for out-of-domain
    /// queries.
    #[arg(short, long, value_delimiter = ',')]
    resolvers: Vec<String>,

    /// Deadline in seconds for outbound DNS exchanges.
    #[arg(short = 'T', long)]
    timeout: Option<u32>,

    /// Address to bind to, also reported in SOA answers.
    #[arg(short, long)]
    listener: Option<IpAddr>,

    /// Administrator email used as the SOA rname.
    #[arg(short, long)]
    email: Option<String>,

    /// Increase log verbosity (-v: debug, -vv: trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Defaults, then file, then environment, then flags.
    let mut builder = config::Config::builder();
    if let Some(path) = &args.config {
        builder = builder.add_source(config::File::from(path.clone()));
    }
    let mut cfg: Config = builder
        .add_source(
            config::Environment::with_prefix("MESOS_DNS")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()?;

    if !args.masters.is_empty() {
        cfg.masters = args.masters.clone();
    }
    if !args.resolvers.is_empty() {
        cfg.resolvers = args.resolvers.clone();
    }
    if let Some(refresh_seconds) = args.refresh_seconds {
        cfg.refresh_seconds = refresh_seconds;
    }
    if let Some(ttl) = args.ttl {
        cfg.ttl = ttl;
    }
    if let Some(domain) = args.domain.clone() {
        cfg.domain = domain;
    }
    if let Some(port) = args.port {
        cfg.port = port;
    }
    if let Some(timeout) = args.timeout {
        cfg.timeout = timeout;
    }
    if let Some(listener) = args.listener {
        cfg.listener = listener;
    }
    if let Some(email) = args.email.clone() {
        cfg.email = email;
    }
    if args.verbose > 0 {
        cfg.telemetry.log_level = if args.verbose > 1 { "trace" } else { "debug" }.to_string();
    }

    if let Err(e) = cfg.check() {
        eprintln!("mesos-dns: {}", e);
        std::process::exit(1);
    }

    telemetry::init(&cfg.telemetry).map_err(|e| e as Box<dyn std::error::Error>)?;

    info!(
        masters = %cfg.masters.join(","),
        domain = %cfg.domain,
        port = cfg.port,
        refresh_seconds = cfg.refresh_seconds,
        ttl = cfg.ttl,
        timeout = cfg.timeout,
        listener = %cfg.listener,
        resolvers = %cfg.resolvers.join(","),
        email = %cfg.email,
        mname = %cfg.mname,
        "starting mesos-dns"
    );

    // Setup graceful shutdown
    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            signal.cancel();
        }
    });

    match DnsServer::start(cfg, shutdown).await {
        Ok(server) => {
            server.wait().await;
            info!("mesos-dns shutdown complete");
            Ok(())
        }
        Err(e) => {
            error!("failed to start DNS server: {}", e);
            Err(e.into())
        }
    }
}

//! DNS server setup, refresh loop, and lifecycle management.

use hickory_server::ServerFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, UdpSocket};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::counters::Counters;
use crate::error::DnsError;
use crate::fetch::StateFetcher;
use crate::forward::Forwarder;
use crate::handler::DnsHandler;
use crate::metrics::{self, RefreshOutcome, Timer};
use crate::records::RecordSet;
use crate::store::RecordStore;

/// Idle timeout for TCP connections.
const TCP_TIMEOUT: Duration = Duration::from_secs(30);

/// Handle to a running DNS server.
pub struct ServerHandle {
    udp_local_address: SocketAddr,
    tcp_local_address: SocketAddr,
    server: JoinHandle<()>,
    refresh: JoinHandle<()>,
}

impl ServerHandle {
    /// Local address of the bound UDP socket.
    pub fn udp_local_address(&self) -> SocketAddr {
        self.udp_local_address
    }

    /// Local address of the bound TCP listener.
    pub fn tcp_local_address(&self) -> SocketAddr {
        self.tcp_local_address
    }

    /// Wait until the server and refresh loop have stopped.
    pub async fn wait(self) {
        let _ = self.refresh.await;
        let _ = self.server.await;
    }
}

/// DNS server for a Mesos cluster domain.
pub struct DnsServer;

impl DnsServer {
    /// Start the server: one synchronous refresh, then the listeners and
    /// the periodic refresh loop. The configuration must have been checked
    /// with [`Config::check`].
    ///
    /// Cancelling `shutdown` stops the refresh loop and both listeners.
    pub async fn start(
        config: Config,
        shutdown: CancellationToken,
    ) -> Result<ServerHandle, DnsError> {
        let store = RecordStore::new(RecordSet::bootstrap(&config));
        let counters = Arc::new(Counters::default());
        let fetcher = StateFetcher::new(
            config.masters.clone(),
            Duration::from_secs(config.timeout as u64),
        )?;

        // Boot refresh happens before the listeners open so the first
        // queries already see task records. A failure here is not fatal:
        // the bootstrap set is served until the next tick succeeds.
        let mut refresh = RefreshLoop {
            fetcher,
            store: store.clone(),
            counters: counters.clone(),
            config: config.clone(),
            generation: 0,
        };
        refresh.refresh_once().await;

        let forwarder = Arc::new(Forwarder::new(
            &config.resolvers,
            Duration::from_secs(config.timeout as u64),
        ));
        if !forwarder.has_upstreams() {
            warn!("no usable upstream resolvers, out-of-domain queries will fail");
        }

        let handler = DnsHandler::new(&config.domain, store, counters, forwarder);
        let mut server = ServerFuture::new(handler);

        let bind_address = config.bind_address();
        let udp_socket = UdpSocket::bind(bind_address).await?;
        let udp_local_address = udp_socket.local_addr()?;
        info!(addr = %udp_local_address, "DNS UDP listening");
        server.register_socket(udp_socket);

        let tcp_listener = TcpListener::bind(bind_address).await?;
        let tcp_local_address = tcp_listener.local_addr()?;
        info!(addr = %tcp_local_address, "DNS TCP listening");
        server.register_listener(tcp_listener, TCP_TIMEOUT);

        info!(
            domain = %config.domain,
            refresh_seconds = config.refresh_seconds,
            "DNS server ready to serve queries"
        );

        let refresh_shutdown = shutdown.clone();
        let refresh_handle = tokio::spawn(async move {
            refresh.run(refresh_shutdown).await;
        });

        let server_handle = tokio::spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("DNS server shutdown requested");
                }
                result = server.block_until_done() => {
                    if let Err(e) = result {
                        error!("DNS server error: {}", e);
                    }
                }
            }
        });

        Ok(ServerHandle {
            udp_local_address,
            tcp_local_address,
            server: server_handle,
            refresh: refresh_handle,
        })
    }
}

/// Periodic record regeneration, fully outside the request path.
struct RefreshLoop {
    fetcher: StateFetcher,
    store: RecordStore,
    counters: Arc<Counters>,
    config: Config,
    generation: u32,
}

impl RefreshLoop {
    /// Tick until the token is cancelled.
    async fn run(&mut self, shutdown: CancellationToken) {
        let mut interval =
            tokio::time::interval(Duration::from_secs(self.config.refresh_seconds.max(1) as u64));
        // The first tick completes immediately; the boot refresh already
        // covered it.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.refresh_once().await;
                }
                _ = shutdown.cancelled() => {
                    info!("refresh loop shutting down");
                    return;
                }
            }
        }
    }

    /// Fetch, generate, publish. On error the previous record set stays
    /// published and the counters keep accumulating so the failure remains
    /// visible.
    async fn refresh_once(&mut self) {
        let timer = Timer::start();
        match self.fetcher.fetch().await {
            Ok((state, leader_ip)) => {
                self.generation = self.generation.wrapping_add(1);
                let rs = RecordSet::generate(&state, &leader_ip, &self.config, self.generation);

                metrics::record_set_counts(rs.a_records.len(), rs.srv_records.len());
                metrics::record_serial(rs.serial);
                let (a_names, srv_names) = (rs.a_records.len(), rs.srv_records.len());
                self.store.publish(rs);

                let counters = self.counters.snapshot_and_reset();
                info!(
                    leader = %leader_ip,
                    generation = self.generation,
                    a_names,
                    srv_names,
                    in_domain_requests = counters.in_domain_requests,
                    in_domain_success = counters.in_domain_success,
                    in_domain_nxdomain = counters.in_domain_nxdomain,
                    in_domain_failed = counters.in_domain_failed,
                    forwarded_requests = counters.forwarded_requests,
                    forwarded_success = counters.forwarded_success,
                    forwarded_nxdomain = counters.forwarded_nxdomain,
                    forwarded_failed = counters.forwarded_failed,
                    recursed = counters.recursed,
                    "records refreshed"
                );
                metrics::record_refresh(RefreshOutcome::Success, timer.elapsed());
            }
            Err(e) => {
                warn!(error = %e, "state refresh failed, keeping previous records");
                metrics::record_refresh(RefreshOutcome::Failed, timer.elapsed());
            }
        }
    }
}

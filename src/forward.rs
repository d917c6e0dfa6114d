//! Forwarding to upstream recursive resolvers.
//!
//! Queries for names outside the cluster domain are re-issued verbatim
//! (same name, type and class) against the configured upstreams over the
//! same transport the client used, with a single deadline covering each
//! exchange. The upstream's response is relayed back unchanged apart from
//! the transaction id.

use hickory_proto::op::{Message, MessageType, OpCode, Query};
use hickory_proto::xfer::Protocol;
use rand::Rng;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::DnsError;

/// Forwards out-of-domain queries to upstream resolvers.
pub struct Forwarder {
    upstreams: Vec<SocketAddr>,
    timeout: Duration,
}

impl Forwarder {
    /// Create a forwarder from resolver addresses (`ip` or `ip:port`).
    ///
    /// Upstreams that are local addresses are dropped so a resolv.conf
    /// pointing back at this host cannot create a forwarding loop.
    pub fn new(resolvers: &[String], timeout: Duration) -> Self {
        let local: Vec<String> = local_addresses().iter().map(ToString::to_string).collect();

        let upstreams = resolvers
            .iter()
            .filter(|r| {
                if local.iter().any(|l| l == *r) {
                    warn!(resolver = %r, "skipping local resolver to avoid a loop");
                    false
                } else {
                    true
                }
            })
            .filter_map(|r| {
                let with_port = if r.contains(':') {
                    r.clone()
                } else {
                    format!("{}:53", r)
                };
                match with_port.parse::<SocketAddr>() {
                    Ok(addr) => Some(addr),
                    Err(_) => {
                        warn!(resolver = %r, "unparseable resolver address");
                        None
                    }
                }
            })
            .collect();

        Self { upstreams, timeout }
    }

    /// Whether any usable upstream is configured.
    pub fn has_upstreams(&self) -> bool {
        !self.upstreams.is_empty()
    }

    /// Forward a question and return the upstream response.
    ///
    /// Upstreams are tried starting from a random index; each attempt is
    /// bounded by the configured deadline. Fails with
    /// [`DnsError::UpstreamsFailed`] once every upstream has been tried.
    pub async fn forward(&self, query: &Query, protocol: Protocol) -> Result<Message, DnsError> {
        if self.upstreams.is_empty() {
            return Err(DnsError::UpstreamsFailed);
        }

        let mut request = Message::new();
        request.set_id(rand::thread_rng().gen());
        request.set_message_type(MessageType::Query);
        request.set_op_code(OpCode::Query);
        request.set_recursion_desired(true);
        request.add_query(query.clone());
        let bytes = request.to_vec()?;

        let start = rand::thread_rng().gen_range(0..self.upstreams.len());
        for i in 0..self.upstreams.len() {
            let upstream = self.upstreams[(start + i) % self.upstreams.len()];

            let exchange = async {
                match protocol {
                    Protocol::Tcp => exchange_tcp(upstream, &bytes).await,
                    _ => exchange_udp(upstream, &bytes).await,
                }
            };

            match timeout(self.timeout, exchange).await {
                Ok(Ok(response)) if response.id() == request.id() => {
                    debug!(%upstream, name = %query.name(), "forwarded query answered");
                    return Ok(response);
                }
                Ok(Ok(response)) => {
                    warn!(%upstream, got = response.id(), want = request.id(), "upstream response id mismatch");
                }
                Ok(Err(e)) => {
                    warn!(%upstream, error = %e, "upstream exchange failed");
                }
                Err(_) => {
                    warn!(%upstream, "upstream exchange timed out");
                }
            }
        }

        Err(DnsError::UpstreamsFailed)
    }
}

async fn exchange_udp(upstream: SocketAddr, bytes: &[u8]) -> io::Result<Message> {
    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    socket.connect(upstream).await?;
    socket.send(bytes).await?;

    let mut buf = [0u8; 4096];
    let len = socket.recv(&mut buf).await?;
    Message::from_vec(&buf[..len]).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

async fn exchange_tcp(upstream: SocketAddr, bytes: &[u8]) -> io::Result<Message> {
    let mut stream = TcpStream::connect(upstream).await?;
    stream.write_all(&(bytes.len() as u16).to_be_bytes()).await?;
    stream.write_all(bytes).await?;

    let mut len_buf = [0u8; 2];
    stream.read_exact(&mut len_buf).await?;
    let len = u16::from_be_bytes(len_buf) as usize;

    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf).await?;
    Message::from_vec(&buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Upstream resolvers from the system configuration: the first non-local
/// IPv4 nameserver in `/etc/resolv.conf`.
pub fn system_resolvers() -> Vec<String> {
    let (resolver_config, _opts) = match hickory_resolver::system_conf::read_system_conf() {
        Ok(conf) => conf,
        Err(e) => {
            warn!(error = %e, "could not read system resolver configuration");
            return Vec::new();
        }
    };

    let local: Vec<Ipv4Addr> = local_addresses();
    resolver_config
        .name_servers()
        .iter()
        .filter_map(|ns| match ns.socket_addr.ip() {
            IpAddr::V4(ip) if !local.contains(&ip) => Some(ip.to_string()),
            _ => None,
        })
        .next()
        .map(|ip| vec![ip])
        .unwrap_or_default()
}

/// IPv4 addresses that count as "this host" for loop avoidance: loopback
/// plus the primary outbound address, discovered with a connected UDP
/// socket (no packets are sent).
fn local_addresses() -> Vec<Ipv4Addr> {
    let mut addresses = vec![Ipv4Addr::LOCALHOST];

    if let Ok(socket) = std::net::UdpSocket::bind("0.0.0.0:0") {
        if socket.connect("198.51.100.1:53").is_ok() {
            if let Ok(SocketAddr::V4(local)) = socket.local_addr() {
                if !addresses.contains(local.ip()) {
                    addresses.push(*local.ip());
                }
            }
        }
    }

    addresses
}

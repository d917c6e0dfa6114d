//! Error types for mesos-dns.

use thiserror::Error;

/// Errors that can occur in the DNS server.
#[derive(Debug, Error)]
pub enum DnsError {
    /// IO error (network, file, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error talking to a Mesos master
    #[error("master HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// DNS protocol error
    #[error("DNS protocol error: {0}")]
    Proto(#[from] hickory_proto::ProtoError),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    Config(String),

    /// No master responded, or the leader could not be determined
    #[error("no cluster leader could be determined")]
    NoLeader,

    /// Failed to parse an address
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Every configured upstream resolver failed or timed out
    #[error("all upstream resolvers failed")]
    UpstreamsFailed,
}

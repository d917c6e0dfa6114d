//! Mesos DNS - DNS-based service discovery for Mesos clusters.
//!
//! This crate provides a DNS server that serves records for tasks running in
//! a Mesos cluster. It periodically polls the elected Mesos master for the
//! cluster state, flattens that state into A and SRV records for the
//! configured cluster domain, and answers queries authoritatively from an
//! in-memory record set. Queries for names outside the cluster domain are
//! forwarded to upstream recursive resolvers.
//!
//! ## Features
//!
//! - A/SRV records for running tasks, named `<task>.<framework>.<domain>`
//! - Leader-aware state fetching across multiple master candidates
//! - Lock-free record-set swap: refresh never blocks query handlers
//! - Transparent forwarding for out-of-domain names with upstream failover
//! - Graceful shutdown support
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                          mesos-dns                             │
//! │                                                                │
//! │  ┌──────────────────┐    ┌──────────────────┐                  │
//! │  │  State Fetcher   │───▶│  Record Set      │                  │
//! │  │ (master polling) │    │  (atomic swap)   │                  │
//! │  └──────────────────┘    └────────┬─────────┘                  │
//! │         │                         │                            │
//! │         │ GET /master/state.json  ▼                            │
//! │         │                    ┌──────────────────┐              │
//! │         │                    │  Hickory DNS     │◀── UDP/TCP   │
//! │         │                    │  Server          │    :53       │
//! │         └───────────────────▶└────────┬─────────┘              │
//! │                                       │ out-of-domain          │
//! │                                       ▼                        │
//! │                              upstream resolvers                │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## DNS Resolution
//!
//! ```text
//! chronos.marathon.mesos
//!   → look up task "chronos" in framework "marathon"
//!   → return A records with the slave IPs of its running instances
//!
//! _chronos._tcp.marathon.mesos
//!   → return SRV records with the task's exposed ports
//! ```
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use mesos_dns::{Config, DnsServer};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut config = Config::default();
//!     config.masters = vec!["10.0.0.1:5050".to_string()];
//!     config.check().unwrap();
//!
//!     let shutdown = CancellationToken::new();
//!     let server = DnsServer::start(config, shutdown.clone()).await.unwrap();
//!     server.wait().await;
//! }
//! ```

#![warn(missing_docs)]

pub mod authority;
pub mod config;
pub mod counters;
pub mod error;
pub mod fetch;
pub mod forward;
pub mod handler;
pub mod metrics;
pub mod records;
pub mod server;
pub mod state;
pub mod store;
pub mod telemetry;

// Re-export main types
pub use config::{Config, TelemetryConfig};
pub use counters::Counters;
pub use error::DnsError;
pub use handler::DnsHandler;
pub use records::RecordSet;
pub use server::{DnsServer, ServerHandle};
pub use state::State;
pub use store::RecordStore;

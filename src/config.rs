//! Configuration types for mesos-dns.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::error::DnsError;
use crate::forward;

/// Top-level configuration.
///
/// Every field has a default so a config file only needs to name the values
/// it overrides. [`Config::check`] must be called before use: it validates
/// the required fields and normalizes the derived ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Mesos master candidates as `host:port` pairs. Required, non-empty.
    #[serde(default)]
    pub masters: Vec<String>,

    /// Frequency in seconds of record regeneration.
    #[serde(default = "default_refresh_seconds")]
    pub refresh_seconds: u32,

    /// TTL for served A and SRV records, in seconds.
    #[serde(default = "default_ttl")]
    pub ttl: u32,

    /// Port the UDP and TCP listeners bind to.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Cluster domain the server is authoritative for (e.g. "mesos").
    #[serde(default = "default_domain")]
    pub domain: String,

    /// Upstream resolver IPs for out-of-domain queries. When empty, the
    /// first non-local nameserver from `/etc/resolv.conf` is used.
    #[serde(default)]
    pub resolvers: Vec<String>,

    /// Deadline in seconds for a single outbound DNS exchange.
    #[serde(default = "default_timeout")]
    pub timeout: u32,

    /// Address the listeners bind to, also reported in SOA answers.
    #[serde(default = "default_listener")]
    pub listener: IpAddr,

    /// Administrator contact used as the SOA rname. Any `@` is rewritten to
    /// `.` and a trailing dot is appended if missing.
    #[serde(default = "default_email")]
    pub email: String,

    /// SOA mname, derived from the domain by [`Config::check`].
    #[serde(skip)]
    pub mname: String,

    /// Telemetry configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            masters: Vec::new(),
            refresh_seconds: default_refresh_seconds(),
            ttl: default_ttl(),
            port: default_port(),
            domain: default_domain(),
            resolvers: Vec::new(),
            timeout: default_timeout(),
            listener: default_listener(),
            email: default_email(),
            mname: String::new(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl Config {
    /// Validate and normalize the configuration.
    ///
    /// Fails when no masters are configured. Lowercases the domain, rewrites
    /// the email into rname form, derives the SOA mname, and fills in the
    /// upstream resolvers from the system configuration when none were given.
    pub fn check(&mut self) -> Result<(), DnsError> {
        if self.masters.is_empty() {
            return Err(DnsError::Config(
                "no masters specified in config file, environment, or args".to_string(),
            ));
        }

        self.domain = self.domain.to_lowercase();
        self.mname = format!("mesos-dns.{}.", self.domain);

        self.email = self.email.replace('@', ".");
        if !self.email.ends_with('.') {
            self.email.push('.');
        }

        if self.resolvers.is_empty() {
            self.resolvers = forward::system_resolvers();
        }

        Ok(())
    }

    /// Socket address the listeners bind to.
    pub fn bind_address(&self) -> SocketAddr {
        SocketAddr::new(self.listener, self.port)
    }
}

/// Telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level filter (e.g. "info", "debug", "mesos_dns=debug,warn").
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Prometheus metrics exporter address.
    #[serde(default)]
    pub prometheus_addr: Option<SocketAddr>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            prometheus_addr: None,
        }
    }
}

fn default_refresh_seconds() -> u32 {
    60
}

fn default_ttl() -> u32 {
    60
}

fn default_port() -> u16 {
    53
}

fn default_domain() -> String {
    "mesos".to_string()
}

fn default_timeout() -> u32 {
    5
}

fn default_listener() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_email() -> String {
    "root.mesos-dns.mesos".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

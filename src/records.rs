//! Record generation from cluster state.
//!
//! A [`RecordSet`] is the flattened, case-folded view of one state snapshot:
//! - `<task>.<framework>.<domain>.` A records pointing at slave IPs
//! - `_<task>._tcp.<framework>.<domain>.` (and `._udp.`) SRV records whose
//!   targets are the corresponding A names
//! - synthetic `master.`, `leader.` and `mesos-dns.` names
//!
//! Record sets are immutable once generated; a refresh produces a fresh
//! instance that is swapped in whole.

use std::collections::HashMap;
use tracing::{debug, warn};

use crate::config::Config;
use crate::state::State;

/// The generated authoritative data for one refresh generation.
#[derive(Debug, Clone, Default)]
pub struct RecordSet {
    /// A records: lowercased fqdn to IPv4 strings. Duplicate values are
    /// legal (several instances of a task on one host).
    pub a_records: HashMap<String, Vec<String>>,

    /// SRV records: lowercased fqdn to `host:port` strings, where `host` is
    /// an A name in the same set.
    pub srv_records: HashMap<String, Vec<String>>,

    /// IPs of every configured master.
    pub masters: Vec<String>,

    /// IP of the elected leader, empty before the first successful refresh.
    pub leader: String,

    /// Cluster domain, lowercase, without trailing dot.
    pub domain: String,

    /// SOA mname (`mesos-dns.<domain>.`).
    pub mname: String,

    /// SOA rname.
    pub email: String,

    /// TTL for served records.
    pub ttl: u32,

    /// Refresh period, reported in SOA answers.
    pub refresh_seconds: u32,

    /// Monotonic generation counter, used as the SOA serial.
    pub serial: u32,
}

impl RecordSet {
    /// Build the bootstrap record set used before the first successful
    /// refresh: synthetic names only, no task records, serial 0.
    pub fn bootstrap(config: &Config) -> Self {
        let mut rs = Self::empty(config, 0);
        rs.insert_synthetic(config, None);
        rs
    }

    /// Generate a record set from a state snapshot.
    pub fn generate(state: &State, leader_ip: &str, config: &Config, serial: u32) -> Self {
        let mut rs = Self::empty(config, serial);
        let slaves = state.slave_index();

        for framework in &state.frameworks {
            let fname = sanitize(&framework.name);

            for task in framework.tasks.iter().filter(|t| t.is_running()) {
                let Some(hostname) = slaves.get(task.slave_id.as_str()) else {
                    warn!(task = %task.id, slave_id = %task.slave_id, "task references unknown slave");
                    continue;
                };
                if hostname.parse::<std::net::Ipv4Addr>().is_err() {
                    warn!(task = %task.id, hostname = %hostname, "slave hostname is not an IPv4 address, skipping");
                    continue;
                }

                let tname = sanitize(&task.name);
                let a_name = format!("{}.{}.{}.", tname, fname, rs.domain);
                rs.insert_a(a_name.clone(), hostname.to_string());

                for port in parse_ports(&task.resources.ports) {
                    let target = format!("{}:{}", a_name, port);
                    rs.insert_srv(
                        format!("_{}._tcp.{}.{}.", tname, fname, rs.domain),
                        target.clone(),
                    );
                    rs.insert_srv(format!("_{}._udp.{}.{}.", tname, fname, rs.domain), target);
                }
            }
        }

        rs.insert_synthetic(config, Some(leader_ip));

        debug!(
            a_names = rs.a_records.len(),
            srv_names = rs.srv_records.len(),
            serial = rs.serial,
            "generated record set"
        );
        rs
    }

    fn empty(config: &Config, serial: u32) -> Self {
        Self {
            domain: config.domain.clone(),
            mname: config.mname.clone(),
            email: config.email.clone(),
            ttl: config.ttl,
            refresh_seconds: config.refresh_seconds,
            serial,
            ..Self::default()
        }
    }

    /// Insert the `master.`, `leader.` and `mesos-dns.` names.
    fn insert_synthetic(&mut self, config: &Config, leader_ip: Option<&str>) {
        for master in &config.masters {
            let ip = master.split(':').next().unwrap_or(master.as_str());
            self.masters.push(ip.to_string());
            self.insert_a(format!("master.{}.", self.domain), ip.to_string());
        }

        if let Some(leader_ip) = leader_ip {
            self.leader = leader_ip.to_string();
            self.insert_a(format!("leader.{}.", self.domain), leader_ip.to_string());
        }

        self.insert_a(
            format!("mesos-dns.{}.", self.domain),
            config.listener.to_string(),
        );
    }

    fn insert_a(&mut self, name: String, ip: String) {
        self.a_records.entry(name).or_default().push(ip);
    }

    fn insert_srv(&mut self, name: String, target: String) {
        self.srv_records.entry(name).or_default().push(target);
    }

    /// A record values for a lowercased fqdn.
    pub fn lookup_a(&self, name: &str) -> Option<&[String]> {
        self.a_records.get(name).map(Vec::as_slice)
    }

    /// SRV record values for a lowercased fqdn.
    pub fn lookup_srv(&self, name: &str) -> Option<&[String]> {
        self.srv_records.get(name).map(Vec::as_slice)
    }

    /// Whether the name exists in the set under any record type.
    pub fn has_name(&self, name: &str) -> bool {
        self.a_records.contains_key(name) || self.srv_records.contains_key(name)
    }
}

/// Flatten a framework or task name into a DNS label: lowercase, whitespace
/// and `/` become `-`, anything outside `[a-z0-9._-]` is stripped.
pub fn sanitize(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_whitespace() || c == '/' { '-' } else { c })
        .filter(|c| matches!(c, 'a'..='z' | '0'..='9' | '.' | '_' | '-'))
        .collect()
}

/// Parse a Mesos port resource string like `"[31000-31000, 31100-31110]"`
/// into the individual ports. Malformed chunks are skipped.
pub fn parse_ports(ports: &str) -> Vec<u16> {
    let trimmed = ports
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']');

    let mut out = Vec::new();
    for chunk in trimmed.split(',') {
        let chunk = chunk.trim();
        if chunk.is_empty() {
            continue;
        }
        let (lo, hi) = match chunk.split_once('-') {
            Some((lo, hi)) => (lo.trim(), hi.trim()),
            None => (chunk, chunk),
        };
        match (lo.parse::<u16>(), hi.parse::<u16>()) {
            (Ok(lo), Ok(hi)) if lo <= hi => out.extend(lo..=hi),
            _ => warn!(range = %chunk, "unparseable port range"),
        }
    }
    out
}

//! Master polling and leader discovery.
//!
//! The fetcher walks the configured master candidates in order and asks each
//! for the cluster state. The first snapshot names the elected leader; if
//! that leader is not the endpoint just contacted, the state is re-fetched
//! from the leader so records are always generated from the authoritative
//! view.

use std::time::Duration;
use tracing::{debug, warn};

use crate::error::DnsError;
use crate::state::State;

/// Fetches cluster state from the elected Mesos master.
pub struct StateFetcher {
    client: reqwest::Client,
    masters: Vec<String>,
}

impl StateFetcher {
    /// Create a fetcher for the given master candidates.
    ///
    /// The timeout applies per endpoint, so the worst-case budget of one
    /// [`StateFetcher::fetch`] call is `timeout * masters.len()` plus one
    /// leader re-fetch.
    pub fn new(masters: Vec<String>, timeout: Duration) -> Result<Self, DnsError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, masters })
    }

    /// Fetch the current state snapshot, returning it together with the
    /// leader's IP.
    ///
    /// Fails with [`DnsError::NoLeader`] when no candidate responds or the
    /// leader field cannot be parsed. There are no retries beyond the single
    /// pass over the candidate list.
    pub async fn fetch(&self) -> Result<(State, String), DnsError> {
        for master in &self.masters {
            let state = match self.fetch_endpoint(master).await {
                Ok(state) => state,
                Err(e) => {
                    warn!(master = %master, error = %e, "master fetch failed");
                    continue;
                }
            };

            let Some((leader_ip, leader_port)) = parse_leader(&state.leader) else {
                warn!(master = %master, leader = %state.leader, "unparseable leader");
                continue;
            };

            let leader_endpoint = format!("{}:{}", leader_ip, leader_port);
            if &leader_endpoint == master {
                return Ok((state, leader_ip));
            }

            debug!(
                contacted = %master,
                leader = %leader_endpoint,
                "contacted master is not the leader, re-fetching"
            );
            match self.fetch_endpoint(&leader_endpoint).await {
                Ok(state) => return Ok((state, leader_ip)),
                Err(e) => {
                    warn!(leader = %leader_endpoint, error = %e, "leader fetch failed");
                }
            }
        }

        Err(DnsError::NoLeader)
    }

    async fn fetch_endpoint(&self, endpoint: &str) -> Result<State, DnsError> {
        let url = format!("http://{}/master/state.json", endpoint);
        let response = self.client.get(&url).send().await?.error_for_status()?;
        Ok(response.json::<State>().await?)
    }
}

/// Parse a `master@ip:port` leader string into its IP and port.
pub(crate) fn parse_leader(leader: &str) -> Option<(String, u16)> {
    let (_, address) = leader.split_once('@')?;
    let (ip, port) = address.rsplit_once(':')?;
    let port: u16 = port.parse().ok()?;
    if ip.is_empty() {
        return None;
    }
    Some((ip.to_string(), port))
}

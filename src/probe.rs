use std::{ fmt, time::Duration };

use reqwest::{ Client, Request };
use serde::Serializer;
use serde_derive::{ Deserialize, Serialize };
use tokio::{ task::JoinSet, time::{ timeout_at, Instant } };
use tracing::{ debug, error, trace };

use crate::{ error::LookupError, utils };

const FAVICON_PATH: &str = "/favicon.ico";

#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Site {
    #[serde(rename = "Name", alias = "name")]
    pub name: String,
    #[serde(rename = "URL", alias = "url")]
    pub url: String,
}

impl Site {
    pub fn new(name: &str, url: &str) -> Self {
        Site { name: name.to_string(), url: url.to_string() }
    }
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LatencyStatus {
    Excellent,
    Good,
    Average,
    Poor,
    Error,
    Timeout,
}

impl LatencyStatus {
    /// Classifies a measured latency; HTTP status codes play no part.
    pub fn from_latency(latency: Duration) -> Self {
        match latency.as_millis() {
            ms if ms < 200 => LatencyStatus::Excellent,
            ms if ms < 500 => LatencyStatus::Good,
            ms if ms < 1000 => LatencyStatus::Average,
            _ => LatencyStatus::Poor,
        }
    }
}

impl fmt::Display for LatencyStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            LatencyStatus::Excellent => "excellent",
            LatencyStatus::Good => "good",
            LatencyStatus::Average => "average",
            LatencyStatus::Poor => "poor",
            LatencyStatus::Error => "error",
            LatencyStatus::Timeout => "timeout",
        })
    }
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct ProbeResult {
    pub name: String,
    pub url: String,
    #[serde(rename = "latencyMs", serialize_with = "as_millis")]
    pub latency: Duration,
    pub status: LatencyStatus,
    pub success: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub error: String,
}

fn as_millis<S>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> where S: Serializer {
    serializer.serialize_u64(utils::millis(*d))
}

impl ProbeResult {
    fn reached(site: &Site, latency: Duration) -> Self {
        ProbeResult {
            name: site.name.clone(),
            url: site.url.clone(),
            latency,
            status: LatencyStatus::from_latency(latency),
            success: true,
            error: String::new(),
        }
    }

    fn failed(site: &Site, status: LatencyStatus, error: String) -> Self {
        ProbeResult {
            name: site.name.clone(),
            url: site.url.clone(),
            latency: Duration::ZERO,
            status,
            success: false,
            error,
        }
    }
}

/// Measures reachability of sites through a shared client. Each site gets a
/// HEAD for its favicon and, if that fails at transport level, one GET to its
/// root under the same deadline.
#[derive(Clone, Debug)]
pub struct Prober {
    client: Client,
    timeout: Duration,
}

impl Prober {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Prober { client, timeout }
    }

    /// Probes every site concurrently, one task per site with no cap, and
    /// returns once all of them are done. `result[i]` belongs to `sites[i]`.
    pub async fn probe_all(&self, sites: &[Site]) -> Vec<ProbeResult> {
        let mut slots: Vec<Option<ProbeResult>> = vec![None; sites.len()];
        let mut set = JoinSet::new();
        for (idx, site) in sites.iter().cloned().enumerate() {
            let prober = self.clone();
            set.spawn(async move { (idx, prober.probe(&site).await) });
        }
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((idx, result)) => {
                    trace!(idx, site = %result.name, "probe finished");
                    slots[idx] = Some(result);
                }
                Err(e) => error!("probe task failed: {}", e),
            }
        }

        let results: Vec<ProbeResult> = slots
            .into_iter()
            .zip(sites)
            .map(|(slot, site)| {
                slot.unwrap_or_else(||
                    ProbeResult::failed(site, LatencyStatus::Error, "probe task aborted".to_string())
                )
            })
            .collect();
        debug!(
            total = results.len(),
            online = results
                .iter()
                .filter(|r| r.success)
                .count(),
            "probing round completed"
        );
        results
    }

    pub async fn probe(&self, site: &Site) -> ProbeResult {
        let deadline = Instant::now() + self.timeout;
        let head = match self.client.head(format!("{}{}", site.url, FAVICON_PATH)).build() {
            Ok(r) => r,
            Err(e) => {
                return ProbeResult::failed(site, LatencyStatus::Error, e.to_string());
            }
        };
        let head_err = match self.timed(head, deadline).await {
            Ok(latency) => {
                return ProbeResult::reached(site, latency);
            }
            Err(e) => e,
        };
        debug!(site = %site.name, "HEAD failed: {}, falling back to GET", head_err);
        match self.fallback(site, deadline).await {
            Ok(latency) => ProbeResult::reached(site, latency),
            Err(e) => {
                debug!(site = %site.name, "fallback GET failed: {}", e);
                ProbeResult::failed(site, LatencyStatus::Timeout, e.to_string())
            }
        }
    }

    async fn fallback(&self, site: &Site, deadline: Instant) -> Result<Duration, LookupError> {
        let get = self.client.get(&site.url).build()?;
        self.timed(get, deadline).await
    }

    /// Time from send to response headers. Any response counts, whatever its
    /// status code.
    async fn timed(&self, request: Request, deadline: Instant) -> Result<Duration, LookupError> {
        let start = Instant::now();
        let _resp = timeout_at(deadline, self.client.execute(request)).await??;
        Ok(start.elapsed())
    }
}

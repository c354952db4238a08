use std::{ fmt::Write, time::Duration };

use anyhow::Result;
use serde::Serialize;
use serde_derive::Serialize;

use crate::{
    identity::Identity,
    probe::{ LatencyStatus, ProbeResult },
    purity::ScoreReport,
    utils,
};

const RULE: &str = "----------------------------------------------------";
const URL_WIDTH: usize = 26;

/// Prints `data` as pretty JSON or through the given text renderer.
pub fn emit<T: Serialize>(json: bool, data: &T, text: impl Fn(&T) -> String) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(data)?);
    } else {
        print!("{}", text(data));
    }
    Ok(())
}

pub fn identity(i: &Identity, origin: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", RULE);
    let label = if origin { "Origin IP" } else { "IP" };
    let _ = writeln!(out, "{:<10} {}", label, i.ip);
    let _ = writeln!(out, "{:<10} {} ({})", "Country", i.country, i.country_code);
    for (label, value) in [
        ("Region", &i.region),
        ("City", &i.city),
        ("ISP", &i.isp),
        ("Org", &i.org),
        ("Timezone", &i.timezone),
    ] {
        if !value.is_empty() {
            let _ = writeln!(out, "{:<10} {}", label, value);
        }
    }
    let _ = writeln!(out, "{}", RULE);
    out
}

pub fn recommendation(score: f64) -> &'static str {
    match score {
        s if s >= 80.0 => "high purity, suitable for most uses",
        s if s >= 60.0 => "medium purity, some sites may restrict access",
        s if s >= 40.0 => "low purity, consider switching IP or node",
        _ => "very low purity, switching is strongly advised",
    }
}

pub fn score_report(r: &ScoreReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, "{:<12} {}", "IP", r.ip);
    let _ = writeln!(out, "{:<12} {}", "ASN", r.asn);
    let _ = writeln!(out, "{:<12} {}", "Org", r.asn_org);
    let _ = writeln!(out, "{:<12} {:.1}/100 ({})", "Purity", r.score, r.quality_tier);
    let _ = writeln!(out, "{:<12} {}", "Risk", r.risk_level);
    for (label, hit) in [
        ("VPN", r.is_vpn),
        ("Proxy", r.is_proxy),
        ("Tor", r.is_tor),
        ("Datacenter", r.is_datacenter),
        ("Blacklist", r.is_blacklisted),
    ] {
        let _ = writeln!(out, "  [{}] {}", if hit { "x" } else { " " }, label);
    }
    let _ = writeln!(out, "{:<12} {}", "Advice", recommendation(r.score));
    let _ = writeln!(out, "{}", RULE);
    out
}

fn truncate_url(url: &str) -> String {
    if url.chars().count() > URL_WIDTH {
        let head: String = url
            .chars()
            .take(URL_WIDTH - 3)
            .collect();
        head + "..."
    } else {
        url.to_string()
    }
}

fn status_mark(r: &ProbeResult) -> &'static str {
    match r.status {
        _ if !r.success => "x",
        LatencyStatus::Average => "~",
        LatencyStatus::Poor => "!",
        _ => "+",
    }
}

pub fn probe_table(results: &[ProbeResult]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<2}{:<16} {:>10}  {:<26}  {}", "", "Site", "Latency", "URL", "Status");
    for r in results {
        let latency = if r.success {
            format!("{} ms", r.latency.as_millis())
        } else {
            "-".to_string()
        };
        let _ = writeln!(
            out,
            "{:<2}{:<16} {:>10}  {:<26}  {}",
            status_mark(r),
            r.name,
            latency,
            truncate_url(&r.url),
            r.status
        );
    }
    out
}

#[derive(Serialize, Debug, PartialEq, Eq)]
pub struct SiteLatency {
    pub name: String,
    #[serde(rename = "latencyMs")]
    pub latency_ms: u64,
}

/// Aggregate view over one probing round.
#[derive(Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub online: usize,
    pub total: usize,
    pub online_pct: f64,
    pub avg_latency_ms: Option<u64>,
    pub fastest: Option<SiteLatency>,
    pub slowest: Option<SiteLatency>,
    pub quality: Option<LatencyStatus>,
}

impl Summary {
    pub fn from_results(results: &[ProbeResult]) -> Self {
        let online: Vec<&ProbeResult> = results
            .iter()
            .filter(|r| r.success)
            .collect();
        let total = results.len();
        let online_pct = if total == 0 {
            0.0
        } else {
            utils::round(((online.len() as f64) / (total as f64)) * 100.0, 1)
        };
        let site = |r: &&ProbeResult| SiteLatency {
            name: r.name.clone(),
            latency_ms: utils::millis(r.latency),
        };
        let fastest = online.iter().min_by_key(|r| r.latency).map(site);
        let slowest = online.iter().max_by_key(|r| r.latency).map(site);
        let avg = if online.is_empty() {
            None
        } else {
            let sum: Duration = online.iter().map(|r| r.latency).sum();
            Some(sum / (online.len() as u32))
        };
        let quality = avg.map(|a| {
            match a.as_millis() {
                ms if ms > 500 => LatencyStatus::Average,
                ms if ms > 200 => LatencyStatus::Good,
                _ => LatencyStatus::Excellent,
            }
        });
        Summary {
            online: online.len(),
            total,
            online_pct,
            avg_latency_ms: avg.map(utils::millis),
            fastest,
            slowest,
            quality,
        }
    }
}

pub fn summary(s: &Summary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, "Online:  {}/{} ({:.1}%)", s.online, s.total, s.online_pct);
    if let (Some(avg), Some(fastest), Some(slowest), Some(quality)) = (
        s.avg_latency_ms,
        &s.fastest,
        &s.slowest,
        s.quality,
    ) {
        let _ = writeln!(out, "Average: {} ms", avg);
        let _ = writeln!(out, "Fastest: {} ms ({})", fastest.latency_ms, fastest.name);
        let _ = writeln!(out, "Slowest: {} ms ({})", slowest.latency_ms, slowest.name);
        let _ = writeln!(out, "Quality: {}", quality);
    }
    let _ = writeln!(out, "{}", RULE);
    out
}

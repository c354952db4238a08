use std::fmt;

use serde_derive::Serialize;

use crate::{ identity::Identity, utils::contains_ignore_ascii_case };

const BASE_SCORE: f64 = 100.0;

/// Keywords scanned in order; a tier contributes its delta once, on the first hit.
struct KeywordTier {
    keywords: &'static [&'static str],
    delta: f64,
}

impl KeywordTier {
    fn matches(&self, text: &str) -> bool {
        self.keywords.iter().any(|k| contains_ignore_ascii_case(text, k))
    }
}

const TIERS: [KeywordTier; 3] = [
    // anonymizer and hosting wording
    KeywordTier {
        keywords: &["VPN", "Proxy", "Datacenter", "Hosting", "Cloud", "Virtual", "Server"],
        delta: -30.0,
    },
    // cloud and hosting brands
    KeywordTier {
        keywords: &[
            "Amazon",
            "Google Cloud",
            "Microsoft Azure",
            "DigitalOcean",
            "Linode",
            "Vultr",
            "Hetzner",
            "OVH",
            "Cloudflare",
        ],
        delta: -20.0,
    },
    // residential carriers
    KeywordTier {
        keywords: &[
            "Comcast",
            "AT&T",
            "Verizon",
            "China Telecom",
            "China Unicom",
            "China Mobile",
            "Chinanet",
            "Telekom",
            "Orange",
            "Vodafone",
            "BT",
        ],
        delta: 10.0,
    },
];

const DATACENTER_KEYWORDS: [&str; 3] = ["Datacenter", "Hosting", "Cloud"];

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            RiskLevel::Low
        } else if score >= 50.0 {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        })
    }
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum QualityTier {
    Excellent,
    Good,
    Average,
    Poor,
    VeryPoor,
}

impl QualityTier {
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s >= 90.0 => QualityTier::Excellent,
            s if s >= 75.0 => QualityTier::Good,
            s if s >= 50.0 => QualityTier::Average,
            s if s >= 25.0 => QualityTier::Poor,
            _ => QualityTier::VeryPoor,
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            QualityTier::Excellent => "excellent",
            QualityTier::Good => "good",
            QualityTier::Average => "average",
            QualityTier::Poor => "poor",
            QualityTier::VeryPoor => "very-poor",
        })
    }
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScoreReport {
    pub ip: String,
    pub score: f64,
    pub risk_level: RiskLevel,
    pub quality_tier: QualityTier,
    #[serde(rename = "isVPN")]
    pub is_vpn: bool,
    pub is_proxy: bool,
    pub is_tor: bool,
    pub is_datacenter: bool,
    /// No reputation source is wired in, this is always false.
    pub is_blacklisted: bool,
    pub asn: String,
    pub asn_org: String,
}

/// Derives the purity report from the identity's organization text. Pure and
/// infallible.
pub fn score(identity: &Identity) -> ScoreReport {
    let text = identity.carrier_text();
    let score = purity_score(text);
    ScoreReport {
        ip: identity.ip.clone(),
        score,
        risk_level: RiskLevel::from_score(score),
        quality_tier: QualityTier::from_score(score),
        is_vpn: contains_ignore_ascii_case(text, "VPN"),
        is_proxy: contains_ignore_ascii_case(text, "Proxy"),
        is_tor: contains_ignore_ascii_case(text, "Tor"),
        is_datacenter: DATACENTER_KEYWORDS.iter().any(|k| contains_ignore_ascii_case(text, k)),
        is_blacklisted: false,
        asn: leading_asn(&identity.org),
        asn_org: identity.org.clone(),
    }
}

pub fn purity_score(text: &str) -> f64 {
    let delta: f64 = TIERS.iter()
        .filter(|t| t.matches(text))
        .map(|t| t.delta)
        .sum();
    (BASE_SCORE + delta).clamp(0.0, 100.0)
}

/// `AS4134` out of `AS4134 CHINANET Guangdong province network`.
fn leading_asn(org: &str) -> String {
    let token = org.split_whitespace().next().unwrap_or_default();
    match token.strip_prefix("AS") {
        Some(num) if !num.is_empty() && num.bytes().all(|b| b.is_ascii_digit()) => token.to_string(),
        _ => String::new(),
    }
}

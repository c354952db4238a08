use std::{ env, time::Duration };

use anyhow::{ anyhow, Context, Result };
use reqwest::{ Client, Proxy, Url };
use tracing::info;

const POOL_IDLE_TIMEOUT: u64 = 30;
const POOL_MAX_IDLE_PER_HOST: usize = 10;
const ENV_PROXIES: [(&str, &str); 3] = [
    ("HTTP_PROXY", "http_proxy"),
    ("HTTPS_PROXY", "https_proxy"),
    ("ALL_PROXY", "all_proxy"),
];

#[derive(Debug, Clone, Default)]
pub struct TransportOpt {
    /// Explicit proxy, `http://`, `https://` or `socks5://`.
    pub proxy: Option<String>,
    pub timeout: Duration,
    /// Bypass every proxy, including the ones from the environment.
    pub origin: bool,
}

fn env_proxy(upper: &str, lower: &str) -> Option<String> {
    env::var(upper)
        .ok()
        .filter(|v| !v.is_empty())
        .or_else(|| env::var(lower).ok().filter(|v| !v.is_empty()))
}

pub fn parse_proxy(proxy: &str) -> Result<Proxy> {
    let url = Url::parse(proxy).context(format!("invalid proxy url {}", proxy))?;
    match url.scheme() {
        "http" | "https" | "socks5" => Ok(Proxy::all(url)?),
        other => Err(anyhow!("unsupported proxy scheme {} (expected http, https or socks5)", other)),
    }
}

/// Builds the client shared by the resolver and the prober.
pub fn build_client(opt: &TransportOpt) -> Result<Client> {
    let mut builder = Client::builder()
        .timeout(opt.timeout)
        .pool_idle_timeout(Duration::from_secs(POOL_IDLE_TIMEOUT))
        .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST);

    if opt.origin {
        info!("ignoring all proxies to reveal the origin address");
        builder = builder.no_proxy();
    } else if let Some(proxy) = &opt.proxy {
        builder = builder.proxy(parse_proxy(proxy)?);
        info!("using proxy {}", proxy);
    } else {
        for (upper, lower) in ENV_PROXIES {
            if let Some(v) = env_proxy(upper, lower) {
                info!("using {} from environment: {}", upper, v);
            }
        }
    }
    builder.build().context("cannot build http client")
}

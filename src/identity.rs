use std::fmt;

use reqwest::{ Client, StatusCode };
use serde::Deserializer;
use serde_derive::{ Deserialize, Serialize };
use tracing::{ debug, warn };

use crate::error::LookupError;

pub mod locale;
pub mod normalizer;

/// Wire format an identity provider answers with.
#[derive(PartialEq, Eq, Clone, Debug)]
pub enum Format {
    Json,
    Text,
    Unsupported(String),
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Format::Json => write!(f, "json"),
            Format::Text => write!(f, "text"),
            Format::Unsupported(tag) => write!(f, "{}", tag),
        }
    }
}

impl<'de> serde::Deserialize<'de> for Format {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error> where D: Deserializer<'de> {
        let s = <String as serde::Deserialize>::deserialize(deserializer)?;
        Ok(match s.as_str() {
            "json" => Format::Json,
            "text" => Format::Text,
            other => Format::Unsupported(other.to_string()),
        })
    }
}

/// One identity lookup endpoint. Position in the provider list is its
/// failover priority.
#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Provider {
    pub name: String,
    pub url: String,
    pub format: Format,
}

impl Provider {
    pub fn new(name: &str, url: &str, format: Format) -> Self {
        Provider { name: name.to_string(), url: url.to_string(), format }
    }
}

pub fn default_providers() -> Vec<Provider> {
    vec![
        Provider::new("ping0.cc", "https://ping0.cc/geo", Format::Text),
        Provider::new("ipapi.co", "https://ipapi.co/json/", Format::Json),
        Provider::new("ipinfo.io", "https://ipinfo.io/json", Format::Json),
        Provider::new("ip-api.com", "http://ip-api.com/json/", Format::Json)
    ]
}

/// Externally visible identity of the caller, normalized from whichever
/// provider answered first.
#[derive(Deserialize, Serialize, Default, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    #[serde(default, alias = "query", deserialize_with = "null_as_empty")]
    pub ip: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub country: String,
    #[serde(default, alias = "country_code", deserialize_with = "null_as_empty")]
    pub country_code: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub region: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub city: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub isp: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub org: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub timezone: String,
}

impl Identity {
    /// Organization text used for scoring: `org`, or `isp` when `org` is empty.
    pub fn carrier_text(&self) -> &str {
        if self.org.is_empty() { &self.isp } else { &self.org }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error> where D: Deserializer<'de> {
    let v: Option<String> = serde::Deserialize::deserialize(deserializer)?;
    Ok(v.unwrap_or_default())
}

/// Walks the provider list strictly in order, one request in flight at a time.
#[derive(Clone)]
pub struct Resolver {
    client: Client,
    providers: Vec<Provider>,
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Resolver").field("providers", &self.providers).finish()
    }
}

impl Resolver {
    pub fn new(client: Client, providers: Vec<Provider>) -> Self {
        Resolver { client, providers }
    }

    pub fn providers(&self) -> &[Provider] {
        &self.providers
    }

    /// Returns the identity from the first provider that answers with 200 and
    /// a body that normalizes. When all of them fail, only the last failure is
    /// reported.
    pub async fn resolve(&self) -> Result<Identity, LookupError> {
        let mut last_err = None;
        for provider in self.providers.iter() {
            match self.fetch(provider).await {
                Ok(identity) => {
                    debug!(provider = %provider.name, ip = %identity.ip, "identity resolved");
                    return Ok(identity);
                }
                Err(err) => {
                    warn!(provider = %provider.name, "{}, trying next provider", err);
                    last_err = Some(err);
                }
            }
        }
        match last_err {
            Some(err) => Err(LookupError::Exhausted(Box::new(err))),
            None => Err(LookupError::Configuration("no identity providers configured".to_string())),
        }
    }

    async fn fetch(&self, provider: &Provider) -> Result<Identity, LookupError> {
        if let Format::Unsupported(tag) = &provider.format {
            return Err(
                LookupError::Configuration(
                    format!("provider {} has unsupported format {}", provider.name, tag)
                )
            );
        }
        debug!("querying {} at {}", provider.name, provider.url);
        let resp = self.client.get(&provider.url).send().await?;
        if resp.status() != StatusCode::OK {
            return Err(LookupError::HttpStatus(resp.status().as_u16()));
        }
        let body = resp.bytes().await?;
        normalizer::normalize(&provider.format, &body)
    }
}

#[cfg(test)]
mod test {
    use tokio::net::TcpListener;
    use tracing_test::traced_test;

    use super::*;

    fn test_client() -> Client {
        Client::builder().no_proxy().build().unwrap()
    }

    async fn refused_url() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{}/", addr)
    }

    #[test]
    fn test_format_tags() {
        let p: Provider = serde_json
            ::from_str(r#"{"name": "a", "url": "http://a", "format": "xml"}"#)
            .unwrap();
        assert_eq!(p.format, Format::Unsupported("xml".to_string()));
        let p: Provider = serde_json
            ::from_str(r#"{"name": "a", "url": "http://a", "format": "text"}"#)
            .unwrap();
        assert_eq!(p.format, Format::Text);
    }

    #[test]
    fn test_default_providers() {
        let p = default_providers();
        let names: Vec<&str> = p
            .iter()
            .map(|v| v.name.as_str())
            .collect();
        assert_eq!(names, vec!["ping0.cc", "ipapi.co", "ipinfo.io", "ip-api.com"]);
        assert_eq!(p[0].format, Format::Text);
        assert!(p[1..].iter().all(|v| v.format == Format::Json));
    }

    #[test]
    fn test_carrier_text() {
        let mut i = Identity { isp: "Comcast".to_string(), ..Default::default() };
        assert_eq!(i.carrier_text(), "Comcast");
        i.org = "AS7922 Comcast Cable".to_string();
        assert_eq!(i.carrier_text(), "AS7922 Comcast Cable");
    }

    #[tokio::test]
    #[traced_test]
    async fn test_failover_stops_at_first_success() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();
        let m1 = server.mock("GET", "/fail1").with_status(500).expect(1).create_async().await;
        let m2 = server.mock("GET", "/fail2").with_status(429).expect(1).create_async().await;
        let m3 = server
            .mock("GET", "/ok")
            .with_status(200)
            .with_body(r#"{"ip": "203.0.113.45", "country": "Test Country"}"#)
            .expect(1)
            .create_async().await;
        let m4 = server
            .mock("GET", "/unused")
            .with_status(200)
            .with_body(r#"{"ip": "198.51.100.1"}"#)
            .expect(0)
            .create_async().await;

        let providers = vec![
            Provider::new("fail1", &format!("{}/fail1", url), Format::Json),
            Provider::new("fail2", &format!("{}/fail2", url), Format::Json),
            Provider::new("ok", &format!("{}/ok", url), Format::Json),
            Provider::new("unused", &format!("{}/unused", url), Format::Json)
        ];
        let resolver = Resolver::new(test_client(), providers);
        let identity = resolver.resolve().await.unwrap();
        assert_eq!(identity.ip, "203.0.113.45");
        assert_eq!(identity.country, "Test Country");

        m1.assert_async().await;
        m2.assert_async().await;
        m3.assert_async().await;
        m4.assert_async().await;
        assert!(logs_contain("trying next provider"));
    }

    #[tokio::test]
    async fn test_all_fail_keeps_last_error_only() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();
        let _m = server.mock("GET", "/gone").with_status(404).create_async().await;

        let providers = vec![
            Provider::new("refused", &refused_url().await, Format::Json),
            Provider::new("broken", &format!("{}/broken", url), Format::Text),
            Provider::new("gone", &format!("{}/gone", url), Format::Json)
        ];
        let resolver = Resolver::new(test_client(), providers);
        let err = resolver.resolve().await.unwrap_err();
        match &err {
            LookupError::Exhausted(last) => assert!(matches!(**last, LookupError::HttpStatus(404))),
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(err.to_string(), "all identity providers failed: provider returned status 404");
    }

    #[tokio::test]
    async fn test_text_provider() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/geo")
            .with_status(200)
            .with_body("14.153.68.158\n中国 广东省深圳市福田中国电信\nAS4134\nCHINANET Guangdong province network\n")
            .create_async().await;
        let providers = vec![Provider::new("geo", &format!("{}/geo", server.url()), Format::Text)];
        let identity = Resolver::new(test_client(), providers).resolve().await.unwrap();
        assert_eq!(identity.ip, "14.153.68.158");
        assert_eq!(identity.country, "中国");
        assert_eq!(identity.org, "AS4134 CHINANET Guangdong province network");
    }

    #[tokio::test]
    async fn test_unparseable_body_fails_over() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();
        let _m1 = server.mock("GET", "/bad").with_status(200).with_body("{not json").create_async().await;
        let _m2 = server.mock("GET", "/short").with_status(200).with_body("1.2.3.4\n\n").create_async().await;

        let providers = vec![
            Provider::new("bad", &format!("{}/bad", url), Format::Json),
            Provider::new("short", &format!("{}/short", url), Format::Text)
        ];
        let err = Resolver::new(test_client(), providers).resolve().await.unwrap_err();
        match err {
            LookupError::Exhausted(last) => assert!(matches!(*last, LookupError::Parse(_))),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unsupported_format_is_configuration_error() {
        let mut server = mockito::Server::new_async().await;
        let m = server.mock("GET", "/xml").with_status(200).with_body("<ip/>").expect(0).create_async().await;
        let providers = vec![
            Provider::new("xml", &format!("{}/xml", server.url()), Format::Unsupported("xml".into()))
        ];
        let err = Resolver::new(test_client(), providers).resolve().await.unwrap_err();
        match err {
            LookupError::Exhausted(last) => assert!(matches!(*last, LookupError::Configuration(_))),
            other => panic!("unexpected error {:?}", other),
        }
        m.assert_async().await;
    }

    #[tokio::test]
    async fn test_no_providers() {
        let err = Resolver::new(test_client(), vec![]).resolve().await.unwrap_err();
        assert!(matches!(err, LookupError::Configuration(_)));
    }
}

use std::{ fs, path::Path };

use anyhow::{ anyhow, Context, Result };
use tracing::{ debug, info };

use crate::{ identity::{ self, Provider }, probe::Site };

pub fn default_sites() -> Vec<Site> {
    [
        ("Google", "https://www.google.com"),
        ("GitHub", "https://github.com"),
        ("YouTube", "https://www.youtube.com"),
        ("Twitter", "https://twitter.com"),
        ("Facebook", "https://www.facebook.com"),
        ("Instagram", "https://www.instagram.com"),
        ("Reddit", "https://www.reddit.com"),
        ("Netflix", "https://www.netflix.com"),
        ("Wikipedia", "https://www.wikipedia.org"),
        ("Amazon", "https://www.amazon.com"),
        ("OpenAI", "https://www.openai.com"),
        ("Telegram", "https://telegram.org"),
    ]
        .iter()
        .map(|(name, url)| Site::new(name, url))
        .collect()
}

/// Sites from a JSON file, or the built-in list when no file is given.
pub fn load_sites(path: Option<&Path>) -> Result<Vec<Site>> {
    let Some(path) = path else {
        debug!("using built-in site list");
        return Ok(default_sites());
    };
    info!("reading sites from {:?}", path);
    let s = fs::read_to_string(path).context(format!("cannot read site list {:?}", path))?;
    parse_sites(&s).context(format!("cannot load site list {:?}", path))
}

pub fn parse_sites(s: &str) -> Result<Vec<Site>> {
    let sites: Vec<Site> = serde_json::from_str(s)?;
    if sites.is_empty() {
        return Err(anyhow!("site list is empty"));
    }
    Ok(sites)
}

/// Identity providers from a JSON file, or the built-in table.
pub fn load_providers(path: Option<&Path>) -> Result<Vec<Provider>> {
    let Some(path) = path else {
        return Ok(identity::default_providers());
    };
    info!("reading identity providers from {:?}", path);
    let s = fs::read_to_string(path).context(format!("cannot read provider list {:?}", path))?;
    parse_providers(&s).context(format!("cannot load provider list {:?}", path))
}

pub fn parse_providers(s: &str) -> Result<Vec<Provider>> {
    let providers: Vec<Provider> = serde_json::from_str(s)?;
    if providers.is_empty() {
        return Err(anyhow!("provider list is empty"));
    }
    if let Some(p) = providers.iter().find(|p| matches!(p.format, identity::Format::Unsupported(_))) {
        return Err(anyhow!("provider {} uses unsupported format {}", p.name, p.format));
    }
    Ok(providers)
}

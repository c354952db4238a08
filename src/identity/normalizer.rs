use super::{ locale, Format, Identity };
use crate::error::LookupError;

pub fn normalize(format: &Format, body: &[u8]) -> Result<Identity, LookupError> {
    match format {
        Format::Json => parse_json(body),
        Format::Text => parse_text(&String::from_utf8_lossy(body)),
        Format::Unsupported(tag) =>
            Err(LookupError::Configuration(format!("unsupported response format: {}", tag))),
    }
}

/// Field-mapped decode. Absent fields stay empty, but the address itself is
/// mandatory.
pub fn parse_json(body: &[u8]) -> Result<Identity, LookupError> {
    let identity: Identity = serde_json::from_slice(body)?;
    if identity.ip.is_empty() {
        return Err(LookupError::Parse("response carries no ip address".to_string()));
    }
    Ok(identity)
}

/// Positional decode of the line oriented format:
///
/// ```text
/// 14.153.68.158                          <- ip
/// 中国 广东省深圳市福田中国电信               <- locale line
/// AS4134                                 <- optional ASN
/// CHINANET Guangdong province network    <- optional carrier name
/// ```
pub fn parse_text(body: &str) -> Result<Identity, LookupError> {
    let lines: Vec<&str> = body
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    if lines.len() < 2 {
        return Err(
            LookupError::Parse(format!("expected at least 2 non-blank lines, got {}", lines.len()))
        );
    }

    let loc = locale::tokenize(lines[1]);
    let mut identity = Identity {
        ip: lines[0].to_string(),
        country: loc.country,
        region: loc.region,
        city: loc.city,
        isp: loc.carrier.clone(),
        org: loc.carrier,
        ..Default::default()
    };

    let asn = lines
        .get(2)
        .copied()
        .filter(|l| l.starts_with("AS"));
    if let Some(asn) = asn {
        identity.org = asn.to_string();
    }
    if let Some(carrier) = lines.get(3) {
        identity.org = match asn {
            Some(asn) => format!("{} {}", asn, carrier),
            None => carrier.to_string(),
        };
    }
    Ok(identity)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_text_full() {
        let i = parse_text(
            "14.153.68.158\n中国 广东省深圳市福田中国电信\nAS4134\nCHINANET Guangdong province network"
        ).unwrap();
        assert_eq!(i, Identity {
            ip: "14.153.68.158".to_string(),
            country: "中国".to_string(),
            region: "广东省".to_string(),
            city: "深圳市".to_string(),
            isp: "福田中国电信".to_string(),
            org: "AS4134 CHINANET Guangdong province network".to_string(),
            ..Default::default()
        });
    }

    #[test]
    fn test_text_latin_locale() {
        let i = parse_text(
            "203.0.113.45\nUnited States California Los Angeles AT&T Services\nAS7018\nATT-INTERNET4"
        ).unwrap();
        assert_eq!(i.country, "United");
        assert_eq!(i.region, "States");
        assert_eq!(i.city, "California");
        assert_eq!(i.isp, "Los Angeles AT&T Services");
        assert_eq!(i.org, "AS7018 ATT-INTERNET4");
    }

    #[test]
    fn test_text_minimal_and_blank_lines() {
        let i = parse_text("\n\n1.2.3.4\r\n\r\n  China Beijing  \n").unwrap();
        assert_eq!(i.ip, "1.2.3.4");
        assert_eq!(i.country, "China");
        assert_eq!(i.region, "Beijing");
        assert_eq!(i.city, "");
        assert_eq!(i.isp, "");
        assert_eq!(i.org, "");
    }

    #[test]
    fn test_text_asn_without_carrier() {
        let i = parse_text("1.2.3.4\n中国 北京市朝阳区联通\nAS4837").unwrap();
        assert_eq!(i.city, "北京市");
        assert_eq!(i.isp, "朝阳区联通");
        assert_eq!(i.org, "AS4837");
    }

    #[test]
    fn test_text_carrier_without_asn() {
        let i = parse_text("1.2.3.4\nJapan Tokyo\nunknown\nSome Carrier KK").unwrap();
        assert_eq!(i.org, "Some Carrier KK");
    }

    #[test]
    fn test_text_too_short() {
        for body in ["", "\n\n", "1.2.3.4", "  1.2.3.4  \n   \n"] {
            let res = parse_text(body);
            assert!(matches!(res, Err(LookupError::Parse(_))), "input {:?}", body);
        }
    }

    #[test]
    fn test_json() {
        let i = parse_json(
            br#"{"ip": "203.0.113.45", "country": "United States", "city": "Los Angeles", "latitude": 34.05}"#
        ).unwrap();
        assert_eq!(i.ip, "203.0.113.45");
        assert_eq!(i.country, "United States");
        assert_eq!(i.city, "Los Angeles");
        assert_eq!(i.region, "");
    }

    #[test]
    fn test_json_provider_variants() {
        let i = parse_json(
            br#"{"status": "success", "query": "198.51.100.7", "countryCode": "DE", "isp": "Deutsche Telekom AG", "org": null, "timezone": "Europe/Berlin"}"#
        ).unwrap();
        assert_eq!(i.ip, "198.51.100.7");
        assert_eq!(i.country_code, "DE");
        assert_eq!(i.org, "");
        assert_eq!(i.carrier_text(), "Deutsche Telekom AG");

        let i = parse_json(br#"{"ip": "192.0.2.1", "country_code": "US"}"#).unwrap();
        assert_eq!(i.country_code, "US");
    }

    #[test]
    fn test_json_errors() {
        assert!(matches!(parse_json(b"{\"ip\": "), Err(LookupError::Parse(_))));
        assert!(matches!(parse_json(b""), Err(LookupError::Parse(_))));
        assert!(matches!(parse_json(br#"{"country": "X"}"#), Err(LookupError::Parse(_))));
    }

    #[test]
    fn test_dispatch() {
        let res = normalize(&Format::Unsupported("xml".to_string()), b"<ip/>");
        assert!(matches!(res, Err(LookupError::Configuration(_))));
        let res = normalize(&Format::Text, "1.2.3.4\nChina Beijing".as_bytes()).unwrap();
        assert_eq!(res.region, "Beijing");
    }
}

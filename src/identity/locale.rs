//! Tokenizer for the combined locale line of the text format.
//!
//! The line is either CJK with administrative markers (`中国 广东省深圳市福田中国电信`)
//! or whitespace separated Latin text (`United States California Los Angeles Comcast`).
//! A single predicate picks one of two segmenters. Lines mixing both styles have
//! no defined interpretation; they get whatever the predicate selects.

const PROVINCE: char = '省';
const CITY: char = '市';

#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Locale {
    pub country: String,
    pub region: String,
    pub city: String,
    pub carrier: String,
}

/// Splits the part of a locale line that follows the country.
pub trait Segmenter {
    /// `line` is the full locale line, `rest` what follows the country token.
    fn segment(&self, line: &str, rest: &str) -> Locale;
}

/// Cuts region and city at the province and city markers, the leftover is the
/// carrier.
pub struct MarkerSegmenter;

/// Re-reads the whole line by whitespace: token 1 is the region, token 2 the
/// city, the remaining tokens form the carrier.
pub struct WhitespaceSegmenter;

impl Segmenter for MarkerSegmenter {
    fn segment(&self, _line: &str, rest: &str) -> Locale {
        let mut loc = Locale::default();
        let mut remaining = rest;
        if let Some(end) = end_of_marker(remaining, PROVINCE) {
            loc.region = remaining[..end].to_string();
            remaining = &remaining[end..];
        }
        if let Some(end) = end_of_marker(remaining, CITY) {
            loc.city = remaining[..end].to_string();
            remaining = &remaining[end..];
        }
        loc.carrier = remaining.trim().to_string();
        loc
    }
}

impl Segmenter for WhitespaceSegmenter {
    fn segment(&self, line: &str, _rest: &str) -> Locale {
        let parts: Vec<&str> = line.split_whitespace().collect();
        Locale {
            region: parts.get(1).map(|s| s.to_string()).unwrap_or_default(),
            city: parts.get(2).map(|s| s.to_string()).unwrap_or_default(),
            carrier: parts
                .get(3..)
                .map(|s| s.join(" "))
                .unwrap_or_default(),
            ..Default::default()
        }
    }
}

/// A marker only counts when something precedes it.
fn marker_offset(text: &str, marker: char) -> Option<usize> {
    text.find(marker).filter(|&i| i > 0)
}

fn end_of_marker(text: &str, marker: char) -> Option<usize> {
    marker_offset(text, marker).map(|i| i + marker.len_utf8())
}

/// True when marker segmentation would yield a region or a city.
pub fn has_admin_markers(rest: &str) -> bool {
    marker_offset(rest, PROVINCE).is_some() || marker_offset(rest, CITY).is_some()
}

pub fn select_segmenter(rest: &str) -> &'static dyn Segmenter {
    if has_admin_markers(rest) { &MarkerSegmenter } else { &WhitespaceSegmenter }
}

/// Country is the token before the first space, unless that token already
/// holds a marker (or there is no space), in which case the whole line is the
/// country.
fn split_country(line: &str) -> Option<(&str, &str)> {
    let idx = line.find(' ').filter(|&i| i > 0)?;
    let first = &line[..idx];
    if first.contains(PROVINCE) || first.contains(CITY) {
        return None;
    }
    Some((first, line[idx + 1..].trim()))
}

pub fn tokenize(line: &str) -> Locale {
    let Some((country, rest)) = split_country(line) else {
        return Locale { country: line.to_string(), ..Default::default() };
    };
    let mut loc = select_segmenter(rest).segment(line, rest);
    loc.country = country.to_string();
    loc
}

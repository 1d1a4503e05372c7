use std::sync::LazyLock;

use regex::Regex;

static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)https?://[^\s)]+").expect("URL pattern is valid")
});

/// TikTok hosts we respond to, including the vm/vt short-link domains.
const TIKTOK_HOSTS: &[&str] = &[
    "tiktok.com",
    "www.tiktok.com",
    "m.tiktok.com",
    "vm.tiktok.com",
    "vt.tiktok.com",
];

/// The authority exactly as written: everything between `://` and the first
/// `/`, `?` or `#`.
fn raw_authority(candidate: &str) -> Option<&str> {
    let (_, rest) = candidate.split_once("://")?;
    rest.split(['/', '?', '#']).next()
}

fn is_tiktok_link(candidate: &str) -> bool {
    // The URL parser drops userinfo and reads `\` as `/`, which would let
    // `https://evil.com@vm.tiktok.com` or `https://vm.tiktok.com\x` through
    if raw_authority(candidate).map_or(true, |auth| auth.contains(['@', '\\'])) {
        return false;
    }
    let Ok(url) = reqwest::Url::parse(candidate) else {
        return false;
    };
    // host_str() is already lowercased and excludes the port
    url.host_str().is_some_and(|host| TIKTOK_HOSTS.contains(&host))
}

/// Return the first TikTok URL in `text`, exactly as written.
pub fn extract_tiktok_url(text: Option<&str>) -> Option<&str> {
    let text = text.filter(|t| !t.is_empty())?;
    URL_RE
        .find_iter(text)
        .map(|m| m.as_str())
        .find(|candidate| is_tiktok_link(candidate))
}

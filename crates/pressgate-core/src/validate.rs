//! Syntactic validation for gateway request fields.
//!
//! These checks run before any lookup. A value that fails here is a
//! malformed request, never an authentication failure.

use std::sync::LazyLock;

use regex::Regex;

/// Longest hostname accepted (RFC 1035 presentation form).
pub const MAX_DOMAIN_LEN: usize = 253;

static DOMAIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?(\.[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?)+$")
        .expect("static regex is valid")
});

static KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,128}$").expect("static regex is valid"));

static SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,100}$").expect("static regex is valid"));

static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9]{1,10}(\.[0-9]{1,10}){0,5}$").expect("static regex is valid")
});

/// Normalise and validate a hostname. Returns the lowercase form.
pub fn normalize_domain(domain: &str) -> Option<String> {
    let domain = domain.trim().to_ascii_lowercase();
    if domain.len() > MAX_DOMAIN_LEN || !DOMAIN_RE.is_match(&domain) {
        return None;
    }
    Some(domain)
}

/// Shared secrets and old keys: alphanumerics, dash and underscore.
pub fn is_valid_key(key: &str) -> bool {
    KEY_RE.is_match(key)
}

/// Package slugs: filename-safe characters only.
pub fn is_valid_slug(slug: &str) -> bool {
    SLUG_RE.is_match(slug)
}

/// Dotted-numeric versions such as `1`, `2.0` or `4.12.1`.
pub fn is_valid_version(version: &str) -> bool {
    VERSION_RE.is_match(version)
}

/// Split an archive file name of the form `{slug}_{version}.zip`.
///
/// The split happens on the last underscore, so slugs may themselves
/// contain underscores.
pub fn parse_archive_name(file_name: &str) -> Option<(&str, &str)> {
    let stem = file_name.strip_suffix(".zip")?;
    let (slug, version) = stem.rsplit_once('_')?;
    (is_valid_slug(slug) && is_valid_version(version)).then_some((slug, version))
}

/// The archive file name for a slug at a given version.
pub fn archive_name(slug: &str, version: &str) -> String {
    format!("{slug}_{version}.zip")
}

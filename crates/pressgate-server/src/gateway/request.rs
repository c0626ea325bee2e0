//! Typed gateway requests.

use std::collections::HashMap;
use std::fmt;

use pressgate_core::PackageKind;
use pressgate_core::validate::{is_valid_key, is_valid_slug, is_valid_version, normalize_domain};

/// A validated gateway request. Nothing untyped crosses this boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayRequest {
    PackageCheck(PackageCheckRequest),
    Auth(AuthRequest),
}

/// "Is there a newer version of this package for me?"
#[derive(Clone, PartialEq, Eq)]
pub struct PackageCheckRequest {
    pub kind: PackageKind,
    pub domain: String,
    pub key: String,
    pub slug: String,
    pub version: String,
}

impl fmt::Debug for PackageCheckRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackageCheckRequest")
            .field("kind", &self.kind)
            .field("domain", &self.domain)
            .field("key", &"[REDACTED]")
            .field("slug", &self.slug)
            .field("version", &self.version)
            .finish()
    }
}

/// Key retrieval: single-use delivery without `old_key`, rotation with it.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthRequest {
    pub domain: String,
    pub old_key: Option<String>,
}

impl fmt::Debug for AuthRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthRequest")
            .field("domain", &self.domain)
            .field("old_key", &self.old_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Why a request failed syntactic validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestRejection {
    MissingField(&'static str),
    InvalidField(&'static str),
    UnknownType,
}

impl fmt::Display for RequestRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField(name) => write!(f, "missing field `{name}`"),
            Self::InvalidField(name) => write!(f, "invalid field `{name}`"),
            Self::UnknownType => f.write_str("unknown request type"),
        }
    }
}

impl GatewayRequest {
    /// Validate raw query parameters.
    pub fn parse(params: &HashMap<String, String>) -> Result<Self, RequestRejection> {
        match required(params, "type")? {
            "auth" => Ok(Self::Auth(AuthRequest::parse(params)?)),
            "plugin" => Ok(Self::PackageCheck(PackageCheckRequest::parse(
                PackageKind::Plugin,
                params,
            )?)),
            "theme" => Ok(Self::PackageCheck(PackageCheckRequest::parse(
                PackageKind::Theme,
                params,
            )?)),
            _ => Err(RequestRejection::UnknownType),
        }
    }
}

impl PackageCheckRequest {
    fn parse(kind: PackageKind, params: &HashMap<String, String>) -> Result<Self, RequestRejection> {
        let domain = parse_domain(params)?;

        let key = required(params, "key")?;
        if !is_valid_key(key) {
            return Err(RequestRejection::InvalidField("key"));
        }
        let slug = required(params, "slug")?;
        if !is_valid_slug(slug) {
            return Err(RequestRejection::InvalidField("slug"));
        }
        let version = required(params, "version")?;
        if !is_valid_version(version) {
            return Err(RequestRejection::InvalidField("version"));
        }

        Ok(Self {
            kind,
            domain,
            key: key.to_string(),
            slug: slug.to_string(),
            version: version.to_string(),
        })
    }
}

impl AuthRequest {
    fn parse(params: &HashMap<String, String>) -> Result<Self, RequestRejection> {
        let domain = parse_domain(params)?;

        let old_key = match params.get("old_key").map(String::as_str) {
            None | Some("") => None,
            Some(k) if is_valid_key(k) => Some(k.to_string()),
            Some(_) => return Err(RequestRejection::InvalidField("old_key")),
        };

        Ok(Self { domain, old_key })
    }
}

fn required<'a>(
    params: &'a HashMap<String, String>,
    name: &'static str,
) -> Result<&'a str, RequestRejection> {
    match params.get(name).map(String::as_str) {
        None | Some("") => Err(RequestRejection::MissingField(name)),
        Some(value) => Ok(value),
    }
}

fn parse_domain(params: &HashMap<String, String>) -> Result<String, RequestRejection> {
    normalize_domain(required(params, "domain")?).ok_or(RequestRejection::InvalidField("domain"))
}

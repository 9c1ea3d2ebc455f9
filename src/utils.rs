use crate::error::{CatalogError, Result};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::Path;
use url::Url;

// -----------------------------------------------------------------------------
// Repository URL helpers
// -----------------------------------------------------------------------------

// scp-like SSH syntax, e.g. git@github.com:org/collection.git
static SCP_URL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[A-Za-z0-9._-]+@)?[A-Za-z0-9.-]+:(?P<path>[^\\:][^:]*)$").unwrap()
});

const SUPPORTED_SCHEMES: [&str; 5] = ["http", "https", "ssh", "git", "file"];

/// Checks that `url` is something git can clone from and returns it trimmed.
///
/// Accepts `http(s)://`, `ssh://`, `git://` and `file://` URLs, scp-like `user@host:path`
/// and existing local directories.
pub fn validate_repo_url(url: &str) -> Result<String> {
    let url = url.trim();
    if url.is_empty() {
        return Err(CatalogError::InvalidUrl("URL must not be empty".to_string()));
    }

    if let Ok(parsed) = Url::parse(url) {
        // Windows drive letters parse as a one-letter scheme.
        if parsed.scheme().len() > 1 {
            if !SUPPORTED_SCHEMES.contains(&parsed.scheme()) {
                return Err(CatalogError::InvalidUrl(format!(
                    "unsupported scheme '{}' in {}",
                    parsed.scheme(),
                    url
                )));
            }
            if parsed.scheme() != "file" && !parsed.has_host() {
                return Err(CatalogError::InvalidUrl(format!("missing host in {}", url)));
            }
            return Ok(url.to_string());
        }
    }

    if Path::new(url).is_dir() {
        return Ok(url.to_string());
    }

    if !url.contains("://") && SCP_URL_REGEX.is_match(url) {
        return Ok(url.to_string());
    }

    Err(CatalogError::InvalidUrl(format!(
        "{} is neither a git URL nor an existing directory",
        url
    )))
}

/// Name a collection gets when none is given: the last path segment without its extension.
///
/// `https://github.com/org/my-apps.git` becomes `my-apps`.
pub fn derive_collection_name(url: &str) -> Result<String> {
    let last_segment = url
        .trim()
        .trim_end_matches(['/', '\\'])
        .rsplit(['/', '\\', ':'])
        .next()
        .unwrap_or_default();
    let name = match last_segment.split_once('.') {
        Some((stem, _)) => stem,
        None => last_segment,
    };

    if name.is_empty() {
        return Err(CatalogError::InvalidUrl(format!(
            "could not derive a collection name from {}, please provide one",
            url
        )));
    }
    Ok(name.to_string())
}

// -----------------------------------------------------------------------------
// Filesystem helpers
// -----------------------------------------------------------------------------

/// Collection and app names become directory and file names below the data root.
pub fn validate_name(name: &str) -> Result<()> {
    let trimmed = name.trim();
    let reserved = trimmed.is_empty() || trimmed == "." || trimmed == "..";
    if reserved || name.contains(['/', '\\', '\0']) {
        return Err(CatalogError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Modification time of `path`, formatted for display.
pub fn last_modified(path: &Path) -> Option<String> {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .map(|t| {
            DateTime::<Utc>::from(t)
                .format("%Y-%m-%d %H:%M:%S UTC")
                .to_string()
        })
        .ok()
}

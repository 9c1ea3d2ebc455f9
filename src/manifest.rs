//! Parser for `self-service.yaml`, the manifest at the root of every app collection.
//!
//! ```yaml
//! categories:
//!   Misc: {}
//! items:
//!   Cowsay:
//!     description: Let an ASCII cow say stuff in your terminal!
//!     categories: [Misc]
//!     playbook: playbooks/cowsay.yml
//! ```
//!
//! Only `categories` and `items` are validated; other item keys (`image_url`, `params`,
//! `requirements`, ...) are accepted and ignored.
use crate::app::{App, AppFactory};
use crate::error::{CatalogError, Result};
use crate::models::AppCategory;
use crate::utils;
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::{Path, PathBuf};

pub const MANIFEST_FILE_NAME: &str = "self-service.yaml";

const CATEGORIES: &str = "categories";
const ITEMS: &str = "items";

pub trait ManifestParser: Send + Sync {
    /// Reads and validates a manifest, turning it into domain objects.
    ///
    /// Schema and syntax problems are reported as [`CatalogError::ManifestInvalid`].
    fn from_file(
        &self,
        collection_name: &str,
        collection_directory: &Path,
        manifest_path: &Path,
    ) -> Result<(Vec<AppCategory>, Vec<App>)>;
}

#[derive(Deserialize, Debug)]
struct ItemRecord {
    description: String,
    #[serde(default)]
    categories: Vec<String>,
    playbook: PathBuf,
}

pub struct YamlManifestParser {
    app_factory: AppFactory,
}

impl YamlManifestParser {
    pub fn new(app_factory: AppFactory) -> Self {
        Self { app_factory }
    }
}

fn invalid(message: impl Into<String>) -> CatalogError {
    CatalogError::ManifestInvalid(message.into())
}

fn required_mapping<'a>(document: &'a Mapping, key: &str) -> Result<&'a Mapping> {
    match document.get(key) {
        None => Err(invalid(format!("{}: required field", key))),
        Some(Value::Mapping(mapping)) => Ok(mapping),
        Some(_) => Err(invalid(format!("{}: must be of dict type", key))),
    }
}

fn key_name(key: &Value, section: &str) -> Result<String> {
    match key {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(invalid(format!("{}: unsupported key {:?}", section, other))),
    }
}

/// Checks the document shape and returns the `categories` and `items` sections.
fn validate(content: &str) -> Result<(Mapping, Mapping)> {
    let document: Value =
        serde_yaml::from_str(content).map_err(|e| invalid(format!("not valid YAML: {}", e)))?;

    let Value::Mapping(document) = document else {
        return Err(invalid("document must be a mapping"));
    };

    let categories = required_mapping(&document, CATEGORIES)?.clone();
    let items = required_mapping(&document, ITEMS)?.clone();
    Ok((categories, items))
}

impl ManifestParser for YamlManifestParser {
    fn from_file(
        &self,
        collection_name: &str,
        collection_directory: &Path,
        manifest_path: &Path,
    ) -> Result<(Vec<AppCategory>, Vec<App>)> {
        let content = fs::read_to_string(manifest_path)?;
        let (category_section, item_section) = validate(&content)?;

        let categories = category_section
            .keys()
            .map(|key| key_name(key, CATEGORIES).map(AppCategory::new))
            .collect::<Result<Vec<_>>>()?;

        let mut apps = Vec::with_capacity(item_section.len());
        for (key, data) in item_section {
            let name = key_name(&key, ITEMS)?;
            utils::validate_name(&name)
                .map_err(|_| invalid(format!("{}.{}: invalid app name", ITEMS, name)))?;
            let item: ItemRecord = serde_yaml::from_value(data)
                .map_err(|e| invalid(format!("{}.{}: {}", ITEMS, name, e)))?;

            apps.push(self.app_factory.create_app(
                collection_name,
                collection_directory,
                &name,
                item.description.trim(),
                &item.categories,
                &item.playbook,
            )?);
        }

        log::debug!(
            "Parsed {}: {} categories, {} apps",
            manifest_path.display(),
            categories.len(),
            apps.len()
        );
        Ok((categories, apps))
    }
}

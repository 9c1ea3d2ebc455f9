//! The set of app collections cloned below the git directory.
use crate::collection::AppCollection;
use crate::config::Config;
use crate::error::{CatalogError, Result};
use crate::git::GitClient;
use crate::manifest::ManifestParser;
use crate::utils;
use std::collections::btree_map::{BTreeMap, Entry};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

pub struct AppCatalog {
    config: Config,
    git_client: Arc<dyn GitClient>,
    manifest_parser: Arc<dyn ManifestParser>,
    collections: BTreeMap<String, AppCollection>,
    initialized: bool,
}

impl AppCatalog {
    pub fn new(
        config: Config,
        git_client: Arc<dyn GitClient>,
        manifest_parser: Arc<dyn ManifestParser>,
    ) -> Self {
        Self {
            config,
            git_client,
            manifest_parser,
            collections: BTreeMap::new(),
            initialized: false,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn new_collection(&self, name: &str) -> Result<AppCollection> {
        Ok(AppCollection::new(
            self.git_client.clone(),
            self.manifest_parser.clone(),
            name,
            self.get_directory_for_collection(name)?,
        ))
    }

    /// Rescans the git directory. Every subdirectory that is a repository becomes a collection;
    /// collections are not loaded until their contents are asked for.
    pub fn refresh(&mut self) -> Result<()> {
        let git_directory = self.config.git_directory()?;
        let mut collections = BTreeMap::new();

        for entry in fs::read_dir(&git_directory)? {
            let path = entry?.path();
            if !self.git_client.is_git_directory(&path) {
                log::debug!("Skipping non-repository {}", path.display());
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                log::warn!("Skipping collection with non UTF-8 name: {}", path.display());
                continue;
            };
            collections.insert(name.to_string(), self.new_collection(name)?);
        }

        log::debug!(
            "Found {} collections in {}",
            collections.len(),
            git_directory.display()
        );
        self.collections = collections;
        self.initialized = true;
        Ok(())
    }

    fn ensure_initialized(&mut self) -> Result<()> {
        if !self.initialized {
            self.refresh()?;
        }
        Ok(())
    }

    pub fn get_directory_for_collection(&self, name: &str) -> Result<PathBuf> {
        Ok(self.config.git_directory()?.join(name))
    }

    pub fn get_collection_by_name(&mut self, name: &str) -> Result<Option<&mut AppCollection>> {
        self.ensure_initialized()?;
        Ok(self.collections.get_mut(name))
    }

    /// All collections, ordered by name.
    pub fn list(&mut self) -> Result<Vec<&mut AppCollection>> {
        self.ensure_initialized()?;
        Ok(self.collections.values_mut().collect())
    }

    /// Clones `url` as collection `name`.
    ///
    /// Fails with [`CatalogError::CollectionAlreadyExists`] before touching the network when
    /// the target directory is already there.
    pub fn add(&mut self, name: &str, url: &str) -> Result<&mut AppCollection> {
        utils::validate_name(name)?;
        self.ensure_initialized()?;
        let directory = self.get_directory_for_collection(name)?;
        if directory.exists() {
            return Err(CatalogError::CollectionAlreadyExists {
                name: name.to_string(),
            });
        }

        self.git_client.clone_repo(url, &directory)?;
        log::info!("Added collection '{}' from {}", name, url);

        // A stale entry whose checkout vanished from disk is replaced, not reused.
        let collection = self.new_collection(name)?;
        Ok(match self.collections.entry(name.to_string()) {
            Entry::Occupied(mut entry) => {
                entry.insert(collection);
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(collection),
        })
    }

    /// Deletes the clone of collection `name`. Stored app states are left alone.
    pub fn remove(&mut self, name: &str) -> Result<()> {
        self.ensure_initialized()?;
        if !self.collections.contains_key(name) {
            return Err(CatalogError::CollectionNotFound {
                name: name.to_string(),
            });
        }

        let directory = self.get_directory_for_collection(name)?;
        self.git_client.remove_repo(&directory)?;
        self.collections.remove(name);
        log::info!("Removed collection '{}'", name);
        Ok(())
    }
}

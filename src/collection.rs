//! An app collection: one cloned repository with a manifest and its playbooks.
use crate::app::App;
use crate::error::{CatalogError, Result};
use crate::git::GitClient;
use crate::manifest::{ManifestParser, MANIFEST_FILE_NAME};
use crate::models::AppCategory;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct AppCollection {
    git_client: Arc<dyn GitClient>,
    manifest_parser: Arc<dyn ManifestParser>,
    name: String,
    directory: PathBuf,
    categories: BTreeMap<String, AppCategory>,
    apps: BTreeMap<String, App>,
    validation_error: Option<String>,
    initialized: bool,
}

impl AppCollection {
    pub fn new(
        git_client: Arc<dyn GitClient>,
        manifest_parser: Arc<dyn ManifestParser>,
        name: impl Into<String>,
        directory: impl Into<PathBuf>,
    ) -> Self {
        Self {
            git_client,
            manifest_parser,
            name: name.into(),
            directory: directory.into(),
            categories: BTreeMap::new(),
            apps: BTreeMap::new(),
            validation_error: None,
            initialized: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.directory.join(MANIFEST_FILE_NAME)
    }

    /// Why the manifest was rejected during the last refresh, if it was.
    pub fn validation_error(&self) -> Option<&str> {
        self.validation_error.as_deref()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Re-reads the manifest and rebuilds categories and apps.
    ///
    /// An invalid manifest leaves the collection empty with `validation_error` set; only a
    /// missing manifest (or an I/O failure) is returned as an error.
    pub fn refresh(&mut self) -> Result<()> {
        let manifest = self.manifest_path();
        if !manifest.exists() {
            return Err(CatalogError::ManifestMissing { path: manifest });
        }

        match self
            .manifest_parser
            .from_file(&self.name, &self.directory, &manifest)
        {
            Ok((categories, apps)) => {
                self.categories = categories
                    .into_iter()
                    .map(|category| (category.name.clone(), category))
                    .collect();
                self.apps = apps
                    .into_iter()
                    .map(|app| (app.name().to_string(), app))
                    .collect();
                self.validation_error = None;
                log::info!(
                    "Loaded collection '{}': {} categories, {} apps",
                    self.name,
                    self.categories.len(),
                    self.apps.len()
                );
            }
            Err(CatalogError::ManifestInvalid(message)) => {
                log::warn!("Collection '{}' has an invalid config: {}", self.name, message);
                self.categories.clear();
                self.apps.clear();
                self.validation_error = Some(message);
            }
            Err(e) => return Err(e),
        }

        self.initialized = true;
        Ok(())
    }

    fn ensure_initialized(&mut self) -> Result<()> {
        if !self.initialized {
            self.refresh()?;
        }
        Ok(())
    }

    pub fn categories(&mut self) -> Result<&BTreeMap<String, AppCategory>> {
        self.ensure_initialized()?;
        Ok(&self.categories)
    }

    pub fn apps(&mut self) -> Result<&BTreeMap<String, App>> {
        self.ensure_initialized()?;
        Ok(&self.apps)
    }

    pub fn app_mut(&mut self, name: &str) -> Result<Option<&mut App>> {
        self.ensure_initialized()?;
        Ok(self.apps.get_mut(name))
    }

    /// Commit id currently checked out.
    pub fn revision(&mut self) -> Result<String> {
        self.ensure_initialized()?;
        self.git_client.get_revision(&self.directory)
    }

    pub fn url(&mut self) -> Result<String> {
        self.ensure_initialized()?;
        self.git_client.get_origin_url(&self.directory)
    }

    /// Moves the checkout to `revision` (or origin's default branch) and returns
    /// `(old revision, new revision)`.
    ///
    /// The manifest is not re-read: apps and categories keep describing the old revision
    /// until the next [`AppCollection::refresh`].
    pub fn update(&mut self, revision: Option<&str>) -> Result<(String, String)> {
        let old_revision = self.revision()?;
        self.git_client.update(&self.directory, revision)?;
        let new_revision = self.revision()?;
        Ok((old_revision, new_revision))
    }
}

impl fmt::Debug for AppCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppCollection")
            .field("name", &self.name)
            .field("directory", &self.directory)
            .field("apps", &self.apps.keys().collect::<Vec<_>>())
            .field("validation_error", &self.validation_error)
            .field("initialized", &self.initialized)
            .finish()
    }
}

//! Commands for managing app collections: git repositories containing a `self-service.yaml`.
use crate::catalog::AppCatalog;
use crate::collection::AppCollection;
use crate::error::{CatalogError, Result};
use crate::models::{CollectionInfo, UpdateReport};
use crate::utils;

fn describe(collection: &mut AppCollection) -> Result<(String, String, usize)> {
    let revision = collection.revision()?;
    let url = collection.url()?;
    let app_count = collection.apps()?.len();
    Ok((revision, url, app_count))
}

/// Loads the summary of one collection. A collection that cannot be loaded is still
/// reported, with the reason in `validation_error`.
fn load_collection_info(collection: &mut AppCollection) -> CollectionInfo {
    let path = collection.directory().to_path_buf();
    let last_updated = utils::last_modified(&path);

    match describe(collection) {
        Ok((revision, url, app_count)) => CollectionInfo {
            name: collection.name().to_string(),
            revision,
            path,
            url,
            validation_error: collection.validation_error().map(str::to_string),
            app_count,
            last_updated,
        },
        Err(e) => {
            log::warn!("Could not load collection '{}': {}", collection.name(), e);
            CollectionInfo {
                name: collection.name().to_string(),
                revision: String::new(),
                path,
                url: String::new(),
                validation_error: Some(e.to_string()),
                app_count: 0,
                last_updated,
            }
        }
    }
}

pub fn list_collections(catalog: &mut AppCatalog) -> Result<Vec<CollectionInfo>> {
    let collections: Vec<CollectionInfo> = catalog
        .list()?
        .into_iter()
        .map(load_collection_info)
        .collect();
    log::info!("Found {} collections", collections.len());
    Ok(collections)
}

/// Clones a new collection. Without `name` it is derived from the URL.
pub fn add_collection(
    catalog: &mut AppCatalog,
    url: &str,
    name: Option<&str>,
) -> Result<CollectionInfo> {
    let url = utils::validate_repo_url(url)?;
    let name = match name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => name.to_string(),
        None => utils::derive_collection_name(&url)?,
    };

    let collection = catalog.add(&name, &url)?;
    Ok(load_collection_info(collection))
}

pub fn remove_collection(catalog: &mut AppCatalog, name: &str) -> Result<()> {
    catalog.remove(name)?;
    log::info!(
        "App states of '{}' are kept in {}",
        name,
        catalog.config().state_directory(name).display()
    );
    Ok(())
}

/// Moves one collection to `revision`, or to the head of its default branch.
pub fn update_collection(
    catalog: &mut AppCatalog,
    name: &str,
    revision: Option<&str>,
) -> Result<UpdateReport> {
    match catalog.get_collection_by_name(name)? {
        Some(collection) => update(collection, revision),
        None => Err(CatalogError::CollectionNotFound {
            name: name.to_string(),
        }),
    }
}

fn update(collection: &mut AppCollection, revision: Option<&str>) -> Result<UpdateReport> {
    let (old_revision, new_revision) = collection.update(revision)?;
    let report = UpdateReport {
        name: collection.name().to_string(),
        old_revision,
        new_revision,
    };
    log::info!("{}", report);
    Ok(report)
}

/// Updates every collection to the head of its default branch.
///
/// A failing collection does not stop the others; its error is returned in its slot.
pub fn update_all_collections(
    catalog: &mut AppCatalog,
) -> Result<Vec<(String, Result<UpdateReport>)>> {
    Ok(catalog
        .list()?
        .into_iter()
        .map(|collection| {
            let name = collection.name().to_string();
            let result = update(collection, None);
            if let Err(e) = &result {
                log::error!("Failed to update collection '{}': {}", name, e);
            }
            (name, result)
        })
        .collect())
}

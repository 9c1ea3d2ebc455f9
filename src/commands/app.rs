//! Commands for listing apps and driving their playbooks.
use crate::app::App;
use crate::catalog::AppCatalog;
use crate::error::{CatalogError, Result};
use crate::models::AppInfo;

const ANY_COLLECTION: &str = "any";

fn app_info(app: &App) -> AppInfo {
    let mut categories: Vec<String> = app.categories().iter().map(|c| c.name.clone()).collect();
    categories.sort();
    AppInfo {
        name: app.name().to_string(),
        collection: app.collection_name().to_string(),
        description: app.description().to_string(),
        categories,
        status: app.status(),
    }
}

/// All apps of all collections, ordered by name. Collections that fail to load are skipped.
pub fn list_apps(catalog: &mut AppCatalog) -> Result<Vec<AppInfo>> {
    let mut apps = Vec::new();
    for collection in catalog.list()? {
        match collection.apps() {
            Ok(collection_apps) => apps.extend(collection_apps.values().map(app_info)),
            Err(e) => log::warn!("Skipping collection '{}': {}", collection.name(), e),
        }
    }
    apps.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.collection.cmp(&b.collection)));
    log::info!("Found {} apps", apps.len());
    Ok(apps)
}

/// Finds `name` in `collection`, or in the first collection that has it.
fn find_app<'a>(
    catalog: &'a mut AppCatalog,
    collection: Option<&str>,
    name: &str,
) -> Result<&'a mut App> {
    let not_found = |collection: &str| CatalogError::AppNotFound {
        collection: collection.to_string(),
        app: name.to_string(),
    };

    if let Some(collection_name) = collection {
        let collection = catalog.get_collection_by_name(collection_name)?.ok_or_else(|| {
            CatalogError::CollectionNotFound {
                name: collection_name.to_string(),
            }
        })?;
        return collection
            .app_mut(name)?
            .ok_or_else(|| not_found(collection_name));
    }

    for collection in catalog.list()? {
        let collection_name = collection.name().to_string();
        match collection.app_mut(name) {
            Ok(Some(app)) => return Ok(app),
            Ok(None) => {}
            Err(e) => log::warn!("Skipping collection '{}': {}", collection_name, e),
        }
    }
    Err(not_found(ANY_COLLECTION))
}

/// Re-checks the status of an app against its playbook and returns it.
pub fn refresh_app_status(
    catalog: &mut AppCatalog,
    collection: Option<&str>,
    name: &str,
) -> Result<AppInfo> {
    let app = find_app(catalog, collection, name)?;
    app.refresh_status()?;
    Ok(app_info(app))
}

pub fn install_app(
    catalog: &mut AppCatalog,
    collection: Option<&str>,
    name: &str,
) -> Result<AppInfo> {
    let app = find_app(catalog, collection, name)?;
    log::info!("Installing {}/{}", app.collection_name(), app.name());
    app.install()?;
    Ok(app_info(app))
}

pub fn uninstall_app(
    catalog: &mut AppCatalog,
    collection: Option<&str>,
    name: &str,
) -> Result<AppInfo> {
    let app = find_app(catalog, collection, name)?;
    log::info!("Uninstalling {}/{}", app.collection_name(), app.name());
    app.uninstall()?;
    Ok(app_info(app))
}

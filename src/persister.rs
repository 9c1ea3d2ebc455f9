//! Persists the last known status of each app to a small YAML file.
//!
//! Layout: `<data_root>/<collection_name>/<app_name>`, content `status: INSTALLED`.
//! Only one process is expected to touch these files; nothing is locked.
use crate::app::App;
use crate::config::Config;
use crate::error::Result;
use crate::models::AppStatus;
use crate::state::{AppState, StateObserver};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub trait AppStatePersister: Send + Sync {
    fn load(&self, app_state_file: &Path) -> Result<AppState>;
    fn save(&self, app_state: &AppState, app_state_file: &Path) -> Result<()>;
    /// Loads the stored status into `app` and keeps every later change persisted.
    fn init_app(&self, app: &mut App) -> Result<()>;
}

#[derive(Serialize, Deserialize, Debug, Default)]
struct StateRecord {
    #[serde(default)]
    status: Option<AppStatus>,
}

#[derive(Debug, Clone)]
pub struct YamlAppStatePersister {
    config: Config,
}

impl YamlAppStatePersister {
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self {
            config: Config::new(data_root),
        }
    }

    pub fn state_file(&self, collection_name: &str, app_name: &str) -> PathBuf {
        self.config.state_directory(collection_name).join(app_name)
    }
}

impl AppStatePersister for YamlAppStatePersister {
    fn load(&self, app_state_file: &Path) -> Result<AppState> {
        if !app_state_file.exists() {
            return Ok(AppState::new(AppStatus::Unknown));
        }

        let content = fs::read_to_string(app_state_file)?;
        if content.trim().is_empty() {
            return Ok(AppState::new(AppStatus::Unknown));
        }

        // A record this version cannot read (hand edits, unknown status names) is not fatal.
        let status = match serde_yaml::from_str::<Option<StateRecord>>(&content) {
            Ok(record) => record.and_then(|r| r.status).unwrap_or_default(),
            Err(e) => {
                log::warn!(
                    "Ignoring unreadable app state {}: {}",
                    app_state_file.display(),
                    e
                );
                AppStatus::Unknown
            }
        };
        Ok(AppState::new(status))
    }

    fn save(&self, app_state: &AppState, app_state_file: &Path) -> Result<()> {
        if let Some(parent) = app_state_file.parent() {
            fs::create_dir_all(parent)?;
        }
        let record = StateRecord {
            status: Some(app_state.status()),
        };
        fs::write(app_state_file, serde_yaml::to_string(&record)?)?;
        log::debug!(
            "Saved status {} to {}",
            app_state.status(),
            app_state_file.display()
        );
        Ok(())
    }

    fn init_app(&self, app: &mut App) -> Result<()> {
        let path = self.state_file(app.collection_name(), app.name());
        let mut state = self.load(&path)?;
        state.attach(Arc::new(StateFileObserver::new(self.clone(), path)));
        app.replace_state(state);
        Ok(())
    }
}

/// Writes the state to one file through a persister whenever it changes.
pub struct StateFileObserver<P> {
    persister: P,
    path: PathBuf,
}

impl<P: AppStatePersister> StateFileObserver<P> {
    pub fn new(persister: P, path: impl Into<PathBuf>) -> Self {
        Self {
            persister,
            path: path.into(),
        }
    }
}

impl<P: AppStatePersister> StateObserver for StateFileObserver<P> {
    fn state_changed(&self, state: &AppState) -> Result<()> {
        self.persister.save(state, &self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::{test_app, ScriptedRunner};
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Clone, Default)]
    struct RecordingPersister {
        saved: Arc<Mutex<Vec<(AppStatus, PathBuf)>>>,
    }

    impl AppStatePersister for RecordingPersister {
        fn load(&self, _app_state_file: &Path) -> Result<AppState> {
            Ok(AppState::default())
        }

        fn save(&self, app_state: &AppState, app_state_file: &Path) -> Result<()> {
            self.saved
                .lock()
                .unwrap()
                .push((app_state.status(), app_state_file.to_path_buf()));
            Ok(())
        }

        fn init_app(&self, _app: &mut App) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_save_then_load_round_trips_every_status() {
        let dir = TempDir::new().unwrap();
        let persister = YamlAppStatePersister::new(dir.path());
        let path = persister.state_file("collection", "cowsay");

        for status in AppStatus::ALL {
            persister.save(&AppState::new(status), &path).unwrap();
            assert_eq!(persister.load(&path).unwrap().status(), status);
        }
    }

    #[test]
    fn test_file_content_is_a_single_status_key() {
        let dir = TempDir::new().unwrap();
        let persister = YamlAppStatePersister::new(dir.path());
        let path = persister.state_file("collection", "cowsay");

        persister
            .save(&AppState::new(AppStatus::NotInstalled), &path)
            .unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.trim(), "status: NOT_INSTALLED");
    }

    #[test]
    fn test_empty_or_missing_state_is_unknown() {
        let dir = TempDir::new().unwrap();
        let persister = YamlAppStatePersister::new(dir.path());

        let missing = dir.path().join("nope");
        assert_eq!(persister.load(&missing).unwrap().status(), AppStatus::Unknown);

        let empty = dir.path().join("empty");
        fs::write(&empty, "").unwrap();
        assert_eq!(persister.load(&empty).unwrap().status(), AppStatus::Unknown);

        let no_key = dir.path().join("no_key");
        fs::write(&no_key, "other: value\n").unwrap();
        assert_eq!(persister.load(&no_key).unwrap().status(), AppStatus::Unknown);
    }

    #[test]
    fn test_unreadable_state_is_unknown() {
        let dir = TempDir::new().unwrap();
        let persister = YamlAppStatePersister::new(dir.path());

        for (name, content) in [
            ("unknown_status", "status: BROKEN\n"),
            ("not_a_mapping", "- INSTALLED\n"),
            ("bad_yaml", "status: [\n"),
        ] {
            let path = dir.path().join(name);
            fs::write(&path, content).unwrap();
            assert_eq!(
                persister.load(&path).unwrap().status(),
                AppStatus::Unknown,
                "{name}"
            );
        }
    }

    #[test]
    fn test_state_file_lives_in_collection_state_directory() {
        let persister = YamlAppStatePersister::new("/data");
        assert_eq!(
            persister.state_file("demo", "cowsay"),
            Config::new("/data").state_directory("demo").join("cowsay")
        );
    }

    #[test]
    fn test_observer_saves_once_per_change_before_setter_returns() {
        let persister = RecordingPersister::default();
        let mut state = AppState::default();
        state.attach(Arc::new(StateFileObserver::new(
            persister.clone(),
            "/data/collection/cowsay",
        )));

        state.set_status(AppStatus::Installed).unwrap();

        let saved = persister.saved.lock().unwrap();
        assert_eq!(
            *saved,
            vec![(AppStatus::Installed, PathBuf::from("/data/collection/cowsay"))]
        );
    }

    #[test]
    fn test_init_app_loads_and_persists_future_changes() {
        let dir = TempDir::new().unwrap();
        let persister = YamlAppStatePersister::new(dir.path());
        let path = persister.state_file("demo", "cowsay");
        persister
            .save(&AppState::new(AppStatus::Installed), &path)
            .unwrap();

        let mut app = test_app(ScriptedRunner::new(vec![]));
        persister.init_app(&mut app).unwrap();
        assert_eq!(app.status(), AppStatus::Installed);

        app.set_status(AppStatus::Upgradable).unwrap();
        assert_eq!(persister.load(&path).unwrap().status(), AppStatus::Upgradable);
    }
}

//! A single installable app and the inference of its install status.
use crate::analyzer::ResultAnalyzer;
use crate::error::{CatalogError, Result};
use crate::models::{AnsibleRunResult, AppCategory, AppStatus};
use crate::persister::AppStatePersister;
use crate::runner::AnsibleRunner;
use crate::state::AppState;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const TAG_STATUS: &str = "status";
pub const TAG_INSTALL: &str = "install";
pub const TAG_UNINSTALL: &str = "uninstall";

pub struct App {
    name: String,
    description: String,
    categories: Vec<AppCategory>,
    collection_name: String,
    collection_directory: PathBuf,
    playbook_path: PathBuf,
    state: AppState,
    runner: Arc<dyn AnsibleRunner>,
    analyzer: Arc<dyn ResultAnalyzer>,
}

impl App {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        collection_name: impl Into<String>,
        collection_directory: impl Into<PathBuf>,
        name: impl Into<String>,
        description: impl Into<String>,
        categories: Vec<AppCategory>,
        playbook_path: impl Into<PathBuf>,
        runner: Arc<dyn AnsibleRunner>,
        analyzer: Arc<dyn ResultAnalyzer>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            categories,
            collection_name: collection_name.into(),
            collection_directory: collection_directory.into(),
            playbook_path: playbook_path.into(),
            state: AppState::default(),
            runner,
            analyzer,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn categories(&self) -> &[AppCategory] {
        &self.categories
    }

    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    /// Checkout root of the owning collection; playbooks run from here.
    pub fn collection_directory(&self) -> &Path {
        &self.collection_directory
    }

    /// Playbook path relative to the collection directory.
    pub fn playbook_path(&self) -> &Path {
        &self.playbook_path
    }

    pub fn status(&self) -> AppStatus {
        self.state.status()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut AppState {
        &mut self.state
    }

    /// Swaps in a state loaded from storage, observers included.
    pub fn replace_state(&mut self, state: AppState) {
        self.state = state;
    }

    pub fn set_status(&mut self, status: AppStatus) -> Result<()> {
        if status != self.state.status() {
            log::info!(
                "App {}/{} status: {} -> {}",
                self.collection_name,
                self.name,
                self.state.status(),
                status
            );
        }
        self.state.set_status(status)
    }

    fn run_playbook(&self, tags: &[&str], check_mode: bool) -> Result<AnsibleRunResult> {
        self.runner.run(
            &self.collection_directory,
            &self.playbook_path,
            tags,
            check_mode,
        )
    }

    /// Runs the playbook in check mode and stores the resulting status.
    ///
    /// A "not installed" signal wins over an "installed" one. The dry run of the install
    /// action only happens when the app reports itself installed.
    pub fn refresh_status(&mut self) -> Result<AppStatus> {
        let status_result = self.run_playbook(&[TAG_STATUS], true)?;

        let status = if self.analyzer.signaling_not_installed(&status_result) {
            AppStatus::NotInstalled
        } else if self.analyzer.signaling_installed(&status_result) {
            let install_result = self.run_playbook(&[TAG_INSTALL], true)?;
            if self.analyzer.has_changes(&install_result) {
                AppStatus::Upgradable
            } else {
                AppStatus::Installed
            }
        } else {
            log::warn!(
                "Playbook {} of app {}/{} signaled no status",
                self.playbook_path.display(),
                self.collection_name,
                self.name
            );
            AppStatus::Unknown
        };

        self.set_status(status)?;
        Ok(status)
    }

    /// Applies the install section of the playbook, then re-checks the status.
    pub fn install(&mut self) -> Result<AppStatus> {
        self.apply(TAG_INSTALL)
    }

    /// Applies the uninstall section of the playbook, then re-checks the status.
    pub fn uninstall(&mut self) -> Result<AppStatus> {
        self.apply(TAG_UNINSTALL)
    }

    fn apply(&mut self, tag: &str) -> Result<AppStatus> {
        let result = self.run_playbook(&[tag], false)?;
        if !result.was_successful() {
            return Err(CatalogError::Runner(format!(
                "'{}' of app {}/{} exited with code {}: {}",
                tag,
                self.collection_name,
                self.name,
                result.return_code,
                result.stderr.trim()
            )));
        }
        self.refresh_status()
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("name", &self.name)
            .field("collection", &self.collection_name)
            .field("categories", &self.categories)
            .field("playbook_path", &self.playbook_path)
            .field("status", &self.state.status())
            .finish()
    }
}

/// Creates apps that share one runner, analyzer and state persister.
#[derive(Clone)]
pub struct AppFactory {
    persister: Arc<dyn AppStatePersister>,
    runner: Arc<dyn AnsibleRunner>,
    analyzer: Arc<dyn ResultAnalyzer>,
}

impl AppFactory {
    pub fn new(
        persister: Arc<dyn AppStatePersister>,
        runner: Arc<dyn AnsibleRunner>,
        analyzer: Arc<dyn ResultAnalyzer>,
    ) -> Self {
        Self {
            persister,
            runner,
            analyzer,
        }
    }

    pub fn create_app(
        &self,
        collection_name: &str,
        collection_directory: &Path,
        name: &str,
        description: &str,
        categories: &[String],
        playbook_path: &Path,
    ) -> Result<App> {
        let mut app = App::new(
            collection_name,
            collection_directory,
            name,
            description,
            categories.iter().map(AppCategory::new).collect(),
            playbook_path,
            self.runner.clone(),
            self.analyzer.clone(),
        );
        self.persister.init_app(&mut app)?;
        Ok(app)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::analyzer::{JsonResultAnalyzer, SIGNAL_INSTALLED, SIGNAL_NOT_INSTALLED};
    use crate::state::StateObserver;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    pub(crate) struct RunCall {
        pub working_directory: PathBuf,
        pub playbook_path: PathBuf,
        pub tags: Vec<String>,
        pub check_mode: bool,
    }

    /// Hands out prepared results in order and records every call.
    pub(crate) struct ScriptedRunner {
        results: Mutex<VecDeque<AnsibleRunResult>>,
        pub calls: Mutex<Vec<RunCall>>,
    }

    impl ScriptedRunner {
        pub(crate) fn new(results: Vec<AnsibleRunResult>) -> Arc<Self> {
            Arc::new(Self {
                results: Mutex::new(results.into()),
                calls: Mutex::new(Vec::new()),
            })
        }

        pub(crate) fn calls(&self) -> Vec<RunCall> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl AnsibleRunner for ScriptedRunner {
        fn run(
            &self,
            working_directory: &Path,
            playbook_path: &Path,
            tags: &[&str],
            check_mode: bool,
        ) -> Result<AnsibleRunResult> {
            self.calls.lock().unwrap().push(RunCall {
                working_directory: working_directory.to_path_buf(),
                playbook_path: playbook_path.to_path_buf(),
                tags: tags.iter().map(|t| t.to_string()).collect(),
                check_mode,
            });
            self.results
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| CatalogError::Runner("no scripted result left".to_string()))
        }
    }

    pub(crate) fn signal(msg: &str) -> AnsibleRunResult {
        AnsibleRunResult::with_data(
            json!({ "plays": [{ "tasks": [{ "hosts": { "localhost": { "msg": msg } } }] }] }),
            0,
        )
    }

    pub(crate) fn changes(changed: i64) -> AnsibleRunResult {
        AnsibleRunResult::with_data(json!({ "stats": { "localhost": { "changed": changed } } }), 0)
    }

    pub(crate) fn test_app(runner: Arc<ScriptedRunner>) -> App {
        App::new(
            "demo",
            "/srv/collections/demo",
            "cowsay",
            "Let an ASCII cow say stuff in your terminal!",
            vec![AppCategory::new("Misc")],
            "playbooks/cowsay.yml",
            runner,
            Arc::new(JsonResultAnalyzer::new()),
        )
    }

    struct CountingObserver(Mutex<Vec<AppStatus>>);

    impl StateObserver for CountingObserver {
        fn state_changed(&self, state: &AppState) -> Result<()> {
            self.0.lock().unwrap().push(state.status());
            Ok(())
        }
    }

    #[test]
    fn test_not_installed_needs_a_single_run() {
        let runner = ScriptedRunner::new(vec![signal(SIGNAL_NOT_INSTALLED)]);
        let mut app = test_app(runner.clone());

        assert_eq!(app.refresh_status().unwrap(), AppStatus::NotInstalled);

        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].tags, vec!["status"]);
        assert!(calls[0].check_mode);
        assert_eq!(calls[0].working_directory, PathBuf::from("/srv/collections/demo"));
        assert_eq!(calls[0].playbook_path, PathBuf::from("playbooks/cowsay.yml"));
    }

    #[test]
    fn test_installed_with_pending_changes_is_upgradable() {
        let runner = ScriptedRunner::new(vec![signal(SIGNAL_INSTALLED), changes(2)]);
        let mut app = test_app(runner.clone());

        assert_eq!(app.refresh_status().unwrap(), AppStatus::Upgradable);

        let calls = runner.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].tags, vec!["install"]);
        assert!(calls[1].check_mode);
    }

    #[test]
    fn test_installed_without_changes_is_installed() {
        let runner = ScriptedRunner::new(vec![signal(SIGNAL_INSTALLED), changes(0)]);
        let mut app = test_app(runner);

        assert_eq!(app.refresh_status().unwrap(), AppStatus::Installed);
        assert_eq!(app.status(), AppStatus::Installed);
    }

    #[test]
    fn test_no_signal_is_unknown() {
        let runner = ScriptedRunner::new(vec![changes(1)]);
        let mut app = test_app(runner.clone());
        app.set_status(AppStatus::Installed).unwrap();

        assert_eq!(app.refresh_status().unwrap(), AppStatus::Unknown);
        assert_eq!(runner.calls().len(), 1);
    }

    #[test]
    fn test_not_installed_wins_over_installed() {
        let both = AnsibleRunResult::with_data(
            json!({ "plays": [{ "tasks": [
                { "hosts": { "localhost": { "msg": SIGNAL_INSTALLED } } },
                { "hosts": { "localhost": { "msg": SIGNAL_NOT_INSTALLED } } }
            ] }] }),
            0,
        );
        let runner = ScriptedRunner::new(vec![both]);
        let mut app = test_app(runner.clone());

        assert_eq!(app.refresh_status().unwrap(), AppStatus::NotInstalled);
        assert_eq!(runner.calls().len(), 1);
    }

    #[test]
    fn test_refresh_notifies_observers_once() {
        let runner = ScriptedRunner::new(vec![signal(SIGNAL_NOT_INSTALLED)]);
        let observer = Arc::new(CountingObserver(Mutex::new(Vec::new())));
        let mut app = test_app(runner);
        app.state_mut().attach(observer.clone());

        app.refresh_status().unwrap();

        assert_eq!(*observer.0.lock().unwrap(), vec![AppStatus::NotInstalled]);
    }

    #[test]
    fn test_install_applies_then_rechecks_status() {
        let runner = ScriptedRunner::new(vec![
            AnsibleRunResult::with_data(json!({}), 0),
            signal(SIGNAL_INSTALLED),
            changes(0),
        ]);
        let mut app = test_app(runner.clone());

        assert_eq!(app.install().unwrap(), AppStatus::Installed);

        let calls = runner.calls();
        assert_eq!(calls[0].tags, vec!["install"]);
        assert!(!calls[0].check_mode);
        assert_eq!(calls[1].tags, vec!["status"]);
    }

    #[test]
    fn test_failed_uninstall_keeps_status() {
        let runner = ScriptedRunner::new(vec![AnsibleRunResult::new("", "boom", 2)]);
        let mut app = test_app(runner);
        app.set_status(AppStatus::Installed).unwrap();

        assert!(matches!(app.uninstall(), Err(CatalogError::Runner(_))));
        assert_eq!(app.status(), AppStatus::Installed);
    }

    #[test]
    fn test_factory_wires_persistence() {
        let dir = tempfile::TempDir::new().unwrap();
        let persister = crate::persister::YamlAppStatePersister::new(dir.path());
        let factory = AppFactory::new(
            Arc::new(persister.clone()),
            ScriptedRunner::new(vec![signal(SIGNAL_NOT_INSTALLED)]),
            Arc::new(JsonResultAnalyzer::new()),
        );

        let mut app = factory
            .create_app(
                "demo",
                dir.path(),
                "cowsay",
                "cow",
                &["Misc".to_string()],
                Path::new("playbooks/cowsay.yml"),
            )
            .unwrap();
        assert_eq!(app.categories(), &[AppCategory::new("Misc")]);
        assert_eq!(app.state().observer_count(), 1);

        app.refresh_status().unwrap();

        let stored = persister
            .load(&persister.state_file("demo", "cowsay"))
            .unwrap();
        assert_eq!(stored.status(), AppStatus::NotInstalled);
    }
}

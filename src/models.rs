// Central data model definitions shared by the domain entities and the command layer.
// The DTOs at the bottom are what the CLI renders; the domain entities themselves
// live in `app`, `collection` and `catalog`.

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;

// -----------------------------------------------------------------------------
// AppCategory
// -----------------------------------------------------------------------------
/// Used for grouping apps in listings. Two categories are the same if their names are.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AppCategory {
    pub name: String,
}

impl AppCategory {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

// -----------------------------------------------------------------------------
// AppStatus
// -----------------------------------------------------------------------------
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppStatus {
    #[default]
    Unknown,
    NotInstalled,
    Installed,
    Upgradable,
}

impl AppStatus {
    pub const ALL: [AppStatus; 4] = [
        AppStatus::Unknown,
        AppStatus::NotInstalled,
        AppStatus::Installed,
        AppStatus::Upgradable,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AppStatus::Unknown => "UNKNOWN",
            AppStatus::NotInstalled => "NOT_INSTALLED",
            AppStatus::Installed => "INSTALLED",
            AppStatus::Upgradable => "UPGRADABLE",
        }
    }
}

impl fmt::Display for AppStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// -----------------------------------------------------------------------------
// AnsibleRunResult
// -----------------------------------------------------------------------------
/// Output of a single `ansible-playbook` run.
///
/// `data` is the JSON document printed by the `ansible.posix.json` stdout callback.
/// It is parsed from `stdout` on first access and cached for the life of the result.
#[derive(Debug, Clone)]
pub struct AnsibleRunResult {
    pub stdout: String,
    pub stderr: String,
    pub return_code: i32,
    data: OnceCell<Value>,
}

impl AnsibleRunResult {
    pub fn new(stdout: impl Into<String>, stderr: impl Into<String>, return_code: i32) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            return_code,
            data: OnceCell::new(),
        }
    }

    /// Builds a result whose structured payload is already known.
    pub fn with_data(data: Value, return_code: i32) -> Self {
        let result = Self::new(data.to_string(), String::new(), return_code);
        let _ = result.data.set(data);
        result
    }

    pub fn was_successful(&self) -> bool {
        self.return_code == 0
    }

    /// Structured payload of the run, `Value::Null` if stdout holds no JSON document.
    pub fn data(&self) -> &Value {
        self.data.get_or_init(|| parse_run_output(&self.stdout))
    }
}

fn parse_run_output(stdout: &str) -> Value {
    if let Ok(value) = serde_json::from_str::<Value>(stdout) {
        return value;
    }

    // Ansible sometimes prints warnings ahead of the callback output.
    if let (Some(start), Some(end)) = (stdout.find('{'), stdout.rfind('}')) {
        if start < end {
            if let Ok(value) = serde_json::from_str::<Value>(&stdout[start..=end]) {
                return value;
            }
        }
    }

    log::warn!("Ansible output did not contain a JSON document");
    Value::Null
}

// -----------------------------------------------------------------------------
// CollectionInfo
// -----------------------------------------------------------------------------
#[derive(Debug, Clone)]
pub struct CollectionInfo {
    pub name: String,
    pub revision: String,
    pub path: PathBuf,
    pub url: String,
    pub validation_error: Option<String>,
    pub app_count: usize,
    pub last_updated: Option<String>,
}

// -----------------------------------------------------------------------------
// AppInfo
// -----------------------------------------------------------------------------
#[derive(Debug, Clone)]
pub struct AppInfo {
    pub name: String,
    pub collection: String,
    pub description: String,
    pub categories: Vec<String>,
    pub status: AppStatus,
}

// -----------------------------------------------------------------------------
// UpdateReport
// -----------------------------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateReport {
    pub name: String,
    pub old_revision: String,
    pub new_revision: String,
}

impl UpdateReport {
    pub fn is_up_to_date(&self) -> bool {
        self.old_revision == self.new_revision
    }
}

impl fmt::Display for UpdateReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_up_to_date() {
            write!(
                f,
                "{} is already up-to-date at revision {}",
                self.name, self.new_revision
            )
        } else {
            write!(
                f,
                "Updated {} from revision {} to revision {}",
                self.name, self.old_revision, self.new_revision
            )
        }
    }
}

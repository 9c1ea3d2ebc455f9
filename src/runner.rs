//! Runs `ansible-playbook` against localhost.
//!
//! Every run is a fresh child process, so configuration Ansible builds up while it runs
//! never leaks into the next run. Inherited `ANSIBLE_*` variables are stripped for the same
//! reason. There is no timeout: a hanging playbook hangs the caller.
use crate::error::{CatalogError, Result};
use crate::models::AnsibleRunResult;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

const PLAYBOOK_BINARY: &str = "ansible-playbook";
const JSON_STDOUT_CALLBACK: &str = "ansible.posix.json";

pub trait AnsibleRunner: Send + Sync {
    fn run(
        &self,
        working_directory: &Path,
        playbook_path: &Path,
        tags: &[&str],
        check_mode: bool,
    ) -> Result<AnsibleRunResult>;
}

#[derive(Debug, Clone)]
pub struct PlaybookRunner {
    program: PathBuf,
}

impl Default for PlaybookRunner {
    fn default() -> Self {
        Self {
            program: PathBuf::from(PLAYBOOK_BINARY),
        }
    }
}

impl PlaybookRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a different `ansible-playbook` executable, e.g. one inside a virtualenv.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Creates the `ansible-playbook` command for a single run without spawning it.
    pub fn build_command(
        &self,
        working_directory: &Path,
        playbook_path: &Path,
        tags: &[&str],
        check_mode: bool,
    ) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg(playbook_path);
        if !tags.is_empty() {
            cmd.arg("--tags").arg(tags.join(","));
        }
        if check_mode {
            cmd.arg("--check");
        }

        for (key, _) in std::env::vars_os() {
            if key.to_string_lossy().starts_with("ANSIBLE_") {
                cmd.env_remove(key);
            }
        }
        cmd.env("ANSIBLE_STDOUT_CALLBACK", JSON_STDOUT_CALLBACK)
            .current_dir(working_directory)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        cmd
    }
}

impl AnsibleRunner for PlaybookRunner {
    fn run(
        &self,
        working_directory: &Path,
        playbook_path: &Path,
        tags: &[&str],
        check_mode: bool,
    ) -> Result<AnsibleRunResult> {
        log::info!(
            "Running playbook {} in {} (tags: [{}], check mode: {})",
            playbook_path.display(),
            working_directory.display(),
            tags.join(","),
            check_mode
        );

        let output = self
            .build_command(working_directory, playbook_path, tags, check_mode)
            .output()
            .map_err(|e| {
                CatalogError::Runner(format!(
                    "failed to execute {}: {}",
                    self.program.display(),
                    e
                ))
            })?;

        // A process killed by a signal has no exit code.
        let return_code = output.status.code().unwrap_or(-1);
        let result = AnsibleRunResult::new(
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr),
            return_code,
        );

        if result.was_successful() {
            log::debug!("Playbook {} finished", playbook_path.display());
        } else {
            log::warn!(
                "Playbook {} exited with code {}: {}",
                playbook_path.display(),
                return_code,
                result.stderr.trim()
            );
        }

        Ok(result)
    }
}

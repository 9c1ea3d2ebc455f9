//! Git access for app collections, backed by libgit2.
use crate::error::{CatalogError, Result};
use git2::{
    build::{CheckoutBuilder, RepoBuilder},
    BranchType, Cred, CredentialType, FetchOptions, RemoteCallbacks, Repository, ResetType,
};
use std::fs;
use std::path::Path;

const ORIGIN: &str = "origin";
const DEFAULT_BRANCHES: [&str; 2] = ["master", "main"];

pub trait GitClient: Send + Sync {
    fn clone_repo(&self, url: &str, target_dir: &Path) -> Result<()>;
    fn remove_repo(&self, directory: &Path) -> Result<()>;
    fn get_revision(&self, directory: &Path) -> Result<String>;
    fn get_origin_url(&self, directory: &Path) -> Result<String>;
    fn list_revisions(&self, directory: &Path) -> Result<Vec<String>>;
    /// Checks out `revision`, or the head of origin's default branch if none is given.
    fn update(&self, directory: &Path, revision: Option<&str>) -> Result<()>;
    fn is_git_directory(&self, directory: &Path) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Git2Client;

impl Git2Client {
    pub fn new() -> Self {
        Self
    }
}

// Authentication for private repos: ssh agent for SSH remotes, default credentials otherwise.
fn remote_callbacks<'a>() -> RemoteCallbacks<'a> {
    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(|_url, username_from_url, allowed_types| {
        if allowed_types.contains(CredentialType::USERNAME) {
            Cred::username("git")
        } else if allowed_types.contains(CredentialType::SSH_KEY) {
            Cred::ssh_key_from_agent(username_from_url.unwrap_or("git"))
        } else {
            Cred::default()
        }
    });
    callbacks.pack_progress(|_stage, current, total| {
        if total > 0 {
            log::debug!(
                "Transfer progress: {}% ({}/{})",
                (current * 100) / total,
                current,
                total
            );
        }
    });
    callbacks
}

fn fetch_options<'a>() -> FetchOptions<'a> {
    let mut options = FetchOptions::new();
    options.remote_callbacks(remote_callbacks());
    options
}

fn checkout_to(repo: &Repository, revision: &str) -> Result<()> {
    let object = repo
        .revparse_single(revision)
        .or_else(|_| repo.revparse_single(&format!("{}/{}", ORIGIN, revision)))?;
    let commit = object.peel_to_commit()?;

    let mut checkout = CheckoutBuilder::new();
    checkout.force();
    repo.checkout_tree(commit.as_object(), Some(&mut checkout))?;
    repo.set_head_detached(commit.id())?;
    log::info!("Checked out revision {} ({})", revision, commit.id());
    Ok(())
}

fn default_branch(repo: &Repository, directory: &Path) -> Result<&'static str> {
    DEFAULT_BRANCHES
        .into_iter()
        .find(|branch| {
            repo.find_branch(&format!("{}/{}", ORIGIN, branch), BranchType::Remote)
                .is_ok()
        })
        .ok_or_else(|| CatalogError::NoDefaultBranch {
            directory: directory.to_path_buf(),
        })
}

fn pull_default_branch(repo: &Repository, directory: &Path) -> Result<()> {
    let branch_name = default_branch(repo, directory)?;
    let remote_name = format!("{}/{}", ORIGIN, branch_name);
    let remote_commit = repo
        .find_branch(&remote_name, BranchType::Remote)?
        .get()
        .peel_to_commit()?;

    let mut local = match repo.find_branch(branch_name, BranchType::Local) {
        Ok(branch) => branch,
        Err(_) => repo.branch(branch_name, &remote_commit, false)?,
    };
    if local.upstream().is_err() {
        local.set_upstream(Some(&remote_name))?;
    }

    repo.set_head(&format!("refs/heads/{}", branch_name))?;
    let mut checkout = CheckoutBuilder::new();
    checkout.force();
    repo.reset(remote_commit.as_object(), ResetType::Hard, Some(&mut checkout))?;
    log::info!(
        "Reset {} to {} ({})",
        directory.display(),
        remote_name,
        remote_commit.id()
    );
    Ok(())
}

impl GitClient for Git2Client {
    fn clone_repo(&self, url: &str, target_dir: &Path) -> Result<()> {
        log::info!("Cloning repository {} to {}", url, target_dir.display());

        if let Some(parent) = target_dir.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut builder = RepoBuilder::new();
        builder.fetch_options(fetch_options());
        builder.clone(url, target_dir)?;

        log::info!("Successfully cloned repository to {}", target_dir.display());
        Ok(())
    }

    fn remove_repo(&self, directory: &Path) -> Result<()> {
        if directory.exists() {
            fs::remove_dir_all(directory)?;
            log::info!("Removed repository at {}", directory.display());
        }
        Ok(())
    }

    fn get_revision(&self, directory: &Path) -> Result<String> {
        let repo = Repository::open(directory)?;
        let commit = repo.head()?.peel_to_commit()?;
        Ok(commit.id().to_string())
    }

    fn get_origin_url(&self, directory: &Path) -> Result<String> {
        let repo = Repository::open(directory)?;
        let remote = repo.find_remote(ORIGIN)?;
        Ok(remote.url().unwrap_or_default().to_string())
    }

    fn list_revisions(&self, directory: &Path) -> Result<Vec<String>> {
        let repo = Repository::open(directory)?;
        let mut walk = repo.revwalk()?;
        walk.push_head()?;
        walk.map(|oid| oid.map(|id| id.to_string()).map_err(CatalogError::from))
            .collect()
    }

    fn update(&self, directory: &Path, revision: Option<&str>) -> Result<()> {
        let repo = Repository::open(directory)?;

        log::info!("Fetching updates for {}", directory.display());
        repo.find_remote(ORIGIN)?
            .fetch(&[] as &[&str], Some(&mut fetch_options()), None)?;

        match revision {
            Some(revision) => checkout_to(&repo, revision),
            None => pull_default_branch(&repo, directory),
        }
    }

    fn is_git_directory(&self, directory: &Path) -> bool {
        directory.is_dir() && Repository::open(directory).is_ok()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use git2::Signature;
    use std::path::PathBuf;
    use tempfile::TempDir;

    /// Creates a repository with an initial commit on `branch` containing `files`.
    pub(crate) fn init_repo(dir: &Path, branch: &str, files: &[(&str, &str)]) -> Repository {
        let repo = Repository::init(dir).unwrap();
        repo.set_head(&format!("refs/heads/{}", branch)).unwrap();
        commit_files(&repo, files, "initial");
        repo
    }

    pub(crate) fn commit_files(repo: &Repository, files: &[(&str, &str)], message: &str) -> String {
        let workdir = repo.workdir().unwrap().to_path_buf();
        let mut index = repo.index().unwrap();
        for (name, content) in files {
            let path = workdir.join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, content).unwrap();
            index.add_path(Path::new(name)).unwrap();
        }
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let signature = Signature::now("test", "test@example.com").unwrap();
        let parents = match repo.head() {
            Ok(head) => vec![head.peel_to_commit().unwrap()],
            Err(_) => vec![],
        };
        let parent_refs: Vec<&git2::Commit> = parents.iter().collect();
        let oid = repo
            .commit(Some("HEAD"), &signature, &signature, message, &tree, &parent_refs)
            .unwrap();
        oid.to_string()
    }

    fn url_of(path: &Path) -> String {
        path.to_string_lossy().to_string()
    }

    fn setup() -> (TempDir, PathBuf, Repository) {
        let dir = TempDir::new().unwrap();
        let upstream = dir.path().join("upstream");
        let repo = init_repo(&upstream, "main", &[("self-service.yaml", "categories: {}\n")]);
        (dir, upstream, repo)
    }

    #[test]
    fn test_clone_reports_revision_and_origin() {
        let (dir, upstream, upstream_repo) = setup();
        let target = dir.path().join("git").join("demo");
        let client = Git2Client::new();

        client.clone_repo(&url_of(&upstream), &target).unwrap();

        assert!(client.is_git_directory(&target));
        let head = upstream_repo.head().unwrap().peel_to_commit().unwrap().id();
        assert_eq!(client.get_revision(&target).unwrap(), head.to_string());
        assert_eq!(client.get_origin_url(&target).unwrap(), url_of(&upstream));
        assert_eq!(client.list_revisions(&target).unwrap(), vec![head.to_string()]);
    }

    #[test]
    fn test_update_follows_default_branch() {
        let (dir, upstream, upstream_repo) = setup();
        let target = dir.path().join("demo");
        let client = Git2Client::new();
        client.clone_repo(&url_of(&upstream), &target).unwrap();

        let newer = commit_files(&upstream_repo, &[("README.md", "hello")], "second");
        client.update(&target, None).unwrap();

        assert_eq!(client.get_revision(&target).unwrap(), newer);
        assert!(target.join("README.md").exists());
    }

    #[test]
    fn test_update_to_explicit_revision() {
        let (dir, upstream, upstream_repo) = setup();
        let first = upstream_repo
            .head()
            .unwrap()
            .peel_to_commit()
            .unwrap()
            .id()
            .to_string();
        commit_files(&upstream_repo, &[("README.md", "hello")], "second");
        let target = dir.path().join("demo");
        let client = Git2Client::new();
        client.clone_repo(&url_of(&upstream), &target).unwrap();

        client.update(&target, Some(&first)).unwrap();

        assert_eq!(client.get_revision(&target).unwrap(), first);
        assert!(!target.join("README.md").exists());
    }

    #[test]
    fn test_update_without_default_branch_fails() {
        let dir = TempDir::new().unwrap();
        let upstream = dir.path().join("upstream");
        init_repo(&upstream, "develop", &[("a.txt", "a")]);
        let target = dir.path().join("demo");
        let client = Git2Client::new();
        client.clone_repo(&url_of(&upstream), &target).unwrap();

        let result = client.update(&target, None);

        assert!(matches!(result, Err(CatalogError::NoDefaultBranch { .. })));
    }

    #[test]
    fn test_plain_directory_is_not_a_repository() {
        let dir = TempDir::new().unwrap();
        let client = Git2Client::new();
        assert!(!client.is_git_directory(dir.path()));
        assert!(!client.is_git_directory(&dir.path().join("missing")));
    }

    #[test]
    fn test_remove_repo_deletes_directory() {
        let (dir, upstream, _repo) = setup();
        let target = dir.path().join("demo");
        let client = Git2Client::new();
        client.clone_repo(&url_of(&upstream), &target).unwrap();

        client.remove_repo(&target).unwrap();

        assert!(!target.exists());
    }
}

//! Git-backed [`RepositoryAcquirer`].
//!
//! Clones with `git clone --depth 1 --single-branch` into a fresh temporary
//! directory. The directory is owned by the returned [`AcquiredRepository`]
//! and removed when it is dropped.

use tokio::process::Command;

use crate::contract::{AcquiredRepository, AcquisitionError, RepositoryAcquirer};

/// Display name for a repository URL: its last path segment without `.git`.
pub fn repo_display_name(repo_url: &str) -> String {
    let trimmed = repo_url.trim_end_matches('/');
    let last = trimmed
        .rsplit(['/', ':'])
        .next()
        .unwrap_or(trimmed);
    last.strip_suffix(".git").unwrap_or(last).to_string()
}

/// Shallow-clones repositories with the `git` binary on `PATH`.
#[derive(Debug, Clone, Default)]
pub struct GitAcquirer {
    /// Optional branch or tag to check out instead of the default branch.
    reference: Option<String>,
}

impl GitAcquirer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}

#[async_trait::async_trait]
impl RepositoryAcquirer for GitAcquirer {
    async fn acquire(&self, repo_url: &str) -> Result<AcquiredRepository, AcquisitionError> {
        let workspace = tempfile::Builder::new()
            .prefix("conductdoc-")
            .tempdir()
            .map_err(|e| {
                tracing::error!(error = ?e, "Failed to create temporary workspace");
                AcquisitionError::Workspace(e)
            })?;

        let mut command = Command::new("git");
        command
            .arg("clone")
            .arg("--depth")
            .arg("1")
            .arg("--single-branch");
        if let Some(reference) = &self.reference {
            command.arg("--branch").arg(reference);
        }
        command.arg(repo_url).arg(workspace.path());

        tracing::info!(
            repo_url,
            reference = self.reference.as_deref().unwrap_or("HEAD"),
            path = %workspace.path().display(),
            "Cloning repository"
        );

        let output = command.output().await.map_err(|e| {
            tracing::error!(error = ?e, repo_url, "Failed to launch git process");
            AcquisitionError::Spawn(e)
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::error!(
                repo_url,
                status = %output.status,
                stderr = %stderr,
                "Git clone exited with non-zero code"
            );
            return Err(AcquisitionError::Clone {
                url: repo_url.to_string(),
                status: output.status.to_string(),
                stderr,
            });
        }

        tracing::info!(
            repo_url,
            path = %workspace.path().display(),
            "Successfully cloned git repository"
        );
        Ok(AcquiredRepository::new(
            repo_url,
            repo_display_name(repo_url),
            workspace,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_strips_git_suffix() {
        assert_eq!(repo_display_name("https://github.com/psf/requests.git"), "requests");
        assert_eq!(repo_display_name("https://github.com/psf/requests/"), "requests");
        assert_eq!(repo_display_name("git@github.com:psf/black.git"), "black");
    }
}

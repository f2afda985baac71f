//! # contract: seams between the generation pipeline and its collaborators
//!
//! The orchestrator in [`crate::generate`] only talks to the outside world
//! through the traits defined here:
//!
//! - [`RepositoryAcquirer`]: materializes a remote repository as a local tree
//! - [`SynthesisBackend`]: turns one prompt into one block of markdown
//! - [`ArtifactRenderer`]: turns an assembled [`Artifact`] into the bytes that
//!   get persisted
//! - [`ArtifactCache`]: TTL store for finished artifacts
//!
//! ## Mocking & Testing
//! Every trait is annotated for `mockall`, so consumers (and this crate's own
//! tests) can script collaborators deterministically. The mocks are exported
//! behind the `test-export-mocks` feature, which is on by default.
//!
//! ## Error Contracts
//! - Acquisition and render failures are fatal to a run and surface to the caller.
//! - Synthesis failures are per unit; the orchestrator records them and moves on.
//! - Cache reads that fail are treated as misses; cache writes never fail the
//!   caller (see [`ArtifactCache::put`]).

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use mockall::automock;
use tempfile::TempDir;
use thiserror::Error;

use crate::cache::{CacheError, CacheKey, CacheStats, Invalidation};
use crate::model::Artifact;

/// A repository checked out into a temporary directory.
///
/// The checkout is deleted when this value is dropped, so holding it for the
/// duration of a run is enough to guarantee cleanup on every exit path.
#[derive(Debug)]
pub struct AcquiredRepository {
    /// Canonical identity of the repository (its source URL).
    pub url: String,
    /// Human-readable name, e.g. `requests` for `https://github.com/psf/requests.git`.
    pub display_name: String,
    workspace: TempDir,
}

impl AcquiredRepository {
    pub fn new(url: impl Into<String>, display_name: impl Into<String>, workspace: TempDir) -> Self {
        Self {
            url: url.into(),
            display_name: display_name.into(),
            workspace,
        }
    }

    /// Root of the local file tree.
    pub fn root(&self) -> &Path {
        self.workspace.path()
    }
}

#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("failed to prepare a local workspace: {0}")]
    Workspace(#[source] std::io::Error),
    #[error("failed to launch git: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("git clone of {url} exited with {status}: {stderr}")]
    Clone {
        url: String,
        status: String,
        stderr: String,
    },
    #[error("repository tree is unreadable: {0}")]
    Tree(String),
}

/// Trait for materializing a remote repository locally.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait RepositoryAcquirer: Send + Sync {
    /// Fetch a shallow, single-revision copy of `repo_url`.
    async fn acquire(&self, repo_url: &str) -> Result<AcquiredRepository, AcquisitionError>;
}

/// One synthesis call.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisRequest {
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("synthesis backend is not configured: {0}")]
    NotConfigured(String),
    #[error("synthesis request failed: {0}")]
    Request(String),
    #[error("synthesis backend returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("synthesis backend returned no content")]
    EmptyResponse,
    #[error("synthesis call timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// Trait for the natural-language backend. Called once for the repository
/// overview, once per module and once per symbol.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait SynthesisBackend: Send + Sync {
    async fn complete(&self, request: SynthesisRequest) -> Result<String, SynthesisError>;
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template rendering failed: {0}")]
    Template(String),
    #[error("failed to write rendered artifact to {path}: {source}")]
    Persist {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Turns an assembled artifact into its durable representation.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait ArtifactRenderer: Send + Sync {
    /// File extension of the rendered output, without the dot.
    fn extension(&self) -> &'static str {
        "html"
    }

    fn render(&self, artifact: &Artifact) -> Result<Vec<u8>, RenderError>;
}

/// Process-wide store of finished artifacts, keyed by [`CacheKey`].
///
/// Every single call is atomic. All methods take the caller's notion of "now".
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait ArtifactCache: Send + Sync {
    /// Returns the artifact only when `now` is strictly before its expiry.
    /// Expiry is compared at microsecond precision.
    fn get(&self, key: &CacheKey, now: DateTime<Utc>) -> Result<Option<Artifact>, CacheError>;

    /// Inserts or replaces the entry for `key`, expiring at `now + ttl`.
    ///
    /// Storage failures are logged by the implementation and never reach the caller.
    fn put(
        &self,
        key: &CacheKey,
        repo_url: &str,
        artifact: &Artifact,
        now: DateTime<Utc>,
        ttl: Duration,
    );

    /// Deletes entries whose expiry is before `now`, returning how many were removed.
    fn sweep_expired(&self, now: DateTime<Utc>) -> Result<usize, CacheError>;

    fn invalidate(&self, scope: &Invalidation) -> Result<usize, CacheError>;

    fn stats(&self, now: DateTime<Utc>) -> Result<CacheStats, CacheError>;
}

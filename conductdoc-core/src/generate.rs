//! High-level pipeline: turns a repository URL into a cached documentation artifact.
//!
//! A run walks these stages in order, and may end in `FAILED` from any of them:
//!
//! `CHECK_CACHE → ACQUIRE → DISCOVER → EXTRACT → SYNTHESIZE → ASSEMBLE → PERSIST → CACHE_WRITE → DONE`
//!
//! # Major Types
//! - [`Generator`]: owns the injected collaborators and the run configuration
//! - [`GenerationOutcome`]: the artifact plus whether it came from the cache
//! - [`GenerationError`]: the only two failures a caller ever sees
//!
//! # Responsibilities
//! - At most one pipeline per [`CacheKey`] runs at a time. A second request for
//!   the same key waits for the first and then re-reads the cache.
//! - Synthesis failures stay local to their unit and are carried as
//!   [`SynthesisOutcome::Failed`] into the artifact.
//! - The checked-out tree is dropped on every exit path once acquired.
//!
//! # Error Handling
//! - Acquisition (including an unreadable checkout root) and render/persist
//!   failures abort the run; nothing is cached.
//! - A failing cache read counts as a miss; a failing cache write is logged by
//!   the cache and ignored here.
//!
//! # Navigation
//! - Main entrypoint: [`Generator::generate`]

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use futures::stream::{self, StreamExt};
use thiserror::Error;
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

use crate::architecture::architecture_diagram;
use crate::cache::CacheKey;
use crate::config::GeneratorConfig;
use crate::contract::{
    AcquisitionError, ArtifactCache, ArtifactRenderer, RenderError, RepositoryAcquirer,
    SynthesisBackend, SynthesisError, SynthesisRequest,
};
use crate::extract::{extract_repository, SkippedFile};
use crate::model::{
    Artifact, ArtifactMetadata, Module, ModuleDoc, SymbolDoc, SynthesisOutcome,
};
use crate::prompts::{module_prompt, overview_prompt, symbol_prompt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationStage {
    CheckCache,
    Acquire,
    Discover,
    Extract,
    Synthesize,
    Assemble,
    Persist,
    CacheWrite,
    Done,
}

impl fmt::Display for GenerationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GenerationStage::CheckCache => "CHECK_CACHE",
            GenerationStage::Acquire => "ACQUIRE",
            GenerationStage::Discover => "DISCOVER",
            GenerationStage::Extract => "EXTRACT",
            GenerationStage::Synthesize => "SYNTHESIZE",
            GenerationStage::Assemble => "ASSEMBLE",
            GenerationStage::Persist => "PERSIST",
            GenerationStage::CacheWrite => "CACHE_WRITE",
            GenerationStage::Done => "DONE",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("[{stage}] repository could not be acquired: {source}")]
    Acquisition {
        stage: GenerationStage,
        #[source]
        source: AcquisitionError,
    },
    #[error("[{stage}] documentation could not be rendered: {source}")]
    Render {
        stage: GenerationStage,
        #[source]
        source: RenderError,
    },
}

impl GenerationError {
    /// Stage the run was in when it failed.
    pub fn stage(&self) -> GenerationStage {
        match self {
            GenerationError::Acquisition { stage, .. } | GenerationError::Render { stage, .. } => {
                *stage
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub artifact: Artifact,
    pub from_cache: bool,
    /// Files that were discovered but failed extraction. Empty on a cache hit.
    pub skipped: Vec<SkippedFile>,
}

type KeyGate = Arc<tokio::sync::Mutex<()>>;

/// The generation orchestrator.
pub struct Generator {
    acquirer: Arc<dyn RepositoryAcquirer>,
    backend: Arc<dyn SynthesisBackend>,
    renderer: Arc<dyn ArtifactRenderer>,
    cache: Arc<dyn ArtifactCache>,
    config: GeneratorConfig,
    in_flight: Mutex<HashMap<CacheKey, KeyGate>>,
}

impl Generator {
    pub fn new(
        acquirer: Arc<dyn RepositoryAcquirer>,
        backend: Arc<dyn SynthesisBackend>,
        renderer: Arc<dyn ArtifactRenderer>,
        cache: Arc<dyn ArtifactCache>,
        config: GeneratorConfig,
    ) -> Self {
        Self {
            acquirer,
            backend,
            renderer,
            cache,
            config,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<dyn ArtifactCache> {
        &self.cache
    }

    /// Returns the artifact for `repo_url`, from the cache when a live entry exists.
    pub async fn generate(&self, repo_url: &str) -> Result<GenerationOutcome, GenerationError> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("generate", %run_id, repo_url);
        async move {
            let key = CacheKey::for_repository(repo_url);

            // --- Stage: CHECK_CACHE ---
            if let Some(artifact) = self.cached(&key) {
                return Ok(Self::hit(artifact));
            }

            let gate = self.gate_for(&key);
            let result = {
                let _guard = gate.lock().await;
                // Another request may have filled the entry while we waited.
                match self.cached(&key) {
                    Some(artifact) => Ok(Self::hit(artifact)),
                    None => self.run_pipeline(repo_url, &key).await,
                }
            };
            self.release_gate(&key, &gate);

            match &result {
                Ok(outcome) => info!(
                    from_cache = outcome.from_cache,
                    modules = outcome.artifact.modules.len(),
                    "[GENERATE] {}",
                    GenerationStage::Done
                ),
                Err(e) => error!(stage = %e.stage(), error = %e, "[GENERATE][FAILED] Run aborted"),
            }
            result
        }
        .instrument(span)
        .await
    }

    fn hit(artifact: Artifact) -> GenerationOutcome {
        GenerationOutcome {
            artifact,
            from_cache: true,
            skipped: Vec::new(),
        }
    }

    fn cached(&self, key: &CacheKey) -> Option<Artifact> {
        match self.cache.get(key, Utc::now()) {
            Ok(Some(artifact)) => {
                info!(cache_key = %key, "[GENERATE][CHECK_CACHE] Serving cached artifact");
                Some(artifact)
            }
            Ok(None) => {
                debug!(cache_key = %key, "[GENERATE][CHECK_CACHE] Cache miss");
                None
            }
            Err(e) => {
                warn!(cache_key = %key, error = %e, "[GENERATE][CHECK_CACHE] Cache read failed, treating as miss");
                None
            }
        }
    }

    fn gate_for(&self, key: &CacheKey) -> KeyGate {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        in_flight.entry(key.clone()).or_default().clone()
    }

    fn release_gate(&self, key: &CacheKey, gate: &KeyGate) {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // One reference in the map plus ours means nobody else is waiting.
        if Arc::strong_count(gate) <= 2 {
            in_flight.remove(key);
        }
    }

    async fn run_pipeline(
        &self,
        repo_url: &str,
        key: &CacheKey,
    ) -> Result<GenerationOutcome, GenerationError> {
        // --- Stage: ACQUIRE ---
        info!("[GENERATE][ACQUIRE] Fetching repository");
        let repository = self.acquirer.acquire(repo_url).await.map_err(|source| {
            GenerationError::Acquisition {
                stage: GenerationStage::Acquire,
                source,
            }
        })?;
        let repo_name = repository.display_name.clone();

        // --- Stage: DISCOVER + EXTRACT ---
        info!(root = %repository.root().display(), "[GENERATE][EXTRACT] Extracting symbols");
        let report = extract_repository(
            repository.root(),
            &self.config.extraction,
            self.config.extract_concurrency,
        )
        .await
        .map_err(|e| GenerationError::Acquisition {
            stage: GenerationStage::Discover,
            source: AcquisitionError::Tree(e.to_string()),
        })?;
        // The checkout is no longer needed once every file has been read.
        drop(repository);

        // --- Stage: SYNTHESIZE ---
        info!(
            modules = report.modules.len(),
            "[GENERATE][SYNTHESIZE] Requesting documentation"
        );
        let overview_request = overview_prompt(&repo_name, &report.modules);
        let (overview, modules) = self.synthesize(overview_request, &report.modules).await;

        // --- Stage: ASSEMBLE ---
        let file_name = format!("{}_docs.{}", repo_name, self.renderer.extension());
        let mut artifact = Artifact {
            overview,
            architecture: architecture_diagram(&repo_name, &report.modules),
            modules,
            metadata: ArtifactMetadata {
                repo_name: repo_name.clone(),
                repo_url: repo_url.to_string(),
                generated_at: Utc::now(),
                total_modules: report.modules.len(),
                total_files: report.total_files,
            },
            doc_url: None,
        };
        debug!(file_name = %file_name, "[GENERATE][ASSEMBLE] Artifact assembled");

        // --- Stage: PERSIST ---
        let rendered = self
            .renderer
            .render(&artifact)
            .map_err(|source| GenerationError::Render {
                stage: GenerationStage::Persist,
                source,
            })?;
        let path = self.persist(&file_name, &rendered).await?;
        artifact.doc_url = Some(format!("/docs/{file_name}"));
        info!(path = %path.display(), "[GENERATE][PERSIST] Documentation written");

        // --- Stage: CACHE_WRITE ---
        self.cache.put(
            key,
            repo_url,
            &artifact,
            Utc::now(),
            self.config.cache.ttl(),
        );

        Ok(GenerationOutcome {
            artifact,
            from_cache: false,
            skipped: report.skipped,
        })
    }

    async fn persist(&self, file_name: &str, rendered: &[u8]) -> Result<PathBuf, GenerationError> {
        let to_error = |path: PathBuf, source: std::io::Error| GenerationError::Render {
            stage: GenerationStage::Persist,
            source: RenderError::Persist { path, source },
        };
        let dir = &self.config.output_dir;
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| to_error(dir.clone(), e))?;
        let path = dir.join(file_name);
        tokio::fs::write(&path, rendered)
            .await
            .map_err(|e| to_error(path.clone(), e))?;
        Ok(path)
    }

    /// Runs every synthesis unit with bounded concurrency.
    ///
    /// Units are issued as one ordered stream (overview, then each module
    /// followed by its symbols) so results line up with declaration order.
    async fn synthesize(
        &self,
        overview: SynthesisRequest,
        modules: &[Module],
    ) -> (SynthesisOutcome, Vec<ModuleDoc>) {
        let mut units = vec![("overview".to_string(), overview)];
        for module in modules {
            units.push((module.module_name.clone(), module_prompt(module)));
            for symbol in &module.symbols {
                units.push((
                    format!("{}.{}", module.module_name, symbol.name()),
                    symbol_prompt(symbol),
                ));
            }
        }

        let outcomes: Vec<SynthesisOutcome> = stream::iter(
            units
                .into_iter()
                .map(|(unit, request)| async move { self.synthesize_unit(&unit, request).await }),
        )
        .buffered(self.config.synthesis.concurrency.max(1))
        .collect()
        .await;

        let mut outcomes = outcomes.into_iter();
        let overview = outcomes.next().unwrap_or_else(|| {
            SynthesisOutcome::Failed("overview was not synthesized".to_string())
        });
        let docs = modules
            .iter()
            .map(|module| {
                let overview = outcomes.next().unwrap_or_else(|| {
                    SynthesisOutcome::Failed("module was not synthesized".to_string())
                });
                let symbols = module
                    .symbols
                    .iter()
                    .map(|symbol| SymbolDoc {
                        name: symbol.name().to_string(),
                        kind: symbol.kind(),
                        documentation: outcomes.next().unwrap_or_else(|| {
                            SynthesisOutcome::Failed("symbol was not synthesized".to_string())
                        }),
                        symbol: symbol.clone(),
                    })
                    .collect();
                ModuleDoc {
                    module_name: module.module_name.clone(),
                    file_path: module.file_path.clone(),
                    overview,
                    symbols,
                }
            })
            .collect();
        (overview, docs)
    }

    async fn synthesize_unit(&self, unit: &str, request: SynthesisRequest) -> SynthesisOutcome {
        let call = self.backend.complete(request);
        let result = match self.config.synthesis.timeout() {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => result,
                Err(_) => Err(SynthesisError::Timeout(limit)),
            },
            None => call.await,
        };
        match result {
            Ok(text) => {
                debug!(unit, "[GENERATE][SYNTHESIZE] Unit generated");
                SynthesisOutcome::Generated(text)
            }
            Err(e) => {
                warn!(unit, error = %e, "[GENERATE][SYNTHESIZE] Unit failed, keeping placeholder");
                SynthesisOutcome::Failed(e.to_string())
            }
        }
    }
}

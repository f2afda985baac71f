//! HTML rendering of finished artifacts.
//!
//! The page template is embedded at compile time, so the binary needs no
//! template directory at runtime. Synthesized markdown is converted with
//! [`markdown_to_html`] here and nowhere else; failed units become a
//! placeholder paragraph at this point.

use conductdoc_core::architecture::strip_fence;
use conductdoc_core::contract::{ArtifactRenderer, RenderError};
use conductdoc_core::model::{Artifact, SynthesisOutcome};
use pulldown_cmark::{html, Options, Parser};
use serde::Serialize;
use tera::{Context, Tera};

const TPL_DOCS: &str = include_str!("templates/docs.html");
const DOCS_TEMPLATE: &str = "docs.html";

/// Converts markdown (with tables, strikethrough and task lists) to HTML.
pub fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    let parser = Parser::new_ext(markdown, options);
    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

fn outcome_html(outcome: &SynthesisOutcome) -> String {
    markdown_to_html(&outcome.display_text())
}

#[derive(Debug, Serialize)]
struct PageView<'a> {
    metadata: MetadataView<'a>,
    overview: String,
    architecture: &'a str,
    modules: Vec<ModuleView<'a>>,
}

#[derive(Debug, Serialize)]
struct MetadataView<'a> {
    repo_name: &'a str,
    repo_url: &'a str,
    generated_on: String,
    total_modules: usize,
    total_files: usize,
}

#[derive(Debug, Serialize)]
struct ModuleView<'a> {
    module_name: &'a str,
    file_path: &'a str,
    overview: String,
    symbols: Vec<SymbolView<'a>>,
}

#[derive(Debug, Serialize)]
struct SymbolView<'a> {
    name: &'a str,
    kind: &'static str,
    documentation: String,
    failed: bool,
}

impl<'a> PageView<'a> {
    fn from_artifact(artifact: &'a Artifact) -> Self {
        let modules = artifact
            .modules
            .iter()
            .map(|module| ModuleView {
                module_name: &module.module_name,
                file_path: &module.file_path,
                overview: outcome_html(&module.overview),
                symbols: module
                    .symbols
                    .iter()
                    .map(|symbol| SymbolView {
                        name: &symbol.name,
                        kind: symbol.kind.as_str(),
                        documentation: outcome_html(&symbol.documentation),
                        failed: !symbol.documentation.is_generated(),
                    })
                    .collect(),
            })
            .collect();

        PageView {
            metadata: MetadataView {
                repo_name: &artifact.metadata.repo_name,
                repo_url: &artifact.metadata.repo_url,
                generated_on: artifact.metadata.generated_at.format("%Y-%m-%d").to_string(),
                total_modules: artifact.metadata.total_modules,
                total_files: artifact.metadata.total_files,
            },
            overview: outcome_html(&artifact.overview),
            architecture: strip_fence(&artifact.architecture),
            modules,
        }
    }
}

/// [`ArtifactRenderer`] backed by the embedded tera page template.
pub struct HtmlRenderer {
    templates: Tera,
}

impl HtmlRenderer {
    pub fn new() -> Result<Self, RenderError> {
        let mut tera = Tera::default();
        tera.add_raw_template(DOCS_TEMPLATE, TPL_DOCS)
            .map_err(|e| RenderError::Template(format!("failed to load {DOCS_TEMPLATE}: {e}")))?;
        Ok(Self { templates: tera })
    }
}

impl ArtifactRenderer for HtmlRenderer {
    fn extension(&self) -> &'static str {
        "html"
    }

    fn render(&self, artifact: &Artifact) -> Result<Vec<u8>, RenderError> {
        let view = PageView::from_artifact(artifact);
        let context = Context::from_serialize(&view)
            .map_err(|e| RenderError::Template(format!("failed to build context: {e}")))?;
        let page = self.templates.render(DOCS_TEMPLATE, &context).map_err(|e| {
            tracing::error!(error = ?e, repo = %artifact.metadata.repo_name, "Template render failed");
            RenderError::Template(e.to_string())
        })?;
        Ok(page.into_bytes())
    }
}

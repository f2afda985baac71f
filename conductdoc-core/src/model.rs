//! Data model shared by extraction, synthesis, caching and rendering.
//!
//! Everything here is plain data. [`Module`] and [`Symbol`] values are
//! produced once by the extractor and never mutated afterwards; [`Artifact`]
//! is the unit that goes into the cache and out to the renderer, so it is
//! fully serde-serializable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One parameter of a function or method, with its annotation as raw source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub annotation: Option<String>,
}

/// A function definition. Also used for class methods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub docstring: Option<String>,
    pub parameters: Vec<Parameter>,
    pub returns: Option<String>,
    pub line_number: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Class {
    pub name: String,
    pub docstring: Option<String>,
    /// Public methods defined directly in the class body, in declaration order.
    pub methods: Vec<Function>,
    /// Bases written as bare names; attribute or call bases are not recorded.
    pub base_classes: Vec<String>,
    pub line_number: usize,
}

/// An all-uppercase module or class level assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constant {
    pub name: String,
    /// Initializer source text, or [`Constant::UNREPRESENTABLE`].
    pub value: String,
    pub line_number: usize,
}

impl Constant {
    /// Stand-in value when the initializer cannot be rendered as text.
    pub const UNREPRESENTABLE: &'static str = "Complex expression";
}

/// A public structural element of a source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Symbol {
    Class(Class),
    Function(Function),
    Constant(Constant),
}

impl Symbol {
    pub fn name(&self) -> &str {
        match self {
            Symbol::Class(c) => &c.name,
            Symbol::Function(f) => &f.name,
            Symbol::Constant(c) => &c.name,
        }
    }

    pub fn kind(&self) -> SymbolKind {
        match self {
            Symbol::Class(_) => SymbolKind::Class,
            Symbol::Function(_) => SymbolKind::Function,
            Symbol::Constant(_) => SymbolKind::Constant,
        }
    }

    pub fn line_number(&self) -> usize {
        match self {
            Symbol::Class(c) => c.line_number,
            Symbol::Function(f) => f.line_number,
            Symbol::Constant(c) => c.line_number,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Class,
    Function,
    Constant,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Class => "class",
            SymbolKind::Function => "function",
            SymbolKind::Constant => "constant",
        }
    }
}

impl std::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The symbols extracted from one source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    /// Path relative to the repository root, always `/`-separated.
    pub file_path: String,
    /// Dotted module name, e.g. `pkg.sub.mod` for `pkg/sub/mod.py`.
    pub module_name: String,
    pub docstring: Option<String>,
    pub symbols: Vec<Symbol>,
}

/// Result of one synthesis unit.
///
/// Failures are kept as data all the way through assembly and caching; only
/// the renderer turns them into placeholder prose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "content", rename_all = "lowercase")]
pub enum SynthesisOutcome {
    Generated(String),
    Failed(String),
}

impl SynthesisOutcome {
    pub fn is_generated(&self) -> bool {
        matches!(self, SynthesisOutcome::Generated(_))
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            SynthesisOutcome::Failed(reason) => Some(reason),
            SynthesisOutcome::Generated(_) => None,
        }
    }

    /// Markdown to show for this unit: the generated text, or a placeholder
    /// naming the failure.
    pub fn display_text(&self) -> String {
        match self {
            SynthesisOutcome::Generated(text) => text.clone(),
            SynthesisOutcome::Failed(reason) => {
                format!("Error generating documentation: {reason}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolDoc {
    pub name: String,
    pub kind: SymbolKind,
    pub documentation: SynthesisOutcome,
    pub symbol: Symbol,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDoc {
    pub module_name: String,
    pub file_path: String,
    pub overview: SynthesisOutcome,
    pub symbols: Vec<SymbolDoc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub repo_name: String,
    pub repo_url: String,
    pub generated_at: DateTime<Utc>,
    pub total_modules: usize,
    pub total_files: usize,
}

/// The assembled documentation for one repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub overview: SynthesisOutcome,
    /// Mermaid source, fenced as a markdown code block.
    pub architecture: String,
    pub modules: Vec<ModuleDoc>,
    pub metadata: ArtifactMetadata,
    /// Where the rendered page was persisted, e.g. `/docs/repo_docs.html`.
    pub doc_url: Option<String>,
}

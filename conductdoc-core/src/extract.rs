//! Static symbol extraction for Python sources.
//!
//! Each file is parsed on its own with tree-sitter-python and turned into a
//! [`Module`]. The walk covers every depth of the syntax tree in document
//! order:
//!
//! - public `class` definitions become [`Symbol::Class`], with their directly
//!   nested public methods attached (one level, nested classes are not hoisted)
//! - public `def`s become [`Symbol::Function`] wherever they appear, unless
//!   [`ExtractOptions::flatten_nested_functions`] is switched off
//! - plain assignments to ALL-CAPS names become [`Symbol::Constant`]
//!
//! A file that cannot be read, decoded or parsed yields an [`ExtractionError`].
//! [`extract_all`] turns those into skipped-file records so a single bad file
//! never aborts a batch.

use std::path::{Path, PathBuf};

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use tree_sitter::{Node, Parser};

use crate::discover::{discover, DiscoveryError, SOURCE_EXTENSION};
use crate::model::{Class, Constant, Function, Module, Parameter, Symbol};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractOptions {
    /// Surface every public `def` as a module symbol, including methods and
    /// functions defined inside other functions. When false only functions
    /// outside any class or function body are surfaced on their own; methods
    /// still appear on their class.
    pub flatten_nested_functions: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            flatten_nested_functions: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path} is not valid UTF-8")]
    Decode { path: PathBuf },
    #[error("syntax error in {path} at line {line}")]
    Syntax { path: PathBuf, line: usize },
    #[error("parser failure on {path}: {message}")]
    Parser { path: PathBuf, message: String },
    #[error("unexpected syntax tree shape in {path}: {message}")]
    Structure { path: PathBuf, message: String },
}

/// A file that was discovered but did not produce a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of extracting a whole tree.
#[derive(Debug, Clone, Default)]
pub struct ExtractionReport {
    /// Modules with at least one symbol, in discovery order.
    pub modules: Vec<Module>,
    /// Number of source files discovered, whether or not they produced a module.
    pub total_files: usize,
    pub skipped: Vec<SkippedFile>,
}

/// Parses one file into a [`Module`].
pub fn extract(
    path: &Path,
    repo_root: &Path,
    options: &ExtractOptions,
) -> Result<Module, ExtractionError> {
    let source = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::InvalidData {
            ExtractionError::Decode {
                path: path.to_path_buf(),
            }
        } else {
            ExtractionError::Read {
                path: path.to_path_buf(),
                source: e,
            }
        }
    })?;

    let (file_path, module_name) = module_identity(path, repo_root);
    extract_source(&source, path, file_path, module_name, options)
}

/// Parses already-loaded source text. `path` is only used in errors.
pub fn extract_source(
    source: &str,
    path: &Path,
    file_path: String,
    module_name: String,
    options: &ExtractOptions,
) -> Result<Module, ExtractionError> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .map_err(|e| ExtractionError::Parser {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    let tree = parser
        .parse(source, None)
        .ok_or_else(|| ExtractionError::Parser {
            path: path.to_path_buf(),
            message: "parser returned no tree".to_string(),
        })?;

    let root = tree.root_node();
    if root.has_error() {
        let line = first_error_line(root).unwrap_or(root.start_position().row + 1);
        return Err(ExtractionError::Syntax {
            path: path.to_path_buf(),
            line,
        });
    }

    let mut visitor = SymbolVisitor {
        source,
        path,
        options,
        symbols: Vec::new(),
    };
    let docstring = visitor.docstring(root)?;
    visitor.visit(root)?;

    debug!(
        module = %module_name,
        symbols = visitor.symbols.len(),
        "Extracted module"
    );

    Ok(Module {
        file_path,
        module_name,
        docstring,
        symbols: visitor.symbols,
    })
}

/// Extracts every file with bounded parallelism.
///
/// Per-file failures are logged and recorded in [`ExtractionReport::skipped`];
/// modules without symbols are dropped. Output order follows `files`.
pub async fn extract_all(
    files: Vec<PathBuf>,
    repo_root: &Path,
    options: &ExtractOptions,
    concurrency: usize,
) -> ExtractionReport {
    let total_files = files.len();
    let results: Vec<(PathBuf, Result<Module, ExtractionError>)> =
        stream::iter(files.into_iter().map(|path| {
            let root = repo_root.to_path_buf();
            let options = options.clone();
            async move {
                let worker_path = path.clone();
                let joined =
                    tokio::task::spawn_blocking(move || extract(&worker_path, &root, &options))
                        .await;
                let result = joined.unwrap_or_else(|e| {
                    Err(ExtractionError::Structure {
                        path: path.clone(),
                        message: format!("extraction worker failed: {e}"),
                    })
                });
                (path, result)
            }
        }))
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let mut report = ExtractionReport {
        total_files,
        ..Default::default()
    };
    for (path, result) in results {
        match result {
            Ok(module) if module.symbols.is_empty() => {
                debug!(module = %module.module_name, "Dropping module without public symbols");
            }
            Ok(module) => report.modules.push(module),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping file that failed extraction");
                report.skipped.push(SkippedFile {
                    path,
                    reason: e.to_string(),
                });
            }
        }
    }

    info!(
        total_files = report.total_files,
        modules = report.modules.len(),
        skipped = report.skipped.len(),
        "Extraction finished"
    );
    report
}

/// Discovers and extracts a whole repository tree.
pub async fn extract_repository(
    repo_root: &Path,
    options: &ExtractOptions,
    concurrency: usize,
) -> Result<ExtractionReport, DiscoveryError> {
    let files = discover(repo_root)?;
    Ok(extract_all(files, repo_root, options, concurrency).await)
}

/// Relative `/`-separated path and dotted module name for a file.
pub fn module_identity(path: &Path, repo_root: &Path) -> (String, String) {
    let relative = path.strip_prefix(repo_root).unwrap_or(path);
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    let file_path = parts.join("/");
    let dotted = parts.join(".");
    let suffix = format!(".{SOURCE_EXTENSION}");
    let module_name = dotted
        .strip_suffix(&suffix)
        .map(str::to_string)
        .unwrap_or(dotted);
    (file_path, module_name)
}

/// Python's `str.isupper()` on an identifier, minus private names.
pub fn is_constant_name(name: &str) -> bool {
    !name.starts_with('_')
        && name.chars().any(char::is_uppercase)
        && !name.chars().any(char::is_lowercase)
}

fn is_public(name: &str) -> bool {
    !name.starts_with('_')
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Module,
    Class,
    Function,
}

struct SymbolVisitor<'a> {
    source: &'a str,
    path: &'a Path,
    options: &'a ExtractOptions,
    symbols: Vec<Symbol>,
}

impl<'a> SymbolVisitor<'a> {
    /// Pre-order walk over the whole tree in document order.
    ///
    /// The walk is driven by a [`TreeCursor`](tree_sitter::TreeCursor) with an explicit scope stack,
    /// so nesting depth in the source never grows the native stack.
    fn visit(&mut self, root: Node<'_>) -> Result<(), ExtractionError> {
        let mut cursor = root.walk();
        // Scope of the nodes at the cursor's current depth.
        let mut scopes = vec![Scope::Module];

        loop {
            let node = cursor.node();
            let scope = scopes.last().copied().unwrap_or(Scope::Module);
            let child_scope = if node.is_named() {
                self.enter(node, scope)?
            } else {
                scope
            };

            if cursor.goto_first_child() {
                scopes.push(child_scope);
                continue;
            }
            loop {
                if cursor.goto_next_sibling() {
                    break;
                }
                if !cursor.goto_parent() {
                    return Ok(());
                }
                scopes.pop();
            }
        }
    }

    /// Collects whatever `node` declares and returns the scope for its children.
    fn enter(&mut self, node: Node<'_>, scope: Scope) -> Result<Scope, ExtractionError> {
        let child_scope = match node.kind() {
            "class_definition" => {
                if let Some(class) = self.class(node)? {
                    self.symbols.push(Symbol::Class(class));
                }
                Scope::Class
            }
            "function_definition" => {
                if self.options.flatten_nested_functions || scope == Scope::Module {
                    if let Some(function) = self.function(node)? {
                        self.symbols.push(Symbol::Function(function));
                    }
                }
                Scope::Function
            }
            "assignment" => {
                // Chained targets are collected from the outermost assignment.
                let chained = node.parent().map(|p| p.kind()) == Some("assignment");
                if !chained {
                    let constants = self.constants(node)?;
                    self.symbols.extend(constants.into_iter().map(Symbol::Constant));
                }
                scope
            }
            _ => scope,
        };
        Ok(child_scope)
    }

    fn class(&self, node: Node<'_>) -> Result<Option<Class>, ExtractionError> {
        let name = self.field_text(node, "name")?;
        if !is_public(name) {
            return Ok(None);
        }

        let body = node.child_by_field_name("body");
        let docstring = match body {
            Some(body) => self.docstring(body)?,
            None => None,
        };

        let mut methods = Vec::new();
        if let Some(body) = body {
            let statements: Vec<Node<'_>> = body.named_children(&mut body.walk()).collect();
            for statement in statements {
                let definition = match statement.kind() {
                    "function_definition" => Some(statement),
                    "decorated_definition" => statement
                        .child_by_field_name("definition")
                        .filter(|d| d.kind() == "function_definition"),
                    _ => None,
                };
                if let Some(definition) = definition {
                    if let Some(method) = self.function(definition)? {
                        methods.push(method);
                    }
                }
            }
        }

        let mut base_classes = Vec::new();
        if let Some(superclasses) = node.child_by_field_name("superclasses") {
            let bases: Vec<Node<'_>> = superclasses
                .named_children(&mut superclasses.walk())
                .filter(|b| b.kind() == "identifier")
                .collect();
            for base in bases {
                base_classes.push(self.text(base)?.to_string());
            }
        }

        Ok(Some(Class {
            name: name.to_string(),
            docstring,
            methods,
            base_classes,
            line_number: node.start_position().row + 1,
        }))
    }

    fn function(&self, node: Node<'_>) -> Result<Option<Function>, ExtractionError> {
        let name = self.field_text(node, "name")?;
        if !is_public(name) {
            return Ok(None);
        }

        let parameters = match node.child_by_field_name("parameters") {
            Some(params) => self.parameters(params)?,
            None => Vec::new(),
        };
        let returns = match node.child_by_field_name("return_type") {
            Some(ret) => Some(self.text(ret)?.to_string()),
            None => None,
        };
        let docstring = match node.child_by_field_name("body") {
            Some(body) => self.docstring(body)?,
            None => None,
        };

        Ok(Some(Function {
            name: name.to_string(),
            docstring,
            parameters,
            returns,
            line_number: node.start_position().row + 1,
        }))
    }

    /// Named positional parameters; stops at `*`, `*args` or `**kwargs`.
    fn parameters(&self, params: Node<'_>) -> Result<Vec<Parameter>, ExtractionError> {
        let mut out = Vec::new();
        let children: Vec<Node<'_>> = params.named_children(&mut params.walk()).collect();
        for param in children {
            let (name_node, annotation) = match param.kind() {
                "identifier" => (param, None),
                "typed_parameter" => {
                    let Some(inner) = param.named_child(0) else {
                        continue;
                    };
                    if inner.kind() != "identifier" {
                        // `*args: T` or `**kw: T`
                        break;
                    }
                    (inner, param.child_by_field_name("type"))
                }
                "default_parameter" | "typed_default_parameter" => {
                    let Some(inner) = param.child_by_field_name("name") else {
                        continue;
                    };
                    (inner, param.child_by_field_name("type"))
                }
                "list_splat_pattern" | "dictionary_splat_pattern" | "keyword_separator" => break,
                _ => continue,
            };
            let annotation = match annotation {
                Some(a) => Some(self.text(a)?.to_string()),
                None => None,
            };
            out.push(Parameter {
                name: self.text(name_node)?.to_string(),
                annotation,
            });
        }
        Ok(out)
    }

    fn constants(&self, node: Node<'_>) -> Result<Vec<Constant>, ExtractionError> {
        // Annotated assignments are not plain `Assign` statements.
        if node.child_by_field_name("type").is_some() {
            return Ok(Vec::new());
        }

        let mut targets = Vec::new();
        let mut current = node;
        let value = loop {
            if let Some(left) = current.child_by_field_name("left") {
                targets.push(left);
            }
            match current.child_by_field_name("right") {
                Some(right) if right.kind() == "assignment" => current = right,
                Some(right) => break right,
                None => return Ok(Vec::new()),
            }
        };

        let value_text = if value.has_error() {
            Constant::UNREPRESENTABLE.to_string()
        } else {
            self.text(value)
                .map(str::to_string)
                .unwrap_or_else(|_| Constant::UNREPRESENTABLE.to_string())
        };

        let mut constants = Vec::new();
        for target in targets {
            if target.kind() != "identifier" {
                continue;
            }
            let name = self.text(target)?;
            if is_constant_name(name) {
                constants.push(Constant {
                    name: name.to_string(),
                    value: value_text.clone(),
                    line_number: node.start_position().row + 1,
                });
            }
        }
        Ok(constants)
    }

    /// Docstring of a module root or a `block` body.
    fn docstring(&self, body: Node<'_>) -> Result<Option<String>, ExtractionError> {
        let first = body
            .named_children(&mut body.walk())
            .find(|n| n.kind() != "comment");
        let Some(statement) = first else {
            return Ok(None);
        };
        if statement.kind() != "expression_statement" || statement.named_child_count() != 1 {
            return Ok(None);
        }
        let Some(literal) = statement.named_child(0) else {
            return Ok(None);
        };
        // Implicit concatenation is a single str constant, so it documents too.
        let parts: Vec<Node<'_>> = match literal.kind() {
            "string" => vec![literal],
            "concatenated_string" => literal.named_children(&mut literal.walk()).collect(),
            _ => return Ok(None),
        };

        let mut raw = String::new();
        for part in parts {
            if part.kind() != "string" {
                return Ok(None);
            }
            let interpolated = part
                .named_children(&mut part.walk())
                .any(|child| child.kind() == "interpolation");
            if interpolated {
                return Ok(None);
            }
            match string_literal_body(self.text(part)?) {
                Some(body) => raw.push_str(&body),
                None => return Ok(None),
            }
        }
        Ok(Some(clean_docstring(&raw)))
    }

    fn field_text(&self, node: Node<'_>, field: &str) -> Result<&'a str, ExtractionError> {
        let child = node
            .child_by_field_name(field)
            .ok_or_else(|| ExtractionError::Structure {
                path: self.path.to_path_buf(),
                message: format!("`{}` node without `{field}` at line {}", node.kind(), node.start_position().row + 1),
            })?;
        self.text(child)
    }

    fn text(&self, node: Node<'_>) -> Result<&'a str, ExtractionError> {
        self.source
            .get(node.byte_range())
            .ok_or_else(|| ExtractionError::Structure {
                path: self.path.to_path_buf(),
                message: format!("node range {:?} outside source", node.byte_range()),
            })
    }
}

/// Line of the first ERROR or MISSING node in document order.
fn first_error_line(root: Node<'_>) -> Option<usize> {
    let mut cursor = root.walk();
    loop {
        let node = cursor.node();
        if node.is_error() || node.is_missing() {
            return Some(node.start_position().row + 1);
        }
        // Only subtrees that contain an error are worth descending into.
        if node.has_error() && cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return None;
            }
        }
    }
}

/// Value of a str literal: prefix and quotes removed, escapes decoded unless
/// the literal is raw. Bytes and f-strings do not count as docstrings.
fn string_literal_body(literal: &str) -> Option<String> {
    let quote_at = literal.find(['"', '\''])?;
    let prefix = literal[..quote_at].to_ascii_lowercase();
    if prefix.contains('b') || prefix.contains('f') {
        return None;
    }
    let quoted = &literal[quote_at..];
    for delimiter in ["\"\"\"", "'''", "\"", "'"] {
        if quoted.len() >= 2 * delimiter.len()
            && quoted.starts_with(delimiter)
            && quoted.ends_with(delimiter)
        {
            let body = &quoted[delimiter.len()..quoted.len() - delimiter.len()];
            return Some(if prefix.contains('r') {
                body.to_string()
            } else {
                decode_escapes(body)
            });
        }
    }
    None
}

/// Decodes Python str escapes. Unknown escapes keep their backslash, as
/// Python does; `\N{...}` is left as written.
fn decode_escapes(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(escape) = chars.next() else {
            out.push('\\');
            break;
        };
        match escape {
            '\n' => {}
            '\r' => {
                // Line continuation written with CRLF.
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
            }
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'a' => out.push('\u{07}'),
            'b' => out.push('\u{08}'),
            'f' => out.push('\u{0C}'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'v' => out.push('\u{0B}'),
            '0'..='7' => {
                let mut value = escape.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match chars.peek().and_then(|d| d.to_digit(8)) {
                        Some(digit) => {
                            value = value * 8 + digit;
                            chars.next();
                        }
                        None => break,
                    }
                }
                out.push(char::from_u32(value).unwrap_or(char::REPLACEMENT_CHARACTER));
            }
            'x' | 'u' | 'U' => {
                let width = match escape {
                    'x' => 2,
                    'u' => 4,
                    _ => 8,
                };
                let digits: String = chars.clone().take(width).collect();
                let decoded = if digits.len() == width {
                    u32::from_str_radix(&digits, 16).ok().and_then(char::from_u32)
                } else {
                    None
                };
                match decoded {
                    Some(ch) => {
                        out.push(ch);
                        for _ in 0..width {
                            chars.next();
                        }
                    }
                    None => {
                        out.push('\\');
                        out.push(escape);
                    }
                }
            }
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }
    out
}

/// `str.expandtabs()` with the default tab size of 8.
fn expand_tabs(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut column = 0;
    for c in line.chars() {
        if c == '\t' {
            let pad = 8 - column % 8;
            out.push_str(&" ".repeat(pad));
            column += pad;
        } else {
            out.push(c);
            column += 1;
        }
    }
    out
}

/// Same normalisation as `inspect.cleandoc`.
fn clean_docstring(raw: &str) -> String {
    let expanded: Vec<String> = raw.lines().map(expand_tabs).collect();
    let lines: Vec<&str> = expanded.iter().map(String::as_str).collect();

    let margin = lines
        .iter()
        .skip(1)
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start_matches(' ').len())
        .min()
        .unwrap_or(0);

    let mut cleaned: Vec<String> = Vec::with_capacity(lines.len());
    for (i, line) in lines.iter().enumerate() {
        if i == 0 {
            cleaned.push(line.trim_start().to_string());
        } else {
            let cut = margin.min(line.len() - line.trim_start_matches(' ').len());
            cleaned.push(line[cut..].trim_end().to_string());
        }
    }
    while cleaned.first().is_some_and(|l| l.trim().is_empty()) {
        cleaned.remove(0);
    }
    while cleaned.last().is_some_and(|l| l.trim().is_empty()) {
        cleaned.pop();
    }
    cleaned.join("\n")
}

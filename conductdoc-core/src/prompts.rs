//! Prompt construction for each synthesis unit.
//!
//! Each builder returns a complete [`SynthesisRequest`], so token limits and
//! temperature live next to the text they apply to.

use crate::contract::SynthesisRequest;
use crate::model::{Module, Symbol};

pub const OVERVIEW_MAX_TOKENS: u32 = 1500;
pub const MODULE_MAX_TOKENS: u32 = 2000;
pub const SYMBOL_MAX_TOKENS: u32 = 1000;
pub const TEMPERATURE: f32 = 0.3;

/// Symbols listed per module in the repository overview prompt.
const OVERVIEW_SYMBOLS_PER_MODULE: usize = 5;

fn or_missing(text: Option<&str>, missing: &'static str) -> String {
    text.map(str::to_string).unwrap_or_else(|| missing.to_string())
}

/// Repository-wide overview.
pub fn overview_prompt(repo_name: &str, modules: &[Module]) -> SynthesisRequest {
    let structure = modules
        .iter()
        .map(|module| {
            let names: Vec<&str> = module
                .symbols
                .iter()
                .take(OVERVIEW_SYMBOLS_PER_MODULE)
                .map(Symbol::name)
                .collect();
            format!("- {}: {}", module.module_name, names.join(", "))
        })
        .collect::<Vec<_>>()
        .join("\n");

    let prompt = format!(
        "Generate a comprehensive overview documentation for the Python repository '{repo_name}'.\n\n\
         Repository contains {count} modules with the following structure:\n{structure}\n\n\
         Please provide:\n\
         1. A clear, engaging summary of what this repository does\n\
         2. Main purpose and use cases\n\
         3. Key components and their roles\n\
         4. Getting started guide\n\
         5. Installation instructions (if applicable)\n\n\
         Write in a professional, user-friendly tone that would help both developers and \
         non-technical users understand the project.\n\
         Use markdown formatting for better readability.",
        count = modules.len(),
    );

    SynthesisRequest {
        prompt,
        max_tokens: OVERVIEW_MAX_TOKENS,
        temperature: TEMPERATURE,
    }
}

/// Overview of a single module.
pub fn module_prompt(module: &Module) -> SynthesisRequest {
    let symbols = module
        .symbols
        .iter()
        .map(|symbol| format!("- {}: {}", symbol.kind(), symbol.name()))
        .collect::<Vec<_>>()
        .join("\n");

    let prompt = format!(
        "Generate detailed documentation for the Python module '{name}' located at '{path}'.\n\n\
         Module docstring: {docstring}\n\n\
         The module contains the following symbols:\n{symbols}\n\n\
         For each symbol, please provide:\n\
         1. A clear explanation of what it does\n\
         2. Parameters and return values (for functions/methods)\n\
         3. Usage examples where appropriate\n\
         4. Important notes or considerations\n\n\
         Write in markdown format with proper headers and code blocks.\n\
         Make it comprehensive but easy to understand.",
        name = module.module_name,
        path = module.file_path,
        docstring = or_missing(module.docstring.as_deref(), "No docstring available"),
    );

    SynthesisRequest {
        prompt,
        max_tokens: MODULE_MAX_TOKENS,
        temperature: TEMPERATURE,
    }
}

/// Documentation for one symbol. The wording depends on the symbol kind.
pub fn symbol_prompt(symbol: &Symbol) -> SynthesisRequest {
    let prompt = match symbol {
        Symbol::Class(class) => {
            let methods = class
                .methods
                .iter()
                .map(|m| format!("- {}: {}", m.name, or_missing(m.docstring.as_deref(), "No docstring")))
                .collect::<Vec<_>>()
                .join("\n");
            format!(
                "Generate detailed documentation for the Python class '{name}'.\n\n\
                 Class docstring: {docstring}\n\
                 Base classes: {bases}\n\n\
                 Methods:\n{methods}\n\n\
                 Please provide:\n\
                 1. What this class represents and its purpose\n\
                 2. Key functionality and use cases\n\
                 3. Simple usage example\n\
                 4. Important notes about initialization or usage\n\n\
                 Format as markdown with code examples.",
                name = class.name,
                docstring = or_missing(class.docstring.as_deref(), "No docstring available"),
                bases = class.base_classes.join(", "),
            )
        }
        Symbol::Function(function) => {
            let parameters = function
                .parameters
                .iter()
                .map(|p| format!("- {}: {}", p.name, p.annotation.as_deref().unwrap_or("Any")))
                .collect::<Vec<_>>()
                .join("\n");
            format!(
                "Generate detailed documentation for the Python function '{name}'.\n\n\
                 Docstring: {docstring}\n\n\
                 Parameters:\n{parameters}\n\n\
                 Returns: {returns}\n\n\
                 Please provide:\n\
                 1. What this function does\n\
                 2. Parameter descriptions\n\
                 3. Return value description\n\
                 4. Usage example\n\
                 5. Any important notes or exceptions\n\n\
                 Format as markdown with code examples.",
                name = function.name,
                docstring = or_missing(function.docstring.as_deref(), "No docstring available"),
                returns = or_missing(function.returns.as_deref(), "Not specified"),
            )
        }
        Symbol::Constant(constant) => format!(
            "Generate documentation for the Python constant '{name}'.\n\n\
             Value: {value}\n\n\
             Please provide:\n\
             1. What this constant represents\n\
             2. Its purpose and usage\n\
             3. Simple usage example\n\n\
             Format as markdown.",
            name = constant.name,
            value = constant.value,
        ),
    };

    SynthesisRequest {
        prompt,
        max_tokens: SYMBOL_MAX_TOKENS,
        temperature: TEMPERATURE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Constant, Function, Parameter};

    fn module() -> Module {
        Module {
            file_path: "pkg/util.py".into(),
            module_name: "pkg.util".into(),
            docstring: None,
            symbols: vec![
                Symbol::Function(Function {
                    name: "load".into(),
                    docstring: Some("Load things.".into()),
                    parameters: vec![Parameter {
                        name: "path".into(),
                        annotation: Some("str".into()),
                    }],
                    returns: Some("bytes".into()),
                    line_number: 3,
                }),
                Symbol::Constant(Constant {
                    name: "LIMIT".into(),
                    value: "10".into(),
                    line_number: 1,
                }),
            ],
        }
    }

    #[test]
    fn overview_lists_modules_and_symbols() {
        let request = overview_prompt("demo", &[module()]);
        assert!(request.prompt.contains("'demo'"));
        assert!(request.prompt.contains("1 modules"));
        assert!(request.prompt.contains("- pkg.util: load, LIMIT"));
        assert_eq!(request.max_tokens, OVERVIEW_MAX_TOKENS);
    }

    #[test]
    fn module_prompt_notes_missing_docstring() {
        let request = module_prompt(&module());
        assert!(request.prompt.contains("No docstring available"));
        assert!(request.prompt.contains("- constant: LIMIT"));
        assert_eq!(request.max_tokens, MODULE_MAX_TOKENS);
    }

    #[test]
    fn function_prompt_includes_signature() {
        let m = module();
        let request = symbol_prompt(&m.symbols[0]);
        assert!(request.prompt.contains("- path: str"));
        assert!(request.prompt.contains("Returns: bytes"));
        assert_eq!(request.max_tokens, SYMBOL_MAX_TOKENS);
        assert_eq!(request.temperature, TEMPERATURE);
    }
}

use chrono::{TimeZone, Utc};
use conductdoc::render::{markdown_to_html, HtmlRenderer};
use conductdoc_core::architecture::architecture_diagram;
use conductdoc_core::contract::ArtifactRenderer;
use conductdoc_core::model::{
    Artifact, ArtifactMetadata, Constant, Module, ModuleDoc, Symbol, SymbolDoc, SymbolKind,
    SynthesisOutcome,
};

fn artifact() -> Artifact {
    let constant = Constant {
        name: "MAX".into(),
        value: "10".into(),
        line_number: 1,
    };
    let module = Module {
        file_path: "pkg/limits.py".into(),
        module_name: "pkg.limits".into(),
        docstring: None,
        symbols: vec![Symbol::Constant(constant.clone())],
    };
    Artifact {
        overview: SynthesisOutcome::Generated("# Demo\n\nA **small** library.".into()),
        architecture: architecture_diagram("demo", std::slice::from_ref(&module)),
        modules: vec![ModuleDoc {
            module_name: module.module_name.clone(),
            file_path: module.file_path.clone(),
            overview: SynthesisOutcome::Generated("Limits <b>module</b>".into()),
            symbols: vec![SymbolDoc {
                name: "MAX".into(),
                kind: SymbolKind::Constant,
                documentation: SynthesisOutcome::Failed("rate limited".into()),
                symbol: Symbol::Constant(constant),
            }],
        }],
        metadata: ArtifactMetadata {
            repo_name: "demo".into(),
            repo_url: "https://github.com/example/demo".into(),
            generated_at: Utc.with_ymd_and_hms(2024, 3, 9, 8, 30, 0).unwrap(),
            total_modules: 1,
            total_files: 4,
        },
        doc_url: None,
    }
}

#[test]
fn markdown_is_converted_to_html() {
    let html = markdown_to_html("# Title\n\n| a | b |\n|---|---|\n| 1 | 2 |\n\n~~old~~");
    assert!(html.contains("<h1>Title</h1>"));
    assert!(html.contains("<table>"));
    assert!(html.contains("<del>old</del>"));
}

#[test]
fn page_contains_every_section() {
    let renderer = HtmlRenderer::new().expect("embedded template should load");
    let bytes = renderer.render(&artifact()).expect("render should succeed");
    let page = String::from_utf8(bytes).unwrap();

    assert!(page.contains("<title>demo - Documentation</title>"));
    assert!(page.contains("Generated on 2024-03-09 | 1 modules | 4 files"));
    assert!(page.contains(r##"<a href="#pkg.limits">pkg.limits</a>"##));
    assert!(page.contains("<h1>Demo</h1>"));
    assert!(page.contains("<strong>small</strong>"));
    // Mermaid source without its markdown fence.
    assert!(page.contains("graph TD"));
    assert!(!page.contains("```mermaid"));
    assert!(page.contains("Constant: MAX"));
}

#[test]
fn failed_units_render_as_placeholders() {
    let renderer = HtmlRenderer::new().unwrap();
    let page = String::from_utf8(renderer.render(&artifact()).unwrap()).unwrap();

    assert!(page.contains("Error generating documentation: rate limited"));
    assert!(page.contains(r#"class="symbol failed""#));
    assert_eq!(renderer.extension(), "html");
}

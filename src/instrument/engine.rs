//! Tracking-call injection for JavaScript/TypeScript sources
//!
//! The engine parses a file, injects an import of the tracking entry point,
//! and prepends a tracking call to every named function body. All rewrites
//! are byte-offset splices against the original text, so reported positions
//! always refer to the source as the author wrote it.

use crate::core::error::{Error, Result};
use crate::instrument::identify;
use crate::instrument::inventory::FunctionRecord;
use crate::parse::Language;
use crate::project::ModuleType;
use crate::runtime::TRACK_FUNCTION;
use crate::sourcemap::SourceMap;
use std::path::Path;
use tracing::debug;
use tree_sitter::{Node, Parser};

/// Import specifier used when the caller does not provide one
pub const DEFAULT_RUNTIME_SPECIFIER: &str = "sigrun/runtime";

/// Result of instrumenting one source file
#[derive(Debug)]
pub struct InstrumentedSource {
    /// Rewritten source text
    pub code: String,
    /// Functions discovered in this pass
    pub functions: Vec<FunctionRecord>,
    /// Line map from the rewritten text back to the original
    pub map: Option<SourceMap>,
}

/// A pending text insertion against the original source
#[derive(Debug)]
struct Edit {
    offset: usize,
    text: String,
}

/// Instruments a single file's source text
pub struct Instrumenter {
    parser: Parser,
    language: Language,
    specifier: String,
    emit_map: bool,
}

impl Instrumenter {
    /// Create an instrumenter for the language detected from a file path
    pub fn for_path(path: &Path) -> Result<Self> {
        let language = Language::from_path(path);
        let grammar = language
            .tree_sitter_language()
            .ok_or_else(|| Error::UnsupportedFile {
                path: path.to_path_buf(),
            })?;

        let mut parser = Parser::new();
        parser
            .set_language(&grammar)
            .map_err(|e| Error::ParseError {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        Ok(Self {
            parser,
            language,
            specifier: DEFAULT_RUNTIME_SPECIFIER.to_string(),
            emit_map: false,
        })
    }

    /// Set the import specifier injected for the tracking entry point
    pub fn with_specifier(mut self, specifier: &str) -> Self {
        self.specifier = specifier.to_string();
        self
    }

    /// Emit a line map alongside the rewritten source
    pub fn with_source_map(mut self, emit: bool) -> Self {
        self.emit_map = emit;
        self
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// Rewrite `source` so every named function reports its execution
    ///
    /// `file` is the label functions are recorded under and becomes part of
    /// each function id. Declaration files and ambient/host-global files are
    /// returned unchanged; files that fail to parse are errors.
    pub fn instrument(
        &mut self,
        source: &str,
        file: &str,
        module_type: ModuleType,
    ) -> Result<InstrumentedSource> {
        if is_declaration_file(file) {
            debug!(file, "skipping declaration file");
            return Ok(unchanged(source));
        }

        let tree = self
            .parser
            .parse(source, None)
            .ok_or_else(|| Error::ParseError {
                path: file.into(),
                message: "parser produced no tree".to_string(),
            })?;
        let root = tree.root_node();

        if root.has_error() {
            return Err(Error::ParseError {
                path: file.into(),
                message: "source contains syntax errors".to_string(),
            });
        }

        if should_skip_file(root, source) {
            debug!(file, "skipping ambient or host-global file");
            return Ok(unchanged(source));
        }

        let mut edits = Vec::new();
        let mut functions = Vec::new();
        let mut inserted_line = None;

        if !has_tracker_import(root, source) {
            let offset = import_insert_offset(root, source);
            let statement = import_statement(module_type, &self.specifier);
            let at_line_start = offset == 0 || source[..offset].ends_with('\n');
            let line = count_lines(&source[..offset]);

            inserted_line = Some(if at_line_start { line } else { line + 1 });
            edits.push(Edit {
                offset,
                text: if at_line_start {
                    format!("{}\n", statement)
                } else {
                    format!("\n{}", statement)
                },
            });
        }

        visit(root, source, file, &mut edits, &mut functions);

        let code = apply_edits(source, edits);
        let map = if self.emit_map {
            Some(SourceMap::from_line_shift(
                file,
                count_lines(&code) + 1,
                inserted_line,
            ))
        } else {
            None
        };

        Ok(InstrumentedSource {
            code,
            functions,
            map,
        })
    }
}

fn unchanged(source: &str) -> InstrumentedSource {
    InstrumentedSource {
        code: source.to_string(),
        functions: Vec::new(),
        map: None,
    }
}

/// Walk the tree and collect edits for every function-like node
fn visit(
    node: Node,
    source: &str,
    file: &str,
    edits: &mut Vec<Edit>,
    functions: &mut Vec<FunctionRecord>,
) {
    if identify::is_function_node(node.kind()) {
        instrument_function(node, source, file, edits, functions);
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        visit(child, source, file, edits, functions);
    }
}

fn instrument_function(
    node: Node,
    source: &str,
    file: &str,
    edits: &mut Vec<Edit>,
    functions: &mut Vec<FunctionRecord>,
) {
    // Anonymous functions are not tracked
    let Some(name) = identify::resolve_name(node, source) else {
        return;
    };

    // Overload signatures and the like have no body to instrument
    let Some(body) = node.child_by_field_name("body") else {
        return;
    };

    if body.kind() == "statement_block" && starts_with_tracking_call(body, source) {
        return;
    }

    let position = node.start_position();
    let line = position.row + 1;
    let column = position.column;
    let id = format!("{}:{}:{}:{}", name, file, line, column);
    let call = format!("{}({});", TRACK_FUNCTION, js_string(&id));

    functions.push(FunctionRecord {
        id,
        name,
        file: file.to_string(),
        line,
        column,
        kind: identify::function_kind(&node),
    });

    if body.kind() == "statement_block" {
        edits.push(Edit {
            offset: body.start_byte() + 1,
            text: format!(" {}", call),
        });
    } else {
        // Expression-bodied arrow: wrap in a block returning the expression
        edits.push(Edit {
            offset: body.start_byte(),
            text: format!("{{ {} return ", call),
        });
        edits.push(Edit {
            offset: body.end_byte(),
            text: "; }".to_string(),
        });
    }
}

/// Apply insertions back-to-front so earlier offsets stay valid
///
/// Ties keep creation order: an outer function's closer is applied before an
/// inner one at the same offset, which nests the inner text inside it.
fn apply_edits(source: &str, mut edits: Vec<Edit>) -> String {
    edits.sort_by(|a, b| b.offset.cmp(&a.offset));

    let mut code = source.to_string();
    for edit in edits {
        code.insert_str(edit.offset, &edit.text);
    }
    code
}

/// Check whether a block body already begins with a tracking call
fn starts_with_tracking_call(body: Node, source: &str) -> bool {
    let mut cursor = body.walk();
    for statement in body.named_children(&mut cursor) {
        if statement.kind() == "comment" {
            continue;
        }
        if statement.kind() != "expression_statement" {
            return false;
        }
        let Some(expression) = statement.named_child(0) else {
            return false;
        };
        if expression.kind() != "call_expression" {
            return false;
        }
        let Some(callee) = expression.child_by_field_name("function") else {
            return false;
        };
        if &source[callee.byte_range()] != TRACK_FUNCTION {
            return false;
        }
        let Some(arguments) = expression.child_by_field_name("arguments") else {
            return false;
        };
        let mut args = arguments.walk();
        let argument_kinds: Vec<&str> =
            arguments.named_children(&mut args).map(|a| a.kind()).collect();
        return argument_kinds == ["string"];
    }
    false
}

/// Check for an existing top-level import or require of the entry point
fn has_tracker_import(root: Node, source: &str) -> bool {
    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        match child.kind() {
            "import_statement" => {
                if source[child.byte_range()].contains(TRACK_FUNCTION) {
                    return true;
                }
            }
            "lexical_declaration" | "variable_declaration" => {
                if is_require_declaration(child, source)
                    && source[child.byte_range()].contains(TRACK_FUNCTION)
                {
                    return true;
                }
            }
            _ => {}
        }
    }
    false
}

/// Byte offset where the entry-point import belongs
///
/// After the hash-bang line, the directive prologue, and the leading
/// import/require block; before any comment annotating the first real
/// statement.
fn import_insert_offset(root: Node, source: &str) -> usize {
    let mut offset = 0;
    let mut in_prologue = true;
    let mut pending_comment: Option<usize> = None;

    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        match child.kind() {
            "comment" => {
                if starts_own_line(child.start_byte(), source) {
                    if pending_comment.is_none() {
                        pending_comment = Some(child.start_byte());
                    }
                } else {
                    // A trailing comment belongs to the statement before it
                    offset = child.end_byte();
                }
                continue;
            }
            "hash_bang_line" => {}
            "expression_statement" if in_prologue && is_directive(child) => {}
            "import_statement" => {
                in_prologue = false;
            }
            "export_statement" if child.child_by_field_name("source").is_some() => {
                // Re-exports load a module and belong to the import block
                in_prologue = false;
            }
            "lexical_declaration" | "variable_declaration"
                if is_require_declaration(child, source) =>
            {
                in_prologue = false;
            }
            _ => {
                return pending_comment.unwrap_or_else(|| child.start_byte());
            }
        }
        offset = child.end_byte();
        pending_comment = None;
    }

    offset
}

/// Check whether only whitespace precedes a byte offset on its line
fn starts_own_line(byte: usize, source: &str) -> bool {
    let line_start = source[..byte].rfind('\n').map_or(0, |i| i + 1);
    source[line_start..byte].trim().is_empty()
}

/// Directive prologue statements are bare string expressions
fn is_directive(node: Node) -> bool {
    node.named_child_count() == 1
        && node
            .named_child(0)
            .map(|c| c.kind() == "string")
            .unwrap_or(false)
}

/// Check for a `const { ... } = require(...)` style declaration
fn is_require_declaration(node: Node, source: &str) -> bool {
    let mut cursor = node.walk();
    for declarator in node.named_children(&mut cursor) {
        if declarator.kind() != "variable_declarator" {
            continue;
        }
        let Some(value) = declarator.child_by_field_name("value") else {
            continue;
        };
        if value.kind() != "call_expression" {
            continue;
        }
        if let Some(callee) = value.child_by_field_name("function") {
            if &source[callee.byte_range()] == "require" {
                return true;
            }
        }
    }
    false
}

/// The import/require statement for the configured module system
fn import_statement(module_type: ModuleType, specifier: &str) -> String {
    match module_type {
        ModuleType::EsModule => {
            format!("import {{ {} }} from {};", TRACK_FUNCTION, js_string(specifier))
        }
        ModuleType::CommonJs => {
            format!("const {{ {} }} = require({});", TRACK_FUNCTION, js_string(specifier))
        }
    }
}

fn is_declaration_file(file: &str) -> bool {
    file.ends_with(".d.ts") || file.ends_with(".d.mts") || file.ends_with(".d.cts")
}

/// Ambient and host-global files cannot run under Node once instrumented
///
/// Module-shaped files are never skipped: real imports mean the file is
/// ordinary program code whatever else it mentions.
fn should_skip_file(root: Node, source: &str) -> bool {
    if is_module_shaped(root, source) {
        return false;
    }

    has_ambient_declaration(root)
        || has_reference_directive(root, source)
        || references_host_globals(root, source)
}

fn is_module_shaped(root: Node, source: &str) -> bool {
    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        match child.kind() {
            "import_statement" | "export_statement" => return true,
            "lexical_declaration" | "variable_declaration" => {
                if is_require_declaration(child, source) {
                    return true;
                }
            }
            _ => {}
        }
    }
    false
}

fn has_ambient_declaration(root: Node) -> bool {
    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        if child.kind() == "ambient_declaration" {
            return true;
        }
    }
    false
}

/// Leading `/// <reference ... />` compiler directives
fn has_reference_directive(root: Node, source: &str) -> bool {
    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        match child.kind() {
            "hash_bang_line" => continue,
            "comment" => {
                let text = &source[child.byte_range()];
                if text.starts_with("///") && text.contains("<reference") {
                    return true;
                }
            }
            _ => return false,
        }
    }
    false
}

fn references_host_globals(node: Node, source: &str) -> bool {
    if node.kind() == "identifier" {
        let text = &source[node.byte_range()];
        if text == "Bun" || text == "Deno" {
            return true;
        }
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if references_host_globals(child, source) {
            return true;
        }
    }
    false
}

/// Quote a value as a JavaScript string literal
fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

fn count_lines(text: &str) -> usize {
    text.bytes().filter(|b| *b == b'\n').count()
}

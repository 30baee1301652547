//! Function identity resolution
//!
//! Maps function-like syntax nodes to the stable (name, kind) pairs used in
//! function ids. Anonymous functions resolve to no name and are skipped by
//! the instrumentation engine.

use serde::{Deserialize, Serialize};
use tree_sitter::Node;

/// Upper bound on the upward walk through wrapper expressions
///
/// Deep enough for stacked decorator-style calls like
/// `const X = memo(forwardRef(() => {}))`.
const MAX_NAME_HOPS: usize = 8;

/// Function classification carried through the inventory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FunctionKind {
    Function,
    Method,
    Arrow,
}

impl FunctionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FunctionKind::Function => "function",
            FunctionKind::Method => "method",
            FunctionKind::Arrow => "arrow",
        }
    }
}

impl std::fmt::Display for FunctionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Check if a node kind is a function-like definition with a body
pub fn is_function_node(kind: &str) -> bool {
    matches!(
        kind,
        "function_declaration"
            | "generator_function_declaration"
            | "function_expression"
            | "generator_function"
            | "arrow_function"
            | "method_definition"
    )
}

/// Classify a function-like node
pub fn function_kind(node: &Node) -> FunctionKind {
    match node.kind() {
        "arrow_function" => FunctionKind::Arrow,
        "method_definition" => FunctionKind::Method,
        _ => FunctionKind::Function,
    }
}

/// Resolve a function's name, or `None` when it is anonymous
///
/// Resolution order:
/// 1. the function's own declared identifier
/// 2. a method's key identifier
/// 3. the identifier bound by the nearest enclosing variable declarator,
///    assignment, or object property the node is the value of, reached by
///    walking outward through parentheses and call wrappers
///
/// Computed keys, private names, destructuring targets, and
/// member-expression assignments all resolve to `None`.
pub fn resolve_name(node: Node, source: &str) -> Option<String> {
    if let Some(name) = declared_name(node, source) {
        return Some(name);
    }

    if node.kind() == "method_definition" {
        return key_identifier(node, source);
    }

    let mut child = node;
    for _ in 0..MAX_NAME_HOPS {
        let parent = child.parent()?;
        match parent.kind() {
            // Transparent wrappers: (...), f(...), and the argument list itself
            "parenthesized_expression" | "call_expression" | "arguments" => {
                child = parent;
            }
            "variable_declarator" => {
                return binding_name(parent, "name", "value", child, source);
            }
            "assignment_expression" => {
                return binding_name(parent, "left", "right", child, source);
            }
            "pair" => {
                return binding_name(parent, "key", "value", child, source);
            }
            // Anything else is a scope or statement boundary
            _ => return None,
        }
    }

    None
}

/// Own identifier of a named function declaration or expression
fn declared_name(node: Node, source: &str) -> Option<String> {
    if node.kind() == "method_definition" {
        return None;
    }
    let name = node.child_by_field_name("name")?;
    if name.kind() == "identifier" {
        Some(source[name.byte_range()].to_string())
    } else {
        None
    }
}

/// Plain-identifier key of a method definition
fn key_identifier(node: Node, source: &str) -> Option<String> {
    let key = node.child_by_field_name("name")?;
    if key.kind() == "property_identifier" {
        Some(source[key.byte_range()].to_string())
    } else {
        None
    }
}

/// Name bound by a declarator/assignment/property, when the function sits on
/// its value side and the target is a plain identifier
fn binding_name(
    parent: Node,
    target_field: &str,
    value_field: &str,
    child: Node,
    source: &str,
) -> Option<String> {
    let value = parent.child_by_field_name(value_field)?;
    if value.id() != child.id() {
        return None;
    }

    let target = parent.child_by_field_name(target_field)?;
    match target.kind() {
        "identifier" | "property_identifier" => Some(source[target.byte_range()].to_string()),
        _ => None,
    }
}

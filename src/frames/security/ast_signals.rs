//! Structural AST signals (spec.md §4.5 step 2): "not findings, context
//! for the LLM step." Grounded on
//! `original_source/.../security/ast_analyzer.py`'s walk, which flags
//! dangerous-call nodes, string concatenation in sensitive contexts,
//! input-source expressions, and SQL-query callsites without emitting
//! any finding of its own.
//!
//! Only Python gets a real AST walk (tree-sitter, same parsing idiom as
//! `taint::analyzer`). Other languages fall back to an empty signal set —
//! the LLM verification step still runs off pattern checks and taint
//! paths for them.

use tree_sitter::{Node, Parser};

use crate::lang::Language;

/// Calls whose mere presence is worth flagging to the LLM as a "dangerous
/// call" signal — arbitrary code execution or process/file primitives.
const DANGEROUS_CALLS: &[&str] = &[
    "eval",
    "exec",
    "os.system",
    "subprocess.call",
    "subprocess.run",
    "subprocess.Popen",
    "pickle.loads",
    "yaml.load",
    "__import__",
];

#[derive(Debug, Clone, Default)]
pub struct AstSignals {
    /// Fully-qualified names of dangerous-call sites found, with line numbers.
    pub dangerous_calls: Vec<String>,
    /// Lines where string concatenation feeds a call argument (a common
    /// precursor to injection, independent of whether taint tracking could
    /// resolve the operands).
    pub string_concat_in_sensitive_context: Vec<String>,
    /// Input-source-shaped expressions encountered (`request.args`, etc.),
    /// regardless of whether they reach a sink.
    pub input_sources: Vec<String>,
    /// Lines calling a SQL-query-shaped function.
    pub sql_query_callsites: Vec<String>,
}

impl AstSignals {
    pub fn is_empty(&self) -> bool {
        self.dangerous_calls.is_empty()
            && self.string_concat_in_sensitive_context.is_empty()
            && self.input_sources.is_empty()
            && self.sql_query_callsites.is_empty()
    }
}

/// Extract structural signals from `source`. Best-effort: a parse failure
/// or non-Python language yields an empty, non-error result.
pub fn extract(source: &str, language: Option<Language>) -> AstSignals {
    if language != Some(Language::Python) {
        return AstSignals::default();
    }

    let mut signals = AstSignals::default();
    let ts_language = tree_sitter_python::LANGUAGE.into();
    let mut parser = Parser::new();
    if parser.set_language(&ts_language).is_err() {
        return signals;
    }
    let Some(tree) = parser.parse(source, None) else {
        return signals;
    };
    walk(tree.root_node(), source, &mut signals);
    signals
}

fn walk(node: Node, source: &str, signals: &mut AstSignals) {
    match node.kind() {
        "call" => inspect_call(node, source, signals),
        "binary_operator" => inspect_binary_operator(node, source, signals),
        _ => {}
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk(child, source, signals);
    }
}

fn inspect_call(node: Node, source: &str, signals: &mut AstSignals) {
    let Some(function) = node.child_by_field_name("function") else { return };
    let Some(name) = dotted_name(function, source) else { return };
    let line = node.start_position().row + 1;

    if DANGEROUS_CALLS.iter().any(|candidate| name == *candidate) {
        signals.dangerous_calls.push(format!("{name}:{line}"));
    }
    if name.ends_with("execute") || name.ends_with("query") || name.ends_with("raw") {
        signals.sql_query_callsites.push(format!("{name}:{line}"));
    }
    if name.contains("request.") || name.contains("req.") || name == "input" {
        signals.input_sources.push(format!("{name}:{line}"));
    }
}

fn inspect_binary_operator(node: Node, source: &str, signals: &mut AstSignals) {
    if node.utf8_text(source.as_bytes()).map(|t| t.contains('+')).unwrap_or(false)
        && is_within_call_argument(node)
    {
        let line = node.start_position().row + 1;
        signals.string_concat_in_sensitive_context.push(format!("line:{line}"));
    }
}

fn is_within_call_argument(node: Node) -> bool {
    let mut current = node.parent();
    while let Some(parent) = current {
        if parent.kind() == "argument_list" {
            return true;
        }
        current = parent.parent();
    }
    false
}

fn dotted_name(node: Node, source: &str) -> Option<String> {
    match node.kind() {
        "attribute" => {
            let object = node.child_by_field_name("object")?;
            let attribute = node.child_by_field_name("attribute")?;
            let object_name = dotted_name(object, source)?;
            let attr_name = attribute.utf8_text(source.as_bytes()).ok()?;
            Some(format!("{object_name}.{attr_name}"))
        }
        "identifier" => node.utf8_text(source.as_bytes()).ok().map(str::to_string),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_dangerous_eval_call() {
        let signals = extract("eval(user_input)\n", Some(Language::Python));
        assert!(signals.dangerous_calls.iter().any(|c| c.starts_with("eval:")));
    }

    #[test]
    fn flags_sql_query_callsite() {
        let signals = extract("cursor.execute(q)\n", Some(Language::Python));
        assert!(signals.sql_query_callsites.iter().any(|c| c.starts_with("cursor.execute:")));
    }

    #[test]
    fn flags_request_input_source() {
        let signals = extract("q = request.args.get(\"q\")\n", Some(Language::Python));
        assert!(!signals.input_sources.is_empty());
    }

    #[test]
    fn non_python_language_yields_empty_signals() {
        let signals = extract("eval(userInput);\n", Some(Language::JavaScript));
        assert!(signals.is_empty());
    }

    #[test]
    fn unrelated_code_has_no_signals() {
        let signals = extract("def add(a, b):\n    return a + b\n", Some(Language::Python));
        assert!(signals.is_empty());
    }
}

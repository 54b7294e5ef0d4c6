//! Per-language source-to-sink path extraction (spec.md §4.2).
//!
//! Python is parsed with a real AST via tree-sitter, following the parsing
//! idiom from `lang::python`-style adapters
//! (`tree_sitter_python::LANGUAGE.into()`, `Parser::new()` +
//! `.set_language()`, `node.walk()` / `node.children(&mut cursor)` /
//! `node.kind()` / `node.utf8_text()`). JavaScript, TypeScript, Go, and
//! Java use the three-pass regex strategy ported from
//! `original_source/.../taint_analyzer.py`'s `_analyze_js`/`_analyze_go`/
//! `_analyze_java`.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;
use tree_sitter::{Node, Parser};

use crate::core::config::TaintConfig;
use crate::lang::Language;
use crate::taint::catalog::{SinkType, TaintCatalog};
use crate::taint::signals::SignalInference;
use crate::taint::{TaintPath, TaintSink, TaintSource};

/// A variable currently believed tainted, with the chain of intermediate
/// variable names it passed through on the way from its source.
#[derive(Debug, Clone)]
struct TaintedVar {
    source: TaintSource,
    transformations: Vec<String>,
}

static RE_JS_ASSIGN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*(?::\s*[\w<>\[\]\.\s]+)?\s*=\s*(.+?);?\s*$")
        .expect("valid JS assignment regex")
});

static RE_JS_DESTRUCT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(?:const|let|var)\s*\{\s*([^}]+)\}\s*=\s*(.+?);?\s*$").expect("valid JS destructure regex")
});

static RE_TEMPLATE_EXPR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\{([^}]*)\}").expect("valid template regex"));

static RE_GO_ASSIGN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*([A-Za-z_]\w*)\s*:=\s*(.+?)\s*$").expect("valid Go assignment regex"));

static RE_JAVA_ASSIGN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(?:[A-Za-z_][\w<>\[\],\.\s]*)\s+([A-Za-z_]\w*)\s*=\s*(.+?);\s*$")
        .expect("valid Java assignment regex")
});

/// Extracts `TaintPath`s from one source string in one language, using a
/// catalog and confidence model bound once per scan.
pub struct TaintAnalyzer<'a> {
    catalog: &'a TaintCatalog,
    signals: SignalInference,
    config: TaintConfig,
}

impl<'a> TaintAnalyzer<'a> {
    /// Build an analyzer bound to a loaded catalog and validated config.
    pub fn new(catalog: &'a TaintCatalog, config: TaintConfig) -> Self {
        Self { catalog, signals: SignalInference::new(config), config }
    }

    /// Extract every `TaintPath` in `source`, dispatching on `language`.
    pub fn analyze(&self, source: &str, language: Language) -> Vec<TaintPath> {
        match language {
            Language::Python => self.analyze_python(source),
            Language::JavaScript | Language::TypeScript => self.analyze_js(source),
            Language::Go => self.analyze_go(source),
            Language::Java => self.analyze_java(source),
        }
    }

    // ------------------------------------------------------------------
    // Python: tree-sitter AST walk, one function at a time.
    // ------------------------------------------------------------------

    fn analyze_python(&self, source: &str) -> Vec<TaintPath> {
        let language = tree_sitter_python::LANGUAGE.into();
        let mut parser = Parser::new();
        if let Err(error) = parser.set_language(&language) {
            debug!(?error, "failed to set tree-sitter python language, skipping taint analysis");
            return Vec::new();
        }
        let Some(tree) = parser.parse(source, None) else {
            debug!("python source failed to parse, skipping taint analysis");
            return Vec::new();
        };

        let mut function_defs = Vec::new();
        Self::collect_function_defs(tree.root_node(), &mut function_defs);
        // The module itself may also contain top-level source-to-sink flows
        // outside any function (e.g. script-style code).
        function_defs.push(tree.root_node());

        let mut paths = Vec::new();
        for func in function_defs {
            let body = func.child_by_field_name("body").unwrap_or(func);
            let mut tainted: HashMap<String, TaintedVar> = HashMap::new();
            self.walk_function_body(body, source, &mut tainted, &mut paths);
        }
        paths
    }

    fn collect_function_defs<'t>(node: Node<'t>, out: &mut Vec<Node<'t>>) {
        if node.kind() == "function_definition" {
            out.push(node);
        }
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            Self::collect_function_defs(child, out);
        }
    }

    fn walk_function_body(
        &self,
        node: Node,
        source: &str,
        tainted: &mut HashMap<String, TaintedVar>,
        paths: &mut Vec<TaintPath>,
    ) {
        if node.kind() == "function_definition" {
            // Nested defs are collected and analyzed in their own scope.
            return;
        }
        match node.kind() {
            "assignment" => self.handle_assignment(node, source, tainted, paths),
            "augmented_assignment" => self.handle_aug_assignment(node, source, tainted, paths),
            "call" => self.check_python_call_for_sink(node, source, tainted, paths),
            _ => {}
        }
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.walk_function_body(child, source, tainted, paths);
        }
    }

    fn handle_assignment(
        &self,
        node: Node,
        source: &str,
        tainted: &mut HashMap<String, TaintedVar>,
        paths: &mut Vec<TaintPath>,
    ) {
        let _ = paths;
        let Some(left) = node.child_by_field_name("left") else { return };
        let Some(right) = node.child_by_field_name("right") else { return };
        let Some(var_name) = Self::get_dotted_name(left, source) else { return };
        let line = node.start_position().row + 1;

        if let Some((taint_source, transformations)) = self.classify_rhs(right, source, tainted, line) {
            tainted.insert(var_name, TaintedVar { source: taint_source, transformations });
        } else {
            tainted.remove(&var_name);
        }
    }

    fn handle_aug_assignment(
        &self,
        node: Node,
        source: &str,
        tainted: &mut HashMap<String, TaintedVar>,
        paths: &mut Vec<TaintPath>,
    ) {
        let _ = paths;
        let Some(left) = node.child_by_field_name("left") else { return };
        let Some(right) = node.child_by_field_name("right") else { return };
        let Some(var_name) = Self::get_dotted_name(left, source) else { return };
        let line = node.start_position().row + 1;

        let already_tainted = tainted.get(&var_name).cloned();
        if let Some((taint_source, mut transformations)) = self.classify_rhs(right, source, tainted, line) {
            if let Some(existing) = already_tainted {
                transformations.extend(existing.transformations);
            }
            tainted.insert(var_name, TaintedVar { source: taint_source, transformations });
        }
    }

    /// Classify an assignment's RHS: either a fresh source (catalog or
    /// signal-inferred), a propagation from an already-tainted variable
    /// reachable anywhere in the expression (covers f-strings, `.format()`,
    /// and string concatenation, since all eventually contain an
    /// `identifier` descendant), or untainted.
    fn classify_rhs(
        &self,
        node: Node,
        source: &str,
        tainted: &HashMap<String, TaintedVar>,
        line: usize,
    ) -> Option<(TaintSource, Vec<String>)> {
        if let Some(detected) = self.detect_source_expr(node, source, line) {
            return Some((detected, Vec::new()));
        }
        if let Some((var_name, entry)) = Self::find_tainted_ref(node, source, tainted) {
            let mut transformations = entry.transformations.clone();
            transformations.push(var_name);
            let propagated = TaintSource {
                name: entry.source.name.clone(),
                kind: entry.source.kind.clone(),
                line,
                confidence: self.config.sink_propagation_confidence,
            };
            return Some((propagated, transformations));
        }
        None
    }

    fn detect_source_expr(&self, node: Node, source: &str, line: usize) -> Option<TaintSource> {
        let name = Self::get_dotted_name(node, source)?;
        if self.catalog.is_source("python", &name) {
            return Some(TaintSource {
                name,
                kind: "user input".into(),
                line,
                confidence: self.config.source_catalog_confidence,
            });
        }
        self.signals
            .infer_source(&name, None)
            .map(|(role, confidence)| TaintSource { name, kind: role, line, confidence })
    }

    fn check_python_call_for_sink(
        &self,
        node: Node,
        source: &str,
        tainted: &HashMap<String, TaintedVar>,
        paths: &mut Vec<TaintPath>,
    ) {
        let Some(function) = node.child_by_field_name("function") else { return };
        let Some(sink_name) = Self::get_dotted_name(function, source) else { return };

        let sink_type = match self.catalog.sink_type_for(&sink_name) {
            Some(t) => t,
            None => match self.signals.infer_sink(&sink_name, &[], None) {
                Some((t, _)) => t,
                None => return,
            },
        };

        let Some(arguments) = node.child_by_field_name("arguments") else { return };
        let line = node.start_position().row + 1;

        let mut cursor = arguments.walk();
        for arg in arguments.children(&mut cursor) {
            if matches!(arg.kind(), "(" | ")" | ",") {
                continue;
            }

            let (sanitized, sanitizer_name, search_node) = self.python_sanitizer_wrap(arg, source, sink_type);
            let Some((_, entry)) = Self::find_tainted_ref(search_node, source, tainted) else { continue };

            let mut confidence = entry.source.confidence;
            let mut sanitizers = Vec::new();
            if sanitized {
                confidence = TaintPath::apply_sanitizer_penalty(confidence, true, self.config.sanitizer_penalty);
                if let Some(name) = sanitizer_name {
                    sanitizers.push(name);
                }
            }

            paths.push(TaintPath {
                source: entry.source.clone(),
                sink: TaintSink { name: sink_name.clone(), kind: sink_type.as_str().to_string(), line },
                transformations: entry.transformations.clone(),
                sanitizers,
                is_sanitized: sanitized,
                confidence,
            });
        }
    }

    /// If `node` is a call to a known sanitizer for `sink_type`, return its
    /// name and the (narrower) node to search for taint — its own first
    /// argument — rather than the wrapping call itself.
    fn python_sanitizer_wrap<'n>(&self, node: Node<'n>, source: &str, sink_type: SinkType) -> (bool, Option<String>, Node<'n>) {
        if node.kind() != "call" {
            return (false, None, node);
        }
        let Some(function) = node.child_by_field_name("function") else { return (false, None, node) };
        let Some(name) = Self::get_dotted_name(function, source) else { return (false, None, node) };
        if self.catalog.is_sanitizer(sink_type, &name) {
            let inner = node.child_by_field_name("arguments").unwrap_or(node);
            (true, Some(name), inner)
        } else {
            (false, None, node)
        }
    }

    fn find_tainted_ref<'t>(node: Node<'t>, source: &str, tainted: &HashMap<String, TaintedVar>) -> Option<(String, TaintedVar)> {
        if node.kind() == "identifier" {
            if let Ok(name) = node.utf8_text(source.as_bytes()) {
                if let Some(entry) = tainted.get(name) {
                    return Some((name.to_string(), entry.clone()));
                }
            }
        }
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if let Some(found) = Self::find_tainted_ref(child, source, tainted) {
                return Some(found);
            }
        }
        None
    }

    fn get_dotted_name(node: Node, source: &str) -> Option<String> {
        match node.kind() {
            "call" => {
                let function = node.child_by_field_name("function")?;
                Self::get_dotted_name(function, source)
            }
            "attribute" => {
                let object = node.child_by_field_name("object")?;
                let attribute = node.child_by_field_name("attribute")?;
                let object_name = Self::get_dotted_name(object, source)?;
                let attr_name = attribute.utf8_text(source.as_bytes()).ok()?;
                Some(format!("{object_name}.{attr_name}"))
            }
            "subscript" => {
                let value = node.child_by_field_name("value")?;
                Self::get_dotted_name(value, source)
            }
            "identifier" => node.utf8_text(source.as_bytes()).ok().map(str::to_string),
            _ => node.utf8_text(source.as_bytes()).ok().map(str::to_string),
        }
    }

    // ------------------------------------------------------------------
    // JavaScript / TypeScript, Go, Java: three-pass regex strategy.
    // ------------------------------------------------------------------

    fn analyze_js(&self, source: &str) -> Vec<TaintPath> {
        let mut tainted = self.regex_collect_sources(source, "javascript", &RE_JS_ASSIGN, Some(&RE_JS_DESTRUCT));
        self.regex_propagate(source, &mut tainted, &RE_JS_ASSIGN);
        self.regex_find_sinks(source, &tainted, true)
    }

    fn analyze_go(&self, source: &str) -> Vec<TaintPath> {
        let mut tainted = self.regex_collect_sources(source, "go", &RE_GO_ASSIGN, None);
        self.regex_propagate(source, &mut tainted, &RE_GO_ASSIGN);
        self.regex_find_sinks(source, &tainted, false)
    }

    fn analyze_java(&self, source: &str) -> Vec<TaintPath> {
        let mut tainted = self.regex_collect_sources(source, "java", &RE_JAVA_ASSIGN, None);
        self.regex_propagate(source, &mut tainted, &RE_JAVA_ASSIGN);
        self.regex_find_sinks(source, &tainted, false)
    }

    /// Pass 1: direct assignment. Recognises `const/let/var name = expr`
    /// (optionally `{a, b} = expr` destructuring for JS), Go `name :=
    /// expr`, and Java `Type name = expr;`.
    fn regex_collect_sources(
        &self,
        source: &str,
        lang_key: &str,
        assign_re: &Regex,
        destructure_re: Option<&Regex>,
    ) -> HashMap<String, TaintedVar> {
        let mut tainted = HashMap::new();
        for (idx, line) in source.lines().enumerate() {
            let line_no = idx + 1;
            if let Some(caps) = assign_re.captures(line) {
                let name = caps[1].to_string();
                let rhs = caps[2].trim();
                if let Some(src) = self.regex_source_for(lang_key, rhs, line_no) {
                    tainted.insert(name, TaintedVar { source: src, transformations: Vec::new() });
                }
            }
            if let Some(destructure_re) = destructure_re {
                if let Some(caps) = destructure_re.captures(line) {
                    let names: Vec<String> =
                        caps[1].split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
                    let rhs = caps[2].trim();
                    if let Some(src) = self.regex_source_for(lang_key, rhs, line_no) {
                        for name in names {
                            tainted.insert(name, TaintedVar { source: src.clone(), transformations: Vec::new() });
                        }
                    }
                }
            }
        }
        tainted
    }

    /// Pass 2: propagation, up to 5 iterations or a fixpoint — whichever
    /// comes first. Each iteration reads a snapshot of currently-tainted
    /// names so newly-discovered taint within one pass doesn't chain
    /// within the same iteration (matching the source's pass semantics).
    fn regex_propagate(&self, source: &str, tainted: &mut HashMap<String, TaintedVar>, assign_re: &Regex) {
        for _ in 0..5 {
            let snapshot = tainted.clone();
            let mut added = false;
            for (idx, line) in source.lines().enumerate() {
                let line_no = idx + 1;
                let Some(caps) = assign_re.captures(line) else { continue };
                let name = caps[1].to_string();
                if tainted.contains_key(&name) {
                    continue;
                }
                let rhs = caps[2].trim();
                if let Some((ref_name, entry)) = Self::regex_find_tainted_word(rhs, &snapshot) {
                    let mut transformations = entry.transformations.clone();
                    transformations.push(ref_name);
                    let propagated = TaintSource {
                        name: entry.source.name.clone(),
                        kind: entry.source.kind.clone(),
                        line: line_no,
                        confidence: self.config.sink_propagation_confidence,
                    };
                    tainted.insert(name, TaintedVar { source: propagated, transformations });
                    added = true;
                }
            }
            if !added {
                break;
            }
        }
    }

    /// Pass 3: sinks. Call-sinks (`sink(...)`) and, for JS, property
    /// assignment sinks (`x.innerHTML = expr`).
    fn regex_find_sinks(&self, source: &str, tainted: &HashMap<String, TaintedVar>, check_assign_sinks: bool) -> Vec<TaintPath> {
        let mut paths = Vec::new();
        for (idx, raw_line) in source.lines().enumerate() {
            let line_no = idx + 1;
            let line = Self::expand_template_literals(raw_line);

            for (sink_pattern, sink_type) in &self.catalog.sinks {
                if !line.contains(sink_pattern.as_str()) {
                    continue;
                }
                if let Some(args) = Self::extract_call_args(&line, sink_pattern) {
                    self.regex_emit_if_tainted(&args, tainted, sink_pattern, *sink_type, line_no, &mut paths);
                }
            }

            if check_assign_sinks {
                for property in &self.catalog.assign_sinks {
                    let pattern = format!(r"\.{}\s*=\s*(.+?);?\s*$", regex::escape(property));
                    let Ok(re) = Regex::new(&pattern) else { continue };
                    if let Some(caps) = re.captures(&line) {
                        let expr = caps[1].trim();
                        self.regex_emit_if_tainted(expr, tainted, property, SinkType::HtmlContent, line_no, &mut paths);
                    }
                }
            }
        }
        paths
    }

    fn regex_emit_if_tainted(
        &self,
        expr: &str,
        tainted: &HashMap<String, TaintedVar>,
        sink_name: &str,
        sink_type: SinkType,
        line: usize,
        paths: &mut Vec<TaintPath>,
    ) {
        let (sanitized, sanitizer_name, search_expr) = self.regex_sanitizer_wrap(expr, sink_type);
        let Some((_, entry)) = Self::regex_find_tainted_word(&search_expr, tainted) else { return };

        let mut confidence = entry.source.confidence;
        let mut sanitizers = Vec::new();
        if sanitized {
            confidence = TaintPath::apply_sanitizer_penalty(confidence, true, self.config.sanitizer_penalty);
            if let Some(name) = sanitizer_name {
                sanitizers.push(name);
            }
        }

        paths.push(TaintPath {
            source: entry.source.clone(),
            sink: TaintSink { name: sink_name.to_string(), kind: sink_type.as_str().to_string(), line },
            transformations: entry.transformations.clone(),
            sanitizers,
            is_sanitized: sanitized,
            confidence,
        });
    }

    fn regex_source_for(&self, lang_key: &str, expr: &str, line: usize) -> Option<TaintSource> {
        if self.catalog.is_source(lang_key, expr) {
            let name = self
                .catalog
                .sources
                .get(lang_key)
                .and_then(|patterns| patterns.iter().find(|p| expr.contains(p.as_str())))
                .cloned()
                .unwrap_or_else(|| expr.to_string());
            return Some(TaintSource {
                name,
                kind: "user input".into(),
                line,
                confidence: self.config.source_catalog_confidence,
            });
        }
        self.signals
            .infer_source(expr, None)
            .map(|(role, confidence)| TaintSource { name: expr.trim().to_string(), kind: role, line, confidence })
    }

    fn regex_sanitizer_wrap(&self, expr: &str, sink_type: SinkType) -> (bool, Option<String>, String) {
        if let Some(patterns) = self.catalog.sanitizers.get(&sink_type) {
            for pattern in patterns {
                if expr.contains(pattern.as_str()) {
                    if let Some(inner) = Self::extract_call_args(expr, pattern) {
                        return (true, Some(pattern.clone()), inner);
                    }
                    return (true, Some(pattern.clone()), expr.to_string());
                }
            }
        }
        (false, None, expr.to_string())
    }

    fn regex_find_tainted_word(expr: &str, tainted: &HashMap<String, TaintedVar>) -> Option<(String, TaintedVar)> {
        for (name, entry) in tainted {
            let pattern = format!(r"\b{}\b", regex::escape(name));
            if Regex::new(&pattern).map(|re| re.is_match(expr)).unwrap_or(false) {
                return Some((name.clone(), entry.clone()));
            }
        }
        None
    }

    fn expand_template_literals(line: &str) -> String {
        RE_TEMPLATE_EXPR.replace_all(line, "$1").into_owned()
    }

    /// Extract the contents of the first balanced-paren call whose name is
    /// `call_name`, scanning forward from its first occurrence on `line`.
    fn extract_call_args(line: &str, call_name: &str) -> Option<String> {
        let start = line.find(call_name)?;
        let after = &line[start + call_name.len()..];
        let bytes = after.as_bytes();
        let paren_start = after.find('(')?;
        let mut depth = 0i32;
        let mut end = None;
        for (i, &b) in bytes.iter().enumerate().skip(paren_start) {
            match b {
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        end = Some(i);
                        break;
                    }
                }
                _ => {}
            }
        }
        let end = end?;
        Some(after[paren_start + 1..end].to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taint::catalog::TaintCatalog;
    use std::path::PathBuf;

    fn catalog() -> TaintCatalog {
        TaintCatalog::load(&PathBuf::from("/nonexistent"))
    }

    #[test]
    fn python_flask_sqli_direct_source() {
        let catalog = catalog();
        let analyzer = TaintAnalyzer::new(&catalog, TaintConfig::default());
        let source = "from flask import request\n\
def search():\n\
    q = request.args.get(\"q\")\n\
    cursor.execute(\"SELECT * FROM t WHERE name = \" + q)\n";
        let paths = analyzer.analyze(source, Language::Python);
        assert!(!paths.is_empty(), "expected at least one taint path");
        let path = &paths[0];
        assert_eq!(path.sink.name, "cursor.execute");
        assert!(!path.is_sanitized);
        assert!((path.confidence - 0.9).abs() < 1e-9);
    }

    #[test]
    fn js_xss_sanitized_lowers_confidence() {
        let catalog = catalog();
        let analyzer = TaintAnalyzer::new(&catalog, TaintConfig::default());
        let source = "const h = location.hash;\nel.innerHTML = DOMPurify.sanitize(h);\n";
        let paths = analyzer.analyze(source, Language::JavaScript);
        assert_eq!(paths.len(), 1);
        let path = &paths[0];
        assert!(path.is_sanitized);
        assert_eq!(path.sanitizers, vec!["DOMPurify.sanitize".to_string()]);
        assert!((path.confidence - 0.27).abs() < 1e-9);
    }

    #[test]
    fn go_sql_via_propagation() {
        let catalog = catalog();
        let analyzer = TaintAnalyzer::new(&catalog, TaintConfig::default());
        let source = "raw := r.FormValue(\"id\")\nuserId := raw\ndb.QueryRow(\"SELECT * FROM t WHERE id = \" + userId)\n";
        let paths = analyzer.analyze(source, Language::Go);
        assert!(!paths.is_empty());
        assert!((paths[0].confidence - 0.75).abs() < 1e-9);
    }

    #[test]
    fn parse_error_yields_empty_path_list() {
        let catalog = catalog();
        let analyzer = TaintAnalyzer::new(&catalog, TaintConfig::default());
        let paths = analyzer.analyze("", Language::Python);
        assert!(paths.is_empty());
    }

    #[test]
    fn unrelated_code_has_no_paths() {
        let catalog = catalog();
        let analyzer = TaintAnalyzer::new(&catalog, TaintConfig::default());
        let source = "def add(a, b):\n    return a + b\n";
        assert!(analyzer.analyze(source, Language::Python).is_empty());
    }
}

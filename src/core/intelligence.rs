//! Project-wide dependency graph (spec.md §6 `.warden/intelligence/
//! dependency_graph.json`; §9's "Cyclic graphs" design note).
//!
//! `PipelineContext` (spec.md §3) is scoped to one file, so this graph is
//! built once per directory scan by the API facade (`api::engine`), not by
//! any individual phase — it is cross-file project intelligence, not
//! per-file state.
//!
//! Grounded on `josongsong-semantica-codegraph`'s
//! `features/cross_file/dep_graph.rs` `DependencyGraph`: a `petgraph::
//! DiGraph<PathBuf, ()>` plus a `path_to_node` index, `get_dependencies`/
//! `get_dependents` via `Direction::Outgoing`/`Direction::Incoming`. That
//! file uses `tarjan_scc` for cycle detection; spec.md §9 asks for "a DFS
//! with a three-colour marker" instead, so `find_cycles` below walks the
//! graph with an explicit white/gray/black `NodeColor` map rather than
//! delegating to `petgraph::algo`. Per §9, "never materialise
//! back-references through owning pointers" — dependents are a derived
//! view over the same edge set, not a second owning structure.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use crate::core::errors::Result;
use crate::core::model::CodeFile;
use crate::lang::Language;

/// One `import`/`require`/`from ... import` target as written in source,
/// before any attempt to resolve it against the scanned file set.
fn import_targets(content: &str, language: Language) -> Vec<String> {
    let mut targets = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        match language {
            Language::Python => {
                if let Some(rest) = line.strip_prefix("from ") {
                    if let Some(module) = rest.split_whitespace().next() {
                        targets.push(module.to_string());
                    }
                } else if let Some(rest) = line.strip_prefix("import ") {
                    for part in rest.split(',') {
                        if let Some(module) = part.split_whitespace().next() {
                            targets.push(module.trim_end_matches(',').to_string());
                        }
                    }
                }
            }
            Language::JavaScript | Language::TypeScript => {
                if let Some(start) = line.find("from ") {
                    if line.starts_with("import ") || line.starts_with("export ") {
                        if let Some(target) = quoted_literal(&line[start + 5..]) {
                            targets.push(target);
                        }
                    }
                } else if let Some(start) = line.find("require(") {
                    if let Some(target) = quoted_literal(&line[start + 8..]) {
                        targets.push(target);
                    }
                }
            }
            Language::Go => {
                if line.starts_with("import ") || (line.starts_with('"') && line.ends_with('"')) {
                    if let Some(target) = quoted_literal(line) {
                        targets.push(target);
                    }
                }
            }
            Language::Java => {
                if let Some(rest) = line.strip_prefix("import ") {
                    let module = rest.trim_end_matches(';').trim_start_matches("static ");
                    targets.push(module.to_string());
                }
            }
        }
    }
    targets
}

fn quoted_literal(text: &str) -> Option<String> {
    let quote = text.find(['"', '\''])?;
    let rest = &text[quote + 1..];
    let end = rest.find(['"', '\''])?;
    Some(rest[..end].to_string())
}

/// Best-effort match of an import target string against one of the files
/// actually in this scan, by final path segment (module/package name) —
/// there is no real module resolver here, only a project intelligence
/// heuristic (spec.md §4.7 "entry points ... input sources ... critical
/// sinks" are all heuristics of the same kind).
fn resolve_target<'a>(target: &str, candidates: &'a HashMap<String, &'a Path>) -> Option<&'a Path> {
    let key = target.rsplit(['/', '.']).next().unwrap_or(target).to_ascii_lowercase();
    candidates.get(&key).copied()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeColor {
    White,
    Gray,
    Black,
}

/// A project-wide "file depends on file" graph plus its derived reverse
/// (dependents) view and any cycles found in it.
pub struct DependencyGraph {
    graph: DiGraph<PathBuf, ()>,
    index_of: HashMap<PathBuf, NodeIndex>,
}

impl DependencyGraph {
    /// Build the graph from every file in one scan. Import targets that
    /// don't resolve to another file in `files` are dropped silently —
    /// they point outside the project (stdlib, third-party packages) and
    /// contribute no edge.
    pub fn build(files: &[CodeFile]) -> Self {
        let mut graph = DiGraph::new();
        let mut index_of = HashMap::new();
        for file in files {
            let idx = graph.add_node(file.path.clone());
            index_of.insert(file.path.clone(), idx);
        }

        let candidates: HashMap<String, &Path> = files
            .iter()
            .filter_map(|file| {
                let stem = file.path.file_stem()?.to_str()?.to_ascii_lowercase();
                Some((stem, file.path.as_path()))
            })
            .collect();

        for file in files {
            let Some(language) = file.language else { continue };
            let Some(&from_idx) = index_of.get(&file.path) else { continue };
            for target in import_targets(&file.content, language) {
                let Some(resolved) = resolve_target(&target, &candidates) else { continue };
                if resolved == file.path {
                    continue; // no self-loops
                }
                if let Some(&to_idx) = index_of.get(resolved) {
                    graph.update_edge(from_idx, to_idx, ());
                }
            }
        }

        Self { graph, index_of }
    }

    /// Files that `path` imports (directly), in insertion order.
    pub fn dependencies_of(&self, path: &Path) -> Vec<PathBuf> {
        self.directed_neighbors(path, Direction::Outgoing)
    }

    /// Files that import `path` (directly) — the reverse view, derived
    /// from the same edge set rather than stored separately.
    pub fn dependents_of(&self, path: &Path) -> Vec<PathBuf> {
        self.directed_neighbors(path, Direction::Incoming)
    }

    fn directed_neighbors(&self, path: &Path, direction: Direction) -> Vec<PathBuf> {
        let Some(&idx) = self.index_of.get(path) else { return Vec::new() };
        self.graph.neighbors_directed(idx, direction).map(|n| self.graph[n].clone()).collect()
    }

    /// Every simple cycle reachable by a three-colour DFS (spec.md §9):
    /// white = unvisited, gray = on the current DFS stack, black = fully
    /// explored. A back-edge (gray → gray) closes a cycle; the returned
    /// path runs from the repeated node back to itself.
    pub fn find_cycles(&self) -> Vec<Vec<PathBuf>> {
        let mut color: HashMap<NodeIndex, NodeColor> = self.graph.node_indices().map(|n| (n, NodeColor::White)).collect();
        let mut stack: Vec<NodeIndex> = Vec::new();
        let mut cycles = Vec::new();

        for start in self.graph.node_indices() {
            if color[&start] == NodeColor::White {
                self.visit(start, &mut color, &mut stack, &mut cycles);
            }
        }
        cycles
    }

    fn visit(&self, node: NodeIndex, color: &mut HashMap<NodeIndex, NodeColor>, stack: &mut Vec<NodeIndex>, cycles: &mut Vec<Vec<PathBuf>>) {
        color.insert(node, NodeColor::Gray);
        stack.push(node);

        for neighbor in self.graph.neighbors_directed(node, Direction::Outgoing) {
            match color[&neighbor] {
                NodeColor::White => self.visit(neighbor, color, stack, cycles),
                NodeColor::Gray => {
                    let start = stack.iter().position(|&n| n == neighbor).unwrap_or(0);
                    let mut cycle: Vec<PathBuf> = stack[start..].iter().map(|&n| self.graph[n].clone()).collect();
                    cycle.push(self.graph[neighbor].clone());
                    cycles.push(cycle);
                }
                NodeColor::Black => {}
            }
        }

        stack.pop();
        color.insert(node, NodeColor::Black);
    }

    /// Render as the `.warden/intelligence/dependency_graph.json` shape
    /// (spec.md §6): adjacency lists both directions plus any detected
    /// cycles, all paths relative to `project_root` where possible.
    pub fn to_json(&self, project_root: &Path) -> serde_json::Value {
        let relative = |p: &Path| p.strip_prefix(project_root).unwrap_or(p).to_string_lossy().into_owned();

        let mut dependencies = serde_json::Map::new();
        let mut dependents = serde_json::Map::new();
        for &idx in self.index_of.values() {
            let path = &self.graph[idx];
            let deps: Vec<String> = self.graph.neighbors_directed(idx, Direction::Outgoing).map(|n| relative(&self.graph[n])).collect();
            let rdeps: Vec<String> = self.graph.neighbors_directed(idx, Direction::Incoming).map(|n| relative(&self.graph[n])).collect();
            dependencies.insert(relative(path), serde_json::Value::from(deps));
            dependents.insert(relative(path), serde_json::Value::from(rdeps));
        }

        let cycles: Vec<Vec<String>> = self.find_cycles().iter().map(|cycle| cycle.iter().map(|p| relative(p)).collect()).collect();

        serde_json::json!({
            "dependencies": serde_json::Value::Object(dependencies),
            "dependents": serde_json::Value::Object(dependents),
            "cycles": cycles,
        })
    }

    /// Atomically write the graph to `<project_root>/.warden/intelligence/
    /// dependency_graph.json` (temp-file-then-rename, matching
    /// `FindingsCache::store`'s shared-resource discipline, spec.md §5).
    pub fn write(&self, project_root: &Path) -> Result<()> {
        let dir = project_root.join(".warden").join("intelligence");
        std::fs::create_dir_all(&dir)?;
        let path = dir.join("dependency_graph.json");
        let serialized = serde_json::to_vec_pretty(&self.to_json(project_root))?;
        let tmp_path = path.with_extension(format!("tmp.{}", std::process::id()));
        std::fs::write(&tmp_path, &serialized)?;
        std::fs::rename(&tmp_path, &path)?;
        Ok(())
    }
}

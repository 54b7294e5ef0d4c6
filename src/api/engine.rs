//! `WardenEngine`: the facade a host program builds against instead of
//! wiring up `PipelineOrchestrator` and file discovery itself.
//!
//! Grounded on a struct wrapping the internal pipeline plus an
//! `Arc<Config>`, with `analyze_directory`/`analyze_files` methods that
//! validate the path, run the pipeline, and convert to a public results
//! type, and on an `ignore`-crate directory walk for the files
//! `scan_directory` discovers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ignore::WalkBuilder;
use tracing::{info, warn};

use crate::core::config::WardenConfig;
use crate::core::errors::{Result, WardenError};
use crate::core::file_utils::FileReader;
use crate::core::intelligence::DependencyGraph;
use crate::core::model::CodeFile;
use crate::lang::detect_language;
use crate::pipeline::orchestrator::PipelineOrchestrator;
use crate::pipeline::result_builder::ScanResult;

/// Configuration a host passes to build a [`WardenEngine`]: where the
/// project lives (for baseline lookup and path normalization, spec.md
/// §4.9) and the validated pipeline configuration (spec.md §4.7-§5). Host
/// programs own loading `.warden/config.yaml` into a `WardenConfig` via
/// [`WardenConfig::from_yaml`] — config-file loading itself is a Non-goal
/// (spec.md §1).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Root of the project being scanned.
    pub project_root: PathBuf,
    /// The validated pipeline configuration.
    pub warden: WardenConfig,
}

impl EngineConfig {
    /// Build a config for `project_root` with default pipeline settings.
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self { project_root: project_root.into(), warden: WardenConfig::default() }
    }

    /// Build a config for `project_root` with an explicit `WardenConfig`.
    pub fn with_config(project_root: impl Into<PathBuf>, warden: WardenConfig) -> Self {
        Self { project_root: project_root.into(), warden }
    }
}

/// Facade over `PipelineOrchestrator`: the one documented entry point a
/// host program depends on (SPEC_FULL.md §1).
pub struct WardenEngine {
    orchestrator: Arc<PipelineOrchestrator>,
    project_root: PathBuf,
}

impl WardenEngine {
    /// Build an engine for `config.project_root`, constructing the LLM
    /// client and frame set up front so `scan_file`/`scan_directory` stay
    /// cheap per call.
    pub fn new(config: EngineConfig) -> Result<Self> {
        info!(project_root = %config.project_root.display(), "initializing warden engine");
        let orchestrator = PipelineOrchestrator::new(config.project_root.clone(), config.warden)?;
        Ok(Self { orchestrator: Arc::new(orchestrator), project_root: config.project_root })
    }

    /// Scan a single file, reading its content from disk.
    pub async fn scan_file(&self, path: impl AsRef<Path>) -> Result<ScanResult> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(WardenError::io(format!("file does not exist: {}", path.display()), std::io::Error::new(std::io::ErrorKind::NotFound, "file not found")));
        }
        let content = FileReader::read_to_string(path)?;
        Ok(self.orchestrator.run_file(path.to_path_buf(), content).await)
    }

    /// Scan every analyzable file under `path`, honoring `.gitignore` and
    /// `.ignore` rules the way `ignore::WalkBuilder` does by default.
    /// Files with no detected language (spec.md §4.2, five languages
    /// supported) are skipped rather than failing the whole scan.
    ///
    /// Also builds the project-wide import dependency graph (spec.md §6
    /// `.warden/intelligence/dependency_graph.json`, §9's "Cyclic graphs"
    /// design note) across every discovered file and persists it — this is
    /// cross-file project intelligence, so it lives at the directory-scan
    /// level rather than inside any one file's `PipelineContext`. A failure
    /// to write it is logged and otherwise ignored; it never fails the
    /// scan itself.
    pub async fn scan_directory(&self, path: impl AsRef<Path>) -> Result<Vec<ScanResult>> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(WardenError::io(format!("path does not exist: {}", path.display()), std::io::Error::new(std::io::ErrorKind::NotFound, "path not found")));
        }
        if !path.is_dir() {
            return Err(WardenError::validation(format!("path is not a directory: {}", path.display())));
        }

        let mut files = Vec::new();
        for entry in WalkBuilder::new(path).build() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(error) => {
                    warn!(%error, "skipping unreadable directory entry");
                    continue;
                }
            };
            if !entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
                continue;
            }
            let Some(language) = detect_language(entry.path()) else { continue };
            match FileReader::read_to_string(entry.path()) {
                Ok(content) => files.push(CodeFile::new(entry.path().to_path_buf(), content, Some(language))),
                Err(error) => warn!(%error, file = %entry.path().display(), "skipping file that failed to read"),
            }
        }

        let graph = DependencyGraph::build(&files);
        if let Err(error) = graph.write(&self.project_root) {
            warn!(%error, "failed to persist project dependency graph, continuing without it");
        }

        let mut results = Vec::with_capacity(files.len());
        for file in &files {
            results.push(self.orchestrator.run_file(file.path.clone(), file.content.clone()).await);
        }

        info!(project_root = %self.project_root.display(), files_scanned = results.len(), "directory scan complete");
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn engine(root: &Path) -> WardenEngine {
        let mut config = EngineConfig::new(root);
        config.warden.llm.use_llm = false;
        WardenEngine::new(config).unwrap()
    }

    #[tokio::test]
    async fn scan_file_reports_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        let error = engine.scan_file(dir.path().join("missing.py")).await.unwrap_err();
        assert!(matches!(error, WardenError::Io { .. }));
    }

    #[tokio::test]
    async fn scan_directory_rejects_a_file_path() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("app.py");
        fs::write(&file_path, "x = 1\n").unwrap();
        let engine = engine(dir.path());
        let error = engine.scan_directory(&file_path).await.unwrap_err();
        assert!(matches!(error, WardenError::Validation { .. }));
    }

    #[tokio::test]
    async fn scan_directory_skips_unsupported_extensions_and_scans_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("app.py"), "def f():\n    return 1\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "not code").unwrap();
        let engine = engine(dir.path());
        let results = engine.scan_directory(dir.path()).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].file_path.file_name().unwrap(), "app.py");
    }
}

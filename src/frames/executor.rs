//! Frame execution layer (spec.md §4.6): strategy selection, pre/post
//! rule gates, per-file dynamic timeout, and result storage.
//!
//! Grounded on
//! `original_source/.../orchestrator/frame_executor.py`'s
//! `_execute_frame_with_rules`/`_execute_frames_sequential`/
//! `_execute_frames_parallel`/`_execute_frames_fail_fast` and
//! `_get_frames_to_execute`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::StreamExt;
use tracing::{debug, warn};

use crate::core::config::{ExecutionStrategy, FrameExecutionConfig};
use crate::core::errors::Result;
use crate::core::model::{CodeFile, FileContext, Finding, FrameResult, FrameResultEntry, FrameStatus, Severity, VerificationMetadata};
use crate::frames::checks::Check;
use crate::frames::registry::find_frame_by_name;
use crate::frames::Frame;

/// A pre/post rule attached to a frame: a narrow `Check` whose findings,
/// if any are `is_blocker`, gate the frame run (pre) or are logged (post).
pub struct RuleGate {
    pub check: Arc<dyn Check>,
    pub on_fail_stop: bool,
}

#[derive(Default)]
pub struct FrameRunConfig {
    pub pre_rules: Vec<RuleGate>,
    pub post_rules: Vec<RuleGate>,
}

pub struct FrameExecutor {
    frames: Vec<Arc<dyn Frame>>,
    config: FrameExecutionConfig,
    rule_configs: HashMap<String, FrameRunConfig>,
    uses_local_provider: bool,
}

impl FrameExecutor {
    pub fn new(frames: Vec<Arc<dyn Frame>>, config: FrameExecutionConfig, uses_local_provider: bool) -> Self {
        Self { frames, config, rule_configs: HashMap::new(), uses_local_provider }
    }

    pub fn with_rule_config(mut self, frame_id: impl Into<String>, rules: FrameRunConfig) -> Self {
        self.rule_configs.insert(frame_id.into(), rules);
        self
    }

    /// `timeout = clamp(size_bytes / bytes_per_second, min_floor, max_ceiling)`
    /// (spec.md §4.6). Local-provider scans use the higher floor.
    pub fn dynamic_timeout(&self, size_bytes: u64) -> Duration {
        let floor = if self.uses_local_provider {
            self.config.min_timeout_local_secs
        } else {
            self.config.min_timeout_secs
        };
        let raw = size_bytes / self.config.bytes_per_second.max(1);
        Duration::from_secs(raw.clamp(floor, self.config.max_timeout_secs))
    }

    /// Resolve the frames to run for this scan. `None` (classification did
    /// not run — a precondition failure) falls back to every loaded frame.
    /// `Some([])` (classification ran and selected nothing, spec.md §3) is
    /// distinct and runs zero frames cleanly, never the run-all fallback
    /// (spec.md §8). A non-empty selection resolves each hint against the
    /// loaded frames; only if *none* of the hints match does it fall back
    /// to running every frame, with a warning (spec.md §4.6).
    fn frames_to_run(&self, selected: Option<&[String]>, warnings: &mut Vec<String>) -> Vec<Arc<dyn Frame>> {
        let Some(selected) = selected else {
            return self.frames.clone();
        };
        if selected.is_empty() {
            return Vec::new();
        }

        let mut resolved = Vec::new();
        for hint in selected {
            match find_frame_by_name(&self.frames, hint) {
                Some(frame) => resolved.push(frame.clone()),
                None => warnings.push(format!("no loaded frame matched selection hint '{hint}'")),
            }
        }
        if resolved.is_empty() {
            warnings.push("no selected frame hint matched any loaded frame; running all frames".to_string());
            return self.frames.clone();
        }
        resolved
    }

    fn excluded_by_file_context(&self, file_context: FileContext) -> bool {
        !self.config.include_test_files
            && matches!(file_context, FileContext::Test | FileContext::Example | FileContext::Documentation)
    }

    /// Run every applicable frame against `file`, storing results into
    /// `entries` keyed by frame id, in the configured execution strategy.
    /// `priority_overrides`, when given, is the Classification phase's
    /// `frame_priorities` map (spec.md §4.7); a frame present in it sorts
    /// by the override instead of its own static `metadata().priority`.
    pub async fn run(
        &self,
        file: &CodeFile,
        file_context: FileContext,
        selected_frames: Option<&[String]>,
        priority_overrides: Option<&HashMap<String, u32>>,
        warnings: &mut Vec<String>,
    ) -> HashMap<String, FrameResultEntry> {
        let mut entries = HashMap::new();
        if self.excluded_by_file_context(file_context) {
            return entries;
        }

        let mut frames = self.frames_to_run(selected_frames, warnings);
        frames.sort_by_key(|f| {
            priority_overrides
                .and_then(|overrides| overrides.get(&f.metadata().frame_id))
                .copied()
                .unwrap_or(f.metadata().priority)
        });

        match self.config.strategy {
            ExecutionStrategy::Sequential => {
                for frame in &frames {
                    let entry = self.execute_one(frame, file).await;
                    entries.insert(frame.metadata().frame_id.clone(), entry);
                }
            }
            ExecutionStrategy::FailFast => {
                for frame in &frames {
                    let entry = self.execute_one(frame, file).await;
                    let blocker_hit = entry
                        .result
                        .as_ref()
                        .map(|r| r.findings.iter().any(|f| f.is_blocker && f.severity == Severity::Critical))
                        .unwrap_or(false);
                    entries.insert(frame.metadata().frame_id.clone(), entry);
                    if blocker_hit {
                        break;
                    }
                }
            }
            ExecutionStrategy::Parallel => {
                // Bounded cooperative fan-out (spec.md §5): `buffer_unordered`
                // polls at most `parallel_limit` of these futures at a time,
                // all within this task, so a panic in one never aborts its
                // peers and no `'static`/`Send`-across-tasks bound is needed.
                let tasks = frames.iter().map(|frame| async move {
                    let entry = self.execute_one(frame, file).await;
                    (frame.metadata().frame_id.clone(), entry)
                });
                let results: Vec<_> = futures::stream::iter(tasks)
                    .buffer_unordered(self.config.parallel_limit.max(1))
                    .collect()
                    .await;
                for (frame_id, entry) in results {
                    entries.insert(frame_id, entry);
                }
            }
        }

        entries
    }

    async fn execute_one(&self, frame: &Arc<dyn Frame>, file: &CodeFile) -> FrameResultEntry {
        let frame_id = frame.metadata().frame_id.clone();
        let rule_config = self.rule_configs.get(&frame_id);

        let mut pre_violations = Vec::new();
        if let Some(rules) = rule_config {
            for gate in &rules.pre_rules {
                if let Ok(result) = gate.check.run(file) {
                    let blocker = result.findings.iter().any(|f| f.is_blocker);
                    pre_violations.extend(result.findings);
                    if blocker && gate.on_fail_stop {
                        debug!(frame_id, "pre-rule blocker violation with on_fail=stop; skipping frame");
                        return FrameResultEntry { result: None, pre_violations, post_violations: Vec::new() };
                    }
                }
            }
        }

        let timeout = self.dynamic_timeout(file.size_bytes());
        let result = match tokio::time::timeout(timeout, frame.execute(file)).await {
            Ok(Ok(result)) => result,
            Ok(Err(error)) => error_result(&frame_id, &frame.metadata().name, frame.metadata().is_blocker, &error.to_string()),
            Err(_) => timeout_result(&frame_id, &frame.metadata().name, frame.metadata().is_blocker, file, timeout),
        };

        let mut post_violations = Vec::new();
        if let Some(rules) = rule_config {
            for gate in &rules.post_rules {
                if let Ok(check_result) = gate.check.run(file) {
                    let blocker = check_result.findings.iter().any(|f| f.is_blocker);
                    if blocker {
                        warn!(frame_id, "post-rule blocker violation (not retroactively reset)");
                    }
                    post_violations.extend(check_result.findings);
                }
            }
        }

        FrameResultEntry { result: Some(result), pre_violations, post_violations }
    }
}

fn timeout_result(frame_id: &str, frame_name: &str, is_blocker: bool, file: &CodeFile, elapsed: Duration) -> FrameResult {
    let finding = Finding {
        id: Finding::new_id("WARDEN-TIMEOUT"),
        severity: Severity::Medium,
        message: format!("Frame '{frame_name}' exceeded its {:.0}s per-file timeout", elapsed.as_secs_f64()),
        location: file.path.display().to_string(),
        detail: "The frame did not complete within its dynamic per-file deadline.".to_string(),
        code_snippet: String::new(),
        rule_id: "WARDEN-TIMEOUT".to_string(),
        file_path: file.path.clone(),
        is_blocker: false,
        verification_metadata: VerificationMetadata::default(),
        machine_context: None,
    };
    FrameResult {
        frame_id: frame_id.to_string(),
        frame_name: frame_name.to_string(),
        status: FrameStatus::Timeout,
        duration: elapsed,
        issues_found: 1,
        is_blocker,
        findings: vec![finding],
        metadata: Default::default(),
    }
}

fn error_result(frame_id: &str, frame_name: &str, is_blocker: bool, message: &str) -> FrameResult {
    FrameResult {
        frame_id: frame_id.to_string(),
        frame_name: frame_name.to_string(),
        status: FrameStatus::Error,
        duration: Duration::ZERO,
        issues_found: 0,
        is_blocker,
        findings: Vec::new(),
        metadata: HashMap::from([("error".to_string(), serde_json::Value::String(message.to_string()))]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::{FrameMetadata, FrameScope};
    use crate::lang::Language;
    use async_trait::async_trait;
    use std::path::PathBuf;

    struct Instant {
        metadata: FrameMetadata,
        delay: Duration,
        findings: Vec<Finding>,
    }

    fn finding(critical: bool) -> Finding {
        Finding {
            id: Finding::new_id("T"),
            severity: if critical { Severity::Critical } else { Severity::Low },
            message: "m".into(),
            location: "f:1".into(),
            detail: "d".into(),
            code_snippet: String::new(),
            rule_id: "T".into(),
            file_path: PathBuf::from("f"),
            is_blocker: critical,
            verification_metadata: VerificationMetadata::default(),
            machine_context: None,
        }
    }

    #[async_trait]
    impl Frame for Instant {
        fn metadata(&self) -> &FrameMetadata {
            &self.metadata
        }
        async fn execute(&self, _file: &CodeFile) -> Result<FrameResult> {
            tokio::time::sleep(self.delay).await;
            let findings = self.findings.clone();
            Ok(FrameResult {
                frame_id: self.metadata.frame_id.clone(),
                frame_name: self.metadata.name.clone(),
                status: FrameResult::status_from_findings(&findings),
                duration: self.delay,
                issues_found: findings.len(),
                is_blocker: self.metadata.is_blocker,
                findings,
                metadata: Default::default(),
            })
        }
    }

    fn meta(id: &str, priority: u32) -> FrameMetadata {
        FrameMetadata {
            frame_id: id.to_string(),
            name: id.to_string(),
            description: String::new(),
            category: String::new(),
            priority,
            scope: FrameScope::FileLevel,
            is_blocker: true,
            version: "1".into(),
            author: "t".into(),
            applicability: vec![],
        }
    }

    fn file() -> CodeFile {
        CodeFile::new(PathBuf::from("app.py"), "x = 1", Some(Language::Python))
    }

    #[tokio::test]
    async fn sequential_runs_every_frame() {
        let frames: Vec<Arc<dyn Frame>> = vec![
            Arc::new(Instant { metadata: meta("a", 0), delay: Duration::from_millis(1), findings: vec![] }),
            Arc::new(Instant { metadata: meta("b", 1), delay: Duration::from_millis(1), findings: vec![] }),
        ];
        let executor = FrameExecutor::new(frames, FrameExecutionConfig { strategy: ExecutionStrategy::Sequential, ..Default::default() }, false);
        let mut warnings = Vec::new();
        let entries = executor.run(&file(), FileContext::Production, None, None, &mut warnings).await;
        assert_eq!(entries.len(), 2);
    }

    #[tokio::test]
    async fn fail_fast_stops_after_blocker() {
        let frames: Vec<Arc<dyn Frame>> = vec![
            Arc::new(Instant { metadata: meta("a", 0), delay: Duration::from_millis(1), findings: vec![finding(true)] }),
            Arc::new(Instant { metadata: meta("b", 1), delay: Duration::from_millis(1), findings: vec![] }),
        ];
        let executor = FrameExecutor::new(frames, FrameExecutionConfig { strategy: ExecutionStrategy::FailFast, ..Default::default() }, false);
        let mut warnings = Vec::new();
        let entries = executor.run(&file(), FileContext::Production, None, None, &mut warnings).await;
        assert_eq!(entries.len(), 1);
        assert!(entries.contains_key("a"));
    }

    #[tokio::test]
    async fn test_file_excluded_unless_opted_in() {
        let frames: Vec<Arc<dyn Frame>> = vec![Arc::new(Instant { metadata: meta("a", 0), delay: Duration::from_millis(1), findings: vec![] })];
        let executor = FrameExecutor::new(frames, FrameExecutionConfig::default(), false);
        let mut warnings = Vec::new();
        let entries = executor.run(&file(), FileContext::Test, None, None, &mut warnings).await;
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn timeout_produces_synthetic_finding() {
        let frames: Vec<Arc<dyn Frame>> =
            vec![Arc::new(Instant { metadata: meta("slow", 0), delay: Duration::from_millis(200), findings: vec![] })];
        let config = FrameExecutionConfig { bytes_per_second: 1_000_000_000, min_timeout_secs: 0, max_timeout_secs: 0, ..Default::default() };
        let executor = FrameExecutor::new(frames, config, false);
        let mut warnings = Vec::new();
        let entries = executor.run(&file(), FileContext::Production, None, None, &mut warnings).await;
        let entry = entries.get("slow").unwrap();
        let result = entry.result.as_ref().unwrap();
        assert_eq!(result.status, FrameStatus::Timeout);
        assert_eq!(result.findings[0].rule_id, "WARDEN-TIMEOUT");
    }

    #[tokio::test]
    async fn unmatched_selection_falls_back_to_all_with_warning() {
        let frames: Vec<Arc<dyn Frame>> = vec![Arc::new(Instant { metadata: meta("a", 0), delay: Duration::from_millis(1), findings: vec![] })];
        let executor = FrameExecutor::new(frames, FrameExecutionConfig::default(), false);
        let mut warnings = Vec::new();
        let selected = vec!["bogus".to_string()];
        let entries = executor.run(&file(), FileContext::Production, Some(&selected), None, &mut warnings).await;
        assert_eq!(entries.len(), 1);
        assert!(!warnings.is_empty());
    }

    #[tokio::test]
    async fn empty_selection_runs_zero_frames() {
        let frames: Vec<Arc<dyn Frame>> = vec![Arc::new(Instant { metadata: meta("a", 0), delay: Duration::from_millis(1), findings: vec![] })];
        let executor = FrameExecutor::new(frames, FrameExecutionConfig::default(), false);
        let mut warnings = Vec::new();
        let selected: Vec<String> = Vec::new();
        let entries = executor.run(&file(), FileContext::Production, Some(&selected), None, &mut warnings).await;
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn none_selection_runs_every_loaded_frame() {
        let frames: Vec<Arc<dyn Frame>> = vec![Arc::new(Instant { metadata: meta("a", 0), delay: Duration::from_millis(1), findings: vec![] })];
        let executor = FrameExecutor::new(frames, FrameExecutionConfig::default(), false);
        let mut warnings = Vec::new();
        let entries = executor.run(&file(), FileContext::Production, None, None, &mut warnings).await;
        assert_eq!(entries.len(), 1);
    }
}

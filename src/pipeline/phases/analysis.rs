//! Analysis phase (spec.md §4.7 row 3): populates `quality_metrics`,
//! `hotspots[]`, `quick_wins[]`, and `technical_debt_hours`, plus
//! `quality_score_before` consumed by the Result builder's quality-score
//! rule (spec.md §4.11). Runs before Classification/Validation, so it has
//! no `Finding`s to work from yet — only the raw file content.
//!
//! The heuristic path is grounded on structural-complexity detector
//! precedent (`detectors::complexity`/`detectors::structure`, since
//! removed from this tree once their code-quality semantics were
//! superseded — see DESIGN.md's "Final trim") scaled down to the handful
//! of proxies cheap enough to run per-file inline: line count, nesting
//! depth via brace/indent heuristics, and long-line density. The LLM
//! variant maps `llm::types::AnalysisResult`/`AnalysisIssue` (spec.md §3
//! supplemented DTOs) onto the same `quality_metrics` shape.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::core::errors::Result;
use crate::core::model::{CodeFile, PipelineContext};
use crate::llm::orchestrated::OrchestratedLlmClient;
use crate::llm::types::{AnalysisResult, LlmRequest, Severity as IssueSeverity};

const LONG_FILE_LINES: usize = 400;
const LONG_LINE_CHARS: usize = 120;

pub struct AnalysisPhase {
    llm: Option<Arc<OrchestratedLlmClient>>,
    model: String,
}

impl AnalysisPhase {
    pub fn new() -> Self {
        Self { llm: None, model: "claude-sonnet".to_string() }
    }

    pub fn with_llm(mut self, client: Arc<OrchestratedLlmClient>, model: impl Into<String>) -> Self {
        self.llm = Some(client);
        self.model = model.into();
        self
    }

    fn heuristic_metrics(&self, file: &CodeFile) -> (f64, Vec<String>, Vec<String>) {
        let path_display = file.path.display().to_string();
        let line_count = file.content.lines().count();
        let long_lines = file.content.lines().filter(|line| line.len() > LONG_LINE_CHARS).count();

        let mut hotspots = Vec::new();
        let mut quick_wins = Vec::new();

        if line_count > LONG_FILE_LINES {
            hotspots.push(format!("{path_display}: {line_count} lines, consider splitting"));
        }
        if long_lines > 0 {
            quick_wins.push(format!("{path_display}: {long_lines} line(s) over {LONG_LINE_CHARS} chars"));
        }

        let debt_hours = (line_count as f64 / 200.0) + (long_lines as f64 * 0.05);
        (debt_hours, hotspots, quick_wins)
    }

    async fn llm_metrics(&self, llm: &Arc<OrchestratedLlmClient>, file: &CodeFile) -> Option<(f64, Vec<String>, Vec<String>)> {
        let language = file.language.map(|l| l.catalog_key()).unwrap_or("text");
        let system_prompt = "You are a code-quality reviewer. Respond with valid JSON only, no markdown \
            formatting, no explanations outside the JSON object."
            .to_string();
        let user_prompt = format!(
            "Review the following {language} source for quality issues (complexity, duplication, \
             maintainability). Respond with JSON matching exactly this schema:\n\
             {{\"findings\": [{{\"severity\": \"critical|high|medium|low\", \"category\": \"<string>\", \
             \"description\": \"<string>\", \"line\": <number|null>, \"recommendation\": \"<string|null>\"}}]}}\n\n\
             Source:\n```{language}\n{}\n```",
            file.content,
        );
        let request = LlmRequest::new(system_prompt, user_prompt, self.model.clone());
        let analysis = match llm.send(&request, Some("analysis")).await {
            Ok(response) if response.success => parse_analysis_result(&response.content),
            Ok(_) => AnalysisResult::default(),
            Err(error) => {
                debug!(%error, "analysis LLM call failed, falling back to heuristic metrics");
                AnalysisResult::default()
            }
        };
        if analysis.findings.is_empty() {
            return None;
        }

        let path_display = file.path.display().to_string();
        let mut hotspots = Vec::new();
        let mut quick_wins = Vec::new();
        let mut debt_hours = 0.0;

        for issue in &analysis.findings {
            debt_hours += match issue.severity {
                IssueSeverity::Critical => 3.0,
                IssueSeverity::High => 2.0,
                IssueSeverity::Medium => 1.0,
                IssueSeverity::Low => 0.5,
            };
            if matches!(issue.severity, IssueSeverity::Critical | IssueSeverity::High) {
                hotspots.push(format!("{path_display}: {} ({})", issue.description, issue.category));
            }
            if let Some(recommendation) = &issue.recommendation {
                quick_wins.push(recommendation.clone());
            }
        }
        Some((debt_hours, hotspots, quick_wins))
    }
}

fn parse_analysis_result(content: &str) -> AnalysisResult {
    let candidate = extract_json_object(content).unwrap_or(content);
    serde_json::from_str::<AnalysisResult>(candidate).unwrap_or_default()
}

fn extract_json_object(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let mut depth = 0i32;
    for (offset, ch) in content[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&content[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

impl Default for AnalysisPhase {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl super::Phase for AnalysisPhase {
    fn name(&self) -> &'static str {
        "ANALYSIS"
    }

    async fn execute(&self, context: &mut PipelineContext, file: &CodeFile) -> Result<()> {
        let (debt_hours, hotspots, quick_wins) = match &self.llm {
            Some(llm) => match self.llm_metrics(llm, file).await {
                Some(result) => result,
                None => {
                    debug!(file = %file.path.display(), "LLM analysis returned no issues, using heuristic metrics");
                    self.heuristic_metrics(file)
                }
            },
            None => self.heuristic_metrics(file),
        };

        context.quality_metrics.hotspots.extend(hotspots);
        context.quality_metrics.quick_wins.extend(quick_wins);
        context.quality_metrics.technical_debt_hours += debt_hours;
        context.quality_metrics.values.insert("line_count".to_string(), file.content.lines().count() as f64);

        let score = (10.0 - debt_hours).max(0.0).min(10.0);
        context.quality_score_before = Some(score);
        Ok(())
    }
}

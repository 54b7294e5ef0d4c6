//! Verification phase (spec.md §4.8): a false-positive pass over every
//! finding already produced by Validation. Asks the LLM which finding ids
//! survive, drops the rest, and re-aggregates `context.findings`.
//!
//! Per spec.md §4.8, a frame's `status` is never retroactively flipped
//! here even if every one of its findings is dropped — `FrameResult.status`
//! reflects what the frame itself observed, not the post-verification
//! count. `review_required` is set (never `is_blocker` cleared) when the
//! verifier flags a finding as ambiguous rather than rejecting it outright.
//!
//! Grounded on
//! `original_source/.../pipeline/application/phase_orchestrator.py`'s
//! `_execute_verification_async`, and reuses
//! `frames::security::llm_verify`'s JSON-extraction idiom for the reply
//! schema, since no dedicated verification-reply schema exists in the
//! retrieval pack beyond `llm::types::LlmRequest`/`LlmResponse`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::core::errors::Result;
use crate::core::model::{CodeFile, PipelineContext};
use crate::llm::orchestrated::OrchestratedLlmClient;
use crate::llm::types::LlmRequest;

pub struct VerificationPhase {
    llm: Arc<OrchestratedLlmClient>,
    model: String,
}

impl VerificationPhase {
    pub fn new(llm: Arc<OrchestratedLlmClient>, model: impl Into<String>) -> Self {
        Self { llm, model: model.into() }
    }

    async fn verdicts_for(&self, file: &CodeFile, summaries: &[(String, String)]) -> Option<HashMap<String, Verdict>> {
        let language = file.language.map(|l| l.catalog_key()).unwrap_or("text");
        let listing: Vec<String> = summaries.iter().map(|(id, message)| format!("- {id}: {message}")).collect();
        let system_prompt = "You are a security reviewer performing a final false-positive check. Respond \
            with valid JSON only, matching exactly the schema given, no markdown formatting, no explanations \
            outside the JSON object."
            .to_string();
        let user_prompt = format!(
            "The following findings were raised against a {language} file. For each, decide whether it is a \
             real issue (`keep`), a false positive (`reject`), or ambiguous enough that a human should look \
             (`review`). Respond with JSON matching exactly this schema:\n\
             {{\"verdicts\": [{{\"id\": \"<string>\", \"verdict\": \"keep|reject|review\", \"rationale\": \"<string|null>\"}}]}}\n\n\
             Findings:\n{}\n\nSource:\n```{language}\n{}\n```",
            listing.join("\n"),
            file.content,
        );
        let request = LlmRequest::new(system_prompt, user_prompt, self.model.clone());
        match self.llm.send(&request, Some("verification")).await {
            Ok(response) if response.success => parse_verdicts(&response.content),
            Ok(_) => None,
            Err(error) => {
                debug!(%error, "verification LLM call failed, keeping all findings unverified");
                None
            }
        }
    }
}

#[async_trait]
impl super::Phase for VerificationPhase {
    fn name(&self) -> &'static str {
        "VERIFICATION"
    }

    async fn execute(&self, context: &mut PipelineContext, file: &CodeFile) -> Result<()> {
        if context.findings.is_empty() {
            return Ok(());
        }

        let summaries: Vec<(String, String)> = context.findings.iter().map(|f| (f.id.clone(), f.message.clone())).collect();
        let Some(verdicts) = self.verdicts_for(file, &summaries).await else {
            context.warnings.push("verification LLM call failed or returned an unparseable reply; findings left unverified".to_string());
            return Ok(());
        };

        for entry in context.frame_results.values_mut() {
            let Some(result) = entry.result.as_mut() else { continue };
            result.findings.retain_mut(|finding| match verdicts.get(&finding.id) {
                Some(Verdict::Reject) => false,
                Some(Verdict::Review) => {
                    finding.verification_metadata.review_required = true;
                    true
                }
                Some(Verdict::Keep) | None => true,
            });
            result.issues_found = result.findings.len();
        }

        context.reaggregate_findings();
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Keep,
    Reject,
    Review,
}

#[derive(Debug, Deserialize)]
struct RawVerdict {
    id: String,
    verdict: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawVerdicts {
    #[serde(default)]
    verdicts: Vec<RawVerdict>,
}

fn parse_verdicts(content: &str) -> Option<HashMap<String, Verdict>> {
    let candidate = extract_json_object(content)?;
    let raw = serde_json::from_str::<RawVerdicts>(candidate).ok()?;
    Some(
        raw.verdicts
            .into_iter()
            .filter_map(|v| {
                let verdict = match v.verdict.to_ascii_lowercase().as_str() {
                    "keep" => Verdict::Keep,
                    "reject" => Verdict::Reject,
                    "review" => Verdict::Review,
                    _ => return None,
                };
                Some((v.id, verdict))
            })
            .collect(),
    )
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{Finding, FrameResult, FrameResultEntry, FrameStatus, Severity, VerificationMetadata};
    use crate::lang::Language;
    use std::path::PathBuf;

    fn ctx() -> PipelineContext {
        PipelineContext::new(PathBuf::from("/p"), PathBuf::from("/p/app.py"), "x".into(), Some(Language::Python))
    }

    fn finding(id: &str) -> Finding {
        Finding {
            id: id.to_string(),
            severity: Severity::High,
            message: "m".into(),
            location: "app.py:1".into(),
            detail: "d".into(),
            code_snippet: String::new(),
            rule_id: "T".into(),
            file_path: PathBuf::from("app.py"),
            is_blocker: false,
            verification_metadata: VerificationMetadata::default(),
            machine_context: None,
        }
    }

    fn seed_context(context: &mut PipelineContext, findings: Vec<Finding>) {
        let result = FrameResult {
            frame_id: "security".into(),
            frame_name: "Security".into(),
            status: FrameStatus::Warning,
            duration: std::time::Duration::from_millis(1),
            issues_found: findings.len(),
            is_blocker: true,
            findings,
            metadata: Default::default(),
        };
        context.frame_results.insert("security".into(), FrameResultEntry { result: Some(result), pre_violations: vec![], post_violations: vec![] });
        context.reaggregate_findings();
    }

    #[test]
    fn parses_well_formed_verdicts() {
        let content = r#"{"verdicts":[{"id":"a","verdict":"keep"},{"id":"b","verdict":"reject"}]}"#;
        let verdicts = parse_verdicts(content).unwrap();
        assert_eq!(verdicts.get("a"), Some(&Verdict::Keep));
        assert_eq!(verdicts.get("b"), Some(&Verdict::Reject));
    }

    #[tokio::test]
    async fn no_findings_skips_llm_call_entirely() {
        let mut context = ctx();
        let file = CodeFile::new(PathBuf::from("/p/app.py"), "x = 1", Some(Language::Python));
        let smart: Arc<dyn crate::llm::client::ILlmClient> = Arc::new(crate::llm::providers::offline::OfflineClient::new());
        let llm = Arc::new(OrchestratedLlmClient::new(vec![], smart, std::time::Duration::from_secs(1)));
        VerificationPhase::new(llm, "claude-haiku").execute(&mut context, &file).await.unwrap();
        assert!(context.findings.is_empty());
    }

    #[test]
    fn frame_status_untouched_when_all_findings_dropped() {
        let mut context = ctx();
        seed_context(&mut context, vec![finding("a")]);
        let entry = context.frame_results.get_mut("security").unwrap();
        entry.result.as_mut().unwrap().findings.clear();
        assert_eq!(entry.result.as_ref().unwrap().status, FrameStatus::Warning);
    }
}

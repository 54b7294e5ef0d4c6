//! The provider-client contract (spec.md §4.3) and its default,
//! provider-independent convenience methods.
//!
//! Grounded on `original_source/src/warden/llm/providers/base.py`'s
//! abstract base: `send_async` never raises (transport failures become
//! `LlmResponse { success: false, .. }`), while `complete_async` and
//! `analyze_security_async` are default methods layered on top that *do*
//! raise, because a caller asking for parsed content has no sane fallback
//! once the call fails.

use async_trait::async_trait;
use serde_json::Value;

use crate::core::errors::{Result, WardenError};
use crate::llm::types::{AnalysisResult, LlmProvider, LlmRequest, LlmResponse};

/// A single provider's chat-completion transport. Implementors cover
/// hosted HTTP APIs (OpenAI, Anthropic, Azure, Groq, OpenRouter,
/// DeepSeek, QwenCode, Gemini), a local HTTP daemon (Ollama), CLI
/// subprocesses (Claude Code, Codex), and the no-op `Offline` client.
#[async_trait]
pub trait ILlmClient: Send + Sync {
    /// Which provider this client speaks for.
    fn provider(&self) -> LlmProvider;

    /// Send one request. Must never return `Err` for a transport-level
    /// failure (timeout, connection refused, non-2xx, malformed body) —
    /// those become `Ok(LlmResponse { success: false, .. })` so the
    /// tiered-racing/resilience layers can distinguish "this provider
    /// failed" from "the call itself is unusable" (spec.md §4.3).
    async fn send(&self, request: &LlmRequest) -> Result<LlmResponse>;

    /// Cheap reachability probe (credential present, endpoint responds),
    /// used to skip a provider before it would certainly fail.
    async fn is_available(&self) -> bool;

    /// `send`, but raising on failure — for callers (like the orchestrated
    /// client's smart tier) that want the resilience layer to observe and
    /// retry the error rather than silently returning empty content.
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse> {
        let response = self.send(request).await?;
        if !response.success {
            return Err(WardenError::transport(
                self.provider().as_str(),
                response.error.unwrap_or_else(|| "llm call failed".to_string()),
                true,
            ));
        }
        Ok(response)
    }

    /// Run the fixed security-analysis prompt/schema (spec.md §6) against
    /// `source`, parsing the reply as [`AnalysisResult`]. Falls back to an
    /// empty result set on any parse failure rather than propagating —
    /// `analyze_security_async` in the Python source does the same, since
    /// a malformed LLM reply should degrade to "no LLM-sourced findings",
    /// not abort the frame.
    async fn analyze_security(&self, source: &str, language: &str, model: &str) -> AnalysisResult {
        let system_prompt = security_analysis_system_prompt();
        let user_prompt = security_analysis_user_prompt(source, language);
        let request = LlmRequest::new(system_prompt, user_prompt, model);

        match self.complete(&request).await {
            Ok(response) => parse_analysis_result(&response.content),
            Err(_) => AnalysisResult::default(),
        }
    }
}

fn security_analysis_system_prompt() -> String {
    "You are a security code reviewer. Respond with valid JSON only, no markdown formatting, \
     no explanations outside the JSON object."
        .to_string()
}

fn security_analysis_user_prompt(source: &str, language: &str) -> String {
    format!(
        "Analyze the following {language} source for security issues. \
         Respond with JSON matching exactly this schema:\n\
         {{\"findings\": [{{\"severity\": \"critical|high|medium|low\", \"category\": \"<string>\", \
         \"description\": \"<string>\", \"line\": <number|null>, \"recommendation\": \"<string|null>\"}}]}}\n\n\
         Source:\n```{language}\n{source}\n```",
    )
}

/// Parse an LLM reply as [`AnalysisResult`], tolerating a markdown code
/// fence around the JSON body (a common hosted-model quirk) before
/// falling back to an empty result.
fn parse_analysis_result(content: &str) -> AnalysisResult {
    let candidate = extract_json_object(content).unwrap_or(content);
    serde_json::from_str::<AnalysisResult>(candidate)
        .or_else(|_| serde_json::from_str::<Value>(candidate).map(|_| AnalysisResult::default()))
        .unwrap_or_default()
}

/// Find the first `{...}` balanced object in `content`, stripping any
/// surrounding markdown fence or prose.
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

    #[test]
    fn parses_clean_json_reply() {
        let content = r#"{"findings": [{"severity": "high", "category": "injection", "description": "SQLi", "line": 12, "recommendation": "use params"}]}"#;
        let result = parse_analysis_result(content);
        assert_eq!(result.findings.len(), 1);
        assert_eq!(result.findings[0].line, Some(12));
    }

    #[test]
    fn parses_json_wrapped_in_markdown_fence() {
        let content = "```json\n{\"findings\": []}\n```";
        let result = parse_analysis_result(content);
        assert!(result.findings.is_empty());
    }

    #[test]
    fn malformed_reply_degrades_to_empty_result() {
        let result = parse_analysis_result("not json at all");
        assert!(result.findings.is_empty());
    }
}

use super::topics::pick_topic;
use crate::util::strip_control_chars;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Model requested from the proxy. The proxy substitutes its own model, so this
/// only matters when talking to a chat-completions endpoint directly.
pub const DEFAULT_MODEL: &str = "x-ai/grok-4.1-fast";
pub const DEFAULT_TEMPERATURE: f32 = 0.35;
pub const DEFAULT_TREE_TEMPERATURE: f32 = 0.4;

/// Path appended to the API base URL.
pub const PROXY_PATH: &str = "/openrouter";

/// How many of the recent topics are quoted back to the model as "avoid these".
const EXCLUSION_HINT_TOPICS: usize = 3;

/// Cap on how much of a failed response body is written to the log.
const MAX_LOGGED_ERROR_BODY: usize = 2048;

const SYSTEM_PROMPT: &str = "You are the author of an infinite, living document about Bitcoin. \
You possess deep knowledge of cryptography, economics, history, and computer science. \
You write in a raw, terminal-like style.";

#[derive(Debug, Error)]
pub enum GenerationError {
    /// Transport failure: DNS, connect, TLS, timeout, or a body read error.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    /// Non-2xx response. `body` is kept for diagnostics and never displayed.
    #[error("Generation API returned status {status}")]
    Status { status: u16, body: String },
    /// The response body was not a chat-completion document.
    #[error("Unreadable response: {0}")]
    Decode(String),
    /// The model answered with nothing usable.
    #[error("Generation returned no text")]
    EmptyContent,
    /// The task running the request panicked.
    #[error("Generation task panicked: {0}")]
    TaskPanicked(String),
}

impl GenerationError {
    /// Short message safe to show in the UI.
    pub fn user_message(&self) -> &'static str {
        match self {
            GenerationError::Network(e) if e.is_timeout() => "Request timed out.",
            GenerationError::Network(_) => "Connection interrupted.",
            GenerationError::Status { status: 429, .. } => "Rate limited. Try again shortly.",
            GenerationError::Status { status, .. } if *status >= 500 => {
                "Generation service unavailable."
            }
            GenerationError::Status { .. } => "Generation request rejected.",
            GenerationError::Decode(_) | GenerationError::EmptyContent => {
                "Received an empty transmission."
            }
            GenerationError::TaskPanicked(_) => "Internal error.",
        }
    }
}

/// Prose for one feed section and the topic it was written about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedText {
    pub text: String,
    pub topic: String,
}

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Debug, Serialize)]
pub(super) struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
pub(super) struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct ResponseFormat {
    #[serde(rename = "type")]
    pub kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

// ============================================================================
// HTTP Client
// ============================================================================

/// Build the shared HTTP client with pooling and a request timeout.
///
/// The feed's minimum loading delay is a floor; this timeout is the ceiling
/// that turns a hung proxy into a retryable `GenerationError::Network`.
pub fn build_http_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .pool_max_idle_per_host(4)
        .pool_idle_timeout(Duration::from_secs(30))
        .tcp_keepalive(Duration::from_secs(60))
        .timeout(timeout)
        .build()
}

/// Client for the text-generation proxy.
///
/// Cheap to clone; clones share the underlying connection pool, so one clone
/// can move into each spawned generation task.
#[derive(Clone, Debug)]
pub struct GenerationClient {
    http: reqwest::Client,
    endpoint: String,
    /// Sent as `Origin`; the proxy rejects requests without one it accepts.
    origin: Option<String>,
    model: String,
    temperature: f32,
    tree_temperature: f32,
}

impl GenerationClient {
    /// `api_base` is the proxy base URL without the `/openrouter` suffix.
    pub fn new(http: reqwest::Client, api_base: &str) -> Self {
        Self {
            http,
            endpoint: format!("{}{}", api_base.trim_end_matches('/'), PROXY_PATH),
            origin: origin_of(api_base),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            tree_temperature: DEFAULT_TREE_TEMPERATURE,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_tree_temperature(mut self, temperature: f32) -> Self {
        self.tree_temperature = temperature;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub(super) fn model(&self) -> &str {
        &self.model
    }

    pub(super) fn tree_temperature(&self) -> f32 {
        self.tree_temperature
    }

    /// Generate prose for one feed section.
    ///
    /// `forced_topic` is used verbatim when present (expanding a concept node);
    /// otherwise a topic is picked that avoids `recent_topics`. No retries:
    /// a failure is reported to the caller, who decides whether to try again.
    pub async fn generate(
        &self,
        recent_topics: &[String],
        forced_topic: Option<&str>,
    ) -> Result<GeneratedText, GenerationError> {
        let topic = match forced_topic {
            Some(topic) => topic.to_string(),
            None => pick_topic(recent_topics, &mut rand::thread_rng()).to_string(),
        };

        tracing::debug!(topic = %topic, forced = forced_topic.is_some(), "Generating section");

        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage::system(SYSTEM_PROMPT),
                ChatMessage::user(build_section_prompt(&topic, recent_topics)),
            ],
            stream: false,
            temperature: self.temperature,
            response_format: None,
        };

        let raw = self.complete(&request).await?;
        let text = clean_generated_text(&raw);
        if text.is_empty() {
            tracing::warn!(topic = %topic, "Generation returned empty text");
            return Err(GenerationError::EmptyContent);
        }

        Ok(GeneratedText { text, topic })
    }

    /// POST a chat request through the proxy and return the first choice's
    /// message content (empty when the response carries none).
    pub(super) async fn complete(&self, request: &ChatRequest<'_>) -> Result<String, GenerationError> {
        let mut builder = self.http.post(&self.endpoint).json(request);
        if let Some(origin) = &self.origin {
            builder = builder.header(reqwest::header::ORIGIN, origin.as_str());
        }
        let response = builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(
                status = status.as_u16(),
                body = %truncate_for_log(&body),
                "Generation request failed"
            );
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let parsed: ChatResponse =
            serde_json::from_str(&body).map_err(|e| GenerationError::Decode(e.to_string()))?;

        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .unwrap_or_default())
    }
}

/// `scheme://host[:port]` of the API base, or `None` if it has no tuple origin.
fn origin_of(api_base: &str) -> Option<String> {
    let origin = url::Url::parse(api_base).ok()?.origin();
    origin
        .is_tuple()
        .then(|| origin.ascii_serialization())
}

fn truncate_for_log(body: &str) -> &str {
    if body.len() <= MAX_LOGGED_ERROR_BODY {
        return body;
    }
    let mut end = MAX_LOGGED_ERROR_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

// ============================================================================
// Prompt and Post-processing
// ============================================================================

/// User prompt for one section: the style template plus an exclusion hint
/// naming the last few topics.
pub fn build_section_prompt(topic: &str, recent_topics: &[String]) -> String {
    let start = recent_topics.len().saturating_sub(EXCLUSION_HINT_TOPICS);
    let hint = recent_topics[start..].join("; ");
    let hint = if hint.is_empty() { "none" } else { hint.as_str() };

    format!(
        r#"Write a continuation for an infinite text file about Bitcoin.

Current Topic to Focus on: "{topic}"

Instructions:
1. Write 2-3 dense, high-quality paragraphs about this specific topic.
2. Style: Balance technical accuracy with philosophical cyberpunk flavor. Maximum one vivid metaphor per paragraph. When in doubt, choose clarity over atmosphere.
3. Clarity: Be clear first, precise second. Include at least one concrete fact or number per paragraph. Avoid heavy notation; favor plain language.
4. Relevance: Include one short anchor sentence in each paragraph explaining why this matters to a normal reader (security, autonomy, censorship-resistance).
5. Math markup ban: Avoid math symbols like $ or LaTeX notation; spell out concepts.
6. Format: Plain text only. NO markdown. Just raw paragraphs separated by newlines.
7. Tone: Serious, passionate, informative.
8. Do not write an intro or outro. Just the raw content.
9. Avoid repeating topics or specific arguments from these recent topics: {hint}.
10. Technical accuracy is paramount. Verify security claims, especially around: (a) what 51% attacks can and cannot do; (b) what difficulty adjustment does and does not prevent; (c) collision resistance numbers and what they imply; (d) causality: difficulty adjustment maintains target timing; it does not prevent attacks.
11. Avoid overclaiming. Use phrases like "computationally infeasible" instead of "impossible" or "unbreakable"."#
    )
}

/// Remove the markdown the model sneaks in despite instructions: heading
/// markers at line starts and bold delimiters. Also drops terminal control
/// sequences, then trims.
pub fn clean_generated_text(raw: &str) -> String {
    let raw = strip_control_chars(raw.trim());

    let lines: Vec<&str> = raw
        .split('\n')
        .map(|line| {
            let rest = line.trim_start_matches('#');
            if rest.len() != line.len() && rest.starts_with([' ', '\t']) {
                &rest[1..]
            } else {
                line
            }
        })
        .collect();

    lines.join("\n").replace("**", "").trim().to_string()
}

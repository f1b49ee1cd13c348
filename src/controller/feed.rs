//! Feed state machine: the append-only list of sections and the single
//! in-flight extension fetch.

use crate::generation::{GeneratedText, GenerationError};
use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};

/// Shown while a section is being generated.
pub const LOADING_MESSAGES: &[&str] = &[
    "Syncing to the latest timechain fragment... [|==>     ]",
    "Negotiating mempool fees for fresh prose... [fee/byte -> fair]",
    "Hashing a new block of words... [0000abcd...]",
    "Broadcasting a signed packet of thoughts... [node@127.0.0.1 -> net]",
    "Waiting for miners to confirm this paragraph... [pow nonce rolling]",
];

/// Number of trailing section topics passed to generation as "recent".
pub const RECENT_TOPIC_WINDOW: usize = 10;

static NEXT_SECTION_ID: AtomicU64 = AtomicU64::new(1);

fn next_section_id() -> String {
    format!(
        "section-{}-{}",
        chrono::Utc::now().timestamp_millis(),
        NEXT_SECTION_ID.fetch_add(1, Ordering::Relaxed)
    )
}

/// One generated unit of prose. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentSection {
    pub id: String,
    pub content: String,
    pub topic: String,
}

impl ContentSection {
    pub fn new(topic: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: next_section_id(),
            content: content.into(),
            topic: topic.into(),
        }
    }

    /// Non-empty, trimmed lines of the content.
    pub fn paragraphs(&self) -> impl Iterator<Item = &str> {
        self.content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadingState {
    #[default]
    Idle,
    Loading,
    Error,
}

/// A fetch the caller must run and report back through
/// [`FeedController::complete`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedFetch {
    pub recent_topics: Vec<String>,
}

#[derive(Debug)]
pub struct FeedController {
    sections: Vec<ContentSection>,
    state: LoadingState,
    loading_message: &'static str,
    last_error: Option<&'static str>,
    recent_window: usize,
}

impl Default for FeedController {
    fn default() -> Self {
        Self::new(RECENT_TOPIC_WINDOW)
    }
}

impl FeedController {
    pub fn new(recent_window: usize) -> Self {
        Self {
            sections: Vec::new(),
            state: LoadingState::Idle,
            loading_message: LOADING_MESSAGES[0],
            last_error: None,
            recent_window,
        }
    }

    pub fn sections(&self) -> &[ContentSection] {
        &self.sections
    }

    pub fn state(&self) -> LoadingState {
        self.state
    }

    pub fn loading_message(&self) -> &'static str {
        self.loading_message
    }

    /// User-facing message for the last failure, while in `Error`.
    pub fn last_error(&self) -> Option<&'static str> {
        self.last_error
    }

    pub fn section(&self, id: &str) -> Option<&ContentSection> {
        self.sections.iter().find(|s| s.id == id)
    }

    /// Topics of the last `n` sections, oldest first.
    pub fn recent_topics(&self, n: usize) -> Vec<String> {
        let start = self.sections.len().saturating_sub(n);
        self.sections[start..]
            .iter()
            .map(|s| s.topic.clone())
            .collect()
    }

    /// Start an extension fetch unless one is already in flight.
    ///
    /// Allowed from `Idle` and `Error`; the proximity trigger is responsible
    /// for only calling this from `Idle`.
    pub fn request_more<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<FeedFetch> {
        if self.state == LoadingState::Loading {
            tracing::debug!("Feed fetch already in flight, dropping trigger");
            return None;
        }

        self.loading_message = LOADING_MESSAGES
            .choose(rng)
            .copied()
            .unwrap_or(LOADING_MESSAGES[0]);
        self.state = LoadingState::Loading;
        self.last_error = None;

        Some(FeedFetch {
            recent_topics: self.recent_topics(self.recent_window),
        })
    }

    /// Apply the outcome of the fetch started by `request_more`.
    pub fn complete(&mut self, result: Result<GeneratedText, GenerationError>) {
        if self.state != LoadingState::Loading {
            tracing::warn!(state = ?self.state, "Feed result arrived with no fetch in flight");
        }

        match result {
            Ok(generated) => {
                self.append(generated.topic, generated.text);
                self.state = LoadingState::Idle;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Feed generation failed");
                self.last_error = Some(e.user_message());
                self.state = LoadingState::Error;
            }
        }
    }

    /// Leave `Error` and start a new attempt. No-op in any other state.
    pub fn retry<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<FeedFetch> {
        if self.state != LoadingState::Error {
            return None;
        }
        self.state = LoadingState::Idle;
        self.last_error = None;
        self.request_more(rng)
    }

    /// Append a section. Does not touch the loading state.
    pub fn append(&mut self, topic: impl Into<String>, text: impl Into<String>) -> &ContentSection {
        let section = ContentSection::new(topic, text);
        tracing::debug!(id = %section.id, topic = %section.topic, "Section appended");
        self.sections.push(section);
        &self.sections[self.sections.len() - 1]
    }
}

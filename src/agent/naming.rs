//! Short folder names derived from a free-text request
//!
//! The model is asked once, with no history and no tools, for a single
//! word. Whatever comes back is cleaned deterministically and suffixed with
//! three random hex characters; anything unusable becomes `app_<hex>`.

use std::sync::{Arc, OnceLock};

use regex::Regex;
use tracing::{debug, warn};
use uuid::Uuid;

use super::observer::AgentObserver;
use crate::llm::{ChatBackend, ChatMessage, ModelReply};

/// Name used when the model gives nothing usable
pub const FALLBACK_NAME: &str = "app";

fn reasoning_markup() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)<(?:thought|think)>.*?</(?:thought|think)>").expect("valid regex")
    })
}

/// Reduce a raw model reply to a lowercase alphanumeric word
///
/// Strips reasoning blocks, takes the first whitespace-delimited token and
/// drops every non-ASCII-alphanumeric character.
pub fn clean_short_name(raw: &str) -> Option<String> {
    let stripped = reasoning_markup().replace_all(raw, "");
    let lowered = stripped.trim().to_lowercase();
    let first_word = lowered.split_whitespace().next()?;
    let name: String = first_word
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    (!name.is_empty()).then_some(name)
}

fn random_suffix() -> String {
    Uuid::new_v4().simple().to_string()[..3].to_string()
}

fn naming_prompt(request: &str) -> String {
    format!(
        "Suggest a single, concise, lowercase alphanumeric word (e.g. 'todo', 'inventory', 'finance') \
         to use as a folder name for this request: '{}'. Output ONLY the word, no punctuation or explanation.",
        request
    )
}

/// Single-shot use of the backend for naming
pub struct NamingAssistant {
    backend: Arc<dyn ChatBackend>,
    observer: Arc<dyn AgentObserver>,
}

impl NamingAssistant {
    pub fn new(backend: Arc<dyn ChatBackend>, observer: Arc<dyn AgentObserver>) -> Self {
        Self { backend, observer }
    }

    /// `<word>_<hex3>`, or `app_<hex3>` on any failure
    pub async fn suggest_short_name(&self, request: &str) -> String {
        let suffix = random_suffix();
        self.observer.on_status("Agent is suggesting an app name...");

        let messages = [ChatMessage::user(naming_prompt(request))];
        let cleaned = match self.backend.chat(&messages, &[]).await {
            Ok(response) => match response.reply {
                ModelReply::Text(raw) => {
                    debug!(raw = %raw, "Raw naming response");
                    clean_short_name(&raw)
                }
                ModelReply::ToolCalls { .. } => {
                    warn!("Naming reply requested tools, using fallback name");
                    None
                }
            },
            Err(e) => {
                warn!(error = %e, "Naming failed, using fallback name");
                self.observer.on_status(&format!("Naming failed: {}", e));
                None
            }
        };

        format!(
            "{}_{}",
            cleaned.as_deref().unwrap_or(FALLBACK_NAME),
            suffix
        )
    }
}

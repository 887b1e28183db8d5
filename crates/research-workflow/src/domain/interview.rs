//! Interview conversation rules

use serde::{Deserialize, Serialize};

use super::entities::Interview;

/// Phrase an analyst uses to end an interview early
pub const SIGN_OFF_PHRASE: &str = "Thank you so much for your help";

/// Who spoke a message in an interview
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    Analyst,
    Expert,
}

impl Speaker {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Analyst => "Analyst",
            Self::Expert => "Expert",
        }
    }
}

/// One entry of the interview message log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub speaker: Speaker,
    pub content: String,
}

impl Message {
    pub fn analyst(content: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Analyst,
            content: content.into(),
        }
    }

    pub fn expert(content: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Expert,
            content: content.into(),
        }
    }

    /// "Speaker: content"
    pub fn transcript_line(&self) -> String {
        format!("{}: {}", self.speaker.label(), self.content)
    }
}

fn count(messages: &[Message], speaker: Speaker) -> usize {
    messages.iter().filter(|m| m.speaker == speaker).count()
}

/// Continuation policy.
///
/// Stops once `max_turns` expert answers exist, or when the latest analyst
/// message contains [`SIGN_OFF_PHRASE`].
pub fn should_continue_interview(messages: &[Message], max_turns: usize) -> bool {
    if count(messages, Speaker::Expert) >= max_turns {
        return false;
    }

    let signed_off = messages
        .iter()
        .rev()
        .find(|m| m.speaker == Speaker::Analyst)
        .is_some_and(|m| m.content.contains(SIGN_OFF_PHRASE));

    !signed_off
}

/// "Analyst: ..." / "Expert: ..." lines, blank-line separated
pub fn format_transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .map(Message::transcript_line)
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Latest analyst question, used as a search query when no query generator is set
pub fn extract_search_context(messages: &[Message]) -> String {
    messages
        .iter()
        .rev()
        .find(|m| m.speaker == Speaker::Analyst)
        .map(|m| m.content.clone())
        .unwrap_or_default()
}

/// Analysts open the exchange, so they lead experts by at most one message.
pub fn validate_interview_progression(messages: &[Message]) -> bool {
    if messages.is_empty() {
        return false;
    }
    let analysts = count(messages, Speaker::Analyst);
    let experts = count(messages, Speaker::Expert);
    analysts == experts || analysts == experts + 1
}

/// Status snapshot of one interview
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterviewSummary {
    pub id: String,
    pub analyst_id: String,
    pub topic: String,
    pub is_complete: bool,
    pub has_context: bool,
    pub has_transcript: bool,
    pub max_turns: usize,
}

impl From<&Interview> for InterviewSummary {
    fn from(interview: &Interview) -> Self {
        Self {
            id: interview.id.clone(),
            analyst_id: interview.analyst_id.clone(),
            topic: interview.topic.clone(),
            is_complete: interview.is_complete(),
            has_context: !interview.context_documents.is_empty(),
            has_transcript: !interview.transcript.is_empty(),
            max_turns: interview.max_turns,
        }
    }
}

//! Deterministic fallbacks used when a generation port fails

use crate::domain::Analyst;

/// Placeholder personas never exceed this many
const MAX_PLACEHOLDERS: usize = 3;

pub const FALLBACK_ANSWER: &str = "I apologize, but I'm having trouble accessing the relevant information right now. Could you rephrase your question?";

pub fn fallback_question(analyst: &Analyst) -> String {
    format!(
        "Hello, I'm {}, {}. I'm researching this topic and would love to learn more from your expertise. Could you share some insights?",
        analyst.name, analyst.role
    )
}

pub fn fallback_section(analyst: &Analyst) -> String {
    format!(
        "## Research Section: {}\n\nUnable to generate section content.",
        analyst.role
    )
}

/// Stand-in personas for a failed persona generation
pub fn placeholder_analysts(topic: &str, max_count: usize) -> Vec<Analyst> {
    (1..=max_count.min(MAX_PLACEHOLDERS))
        .map(|i| {
            Analyst::new(
                format!("Mock Analyst {}", i),
                "Researcher",
                format!("Mock Research Institute {}", i),
                format!("Mock analyst focused on {} with expertise in analysis {}", topic, i),
            )
        })
        .collect()
}

//! Deterministic generator for offline runs and tests

use async_trait::async_trait;
use tracing::{debug, info};

use crate::domain::{char_prefix, Analyst, Message, Speaker};
use crate::error::Result;
use crate::ports::{
    AnswerGenerator, ContextSearch, Document, PersonaGenerator, QuestionGenerator, SectionWriter,
};

const FEEDBACK_KEYWORD: &str = "startup";

/// Scripted personas, questions, answers, sections and search results
///
/// Output depends only on the inputs, so whole workflow runs are
/// reproducible without network access.
#[derive(Debug, Default, Clone, Copy)]
pub struct MockResearchGenerator;

impl MockResearchGenerator {
    pub fn new() -> Self {
        info!("Mock research generator initialized");
        Self
    }

    fn base_personas(topic: &str) -> Vec<Analyst> {
        vec![
            Analyst::new(
                "Dr. Sarah Chen",
                "Technical Architect",
                "Enterprise Software Solutions Inc.",
                format!(
                    "Specializes in scalable system architecture and design patterns for {}. \
                     Focuses on performance optimization and maintainability in large-scale applications.",
                    topic
                ),
            ),
            Analyst::new(
                "Marcus Rodriguez",
                "Senior Developer",
                "Tech Startup Collective",
                format!(
                    "Experienced in implementing {} in fast-paced startup environments. \
                     Expert in rapid prototyping and iterative development methodologies.",
                    topic
                ),
            ),
            Analyst::new(
                "Prof. Elena Kowalski",
                "Research Scientist",
                "University Computer Science Department",
                format!(
                    "Academic researcher studying theoretical foundations of {}. \
                     Publishes on best practices and emerging trends in software engineering.",
                    topic
                ),
            ),
        ]
    }

    fn startup_persona(topic: &str) -> Analyst {
        Analyst::new(
            "Alex Kim",
            "Startup CTO",
            "Venture Capital Portfolio Company",
            format!(
                "Serial entrepreneur with experience scaling {} solutions from prototype to production. \
                 Specializes in lean development approaches and technical leadership.",
                topic
            ),
        )
    }

    fn web_results(query: &str) -> Vec<Document> {
        vec![
            Document::new(
                format!("https://techblog.com/articles/{}", query.replace(' ', "-").to_lowercase()),
                format!("Best Practices for {}", query),
                format!(
                    "Comprehensive guide to implementing {} in production environments. \
                     This article covers key considerations, common pitfalls, and proven strategies \
                     for successful deployment and maintenance.",
                    query
                ),
                "web_mock",
            ),
            Document::new(
                format!("https://stackoverflow.com/questions/tagged/{}", query.replace(' ', "+")),
                format!("Common Questions about {}", query),
                format!(
                    "Community-driven discussion of practical challenges when working with {}. \
                     Includes real-world examples and solutions from experienced practitioners.",
                    query
                ),
                "web_mock",
            ),
        ]
    }

    fn wikipedia_results(query: &str) -> Vec<Document> {
        let page = query.replace(' ', "_");
        vec![Document::new(
            format!("https://en.wikipedia.org/wiki/{}", page),
            format!("Wikipedia: {}", query),
            format!(
                "{} refers to a methodology and set of practices in software development. \
                 It encompasses various approaches and techniques that have evolved over time to \
                 address complexity in modern software systems. The concept has gained widespread \
                 adoption in enterprise and startup environments alike.",
                query
            ),
            "wikipedia_mock",
        )
        .with_page(page)]
    }
}

#[async_trait]
impl PersonaGenerator for MockResearchGenerator {
    async fn create(
        &self,
        topic: &str,
        max_count: usize,
        feedback: Option<&str>,
    ) -> Result<Vec<Analyst>> {
        let mut analysts = Self::base_personas(topic);
        analysts.truncate(max_count);

        let wants_startup =
            feedback.is_some_and(|f| f.to_lowercase().contains(FEEDBACK_KEYWORD));
        if wants_startup {
            let startup = Self::startup_persona(topic);
            if analysts.len() < max_count {
                analysts.push(startup);
            } else if let Some(last) = analysts.last_mut() {
                *last = startup;
            }
        }

        info!(topic, count = analysts.len(), "Created mock analysts");
        Ok(analysts)
    }
}

#[async_trait]
impl QuestionGenerator for MockResearchGenerator {
    async fn next(&self, persona: &Analyst, history: &[Message]) -> Result<String> {
        let questions = [
            format!(
                "Hello, I'm {}, and I work as a {} at {}. \
                 I'm researching the practical applications of this topic. Could you share some specific \
                 examples of how you've seen these concepts implemented successfully?",
                persona.name, persona.role, persona.affiliation
            ),
            "That's interesting! Can you elaborate on any particular challenges you've encountered \
             when implementing these approaches? What strategies have you found most effective for \
             overcoming those obstacles?"
                .to_string(),
            "Thank you so much for your help! This has been incredibly insightful.".to_string(),
        ];
        let index = (history.len() / 2).min(questions.len() - 1);
        debug!(analyst = %persona.name, index, "Mock question");
        Ok(questions[index].clone())
    }
}

#[async_trait]
impl AnswerGenerator for MockResearchGenerator {
    async fn answer(&self, _persona: &Analyst, history: &[Message], context: &str) -> Result<String> {
        let first = if context.is_empty() {
            "Mock research source".to_string()
        } else {
            format!(
                "Thank you for the question! Based on my experience, I've found that the key to successful \
                 implementation lies in understanding the specific context and requirements of your project. \
                 The approaches mentioned in the research literature [1] often need to be adapted to fit \
                 real-world constraints and organizational needs.\n\n[1] {}...",
                char_prefix(context, 100)
            )
        };
        let answers = [
            first,
            "Great follow-up question! The main challenges I've encountered typically fall into three \
             categories: technical complexity, team coordination, and stakeholder alignment. \
             For technical complexity, we've found that starting with simpler implementations and \
             gradually increasing sophistication tends to work well. The documentation suggests [1] \
             similar phased approaches.\n\n[1] Technical implementation guide"
                .to_string(),
            "You're very welcome! I'm always happy to share experiences with fellow practitioners. \
             Feel free to reach out if you have more questions as your research progresses."
                .to_string(),
        ];
        let experts = history.iter().filter(|m| m.speaker == Speaker::Expert).count();
        let index = experts.min(answers.len() - 1);
        Ok(answers[index].clone())
    }
}

#[async_trait]
impl SectionWriter for MockResearchGenerator {
    async fn write(&self, persona: &Analyst, context: &str) -> Result<String> {
        let source = if context.is_empty() {
            "Mock interview transcript and supporting research documents"
        } else {
            char_prefix(context, 200)
        };
        Ok(format!(
            "## {role} Perspective on Modern Implementation Approaches

### Summary

Based on extensive analysis of current practices and industry feedback, several key insights emerge regarding the implementation of these methodologies in contemporary software development environments. The {role} perspective reveals particularly interesting patterns around scalability and maintainability considerations.

From a {affiliation} standpoint, the most surprising finding is the significant impact that organizational culture has on technical implementation success [1]. Traditional approaches often underestimate the human factors involved in adopting new methodologies, leading to suboptimal outcomes even when the technical implementation is sound.

The research indicates that successful implementations typically follow a phased approach, beginning with pilot projects and gradually expanding to larger systems [1]. This finding challenges the conventional wisdom that suggests full-scale adoption from the start is more efficient.

### Sources

[1] {source}...
",
            role = persona.role,
            affiliation = persona.affiliation,
            source = source,
        ))
    }
}

#[async_trait]
impl ContextSearch for MockResearchGenerator {
    async fn search(&self, query: &str) -> Result<Vec<Document>> {
        let mut documents = Self::web_results(query);
        documents.extend(Self::wikipedia_results(query));
        Ok(documents)
    }
}

//! Final report payload

use serde::{Deserialize, Serialize};

use crate::domain::{char_prefix, find_analyst, Analyst, ProjectStatus, ResearchProject, ResearchSection};

/// Preview length, in characters
const PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionSummary {
    pub title: String,
    pub content: String,
    pub content_preview: String,
    pub analyst_name: String,
    pub sources: Vec<String>,
}

impl SectionSummary {
    fn new(section: &ResearchSection, analysts: &[Analyst]) -> Self {
        Self {
            title: section.title.clone(),
            content: section.content.clone(),
            content_preview: preview(&section.content),
            analyst_name: find_analyst(analysts, &section.analyst_id)
                .map(|a| a.name.clone())
                .unwrap_or_else(|| "Unknown".to_string()),
            sources: section.sources.clone(),
        }
    }
}

/// First 200 characters, with "..." when cut
fn preview(content: &str) -> String {
    let head = char_prefix(content, PREVIEW_CHARS);
    if head.len() < content.len() {
        format!("{}...", head)
    } else {
        content.to_string()
    }
}

/// What a successful run returns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalReport {
    pub research_completed: bool,
    pub project_id: String,
    pub topic: String,
    pub total_analysts: usize,
    pub total_interviews: usize,
    pub total_sections: usize,
    pub project_status: ProjectStatus,
    /// In analyst generation order
    pub sections: Vec<SectionSummary>,
}

impl FinalReport {
    pub fn assemble(
        project: &ResearchProject,
        analysts: &[Analyst],
        total_interviews: usize,
        sections: &[ResearchSection],
    ) -> Self {
        Self {
            research_completed: project.status == ProjectStatus::Completed,
            project_id: project.id.clone(),
            topic: project.topic.clone(),
            total_analysts: analysts.len(),
            total_interviews,
            total_sections: sections.len(),
            project_status: project.status,
            sections: sections
                .iter()
                .map(|s| SectionSummary::new(s, analysts))
                .collect(),
        }
    }

    /// The sections stitched into one markdown document
    pub fn to_markdown(&self) -> String {
        let mut out = format!("# Research Report: {}\n\n", self.topic);
        out.push_str(&format!(
            "_{} analysts, {} interviews, {} sections_\n",
            self.total_analysts, self.total_interviews, self.total_sections
        ));
        for section in &self.sections {
            out.push_str(&format!(
                "\n---\n\n_Analyst: {}_\n\n{}\n",
                section.analyst_name,
                section.content.trim_end()
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Interview;

    fn fixture(content: &str) -> (ResearchProject, Vec<Analyst>, Vec<ResearchSection>) {
        let mut project = ResearchProject::new("Rust");
        project.advance_status(ProjectStatus::Completed).unwrap();
        let analyst = Analyst::new("Ada", "Architect", "Lab", "Systems and safety");
        let interview = Interview::new(&analyst, "Rust", 1);
        let section = ResearchSection::new(&interview, &analyst, "Title", content, vec!["Foo".into()]);
        (project, vec![analyst], vec![section])
    }

    #[test]
    fn test_preview_truncates_long_content() {
        let long = "é".repeat(250);
        let (project, analysts, sections) = fixture(&long);
        let report = FinalReport::assemble(&project, &analysts, 1, &sections);

        let summary = &report.sections[0];
        assert_eq!(summary.content, long);
        assert_eq!(summary.content_preview, format!("{}...", "é".repeat(200)));
        assert_eq!(summary.analyst_name, "Ada");
        assert_eq!(summary.sources, vec!["Foo"]);
    }

    #[test]
    fn test_preview_keeps_short_content() {
        let exact = "x".repeat(200);
        let (project, analysts, sections) = fixture(&exact);
        let report = FinalReport::assemble(&project, &analysts, 1, &sections);
        assert_eq!(report.sections[0].content_preview, exact);
    }

    #[test]
    fn test_unknown_analyst() {
        let (project, _, sections) = fixture("## body");
        let report = FinalReport::assemble(&project, &[], 1, &sections);
        assert_eq!(report.sections[0].analyst_name, "Unknown");
    }

    #[test]
    fn test_counts_and_markdown() {
        let (project, analysts, sections) = fixture("## Architect Perspective\n\nbody");
        let report = FinalReport::assemble(&project, &analysts, 1, &sections);

        assert!(report.research_completed);
        assert_eq!(report.total_analysts, 1);
        assert_eq!(report.total_sections, 1);
        assert_eq!(report.project_status, ProjectStatus::Completed);

        let markdown = report.to_markdown();
        assert!(markdown.starts_with("# Research Report: Rust"));
        assert!(markdown.contains("_Analyst: Ada_"));
        assert!(markdown.contains("## Architect Perspective"));
    }
}

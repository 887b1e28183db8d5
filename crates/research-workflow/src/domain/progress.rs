//! Out-of-band project progress queries
//!
//! Pure functions over a [`ProjectOverview`]; they never touch storage.

use serde::{Deserialize, Serialize};

use super::entities::{Analyst, Interview, ProjectStatus, ResearchProject, ResearchSection};

/// A project joined with the children its association index points at
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectOverview {
    pub project: ResearchProject,
    pub analysts: Vec<Analyst>,
    pub interviews: Vec<Interview>,
    pub sections: Vec<ResearchSection>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectProgress {
    pub total_analysts: usize,
    pub completed_interviews: usize,
    pub pending_interviews: usize,
    pub sections_written: usize,
    pub status: ProjectStatus,
}

pub fn get_project_progress(overview: &ProjectOverview) -> ProjectProgress {
    let completed = overview
        .interviews
        .iter()
        .filter(|i| i.is_complete())
        .count();

    ProjectProgress {
        total_analysts: overview.analysts.len(),
        completed_interviews: completed,
        pending_interviews: overview.interviews.len() - completed,
        sections_written: overview.sections.len(),
        status: overview.project.status,
    }
}

/// Every analyst has exactly one completed interview, every interview
/// exactly one section, and the project is marked completed.
pub fn is_project_complete(overview: &ProjectOverview) -> bool {
    if overview.analysts.is_empty() || overview.project.status != ProjectStatus::Completed {
        return false;
    }

    let one_interview_each = overview.analysts.iter().all(|analyst| {
        overview
            .interviews
            .iter()
            .filter(|i| i.analyst_id == analyst.id && i.is_complete())
            .count()
            == 1
    });

    let one_section_each = overview.interviews.iter().all(|interview| {
        overview
            .sections
            .iter()
            .filter(|s| s.interview_id == interview.id)
            .count()
            == 1
    });

    one_interview_each
        && one_section_each
        && overview.interviews.len() == overview.analysts.len()
        && overview.sections.len() == overview.analysts.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finished_overview(analyst_count: usize) -> ProjectOverview {
        let mut project = ResearchProject::new("Rust");
        let mut analysts = Vec::new();
        let mut interviews = Vec::new();
        let mut sections = Vec::new();

        for i in 0..analyst_count {
            let analyst = Analyst::new(format!("A{}", i), "Role", "Org", "Some description");
            let mut interview = Interview::new(&analyst, "Rust", 1);
            interview.complete().unwrap();
            let section = ResearchSection::new(&interview, &analyst, "T", "## C", vec![]);
            project.add_interview(&interview);
            project.add_section(&section);
            analysts.push(analyst);
            interviews.push(interview);
            sections.push(section);
        }
        project.replace_analysts(&analysts);
        project.advance_status(ProjectStatus::Completed).unwrap();

        ProjectOverview {
            project,
            analysts,
            interviews,
            sections,
        }
    }

    #[test]
    fn test_progress_counts() {
        let mut overview = finished_overview(2);
        overview.interviews[1].completed_at = None;

        let progress = get_project_progress(&overview);
        assert_eq!(progress.total_analysts, 2);
        assert_eq!(progress.completed_interviews, 1);
        assert_eq!(progress.pending_interviews, 1);
        assert_eq!(progress.sections_written, 2);
        assert_eq!(progress.status, ProjectStatus::Completed);
    }

    #[test]
    fn test_progress_is_idempotent() {
        let overview = finished_overview(3);
        assert_eq!(get_project_progress(&overview), get_project_progress(&overview));
    }

    #[test]
    fn test_complete_project() {
        assert!(is_project_complete(&finished_overview(2)));
    }

    #[test]
    fn test_incomplete_projects() {
        assert!(!is_project_complete(&finished_overview(0)));

        let mut not_marked = finished_overview(2);
        not_marked.project.status = ProjectStatus::InProgress;
        assert!(!is_project_complete(&not_marked));

        let mut missing_section = finished_overview(2);
        missing_section.sections.pop();
        assert!(!is_project_complete(&missing_section));

        let mut pending = finished_overview(2);
        pending.interviews[0].completed_at = None;
        assert!(!is_project_complete(&pending));
    }
}

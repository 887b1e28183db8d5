//! Analyst persona rules

use std::collections::HashSet;

use super::entities::Analyst;

/// Shortest description accepted for a persona
pub const MIN_DESCRIPTION_LEN: usize = 10;

/// Upper bound on analysts per project
pub const MAX_ANALYSTS: usize = 10;

/// A topic must be non-blank and the analyst count within `1..=MAX_ANALYSTS`.
pub fn validate_analyst_requirements(topic: &str, max_analysts: usize) -> bool {
    !topic.trim().is_empty() && (1..=MAX_ANALYSTS).contains(&max_analysts)
}

/// Validate a freshly generated persona batch.
///
/// Rejects an empty batch, blank fields, descriptions shorter than
/// [`MIN_DESCRIPTION_LEN`] characters and duplicate names (case-sensitive).
pub fn validate_analyst_personas(analysts: &[Analyst]) -> bool {
    if analysts.is_empty() {
        return false;
    }

    let fields_ok = analysts.iter().all(|a| {
        [&a.name, &a.role, &a.affiliation, &a.description]
            .iter()
            .all(|field| !field.trim().is_empty())
            && a.description.chars().count() >= MIN_DESCRIPTION_LEN
    });
    if !fields_ok {
        return false;
    }

    let mut names = HashSet::new();
    analysts.iter().all(|a| names.insert(a.name.as_str()))
}

/// New feedback, or no analysts yet, means personas must be (re)generated.
pub fn should_recreate_analysts(current: &[Analyst], human_feedback: Option<&str>) -> bool {
    human_feedback.is_some_and(|f| !f.trim().is_empty()) || current.is_empty()
}

pub fn find_analyst<'a>(analysts: &'a [Analyst], analyst_id: &str) -> Option<&'a Analyst> {
    analysts.iter().find(|a| a.id == analyst_id)
}

/// Distinct roles, in first-seen order
pub fn specializations(analysts: &[Analyst]) -> Vec<String> {
    distinct(analysts.iter().map(|a| a.role.as_str()))
}

/// Distinct affiliations, in first-seen order
pub fn affiliations(analysts: &[Analyst]) -> Vec<String> {
    distinct(analysts.iter().map(|a| a.affiliation.as_str()))
}

fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .filter(|v| seen.insert(*v))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn persona(name: &str, description: &str) -> Analyst {
        Analyst::new(name, "Researcher", "University", description)
    }

    #[test]
    fn test_requirements() {
        assert!(validate_analyst_requirements("Rust", 1));
        assert!(validate_analyst_requirements("Rust", 10));
        assert!(!validate_analyst_requirements("   ", 3));
        assert!(!validate_analyst_requirements("Rust", 0));
        assert!(!validate_analyst_requirements("Rust", 11));
    }

    #[test]
    fn test_valid_batch() {
        let batch = vec![
            persona("Ada", "Looks at memory safety"),
            persona("Grace", "Looks at compilers"),
        ];
        assert!(validate_analyst_personas(&batch));
    }

    #[test]
    fn test_empty_batch_rejected() {
        assert!(!validate_analyst_personas(&[]));
    }

    #[test]
    fn test_blank_field_rejected() {
        let mut blank_role = persona("Ada", "Looks at memory safety");
        blank_role.role = "  ".to_string();
        assert!(!validate_analyst_personas(&[blank_role]));

        let blank_name = persona("\t", "Looks at memory safety");
        assert!(!validate_analyst_personas(&[blank_name]));
    }

    #[test]
    fn test_short_description_rejected() {
        assert!(!validate_analyst_personas(&[persona("Ada", "too short")]));
        assert!(validate_analyst_personas(&[persona("Ada", "ten chars!")]));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let batch = vec![
            persona("Ada", "Looks at memory safety"),
            persona("Ada", "Looks at compilers"),
        ];
        assert!(!validate_analyst_personas(&batch));

        // case-sensitive
        let batch = vec![
            persona("Ada", "Looks at memory safety"),
            persona("ada", "Looks at compilers"),
        ];
        assert!(validate_analyst_personas(&batch));
    }

    #[test]
    fn test_should_recreate() {
        let current = vec![persona("Ada", "Looks at memory safety")];
        assert!(should_recreate_analysts(&current, Some("add a startup view")));
        assert!(!should_recreate_analysts(&current, Some("   ")));
        assert!(!should_recreate_analysts(&current, None));
        assert!(should_recreate_analysts(&[], None));
    }

    #[test]
    fn test_distinct_roles_and_affiliations() {
        let mut second = persona("Grace", "Looks at compilers");
        second.affiliation = "Navy".to_string();
        let batch = vec![persona("Ada", "Looks at memory safety"), second];

        assert_eq!(specializations(&batch), vec!["Researcher".to_string()]);
        assert_eq!(affiliations(&batch), vec!["University".to_string(), "Navy".to_string()]);
        assert_eq!(find_analyst(&batch, &batch[1].id).map(|a| a.name.as_str()), Some("Grace"));
    }
}

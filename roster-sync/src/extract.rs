//! Identity extraction: policies → distinct individual user ids.

use std::collections::BTreeSet;

use serde::Serialize;

use roster_core::{SourcePolicy, SubjectType, UserId};

/// Tallies from one extraction pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExtractStats {
    pub policies: usize,
    pub individual_subjects: usize,
    /// Individual subjects that repeated an id already seen.
    pub duplicates: usize,
    /// Group subjects; membership is not expanded.
    pub group_subjects: usize,
    pub unknown_subjects: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub ids: BTreeSet<UserId>,
    pub stats: ExtractStats,
}

/// Collect every individual subject id across `policies`.
///
/// Blank ids are dropped. Group and unknown subjects are counted, not
/// followed.
pub fn extract_user_ids<'a, I>(policies: I) -> Extraction
where
    I: IntoIterator<Item = &'a SourcePolicy>,
{
    let mut out = Extraction::default();
    for policy in policies {
        out.stats.policies += 1;
        for subject in &policy.subjects {
            match subject.subject_type {
                SubjectType::Individual => {
                    let id = subject.subject_id.trim();
                    if id.is_empty() {
                        continue;
                    }
                    out.stats.individual_subjects += 1;
                    if !out.ids.insert(UserId::from(id)) {
                        out.stats.duplicates += 1;
                    }
                }
                SubjectType::Group => out.stats.group_subjects += 1,
                SubjectType::Unknown => out.stats.unknown_subjects += 1,
            }
        }
    }

    if out.stats.group_subjects > 0 {
        tracing::info!(
            "ignored {} group subject(s); group membership is not expanded",
            out.stats.group_subjects
        );
    }
    if out.stats.unknown_subjects > 0 {
        tracing::warn!("ignored {} subject(s) of unknown type", out.stats.unknown_subjects);
    }
    tracing::info!(
        "extracted {} candidate user(s) from {} polic{}",
        out.ids.len(),
        out.stats.policies,
        if out.stats.policies == 1 { "y" } else { "ies" }
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use roster_core::PolicySubject;

    fn policy(id: &str, subjects: &[(&str, SubjectType)]) -> SourcePolicy {
        SourcePolicy {
            id: id.to_owned(),
            name: format!("policy {id}"),
            subjects: subjects
                .iter()
                .map(|(sid, kind)| PolicySubject {
                    subject_id: (*sid).to_owned(),
                    subject_type: *kind,
                })
                .collect(),
        }
    }

    #[test]
    fn shared_user_appears_once() {
        let policies = vec![
            policy("p1", &[("u1", SubjectType::Individual), ("u2", SubjectType::Individual)]),
            policy("p2", &[("u2", SubjectType::Individual), ("u3", SubjectType::Individual)]),
        ];
        let out = extract_user_ids(&policies);
        let ids: Vec<&str> = out.ids.iter().map(UserId::as_str).collect();
        assert_eq!(ids, ["u1", "u2", "u3"]);
        assert_eq!(out.stats.duplicates, 1);
        assert_eq!(out.stats.policies, 2);
    }

    #[test]
    fn groups_and_unknown_subjects_are_counted_not_followed() {
        let policies = vec![policy(
            "p1",
            &[
                ("g1", SubjectType::Group),
                ("d1", SubjectType::Unknown),
                ("u1", SubjectType::Individual),
            ],
        )];
        let out = extract_user_ids(&policies);
        assert_eq!(out.ids.len(), 1);
        assert_eq!(out.stats.group_subjects, 1);
        assert_eq!(out.stats.unknown_subjects, 1);
    }

    #[test]
    fn no_policies_means_no_candidates() {
        let out = extract_user_ids(&Vec::<SourcePolicy>::new());
        assert!(out.ids.is_empty());
        assert_eq!(out.stats, ExtractStats::default());
    }

    #[test]
    fn blank_ids_are_dropped() {
        let out = extract_user_ids(&[policy("p1", &[("  ", SubjectType::Individual)])]);
        assert!(out.ids.is_empty());
        assert_eq!(out.stats.individual_subjects, 0);
    }
}

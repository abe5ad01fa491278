//! Merge/Apply: rebuild caller data from a validated sort result.
//!
//! Only ever called after `validate` accepted the result.

use std::collections::{HashMap, HashSet, VecDeque};

use thiserror::Error;
use tracing::debug;

use crate::models::resume::{normalize, Achievement, Skill, SkillGroup};
use crate::sorting::{AchievementsSortResult, SkillsSortResult};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplyError {
    /// The validator let through a text that matches no original achievement.
    #[error("sort result references unknown achievement {0:?}")]
    UnknownAchievement(String),

    /// The validator let through an order that leaves an achievement out.
    #[error("sort result leaves achievement {0:?} unplaced")]
    Unplaced(String),
}

/// Reorders `originals` by moving each object into its proposed position.
/// The output holds exactly the input objects.
pub fn apply_achievement_order(
    originals: Vec<Achievement>,
    result: &AchievementsSortResult,
) -> Result<Vec<Achievement>, ApplyError> {
    let mut pool: HashMap<String, VecDeque<Achievement>> = HashMap::new();
    for achievement in originals {
        pool.entry(achievement.text.clone())
            .or_default()
            .push_back(achievement);
    }

    let ordered = result
        .achievement_order
        .iter()
        .map(|text| {
            pool.get_mut(text)
                .and_then(VecDeque::pop_front)
                .ok_or_else(|| ApplyError::UnknownAchievement(text.clone()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if let Some(left) = pool.into_values().flatten().next() {
        return Err(ApplyError::Unplaced(left.text));
    }

    Ok(ordered)
}

/// Rebuilds skill groups in the proposed order.
///
/// Every original skill is kept (its original object, highlight flag included).
/// Texts that resolve to no original skill of the group are model suggestions:
/// they are added highlighted unless their normalized form already exists
/// anywhere in the output. Groups left without skills are dropped.
pub fn apply_skill_order(originals: &[SkillGroup], result: &SkillsSortResult) -> Vec<SkillGroup> {
    let mut seen: HashSet<String> = originals
        .iter()
        .flat_map(|g| g.skills.iter())
        .map(|s| normalize(&s.text))
        .collect();
    let mut placed_titles: HashSet<&str> = HashSet::new();
    let mut groups = Vec::with_capacity(result.group_order.len());

    for title in &result.group_order {
        if !placed_titles.insert(title.as_str()) {
            continue;
        }

        let mut remaining: Vec<Option<&Skill>> = originals
            .iter()
            .find(|g| &g.title == title)
            .map(|g| g.skills.iter().map(Some).collect())
            .unwrap_or_default();

        let mut skills = Vec::new();
        for text in result.skill_order.get(title).into_iter().flatten() {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                continue;
            }
            if let Some(original) = take_original(&mut remaining, text) {
                skills.push(original.clone());
                continue;
            }
            if seen.insert(normalize(trimmed)) {
                skills.push(Skill::highlighted(trimmed));
            } else {
                debug!(skill = trimmed, group = %title, "dropping duplicate suggested skill");
            }
        }

        if skills.is_empty() {
            debug!(group = %title, "dropping group with no skills");
            continue;
        }
        groups.push(SkillGroup {
            title: title.clone(),
            skills,
        });
    }

    groups
}

/// Takes the original skill matching `text`: exact match first, then
/// trimmed case-insensitive. Each original can be taken once.
fn take_original<'a>(remaining: &mut [Option<&'a Skill>], text: &str) -> Option<&'a Skill> {
    let exact = remaining
        .iter()
        .position(|s| s.is_some_and(|s| s.text == text));
    let slot = exact.or_else(|| {
        let key = normalize(text);
        remaining
            .iter()
            .position(|s| s.is_some_and(|s| normalize(&s.text) == key))
    })?;
    remaining[slot].take()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sorting::validate::{parse_achievements_sort, parse_skills_sort};

    fn texts(groups: &[SkillGroup]) -> Vec<(String, Vec<String>)> {
        groups
            .iter()
            .map(|g| {
                (
                    g.title.clone(),
                    g.skills.iter().map(|s| s.text.clone()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn test_scenario_a_reorders_same_objects() {
        let originals = vec![
            Achievement { text: "Led team of 5".to_string(), highlight: true },
            Achievement::new("Cut costs 20%"),
            Achievement::new("Shipped v2"),
        ];
        let raw = r#"{"achievementOrder": ["Shipped v2","Led team of 5","Cut costs 20%"]}"#;
        let result = parse_achievements_sort(raw, &originals).unwrap();

        let ordered = apply_achievement_order(originals.clone(), &result).unwrap();

        assert_eq!(
            ordered,
            vec![originals[2].clone(), originals[0].clone(), originals[1].clone()]
        );
        assert!(ordered[1].highlight, "object identity carries its flags");
    }

    #[test]
    fn test_achievement_identity_order_is_idempotent() {
        let originals = vec![Achievement::new("A"), Achievement::new("B"), Achievement::new("C")];
        let result = AchievementsSortResult {
            achievement_order: vec!["A".to_string(), "B".to_string(), "C".to_string()],
        };
        assert_eq!(apply_achievement_order(originals.clone(), &result).unwrap(), originals);
    }

    #[test]
    fn test_achievement_permutation_property() {
        let originals: Vec<Achievement> = (0..6).map(|i| Achievement::new(format!("item {i}"))).collect();
        let mut order: Vec<String> = originals.iter().map(|a| a.text.clone()).collect();
        order.reverse();
        order.swap(1, 4);
        let result = AchievementsSortResult { achievement_order: order.clone() };

        let ordered = apply_achievement_order(originals.clone(), &result).unwrap();

        assert_eq!(ordered.len(), originals.len());
        for original in &originals {
            assert_eq!(ordered.iter().filter(|a| *a == original).count(), 1);
        }
        let got: Vec<String> = ordered.into_iter().map(|a| a.text).collect();
        assert_eq!(got, order);
    }

    #[test]
    fn test_unresolvable_achievement_is_an_error() {
        let result = AchievementsSortResult {
            achievement_order: vec!["Z".to_string()],
        };
        assert_eq!(
            apply_achievement_order(vec![Achievement::new("X")], &result),
            Err(ApplyError::UnknownAchievement("Z".to_string()))
        );
    }

    #[test]
    fn test_unplaced_achievement_is_an_error() {
        let result = AchievementsSortResult {
            achievement_order: vec!["X".to_string()],
        };
        assert_eq!(
            apply_achievement_order(vec![Achievement::new("X"), Achievement::new("Y")], &result),
            Err(ApplyError::Unplaced("Y".to_string()))
        );
    }

    #[test]
    fn test_scenario_c_new_skill_is_highlighted() {
        let originals = vec![SkillGroup::new("Frontend", &["React"])];
        let raw = r#"{"groupOrder":["Frontend"], "skillOrder":{"Frontend":["React","Vite"]}}"#;
        let result = parse_skills_sort(raw, &originals).unwrap();

        let groups = apply_skill_order(&originals, &result);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].title, "Frontend");
        assert_eq!(groups[0].skills, vec![Skill::new("React"), Skill::highlighted("Vite")]);
    }

    #[test]
    fn test_suggested_duplicate_across_groups_is_dropped() {
        let originals = vec![
            SkillGroup::new("Frontend", &["React", "TypeScript"]),
            SkillGroup::new("Backend", &["Rust"]),
        ];
        let result = SkillsSortResult {
            group_order: vec!["Backend".to_string(), "Frontend".to_string()],
            skill_order: [
                ("Backend".to_string(), vec!["Rust".to_string(), "typescript".to_string(), "Axum".to_string()]),
                ("Frontend".to_string(), vec!["TypeScript".to_string(), "React".to_string(), "axum ".to_string()]),
            ]
            .into_iter()
            .collect(),
        };

        let groups = apply_skill_order(&originals, &result);

        assert_eq!(
            texts(&groups),
            vec![
                ("Backend".to_string(), vec!["Rust".to_string(), "Axum".to_string()]),
                ("Frontend".to_string(), vec!["TypeScript".to_string(), "React".to_string()]),
            ]
        );
    }

    #[test]
    fn test_case_insensitive_fallback_keeps_original_object() {
        let originals = vec![SkillGroup {
            title: "Data".to_string(),
            skills: vec![Skill { text: "PostgreSQL".to_string(), highlight: true }],
        }];
        let result = SkillsSortResult {
            group_order: vec!["Data".to_string()],
            skill_order: [("Data".to_string(), vec!["postgresql".to_string()])].into_iter().collect(),
        };

        let groups = apply_skill_order(&originals, &result);

        assert_eq!(groups[0].skills, originals[0].skills);
    }

    #[test]
    fn test_new_group_is_built_and_empty_group_dropped() {
        let originals = vec![SkillGroup::new("Frontend", &["React"])];
        let result = SkillsSortResult {
            group_order: vec!["Cloud".to_string(), "Frontend".to_string(), "Misc".to_string()],
            skill_order: [
                ("Cloud".to_string(), vec!["AWS".to_string()]),
                ("Frontend".to_string(), vec!["React".to_string()]),
                ("Misc".to_string(), vec!["react".to_string()]),
            ]
            .into_iter()
            .collect(),
        };

        let groups = apply_skill_order(&originals, &result);

        assert_eq!(
            texts(&groups),
            vec![
                ("Cloud".to_string(), vec!["AWS".to_string()]),
                ("Frontend".to_string(), vec!["React".to_string()]),
            ]
        );
        assert!(groups[0].skills[0].highlight);
    }

    #[test]
    fn test_superset_property_every_original_survives_once() {
        let originals = vec![
            SkillGroup::new("Languages", &["Rust", "Go", "Python"]),
            SkillGroup::new("Infra", &["Kubernetes", "Terraform"]),
        ];
        let raw = r#"{"groupOrder":["Infra","Languages"],
            "skillOrder":{"Infra":["Terraform","Kubernetes","Helm","helm"],
                          "Languages":["Go","Rust","Python","Helm","Kotlin"]}}"#;
        // "helm" twice in one group is a contract violation; the validator rejects it.
        assert!(parse_skills_sort(raw, &originals).is_none());

        let raw = r#"{"groupOrder":["Infra","Languages"],
            "skillOrder":{"Infra":["Terraform","Kubernetes","Helm"],
                          "Languages":["Go","Rust","Python","Helm","Kotlin"]}}"#;
        let result = parse_skills_sort(raw, &originals).unwrap();
        let groups = apply_skill_order(&originals, &result);

        let all: Vec<String> = groups
            .iter()
            .flat_map(|g| g.skills.iter().map(|s| normalize(&s.text)))
            .collect();
        for original in originals.iter().flat_map(|g| g.skills.iter()) {
            assert_eq!(all.iter().filter(|t| **t == normalize(&original.text)).count(), 1);
        }
        assert_eq!(all.iter().filter(|t| *t == "helm").count(), 1);
        assert!(all.contains(&"kotlin".to_string()));
    }

    #[test]
    fn test_skill_identity_order_is_idempotent() {
        let originals = vec![
            SkillGroup::new("Frontend", &["React", "CSS"]),
            SkillGroup::new("Backend", &["Rust"]),
        ];
        let result = SkillsSortResult {
            group_order: originals.iter().map(|g| g.title.clone()).collect(),
            skill_order: originals
                .iter()
                .map(|g| (g.title.clone(), g.skills.iter().map(|s| s.text.clone()).collect()))
                .collect(),
        };
        assert_eq!(apply_skill_order(&originals, &result), originals);
    }
}

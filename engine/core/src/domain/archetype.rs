// Copyright (c) 2026 Bellwether Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Response archetype ("voice") selection.

use serde::{Deserialize, Serialize};

use crate::domain::signal::{ArchetypeName, TemporalContext};

/// How the archetype was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchetypeSource {
    TemporalPreference,
    AuthorDefault,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchetypeChoice {
    pub archetype: ArchetypeName,
    pub source: ArchetypeSource,
}

/// Pick the highest-priority temporal preference the author is eligible for,
/// else the author's first eligible archetype, else nothing.
pub fn select_archetype(eligible: &[ArchetypeName], preferences: &[ArchetypeName]) -> Option<ArchetypeChoice> {
    if let Some(preferred) = preferences.iter().find(|p| eligible.contains(*p)) {
        return Some(ArchetypeChoice {
            archetype: preferred.clone(),
            source: ArchetypeSource::TemporalPreference,
        });
    }

    eligible.first().map(|first| ArchetypeChoice {
        archetype: first.clone(),
        source: ArchetypeSource::AuthorDefault,
    })
}

/// [`select_archetype`] plus the structured log line emitted when a temporal
/// preference was applied.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchetypeSelector;

impl ArchetypeSelector {
    pub fn select(&self, eligible: &[ArchetypeName], temporal: &TemporalContext) -> Option<ArchetypeName> {
        let choice = select_archetype(eligible, &temporal.archetype_preferences)?;

        if choice.source == ArchetypeSource::TemporalPreference {
            tracing::info!(
                archetype = %choice.archetype,
                phase = %temporal.phase,
                matched_rules = ?temporal.matched_rules,
                "Temporal archetype preference applied"
            );
        }

        Some(choice.archetype)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(values: &[&str]) -> Vec<ArchetypeName> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_highest_priority_intersection_wins() {
        let eligible = names(&["peer", "educator", "cheerleader"]);
        let preferences = names(&["announcer", "cheerleader", "educator"]);
        let choice = select_archetype(&eligible, &preferences).unwrap();
        assert_eq!(choice.archetype, "cheerleader");
        assert_eq!(choice.source, ArchetypeSource::TemporalPreference);
    }

    #[test]
    fn test_falls_back_to_first_eligible() {
        let eligible = names(&["peer", "educator"]);
        let preferences = names(&["announcer"]);
        let choice = select_archetype(&eligible, &preferences).unwrap();
        assert_eq!(choice.archetype, "peer");
        assert_eq!(choice.source, ArchetypeSource::AuthorDefault);

        assert_eq!(select_archetype(&eligible, &[]).unwrap().archetype, "peer");
    }

    #[test]
    fn test_no_eligible_archetypes_leaves_unset() {
        assert!(select_archetype(&[], &names(&["educator"])).is_none());
        assert!(ArchetypeSelector.select(&[], &TemporalContext::default()).is_none());
    }

    #[test]
    fn test_selector_returns_name() {
        let temporal = TemporalContext {
            archetype_preferences: names(&["educator"]),
            ..TemporalContext::default()
        };
        let chosen = ArchetypeSelector.select(&names(&["peer", "educator"]), &temporal);
        assert_eq!(chosen.as_deref(), Some("educator"));
    }
}

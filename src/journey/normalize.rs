//! Substep title normalization.
//!
//! Historical schema evolution left the same logical substep stored under
//! several raw spellings: underscore-prefixed internal codes, English field
//! names, partial fragments. Every call site that reads or writes
//! substep-scoped data goes through [`normalize_substep_title`] so the
//! canonical string is the one consistent lookup and storage key.

pub struct NormalizationRule {
    pub step_id: u32,
    pub patterns: &'static [&'static str],
    pub canonical: &'static str,
}

/// Ordered rule table — first match wins.
///
/// Order is precedence: a fragment that is a substring of another (e.g.
/// "concurr" vs "concurrentielle", "financ" vs "plan de financement") must
/// sit below the more specific rule it would otherwise shadow. Keep this a
/// slice iterated in definition order, never a map.
pub const NORMALIZATION_RULES: &[NormalizationRule] = &[
    // Step 1: Idéation
    NormalizationRule {
        step_id: 1,
        patterns: &["recherche utilisateur", "user research", "recherche user", "interviews"],
        canonical: "Recherche utilisateur",
    },
    NormalizationRule {
        step_id: 1,
        patterns: &["définition du problème", "definition du probleme", "problem statement"],
        canonical: "Définition du problème",
    },
    NormalizationRule {
        step_id: 1,
        patterns: &["probleme", "problème", "problem"],
        canonical: "Définition du problème",
    },
    NormalizationRule {
        step_id: 1,
        patterns: &["proposition de valeur", "value proposition", "proposition valeur"],
        canonical: "Proposition de valeur",
    },
    // Step 2: Étude de marché
    NormalizationRule {
        step_id: 2,
        patterns: &["analyse concurrentielle", "concurrentielle", "competitive analysis"],
        canonical: "Analyse concurrentielle",
    },
    NormalizationRule {
        step_id: 2,
        patterns: &["segmentation clientèle", "segmentation clientele", "segments", "persona"],
        canonical: "Segmentation clientèle",
    },
    NormalizationRule {
        step_id: 2,
        patterns: &["taille de marché", "taille de marche", "market size", "taille marche"],
        canonical: "Taille de marché",
    },
    NormalizationRule {
        step_id: 2,
        patterns: &["concurr", "concurrence", "competitors"],
        canonical: "Analyse concurrentielle",
    },
    // Step 3: Business model
    NormalizationRule {
        step_id: 3,
        patterns: &["modèle économique", "modele economique", "business model", "canvas"],
        canonical: "Modèle économique",
    },
    NormalizationRule {
        step_id: 3,
        patterns: &["sources de revenus", "revenue streams", "revenus"],
        canonical: "Sources de revenus",
    },
    NormalizationRule {
        step_id: 3,
        patterns: &["structure de coûts", "structure de couts", "cost structure", "couts", "coûts"],
        canonical: "Structure de coûts",
    },
    // Step 4: Prototype & MVP
    NormalizationRule {
        step_id: 4,
        patterns: &["cahier des charges", "specifications", "specs"],
        canonical: "Cahier des charges",
    },
    NormalizationRule {
        step_id: 4,
        patterns: &["plan de test", "test plan", "tests"],
        canonical: "Plan de test",
    },
    NormalizationRule {
        step_id: 4,
        patterns: &["retours utilisateurs", "user feedback", "feedback", "retours"],
        canonical: "Retours utilisateurs",
    },
    // Step 5: Stratégie de lancement
    NormalizationRule {
        step_id: 5,
        patterns: &["plan marketing", "marketing plan", "marketing"],
        canonical: "Plan marketing",
    },
    NormalizationRule {
        step_id: 5,
        patterns: &["canaux d'acquisition", "canaux d acquisition", "acquisition", "canaux"],
        canonical: "Canaux d'acquisition",
    },
    NormalizationRule {
        step_id: 5,
        patterns: &["feuille de route", "roadmap"],
        canonical: "Feuille de route",
    },
    // Step 6: Financement
    NormalizationRule {
        step_id: 6,
        patterns: &["plan de financement", "financing plan", "plan financement", "financement plan"],
        canonical: "Plan de financement",
    },
    NormalizationRule {
        step_id: 6,
        patterns: &["pitch investisseurs", "pitch deck", "pitch", "investisseurs"],
        canonical: "Pitch investisseurs",
    },
    NormalizationRule {
        step_id: 6,
        patterns: &["prévisionnel financier", "previsionnel financier", "forecast", "previsionnel", "financ"],
        canonical: "Prévisionnel financier",
    },
];

/// Lowercase, trim, strip leading underscores, underscores to spaces,
/// collapse repeated whitespace. This is the form rule patterns match on.
fn clean_title(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let stripped = lowered.trim().trim_start_matches('_').replace('_', " ");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Map a raw substep title to its canonical form.
///
/// Unmatched titles fall back to a minimal cleanup of the original raw
/// string (leading underscores stripped, underscores to spaces, trimmed) so
/// unmapped legacy data still yields a usable display title. Never fails.
pub fn normalize_substep_title(step_id: u32, raw: &str) -> String {
    if raw.is_empty() {
        tracing::warn!("normalize_substep_title: empty title for step {}", step_id);
        return String::new();
    }

    let cleaned = clean_title(raw);
    for rule in NORMALIZATION_RULES {
        if rule.step_id != step_id {
            continue;
        }
        for pattern in rule.patterns {
            if cleaned.contains(pattern) {
                return rule.canonical.to_string();
            }
        }
    }

    raw.trim_start_matches('_').replace('_', " ").trim().to_string()
}

/// All forms under which a record for `title` may exist in storage:
/// the canonical form plus the raw legacy variants. Deduplicated,
/// canonical first.
pub fn possible_titles(step_id: u32, title: &str) -> Vec<String> {
    let mut titles: Vec<String> = Vec::new();
    for candidate in [
        normalize_substep_title(step_id, title),
        title.to_string(),
        title.trim_start_matches('_').to_string(),
        title.replace('_', " "),
    ] {
        if !candidate.is_empty() && !titles.contains(&candidate) {
            titles.push(candidate);
        }
    }
    titles
}

/// Whether two raw titles refer to the same substep: literal equality, or
/// the same (non-empty) canonical form.
pub fn titles_match(step_id: u32, a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    let normalized_a = normalize_substep_title(step_id, a);
    let normalized_b = normalize_substep_title(step_id, b);
    !normalized_a.is_empty() && normalized_a == normalized_b
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_and_canonical_forms_agree() {
        assert_eq!(
            normalize_substep_title(1, "user_research"),
            "Recherche utilisateur"
        );
        assert_eq!(
            normalize_substep_title(1, "Recherche utilisateur"),
            "Recherche utilisateur"
        );
        assert_eq!(
            normalize_substep_title(1, "_recherche_utilisateur"),
            "Recherche utilisateur"
        );
    }

    #[test]
    fn rules_are_scoped_per_step() {
        // "marketing" only means something in step 5.
        assert_eq!(normalize_substep_title(5, "marketing"), "Plan marketing");
        assert_eq!(normalize_substep_title(1, "marketing"), "marketing");
    }

    #[test]
    fn specific_rules_win_over_broad_fragments() {
        // "plan de financement" contains "financ"; the specific rule sits
        // above the broad one and must win.
        assert_eq!(
            normalize_substep_title(6, "plan_de_financement"),
            "Plan de financement"
        );
        assert_eq!(
            normalize_substep_title(6, "previsionnel"),
            "Prévisionnel financier"
        );
        // Same for "concurrentielle" vs the legacy "concurr" fragment.
        assert_eq!(
            normalize_substep_title(2, "analyse_concurrentielle"),
            "Analyse concurrentielle"
        );
        assert_eq!(
            normalize_substep_title(2, "concurrence"),
            "Analyse concurrentielle"
        );
    }

    #[test]
    fn unmapped_title_gets_minimal_cleanup() {
        assert_eq!(
            normalize_substep_title(99, "_some_unmapped_field"),
            "some unmapped field"
        );
    }

    #[test]
    fn empty_title_stays_empty() {
        assert_eq!(normalize_substep_title(1, ""), "");
    }

    #[test]
    fn cleanup_collapses_whitespace_and_underscores() {
        assert_eq!(
            normalize_substep_title(1, "__User   Research__"),
            "Recherche utilisateur"
        );
    }

    #[test]
    fn possible_titles_deduplicates() {
        let titles = possible_titles(1, "user_research");
        assert_eq!(titles[0], "Recherche utilisateur");
        assert!(titles.contains(&"user_research".to_string()));
        assert!(titles.contains(&"user research".to_string()));
        let unique: std::collections::HashSet<_> = titles.iter().collect();
        assert_eq!(unique.len(), titles.len());
    }

    #[test]
    fn titles_match_is_reflexive() {
        for title in ["Recherche utilisateur", "user_research", "xyz"] {
            assert!(titles_match(1, title, title));
        }
    }

    #[test]
    fn titles_match_across_legacy_forms() {
        assert!(titles_match(1, "user_research", "Recherche utilisateur"));
        assert!(!titles_match(1, "user_research", "value_proposition"));
    }

    #[test]
    fn every_canonical_title_belongs_to_its_step() {
        for rule in NORMALIZATION_RULES {
            let step = crate::journey::step_by_id(rule.step_id)
                .unwrap_or_else(|| panic!("rule references unknown step {}", rule.step_id));
            assert!(
                step.substeps.contains(&rule.canonical),
                "canonical '{}' not a substep of step {}",
                rule.canonical,
                rule.step_id
            );
        }
    }
}

pub mod normalize;

pub use normalize::{normalize_substep_title, possible_titles, titles_match};

use serde::Serialize;

/// One stage of the entrepreneurial journey.
///
/// The catalog is fixed at compile time; step ids are the stable keys that
/// resource records and progress aggregates are grouped by.
#[derive(Debug, Clone, Serialize)]
pub struct Step {
    pub id: u32,
    pub title: &'static str,
    pub description: &'static str,
    pub substeps: &'static [&'static str],
}

/// The Fund Road journey, ideation through financing.
pub const STEPS: &[Step] = &[
    Step {
        id: 1,
        title: "Idéation",
        description: "Passer de l'intuition à un projet formulé.",
        substeps: &[
            "Recherche utilisateur",
            "Définition du problème",
            "Proposition de valeur",
        ],
    },
    Step {
        id: 2,
        title: "Étude de marché",
        description: "Comprendre le marché, la concurrence et les clients visés.",
        substeps: &[
            "Analyse concurrentielle",
            "Segmentation clientèle",
            "Taille de marché",
        ],
    },
    Step {
        id: 3,
        title: "Business model",
        description: "Formaliser comment le projet crée et capte de la valeur.",
        substeps: &[
            "Modèle économique",
            "Sources de revenus",
            "Structure de coûts",
        ],
    },
    Step {
        id: 4,
        title: "Prototype & MVP",
        description: "Construire une première version et la confronter aux utilisateurs.",
        substeps: &["Cahier des charges", "Plan de test", "Retours utilisateurs"],
    },
    Step {
        id: 5,
        title: "Stratégie de lancement",
        description: "Préparer la mise sur le marché.",
        substeps: &["Plan marketing", "Canaux d'acquisition", "Feuille de route"],
    },
    Step {
        id: 6,
        title: "Financement",
        description: "Chiffrer le projet et convaincre les financeurs.",
        substeps: &[
            "Plan de financement",
            "Prévisionnel financier",
            "Pitch investisseurs",
        ],
    },
];

pub fn step_by_id(id: u32) -> Option<&'static Step> {
    STEPS.iter().find(|step| step.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_ids_are_unique_and_ordered() {
        for (i, step) in STEPS.iter().enumerate() {
            assert_eq!(step.id as usize, i + 1);
        }
    }

    #[test]
    fn step_lookup() {
        assert_eq!(step_by_id(1).unwrap().title, "Idéation");
        assert_eq!(step_by_id(6).unwrap().title, "Financement");
        assert!(step_by_id(99).is_none());
    }
}

//! `fundroad check` — configuration, rule-table, and backend diagnostics.

use anyhow::Result;

use crate::backend::BackendClient;
use crate::config::Config;
use crate::journey::normalize::NORMALIZATION_RULES;
use crate::journey::{normalize_substep_title, step_by_id, STEPS};

pub async fn run(config: &Config) -> Result<()> {
    let mut failures = 0;

    match config.validate() {
        Ok(()) => println!("Config: ok"),
        Err(err) => {
            println!("Config: FAILED: {}", err);
            failures += 1;
        }
    }

    // Every rule must point at a real step and a real substep of that step.
    let mut rule_problems = 0;
    for rule in NORMALIZATION_RULES {
        match step_by_id(rule.step_id) {
            None => {
                println!(
                    "Rule table: rule for '{}' references unknown step {}",
                    rule.canonical, rule.step_id
                );
                rule_problems += 1;
            }
            Some(step) if !step.substeps.contains(&rule.canonical) => {
                println!(
                    "Rule table: canonical '{}' is not a substep of step {}",
                    rule.canonical, rule.step_id
                );
                rule_problems += 1;
            }
            Some(_) => {}
        }
    }

    // Canonical titles must normalize to themselves, or lookups keyed on
    // them would miss their own records.
    for step in STEPS {
        for substep in step.substeps {
            let normalized = normalize_substep_title(step.id, substep);
            if normalized != *substep {
                println!(
                    "Rule table: '{}' (step {}) normalizes to '{}'",
                    substep, step.id, normalized
                );
                rule_problems += 1;
            }
        }
    }
    if rule_problems == 0 {
        println!("Rule table: ok ({} rules)", NORMALIZATION_RULES.len());
    } else {
        failures += 1;
    }

    let client = BackendClient::new(&config.backend)?;
    match client.health().await {
        Ok(()) => println!("Backend: reachable at {}", config.backend.url),
        Err(err) => {
            println!("Backend: FAILED: {}", err);
            failures += 1;
        }
    }

    if failures > 0 {
        anyhow::bail!("{} check(s) failed", failures);
    }
    Ok(())
}

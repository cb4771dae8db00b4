use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::fmt;

use crate::catalog::SkillCatalog;
use crate::plans::PlanStore;
use crate::plans::SkillPlan;
use crate::roster::Character;

/// Classification of one character against one plan. Exactly one value per
/// (character, plan) pair, so the three cases cannot overlap by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanStatus {
    /// Every requirement is already trained.
    Qualified,
    /// Every unmet requirement is in the training queue at a sufficient
    /// target level.
    Pending,
    /// At least one requirement is neither trained nor queued high enough.
    Missing,
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PlanStatus::Qualified => "Qualified",
            PlanStatus::Pending => "Pending",
            PlanStatus::Missing => "Missing",
        };
        f.write_str(label)
    }
}

/// Outcome of evaluating one plan for one character.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanEvaluation {
    pub status: PlanStatus,
    /// Skill name → required level, for every requirement that is neither
    /// trained nor queued high enough. Includes skills the catalog could
    /// not resolve, so data-integrity gaps stay visible.
    pub missing: BTreeMap<String, u8>,
    /// When `Pending`: the latest finish time among the still-training
    /// prerequisites; the plan is only as soon as its slowest skill.
    pub projected_finish: Option<DateTime<Utc>>,
}

/// Result of a full evaluation pass.
#[derive(Debug, Default)]
pub struct EvaluationReport {
    /// Plan name → character name → evaluation. Characters the caller did
    /// not hand in (no data fetched yet) are simply absent.
    pub plans: BTreeMap<String, BTreeMap<String, PlanEvaluation>>,
    /// Skill name → identifier for every requirement the catalog resolved
    /// during the pass.
    pub skill_ids: HashMap<String, i32>,
}

/// Cross-references every character against every plan.
///
/// Pure in its inputs apart from the documented write-back: each character's
/// `plan_statuses` entry for a plan is replaced with this pass's outcome.
/// Characters are independent of each other; plans for one character are
/// evaluated serially.
pub fn evaluate(
    characters: &mut [Character],
    plans: &PlanStore,
    catalog: &SkillCatalog,
) -> EvaluationReport {
    let mut report = EvaluationReport::default();

    for character in characters {
        let trained = trained_levels(character);
        let queued = queued_targets(character);

        for plan in plans.iter() {
            let evaluation = evaluate_plan(plan, &trained, &queued, catalog, &mut report.skill_ids);
            character
                .plan_statuses
                .insert(plan.name.clone(), evaluation.status);
            report
                .plans
                .entry(plan.name.clone())
                .or_default()
                .insert(character.name.clone(), evaluation);
        }
    }

    report
}

/// Current trained level per skill identifier. Last write wins, though in
/// practice each identifier appears once.
fn trained_levels(character: &Character) -> HashMap<i32, u8> {
    let mut levels = HashMap::with_capacity(character.skills.len());
    for skill in &character.skills {
        levels.insert(skill.skill_id, skill.trained_level);
    }
    levels
}

/// Highest queued target level per skill identifier, with that entry's
/// finish time. Later queue entries train higher levels of the same skill,
/// so the higher target wins.
fn queued_targets(character: &Character) -> HashMap<i32, (u8, Option<DateTime<Utc>>)> {
    let mut targets: HashMap<i32, (u8, Option<DateTime<Utc>>)> = HashMap::new();
    for entry in &character.queue {
        match targets.get(&entry.skill_id) {
            Some((level, _)) if *level >= entry.finished_level => {}
            _ => {
                targets.insert(entry.skill_id, (entry.finished_level, entry.finish_date));
            }
        }
    }
    targets
}

fn evaluate_plan(
    plan: &SkillPlan,
    trained: &HashMap<i32, u8>,
    queued: &HashMap<i32, (u8, Option<DateTime<Utc>>)>,
    catalog: &SkillCatalog,
    skill_ids: &mut HashMap<String, i32>,
) -> PlanEvaluation {
    let mut missing = BTreeMap::new();
    let mut pending = false;
    let mut projected_finish: Option<DateTime<Utc>> = None;

    for (skill_name, &required) in &plan.requirements {
        let Some(skill_id) = catalog.id_for(skill_name) else {
            // Unknown skill in a plan is a data-integrity signal: keep it
            // visible in the missing map instead of silently skipping it.
            tracing::warn!(plan = %plan.name, skill = %skill_name, "plan requires a skill absent from the catalog");
            missing.insert(skill_name.clone(), required);
            continue;
        };
        skill_ids.insert(skill_name.clone(), skill_id);

        if trained.get(&skill_id).copied().unwrap_or(0) >= required {
            continue;
        }

        match queued.get(&skill_id) {
            Some((target, finish)) if *target >= required => {
                pending = true;
                projected_finish = match (projected_finish, *finish) {
                    (Some(current), Some(candidate)) => Some(current.max(candidate)),
                    (None, Some(candidate)) => Some(candidate),
                    (current, None) => current,
                };
            }
            _ => {
                missing.insert(skill_name.clone(), required);
            }
        }
    }

    let status = if !missing.is_empty() {
        PlanStatus::Missing
    } else if pending {
        PlanStatus::Pending
    } else {
        // Includes the vacuous case: a plan with no requirements.
        PlanStatus::Qualified
    };

    PlanEvaluation {
        status,
        missing,
        projected_finish: if status == PlanStatus::Pending {
            projected_finish
        } else {
            None
        },
    }
}

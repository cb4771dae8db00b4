use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

use crate::resilience::BreakerError;
use crate::resilience::CircuitBreaker;

/// Extension used by plan files on disk and on the hosting service.
pub const PLAN_FILE_EXTENSION: &str = "plan";

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("plan read: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line_no}: expected \"<skill name> <level 0-5>\", got {line:?}")]
    Line { line_no: usize, line: String },
    #[error("plan download: {0}")]
    Download(#[from] reqwest::Error),
    /// The hosting service tripped the circuit breaker; nothing was fetched.
    #[error("plan host unavailable, circuit open")]
    HostUnavailable,
}

/// A named, user-defined set of (skill, minimum level) requirements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillPlan {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub requirements: BTreeMap<String, u8>,
}

impl SkillPlan {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            icon: None,
            requirements: BTreeMap::new(),
        }
    }
}

/// Parses the line-oriented plan format: one `"<skill name> <level>"` per
/// line. Duplicate skill lines keep the highest level; blank lines and
/// `#`-prefixed lines are ignored; `# icon: <value>` sets the display hint.
pub fn parse_plan_text(name: impl Into<String>, text: &str) -> Result<SkillPlan, PlanError> {
    let mut plan = SkillPlan::new(name);
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(comment) = line.strip_prefix('#') {
            if let Some(icon) = comment.trim().strip_prefix("icon:") {
                plan.icon = Some(icon.trim().to_string());
            }
            continue;
        }

        let (skill, level) = split_requirement(line).ok_or_else(|| PlanError::Line {
            line_no: idx + 1,
            line: line.to_string(),
        })?;
        let slot = plan.requirements.entry(skill.to_string()).or_insert(0);
        *slot = (*slot).max(level);
    }
    Ok(plan)
}

/// Splits a requirement line on its final whitespace gap; everything before
/// it is the skill name (names contain spaces), the last token the level.
fn split_requirement(line: &str) -> Option<(&str, u8)> {
    let (skill, level) = line.rsplit_once(char::is_whitespace)?;
    let skill = skill.trim_end();
    if skill.is_empty() {
        return None;
    }
    let level: u8 = level.parse().ok()?;
    if level > 5 {
        return None;
    }
    Some((skill, level))
}

/// Inverse of `parse_plan_text`, used by the save path.
pub fn render_plan_text(plan: &SkillPlan) -> String {
    let mut out = String::new();
    if let Some(icon) = &plan.icon {
        out.push_str(&format!("# icon: {icon}\n"));
    }
    for (skill, level) in &plan.requirements {
        out.push_str(&format!("{skill} {level}\n"));
    }
    out
}

/// In-memory plan catalog: plan name → definition.
///
/// Immutable for the duration of a qualification pass; `save` and `delete`
/// are the only mutations and are driven by the surrounding storage layer.
#[derive(Debug, Default)]
pub struct PlanStore {
    plans: HashMap<String, SkillPlan>,
}

impl PlanStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save(&mut self, plan: SkillPlan) {
        self.plans.insert(plan.name.clone(), plan);
    }

    pub fn delete(&mut self, name: &str) -> bool {
        self.plans.remove(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&SkillPlan> {
        self.plans.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.plans.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn iter(&self) -> impl Iterator<Item = &SkillPlan> {
        self.plans.values()
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    /// Loads every `*.plan` file under `dir`; the file stem is the plan
    /// name. A file that fails to parse is skipped with a warning so one
    /// bad plan does not hide the rest.
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize, PlanError> {
        let mut loaded = 0usize;
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(PLAN_FILE_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            let text = std::fs::read_to_string(&path)?;
            match parse_plan_text(stem, &text) {
                Ok(plan) => {
                    self.save(plan);
                    loaded += 1;
                }
                Err(err) => {
                    tracing::warn!(plan = stem, "skipping unparseable plan file: {err}");
                }
            }
        }
        Ok(loaded)
    }

    /// Bulk-downloads named plan files from a hosting service, guarded by
    /// the circuit breaker. An open circuit aborts the batch so the caller
    /// can decide whether to skip or queue it; a single bad file is logged
    /// and skipped.
    pub async fn fetch_remote(
        &mut self,
        http: &reqwest::Client,
        breaker: &CircuitBreaker,
        base_url: &str,
        names: &[String],
    ) -> Result<usize, PlanError> {
        let base = base_url.trim_end_matches('/');
        let mut stored = 0usize;
        for name in names {
            let url = format!("{base}/{name}.{PLAN_FILE_EXTENSION}");
            let result = breaker
                .call(|| async {
                    let response = http.get(&url).send().await?.error_for_status()?;
                    response.text().await
                })
                .await;
            let text = match result {
                Ok(text) => text,
                Err(BreakerError::Open) => return Err(PlanError::HostUnavailable),
                Err(BreakerError::Inner(err)) => {
                    tracing::warn!(plan = %name, "plan download failed: {err}");
                    continue;
                }
            };
            match parse_plan_text(name.clone(), &text) {
                Ok(plan) => {
                    self.save(plan);
                    stored += 1;
                }
                Err(err) => {
                    tracing::warn!(plan = %name, "downloaded plan did not parse: {err}");
                }
            }
        }
        Ok(stored)
    }
}

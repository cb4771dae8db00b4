use chrono::DateTime;
use chrono::Utc;
use futures::StreamExt;
use futures::stream;
use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::auth::CredentialHandle;
use crate::client::ApiClient;
use crate::client::FetchError;
use crate::qualify::PlanStatus;
use crate::resilience::ResponseCache;

pub const DEFAULT_FETCH_WORKERS: usize = 4;

/// One skill the character has finished training.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainedSkill {
    pub skill_id: i32,
    pub trained_level: u8,
}

/// One entry of the in-progress training queue. Multiple entries may name
/// the same skill (successive levels); qualification only cares about the
/// highest target level per skill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedSkillEntry {
    pub skill_id: i32,
    pub finished_level: u8,
    pub queue_position: i32,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finish_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct Character {
    pub character_id: i64,
    pub name: String,
    pub credential: CredentialHandle,
    pub skills: Vec<TrainedSkill>,
    pub queue: Vec<QueuedSkillEntry>,
    pub solar_system_id: Option<i64>,
    /// One status per plan. Writing a status replaces the previous one, so a
    /// plan can never be qualified and missing at the same time.
    pub plan_statuses: BTreeMap<String, PlanStatus>,
}

impl Character {
    pub fn new(character_id: i64, name: impl Into<String>, credential: CredentialHandle) -> Self {
        Self {
            character_id,
            name: name.into(),
            credential,
            skills: Vec::new(),
            queue: Vec::new(),
            solar_system_id: None,
            plan_statuses: BTreeMap::new(),
        }
    }
}

/// The player's characters plus the deny-list of identifiers the remote API
/// reported as gone (404), kept so later passes stop asking for them.
#[derive(Debug, Default)]
pub struct Roster {
    pub characters: Vec<Character>,
    denied: HashSet<i64>,
}

impl Roster {
    pub fn new(characters: Vec<Character>) -> Self {
        Self {
            characters,
            denied: HashSet::new(),
        }
    }

    pub fn deny(&mut self, character_id: i64) {
        self.denied.insert(character_id);
    }

    pub fn is_denied(&self, character_id: i64) -> bool {
        self.denied.contains(&character_id)
    }
}

#[derive(Debug, Default)]
struct CharacterData {
    skills: Vec<TrainedSkill>,
    queue: Vec<QueuedSkillEntry>,
    solar_system_id: Option<i64>,
}

enum FetchOutcome {
    Fetched(CharacterData),
    Gone,
}

/// Refreshes skills, queue, and location for every non-denied character,
/// `workers` at a time. A character whose fetch fails keeps empty data for
/// this pass, so one character's outage never aborts the rest of the roster.
pub async fn refresh_roster(
    client: &ApiClient,
    cache: &Arc<ResponseCache>,
    roster: &mut Roster,
    workers: usize,
    cancel: &CancellationToken,
) {
    let jobs: Vec<_> = roster
        .characters
        .iter()
        .enumerate()
        .filter(|(_, character)| !roster.is_denied(character.character_id))
        .map(|(idx, character)| {
            let client = client.clone();
            let cache = Arc::clone(cache);
            let credential = character.credential.clone();
            let character_id = character.character_id;
            let name = character.name.clone();
            let cancel = cancel.clone();
            async move {
                let outcome =
                    fetch_character_data(&client, &cache, character_id, &name, &credential, &cancel)
                        .await;
                (idx, character_id, outcome)
            }
        })
        .collect();

    let results: Vec<_> = stream::iter(jobs)
        .buffer_unordered(workers.max(1))
        .collect()
        .await;

    for (idx, character_id, outcome) in results {
        match outcome {
            FetchOutcome::Fetched(data) => {
                let character = &mut roster.characters[idx];
                character.skills = data.skills;
                character.queue = data.queue;
                character.solar_system_id = data.solar_system_id;
            }
            FetchOutcome::Gone => roster.deny(character_id),
        }
    }
}

/// Fetches the three character endpoints, degrading each one independently:
/// a fetch or decode failure logs a warning and leaves that slice of state
/// empty. A 404 means the character no longer exists upstream.
async fn fetch_character_data(
    client: &ApiClient,
    cache: &Arc<ResponseCache>,
    character_id: i64,
    name: &str,
    credential: &CredentialHandle,
    cancel: &CancellationToken,
) -> FetchOutcome {
    let mut data = CharacterData::default();

    match client
        .character_skills(cache, character_id, credential, cancel)
        .await
    {
        Ok(skills) => data.skills = skills.skills,
        Err(FetchError::NotFound) => {
            tracing::warn!(character = name, character_id, "character gone upstream (404)");
            return FetchOutcome::Gone;
        }
        Err(err) => {
            tracing::warn!(character = name, "skill fetch failed, using empty set: {err}");
        }
    }

    match client
        .skill_queue(cache, character_id, credential, cancel)
        .await
    {
        Ok(queue) => data.queue = queue,
        Err(FetchError::NotFound) => {
            tracing::warn!(character = name, character_id, "character gone upstream (404)");
            return FetchOutcome::Gone;
        }
        Err(err) => {
            tracing::warn!(character = name, "queue fetch failed, using empty queue: {err}");
        }
    }

    match client
        .character_location(cache, character_id, credential, cancel)
        .await
    {
        Ok(location) => data.solar_system_id = Some(location.solar_system_id),
        Err(err) => {
            tracing::debug!(character = name, "location fetch failed: {err}");
        }
    }

    FetchOutcome::Fetched(data)
}

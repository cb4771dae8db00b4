use chrono::DateTime;
use chrono::TimeZone;
use chrono::Utc;
use pilotdeck_core::ApiClient;
use pilotdeck_core::Character;
use pilotdeck_core::Credential;
use pilotdeck_core::CredentialHandle;
use pilotdeck_core::CredentialRefresher;
use pilotdeck_core::PlanStatus;
use pilotdeck_core::PlanStore;
use pilotdeck_core::ResponseCache;
use pilotdeck_core::RetryPolicy;
use pilotdeck_core::Roster;
use pilotdeck_core::SkillCatalog;
use pilotdeck_core::SkillCatalogEntry;
use pilotdeck_core::SkillPlan;
use pilotdeck_core::TrainedSkill;
use pilotdeck_core::client::create_http_client;
use pilotdeck_core::evaluate;
use pilotdeck_core::refresh_roster;
use pilotdeck_core::roster::QueuedSkillEntry;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;
use wiremock::matchers::method;
use wiremock::matchers::path;

const GUNNERY: i32 = 3300;
const AFTERBURNER: i32 = 3450;

fn catalog() -> SkillCatalog {
    SkillCatalog::from_entries(vec![
        SkillCatalogEntry {
            skill_id: GUNNERY,
            name: "Gunnery".to_string(),
            description: Some("Basic turret operation.".to_string()),
        },
        SkillCatalogEntry {
            skill_id: AFTERBURNER,
            name: "Afterburner".to_string(),
            description: None,
        },
    ])
}

fn plan(name: &str, requirements: &[(&str, u8)]) -> SkillPlan {
    let mut plan = SkillPlan::new(name);
    for (skill, level) in requirements {
        plan.requirements.insert((*skill).to_string(), *level);
    }
    plan
}

fn finish_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 1, 18, 30, 0)
        .single()
        .expect("valid timestamp")
}

#[test]
fn gunnery_in_queue_reports_pending_with_its_finish_time() {
    let mut pilot = Character::new(2_112_625_428, "Aruka", CredentialHandle::default());
    pilot.skills = vec![TrainedSkill {
        skill_id: GUNNERY,
        trained_level: 4,
    }];
    pilot.queue = vec![QueuedSkillEntry {
        skill_id: GUNNERY,
        finished_level: 5,
        queue_position: 0,
        start_date: None,
        finish_date: Some(finish_time()),
    }];
    let mut characters = vec![pilot];

    let mut plans = PlanStore::new();
    plans.save(plan("turret-mastery", &[("Gunnery", 5)]));

    let report = evaluate(&mut characters, &plans, &catalog());
    let evaluation = &report.plans["turret-mastery"]["Aruka"];

    assert_eq!(evaluation.status, PlanStatus::Pending);
    assert!(evaluation.missing.is_empty());
    assert_eq!(evaluation.projected_finish, Some(finish_time()));
    assert_eq!(
        characters[0].plan_statuses["turret-mastery"],
        PlanStatus::Pending
    );
}

#[test]
fn untouched_afterburner_requirement_reports_missing() {
    let mut characters = vec![Character::new(
        2_112_625_428,
        "Aruka",
        CredentialHandle::default(),
    )];

    let mut plans = PlanStore::new();
    plans.save(plan("propulsion", &[("Afterburner", 3)]));

    let report = evaluate(&mut characters, &plans, &catalog());
    let evaluation = &report.plans["propulsion"]["Aruka"];

    assert_eq!(evaluation.status, PlanStatus::Missing);
    assert_eq!(evaluation.missing.len(), 1);
    assert_eq!(evaluation.missing["Afterburner"], 3);
    assert_eq!(evaluation.projected_finish, None);
}

fn client_for(server: &MockServer) -> ApiClient {
    let refresher = CredentialRefresher::new(
        create_http_client(),
        format!("{}/token", server.uri()),
        "test-app".to_string(),
    );
    ApiClient::new(server.uri(), refresher).with_policy(RetryPolicy::no_retry())
}

fn credential() -> CredentialHandle {
    CredentialHandle::new(Credential {
        access_token: "tok".to_string(),
        refresh_token: "refresh".to_string(),
        expires_at: None,
    })
}

#[tokio::test]
async fn roster_pass_feeds_the_engine_and_degrades_per_character() {
    let server = MockServer::start().await;

    // Character 11: fully healthy endpoints.
    Mock::given(method("GET"))
        .and(path("/characters/11/skills"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "skills": [{"skill_id": GUNNERY, "trained_level": 5}],
            "total_sp": 1_200_000,
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/characters/11/skillqueue"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/characters/11/location"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "solar_system_id": 30_000_142,
        })))
        .mount(&server)
        .await;

    // Character 22: the API is down for every endpoint.
    for endpoint in ["skills", "skillqueue", "location"] {
        Mock::given(method("GET"))
            .and(path(format!("/characters/22/{endpoint}")))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
    }

    let client = client_for(&server);
    let cache = Arc::new(ResponseCache::new());
    let cancel = CancellationToken::new();

    let mut roster = Roster::new(vec![
        Character::new(11, "Healthy", credential()),
        Character::new(22, "Degraded", credential()),
    ]);
    refresh_roster(&client, &cache, &mut roster, 4, &cancel).await;

    assert_eq!(roster.characters[0].skills.len(), 1);
    assert_eq!(roster.characters[0].solar_system_id, Some(30_000_142));
    // The degraded character fell back to empty data instead of aborting.
    assert!(roster.characters[1].skills.is_empty());
    assert!(roster.characters[1].queue.is_empty());

    let mut plans = PlanStore::new();
    plans.save(plan("turret-mastery", &[("Gunnery", 5)]));
    let report = evaluate(&mut roster.characters, &plans, &catalog());

    assert_eq!(
        report.plans["turret-mastery"]["Healthy"].status,
        PlanStatus::Qualified
    );
    assert_eq!(
        report.plans["turret-mastery"]["Degraded"].status,
        PlanStatus::Missing
    );
    // Healthy responses were cached for the next pass.
    assert!(cache.len() >= 3);
}

#[tokio::test]
async fn vanished_character_is_deny_listed_and_not_refetched() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/characters/99/skills"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let cache = Arc::new(ResponseCache::new());
    let cancel = CancellationToken::new();

    let mut roster = Roster::new(vec![Character::new(99, "Ghost", credential())]);

    refresh_roster(&client, &cache, &mut roster, 2, &cancel).await;
    assert!(roster.is_denied(99));

    // The deny-list keeps the second pass from asking again.
    refresh_roster(&client, &cache, &mut roster, 2, &cancel).await;
}

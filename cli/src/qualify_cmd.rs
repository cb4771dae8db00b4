use anyhow::Context;
use anyhow::Result;
use pilotdeck_core::ApiClient;
use pilotdeck_core::Character;
use pilotdeck_core::Config;
use pilotdeck_core::Credential;
use pilotdeck_core::CredentialHandle;
use pilotdeck_core::CredentialRefresher;
use pilotdeck_core::PlanStatus;
use pilotdeck_core::PlanStore;
use pilotdeck_core::ResponseCache;
use pilotdeck_core::Roster;
use pilotdeck_core::SkillCatalog;
use pilotdeck_core::client::create_http_client;
use pilotdeck_core::evaluate;
use pilotdeck_core::refresh_roster;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, clap::Args)]
pub struct QualifyArgs {
    /// Roster file: JSON list of characters with their refresh tokens.
    #[arg(long, default_value = "roster.json")]
    roster: PathBuf,

    /// Write the cache snapshot after the pass.
    #[arg(long)]
    snapshot: bool,
}

/// One character entry of the roster file. Tokens come from the OAuth flow
/// handled outside this tool.
#[derive(Debug, Deserialize)]
struct RosterSeed {
    character_id: i64,
    name: String,
    #[serde(default)]
    access_token: String,
    refresh_token: String,
}

pub async fn run(config: Config, args: QualifyArgs) -> Result<()> {
    let catalog = SkillCatalog::load(&config.catalog_path)
        .with_context(|| format!("loading skill catalog {}", config.catalog_path.display()))?;

    let mut plans = PlanStore::new();
    let loaded = plans
        .load_dir(&config.plans_dir)
        .with_context(|| format!("loading plans from {}", config.plans_dir.display()))?;
    if loaded == 0 {
        anyhow::bail!("no plan files found in {}", config.plans_dir.display());
    }

    let seeds: Vec<RosterSeed> = {
        let raw = std::fs::read(&args.roster)
            .with_context(|| format!("reading roster {}", args.roster.display()))?;
        serde_json::from_slice(&raw).context("parsing roster file")?
    };
    let characters = seeds
        .into_iter()
        .map(|seed| {
            Character::new(
                seed.character_id,
                seed.name,
                CredentialHandle::new(Credential {
                    access_token: seed.access_token,
                    refresh_token: seed.refresh_token,
                    expires_at: None,
                }),
            )
        })
        .collect();
    let mut roster = Roster::new(characters);

    let refresher = CredentialRefresher::new(
        create_http_client(),
        config.token_url.clone(),
        config.client_id.clone(),
    );
    let client = ApiClient::new(config.api_base_url.clone(), refresher)
        .with_character_ttl(config.character_ttl());

    let cache = Arc::new(ResponseCache::new());
    if let Some(path) = &config.cache_snapshot_path
        && path.exists()
    {
        let restored = cache.load_snapshot(path)?;
        tracing::debug!(restored, "cache snapshot restored");
    }

    let cancel = CancellationToken::new();
    let sweeper = Arc::clone(&cache).spawn_sweeper(config.sweep_interval(), cancel.clone());
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    refresh_roster(&client, &cache, &mut roster, config.fetch_workers, &cancel).await;
    let report = evaluate(&mut roster.characters, &plans, &catalog);

    for (plan_name, outcomes) in &report.plans {
        println!("{plan_name}");
        for (character, evaluation) in outcomes {
            match evaluation.status {
                PlanStatus::Qualified => println!("  {character}: Qualified"),
                PlanStatus::Pending => {
                    let finish = evaluation
                        .projected_finish
                        .map(|when| when.format("%Y-%m-%d %H:%M UTC").to_string())
                        .unwrap_or_else(|| "queue paused".to_string());
                    println!("  {character}: Pending (done {finish})");
                }
                PlanStatus::Missing => {
                    let gaps: Vec<String> = evaluation
                        .missing
                        .iter()
                        .map(|(skill, level)| format!("{skill} {level}"))
                        .collect();
                    println!("  {character}: Missing [{}]", gaps.join(", "));
                }
            }
        }
    }

    if args.snapshot {
        let path = config
            .cache_snapshot_path
            .as_ref()
            .context("--snapshot requires cache_snapshot_path in the config")?;
        let saved = cache.save_snapshot(path)?;
        tracing::debug!(saved, "cache snapshot written");
    }

    cancel.cancel();
    let _ = sweeper.await;
    Ok(())
}

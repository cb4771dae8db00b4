use anyhow::Context;
use anyhow::Result;
use pilotdeck_core::Config;
use pilotdeck_core::PlanStore;
use pilotdeck_core::parse_plan_text;
use pilotdeck_core::render_plan_text;
use std::path::PathBuf;

#[derive(Debug, clap::Args)]
pub struct PlansCli {
    #[command(subcommand)]
    subcommand: PlansSubcommand,
}

#[derive(Debug, clap::Subcommand)]
enum PlansSubcommand {
    /// List every plan in the plans directory.
    List,
    /// Print one plan in its text form.
    Show { name: String },
    /// Parse a plan file and report problems without storing it.
    Check { file: PathBuf },
}

pub fn run(config: Config, args: PlansCli) -> Result<()> {
    match args.subcommand {
        PlansSubcommand::List => {
            let mut store = PlanStore::new();
            store
                .load_dir(&config.plans_dir)
                .with_context(|| format!("loading plans from {}", config.plans_dir.display()))?;
            for name in store.names() {
                let plan = store.get(name).context("plan vanished from store")?;
                let icon = plan.icon.as_deref().unwrap_or("-");
                println!("{name}  [{icon}]  {} skills", plan.requirements.len());
            }
            Ok(())
        }
        PlansSubcommand::Show { name } => {
            let mut store = PlanStore::new();
            store
                .load_dir(&config.plans_dir)
                .with_context(|| format!("loading plans from {}", config.plans_dir.display()))?;
            let plan = store
                .get(&name)
                .with_context(|| format!("no plan named {name:?}"))?;
            print!("{}", render_plan_text(plan));
            Ok(())
        }
        PlansSubcommand::Check { file } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let stem = file
                .file_stem()
                .and_then(|stem| stem.to_str())
                .unwrap_or("plan");
            let plan = parse_plan_text(stem, &text)?;
            println!(
                "{}: ok ({} skills{})",
                plan.name,
                plan.requirements.len(),
                plan.icon
                    .as_deref()
                    .map(|icon| format!(", icon {icon}"))
                    .unwrap_or_default()
            );
            Ok(())
        }
    }
}

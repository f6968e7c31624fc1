//! CLI subcommand handlers.

use crate::progress::StderrProgress;
use crate::{Commands, ConfigAction, GenerateArgs, OverlayAction};
use briefsmith_core::config::{BriefConfig, load_config, user_config_path, workspace_config_path};
use briefsmith_core::repair::{RepairStrategy, try_repair};
use briefsmith_core::{KnowledgeOverlay, SynthesisPipeline, SynthesisRequest};
use serde_json::{Map, Value, json};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Handle a CLI subcommand.
pub async fn handle_command(
    command: Commands,
    workspace: &Path,
    model: Option<&str>,
    quiet: bool,
) -> anyhow::Result<()> {
    match command {
        Commands::Generate(args) => handle_generate(args, workspace, model, quiet).await,
        Commands::Overlay { action } => handle_overlay(action, workspace),
        Commands::Repair { file } => handle_repair(&file),
        Commands::Config { action } => handle_config(action, workspace),
    }
}

fn load(workspace: &Path) -> anyhow::Result<BriefConfig> {
    load_config(Some(workspace), None).map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
}

fn build_request(args: &GenerateArgs) -> anyhow::Result<SynthesisRequest> {
    let mut builder =
        SynthesisRequest::builder(&args.event, &args.city, &args.country, &args.start);
    if let Some(end) = &args.end {
        builder = builder.end_date(end);
    }
    if let Some(venue) = &args.venue {
        builder = builder.venue(venue);
    }
    if let Some(event_type) = &args.event_type {
        builder = builder.event_type(event_type);
    }
    if let Some(context) = &args.context {
        builder = builder.context(context);
    }
    if let Some(website) = &args.website {
        builder = builder.website(website);
    }
    Ok(builder.build()?)
}

async fn handle_generate(
    args: GenerateArgs,
    workspace: &Path,
    model: Option<&str>,
    quiet: bool,
) -> anyhow::Result<()> {
    let request = build_request(&args)?;

    let mut config = load(workspace)?;
    if let Some(model) = model {
        config.llm.model = model.to_string();
    }
    if let Some(language) = &args.language {
        config.synthesis.language = language.clone();
    }
    if args.parallel {
        config.research.parallel = true;
        config.synthesis.parallel = true;
    }
    for warning in config.llm.validate() {
        warn!(warning = warning.as_str(), "Configuration warning");
    }

    let pipeline = SynthesisPipeline::new(config)?
        .with_callback(Arc::new(StderrProgress::new(quiet)));
    let outcome = pipeline.run(&request).await?;

    let value = if args.report {
        json!({
            "record": outcome.record,
            "report": {
                "stages": outcome.stages,
                "queries": outcome.queries,
                "overrides": outcome.overrides,
                "normalize": outcome.normalize,
                "usage": outcome.usage,
            },
        })
    } else {
        outcome.record.into_value()
    };
    let text = if args.pretty {
        serde_json::to_string_pretty(&value)?
    } else {
        serde_json::to_string(&value)?
    };

    match &args.output {
        Some(path) => {
            std::fs::write(path, text)?;
            info!(path = %path.display(), "Briefing written");
            if !quiet {
                eprintln!("Wrote {}", path.display());
            }
        }
        None => println!("{}", text),
    }
    Ok(())
}

fn handle_overlay(action: OverlayAction, workspace: &Path) -> anyhow::Result<()> {
    match action {
        OverlayAction::Show {
            event,
            country,
            city,
            start,
        } => {
            let config = load(workspace)?;
            let overlay = KnowledgeOverlay::from_config(&config.knowledge)?;
            let country = country.unwrap_or_else(|| "Unspecified".to_string());
            let city = city.unwrap_or_else(|| country.clone());
            let start = start
                .unwrap_or_else(|| chrono::Utc::now().date_naive().format("%Y-%m-%d").to_string());
            let request = SynthesisRequest::builder(&event, &city, &country, &start).build()?;

            let home = &config.organization.home_country;
            match overlay.render_block(&request, home) {
                Some(block) => println!("{}\n", block),
                None => {
                    println!("No overlay entry matches '{}'.", event);
                    return Ok(());
                }
            }
            let vars = overlay.override_variables(&request, home);
            println!("Override values ({}):", vars.len());
            for (path, value) in vars.iter() {
                println!("  {} = {}", path, value);
            }
            Ok(())
        }
    }
}

/// Run structured-output repair on the contents of `file`.
fn repair_file(file: &Path) -> anyhow::Result<Option<(Map<String, Value>, RepairStrategy)>> {
    let raw = std::fs::read_to_string(file)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", file.display(), e))?;
    Ok(try_repair(&raw))
}

fn handle_repair(file: &Path) -> anyhow::Result<()> {
    let object = match repair_file(file)? {
        Some((object, strategy)) => {
            eprintln!("Recovered with strategy: {}", strategy);
            object
        }
        None => {
            eprintln!("Nothing recoverable; returning an empty object");
            Map::new()
        }
    };
    println!("{}", serde_json::to_string_pretty(&Value::Object(object))?);
    Ok(())
}

fn handle_config(action: ConfigAction, workspace: &Path) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load(workspace)?;
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
        ConfigAction::Path => {
            let describe = |path: &Path| {
                if path.exists() {
                    format!("{} (found)", path.display())
                } else {
                    format!("{} (not found)", path.display())
                }
            };
            match user_config_path() {
                Some(path) => println!("user:      {}", describe(&path)),
                None => println!("user:      (no home directory)"),
            }
            println!("workspace: {}", describe(&workspace_config_path(workspace)));
            Ok(())
        }
    }
}

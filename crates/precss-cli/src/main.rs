use std::fs;

use anyhow::{Context, Result};
use clap::Parser;
use precss_core::config::Disabled;
use precss_core::{Options, Processor};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "precss=info,precss_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            input,
            output,
            config,
            import_paths,
            unresolved,
            disable,
            dir,
            preserve_logical,
            stringifier,
            deps,
        } => {
            let mut options = match &config {
                Some(path) => Options::load(path)?,
                None => Options::default(),
            };
            options.import_paths.extend(import_paths);
            if let Some(policy) = unresolved {
                options.unresolved = policy;
            }
            if let Some(list) = disable {
                options.disable = Disabled::parse(&list);
            }
            if dir.is_some() {
                options.logical.dir = dir;
            }
            options.logical.preserve |= preserve_logical;
            if let Some(stringifier) = stringifier {
                options.color_mod.stringifier = stringifier;
            }

            let result = Processor::new(options)
                .process_file(&input)
                .with_context(|| format!("Failed to build {}", input.display()))?;

            for warning in &result.warnings {
                tracing::warn!("{warning}");
            }

            match &output {
                Some(path) => {
                    fs::write(path, &result.css)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    tracing::info!(output = %path.display(), "Wrote CSS");
                }
                None => print!("{}", result.css),
            }

            if deps {
                let records: Vec<serde_json::Value> = result
                    .dependencies
                    .iter()
                    .map(|dependency| {
                        serde_json::json!({
                            "file": dependency.file.display().to_string(),
                            "parent": dependency.parent.as_ref().map(|p| p.display().to_string()),
                        })
                    })
                    .collect();
                eprintln!("{}", serde_json::to_string_pretty(&records)?);
            }
        }
    }

    Ok(())
}

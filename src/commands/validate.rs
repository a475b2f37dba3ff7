use crate::output::UserOutput;
use std::path::PathBuf;
use testservices::{CandidateConfig, Parser as ConfigParser};

pub fn run_validate(config_path: Option<PathBuf>, out: &dyn UserOutput) -> anyhow::Result<()> {
    let parser = ConfigParser::new();
    let config_path = if let Some(path) = config_path {
        path
    } else {
        match parser.find_config_file() {
            Ok(path) => path,
            Err(_) => {
                out.error("Error: No configuration file found");
                out.status("\nSearched for testservices.yaml in:");
                out.status(&format!(
                    "  - Current directory: {}",
                    std::env::current_dir()?.display()
                ));
                out.status("  - Parent directories up to root");
                return Err(anyhow::anyhow!("Configuration file not found"));
            }
        }
    };

    out.status(&format!("Validating {}...", config_path.display()));

    let config = match parser.load_config(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            out.error("Configuration failed to load");
            return Err(e.into());
        }
    };

    config.validate()?;

    out.success("Configuration is valid\n");

    // Show summary
    out.data(&format!("Needs: {}", config.needs.len()));
    for (need, candidates) in &config.needs {
        out.data(&format!("  - {}", need));
        for candidate in candidates {
            let detail = match candidate {
                CandidateConfig::Container { container } => container
                    .preset
                    .clone()
                    .or_else(|| container.image.clone())
                    .unwrap_or_default(),
                CandidateConfig::Env { env } => env
                    .url
                    .clone()
                    .or_else(|| env.host.clone())
                    .or_else(|| env.preset.clone())
                    .unwrap_or_default(),
            };
            out.data(&format!(
                "      {} ({}: {})",
                candidate.name(),
                candidate.kind(),
                detail
            ));
        }
    }

    Ok(())
}

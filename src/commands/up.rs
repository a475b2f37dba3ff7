use super::select_providers;
use crate::output::UserOutput;
use testservices::Collection;

pub async fn run_up(
    collection: &Collection,
    needs: &[String],
    json: bool,
    out: &dyn UserOutput,
) -> anyhow::Result<()> {
    let providers = select_providers(collection, needs)?;
    let mut resolutions = Vec::with_capacity(providers.len());

    for provider in providers {
        out.progress(&format!("Provisioning {}... ", provider.need()));
        match provider.resolve().await {
            Ok(resolution) => {
                let how = if resolution.created { "created" } else { "reused" };
                out.finish_progress(&format!(
                    "{} {} '{}' at {}",
                    how, resolution.kind, resolution.service, resolution.handle
                ));
                resolutions.push(resolution);
            }
            Err(e) => {
                out.finish_progress("failed");
                return Err(e.into());
            }
        }
    }

    if json {
        out.data(&serde_json::to_string_pretty(&resolutions)?);
    } else {
        out.success(&format!("{} need(s) ready", resolutions.len()));
    }
    Ok(())
}

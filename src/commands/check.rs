use super::select_providers;
use crate::output::UserOutput;
use testservices::Collection;

pub async fn run_check(
    collection: &Collection,
    needs: &[String],
    json: bool,
    out: &dyn UserOutput,
) -> anyhow::Result<()> {
    let providers = select_providers(collection, needs)?;

    if json {
        let mut report = serde_json::Map::new();
        for provider in providers {
            let candidates = provider.check().await?;
            report.insert(provider.need().to_string(), serde_json::to_value(candidates)?);
        }
        out.data(&serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for provider in providers {
        out.data(&format!("{}:", provider.need()));
        let reports = provider.check().await?;
        let mut chosen = false;
        for report in reports {
            let (icon, detail) = match (&report.unavailable, report.exists) {
                (Some(reason), _) => ("x", reason.clone()),
                (None, Some(true)) => ("+", "running".to_string()),
                (None, _) => ("o", "possible, not running".to_string()),
            };
            // The first possible candidate is the one `up` would use
            let marker = if report.unavailable.is_none() && !chosen {
                chosen = true;
                " <- selected"
            } else {
                ""
            };
            out.data(&format!(
                "  {} {:<24} {:<12} {}{}",
                icon, report.service, report.kind, detail, marker
            ));
        }
        if !chosen {
            out.warning(&format!("  no candidate available for '{}'", provider.need()));
        }
    }

    Ok(())
}

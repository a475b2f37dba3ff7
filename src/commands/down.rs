use super::select_providers;
use crate::output::UserOutput;
use testservices::{Collection, Error};

pub async fn run_down(
    collection: &Collection,
    needs: &[String],
    out: &dyn UserOutput,
) -> anyhow::Result<()> {
    if needs.is_empty() {
        out.status("Tearing down all needs...");
        collection.down().await?;
        out.success("Done");
        return Ok(());
    }

    let mut errors = Vec::new();
    for provider in select_providers(collection, needs)?.into_iter().rev() {
        out.status(&format!("Tearing down {}...", provider.need()));
        errors.extend(provider.down().await);
    }

    match errors.len() {
        0 => {
            out.success("Done");
            Ok(())
        }
        1 => Err(errors.remove(0).into()),
        _ => Err(Error::Multiple(errors).into()),
    }
}

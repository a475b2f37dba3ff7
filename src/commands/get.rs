use crate::cli::Format;
use crate::output::UserOutput;
use testservices::{Collection, ConnectionHandle};

pub async fn run_get(
    collection: &Collection,
    need: &str,
    format: Format,
    prefix: Option<&str>,
    out: &dyn UserOutput,
) -> anyhow::Result<()> {
    let handle = collection.get(need).await?;
    out.data(&render(&handle, need, format, prefix)?);
    Ok(())
}

fn render(
    handle: &ConnectionHandle,
    need: &str,
    format: Format,
    prefix: Option<&str>,
) -> anyhow::Result<String> {
    Ok(match format {
        Format::Env => handle
            .to_env(prefix.unwrap_or(need))
            .into_iter()
            .map(|(key, value)| format!("export {}={}", key, shell_quote(&value)))
            .collect::<Vec<_>>()
            .join("\n"),
        Format::Json => serde_json::to_string_pretty(handle)?,
        Format::Url => match handle.url() {
            Some(url) => url,
            None => anyhow::bail!(
                "'{}' has no URL scheme; use --format env or json, or set 'scheme' in the config",
                need
            ),
        },
    })
}

/// Single-quote `value` for POSIX shells when it contains anything unusual.
fn shell_quote(value: &str) -> String {
    let plain = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "@%+=:,./-_".contains(c));
    if plain {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}

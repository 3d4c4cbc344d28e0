use crate::config::StatePaths;
use crate::outln;
use crate::sandbox::StateStores;
use crate::util::{format_table, set_json_output};
use anyhow::{Context, Result};
use serde_json::Value;

pub fn list() -> Result<()> {
    let paths = StatePaths::resolve()?;
    let stores = StateStores::open(&paths);

    let sandboxes = stores.sandboxes.list()?;
    if sandboxes.is_empty() {
        outln!("No sandboxes found.");
        set_json_output("sandboxes", &Value::Array(vec![]));
        return Ok(());
    }

    let rows: Vec<Vec<String>> = sandboxes
        .iter()
        .map(|sb| {
            vec![
                sb.name.clone(),
                sb.provider.to_string(),
                sb.image.clone(),
                sb.created_at.clone(),
            ]
        })
        .collect();
    for line in format_table(&["NAME", "PROVIDER", "IMAGE", "CREATED"], &rows)
    {
        outln!("{}", line);
    }

    let json = sandboxes
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to serialize sandbox records")?;
    set_json_output("sandboxes", &Value::Array(json));
    Ok(())
}

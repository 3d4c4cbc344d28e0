use crate::config::StatePaths;
use crate::outln;
use crate::runtime::RuntimeProvider;
use crate::sandbox::{StateStores, backing_summaries, delete_tracked_backing};
use crate::util::{format_table, set_json_output};
use anyhow::Result;
use serde_json::{Value, json};

pub fn volume_list() -> Result<()> {
    let paths = StatePaths::resolve()?;
    let stores = StateStores::open(&paths);

    let summaries = backing_summaries(&stores)?;
    if summaries.is_empty() {
        outln!("No volumes found.");
        set_json_output("volumes", &Value::Array(vec![]));
        return Ok(());
    }

    let rows: Vec<Vec<String>> = summaries
        .iter()
        .map(|s| {
            vec![
                s.name.clone(),
                s.kind.as_str().to_string(),
                s.created_at.clone(),
                if s.sandbox_refs.is_empty() { "no" } else { "yes" }
                    .to_string(),
                s.sandbox_refs.join(","),
                s.source_path.clone().unwrap_or_default(),
            ]
        })
        .collect();
    for line in format_table(
        &["NAME", "TYPE", "CREATED", "IN_USE", "SANDBOXES", "SOURCE"],
        &rows,
    ) {
        outln!("{}", line);
    }

    let json = summaries
        .iter()
        .map(|s| {
            json!({
                "name": s.name,
                "type": s.kind.as_str(),
                "createdAt": s.created_at,
                "sandboxRefs": s.sandbox_refs,
                "sourcePath": s.source_path,
            })
        })
        .collect();
    set_json_output("volumes", &Value::Array(json));
    Ok(())
}

pub fn volume_delete(name: &str, force: bool) -> Result<()> {
    let paths = StatePaths::resolve()?;
    let stores = StateStores::open(&paths);
    let runtime = RuntimeProvider::Docker.runtime();

    delete_tracked_backing(&stores, runtime.as_ref(), name, force)?;
    outln!("Volume {:?} deleted", name);
    set_json_output("volume", &Value::String(name.to_string()));
    Ok(())
}

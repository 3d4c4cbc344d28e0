use crate::config::StatePaths;
use crate::outln;
use crate::sandbox::{DeletePolicy, StateStores, delete_sandbox};
use crate::util::set_json_output;
use anyhow::{Result, anyhow};
use serde_json::Value;
use std::io;

pub fn delete(
    name: &str,
    delete_volumes: bool,
    keep_volumes: bool,
) -> Result<()> {
    let policy = resolve_policy(delete_volumes, keep_volumes)?;

    let paths = StatePaths::resolve()?;
    let stores = StateStores::open(&paths);
    let record = stores
        .sandboxes
        .get(name)?
        .ok_or_else(|| anyhow!("Sandbox {:?} not found", name))?;
    let runtime = record.provider.runtime();

    let report = delete_sandbox(
        &stores,
        runtime.as_ref(),
        name,
        policy,
        &mut io::stdin().lock(),
    )?;

    outln!("Sandbox {:?} deleted", name);
    let mut statuses = Vec::new();
    for status in &report.statuses {
        outln!("{}", status);
        statuses.push(Value::String(status.to_string()));
    }
    set_json_output("sandbox", &Value::String(name.to_string()));
    set_json_output("volumes", &Value::Array(statuses));

    match report.failure() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn resolve_policy(
    delete_volumes: bool,
    keep_volumes: bool,
) -> Result<DeletePolicy> {
    match (delete_volumes, keep_volumes) {
        (true, true) => Err(anyhow!(
            "Cannot use --delete-volumes and --keep-volumes together"
        )),
        (true, false) => Ok(DeletePolicy::DeleteBacking),
        (false, true) => Ok(DeletePolicy::KeepBacking),
        (false, false) => Ok(DeletePolicy::Auto),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_policy() {
        assert_eq!(
            resolve_policy(true, false).expect("delete"),
            DeletePolicy::DeleteBacking
        );
        assert_eq!(
            resolve_policy(false, true).expect("keep"),
            DeletePolicy::KeepBacking
        );
        assert_eq!(
            resolve_policy(false, false).expect("auto"),
            DeletePolicy::Auto
        );
        assert!(resolve_policy(true, true).is_err());
    }
}

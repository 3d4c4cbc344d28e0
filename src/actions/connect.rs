use crate::config::StatePaths;
use crate::sandbox::{CONTAINER_HOME, StateStores};
use anyhow::{Result, anyhow};

pub fn connect(name: &str, shell: &str) -> Result<()> {
    if shell.trim().is_empty() {
        return Err(anyhow!("--shell must not be empty"));
    }

    let paths = StatePaths::resolve()?;
    let stores = StateStores::open(&paths);
    let record = stores
        .sandboxes
        .get(name)?
        .ok_or_else(|| anyhow!("Sandbox {:?} not found", name))?;
    let runtime = record.provider.runtime();

    let code = runtime
        .exec_interactive(name, CONTAINER_HOME, shell)
        .map_err(|e| {
            anyhow!(
                "Failed to connect to sandbox {:?} with shell {:?}: {}",
                name,
                shell,
                e
            )
        })?;
    if code != 0 {
        log::logger().flush();
        std::process::exit(code);
    }
    Ok(())
}

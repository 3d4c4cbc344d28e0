//! An in-memory runtime used by the test-suite in place of a real container
//! runtime. Failure injection lets tests exercise the rollback paths.

use crate::runtime::{EphemeralRun, Runtime};
use crate::sandbox::binding::RuntimeBinding;
use anyhow::{Result, anyhow};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Clone)]
pub struct FakeContainer {
    pub image: String,
    pub bindings: Vec<RuntimeBinding>,
    pub env: Vec<String>,
}

#[derive(Debug, Default)]
struct FakeState {
    containers: BTreeMap<String, FakeContainer>,
    volumes: BTreeSet<String>,
    populated: Vec<(String, PathBuf)>,
    images: BTreeSet<String>,
    built_images: Vec<String>,
    ephemeral_runs: Vec<Vec<String>>,
    fail_create_container: bool,
    fail_remove_container: bool,
    fail_create_volume: bool,
    fail_remove_volume: bool,
    fail_populate: bool,
}

#[derive(Default)]
pub struct FakeRuntime {
    state: Mutex<FakeState>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_create_container(&self) {
        self.state.lock().expect("lock").fail_create_container = true;
    }

    pub fn fail_remove_container(&self) {
        self.state.lock().expect("lock").fail_remove_container = true;
    }

    pub fn fail_create_volume(&self) {
        self.state.lock().expect("lock").fail_create_volume = true;
    }

    pub fn fail_remove_volume(&self) {
        self.state.lock().expect("lock").fail_remove_volume = true;
    }

    pub fn fail_populate(&self) {
        self.state.lock().expect("lock").fail_populate = true;
    }

    pub fn add_image(&self, image: &str) {
        self.state
            .lock()
            .expect("lock")
            .images
            .insert(image.to_string());
    }

    pub fn container(&self, name: &str) -> Option<FakeContainer> {
        self.state
            .lock()
            .expect("lock")
            .containers
            .get(name)
            .cloned()
    }

    pub fn container_names(&self) -> Vec<String> {
        self.state
            .lock()
            .expect("lock")
            .containers
            .keys()
            .cloned()
            .collect()
    }

    pub fn volume_names(&self) -> Vec<String> {
        self.state
            .lock()
            .expect("lock")
            .volumes
            .iter()
            .cloned()
            .collect()
    }

    pub fn populated_from(&self, volume: &str) -> Option<PathBuf> {
        self.state
            .lock()
            .expect("lock")
            .populated
            .iter()
            .find(|(v, _)| v == volume)
            .map(|(_, dir)| dir.clone())
    }

    pub fn built_images(&self) -> Vec<String> {
        self.state.lock().expect("lock").built_images.clone()
    }

    pub fn ephemeral_runs(&self) -> Vec<Vec<String>> {
        self.state.lock().expect("lock").ephemeral_runs.clone()
    }
}

impl Runtime for FakeRuntime {
    fn create_container(
        &self,
        name: &str,
        image: &str,
        bindings: &[RuntimeBinding],
        env: &[String],
    ) -> Result<String> {
        let mut state = self.state.lock().expect("lock");
        if state.fail_create_container {
            return Err(anyhow!("fake runtime: container creation refused"));
        }
        if state.containers.contains_key(name) {
            return Err(anyhow!(
                "fake runtime: container {:?} already exists",
                name
            ));
        }
        state.containers.insert(
            name.to_string(),
            FakeContainer {
                image: image.to_string(),
                bindings: bindings.to_vec(),
                env: env.to_vec(),
            },
        );
        Ok(format!("fake-{}", name))
    }

    fn remove_container(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock().expect("lock");
        if state.fail_remove_container {
            return Err(anyhow!("fake runtime: container removal refused"));
        }
        state.containers.remove(name);
        Ok(())
    }

    fn create_volume(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock().expect("lock");
        if state.fail_create_volume {
            return Err(anyhow!("fake runtime: volume creation refused"));
        }
        state.volumes.insert(name.to_string());
        Ok(())
    }

    fn remove_volume(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock().expect("lock");
        if state.fail_remove_volume {
            return Err(anyhow!("fake runtime: volume removal refused"));
        }
        state.volumes.remove(name);
        Ok(())
    }

    fn volume_exists(&self, name: &str) -> bool {
        self.state.lock().expect("lock").volumes.contains(name)
    }

    fn populate_volume(&self, volume: &str, host_dir: &Path) -> Result<()> {
        let mut state = self.state.lock().expect("lock");
        if state.fail_populate {
            return Err(anyhow!("fake runtime: volume population refused"));
        }
        if !state.volumes.contains(volume) {
            return Err(anyhow!("fake runtime: no such volume {:?}", volume));
        }
        state
            .populated
            .push((volume.to_string(), host_dir.to_path_buf()));
        Ok(())
    }

    fn image_exists(&self, image: &str) -> bool {
        self.state.lock().expect("lock").images.contains(image)
    }

    fn build_image(&self, image: &str, _dockerfile: &str) -> Result<()> {
        let mut state = self.state.lock().expect("lock");
        state.images.insert(image.to_string());
        state.built_images.push(image.to_string());
        Ok(())
    }

    fn exec_interactive(
        &self,
        name: &str,
        _workdir: &str,
        _shell: &str,
    ) -> Result<i32> {
        let state = self.state.lock().expect("lock");
        if !state.containers.contains_key(name) {
            return Err(anyhow!("fake runtime: no such container {:?}", name));
        }
        Ok(0)
    }

    fn run_ephemeral(&self, run: &EphemeralRun) -> Result<i32> {
        let mut state = self.state.lock().expect("lock");
        state.ephemeral_runs.push(run.command.to_vec());
        Ok(0)
    }
}

#![allow(dead_code)]

use cocoon::config::StatePaths;
use cocoon::runtime::{FakeRuntime, RuntimeProvider};
use cocoon::sandbox::{
    CreateSpec, MountMode, MountSpec, SandboxRecord, StateStores,
    create_sandbox,
};
use rstest::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// An isolated state directory, its stores, and a fake container runtime.
pub struct TestEnv {
    pub stores: StateStores,
    pub runtime: FakeRuntime,
    pub state_dir: TempDir,
}

#[fixture]
pub fn env() -> TestEnv {
    let state_dir = tempfile::tempdir().expect("Failed to create state dir");
    let stores = StateStores::open(&StatePaths::in_dir(state_dir.path()));
    TestEnv {
        stores,
        runtime: FakeRuntime::new(),
        state_dir,
    }
}

impl TestEnv {
    /// A host directory containing one file, for rwcopy directory mounts.
    pub fn host_tree(&self, name: &str) -> PathBuf {
        let dir = self.state_dir.path().join("host").join(name);
        fs::create_dir_all(&dir).expect("Failed to create host tree");
        fs::write(dir.join("a.txt"), "contents").expect("Failed to write");
        dir
    }

    /// A single host file, for rwcopy file mounts.
    pub fn host_file(&self, name: &str) -> PathBuf {
        let dir = self.state_dir.path().join("host");
        fs::create_dir_all(&dir).expect("Failed to create host dir");
        let file = dir.join(name);
        fs::write(&file, "{}").expect("Failed to write");
        file
    }

    pub fn create(&self, spec: CreateSpec) -> anyhow::Result<SandboxRecord> {
        create_sandbox(&self.stores, &self.runtime, spec)
    }
}

pub fn spec(name: &str) -> CreateSpec {
    CreateSpec {
        name: Some(name.to_string()),
        provider: RuntimeProvider::Docker,
        image: "x".to_string(),
        preset: None,
        mounts: vec![],
        volumes: vec![],
        env: vec![],
    }
}

pub fn rwcopy(source: &Path, target: &str) -> MountSpec {
    MountSpec {
        source: source.to_path_buf(),
        target: target.to_string(),
        mode: MountMode::Rwcopy,
        snapshot_from: None,
    }
}

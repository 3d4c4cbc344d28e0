mod fixtures;

use anyhow::Result;
use cocoon::sandbox::{
    BackingKind, backing_summaries, delete_tracked_backing,
};
use fixtures::*;
use rstest::*;
use std::path::Path;

#[rstest]
fn test_in_use_volume_refuses_delete_without_force(env: TestEnv) -> Result<()> {
    let tree = env.host_tree("tree");
    let mut create = spec("owner");
    create.mounts.push(rwcopy(&tree, "/work"));
    env.create(create)?;
    let volume = env.stores.volumes.list()?[0].name.clone();

    let err = delete_tracked_backing(&env.stores, &env.runtime, &volume, false)
        .expect_err("expected in-use refusal");
    assert!(err.to_string().contains("in use by sandboxes"));
    assert!(err.to_string().contains("owner"));
    assert!(env.runtime.volume_names().contains(&volume));

    delete_tracked_backing(&env.stores, &env.runtime, &volume, true)?;
    assert!(env.stores.volumes.list()?.is_empty());
    assert!(env.runtime.volume_names().is_empty());
    Ok(())
}

#[rstest]
fn test_unreferenced_volume_deletes_without_force(env: TestEnv) -> Result<()> {
    let tree = env.host_tree("tree");
    let mut create = spec("owner");
    create.mounts.push(rwcopy(&tree, "/work"));
    env.create(create)?;
    let volume = env.stores.volumes.list()?[0].name.clone();
    env.stores.volumes.remove_sandbox_ref(&volume, "owner")?;

    delete_tracked_backing(&env.stores, &env.runtime, &volume, false)?;
    assert!(env.stores.volumes.list()?.is_empty());
    Ok(())
}

#[rstest]
fn test_file_mount_delete_removes_copy_dir(env: TestEnv) -> Result<()> {
    let file = env.host_file("cfg.json");
    let mut create = spec("owner");
    create.mounts.push(rwcopy(&file, "/etc/cfg.json"));
    env.create(create)?;
    let mount = env.stores.file_mounts.list()?[0].clone();
    assert!(Path::new(&mount.copy_path).exists());

    delete_tracked_backing(&env.stores, &env.runtime, &mount.name, true)?;
    assert!(env.stores.file_mounts.list()?.is_empty());
    assert!(!Path::new(&mount.copy_path).exists());
    Ok(())
}

#[rstest]
fn test_unknown_name_is_an_error(env: TestEnv) {
    let err = delete_tracked_backing(&env.stores, &env.runtime, "ghost", true)
        .expect_err("expected lookup failure");
    assert!(err.to_string().contains("No volume found with name: ghost"));
}

#[rstest]
fn test_summaries_merge_both_kinds(env: TestEnv) -> Result<()> {
    let tree = env.host_tree("tree");
    let file = env.host_file("cfg.json");
    let mut create = spec("owner");
    create.mounts.push(rwcopy(&tree, "/work"));
    create.mounts.push(rwcopy(&file, "/etc/cfg.json"));
    env.create(create)?;

    let summaries = backing_summaries(&env.stores)?;
    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0].kind, BackingKind::Directory);
    assert_eq!(summaries[1].kind, BackingKind::File);
    assert!(summaries.iter().all(|s| s.sandbox_refs == vec!["owner"]));
    assert_eq!(
        summaries[0].source_path.as_deref(),
        Some(tree.to_str().expect("utf-8 path"))
    );
    Ok(())
}

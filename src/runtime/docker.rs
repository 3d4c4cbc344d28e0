use crate::runtime::{EphemeralRun, Runtime};
use crate::sandbox::binding::RuntimeBinding;
use anyhow::{Context, Result, anyhow};
use log::trace;
use std::path::Path;
use std::process::{Command, Stdio};

/// Image used for the helper container that copies a host tree into a
/// volume. Named volumes live in runtime-managed storage, so the only way to
/// fill one from host data is a throwaway container with both sides mounted.
const COPY_HELPER_IMAGE: &str = "alpine:3.20";

pub struct DockerRuntime;

/// Run a docker command, returning combined stdout+stderr. On failure the
/// runtime's own output becomes the error message.
fn docker(args: &[&str]) -> Result<String> {
    trace!("docker {}", args.join(" "));
    let output = Command::new("docker")
        .args(args)
        .output()
        .context("Failed to run docker")?;
    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    if !output.status.success() {
        return Err(anyhow!("{}", combined.trim()));
    }
    Ok(combined)
}

fn docker_status_ok(args: &[&str]) -> bool {
    Command::new("docker")
        .args(args)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

impl Runtime for DockerRuntime {
    fn create_container(
        &self,
        name: &str,
        image: &str,
        bindings: &[RuntimeBinding],
        env: &[String],
    ) -> Result<String> {
        let mut args: Vec<String> = vec![
            "run".to_string(),
            "-d".to_string(),
            "--name".to_string(),
            name.to_string(),
        ];
        for binding in bindings {
            if let Some(spec) = binding.volume_spec() {
                args.push("-v".to_string());
                args.push(spec);
            }
        }
        for entry in env {
            args.push("-e".to_string());
            args.push(entry.clone());
        }
        args.push(image.to_string());
        args.extend(
            ["tail", "-f", "/dev/null"].iter().map(|s| s.to_string()),
        );

        let arg_refs: Vec<&str> = args.iter().map(|s| s.as_str()).collect();
        let out = docker(&arg_refs)
            .map_err(|e| anyhow!("Failed to create sandbox container: {}", e))?;
        Ok(out.trim().to_string())
    }

    fn remove_container(&self, name: &str) -> Result<()> {
        docker(&["rm", "-f", name]).map_err(|e| {
            anyhow!("Failed to remove sandbox container: {}", e)
        })?;
        Ok(())
    }

    fn create_volume(&self, name: &str) -> Result<()> {
        docker(&["volume", "create", name]).map_err(|e| {
            anyhow!("Failed to create volume {:?}: {}", name, e)
        })?;
        Ok(())
    }

    fn remove_volume(&self, name: &str) -> Result<()> {
        docker(&["volume", "rm", name]).map_err(|e| {
            anyhow!("Failed to remove volume {:?}: {}", name, e)
        })?;
        Ok(())
    }

    fn volume_exists(&self, name: &str) -> bool {
        docker_status_ok(&["volume", "inspect", name])
    }

    fn populate_volume(&self, volume: &str, host_dir: &Path) -> Result<()> {
        let host_dir = std::path::absolute(host_dir).context(format!(
            "Failed to resolve host directory {}",
            host_dir.display()
        ))?;
        let src_spec = format!("{}:/src:ro", host_dir.display());
        let dst_spec = format!("{}:/dst", volume);
        docker(&[
            "run",
            "--rm",
            "-v",
            &src_spec,
            "-v",
            &dst_spec,
            COPY_HELPER_IMAGE,
            "sh",
            "-c",
            "cp -a /src/. /dst/",
        ])
        .map_err(|e| {
            anyhow!(
                "Failed to copy {} into volume {:?}: {}",
                host_dir.display(),
                volume,
                e
            )
        })?;
        Ok(())
    }

    fn image_exists(&self, image: &str) -> bool {
        docker_status_ok(&["image", "inspect", image])
    }

    fn build_image(&self, image: &str, dockerfile: &str) -> Result<()> {
        let context_dir = tempfile::Builder::new()
            .prefix("cocoon-build-")
            .tempdir()
            .context("Failed to create build context")?;
        let dockerfile_path = context_dir.path().join("Dockerfile");
        std::fs::write(&dockerfile_path, dockerfile)
            .context("Failed to write Dockerfile")?;

        // Build output streams straight through; image builds can run for
        // minutes and the user should see progress.
        let status = Command::new("docker")
            .arg("build")
            .arg("-t")
            .arg(image)
            .arg("-f")
            .arg(&dockerfile_path)
            .arg(context_dir.path())
            .status()
            .context("Failed to run docker build")?;
        if !status.success() {
            return Err(anyhow!("Failed to build image {:?}", image));
        }
        Ok(())
    }

    fn exec_interactive(
        &self,
        name: &str,
        workdir: &str,
        shell: &str,
    ) -> Result<i32> {
        let status = Command::new("docker")
            .args(["exec", "-it", "-w", workdir, name, shell])
            .status()
            .context("Failed to run docker exec")?;
        Ok(status.code().unwrap_or(1))
    }

    fn run_ephemeral(&self, run: &EphemeralRun) -> Result<i32> {
        let mut cmd = Command::new("docker");
        cmd.arg("run").arg("--rm");
        if run.interactive {
            cmd.arg("-it");
        }
        cmd.arg("-w").arg(run.workdir);
        for binding in run.bindings {
            if let Some(spec) = binding.volume_spec() {
                cmd.arg("-v").arg(spec);
            }
        }
        for entry in run.env {
            cmd.arg("-e").arg(entry);
        }
        cmd.arg(run.image);
        cmd.args(run.command);

        let status = cmd
            .status()
            .context("Failed to run ephemeral container")?;
        Ok(status.code().unwrap_or(1))
    }
}

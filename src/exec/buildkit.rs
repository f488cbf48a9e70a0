// src/exec/buildkit.rs

//! `buildctl` process runner.

use std::collections::VecDeque;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::BuilderSection;
use crate::errors::{HiveError, Result};
use crate::exec::backend::{BuildFuture, BuildOutput, BuildRequest, ImageBuilder};

/// Lines of builder stderr kept for error messages.
const STDERR_TAIL_LINES: usize = 20;

/// Builds images with BuildKit through the `buildctl` CLI.
///
/// Output is always exported as an OCI layout archive (`type=oci`).
#[derive(Debug, Clone)]
pub struct BuildctlBuilder {
    buildctl: PathBuf,
    addr: Option<String>,
}

impl BuildctlBuilder {
    pub fn new(settings: &BuilderSection) -> Self {
        Self {
            buildctl: settings.buildctl.clone(),
            addr: settings.addr.clone(),
        }
    }

    /// Arguments for `buildctl`, plus the environment variables that carry
    /// secret values so they never appear on the command line.
    fn command_args(&self, request: &BuildRequest) -> (Vec<OsString>, Vec<(String, String)>) {
        let mut args: Vec<OsString> = Vec::new();
        let mut envs = Vec::new();

        if let Some(addr) = &self.addr {
            args.push("--addr".into());
            args.push(addr.into());
        }

        args.push("build".into());
        args.push("--frontend".into());
        args.push(request.context.frontend.clone().into());

        let mut local_context = OsString::from("context=");
        local_context.push(&request.context.root_dir);
        args.push("--local".into());
        args.push(local_context);

        let dockerfile_dir = request
            .context
            .dockerfile
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| request.context.root_dir.clone());
        let mut local_dockerfile = OsString::from("dockerfile=");
        local_dockerfile.push(&dockerfile_dir);
        args.push("--local".into());
        args.push(local_dockerfile);

        if let Some(file_name) = request.context.dockerfile.file_name() {
            let mut filename = OsString::from("filename=");
            filename.push(file_name);
            args.push("--opt".into());
            args.push(filename);
        }

        for (key, value) in &request.build_args {
            args.push("--opt".into());
            args.push(format!("build-arg:{key}={value}").into());
        }

        for (idx, (id, value)) in request.secrets.iter().enumerate() {
            let env_name = format!("CONTAINERHIVE_SECRET_{idx}");
            args.push("--secret".into());
            args.push(format!("id={id},env={env_name}").into());
            envs.push((env_name, value.clone()));
        }

        let mut output = OsString::from("type=oci,dest=");
        output.push(&request.output);
        args.push("--output".into());
        args.push(output);

        (args, envs)
    }

    async fn run_build(&self, request: BuildRequest) -> Result<BuildOutput> {
        let unit = format!("{}:{}", request.image, request.tag);
        let (args, envs) = self.command_args(&request);

        info!(
            image = %request.image,
            tag = %request.tag,
            dockerfile = %request.context.dockerfile.display(),
            "starting buildctl"
        );

        let mut child = Command::new(&self.buildctl)
            .args(&args)
            .envs(envs)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| HiveError::BuildError {
                image: unit.clone(),
                reason: format!("failed to spawn '{}': {e}", self.buildctl.display()),
            })?;

        // Always drain stderr so the pipe never fills; keep a tail for errors.
        let stderr_task = child.stderr.take().map(|stderr| {
            let unit = unit.clone();
            tokio::spawn(async move {
                let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(unit = %unit, "buildctl: {}", line);
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
                tail.into_iter().collect::<Vec<_>>().join("\n")
            })
        });

        let status = child.wait().await.map_err(|e| HiveError::BuildError {
            image: unit.clone(),
            reason: format!("waiting for buildctl: {e}"),
        })?;

        let stderr_tail = match stderr_task {
            Some(handle) => handle.await.unwrap_or_default(),
            None => String::new(),
        };

        if !status.success() {
            let code = status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            return Err(HiveError::BuildError {
                image: unit,
                reason: format!("buildctl exited with {code}\n{stderr_tail}"),
            });
        }

        info!(image = %request.image, tag = %request.tag, "buildctl finished");
        Ok(BuildOutput {
            archive: request.output,
        })
    }
}

impl ImageBuilder for BuildctlBuilder {
    fn build(&self, request: BuildRequest) -> BuildFuture<'_> {
        Box::pin(self.run_build(request))
    }
}

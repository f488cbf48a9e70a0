// src/registry/embedded.rs

use std::net::TcpListener;
use std::path::Path;
use std::process::Stdio;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use oci_distribution::secrets::RegistryAuth;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::config::EmbeddedSettings;
use crate::errors::{HiveError, Result};
use crate::registry::oci_push::{PushTarget, push_oci_archive};
use crate::registry::{RegistryFuture, RegistryState, StagingRegistry};

const READINESS_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Local, ephemeral registry backed by a supervised `zot` process.
///
/// Storage lives in a temporary directory that is removed on stop. The child
/// is spawned with `kill_on_drop`, so dropping the handle never leaks it.
#[derive(Debug)]
pub struct EmbeddedRegistry {
    settings: EmbeddedSettings,
    running: tokio::sync::Mutex<Option<RunningRegistry>>,
    /// Mirrors `running` for the synchronous accessors.
    address: Mutex<Option<String>>,
}

#[derive(Debug)]
struct RunningRegistry {
    child: Child,
    _storage: TempDir,
}

impl EmbeddedRegistry {
    pub fn new(settings: EmbeddedSettings) -> Self {
        Self {
            settings,
            running: tokio::sync::Mutex::new(None),
            address: Mutex::new(None),
        }
    }

    fn current_address(&self) -> Option<String> {
        self.address
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn set_address(&self, address: Option<String>) {
        *self
            .address
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = address;
    }

    async fn start_inner(&self) -> Result<()> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            debug!("embedded registry already running");
            return Ok(());
        }

        let storage = tempfile::Builder::new()
            .prefix("containerhive-registry-")
            .tempdir()?;
        let port = free_port()?;
        let config_path = write_registry_config(storage.path(), port)?;

        info!(
            binary = %self.settings.binary.display(),
            port,
            "starting embedded registry"
        );

        let mut child = Command::new(&self.settings.binary)
            .arg("serve")
            .arg(&config_path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                HiveError::registry(
                    &format!(
                        "failed to spawn embedded registry '{}'",
                        self.settings.binary.display()
                    ),
                    e,
                )
            })?;

        if let Some(stdout) = child.stdout.take() {
            forward_output(stdout, "stdout");
        }
        if let Some(stderr) = child.stderr.take() {
            forward_output(stderr, "stderr");
        }

        wait_until_ready(&mut child, port, self.settings.startup_timeout()).await?;

        let address = format!("localhost:{port}");
        info!(address = %address, "embedded registry is accepting connections");
        self.set_address(Some(address));
        *running = Some(RunningRegistry {
            child,
            _storage: storage,
        });
        Ok(())
    }

    async fn stop_inner(&self) -> Result<()> {
        let Some(mut registry) = self.running.lock().await.take() else {
            return Ok(());
        };
        self.set_address(None);

        if let Err(e) = registry.child.kill().await {
            warn!(error = %e, "failed to kill embedded registry process");
            return Err(HiveError::registry("failed to stop embedded registry", e));
        }

        info!("embedded registry stopped");
        Ok(())
    }
}

impl StagingRegistry for EmbeddedRegistry {
    fn start(&self) -> RegistryFuture<'_, ()> {
        Box::pin(self.start_inner())
    }

    fn stop(&self) -> RegistryFuture<'_, ()> {
        Box::pin(self.stop_inner())
    }

    fn address(&self) -> String {
        self.current_address().unwrap_or_default()
    }

    fn is_local(&self) -> bool {
        true
    }

    fn state(&self) -> RegistryState {
        if self.current_address().is_some() {
            RegistryState::Running
        } else {
            RegistryState::Stopped
        }
    }

    fn push<'a>(
        &'a self,
        image_name: &'a str,
        tag: &'a str,
        oci_archive: &'a Path,
    ) -> RegistryFuture<'a, ()> {
        Box::pin(async move {
            let address = self.current_address().ok_or_else(|| {
                HiveError::RegistryError("embedded registry is not running".to_string())
            })?;
            let target = PushTarget {
                address,
                insecure: true,
                auth: RegistryAuth::Anonymous,
            };
            push_oci_archive(&target, image_name, tag, oci_archive).await
        })
    }
}

/// Ask the OS for a free loopback port.
fn free_port() -> Result<u16> {
    let listener = TcpListener::bind(("127.0.0.1", 0))?;
    Ok(listener.local_addr()?.port())
}

fn write_registry_config(storage: &Path, port: u16) -> Result<std::path::PathBuf> {
    let config = serde_json::json!({
        "distSpecVersion": "1.1.0",
        "storage": { "rootDirectory": storage.join("data") },
        "http": { "address": "127.0.0.1", "port": port.to_string() },
        "log": { "level": "error" },
    });
    let path = storage.join("config.json");
    std::fs::write(&path, serde_json::to_vec_pretty(&config)?)?;
    Ok(path)
}

async fn wait_until_ready(child: &mut Child, port: u16, timeout: Duration) -> Result<()> {
    let started = Instant::now();

    loop {
        if let Some(status) = child.try_wait()? {
            return Err(HiveError::RegistryError(format!(
                "embedded registry exited during startup ({status})"
            )));
        }

        if TcpStream::connect(("127.0.0.1", port)).await.is_ok() {
            return Ok(());
        }

        if started.elapsed() >= timeout {
            if let Err(e) = child.kill().await {
                warn!(error = %e, "failed to kill unresponsive embedded registry");
            }
            return Err(HiveError::RegistryError(format!(
                "embedded registry did not accept connections within {}s",
                timeout.as_secs()
            )));
        }

        tokio::time::sleep(READINESS_POLL_INTERVAL).await;
    }
}

fn forward_output<R>(stream: R, channel: &'static str)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(channel, "registry: {}", line);
        }
    });
}

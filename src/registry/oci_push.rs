// src/registry/oci_push.rs

//! Upload of an OCI image layout archive to a registry.
//!
//! BuildKit's `type=oci` exporter writes a tar holding an OCI image layout:
//! `index.json` at the top, content-addressed files under
//! `blobs/<algorithm>/<hex>`. The index references one manifest, or one
//! nested index which in turn references the manifest.

use std::fs::File;
use std::path::{Path, PathBuf};

use oci_distribution::client::{ClientConfig, ClientProtocol, Config, ImageLayer};
use oci_distribution::manifest::{OciImageIndex, OciImageManifest};
use oci_distribution::secrets::RegistryAuth;
use oci_distribution::{Client, Reference};
use tracing::debug;

use crate::errors::{HiveError, Result};

const OCI_INDEX_MEDIA_TYPE: &str = "application/vnd.oci.image.index.v1+json";
const DOCKER_MANIFEST_LIST_MEDIA_TYPE: &str =
    "application/vnd.docker.distribution.manifest.list.v2+json";

/// Where and how to push.
#[derive(Clone)]
pub struct PushTarget {
    /// `host[:port][/path]`.
    pub address: String,
    /// Plain HTTP instead of HTTPS.
    pub insecure: bool,
    pub auth: RegistryAuth,
}

impl std::fmt::Debug for PushTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let auth = match &self.auth {
            RegistryAuth::Anonymous => "anonymous",
            _ => "credentials",
        };
        f.debug_struct("PushTarget")
            .field("address", &self.address)
            .field("insecure", &self.insecure)
            .field("auth", &auth)
            .finish()
    }
}

/// Image content read from an unpacked layout, ready for upload.
struct LayoutImage {
    manifest: OciImageManifest,
    config: Config,
    layers: Vec<ImageLayer>,
}

/// Push the OCI layout archive at `archive` as `<address>/<image_name>:<tag>`.
pub async fn push_oci_archive(
    target: &PushTarget,
    image_name: &str,
    tag: &str,
    archive: &Path,
) -> Result<()> {
    let coordinate = format!("{}/{}:{}", target.address.trim_end_matches('/'), image_name, tag);
    let reference: Reference = coordinate
        .parse()
        .map_err(|e| HiveError::registry(&format!("invalid image reference '{coordinate}'"), e))?;

    let archive = archive.to_path_buf();
    let image = tokio::task::spawn_blocking(move || load_archive(&archive))
        .await
        .map_err(|e| HiveError::registry("OCI layout reader task failed", e))??;

    debug!(
        reference = %coordinate,
        layers = image.layers.len(),
        "uploading image to registry"
    );

    let protocol = if target.insecure {
        ClientProtocol::Http
    } else {
        ClientProtocol::Https
    };
    let client = Client::new(ClientConfig {
        protocol,
        ..Default::default()
    });

    client
        .push(
            &reference,
            &image.layers,
            image.config,
            &target.auth,
            Some(image.manifest),
        )
        .await
        .map_err(|e| HiveError::registry(&format!("failed to push {coordinate}"), e))?;

    Ok(())
}

fn load_archive(archive: &Path) -> Result<LayoutImage> {
    let layout = tempfile::Builder::new()
        .prefix("containerhive-oci-")
        .tempdir()?;

    let file = File::open(archive).map_err(|e| {
        HiveError::registry(&format!("failed to open OCI archive {}", archive.display()), e)
    })?;
    tar::Archive::new(file)
        .unpack(layout.path())
        .map_err(|e| HiveError::registry("failed to extract OCI archive", e))?;

    load_layout(layout.path())
}

/// Read the image referenced by `index.json` of an unpacked layout.
fn load_layout(dir: &Path) -> Result<LayoutImage> {
    let index: OciImageIndex = serde_json::from_slice(&read_layout_file(&dir.join("index.json"))?)?;
    let entry = index
        .manifests
        .first()
        .ok_or_else(|| HiveError::RegistryError("no manifests in OCI layout".to_string()))?;

    let mut manifest_bytes = read_blob(dir, &entry.digest)?;
    if entry.media_type == OCI_INDEX_MEDIA_TYPE || entry.media_type == DOCKER_MANIFEST_LIST_MEDIA_TYPE {
        let nested: OciImageIndex = serde_json::from_slice(&manifest_bytes)?;
        let inner = nested.manifests.first().ok_or_else(|| {
            HiveError::RegistryError("no manifests in nested OCI image index".to_string())
        })?;
        manifest_bytes = read_blob(dir, &inner.digest)?;
    }

    let manifest: OciImageManifest = serde_json::from_slice(&manifest_bytes)?;

    let config = Config::new(
        read_blob(dir, &manifest.config.digest)?,
        manifest.config.media_type.clone(),
        None,
    );

    let layers = manifest
        .layers
        .iter()
        .map(|layer| Ok(ImageLayer::new(read_blob(dir, &layer.digest)?, layer.media_type.clone(), None)))
        .collect::<Result<Vec<_>>>()?;

    Ok(LayoutImage {
        manifest,
        config,
        layers,
    })
}

fn blob_path(dir: &Path, digest: &str) -> Result<PathBuf> {
    let (algorithm, hex) = digest
        .split_once(':')
        .ok_or_else(|| HiveError::RegistryError(format!("malformed digest '{digest}'")))?;
    Ok(dir.join("blobs").join(algorithm).join(hex))
}

fn read_blob(dir: &Path, digest: &str) -> Result<Vec<u8>> {
    read_layout_file(&blob_path(dir, digest)?)
}

fn read_layout_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path)
        .map_err(|e| HiveError::registry(&format!("failed to read {} from OCI layout", path.display()), e))
}

// src/engine/jobs.rs

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use tracing::{debug, warn};

use crate::engine::ImageId;
use crate::errors::Result;
use crate::model::Project;
use crate::scan::RenderedProject;

/// Build units per image id.
pub type BuildJobs = HashMap<ImageId, Vec<TagJob>>;

/// One tag (or variant) directory to build and push.
#[derive(Clone, PartialEq, Eq)]
pub struct TagJob {
    pub tag: String,
    /// Tag directory; used as build context and output location.
    pub dir: PathBuf,
    /// Rendered Dockerfile, still containing project-local markers.
    pub dockerfile: PathBuf,
    pub build_args: BTreeMap<String, String>,
    pub secrets: BTreeMap<String, String>,
}

impl std::fmt::Debug for TagJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TagJob")
            .field("tag", &self.tag)
            .field("dir", &self.dir)
            .field("dockerfile", &self.dockerfile)
            .field("build_args", &self.build_args)
            .field("secrets", &self.secrets.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Combine the rendered layout with image definitions.
///
/// Each tag directory takes its build args and secrets from the definition
/// that declares it; see [`Project::definition_for_tag`]. Tags without an
/// owning definition are built without either. Secrets are resolved here, so
/// a missing environment variable fails the run before anything is built.
pub fn plan_jobs(rendered: &RenderedProject, project: Option<&Project>) -> Result<BuildJobs> {
    let mut jobs = BuildJobs::with_capacity(rendered.images.len());
    // Resolved secrets per definition identifier.
    let mut secrets_by_definition: HashMap<&str, BTreeMap<String, String>> = HashMap::new();

    for (name, image) in &rendered.images {
        let mut tag_jobs = Vec::with_capacity(image.tags.len());

        for tag in &image.tags {
            let owner = project.and_then(|p| p.definition_for_tag(name, &tag.tag));

            let (build_args, secrets) = match owner {
                Some(owner) => {
                    let secrets = match secrets_by_definition.get(owner.identifier.as_str()) {
                        Some(secrets) => secrets.clone(),
                        None => {
                            let resolved = owner.definition.resolve_secrets()?;
                            secrets_by_definition.insert(&owner.identifier, resolved.clone());
                            resolved
                        }
                    };
                    debug!(
                        image = %name,
                        tag = %tag.tag,
                        definition = %owner.identifier,
                        "tag owned by definition"
                    );
                    (owner.definition.build_args_for(&tag.tag), secrets)
                }
                None => {
                    if project.is_some_and(|p| p.images_by_name.contains_key(name)) {
                        warn!(
                            image = %name,
                            tag = %tag.tag,
                            "no definition declares this tag; building without build args or secrets"
                        );
                    }
                    (BTreeMap::new(), BTreeMap::new())
                }
            };

            tag_jobs.push(TagJob {
                tag: tag.tag.clone(),
                dir: tag.dir.clone(),
                dockerfile: tag.dockerfile.clone(),
                build_args,
                secrets,
            });
        }

        debug!(image = %name, tags = tag_jobs.len(), "planned build units");
        jobs.insert(name.clone(), tag_jobs);
    }

    Ok(jobs)
}

use std::path::{Path, PathBuf};

use containerhive::dag::DependencyGraph;
use containerhive::fs::mock::MockFileSystem;
use tempfile::TempDir;

/// Build a graph from `(dependent, dependency)` pairs after registering `images`.
pub fn graph(images: &[&str], edges: &[(&str, &str)]) -> DependencyGraph {
    let mut graph = DependencyGraph::new();
    for image in images {
        graph.add_image(image);
    }
    for (dependent, dependency) in edges {
        graph.add_dependency(dependent, dependency);
    }
    graph
}

/// Rendered dist tree inside a [`MockFileSystem`].
pub struct MockDistBuilder {
    fs: MockFileSystem,
    root: PathBuf,
}

impl MockDistBuilder {
    pub fn new(root: &str) -> Self {
        let fs = MockFileSystem::new();
        fs.add_dir(root);
        Self {
            fs,
            root: PathBuf::from(root),
        }
    }

    /// Add `<root>/<image>/<tag>/Dockerfile`.
    pub fn dockerfile(self, image: &str, tag: &str, contents: &str) -> Self {
        self.file(image, tag, "Dockerfile", contents)
    }

    pub fn file(self, image: &str, tag: &str, name: &str, contents: &str) -> Self {
        let path = self.root.join(image).join(tag).join(name);
        self.fs.add_file(path, contents.as_bytes());
        self
    }

    /// Add an empty tag directory.
    pub fn empty_tag(self, image: &str, tag: &str) -> Self {
        self.fs.add_dir(self.root.join(image).join(tag));
        self
    }

    pub fn build(self) -> (MockFileSystem, PathBuf) {
        (self.fs, self.root)
    }
}

/// Project tree on disk: `hive.toml`, `images/**/image.yml` and `dist/`.
pub struct ProjectTreeBuilder {
    dir: TempDir,
}

impl ProjectTreeBuilder {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn hive_toml(self, contents: &str) -> Self {
        self.write("hive.toml", contents)
    }

    /// Add `images/<rel_dir>/image.yml`.
    pub fn image(self, rel_dir: &str, definition: &str) -> Self {
        self.write(&format!("images/{rel_dir}/image.yml"), definition)
    }

    /// Add a rendered Dockerfile under `dist/<image>/<tag>/`.
    pub fn rendered(self, image: &str, tag: &str, dockerfile: &str) -> Self {
        self.write(&format!("dist/{image}/{tag}/Dockerfile"), dockerfile)
    }

    pub fn write(self, rel: &str, contents: &str) -> Self {
        let path = self.dir.path().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
        self
    }

    pub fn build(self) -> TempDir {
        self.dir
    }
}

impl Default for ProjectTreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub fn path_of(dir: &TempDir, rel: &str) -> PathBuf {
    Path::new(dir.path()).join(rel)
}

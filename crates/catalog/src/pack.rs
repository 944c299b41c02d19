//! Wraps a descriptor pack directory (`<root>/shader.toml` plus GLSL files)
//! so the registry can turn it into a `ShaderDescriptor` with filesystem
//! validation kept in one place.
//!
//! Types:
//!
//! - `PackError` classifies manifest parsing, validation, and I/O failures.
//! - `LocalPack` stores the resolved root, the pack id (directory name), and
//!   the parsed manifest.
//!
//! Functions:
//!
//! - `LocalPack::load` reads and validates `shader.toml`.
//! - `LocalPack::into_descriptor` reads the GLSL sources, falling back to the
//!   shared surface vertex shader, and builds the descriptor.
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::builtin::SURFACE_VERTEX;
use crate::descriptor::{DescriptorError, ShaderDescriptor};
use crate::manifest::DescriptorManifest;

#[derive(Debug, Error)]
pub enum PackError {
    #[error("manifest not found at {0}")]
    ManifestMissing(PathBuf),

    #[error("failed to parse manifest: {0}")]
    ManifestParse(#[from] toml::de::Error),

    #[error("manifest validation failed: {0:?}")]
    ManifestValidation(Vec<String>),

    #[error("shader source missing: {0}")]
    SourceMissing(PathBuf),

    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct LocalPack {
    root: PathBuf,
    id: String,
    manifest: DescriptorManifest,
}

impl LocalPack {
    pub fn load(root: impl AsRef<Path>) -> Result<Self, PackError> {
        let root = root.as_ref().to_path_buf();
        let manifest_path = root.join("shader.toml");
        if !manifest_path.exists() {
            return Err(PackError::ManifestMissing(manifest_path));
        }

        let manifest_raw = fs::read_to_string(&manifest_path)?;
        let manifest = DescriptorManifest::from_toml_str(&manifest_raw)?;
        let issues = manifest.validate();
        if !issues.is_empty() {
            return Err(PackError::ManifestValidation(issues));
        }

        let id = root
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Self { root, id, manifest })
    }

    pub fn root(&self) -> &Path {
        self.root.as_path()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn manifest(&self) -> &DescriptorManifest {
        &self.manifest
    }

    pub fn into_descriptor(self) -> Result<ShaderDescriptor, PackError> {
        let fragment = read_source(&self.root.join(&self.manifest.fragment))?;
        let vertex = match &self.manifest.vertex {
            Some(path) => read_source(&self.root.join(path))?,
            None => SURFACE_VERTEX.to_string(),
        };
        Ok(self.manifest.into_descriptor(&self.id, vertex, fragment)?)
    }
}

fn read_source(path: &Path) -> Result<String, PackError> {
    if !path.exists() {
        return Err(PackError::SourceMissing(path.to_path_buf()));
    }
    Ok(fs::read_to_string(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ParameterValue;

    const MANIFEST: &str = r#"
name = "Demo"
description = "Pack on disk"

[[params]]
key = "uSpeed"
kind = "scalar"
default = 2
min = 0
max = 4
"#;

    fn write_pack(dir: &Path, manifest: &str, extra_files: &[(&str, &str)]) {
        fs::write(dir.join("shader.toml"), manifest).expect("write manifest");
        for (path, contents) in extra_files {
            fs::write(dir.join(path), contents).expect("write file");
        }
    }

    #[test]
    fn loads_valid_pack() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().join("demo");
        fs::create_dir_all(&root).unwrap();
        write_pack(
            &root,
            MANIFEST,
            &[("fragment.glsl", "uniform float uSpeed;\nvoid main() {}\n")],
        );

        let pack = LocalPack::load(&root).expect("load pack");
        assert_eq!(pack.id(), "demo");
        let descriptor = pack.into_descriptor().expect("descriptor");
        assert_eq!(descriptor.name(), "Demo");
        assert_eq!(descriptor.vertex_source(), SURFACE_VERTEX);
        assert_eq!(
            descriptor.default_values()["uSpeed"],
            ParameterValue::Scalar(2.0)
        );
    }

    #[test]
    fn detects_missing_fragment_source() {
        let temp = tempfile::tempdir().unwrap();
        write_pack(temp.path(), MANIFEST, &[]);

        let pack = LocalPack::load(temp.path()).expect("load pack");
        let err = pack.into_descriptor().unwrap_err();
        assert!(matches!(err, PackError::SourceMissing(_)));
    }

    #[test]
    fn reports_missing_manifest() {
        let temp = tempfile::tempdir().unwrap();
        let err = LocalPack::load(temp.path()).unwrap_err();
        assert!(matches!(err, PackError::ManifestMissing(_)));
    }
}

//! Resolves shader ids into shared descriptors, hiding the difference between
//! embedded descriptors and packs found on disk from the rest of the
//! workspace.
//!
//! Types:
//!
//! - `CatalogEntry` is the listing row (id, display name, description) used
//!   by shader selectors and `shaderlab list`.
//! - `Catalog` owns every loaded descriptor behind `Arc`, in insertion order.
//!
//! Functions:
//!
//! - `Catalog::with_builtins` seeds the catalog from the embedded table.
//! - `Catalog::load_dir` scans `<root>/<id>/shader.toml` packs; broken packs
//!   are logged and skipped so one bad directory never hides the rest.
//! - `Catalog::get` is the only lookup the engine performs.
use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::builtin::builtin_descriptors;
use crate::descriptor::ShaderDescriptor;
use crate::pack::LocalPack;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub id: String,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Default, Clone)]
pub struct Catalog {
    descriptors: Vec<Arc<ShaderDescriptor>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut catalog = Self::new();
        for descriptor in builtin_descriptors() {
            catalog.insert(descriptor);
        }
        catalog
    }

    /// Adds or replaces the descriptor with the same id, keeping its position.
    pub fn insert(&mut self, descriptor: ShaderDescriptor) {
        let descriptor = Arc::new(descriptor);
        match self
            .descriptors
            .iter_mut()
            .find(|existing| existing.id() == descriptor.id())
        {
            Some(slot) => {
                debug!(shader = %descriptor.id(), "overriding descriptor");
                *slot = descriptor;
            }
            None => self.descriptors.push(descriptor),
        }
    }

    /// Loads every pack directory below `root`. Returns how many were added.
    pub fn load_dir(&mut self, root: &Path) -> Result<usize> {
        if !root.exists() {
            debug!(root = %root.display(), "shader directory absent; skipping");
            return Ok(0);
        }

        let mut dirs: Vec<_> = fs::read_dir(root)
            .with_context(|| format!("failed to read shader directory {}", root.display()))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .collect();
        dirs.sort();

        let mut loaded = 0;
        for dir in dirs {
            if !dir.join("shader.toml").exists() {
                continue;
            }
            match LocalPack::load(&dir).and_then(LocalPack::into_descriptor) {
                Ok(descriptor) => {
                    debug!(shader = %descriptor.id(), path = %dir.display(), "loaded shader pack");
                    self.insert(descriptor);
                    loaded += 1;
                }
                Err(err) => {
                    warn!(path = %dir.display(), error = %err, "failed to load shader pack");
                }
            }
        }
        Ok(loaded)
    }

    pub fn get(&self, id: &str) -> Option<Arc<ShaderDescriptor>> {
        self.descriptors
            .iter()
            .find(|descriptor| descriptor.id() == id)
            .cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.descriptors.iter().any(|descriptor| descriptor.id() == id)
    }

    pub fn first_id(&self) -> Option<&str> {
        self.descriptors.first().map(|descriptor| descriptor.id())
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.descriptors.iter().map(|descriptor| descriptor.id())
    }

    pub fn entries(&self) -> Vec<CatalogEntry> {
        self.descriptors
            .iter()
            .map(|descriptor| CatalogEntry {
                id: descriptor.id().to_string(),
                name: descriptor.name().to_string(),
                description: descriptor.description().to_string(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_pack(root: &Path, id: &str, manifest: &str, fragment: Option<&str>) {
        let dir = root.join(id);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("shader.toml"), manifest).unwrap();
        if let Some(fragment) = fragment {
            fs::write(dir.join("fragment.glsl"), fragment).unwrap();
        }
    }

    #[test]
    fn builtins_are_listed_in_order() {
        let catalog = Catalog::with_builtins();
        let ids: Vec<_> = catalog.ids().collect();
        assert_eq!(ids, vec!["gradient", "ripple", "plasma", "texture-fx", "julia"]);
        assert_eq!(catalog.first_id(), Some("gradient"));
        assert_eq!(catalog.entries()[0].name, "Gradient");
    }

    #[test]
    fn disk_packs_extend_and_override() {
        let temp = tempfile::tempdir().unwrap();
        write_pack(
            temp.path(),
            "gradient",
            "name = \"My Gradient\"\n",
            Some("void main() {}\n"),
        );
        write_pack(temp.path(), "extra", "name = \"Extra\"\n", Some("void main() {}\n"));
        write_pack(temp.path(), "broken", "name = \"Broken\"\n", None);

        let mut catalog = Catalog::with_builtins();
        let before = catalog.len();
        let loaded = catalog.load_dir(temp.path()).expect("load dir");
        assert_eq!(loaded, 2);
        assert_eq!(catalog.len(), before + 1);
        assert_eq!(catalog.get("gradient").unwrap().name(), "My Gradient");
        assert!(catalog.contains("extra"));
        assert!(!catalog.contains("broken"));
    }

    #[test]
    fn missing_directory_is_empty() {
        let mut catalog = Catalog::new();
        let loaded = catalog
            .load_dir(Path::new("/definitely/not/here"))
            .expect("absent dir is fine");
        assert_eq!(loaded, 0);
        assert!(catalog.is_empty());
    }
}

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use directories_next::{ProjectDirs, UserDirs};

pub const ENV_CONFIG_DIR: &str = "SHADERLAB_CONFIG_DIR";
pub const ENV_DATA_DIR: &str = "SHADERLAB_DATA_DIR";
pub const ENV_CACHE_DIR: &str = "SHADERLAB_CACHE_DIR";

const QUALIFIER: &str = "org";
const ORGANISATION: &str = "Shaderlab";
const APPLICATION: &str = "Shaderlab";

#[derive(Debug, Clone)]
pub struct AppPaths {
    config_dir: PathBuf,
    data_dir: PathBuf,
    cache_dir: PathBuf,
    download_dir: Option<PathBuf>,
}

impl AppPaths {
    pub fn discover() -> Result<Self> {
        let project_dirs = ProjectDirs::from(QUALIFIER, ORGANISATION, APPLICATION)
            .ok_or_else(|| anyhow!("failed to determine user directories"))?;

        let config_dir = resolve_dir(ENV_CONFIG_DIR, project_dirs.config_dir())
            .context("failed to resolve shaderlab config directory")?;
        let data_dir = resolve_dir(ENV_DATA_DIR, project_dirs.data_dir())
            .context("failed to resolve shaderlab data directory")?;
        let cache_dir = resolve_dir(ENV_CACHE_DIR, project_dirs.cache_dir())
            .context("failed to resolve shaderlab cache directory")?;
        let download_dir = UserDirs::new()
            .and_then(|dirs| dirs.download_dir().map(Path::to_path_buf));

        Ok(Self {
            config_dir,
            data_dir,
            cache_dir,
            download_dir,
        })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    /// Directories scanned for descriptor packs, later entries overriding
    /// earlier ones.
    pub fn shader_roots(&self) -> Vec<PathBuf> {
        vec![self.data_dir.join("shaders"), self.config_dir.join("shaders")]
    }

    pub fn preset_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Where downloads land when the config does not name a directory: the
    /// user's download folder when the platform has one, else
    /// `<data>/exports`.
    pub fn default_export_dir(&self) -> PathBuf {
        if env_override(ENV_DATA_DIR).is_none() {
            if let Some(dir) = &self.download_dir {
                return dir.clone();
            }
        }
        self.data_dir.join("exports")
    }
}

#[cfg(test)]
impl AppPaths {
    pub fn from_raw(config_dir: PathBuf, data_dir: PathBuf, cache_dir: PathBuf) -> Self {
        Self {
            config_dir,
            data_dir,
            cache_dir,
            download_dir: None,
        }
    }
}

fn resolve_dir(env_var: &str, default: &Path) -> Result<PathBuf> {
    if let Some(value) = env_override(env_var) {
        return Ok(value);
    }
    Ok(default.to_path_buf())
}

fn env_override(name: &str) -> Option<PathBuf> {
    match env::var_os(name) {
        Some(value) if !value.as_os_str().is_empty() => Some(PathBuf::from(value)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;
    use std::sync::{Mutex, OnceLock};
    use tempfile::TempDir;

    fn env_lock() -> &'static Mutex<()> {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    struct EnvGuard {
        key: &'static str,
        previous: Option<OsString>,
    }

    impl EnvGuard {
        fn set(key: &'static str, value: &Path) -> Self {
            let previous = env::var_os(key);
            env::set_var(key, value);
            Self { key, previous }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            if let Some(value) = self.previous.take() {
                env::set_var(self.key, value);
            } else {
                env::remove_var(self.key);
            }
        }
    }

    #[test]
    fn env_overrides_take_precedence() {
        let _guard = env_lock().lock().unwrap();
        let root = TempDir::new().unwrap();
        let config_dir = root.path().join("config");
        let data_dir = root.path().join("data");
        let cache_dir = root.path().join("cache");

        let _config_guard = EnvGuard::set(ENV_CONFIG_DIR, &config_dir);
        let _data_guard = EnvGuard::set(ENV_DATA_DIR, &data_dir);
        let _cache_guard = EnvGuard::set(ENV_CACHE_DIR, &cache_dir);

        let paths = AppPaths::discover().unwrap();

        assert_eq!(paths.config_dir(), config_dir.as_path());
        assert_eq!(paths.data_dir(), data_dir.as_path());
        assert_eq!(paths.cache_dir(), cache_dir.as_path());
        assert_eq!(paths.config_file(), config_dir.join("config.toml"));
        assert_eq!(paths.default_export_dir(), data_dir.join("exports"));
    }

    #[test]
    fn config_packs_override_data_packs() {
        let paths = AppPaths::from_raw("/c".into(), "/d".into(), "/k".into());
        assert_eq!(
            paths.shader_roots(),
            vec![PathBuf::from("/d/shaders"), PathBuf::from("/c/shaders")]
        );
        assert_eq!(paths.default_export_dir(), PathBuf::from("/d/exports"));
    }
}

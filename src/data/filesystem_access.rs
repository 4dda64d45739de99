//! Well-known directories where packaged model assets may live.

use std::path::{Path, PathBuf};

const APP_DIR: &str = "ar_depth_detect";

#[derive(Debug)]
pub enum FsAccess {
    Home,
    Cache,
    Config,
}

impl FsAccess {
    /// Base path for the directory type with the app subdirectory appended.
    fn get_path(&self) -> anyhow::Result<PathBuf> {
        let base_path = match self {
            FsAccess::Home => dirs::home_dir(),
            FsAccess::Cache => dirs::cache_dir(),
            FsAccess::Config => dirs::config_dir(),
        };

        let mut path = base_path.ok_or_else(|| {
            anyhow::anyhow!("Unsupported operating system. Supported OS: Linux, MacOS, Windows.")
        })?;

        match self {
            FsAccess::Home => path.push(format!(".{APP_DIR}")),
            _ => path.push(APP_DIR),
        }
        Ok(path)
    }

    /// Constructs a path below the app directory with the provided subdirectories, without creating it.
    ///
    /// Examples:
    /// `~/.cache/ar_depth_detect/models`, `~/.ar_depth_detect/models`.
    pub fn path_with_subs(&self, subs: &[&str]) -> anyhow::Result<PathBuf> {
        let mut d = self.get_path()?;
        for sub in subs {
            d.push(sub);
        }
        Ok(d)
    }

    /// Locates a model asset.
    ///
    /// Absolute paths and paths relative to the working directory win; bare names are then
    /// looked up in the `models` directory under the cache, config and home app directories.
    pub fn resolve_model(model: &str) -> Option<PathBuf> {
        let direct = Path::new(model);
        if direct.is_file() {
            return Some(direct.to_path_buf());
        }
        if direct.is_absolute() {
            return None;
        }

        [FsAccess::Cache, FsAccess::Config, FsAccess::Home]
            .iter()
            .filter_map(|dir| dir.path_with_subs(&["models"]).ok())
            .map(|dir| dir.join(model))
            .find(|candidate| candidate.is_file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_model_is_not_resolved() {
        assert!(FsAccess::resolve_model("definitely-not-a-model-7f3a.onnx").is_none());
        assert!(FsAccess::resolve_model("/nonexistent/dir/model.onnx").is_none());
    }

    #[test]
    fn existing_file_resolves_to_itself() {
        let manifest = concat!(env!("CARGO_MANIFEST_DIR"), "/Cargo.toml");
        assert_eq!(FsAccess::resolve_model(manifest), Some(PathBuf::from(manifest)));
    }
}

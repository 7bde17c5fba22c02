use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::ffi::OsString;
use std::path::PathBuf;
use tracing::debug;

/// Overrides the data directory, e.g. the app-data directory a mobile shell hands us.
pub const DATA_DIR_ENV: &str = "METAMORPH_DATA_DIR";
const DB_FILE: &str = "metamorph.db";

pub struct Config {
    pub db_path: PathBuf,
    pub data_dir: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        let data_dir = resolve_data_dir(std::env::var_os(DATA_DIR_ENV))?;
        Self::from_data_dir(data_dir)
    }

    pub fn from_data_dir(data_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        let db_path = data_dir.join(DB_FILE);
        debug!(db = %db_path.display(), "configuration loaded");

        Ok(Config { db_path, data_dir })
    }

    /// Load the API key from disk, or generate a new one.
    pub fn load_or_create_api_key(&self) -> Result<String> {
        use rand::Rng;
        use std::fmt::Write;

        let path = self.data_dir.join("api_key");

        if path.exists() {
            let key = std::fs::read_to_string(&path).context("Failed to read API key file")?;
            let key = key.trim().to_string();
            if !key.is_empty() {
                return Ok(key);
            }
        }

        let bytes: [u8; 32] = rand::rng().random();
        let key = bytes
            .iter()
            .fold(String::with_capacity(64), |mut acc: String, b| {
                let _ = write!(acc, "{b:02x}");
                acc
            });
        std::fs::write(&path, &key).context("Failed to write API key file")?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
                .context("Failed to set API key file permissions")?;
        }
        eprintln!("Generated new API key: {key}");
        eprintln!("Include in requests: Authorization: Bearer {key}");
        Ok(key)
    }
}

fn resolve_data_dir(env_override: Option<OsString>) -> Result<PathBuf> {
    if let Some(dir) = env_override.filter(|d| !d.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    let proj_dirs =
        ProjectDirs::from("", "", "metamorph").context("Could not determine home directory")?;
    Ok(proj_dirs.data_dir().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_override_wins() {
        let dir = resolve_data_dir(Some(OsString::from("/tmp/metamorph-data"))).unwrap();
        assert_eq!(dir, PathBuf::from("/tmp/metamorph-data"));
    }

    #[test]
    fn test_empty_override_ignored() {
        let dir = resolve_data_dir(Some(OsString::new()));
        if let Ok(dir) = dir {
            assert_ne!(dir, PathBuf::new());
        }
    }

    #[test]
    fn test_from_data_dir_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let data_dir = tmp.path().join("nested").join("data");
        let config = Config::from_data_dir(data_dir.clone()).unwrap();
        assert!(data_dir.is_dir());
        assert_eq!(config.db_path, data_dir.join("metamorph.db"));
    }

    #[test]
    fn test_api_key_is_stable() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::from_data_dir(tmp.path().to_path_buf()).unwrap();
        let first = config.load_or_create_api_key().unwrap();
        assert_eq!(first.len(), 64);
        let second = config.load_or_create_api_key().unwrap();
        assert_eq!(first, second);
    }
}

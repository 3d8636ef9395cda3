use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::events::DEFAULT_CHANNEL;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ClinicConfig {
    pub database: Option<String>,
    pub channel: Option<String>,
}

impl ClinicConfig {
    /// Database path, falling back to the default under `base`
    pub fn database_path(&self, base: &Path) -> PathBuf {
        self.database
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| default_database_path_in(base))
    }

    pub fn channel_name(&self) -> &str {
        self.channel.as_deref().unwrap_or(DEFAULT_CHANNEL)
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("clinic.toml")
}

pub fn default_database_path_in(base: &Path) -> PathBuf {
    base.join(".clinic").join("patient_registration.db")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<ClinicConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: ClinicConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &ClinicConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

pub fn ensure_db_dir(db_path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_and_overwrite_guard() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clinic.toml");
        let config = ClinicConfig {
            database: Some("data/clinic.db".into()),
            channel: None,
        };

        write_config(&path, &config, false).unwrap();
        assert!(write_config(&path, &config, false).is_err());
        write_config(&path, &config, true).unwrap();

        let loaded = load_config(Some(&path)).unwrap().unwrap();
        assert_eq!(loaded.database_path(dir.path()), PathBuf::from("data/clinic.db"));
        assert_eq!(loaded.channel_name(), DEFAULT_CHANNEL);
    }

    #[test]
    fn test_missing_config_and_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(Some(&dir.path().join("absent.toml"))).unwrap().is_none());

        let db = ClinicConfig::default().database_path(dir.path());
        assert_eq!(db, dir.path().join(".clinic").join("patient_registration.db"));

        ensure_db_dir(&db).unwrap();
        assert!(db.parent().unwrap().is_dir());
    }
}

use std::path::{Path, PathBuf};

use log::debug;
use toml::{Table, Value};

use crate::error::Result;

/// Per-team settings stored under `[teams.<slug>]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamConfig {
    pub slug: String,
    /// `None` means requests for this team are sent without credentials.
    pub api_key: Option<String>,
    pub datasets_dir: PathBuf,
}

/// Client configuration: a TOML document addressed with `/`-separated
/// keys such as `global/api_endpoint` or `teams/acme/api_key`.
///
/// A config created with [`Config::new`] lives only in memory. One
/// obtained from [`Config::load`] writes every change back to its file.
#[derive(Debug, Clone, Default)]
pub struct Config {
    path: Option<PathBuf>,
    data: Table,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let data: Table = toml::from_str(&text)?;
        debug!("loaded configuration from {}", path.display());
        Ok(Self {
            path: Some(path.to_path_buf()),
            data,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        let mut parts = key.split('/');
        let mut current = self.data.get(parts.next()?)?;
        for part in parts {
            current = current.as_table()?.get(part)?;
        }
        Some(current)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Sets `key`, creating intermediate tables as needed.
    pub fn put(&mut self, key: &str, value: impl Into<Value>) -> Result<()> {
        self.insert(key, value.into());
        self.save()
    }

    pub fn get_team(&self, team: &str) -> Option<TeamConfig> {
        let table = self.get(&format!("teams/{team}"))?.as_table()?;
        let api_key = table
            .get("api_key")
            .and_then(Value::as_str)
            .map(str::to_string);
        let datasets_dir = table
            .get("datasets_dir")
            .and_then(Value::as_str)
            .map(PathBuf::from)
            .unwrap_or_else(default_datasets_dir);

        Some(TeamConfig {
            slug: team.to_string(),
            api_key,
            datasets_dir,
        })
    }

    pub fn set_team(&mut self, team: &str, api_key: &str, datasets_dir: &Path) -> Result<()> {
        self.insert(&format!("teams/{team}/api_key"), api_key.into());
        self.insert(
            &format!("teams/{team}/datasets_dir"),
            datasets_dir.to_string_lossy().into_owned().into(),
        );
        self.save()
    }

    pub fn set_global(&mut self, api_endpoint: &str, base_url: &str) -> Result<()> {
        self.insert("global/api_endpoint", api_endpoint.into());
        self.insert("global/base_url", base_url.into());
        self.save()
    }

    pub fn set_default_team(&mut self, team: &str) -> Result<()> {
        self.put("global/default_team", team)
    }

    fn insert(&mut self, key: &str, value: Value) {
        let parts: Vec<&str> = key.split('/').collect();
        insert_path(&mut self.data, &parts, value);
    }

    fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, toml::to_string_pretty(&self.data)?)?;
        Ok(())
    }
}

fn insert_path(table: &mut Table, parts: &[&str], value: Value) {
    match parts {
        [] => {}
        [last] => {
            table.insert(last.to_string(), value);
        }
        [head, rest @ ..] => {
            let entry = table
                .entry(head.to_string())
                .or_insert(Value::Table(Table::new()));
            match entry {
                Value::Table(child) => insert_path(child, rest, value),
                // A scalar in the way is replaced by a table.
                other => {
                    let mut child = Table::new();
                    insert_path(&mut child, rest, value);
                    *other = Value::Table(child);
                }
            }
        }
    }
}

/// `~/.darwin/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".darwin").join("config.toml"))
}

/// `~/.darwin/datasets`, or `./datasets` when no home directory is known.
pub fn default_datasets_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".darwin").join("datasets"))
        .unwrap_or_else(|| PathBuf::from("datasets"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[global]
api_endpoint = "https://darwin.v7labs.com/api/"
base_url = "https://darwin.v7labs.com"
default_team = "acme"

[teams.acme]
api_key = "secret"
datasets_dir = "/data/darwin"

[teams.guests]
datasets_dir = "/data/guests"
"#;

    fn sample() -> Config {
        Config {
            path: None,
            data: toml::from_str(SAMPLE).unwrap(),
        }
    }

    #[test]
    fn get_walks_slash_separated_keys() {
        let config = sample();
        assert_eq!(
            config.get_str("global/api_endpoint"),
            Some("https://darwin.v7labs.com/api/")
        );
        assert_eq!(config.get_str("teams/acme/api_key"), Some("secret"));
        assert!(config.get("global/missing").is_none());
        assert!(config.get("global/base_url/deeper").is_none());
    }

    #[test]
    fn team_without_api_key_is_anonymous() {
        let config = sample();
        let team = config.get_team("guests").unwrap();
        assert_eq!(team.api_key, None);
        assert_eq!(team.datasets_dir, PathBuf::from("/data/guests"));
        assert!(config.get_team("nobody").is_none());
    }

    #[test]
    fn put_creates_intermediate_tables() {
        let mut config = Config::new();
        config.put("teams/acme/datasets_dir", "/tmp/x").unwrap();
        assert_eq!(config.get_str("teams/acme/datasets_dir"), Some("/tmp/x"));

        config.put("global", "flat").unwrap();
        config.put("global/default_team", "acme").unwrap();
        assert_eq!(config.get_str("global/default_team"), Some("acme"));
    }

    #[test]
    fn changes_are_written_back_to_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, SAMPLE).unwrap();

        let mut config = Config::load(&path).unwrap();
        config
            .set_team("zoo", "k3y", Path::new("/data/zoo"))
            .unwrap();
        config.set_default_team("zoo").unwrap();

        let reloaded = Config::load(&path).unwrap();
        assert_eq!(reloaded.get_str("global/default_team"), Some("zoo"));
        let team = reloaded.get_team("zoo").unwrap();
        assert_eq!(team.api_key.as_deref(), Some("k3y"));
        assert_eq!(team.datasets_dir, PathBuf::from("/data/zoo"));
        assert_eq!(reloaded.get_str("teams/acme/api_key"), Some("secret"));
    }

    #[test]
    fn in_memory_config_never_touches_disk() {
        let mut config = Config::new();
        config
            .set_global("http://localhost/api/", "http://localhost")
            .unwrap();
        assert!(config.path().is_none());
        assert_eq!(config.get_str("global/base_url"), Some("http://localhost"));
    }
}

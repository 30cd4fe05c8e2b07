use failure::Fail;
use log::LevelFilter;
use std::{collections::HashMap, fs, path::PathBuf};
use serde::Deserialize;

use crate::utils::SingleInit;

static CONFIG: SingleInit<Config> = SingleInit::uninit();

pub fn load() -> crate::Result<&'static Config> {
    CONFIG.get_or_try_init(|| {
        let data = fs::read("config.toml").map_err(ReadConfigurationError)?;
        parse(&data).map_err(From::from)
    })
}

/// Parse configuration from TOML source.
pub fn parse(data: &[u8]) -> Result<Config, ConfigurationError> {
    toml::from_slice(data).map_err(ConfigurationError)
}

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub server: Server,
    pub database: Option<Database>,
    #[serde(default)]
    pub moderation: Moderation,
    pub mail: crate::mail::Config,
    #[serde(default)]
    pub search: Search,
    #[serde(default)]
    pub logging: Logging,
}

impl Config {
    /// Validate configuration correctness.
    pub fn validate(&self) -> Result<(), failure::Error> {
        if let Search::Directory { ref path } = self.search {
            if path.as_os_str().is_empty() {
                return Err(EmptySearchPathError.into());
            }
        }

        Ok(())
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Server {
    /// Domain (host name) of this server. Used when constructing links in
    /// emails.
    pub domain: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Database {
    /// Connection URL.
    pub url: String,
}

/// Moderation and permission settings.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct Moderation {
    /// Is the moderation workflow enabled?
    ///
    /// When disabled pages have only two states, changed and approved, and
    /// nobody is ever asked to approve anything.
    #[serde(default = "default_true")]
    pub moderator: bool,
    /// Are page permissions enforced?
    ///
    /// When disabled every staff user can add and moderate every page.
    #[serde(default = "default_true")]
    pub permission: bool,
}

/// Search index configuration.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum Search {
    /// Index is kept in the `search_index` table.
    Database,
    /// Index is kept as a set of files in a directory.
    Directory {
        path: PathBuf,
    },
}

/// Logging configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct Logging {
    /// Default logging level.
    #[serde(default = "default_level_filter")]
    pub level: LevelFilter,
    /// Custom filters.
    #[serde(default)]
    pub filters: HashMap<String, LevelFilter>,
}

#[derive(Debug, Fail)]
#[fail(display = "Cannot read configuration file")]
pub struct ReadConfigurationError(#[fail(cause)] std::io::Error);

#[derive(Debug, Fail)]
#[fail(display = "Invalid configuration: {}", _0)]
pub struct ConfigurationError(#[fail(cause)] toml::de::Error);

#[derive(Debug, Fail)]
#[fail(display = "search.path must not be empty")]
pub struct EmptySearchPathError;

fn default_true() -> bool {
    true
}

fn default_level_filter() -> LevelFilter {
    LevelFilter::Info
}

impl Default for Moderation {
    fn default() -> Self {
        Moderation {
            moderator: true,
            permission: true,
        }
    }
}

impl Default for Search {
    fn default() -> Self {
        Search::Database
    }
}

impl Default for Logging {
    fn default() -> Self {
        Logging {
            level: default_level_filter(),
            filters: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [server]
        domain = "cms.example.org"

        [mail]
        sender = "cms@example.org"
        transport = "log"
    "#;

    #[test]
    fn defaults() {
        let config = parse(MINIMAL.as_bytes()).unwrap();

        assert_eq!(config.server.domain, "cms.example.org");
        assert!(config.database.is_none());
        assert!(config.moderation.moderator);
        assert!(config.moderation.permission);
        assert!(match config.search { Search::Database => true, _ => false });
        assert_eq!(config.logging.level, LevelFilter::Info);
        config.validate().unwrap();
    }

    #[test]
    fn full() {
        let source = format!(r#"{}
            [database]
            url = "postgres://localhost/folio"

            [moderation]
            moderator = false

            [search]
            backend = "directory"
            path = "/var/lib/folio/index"

            [logging]
            level = "debug"
            filters = {{ diesel = "warn" }}
        "#, MINIMAL);
        let config = parse(source.as_bytes()).unwrap();

        assert_eq!(config.database.unwrap().url, "postgres://localhost/folio");
        assert!(!config.moderation.moderator);
        assert!(config.moderation.permission);
        match config.search {
            Search::Directory { ref path } =>
                assert_eq!(path, &PathBuf::from("/var/lib/folio/index")),
            _ => panic!("expected directory backend"),
        }
        assert_eq!(config.logging.level, LevelFilter::Debug);
        assert_eq!(config.logging.filters["diesel"], LevelFilter::Warn);
    }

    #[test]
    fn empty_search_path_is_rejected() {
        let source = format!(r#"{}
            [search]
            backend = "directory"
            path = ""
        "#, MINIMAL);
        let config = parse(source.as_bytes()).unwrap();

        assert!(config.validate().is_err());
    }
}

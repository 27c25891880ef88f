#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use cts_protocol::ConnectionConfig;
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unsupported Redis version {0:?} (expected one of {versions})", versions = RedisVersion::list())]
    UnknownVersion(String),
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("config declares no databases")]
    NoDatabases,
    #[error("config declares no versions")]
    NoVersions,
}

/// Redis releases a corpus can be gated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RedisVersion {
    V1_0_0,
    V2_8_0,
    V3_2_0,
    V4_0_0,
    V5_0_0,
    V6_0_0,
    V6_2_0,
    V7_0_0,
    V7_2_0,
}

impl RedisVersion {
    pub const ALL: [Self; 9] = [
        Self::V1_0_0,
        Self::V2_8_0,
        Self::V3_2_0,
        Self::V4_0_0,
        Self::V5_0_0,
        Self::V6_0_0,
        Self::V6_2_0,
        Self::V7_0_0,
        Self::V7_2_0,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::V1_0_0 => "1.0.0",
            Self::V2_8_0 => "2.8.0",
            Self::V3_2_0 => "3.2.0",
            Self::V4_0_0 => "4.0.0",
            Self::V5_0_0 => "5.0.0",
            Self::V6_0_0 => "6.0.0",
            Self::V6_2_0 => "6.2.0",
            Self::V7_0_0 => "7.0.0",
            Self::V7_2_0 => "7.2.0",
        }
    }

    fn list() -> String {
        Self::ALL.map(Self::as_str).join(", ")
    }
}

impl fmt::Display for RedisVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RedisVersion {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|version| version.as_str() == raw)
            .ok_or_else(|| ConfigError::UnknownVersion(raw.to_string()))
    }
}

impl Serialize for RedisVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RedisVersion {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Resolved settings for a single run against one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Cases whose `since` sorts after this version are not applicable.
    pub version: Option<RedisVersion>,
    pub show_failed: bool,
}

/// Connection parameters of one database entry in a batch config.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub ssl: bool,
    #[serde(default)]
    pub cluster: bool,
}

impl TargetConfig {
    #[must_use]
    pub fn connection(&self) -> ConnectionConfig {
        ConnectionConfig {
            host: self.host.clone(),
            port: self.port,
            password: (!self.password.is_empty()).then(|| self.password.clone()),
            tls: self.ssl,
            cluster: self.cluster,
            ..ConnectionConfig::default()
        }
    }
}

/// Batch run description: every database is tested against every version.
///
/// ```toml
/// dir = "html"
/// specific_versions = ["6.2.0", "7.0.0"]
///
/// [database.Redis]
/// host = "127.0.0.1"
/// port = 6379
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchConfig {
    pub dir: PathBuf,
    pub specific_versions: Vec<RedisVersion>,
    pub database: BTreeMap<String, TargetConfig>,
}

impl BatchConfig {
    pub fn parse(raw: &str, origin: &Path) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;
        if config.database.is_empty() {
            return Err(ConfigError::NoDatabases);
        }
        if config.specific_versions.is_empty() {
            return Err(ConfigError::NoVersions);
        }
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&raw, path)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::path::Path;

    use super::{BatchConfig, ConfigError, RedisVersion};

    const SAMPLE: &str = r#"
dir = "html"
specific_versions = ["6.2.0", "7.0.0"]

[database.Redis]
host = "127.0.0.1"
port = 6379

[database.Tair]
host = "tair.internal"
port = 6380
password = "hunter2"
ssl = true
cluster = true
"#;

    #[test]
    fn versions_parse_only_from_fixed_set() {
        assert_eq!("6.2.0".parse::<RedisVersion>().unwrap(), RedisVersion::V6_2_0);
        assert_eq!(RedisVersion::V7_2_0.to_string(), "7.2.0");
        let err = "6.1.0".parse::<RedisVersion>().unwrap_err();
        assert!(matches!(err, ConfigError::UnknownVersion(ref raw) if raw == "6.1.0"));
        assert!(err.to_string().contains("1.0.0, 2.8.0"));
    }

    #[test]
    fn version_order_matches_string_order() {
        for pair in RedisVersion::ALL.windows(2) {
            assert!(pair[0] < pair[1]);
            assert!(pair[0].as_str() < pair[1].as_str());
        }
    }

    #[test]
    fn batch_config_parses_targets() {
        let config = BatchConfig::parse(SAMPLE, Path::new("config.toml")).expect("parses");
        assert_eq!(config.dir, Path::new("html"));
        assert_eq!(
            config.specific_versions,
            vec![RedisVersion::V6_2_0, RedisVersion::V7_0_0]
        );
        let names: Vec<&str> = config.database.keys().map(String::as_str).collect();
        assert_eq!(names, ["Redis", "Tair"]);

        let plain = config.database["Redis"].connection();
        assert_eq!(plain.addr(), "127.0.0.1:6379");
        assert_eq!(plain.password, None);
        assert!(!plain.tls && !plain.cluster);

        let tair = config.database["Tair"].connection();
        assert_eq!(tair.password.as_deref(), Some("hunter2"));
        assert!(tair.tls && tair.cluster);
    }

    #[test]
    fn batch_config_rejects_unknown_versions_and_empty_sections() {
        let bad = SAMPLE.replace("\"7.0.0\"", "\"7.1.0\"");
        assert!(matches!(
            BatchConfig::parse(&bad, Path::new("c.toml")),
            Err(ConfigError::Parse { .. })
        ));
        let no_db = "dir = \"out\"\nspecific_versions = [\"7.0.0\"]\n[database]\n";
        assert!(matches!(
            BatchConfig::parse(no_db, Path::new("c.toml")),
            Err(ConfigError::NoDatabases)
        ));
        let no_versions = "dir = \"out\"\nspecific_versions = []\n[database.R]\nhost = \"h\"\nport = 1\n";
        assert!(matches!(
            BatchConfig::parse(no_versions, Path::new("c.toml")),
            Err(ConfigError::NoVersions)
        ));
    }

    #[test]
    fn load_reads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(SAMPLE.as_bytes()).expect("write config");
        let config = BatchConfig::load(file.path()).expect("loads");
        assert_eq!(config.database.len(), 2);

        let missing = BatchConfig::load(Path::new("/nonexistent/config.toml"));
        assert!(matches!(missing, Err(ConfigError::Read { .. })));
    }
}

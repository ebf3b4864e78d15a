use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4328,
            max_connections: 64,
        }
    }
}

/// Settings for the backing document store. A change to either field
/// triggers reconstruction of the store adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MongoConfig {
    pub connection_string: String,
    pub database_name: String,
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            connection_string: "mongodb://127.0.0.1:27017".to_string(),
            database_name: "hmi".to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub mongo: MongoConfig,
}

impl Config {
    /// Load config from TOML file, with environment variable overrides.
    /// Falls back to defaults if file is not found. DOCBRIDGE_CONFIG env var
    /// overrides the path.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        ConfigLoader::new().load(path)
    }
}

/// Resolves configuration from file, CLI args, and environment variables.
struct ConfigLoader {
    args: Vec<String>,
}

impl ConfigLoader {
    fn new() -> Self {
        Self {
            args: env::args().collect(),
        }
    }

    fn load<P: AsRef<Path>>(&self, default_path: P) -> anyhow::Result<Config> {
        let mut cfg_path = self.resolve_config_path(default_path);

        // Allow DOCBRIDGE_CONFIG to fully override any arg/default
        if let Ok(env_path) = env::var("DOCBRIDGE_CONFIG") {
            cfg_path = PathBuf::from(env_path);
        }

        match fs::read_to_string(&cfg_path) {
            Ok(s) => {
                let mut cfg: Config = toml::from_str(&s)?;
                Self::apply_env_overrides(&mut cfg);
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let mut cfg = Config::default();
                Self::apply_env_overrides(&mut cfg);
                Ok(cfg)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Resolve config path from CLI args or default.
    fn resolve_config_path<P: AsRef<Path>>(&self, default_path: P) -> PathBuf {
        if let Some(p) = Self::find_config_arg(&self.args) {
            p
        } else {
            default_path.as_ref().to_path_buf()
        }
    }

    /// Find --config or -c flag in arguments.
    fn find_config_arg(args: &[String]) -> Option<PathBuf> {
        let mut iter = args.iter().peekable();
        while let Some(a) = iter.next() {
            if a.starts_with("--config=") || a.starts_with("-c=") {
                if let Some((_, val)) = a.split_once('=') {
                    return Some(PathBuf::from(val));
                }
            } else if (a == "--config" || a == "-c")
                && let Some(next) = iter.peek()
            {
                return Some(PathBuf::from((*next).clone()));
            }
        }
        None
    }

    /// Apply DOCBRIDGE_* environment variable overrides.
    fn apply_env_overrides(cfg: &mut Config) {
        if let Ok(v) = env::var("DOCBRIDGE_HOST") {
            cfg.server.host = v;
        }

        if let Ok(v) = env::var("DOCBRIDGE_PORT")
            && let Ok(p) = v.parse::<u16>()
        {
            cfg.server.port = p;
        }

        if let Ok(v) = env::var("DOCBRIDGE_CONNECTION_STRING") {
            cfg.mongo.connection_string = v;
        }

        if let Ok(v) = env::var("DOCBRIDGE_DATABASE_NAME") {
            cfg.mongo.database_name = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.server.host, "127.0.0.1");
        assert_eq!(cfg.server.port, 4328);
        assert_eq!(cfg.mongo.connection_string, "mongodb://127.0.0.1:27017");
        assert_eq!(cfg.mongo.database_name, "hmi");
    }

    #[test]
    fn test_toml_parse() {
        let toml = r#"
            [server]
            host = "0.0.0.0"
            port = 9000
            max_connections = 8

            [mongo]
            connection_string = "mongodb://db:27017"
            database_name = "plant"
        "#;

        let cfg: Config = toml::from_str(toml).unwrap();
        assert_eq!(cfg.server.port, 9000);
        assert_eq!(cfg.mongo.database_name, "plant");
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let toml = r#"
            [mongo]
            connection_string = "mongodb://db:27017"
            database_name = "plant"
        "#;

        let cfg: Config = toml::from_str(toml).unwrap();
        assert_eq!(cfg.server.port, 4328);
        assert_eq!(cfg.mongo.connection_string, "mongodb://db:27017");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nhost = \"10.0.0.1\"\nport = 5000\nmax_connections = 4").unwrap();

        let cfg = Config::load_from_path(file.path()).unwrap();
        assert_eq!(cfg.server.host, "10.0.0.1");
        assert_eq!(cfg.server.port, 5000);
        // Section absent from the file keeps its defaults
        assert_eq!(cfg.mongo.database_name, "hmi");
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let cfg = Config::load_from_path("/nonexistent/docbridge.toml").unwrap();
        assert_eq!(cfg.server.port, 4328);
    }
}

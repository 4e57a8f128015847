use anyhow::{Context, Result};
use serde::Deserialize;
use std::{
    env, fs,
    path::{Path, PathBuf},
};

/// Connection parameters for the MySQL server plus the retry budget.
///
/// Defaults match a containerized local instance (the `mysqldb` service name
/// a docker-compose setup would expose).
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    /// Empty means "connect without a password".
    pub password: String,
    /// The working database. Dropped and recreated on every run.
    pub database: String,
    pub max_retries: u32,
    pub retry_delay_secs: u64,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "mysqldb".to_string(),
            port: 3306,
            user: "root".to_string(),
            password: "p@ssw0rd1".to_string(),
            database: "take_home".to_string(),
            max_retries: 10,
            retry_delay_secs: 3,
        }
    }
}

/// Full pipeline configuration. Components receive this explicitly; none of
/// them carry their own baked-in defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub db: DbConfig,
    /// Directory holding `courses.json`, `certificates.json`, `users.json`.
    pub data_dir: PathBuf,
    /// Directory holding the analytical `.sql` files.
    pub sql_dir: PathBuf,
    /// Where `result_*.csv` artifacts land.
    pub output_dir: PathBuf,
    /// `replace` or `append`; parsed before any load runs.
    pub load_mode: String,
    /// When false (default) a partial load logs a warning and the pipeline
    /// continues to the next step.
    pub abort_on_load_failure: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db: DbConfig::default(),
            data_dir: PathBuf::from("data"),
            sql_dir: PathBuf::from("sql_queries"),
            output_dir: PathBuf::from("."),
            load_mode: "append".to_string(),
            abort_on_load_failure: false,
        }
    }
}

impl Config {
    /// Load from a YAML file when a path is given, otherwise use defaults.
    /// `COURSELOAD_DB_HOST` and `COURSELOAD_DB_PASSWORD` override either way.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut cfg = match path {
            Some(p) => {
                let text = fs::read_to_string(p)
                    .with_context(|| format!("failed to read config file {}", p.display()))?;
                serde_yaml::from_str(&text)
                    .with_context(|| format!("failed to parse config file {}", p.display()))?
            }
            None => Self::default(),
        };
        if let Ok(host) = env::var("COURSELOAD_DB_HOST") {
            cfg.db.host = host;
        }
        if let Ok(password) = env::var("COURSELOAD_DB_PASSWORD") {
            cfg.db.password = password;
        }
        Ok(cfg)
    }
}

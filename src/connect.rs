use crate::config::DbConfig;
use crate::error::PipelineError;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::ConnectOptions;
use std::time::Duration;
use tracing::{info, warn};

/// Build connect options from config, omitting empty parameters. Passing
/// `None` for `database` connects to the server without selecting one, which
/// the schema initializer needs for its DROP/CREATE DATABASE pass.
fn connect_options(cfg: &DbConfig, database: Option<&str>) -> MySqlConnectOptions {
    let mut opts = MySqlConnectOptions::new()
        .host(&cfg.host)
        .port(cfg.port)
        .username(&cfg.user);
    if !cfg.password.is_empty() {
        opts = opts.password(&cfg.password);
    }
    if let Some(db) = database.filter(|d| !d.is_empty()) {
        opts = opts.database(db);
    }
    opts
}

/// Open a connection, retrying on failure with a fixed delay between
/// attempts. Exhausting the budget is an explicit error; there is no path
/// that hands back an unusable handle.
pub async fn connect(
    cfg: &DbConfig,
    database: Option<&str>,
) -> Result<MySqlConnection, PipelineError> {
    let opts = connect_options(cfg, database);
    // a zero budget still gets one attempt
    let attempts = cfg.max_retries.max(1);
    let mut last = String::new();

    for attempt in 1..=attempts {
        match opts.connect().await {
            Ok(conn) => {
                info!(host = %cfg.host, port = cfg.port, database = ?database, "connected to database");
                return Ok(conn);
            }
            Err(err) => {
                warn!(attempt, max = attempts, %err, "cannot connect to database, retrying");
                last = err.to_string();
            }
        }
        if attempt < attempts {
            tokio::time::sleep(Duration::from_secs(cfg.retry_delay_secs)).await;
        }
    }

    Err(PipelineError::ConnectionUnavailable { attempts, last })
}

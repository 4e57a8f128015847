use anyhow::{Context, Result};
use courseload::{
    config::Config,
    load::{self, LoadMode},
    report, schema, source,
};
use std::path::Path;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();
    info!("startup");

    // ─── 2) load config (optional YAML path as first argument) ───────
    let config_path = std::env::args().nth(1);
    let cfg = Config::load(config_path.as_deref().map(Path::new))?;
    let mode: LoadMode = cfg.load_mode.parse()?;

    // ─── 3) read the three source files ──────────────────────────────
    info!("reading data from files");
    let courses = source::read_records(&cfg.data_dir.join("courses.json"))?;
    let certificates = source::read_records(&cfg.data_dir.join("certificates.json"))?;
    let users = source::read_records(&cfg.data_dir.join("users.json"))?;

    // ─── 4) drop and recreate the working schema ─────────────────────
    info!("initializing database and creating tables");
    schema::init_database(&cfg.db).await?;

    // ─── 5) load each data set into its table ────────────────────────
    info!("loading data to database");
    let sets = [
        ("courses.json", "courses", &courses),
        ("certificates.json", "certificates", &certificates),
        ("users.json", "users", &users),
    ];
    for (file, table_name, records) in sets {
        let table = schema::table(table_name)
            .with_context(|| format!("no table definition for `{table_name}`"))?;
        let outcome = load::load(&cfg.db, records, table, mode).await?;
        if !outcome.is_complete() {
            warn!(
                file,
                inserted = outcome.inserted,
                total = outcome.total,
                "failed to load all data"
            );
            if cfg.abort_on_load_failure {
                anyhow::bail!("aborting: incomplete load of {file}");
            }
        }
    }

    // ─── 6) run the analytics reports ────────────────────────────────
    info!("running analytics queries against database");
    for rep in report::default_reports() {
        report::run_report(&cfg.db, &cfg.sql_dir, &cfg.output_dir, &rep).await?;
    }

    info!("all done");
    Ok(())
}

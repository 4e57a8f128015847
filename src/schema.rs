use crate::config::DbConfig;
use crate::connect::connect;
use anyhow::{Context, Result};
use sqlx::Connection;
use tracing::{debug, info};

/// Static definition of one working table. All columns are unconstrained
/// VARCHAR(255): no keys, no indexes. The source data is loaded as-is and the
/// analytical queries do their own casting.
#[derive(Debug)]
pub struct TableDef {
    pub name: &'static str,
    pub columns: &'static [&'static str],
}

/// The three working tables, in creation order.
pub static TABLES: &[TableDef] = &[
    TableDef {
        name: "certificates",
        columns: &["course", "user", "completedDate", "startDate"],
    },
    TableDef {
        name: "courses",
        columns: &["id", "title", "description", "publishedAt"],
    },
    TableDef {
        name: "users",
        columns: &["id", "email", "firstName", "lastName"],
    },
];

/// Look up a working table by name.
pub fn table(name: &str) -> Option<&'static TableDef> {
    TABLES.iter().find(|t| t.name == name)
}

impl TableDef {
    pub fn drop_sql(&self) -> String {
        format!("DROP TABLE IF EXISTS `{}`", self.name)
    }

    pub fn create_sql(&self) -> String {
        let cols = self
            .columns
            .iter()
            .map(|c| format!("`{c}` VARCHAR(255)"))
            .collect::<Vec<_>>()
            .join(", ");
        format!("CREATE TABLE `{}` ({})", self.name, cols)
    }
}

/// Drop and recreate the working database and its tables. Destructive and
/// idempotent: two runs in a row leave the same empty schema. Any DDL error
/// propagates; schema setup is never retried.
pub async fn init_database(cfg: &DbConfig) -> Result<()> {
    // 1) connect without selecting a database so we can drop/create it
    let mut conn = connect(cfg, None).await?;
    sqlx::query(&format!("DROP DATABASE IF EXISTS `{}`", cfg.database))
        .execute(&mut conn)
        .await
        .with_context(|| format!("dropping database `{}`", cfg.database))?;
    sqlx::query(&format!("CREATE DATABASE `{}`", cfg.database))
        .execute(&mut conn)
        .await
        .with_context(|| format!("creating database `{}`", cfg.database))?;
    conn.close().await.ok();

    // 2) reconnect scoped to the fresh database and create the tables
    let mut conn = connect(cfg, Some(&cfg.database)).await?;
    for table in TABLES {
        debug!(table = table.name, "creating table");
        sqlx::query(&table.drop_sql())
            .execute(&mut conn)
            .await
            .with_context(|| format!("dropping table `{}`", table.name))?;
        sqlx::query(&table.create_sql())
            .execute(&mut conn)
            .await
            .with_context(|| format!("creating table `{}`", table.name))?;
    }
    conn.close().await.ok();

    info!(database = %cfg.database, "database initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_tables_with_fixed_columns() {
        assert_eq!(TABLES.len(), 3);
        let courses = table("courses").unwrap();
        assert_eq!(
            courses.columns,
            &["id", "title", "description", "publishedAt"]
        );
        assert!(table("enrolments").is_none());
    }

    #[test]
    fn ddl_text() {
        let users = table("users").unwrap();
        assert_eq!(users.drop_sql(), "DROP TABLE IF EXISTS `users`");
        assert_eq!(
            users.create_sql(),
            "CREATE TABLE `users` (`id` VARCHAR(255), `email` VARCHAR(255), \
             `firstName` VARCHAR(255), `lastName` VARCHAR(255))"
        );
    }
}

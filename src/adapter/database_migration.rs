use crate::adapter::database_error::DatabaseError;
use sqlx::{MySql, Pool};
use tracing::{debug, info};

/// マイグレーションファイルのリスト（実行順）
const MIGRATIONS: [(&str, &str); 4] = [
    (
        "001_create_items_table",
        include_str!("../../migrations/001_create_items_table.sql"),
    ),
    (
        "002_create_item_stock_table",
        include_str!("../../migrations/002_create_item_stock_table.sql"),
    ),
    (
        "003_create_stock_ledger_table",
        include_str!("../../migrations/003_create_stock_ledger_table.sql"),
    ),
    (
        "004_create_procurement_requests_table",
        include_str!("../../migrations/004_create_procurement_requests_table.sql"),
    ),
];

/// データベースマイグレーションを管理する構造体
pub struct DatabaseMigration {
    pool: Pool<MySql>,
}

impl DatabaseMigration {
    /// 新しいDatabaseMigrationインスタンスを作成
    pub fn new(pool: Pool<MySql>) -> Self {
        Self { pool }
    }

    /// マイグレーションを実行
    /// べき等性を保証（CREATE TABLE IF NOT EXISTS）
    pub async fn run(&self) -> Result<(), DatabaseError> {
        for (name, migration_sql) in MIGRATIONS {
            debug!(migration = name, "Running migration");
            sqlx::query(migration_sql)
                .execute(&self.pool)
                .await
                .map_err(|e| DatabaseError::MigrationError(format!("{} failed: {}", name, e)))?;
        }

        info!(count = MIGRATIONS.len(), "All migrations completed successfully");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_idempotent_statements() {
        for (name, sql) in MIGRATIONS {
            assert!(
                sql.trim_start().starts_with("CREATE TABLE IF NOT EXISTS"),
                "{} must be idempotent",
                name
            );
        }
    }
}

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use inspection_core::{DatabaseConfig, InspectionError, InspectionResult};
use inspection_domain::{JobStore, ScriptStore, TemplateStore, TestRecordStore};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::debug;

use super::sqlite::{SqliteJobStore, SqliteScriptStore, SqliteTemplateStore, SqliteTestRecordStore};

/// SQLite 连接池和仓储工厂
pub struct DatabaseManager {
    pool: SqlitePool,
}

impl DatabaseManager {
    pub async fn new(config: &DatabaseConfig) -> InspectionResult<Self> {
        let options = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// 使用已有连接池
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// 创建表和索引
    pub async fn migrate(&self) -> InspectionResult<()> {
        debug!("Running SQLite database migrations");

        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                job_id TEXT NOT NULL UNIQUE,
                job_name TEXT NOT NULL,
                user_name TEXT NOT NULL,
                cluster_name TEXT NOT NULL,
                is_cron INTEGER NOT NULL DEFAULT 0,
                template_name TEXT NOT NULL,
                template_id INTEGER NOT NULL,
                ip_list TEXT NOT NULL DEFAULT '',
                base_ip TEXT,
                mode TEXT NOT NULL DEFAULT 'regular',
                resource TEXT NOT NULL,
                status TEXT NOT NULL,
                create_time DATETIME NOT NULL,
                finish_time DATETIME
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS templates (
                template_id INTEGER PRIMARY KEY AUTOINCREMENT,
                template_name TEXT NOT NULL,
                cluster_name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                mode TEXT NOT NULL DEFAULT 'regular',
                resource TEXT NOT NULL,
                last_job_id TEXT,
                last_job_time DATETIME,
                cron_switch INTEGER NOT NULL DEFAULT 0,
                cron_expr TEXT NOT NULL DEFAULT '',
                cron_spec TEXT,
                create_user TEXT NOT NULL,
                create_time DATETIME NOT NULL,
                modify_user TEXT,
                modify_time DATETIME,
                UNIQUE (template_name, cluster_name)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS scripts (
                case_id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                ch_name TEXT NOT NULL DEFAULT '',
                cluster TEXT NOT NULL DEFAULT '',
                detail TEXT NOT NULL DEFAULT '',
                domain TEXT NOT NULL DEFAULT '',
                mode TEXT NOT NULL DEFAULT 'regular',
                category TEXT NOT NULL DEFAULT ''
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS template_scripts (
                template_id INTEGER NOT NULL,
                script_name TEXT NOT NULL,
                position INTEGER NOT NULL,
                PRIMARY KEY (template_id, script_name),
                FOREIGN KEY (template_id) REFERENCES templates(template_id) ON DELETE CASCADE
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS script_configs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                template_id INTEGER NOT NULL,
                script_name TEXT NOT NULL,
                config_name TEXT NOT NULL,
                config_value TEXT NOT NULL,
                FOREIGN KEY (template_id) REFERENCES templates(template_id) ON DELETE CASCADE
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS test_infos (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                job_id TEXT NOT NULL,
                case_name TEXT NOT NULL,
                healthy_num INTEGER NOT NULL,
                unhealthy_num INTEGER NOT NULL,
                critical_num INTEGER NOT NULL,
                unknown_num INTEGER NOT NULL,
                timeout_num INTEGER NOT NULL,
                total_num INTEGER NOT NULL,
                time_cost REAL NOT NULL,
                result TEXT NOT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_jobs_cluster_status ON jobs(cluster_name, status)",
            "CREATE INDEX IF NOT EXISTS idx_jobs_create_time ON jobs(create_time)",
            "CREATE INDEX IF NOT EXISTS idx_templates_cron ON templates(cron_switch)",
            "CREATE INDEX IF NOT EXISTS idx_script_configs_template ON script_configs(template_id, script_name)",
            "CREATE INDEX IF NOT EXISTS idx_test_infos_job ON test_infos(job_id)",
        ];

        for statement in statements {
            sqlx::query(statement).execute(&self.pool).await?;
        }

        debug!("Successfully completed SQLite database migrations");
        Ok(())
    }

    pub async fn health_check(&self) -> InspectionResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| InspectionError::DatabaseOperation(format!("数据库健康检查失败: {e}")))?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub fn job_store(&self) -> Arc<dyn JobStore> {
        Arc::new(SqliteJobStore::new(self.pool.clone()))
    }

    pub fn template_store(&self) -> Arc<dyn TemplateStore> {
        Arc::new(SqliteTemplateStore::new(self.pool.clone()))
    }

    pub fn script_store(&self) -> Arc<dyn ScriptStore> {
        Arc::new(SqliteScriptStore::new(self.pool.clone()))
    }

    pub fn test_record_store(&self) -> Arc<dyn TestRecordStore> {
        Arc::new(SqliteTestRecordStore::new(self.pool.clone()))
    }
}

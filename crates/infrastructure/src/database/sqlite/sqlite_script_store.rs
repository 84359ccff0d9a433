use std::collections::BTreeMap;

use async_trait::async_trait;
use inspection_core::InspectionResult;
use inspection_domain::{JobMode, Script, ScriptStore};
use sqlx::{Row, SqlitePool};

pub struct SqliteScriptStore {
    pool: SqlitePool,
}

impl SqliteScriptStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_script(row: &sqlx::sqlite::SqliteRow) -> InspectionResult<Script> {
        let mode: String = row.try_get("mode")?;
        Ok(Script {
            case_id: row.try_get("case_id")?,
            name: row.try_get("name")?,
            ch_name: row.try_get("ch_name")?,
            cluster: row.try_get("cluster")?,
            detail: row.try_get("detail")?,
            domain: row.try_get("domain")?,
            mode: mode.parse()?,
            category: row.try_get("category")?,
        })
    }
}

#[async_trait]
impl ScriptStore for SqliteScriptStore {
    async fn insert(&self, script: &Script) -> InspectionResult<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO scripts (name, ch_name, cluster, detail, domain, mode, category)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT(name) DO UPDATE SET
                ch_name = excluded.ch_name,
                cluster = excluded.cluster,
                detail = excluded.detail,
                domain = excluded.domain,
                mode = excluded.mode,
                category = excluded.category
            RETURNING case_id
            "#,
        )
        .bind(&script.name)
        .bind(&script.ch_name)
        .bind(&script.cluster)
        .bind(&script.detail)
        .bind(&script.domain)
        .bind(script.mode.as_str())
        .bind(&script.category)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("case_id")?)
    }

    async fn delete_by_name(&self, name: &str) -> InspectionResult<bool> {
        let result = sqlx::query("DELETE FROM scripts WHERE name = $1")
            .bind(name)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_by_name(&self, name: &str) -> InspectionResult<Option<Script>> {
        let row = sqlx::query("SELECT * FROM scripts WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_script).transpose()
    }

    async fn find_params_by_template(
        &self,
        template_id: i64,
        script_name: &str,
    ) -> InspectionResult<BTreeMap<String, String>> {
        let rows = sqlx::query(
            "SELECT config_name, config_value FROM script_configs WHERE template_id = $1 AND script_name = $2",
        )
        .bind(template_id)
        .bind(script_name)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| Ok((row.try_get("config_name")?, row.try_get("config_value")?)))
            .collect()
    }

    /// regular 只取常规脚本，deep 取全部；集群为空或包含 `集群:资源` 标识的脚本适用
    async fn find_by_mode(
        &self,
        mode: JobMode,
        cluster: &str,
        resource: &str,
    ) -> InspectionResult<Vec<Script>> {
        let marker = format!("%{}%", format!("{cluster}:{resource}").to_lowercase());
        let sql = match mode {
            JobMode::Regular => {
                "SELECT * FROM scripts WHERE mode = 'regular' AND (cluster = '' OR LOWER(cluster) LIKE $1) ORDER BY case_id"
            }
            JobMode::Deep => {
                "SELECT * FROM scripts WHERE (cluster = '' OR LOWER(cluster) LIKE $1) ORDER BY case_id"
            }
        };
        let rows = sqlx::query(sql).bind(marker).fetch_all(&self.pool).await?;

        rows.iter().map(Self::row_to_script).collect()
    }
}

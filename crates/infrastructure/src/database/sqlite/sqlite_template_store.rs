use async_trait::async_trait;
use chrono::{DateTime, Utc};
use inspection_core::{InspectionError, InspectionResult};
use inspection_domain::{CronSpec, ScriptParam, Template, TemplateBasicInfo, TemplateStore};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use tracing::{debug, instrument};

pub struct SqliteTemplateStore {
    pool: SqlitePool,
}

impl SqliteTemplateStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_template(row: &sqlx::sqlite::SqliteRow) -> InspectionResult<Template> {
        let mode: String = row.try_get("mode")?;
        let cron_switch: bool = row.try_get("cron_switch")?;
        let cron_spec: Option<String> = row.try_get("cron_spec")?;
        let cron = match (cron_switch, cron_spec) {
            (true, Some(raw)) => Some(serde_json::from_str::<CronSpec>(&raw)?),
            _ => None,
        };
        Ok(Template {
            template_id: row.try_get("template_id")?,
            template_name: row.try_get("template_name")?,
            cluster_name: row.try_get("cluster_name")?,
            description: row.try_get("description")?,
            mode: mode.parse()?,
            resource: row.try_get("resource")?,
            last_job_id: row.try_get("last_job_id")?,
            last_job_time: row.try_get("last_job_time")?,
            cron,
            create_user: row.try_get("create_user")?,
            create_time: row.try_get("create_time")?,
            modify_user: row.try_get("modify_user")?,
            modify_time: row.try_get("modify_time")?,
        })
    }

    fn not_found(name: &str, cluster: &str) -> InspectionError {
        InspectionError::TemplateNotFound {
            name: name.to_string(),
            cluster: cluster.to_string(),
        }
    }

    async fn replace_scripts(
        tx: &mut Transaction<'_, Sqlite>,
        template_id: i64,
        scripts: &[ScriptParam],
    ) -> InspectionResult<()> {
        sqlx::query("DELETE FROM template_scripts WHERE template_id = $1")
            .bind(template_id)
            .execute(&mut **tx)
            .await?;
        sqlx::query("DELETE FROM script_configs WHERE template_id = $1")
            .bind(template_id)
            .execute(&mut **tx)
            .await?;

        for (position, script) in scripts.iter().enumerate() {
            sqlx::query(
                "INSERT INTO template_scripts (template_id, script_name, position) VALUES ($1, $2, $3)",
            )
            .bind(template_id)
            .bind(&script.script_name)
            .bind(i64::try_from(position).unwrap_or(i64::MAX))
            .execute(&mut **tx)
            .await?;

            for (name, value) in &script.params {
                sqlx::query(
                    r#"
                    INSERT INTO script_configs (template_id, script_name, config_name, config_value)
                    VALUES ($1, $2, $3, $4)
                    "#,
                )
                .bind(template_id)
                .bind(&script.script_name)
                .bind(name)
                .bind(value)
                .execute(&mut **tx)
                .await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl TemplateStore for SqliteTemplateStore {
    #[instrument(skip(self, template, scripts), fields(template = %template.template_name, cluster = %template.cluster_name))]
    async fn insert(&self, template: &Template, scripts: &[ScriptParam]) -> InspectionResult<i64> {
        let cron_spec = template.cron.as_ref().map(serde_json::to_string).transpose()?;
        let cron_expr = template
            .cron
            .as_ref()
            .map(|c| c.cron_expr.clone())
            .unwrap_or_default();

        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            r#"
            INSERT INTO templates (template_name, cluster_name, description, mode, resource,
                                   last_job_id, last_job_time, cron_switch, cron_expr, cron_spec,
                                   create_user, create_time, modify_user, modify_time)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(&template.template_name)
        .bind(&template.cluster_name)
        .bind(&template.description)
        .bind(template.mode.as_str())
        .bind(&template.resource)
        .bind(&template.last_job_id)
        .bind(template.last_job_time)
        .bind(template.cron.is_some())
        .bind(cron_expr)
        .bind(cron_spec)
        .bind(&template.create_user)
        .bind(template.create_time)
        .bind(&template.modify_user)
        .bind(template.modify_time)
        .execute(&mut *tx)
        .await?;
        let template_id = result.last_insert_rowid();

        Self::replace_scripts(&mut tx, template_id, scripts).await?;
        tx.commit().await?;

        debug!("创建模板 {} 成功, ID: {}", template.template_name, template_id);
        Ok(template_id)
    }

    async fn find_by_name(&self, name: &str, cluster: &str) -> InspectionResult<Option<Template>> {
        let row = sqlx::query("SELECT * FROM templates WHERE template_name = $1 AND cluster_name = $2")
            .bind(name)
            .bind(cluster)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_template).transpose()
    }

    async fn find_by_id(&self, template_id: i64) -> InspectionResult<Option<Template>> {
        let row = sqlx::query("SELECT * FROM templates WHERE template_id = $1")
            .bind(template_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_template).transpose()
    }

    async fn find_cron_enabled(&self) -> InspectionResult<Vec<Template>> {
        let rows = sqlx::query("SELECT * FROM templates WHERE cron_switch = 1 ORDER BY template_id")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::row_to_template).collect()
    }

    async fn update_basic_info(
        &self,
        name: &str,
        cluster: &str,
        info: &TemplateBasicInfo,
    ) -> InspectionResult<()> {
        let template = self
            .find_by_name(name, cluster)
            .await?
            .ok_or_else(|| Self::not_found(name, cluster))?;

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            UPDATE templates
            SET mode = $1, resource = $2, description = $3, modify_user = $4, modify_time = $5
            WHERE template_id = $6
            "#,
        )
        .bind(info.mode.as_str())
        .bind(&info.resource)
        .bind(&info.description)
        .bind(&info.modify_user)
        .bind(Utc::now())
        .bind(template.template_id)
        .execute(&mut *tx)
        .await?;

        Self::replace_scripts(&mut tx, template.template_id, &info.scripts).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn update_cron_info(
        &self,
        name: &str,
        cluster: &str,
        cron: Option<&CronSpec>,
    ) -> InspectionResult<Template> {
        let cron_spec = cron.map(serde_json::to_string).transpose()?;
        let cron_expr = cron.map(|c| c.cron_expr.clone()).unwrap_or_default();

        let result = sqlx::query(
            r#"
            UPDATE templates SET cron_switch = $1, cron_expr = $2, cron_spec = $3
            WHERE template_name = $4 AND cluster_name = $5
            "#,
        )
        .bind(cron.is_some())
        .bind(cron_expr)
        .bind(cron_spec)
        .bind(name)
        .bind(cluster)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Self::not_found(name, cluster));
        }
        self.find_by_name(name, cluster)
            .await?
            .ok_or_else(|| Self::not_found(name, cluster))
    }

    async fn update_job_info(
        &self,
        template_id: i64,
        job_id: &str,
        job_time: DateTime<Utc>,
    ) -> InspectionResult<()> {
        sqlx::query("UPDATE templates SET last_job_id = $1, last_job_time = $2 WHERE template_id = $3")
            .bind(job_id)
            .bind(job_time)
            .bind(template_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn script_names(&self, template_id: i64) -> InspectionResult<Vec<String>> {
        let rows = sqlx::query(
            "SELECT script_name FROM template_scripts WHERE template_id = $1 ORDER BY position",
        )
        .bind(template_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| row.try_get("script_name").map_err(InspectionError::from))
            .collect()
    }

    async fn delete(&self, name: &str, cluster: &str) -> InspectionResult<()> {
        let template = self
            .find_by_name(name, cluster)
            .await?
            .ok_or_else(|| Self::not_found(name, cluster))?;

        let mut tx = self.pool.begin().await?;
        Self::replace_scripts(&mut tx, template.template_id, &[]).await?;
        sqlx::query("DELETE FROM templates WHERE template_id = $1")
            .bind(template.template_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        debug!("删除模板 {} (集群: {})", name, cluster);
        Ok(())
    }
}

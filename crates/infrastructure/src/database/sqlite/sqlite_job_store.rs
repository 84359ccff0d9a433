use async_trait::async_trait;
use chrono::{DateTime, Utc};
use inspection_core::{InspectionError, InspectionResult};
use inspection_domain::entities::split_ip_list;
use inspection_domain::{Job, JobQuery, JobStatus, JobStore, Page};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use tracing::{debug, instrument};

const JOB_COLUMNS: &str = "job_id, job_name, user_name, cluster_name, is_cron, template_name, \
     template_id, ip_list, base_ip, mode, resource, status, create_time, finish_time";

pub struct SqliteJobStore {
    pool: SqlitePool,
}

impl SqliteJobStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_job(row: &sqlx::sqlite::SqliteRow) -> InspectionResult<Job> {
        let mode: String = row.try_get("mode")?;
        let status: String = row.try_get("status")?;
        let ip_list: String = row.try_get("ip_list")?;
        Ok(Job {
            job_id: row.try_get("job_id")?,
            job_name: row.try_get("job_name")?,
            user_name: row.try_get("user_name")?,
            cluster_name: row.try_get("cluster_name")?,
            is_cron: row.try_get("is_cron")?,
            template_name: row.try_get("template_name")?,
            template_id: row.try_get("template_id")?,
            ip_list: split_ip_list(&ip_list),
            base_ip: row.try_get("base_ip")?,
            mode: mode.parse()?,
            resource: row.try_get("resource")?,
            status: status.parse()?,
            create_time: row.try_get("create_time")?,
            finish_time: row.try_get("finish_time")?,
        })
    }

    fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, query: &JobQuery) {
        builder.push(" WHERE 1 = 1");
        if let Some(cluster) = &query.cluster_name {
            builder.push(" AND cluster_name = ").push_bind(cluster.clone());
        }
        if let Some(template) = &query.template_name {
            builder.push(" AND template_name = ").push_bind(template.clone());
        }
        if let Some(user) = &query.user_name {
            builder.push(" AND user_name = ").push_bind(user.clone());
        }
        if let Some(status) = query.status {
            builder.push(" AND status = ").push_bind(status.as_str());
        }
    }
}

#[async_trait]
impl JobStore for SqliteJobStore {
    #[instrument(skip(self, job), fields(job_id = %job.job_id, cluster = %job.cluster_name))]
    async fn insert(&self, job: &Job) -> InspectionResult<()> {
        sqlx::query(
            r#"
            INSERT INTO jobs (job_id, job_name, user_name, cluster_name, is_cron, template_name,
                              template_id, ip_list, base_ip, mode, resource, status, create_time, finish_time)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(&job.job_id)
        .bind(&job.job_name)
        .bind(&job.user_name)
        .bind(&job.cluster_name)
        .bind(job.is_cron)
        .bind(&job.template_name)
        .bind(job.template_id)
        .bind(job.ip_list.join(","))
        .bind(&job.base_ip)
        .bind(job.mode.as_str())
        .bind(&job.resource)
        .bind(job.status.as_str())
        .bind(job.create_time)
        .bind(job.finish_time)
        .execute(&self.pool)
        .await?;

        debug!("创建{}成功", job.entity_description());
        Ok(())
    }

    async fn find_by_id(&self, job_id: &str) -> InspectionResult<Option<Job>> {
        let row = sqlx::query(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE job_id = $1"))
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_job).transpose()
    }

    async fn find_page(&self, query: &JobQuery) -> InspectionResult<Page<Job>> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) AS total FROM jobs");
        Self::push_filters(&mut count, query);
        let total: i64 = count.build().fetch_one(&self.pool).await?.try_get("total")?;

        let mut select = QueryBuilder::<Sqlite>::new(format!("SELECT {JOB_COLUMNS} FROM jobs"));
        Self::push_filters(&mut select, query);
        select
            .push(" ORDER BY create_time DESC, id DESC LIMIT ")
            .push_bind(i64::try_from(query.page_size).unwrap_or(i64::MAX))
            .push(" OFFSET ")
            .push_bind(i64::try_from(query.offset()).unwrap_or(i64::MAX));

        let rows = select.build().fetch_all(&self.pool).await?;
        let items = rows
            .iter()
            .map(Self::row_to_job)
            .collect::<InspectionResult<Vec<_>>>()?;

        Ok(Page {
            items,
            total: u64::try_from(total).unwrap_or_default(),
        })
    }

    #[instrument(skip(self))]
    async fn update_status(
        &self,
        job_id: &str,
        status: JobStatus,
        finish_time: Option<DateTime<Utc>>,
    ) -> InspectionResult<()> {
        let result = sqlx::query(
            "UPDATE jobs SET status = $1, finish_time = COALESCE($2, finish_time) WHERE job_id = $3",
        )
        .bind(status.as_str())
        .bind(finish_time)
        .bind(job_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(InspectionError::JobNotFound {
                id: job_id.to_string(),
            });
        }
        debug!("作业 {} 状态更新为 {}", job_id, status);
        Ok(())
    }
}

use async_trait::async_trait;
use inspection_core::InspectionResult;
use inspection_domain::{TestInfo, TestRecordStore};
use sqlx::{Row, SqlitePool};
use tracing::debug;

pub struct SqliteTestRecordStore {
    pool: SqlitePool,
}

impl SqliteTestRecordStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_info(row: &sqlx::sqlite::SqliteRow) -> InspectionResult<TestInfo> {
        let result: String = row.try_get("result")?;
        Ok(TestInfo {
            job_id: row.try_get("job_id")?,
            case_name: row.try_get("case_name")?,
            healthy_num: row.try_get("healthy_num")?,
            unhealthy_num: row.try_get("unhealthy_num")?,
            critical_num: row.try_get("critical_num")?,
            unknown_num: row.try_get("unknown_num")?,
            timeout_num: row.try_get("timeout_num")?,
            total_num: row.try_get("total_num")?,
            time_cost: row.try_get("time_cost")?,
            result: result.parse()?,
        })
    }
}

#[async_trait]
impl TestRecordStore for SqliteTestRecordStore {
    async fn insert(&self, info: &TestInfo) -> InspectionResult<()> {
        sqlx::query(
            r#"
            INSERT INTO test_infos (job_id, case_name, healthy_num, unhealthy_num, critical_num,
                                    unknown_num, timeout_num, total_num, time_cost, result)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(&info.job_id)
        .bind(&info.case_name)
        .bind(info.healthy_num)
        .bind(info.unhealthy_num)
        .bind(info.critical_num)
        .bind(info.unknown_num)
        .bind(info.timeout_num)
        .bind(info.total_num)
        .bind(info.time_cost)
        .bind(info.result.as_str())
        .execute(&self.pool)
        .await?;

        debug!(
            "作业 {} 脚本 {} 执行记录已保存: {}",
            info.job_id, info.case_name, info.result
        );
        Ok(())
    }

    async fn find_by_job(&self, job_id: &str) -> InspectionResult<Vec<TestInfo>> {
        let rows = sqlx::query("SELECT * FROM test_infos WHERE job_id = $1 ORDER BY id")
            .bind(job_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::row_to_info).collect()
    }

    async fn find_by_case(&self, job_id: &str, case_name: &str) -> InspectionResult<Option<TestInfo>> {
        let row = sqlx::query(
            "SELECT * FROM test_infos WHERE job_id = $1 AND case_name = $2 ORDER BY id DESC LIMIT 1",
        )
        .bind(job_id)
        .bind(case_name)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_info).transpose()
    }
}

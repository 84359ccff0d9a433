use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use inspection_core::{InspectionError, InspectionResult};
use inspection_domain::LogSink;
use tokio::io::AsyncWriteExt;

/// 原始日志写在 `log_path/<jobId>/<脚本名>.log`
pub struct FileLogSink {
    log_path: PathBuf,
}

impl FileLogSink {
    pub fn new(log_path: impl Into<PathBuf>) -> Self {
        Self {
            log_path: log_path.into(),
        }
    }

    fn file_path(&self, job_id: &str, script_name: &str) -> PathBuf {
        self.log_path
            .join(job_id)
            .join(format!("{}.log", script_name.replace(' ', "_")))
    }
}

#[async_trait]
impl LogSink for FileLogSink {
    async fn write(
        &self,
        job_id: &str,
        script_name: &str,
        lines: &HashMap<String, String>,
    ) -> InspectionResult<()> {
        let path = self.file_path(job_id, script_name);
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }

        let mut keys: Vec<&String> = lines.keys().collect();
        keys.sort();
        let mut content = String::new();
        for key in keys {
            content.push_str(&format!("{}: {}\n", key, lines[key]));
        }

        let mut file = tokio::fs::File::create(&path).await?;
        file.write_all(content.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    async fn read(&self, job_id: &str, script_name: &str) -> InspectionResult<Vec<u8>> {
        match tokio::fs::read(self.file_path(job_id, script_name)).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(InspectionError::LogNotFound {
                job_id: job_id.to_string(),
                script: script_name.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }
}

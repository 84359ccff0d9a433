//! 脚本目录打包

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use inspection_core::{InspectionError, InspectionResult};
use inspection_domain::{ScriptArchiver, ScriptBundle};
use tracing::debug;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// 把 `script_path/<script>` 打成 `<script>.zip`
pub struct ZipScriptArchiver {
    script_path: PathBuf,
}

impl ZipScriptArchiver {
    pub fn new(script_path: impl Into<PathBuf>) -> Self {
        Self {
            script_path: script_path.into(),
        }
    }
}

fn zip_error(err: zip::result::ZipError) -> InspectionError {
    InspectionError::Internal(format!("打包脚本失败: {err}"))
}

/// 递归打包目录，条目使用相对路径
fn zip_directory(root: &Path) -> InspectionResult<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| InspectionError::Internal(format!("遍历脚本目录失败: {e}")))?;
        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| InspectionError::Internal(e.to_string()))?;
        if relative.as_os_str().is_empty() {
            continue;
        }
        let name = relative.to_string_lossy().replace('\\', "/");

        if entry.file_type().is_dir() {
            writer.add_directory(name, options).map_err(zip_error)?;
        } else {
            writer.start_file(name, options).map_err(zip_error)?;
            writer.write_all(&std::fs::read(entry.path())?)?;
        }
    }

    Ok(writer.finish().map_err(zip_error)?.into_inner())
}

#[async_trait]
impl ScriptArchiver for ZipScriptArchiver {
    async fn archive(&self, script_name: &str) -> InspectionResult<ScriptBundle> {
        let root = self.script_path.join(script_name);
        if !root.is_dir() {
            return Err(InspectionError::ScriptNotFound(script_name.to_string()));
        }

        let data = tokio::task::spawn_blocking(move || zip_directory(&root))
            .await
            .map_err(|e| InspectionError::Internal(format!("打包任务异常退出: {e}")))??;

        debug!("脚本 {} 打包完成, {} 字节", script_name, data.len());
        Ok(ScriptBundle {
            file_name: format!("{script_name}.zip"),
            data,
        })
    }
}

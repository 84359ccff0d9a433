//! 脚本目录同步
//!
//! 目录结构为 `script_path/<脚本名>/*.json`。启动时全量扫描描述文件写入脚本表，
//! 运行期间监听目录，描述文件新增或修改时覆盖，删除时按所在目录名删除脚本。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use inspection_core::{InspectionError, InspectionResult};
use inspection_domain::{JobMode, Script, ScriptStore};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// 脚本描述文件，缺省字段取空值
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ScriptDescriptor {
    name: String,
    ch_name: String,
    cluster: String,
    detail: String,
    domain: String,
    mode: String,
    category: String,
}

impl ScriptDescriptor {
    fn into_script(self, dir_name: &str) -> InspectionResult<Script> {
        let mode = if self.mode.is_empty() {
            JobMode::Regular
        } else {
            self.mode.parse()?
        };
        Ok(Script {
            case_id: 0,
            name: if self.name.is_empty() {
                dir_name.to_string()
            } else {
                self.name
            },
            ch_name: self.ch_name,
            cluster: self.cluster,
            detail: self.detail,
            domain: self.domain,
            mode,
            category: self.category,
        })
    }
}

fn is_descriptor(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "json")
}

/// 描述文件所在目录名即脚本名
fn script_dir_name(path: &Path) -> Option<String> {
    path.parent()
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
}

fn collect_descriptors(root: &Path) -> InspectionResult<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(InspectionError::Configuration(format!(
            "脚本目录不存在: {}",
            root.display()
        )));
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        match entry {
            Ok(entry) if entry.file_type().is_file() && is_descriptor(entry.path()) => {
                files.push(entry.into_path());
            }
            Ok(_) => {}
            Err(err) => warn!("遍历脚本目录出错: {}", err),
        }
    }
    Ok(files)
}

pub struct ScriptCatalog {
    root: PathBuf,
    store: Arc<dyn ScriptStore>,
}

impl ScriptCatalog {
    pub fn new(root: impl Into<PathBuf>, store: Arc<dyn ScriptStore>) -> Self {
        Self {
            root: root.into(),
            store,
        }
    }

    /// 扫描全部描述文件写入脚本表，返回成功写入的数量。单个文件失败只记录日志
    pub async fn scan(&self) -> InspectionResult<usize> {
        let root = self.root.clone();
        let files = tokio::task::spawn_blocking(move || collect_descriptors(&root))
            .await
            .map_err(|e| InspectionError::Internal(format!("扫描脚本目录失败: {e}")))??;

        let mut loaded = 0;
        for path in &files {
            if self.upsert_file(path).await {
                loaded += 1;
            }
        }
        info!(
            "脚本目录 {} 扫描完成，写入 {}/{} 个脚本",
            self.root.display(),
            loaded,
            files.len()
        );
        Ok(loaded)
    }

    /// 读取并解析一个描述文件
    pub async fn load_descriptor(&self, path: &Path) -> InspectionResult<Script> {
        let content = tokio::fs::read(path).await?;
        let descriptor: ScriptDescriptor = serde_json::from_slice(&content)?;
        let dir_name = script_dir_name(path).unwrap_or_default();
        descriptor.into_script(&dir_name)
    }

    async fn upsert_file(&self, path: &Path) -> bool {
        let script = match self.load_descriptor(path).await {
            Ok(script) => script,
            Err(err) => {
                warn!("解析脚本描述文件 {} 失败: {}", path.display(), err);
                return false;
            }
        };
        match self.store.insert(&script).await {
            Ok(case_id) => {
                debug!("脚本 {} 已同步，case_id {}", script.name, case_id);
                true
            }
            Err(err) => {
                warn!("写入脚本 {} 失败: {}", script.name, err);
                false
            }
        }
    }

    async fn remove_file(&self, path: &Path) {
        let Some(name) = script_dir_name(path) else {
            return;
        };
        match self.store.delete_by_name(&name).await {
            Ok(true) => info!("描述文件 {} 已删除，移除脚本 {}", path.display(), name),
            Ok(false) => debug!("脚本 {} 不在脚本表中", name),
            Err(err) => warn!("删除脚本 {} 失败: {}", name, err),
        }
    }

    /// 处理一个目录变更事件
    pub async fn apply(&self, event: &Event) {
        let removed = matches!(event.kind, EventKind::Remove(_));
        if !removed && !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
            return;
        }

        for path in event.paths.iter().filter(|p| is_descriptor(p)) {
            // 重命名移走的文件以 Modify 事件出现，按文件是否还在判断
            let exists = !removed
                && tokio::fs::metadata(path)
                    .await
                    .map(|m| m.is_file())
                    .unwrap_or(false);
            if exists {
                self.upsert_file(path).await;
            } else {
                self.remove_file(path).await;
            }
        }
    }

    /// 递归监听脚本目录直到取消
    pub async fn watch(&self, shutdown: CancellationToken) -> InspectionResult<()> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = tx.send(res);
        })
        .map_err(watch_error)?;
        watcher
            .watch(&self.root, RecursiveMode::Recursive)
            .map_err(watch_error)?;
        info!("开始监听脚本目录 {}", self.root.display());

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                received = rx.recv() => match received {
                    Some(Ok(event)) => self.apply(&event).await,
                    Some(Err(err)) => warn!("脚本目录监听出错: {}", err),
                    None => break,
                }
            }
        }
        info!("脚本目录监听已停止");
        Ok(())
    }
}

fn watch_error(err: notify::Error) -> InspectionError {
    InspectionError::Internal(format!("监听脚本目录失败: {err}"))
}

//! 配置管理
//!
//! 加载顺序：默认值 -> TOML 配置文件 -> 环境变量（前缀 `INSPECTION`，层级分隔符 `__`）。

pub mod models;

pub use models::*;

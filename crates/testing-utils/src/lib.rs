//! # Inspection Testing Utils
//!
//! 测试共用的手写 mock 和数据构造器。
//!
//! ```toml
//! [dev-dependencies]
//! inspection-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod mocks;
pub mod stores;

pub use builders::*;
pub use mocks::*;
pub use stores::*;

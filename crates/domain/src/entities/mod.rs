pub mod check_result;
pub mod job;
pub mod task_record;
pub mod template;
pub mod test_info;

pub use check_result::*;
pub use job::*;
pub use task_record::*;
pub use template::*;
pub use test_info::*;

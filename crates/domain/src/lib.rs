pub mod entities;
pub mod ports;
pub mod repositories;

pub use entities::*;
pub use inspection_core::{InspectionError, InspectionResult};
pub use ports::*;
pub use repositories::*;

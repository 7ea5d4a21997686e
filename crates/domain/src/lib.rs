pub mod entities;
pub mod ports;
pub mod value_objects;

pub use entities::*;
pub use musim_errors::{SimError, SimResult};
pub use ports::*;
pub use value_objects::*;

pub mod app_config;
pub mod discovery;
pub mod logging;
pub mod node;
pub mod workload;

pub use app_config::*;
pub use discovery::*;
pub use logging::*;
pub use node::*;
pub use workload::*;

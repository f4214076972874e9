pub mod config;
pub mod controller;
pub mod counters;
pub mod error;
pub mod executor;
pub mod orchestrator;
pub mod pool;
pub mod report;
pub mod sampler;
pub mod ticker;
pub mod vu;
pub mod warmup;

pub use config::*;
pub use controller::*;
pub use counters::*;
pub use error::*;
pub use executor::*;
pub use orchestrator::*;
pub use pool::*;
pub use report::*;
pub use sampler::*;
pub use ticker::*;
pub use vu::*;
pub use warmup::*;

pub mod config;
pub mod http;
pub mod notify;
pub mod pipeline;
pub mod report;

pub use config::AppContext;

pub mod executor;
pub mod model;
pub mod monitor;
pub mod report;
pub mod runner;
pub mod store;
pub mod vars;

// Re-export common items
pub use executor::ExecutorRegistry;
pub use report::{generate_report, ResultAggregator};
pub use runner::run_suite;
pub use vars::VariableContext;

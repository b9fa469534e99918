pub mod aggregate;
pub mod cache;
pub mod dashboard;
pub mod timeseries;
pub mod window;

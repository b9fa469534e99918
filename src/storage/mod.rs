pub mod migrations;
pub mod schema;
pub mod store;
pub mod visit_log;

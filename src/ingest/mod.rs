pub mod handler;
pub mod session_id;

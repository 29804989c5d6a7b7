pub mod capture_session;
pub mod controller;
pub mod device_catalog;
pub mod publisher;
mod signal_path;

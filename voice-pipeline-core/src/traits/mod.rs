pub mod capture_backend;
pub mod notification_sink;
pub mod pipeline_observer;
pub mod settings_store;
pub mod transport;

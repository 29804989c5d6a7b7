pub mod config;
pub mod constraints;
pub mod device;
pub mod error;
pub mod levels;
pub mod stage;
pub mod state;

pub mod attendance;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod fetch;
pub mod grades;
pub mod ids;
pub mod ipc;
pub mod model;
pub mod provision;
pub mod store;
pub mod students;

pub use error::{CoreError, CoreResult};

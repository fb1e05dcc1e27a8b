pub mod attendance;
pub mod catalog;
pub mod core;
pub mod semesters;
pub mod setup;
pub mod students;

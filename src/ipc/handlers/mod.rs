pub mod core;
pub mod courses;
pub mod setup;
pub mod structure;

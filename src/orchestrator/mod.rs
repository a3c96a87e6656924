//! Session lifecycle operations: status resolution, restoration, and the
//! caller-facing facade.

pub mod restore;
pub mod runner;
pub mod session_manager;
pub mod status;

//! Domain model types.

pub mod session;

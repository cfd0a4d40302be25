pub mod config;
pub mod gate;
pub mod probe;
pub mod session;

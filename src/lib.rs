pub mod communication;
pub mod config;
pub mod control_system;
pub mod devices;
pub mod global_variables;

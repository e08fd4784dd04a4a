pub mod app;
pub mod cli;
pub mod config;
pub mod global;
pub mod meter;
pub mod rate;

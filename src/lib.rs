pub mod api;
pub mod cli;
pub mod config;
pub mod dashboard;
pub mod logs;
pub mod rules;
pub mod tracing_init;
pub mod tui;

pub mod config;
pub mod interaction;
pub mod report;

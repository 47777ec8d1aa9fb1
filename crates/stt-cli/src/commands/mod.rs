//! CLI subcommand implementations.

pub mod courses;
pub mod export;
pub mod import;
pub mod init;
pub mod reset;
pub mod run;
pub mod settings;
pub mod status;
pub mod today;

pub mod check;
pub mod config;
pub mod hook;
pub mod init;
pub mod report;
pub mod status;
pub mod toggle;

pub mod cache;
pub mod chain;
pub mod config;
pub mod decision;
pub mod feeds;
pub mod guard;
pub mod init;
pub mod logger;
pub mod sanitize;
pub mod scoring;
pub mod stats;

pub mod cache;
pub mod config;
pub mod content;
pub mod i18n;
pub mod metrics;
pub mod retry;
pub mod security;
pub mod server;
pub mod webhook;

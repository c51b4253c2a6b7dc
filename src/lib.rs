pub mod api;
pub mod archive;
pub mod config;
pub mod http;
pub mod humanize;
pub mod marks;
pub mod observability;
pub mod plugins;
pub mod scheduler;

//! Library entry points for the `ncd-classify` command-line front-end.

pub mod app;
pub mod config;

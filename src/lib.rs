#![forbid(unsafe_code)]

pub mod apogee;
pub mod app;
pub mod catalog;
pub mod cli;
pub mod commands;
pub mod config;
pub mod fetch;
pub mod filter;
pub mod logging;
pub mod model;
pub mod normalize;
pub mod store;

#![forbid(unsafe_code)]

pub mod breadcrumb;
pub mod classify;
pub mod cli;
pub mod config;
pub mod download;
pub mod driver;
pub mod error;
pub mod events;
pub mod formats;
pub mod http_driver;
pub mod inspect;
pub mod leaf;
pub mod logging;
pub mod media;
pub mod normalize;
pub mod orchestrator;
pub mod report;
pub mod session;
pub mod tree;

//! Crawler console: monitors and controls the crawlers of a process through
//! its management API.

pub mod config;
pub mod console;
pub mod crawler;
pub mod error;

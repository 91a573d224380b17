//! Upload files, screenshots, clipboard contents and URLs to configurable
//! sharing sites.

#[deny(unused_imports)]
#[deny(unused_variables)]
#[deny(unused_mut)]
#[deny(unsafe_code)]
// Dependencies
#[macro_use]
extern crate log;

pub mod client_builder;
pub mod collaborators;
pub mod config;
pub mod dispatch;
pub mod errors;
pub mod executor;
pub mod history;
pub mod log_setup;
pub mod output;
pub mod paths;
pub mod payload;
pub mod plugins;
pub mod serde_types;
pub mod sniff;
pub mod template;

#[cfg(test)]
mod test_util;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

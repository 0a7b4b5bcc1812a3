#![deny(unsafe_code)]
//! # solmut-cli
//!
//! Interactive driver for the mutant search engine. Requests arrive as JSON
//! lines on stdin, answers leave as JSON lines on stdout, and every produced
//! mutant is written to the output directory as `<n>.sol`.

pub mod config;
pub mod driver;
pub mod protocol;
pub mod session;
pub mod tools;

pub use config::SolmutConfig;
pub use protocol::{Request, Response};
pub use session::{OutputOptions, Session};

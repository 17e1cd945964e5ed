//! mysql-probe - run MySQL queries against servers under test.
//!
//! A `MysqlQueryContext` resolves a server's MySQL options, opens a tunnel to
//! its MySQL port through the server's gateway and returns the driver's result
//! for whatever assertions the caller makes.

pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod output;

pub use context::{MysqlQuery, MysqlQueryContext};
pub use error::{ProbeError, Result};

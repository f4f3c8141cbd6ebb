pub mod error;
pub mod request;
pub mod rest;
pub mod xmlrpc;
pub mod xmlutil;

pub use error::{Error, Result};

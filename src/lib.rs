#![allow(clippy::module_name_repetitions)]

//! Multi-protocol blog publishing client: a uniform contract over AtomPub,
//! Blogger-compatible XML-RPC, LiveJournal and the Google Blogger v3 REST
//! API, plus service detection that maps a homepage URL to a usable account.

#[macro_use]
extern crate serde_derive;

pub use quill_common::{Error, Result};

pub mod authors;
pub mod blog;
pub mod blogs;
pub mod categories;
pub mod clients;
pub mod credentials;
pub mod detection;
pub mod options;
pub mod pages;
pub mod posts;
pub mod providers;

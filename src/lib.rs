// TEMPORARY, see diesel-rs/diesel#1787.
#![allow(proc_macro_derive_resolution_fallback)]

#[macro_use] extern crate bitflags;
#[macro_use] extern crate diesel;
#[macro_use] extern crate lazy_static;
#[macro_use] extern crate log;
#[macro_use] extern crate serde_derive;
#[macro_use] extern crate tera;

#[cfg(not(debug_assertions))]
#[macro_use]
extern crate diesel_migrations;

pub use self::cli::main;

pub(crate) use self::config::Config;

#[macro_use] mod macros;

pub mod cli;
pub mod config;
pub mod db;
pub mod mail;
pub mod models;
pub mod moderation;
pub mod permissions;
pub mod publisher;
pub mod search;
pub mod templates;
pub mod utils;

pub type Result<T, E=failure::Error> = std::result::Result<T, E>;

//! gator: a personal RSS aggregator.
//!
//! Users register and log in locally, add and follow RSS feeds, and run
//! `gator agg` to collect posts one feed at a time, least recently fetched
//! first. `gator browse` shows the newest posts from followed feeds.
//!
//! The binary is a thin shell over this library: it loads [`config::Config`],
//! opens [`storage::Database`], builds an [`app::App`] and hands the parsed
//! command to [`commands::run`].

pub mod app;
pub mod commands;
pub mod config;
pub mod feed;
pub mod storage;
pub mod util;

//! Kumara: live reload for compiled programs
//!
//! Watches a directory tree, rebuilds the program whenever one of its source
//! files changes, and keeps exactly one instance of the freshly built program
//! running, killing the old one before starting the new.
//!
//! The binary is a thin wrapper: [`cli`] turns arguments into a
//! [`config::Config`], and [`run()`] does the rest. [`run::Kumara`] exposes the
//! individual steps of the loop.

#![deny(unsafe_code)]
#![allow(clippy::default_trait_access, clippy::cognitive_complexity)]

#[macro_use]
extern crate clap;
#[macro_use]
extern crate derive_builder;
#[macro_use]
extern crate log;

pub mod builder;
pub mod classify;
pub mod cli;
pub mod config;
pub mod error;
pub mod event;
pub mod process;
pub mod registry;
pub mod run;
mod signal;
pub mod walk;
mod watcher;

pub use run::run;

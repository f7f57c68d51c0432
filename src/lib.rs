//! Configuration backup engine.
//!
//! Archives configuration directories (shell, editor, package-manager
//! state) and keeps one copy of each on a fixed remote server, reachable
//! over SFTP or mounted as a plain directory. Restores move the live
//! directory aside to `<dir>.bak` before unpacking.
//!
//! The public API is organised into four layers:
//!
//! - **[`archive`]** and **[`transport`]**: the tar.gz/zip codecs and the
//!   remote stores
//! - **[`pipeline`]**: per-component backup and restore built from those two
//! - **[`components`]** and **[`config`]**: what to back up and where to send it
//! - **[`commands`]**: top-level subcommand orchestration (`backup`, `apply`, `list`)
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod archive;
pub mod cli;
pub mod commands;
pub mod components;
pub mod config;
pub mod error;
pub mod exec;
pub mod fsutil;
pub mod logging;
pub mod pipeline;
pub mod platform;
pub mod transport;

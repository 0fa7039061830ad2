#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]

pub mod client;
pub mod codec;
pub mod config;
pub mod connection;
pub mod download;
pub mod error;
pub mod target;
pub mod transfer;

pub use client::{Fetched, RemoteClient, Status, TransferMode};
pub use config::Config;
pub use error::{ErrorKind, ProtocolError, Result, TransferError};
pub use target::{ConnectionTarget, Scheme};

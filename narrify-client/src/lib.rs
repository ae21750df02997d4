//! Narrify client: session and query-cache synchronization core.
//!
//! The pieces, leaves first: [`session::SessionStore`] owns who is logged
//! in and fires [`auth_bus::AuthEventBus`] on every change;
//! [`cache::QueryCache`] holds server data by key; [`debounce`] turns typing
//! into key changes; [`mutation::MutationExecutor`] writes and invalidates.
//! [`consumers`] are the surfaces built on top.

pub mod api_client;
pub mod app;
pub mod auth_bus;
pub mod auth_flow;
pub mod cache;
pub mod commands;
pub mod config;
pub mod consumers;
pub mod debounce;
pub mod error;
pub mod events;
pub mod logging;
pub mod mutation;
pub mod notifications;
pub mod persistence;
pub mod session;
pub mod session_watch;

pub use app::{AppContext, ConsumerSettings};
pub use error::{ClientError, ErrorKind};

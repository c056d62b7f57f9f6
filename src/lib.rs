//! cartsync
//!
//! Client-side shopping cart reconciliation: one authoritative cart per
//! session, guest-local and authenticated-remote modes, write-through
//! local persistence, and serialized mutations whose failures leave the
//! prior cart intact.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod catalog;
pub mod config;
pub mod errors;
pub mod events;
pub mod gateway;
pub mod logging;
pub mod models;
pub mod notifications;
pub mod services;
pub mod storage;

pub use catalog::{InMemoryCatalog, ProductCatalog};
pub use config::CartConfig;
pub use errors::{CartError, GatewayError, StorageError};
pub use events::{Event, EventSender};
pub use gateway::{CartGateway, HttpCartGateway, StaticToken, TokenProvider};
pub use models::{Cart, CartItem, CartProduct, CartStatus};
pub use notifications::{InMemoryNotifier, Notification, NotificationKind, Notifier};
pub use services::{AuthState, CartHandle, CartReconciler, CartReconcilerBuilder, OperationFlags};
pub use storage::{generate_guest_id, CartStore, FileStore, MemoryStore};

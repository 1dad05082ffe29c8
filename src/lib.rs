//! Scholarix client core.
//!
//! DESIGN
//! ======
//! The realtime layer is the heart of the crate: one [`transport::Transport`]
//! per process, wrapped by a [`realtime::Connection`] handle that feature
//! handles subscribe through. The REST client, AI coach, local store and
//! call simulation are independent leaves that share only [`config`] and
//! the [`auth::TokenStore`] seam.

pub mod api;
pub mod auth;
pub mod coach;
pub mod config;
pub mod envelope;
pub mod realtime;
pub mod simulation;
pub mod storage;
pub mod transport;

pub use config::Config;
pub use envelope::{Envelope, MessageKind, OutboundMessage};
pub use realtime::Connection;
pub use transport::{ConnectionStatus, Transport, TransportError};

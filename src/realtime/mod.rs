//! Realtime channel handles.
//!
//! DESIGN
//! ======
//! [`Connection`] is constructed once by the application root and cloned
//! into whatever needs the channel; there is no global. Feature handles
//! ([`Presence`], [`Notifications`], [`CallUpdates`], [`LeadUpdates`],
//! [`CallSignaling`]) each own one [`Subscription`] and a small piece of
//! derived state exposed through `tokio::sync::watch`. Dropping a feature
//! handle releases only its subscription; the shared connection stays up
//! until [`Connection::disconnect`] is called.

pub mod broadcast;
pub mod calls;
pub mod connection;
pub mod leads;
pub mod notifications;
pub mod presence;
pub mod subscription;

pub use broadcast::Broadcaster;
pub use calls::{CallEvent, CallEventKind, CallSignaling, CallUpdates, Signal, SignalKind};
pub use connection::Connection;
pub use leads::{LeadEvent, LeadEventKind, LeadUpdates};
pub use notifications::{MAX_NOTIFICATIONS, Notification, Notifications};
pub use presence::Presence;
pub use subscription::{KindFilter, Subscription};

// =============================================================================
// TEST HELPERS
// =============================================================================

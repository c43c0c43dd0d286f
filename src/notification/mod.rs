//! Core notification domain types.
//!
//! A [`Notification`] is the unit of work this service tracks: one domain
//! event addressed to one user, carrying the context values its template
//! needs. The record moves through the [`NotificationStatus`] lifecycle as
//! delivery attempts complete.

mod types;

pub use types::{EventType, Notification, NotificationStatus, UnknownEventType};

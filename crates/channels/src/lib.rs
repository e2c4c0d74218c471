//! Platform dispatch seam.
//!
//! Each messaging platform (WhatsApp, Instagram, email) implements
//! [`PlatformSender`]. The queue and the webhook ingestor only ever talk to a
//! [`SenderRegistry`] keyed by [`courier_common::Platform`], and every adapter
//! failure is normalized into a [`SendOutcome`].

pub mod error;
pub mod inbound;
pub mod registry;
pub mod sender;

pub use {
    error::{DispatchError, Error, Result},
    inbound::{InboundEvent, ProfileLookup},
    registry::SenderRegistry,
    sender::{
        IntegrationLookup, OutboundMessage, PlatformSender, Receipt, SendOutcome,
        active_integration, require_credential,
    },
};

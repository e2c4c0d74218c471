//! Email dispatch.
//!
//! [`EmailSender`] is the platform-level [`courier_channels::PlatformSender`];
//! it resolves the owner's sender address and hands the message to one
//! [`EmailProvider`] chosen at startup.

pub mod provider;
pub mod resend;
pub mod sender;
pub mod smtp;

pub use {
    provider::{Email, EmailProvider},
    resend::ResendProvider,
    sender::{DEFAULT_SUBJECT, EmailSender},
    smtp::{SmtpProvider, SmtpSettings},
};

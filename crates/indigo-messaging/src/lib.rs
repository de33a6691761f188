//! Indigo Messaging: authenticated and anonymous encryption of arbitrary
//! payloads for one or more DID-keyed recipients.

pub mod channel;
pub mod envelope;
pub mod error;

pub use channel::{SecureChannel, UnpackedMessage};
pub use envelope::{Envelope, PackAlgorithm, ProtectedHeader, Recipient, RecipientHeader};
pub use error::MessagingError;

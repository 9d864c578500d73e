//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request (body buffered):
//!     → spam.rs (match known abuse signatures, 403 on hit)
//!     → headers.rs (strip hop-by-hop, add X-Forwarded-*)
//!     → Forward to origin
//!
//! Origin response:
//!     → headers.rs (strip hop-by-hop)
//!     → Relay to client
//! ```
//!
//! # Design Decisions
//! - Spam decisions happen before any byte reaches the origin
//! - Only a trusted upstream header can override the peer address

pub mod headers;
pub mod spam;

pub use spam::{ParsedBody, SpamFilter, SpamSignature, Verdict};

//! Data models for the admin platform.
//!
//! These mirror the backend's JSON payloads; keyed envelopes stay crate-private.

mod apikey;
mod invoice;
mod payment;
mod product;
mod sale;
mod stats;
mod ticket;
mod user;

pub use apikey::*;
pub use invoice::*;
pub use payment::*;
pub use product::*;
pub use sale::*;
pub use stats::*;
pub use ticket::*;
pub use user::*;

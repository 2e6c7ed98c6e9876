//! Networking for the auth core.
//!
//! SYSTEM CONTEXT
//! ==============
//! `api` authorizes and classifies REST calls, `transport` is the HTTP seam
//! underneath it, and `error` is the normalized failure type.

pub mod api;
pub mod error;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

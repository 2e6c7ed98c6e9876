//! Client-side auth state.
//!
//! SYSTEM CONTEXT
//! ==============
//! `storage` abstracts the browser media, `token_store` owns the credential
//! cookies, and `session` is the observable record views subscribe to.

pub mod session;
pub mod storage;
pub mod token_store;

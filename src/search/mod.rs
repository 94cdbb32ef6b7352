//! Search endpoint plumbing: basic-auth headers, the HTTP transport, and
//! response parsing.

pub mod auth;
pub mod client;
pub mod response;

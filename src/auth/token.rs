//! Access tokens issued by identity providers and the user tokens they are exchanged for.

pub mod access;
pub mod secret;
pub mod user;

//! deskgate - request authorization for a helpdesk API.
//!
//! Every protected request is identified from its credential, admitted by a
//! per-identity token bucket, checked against the credential's scopes, and
//! finally checked against the group permissions that govern the ticket or
//! queue it touches.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod http;
pub mod metrics;
pub mod permissions;
pub mod scopes;
pub mod security;

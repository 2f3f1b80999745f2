//! Integration test common infrastructure.
//!
//! Builds the full router over a fresh in-memory database, seeds a small
//! helpdesk, and drives requests through `tower::ServiceExt::oneshot`.

pub mod app;
pub mod world;

#[allow(unused_imports)]
pub use app::{TestApp, TestResponse};
#[allow(unused_imports)]
pub use world::World;

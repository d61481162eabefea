//! Playforge API — the HTTP shell over the coordination core.
//!
//! Routes are thin producers and consumers: they publish events onto the
//! bus or read committed state, and the standing reactions in
//! `playforge-runtime` do the rest.

pub mod error;
pub mod routes;
pub mod state;

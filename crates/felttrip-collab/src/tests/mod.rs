//! Unit tests for the collaboration core using real in-memory SQLite
//! storage and the in-memory event bus.

mod common;
mod invites;
mod sync_flow;

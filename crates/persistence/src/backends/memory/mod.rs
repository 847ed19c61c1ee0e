//! In-memory backend.
//!
//! A self-contained partition engine for embedded use and tests. It keeps the
//! same catalog semantics as the PostgreSQL backend (global relation names,
//! list bounds, partition constraints, per-partition unique keys) and can be
//! told to fail a given step kind with [`MemoryBackend::fail_at`].

mod backend;
mod state;

pub use backend::{MemoryBackend, MemoryTransaction};

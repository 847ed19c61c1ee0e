//! Partition engine implementations.
//!
//! | Backend | Feature | Description |
//! |---------|---------|-------------|
//! | Memory | `memory` | In-process engine for embedded use and tests |
//! | PostgreSQL | `postgres` | Declarative list partitioning over deadpool-postgres |

#[cfg(feature = "memory")]
pub mod memory;

#[cfg(feature = "postgres")]
pub mod postgres;

//! Storage layer for orders, sagas, outbox entries and idempotency keys.
//!
//! The [`Store`] trait exposes reads plus a single atomic [`UnitOfWork`]
//! commit. Everything a request needs to persist together (order writes,
//! saga writes, outbox entries) goes into one unit of work so it lands
//! all-or-nothing. Two implementations are provided: [`InMemoryStore`]
//! for tests and local runs, [`PostgresStore`] for production.

mod error;
mod memory;
mod postgres;
mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use store::{Store, UnitOfWork};

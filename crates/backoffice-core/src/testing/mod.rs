//! Testing utilities for code that talks to Postgres.
//!
//! Tests run against a real database rather than mocks. The database is
//! never picked up implicitly: see [`TestDatabase::from_env`].

pub mod db;

pub use db::{IsolatedSchema, TestDatabase};

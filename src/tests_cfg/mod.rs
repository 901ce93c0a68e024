//! Shared test fixtures.

pub mod entities;

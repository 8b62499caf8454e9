//! Shared fixtures for tests that need a live Postgres.

mod postgres;

pub use postgres::{TEST_DATABASE_URL_ENV, postgres_setup};

//! Common library for the places backend
//!
//! This crate provides shared functionality used by the ownership core and
//! the HTTP service: PostgreSQL pool configuration, connectivity checks and
//! the database error type.

pub mod database;
pub mod error;

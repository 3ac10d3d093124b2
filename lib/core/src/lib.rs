//! Core domain types and utilities for the registrar console.
//!
//! This crate provides the foundational types shared by the session,
//! transport, and listing crates of the student-records administration
//! console.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{ParseIdError, RecordId};

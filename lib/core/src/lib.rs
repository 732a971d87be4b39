//! Core domain types and utilities for the proctor grading platform.
//!
//! This crate provides the identifier types and error handling foundation
//! shared by the session, authorization, and server crates.

pub mod error;
pub mod id;

pub use error::{Result, StorageError};
pub use id::{ContestId, GroupId, ParseIdError, SubmissionId, TaskId, UserId};

//! Fixloop - a resumable build-fix loop between an AI chat surface and CI
//!
//! The engine waits for the assistant's answer, materializes it, triggers a
//! build, and on failure feeds the error logs back as a corrective prompt,
//! until the build passes or a retry ceiling is hit. Every phase is
//! checkpointed so a restarted process continues where the last one stopped.

pub mod domain;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod observer;
pub mod storage;
pub mod wait;

pub use error::{FixloopError, Result};

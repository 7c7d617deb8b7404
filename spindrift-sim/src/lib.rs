//! Spindrift simulation backend - deterministic content source for tests and development.
//!
//! Provides [`InMemorySource`], a [`spindrift_core::ContentSource`] that
//! holds job data entirely in memory with per-piece completion flags the
//! test or dev harness controls directly. With an [`AssemblyProfile`]
//! attached, ingested jobs resolve metadata and complete pieces on a
//! timer, so the full streaming path can be exercised without any real
//! acquisition backend.

pub mod source;

pub use source::{AssemblyProfile, InMemorySource};

//! Core types and the recurrence engine for the Perennial planner.
//!
//! The engine pipeline (align → expand → exceptions → merge) is pure and
//! synchronous and performs no I/O. Storage backends implement
//! [`store::EventStore`].

pub mod agenda;
pub mod align;
mod calendar;
pub mod error;
pub mod event;
pub mod exceptions;
pub mod expand;
pub mod rule;
pub mod split;
pub mod store;
pub mod window;

pub use error::{Error, Result};

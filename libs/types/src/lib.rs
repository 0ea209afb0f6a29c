//! Types library for the location tracker
//!
//! Shared between the persistence layer and the tracker service so that the
//! on-disk record and the JSON wire shape come from a single definition.
//!
//! # Modules
//! - `location`: Reported position (`LocationUpdate`) and persisted record (`Entry`)

pub mod location;

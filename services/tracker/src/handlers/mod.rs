pub mod fallback;
pub mod location;
pub mod stats;

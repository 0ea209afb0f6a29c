//! Persistence: Durable entry store for the location tracker
//!
//! Provides append-only journal writing, sequential reading with corruption
//! detection, crash recovery of the timestamp index, and the `EntryStore`
//! used by the tracker service.
//!
//! # Layout
//! - `journal`: framed, CRC32C-checked records and the append-only writer
//! - `reader`: sequential scan and random-access reads
//! - `recovery`: index rebuild and torn-tail repair on open
//! - `store`: `EntryStore` trait and the journal-backed `JournalStore`

pub mod journal;
pub mod reader;
pub mod recovery;
pub mod store;

pub use journal::{FsyncPolicy, JournalConfig};
pub use recovery::RecoveryReport;
pub use store::{EntryStore, JournalStore, StoreError};

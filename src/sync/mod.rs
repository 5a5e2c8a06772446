mod synchronizer;

pub use synchronizer::{SyncReport, Synchronizer};

mod service;

pub use service::{CycleOutcome, IngestService};

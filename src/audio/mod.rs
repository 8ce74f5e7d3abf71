// Audio module - source file probing

pub mod probe;

pub use probe::{format_duration, probe_source, SourceInfo};

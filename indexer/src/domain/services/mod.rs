pub mod report_tracker;
pub mod sequence_builder;
pub mod summarizer;
pub mod syncable_tracker;
pub mod system_event_detector;

// Re-export services for direct imports
pub use report_tracker::{ReportTracker, RunTally};
pub use sequence_builder::BuiltSequences;
pub use syncable_tracker::SyncableTracker;
pub use system_event_detector::DetectionContext;

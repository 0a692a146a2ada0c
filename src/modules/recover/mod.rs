pub mod backends;
pub mod decoder;
pub mod extraction;
pub mod locator;
pub mod model;
pub mod pipeline;
pub mod reconstruct;
pub mod report;
pub mod resolver;
pub mod rules;
pub mod scorer;
pub mod screening;
pub mod symbols;

#[cfg(test)]
mod tests_pipeline;

pub use backends::{BackendBinary, BinwalkBackend, ExtractionBackend};
pub use extraction::{ExtractionOutcome, run_extraction};
pub use model::{
    BlobDir, CandidateScore, CandidateSource, Endian, EntryMap, RecoveryReport,
    ReconstructionSummary, TableCandidate, TableFormat, ToolInvocation,
};
pub use pipeline::{RecoverOptions, run, run_on_extraction, save_report};
pub use report::SegmentReport;
pub use resolver::{OffsetResolver, Resolution, TrialOutcome, TrialRecord};
pub use rules::RecoverRules;

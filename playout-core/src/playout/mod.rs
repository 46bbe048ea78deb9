pub mod error;
pub mod records;
pub mod resume;
pub mod sequencer;

pub use error::{RecordError, RecordResult};
pub use records::{DetailsRecord, PlayoutEntry, RecordStore, RunDirectories};
pub use resume::{apply_resume, details_diff, detect_resume, ResumeDecision};
pub use sequencer::{ProgramSequencer, ResumeAnchor, SequencedProgram, Sequence};

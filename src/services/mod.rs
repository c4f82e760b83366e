pub mod approval;
pub use approval::{ApprovalDialog, ApprovalError, DialogChoice};

pub mod console;
pub use console::{ApprovalResult, Console, ConsoleSettings};

pub mod records;
pub use records::{RecordListSnapshot, RecordTable, RecordsError, SelectionChange};

pub mod submission;
pub use submission::{FormState, SubmissionError, SubmissionPhase, apply_record_snapshot};

pub mod tracker;
pub use tracker::{TrackerContext, TrackerHandle};

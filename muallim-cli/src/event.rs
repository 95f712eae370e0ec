use crossterm::event::Event as TermEvent;
use muallim_core::{AnswerError, ReviewError, ReviewStats, SubmissionController};
use uuid::Uuid;

/// Unified event type for the main loop.
pub enum AppEvent {
    Terminal(TermEvent),
    /// A submission settled; the controller comes back with the outcome
    /// already appended to its log.
    TurnDone {
        controller: Box<SubmissionController>,
        outcome: Result<(), AnswerError>,
    },
    /// A review submission settled.
    ReviewDone {
        entry_id: Uuid,
        result: Result<(), ReviewError>,
    },
    /// The review statistics fetch settled.
    StatsDone(Result<ReviewStats, ReviewError>),
    Tick,
    Quit,
}

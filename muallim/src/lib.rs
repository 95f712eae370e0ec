//! Core of the muallim tutoring assistant: the conversation model, the
//! submission lifecycle, math-aware reply segmentation, and the HTTP
//! client for the answering and review services. Front-ends (the terminal
//! app, headless runs) sit on top of this crate and stay free of wire
//! concerns.

pub mod controller;
pub mod conversation;
pub mod messages;
pub mod segment;
pub mod service;

// Re-exports
pub use controller::{
    MAX_IMAGE_BYTES, PendingInput, PreparedSubmission, RequestState, StagedFile, StagedImage,
    SubmissionController, ValidationError,
};
pub use conversation::{ConversationEntry, ConversationLog, Role};
pub use segment::{Fragment, rejoin, segment};
pub use service::{
    Answer, AnswerError, AnswerService, HttpTutorClient, ImagePayload, ReviewError, ReviewRequest,
    ReviewService, ReviewStats,
};

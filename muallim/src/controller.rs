//! Owns the submission lifecycle: staging input, validating images,
//! and running the ask-and-append flow against an [`AnswerService`].
//!
//! Submission is two-phase. [`SubmissionController::begin_submit`] runs
//! synchronously: it appends the user's entry, clears the pending input,
//! and flips the request state to `Sending` before any I/O happens, so the
//! learner sees their question immediately and a second submit attempt
//! finds the gate closed. [`SubmissionController::finish_submit`] then
//! performs the request and appends exactly one assistant entry, success
//! or failure. Never reorder the phases.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::conversation::{ConversationEntry, ConversationLog, Role};
use crate::messages;
use crate::service::{AnswerError, AnswerService, ImagePayload};

/// Images above this many bytes are refused before upload.
pub const MAX_IMAGE_BYTES: u64 = 10 * 1024 * 1024;

/// Concrete media types the backend accepts. Checked after the broader
/// `image/` prefix test, case-insensitively.
const ACCEPTED_IMAGE_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
];

// ── Staged input ───────────────────────────────────────────────────

/// A file the learner picked, described but not yet read or validated.
#[derive(Clone, Debug)]
pub struct StagedFile {
    pub path: PathBuf,
    pub file_name: String,
    pub media_type: String,
    pub byte_len: u64,
}

impl StagedFile {
    /// Describe a file on disk. The size falls back to zero when the file
    /// cannot be stat'd; the later read reports the real failure.
    pub fn from_path(path: &Path) -> Self {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        let byte_len = std::fs::metadata(path).map(|meta| meta.len()).unwrap_or(0);
        Self {
            path: path.to_path_buf(),
            file_name,
            media_type: media_type_for_path(path),
            byte_len,
        }
    }
}

/// Media type guessed from the file extension.
fn media_type_for_path(path: &Path) -> String {
    let ext = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
    .to_string()
}

/// An accepted image: bytes in memory plus the preview shown in the
/// transcript.
#[derive(Clone, Debug)]
pub struct StagedImage {
    pub file: StagedFile,
    pub bytes: Vec<u8>,
    /// `data:<media type>;base64,<payload>` URI.
    pub preview: String,
}

/// Everything the learner has staged but not yet submitted.
#[derive(Debug, Default)]
pub struct PendingInput {
    pub text: String,
    pub image: Option<StagedImage>,
    /// Why the last image selection was refused. Mutually exclusive with
    /// `image`.
    pub validation_error: Option<ValidationError>,
}

/// Why an image selection was refused. Refusals never reach the
/// conversation log; they only mark the pending input.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("not an image")]
    NotAnImage,
    #[error("image exceeds {MAX_IMAGE_BYTES} bytes")]
    ImageTooLarge,
    #[error("unsupported image format")]
    UnsupportedImageFormat,
    #[error("image could not be read")]
    ImageReadFailed,
}

impl ValidationError {
    /// The sentence shown next to the input area.
    pub fn user_message(&self) -> &'static str {
        match self {
            ValidationError::NotAnImage => messages::VALIDATION_NOT_AN_IMAGE,
            ValidationError::ImageTooLarge => messages::VALIDATION_IMAGE_TOO_LARGE,
            ValidationError::UnsupportedImageFormat => messages::VALIDATION_UNSUPPORTED_FORMAT,
            ValidationError::ImageReadFailed => messages::VALIDATION_IMAGE_READ_FAILED,
        }
    }
}

// ── Submission lifecycle ───────────────────────────────────────────

/// Where the latest request stands. `Sending` closes the submission gate;
/// `Idle` and `Settled` both leave it open.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RequestState {
    #[default]
    Idle,
    Sending,
    Settled,
}

/// Output of the synchronous submit phase, ready for the wire.
#[derive(Debug)]
pub struct PreparedSubmission {
    pub question: String,
    pub image: Option<ImagePayload>,
}

pub struct SubmissionController {
    service: Arc<dyn AnswerService>,
    log: ConversationLog,
    pending: PendingInput,
    state: RequestState,
}

impl SubmissionController {
    pub fn new(service: Arc<dyn AnswerService>) -> Self {
        Self {
            service,
            log: ConversationLog::new(),
            pending: PendingInput::default(),
            state: RequestState::Idle,
        }
    }

    pub fn entries(&self) -> &[ConversationEntry] {
        self.log.entries()
    }

    pub fn log(&self) -> &ConversationLog {
        &self.log
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    pub fn pending(&self) -> &PendingInput {
        &self.pending
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.pending.text = text.into();
    }

    /// Validate and stage an image selection. Refusals land in
    /// `pending.validation_error`; an accepted image replaces any earlier
    /// one. A new selection always clears the previous verdict first.
    pub async fn stage_image(&mut self, file: StagedFile) {
        self.pending.validation_error = None;

        let media_type = file.media_type.to_ascii_lowercase();
        if !media_type.starts_with("image/") {
            self.refuse(ValidationError::NotAnImage);
            return;
        }
        if file.byte_len > MAX_IMAGE_BYTES {
            self.refuse(ValidationError::ImageTooLarge);
            return;
        }
        if !ACCEPTED_IMAGE_TYPES.contains(&media_type.as_str()) {
            self.refuse(ValidationError::UnsupportedImageFormat);
            return;
        }

        match tokio::fs::read(&file.path).await {
            Ok(bytes) => {
                debug!(file = %file.file_name, bytes = bytes.len(), "image staged");
                let preview = data_uri(&file.media_type, &bytes);
                self.pending.image = Some(StagedImage {
                    file,
                    bytes,
                    preview,
                });
            }
            Err(err) => {
                warn!(path = %file.path.display(), error = %err, "image read failed");
                self.refuse(ValidationError::ImageReadFailed);
            }
        }
    }

    pub fn clear_image(&mut self) {
        self.pending.image = None;
    }

    /// Phase one of a submission. Returns `None` when a request is already
    /// in flight or there is nothing to send; otherwise appends the user
    /// entry, clears the pending input, closes the gate, and hands back
    /// the payload for [`Self::finish_submit`].
    pub fn begin_submit(&mut self) -> Option<PreparedSubmission> {
        if self.state == RequestState::Sending {
            return None;
        }
        let question = self.pending.text.trim().to_string();
        if question.is_empty() && self.pending.image.is_none() {
            return None;
        }

        self.state = RequestState::Sending;
        let image = self.pending.image.take();
        let preview = image.as_ref().map(|image| image.preview.clone());
        self.log.push_user(question.clone(), preview);
        self.pending = PendingInput::default();

        Some(PreparedSubmission {
            question,
            image: image.map(|image| ImagePayload {
                bytes: image.bytes,
                media_type: image.file.media_type,
                file_name: image.file.file_name,
            }),
        })
    }

    /// Phase two. Runs the request and appends exactly one assistant
    /// entry: the answer on success, the classified failure copy
    /// otherwise. The classification is also returned for callers that
    /// need an exit status.
    pub async fn finish_submit(
        &mut self,
        prepared: PreparedSubmission,
    ) -> Result<(), AnswerError> {
        let result = self.service.ask(&prepared.question, prepared.image).await;
        let outcome = match result {
            Ok(answer) => {
                let content = if answer.answer.is_empty() {
                    messages::ANSWER_EMPTY_FALLBACK.to_string()
                } else {
                    answer.answer
                };
                self.log
                    .push_assistant(content, answer.model_used, answer.context_used);
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "answer request settled with a failure");
                self.log.push_assistant(err.user_message(), None, None);
                Err(err)
            }
        };
        self.state = RequestState::Settled;
        outcome
    }

    /// Drop the conversation and all pending input, back to a fresh
    /// session.
    pub fn reset(&mut self) {
        self.log.clear();
        self.pending = PendingInput::default();
        self.state = RequestState::Idle;
    }

    /// The most recent assistant entry, if any.
    pub fn last_assistant(&self) -> Option<&ConversationEntry> {
        self.log
            .entries()
            .iter()
            .rev()
            .find(|entry| entry.role == Role::Assistant)
    }

    /// The user entry nearest before `id`, used to pair a question with
    /// the answer being rated.
    pub fn question_before(&self, id: Uuid) -> Option<&ConversationEntry> {
        let pos = self.log.entries().iter().position(|entry| entry.id == id)?;
        self.log.entries()[..pos]
            .iter()
            .rev()
            .find(|entry| entry.role == Role::User)
    }

    fn refuse(&mut self, error: ValidationError) {
        self.pending.image = None;
        self.pending.validation_error = Some(error);
    }
}

fn data_uri(media_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", media_type, STANDARD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;
    use std::sync::Mutex;

    use super::*;
    use crate::conversation::Role;
    use crate::service::Answer;

    struct Canned(Result<Answer, AnswerError>);

    #[async_trait::async_trait]
    impl AnswerService for Canned {
        async fn ask(
            &self,
            _question: &str,
            _image: Option<ImagePayload>,
        ) -> Result<Answer, AnswerError> {
            self.0.clone()
        }
    }

    #[derive(Default)]
    struct Recording {
        calls: Mutex<Vec<(String, Option<String>)>>,
    }

    #[async_trait::async_trait]
    impl AnswerService for Recording {
        async fn ask(
            &self,
            question: &str,
            image: Option<ImagePayload>,
        ) -> Result<Answer, AnswerError> {
            self.calls
                .lock()
                .unwrap()
                .push((question.to_string(), image.map(|i| i.media_type)));
            Ok(answer("تمام"))
        }
    }

    fn answer(text: &str) -> Answer {
        Answer {
            answer: text.to_string(),
            model_used: Some("gpt-4o".to_string()),
            context_used: Some(true),
        }
    }

    fn controller_with(result: Result<Answer, AnswerError>) -> SubmissionController {
        SubmissionController::new(Arc::new(Canned(result)))
    }

    fn staged(media_type: &str, byte_len: u64) -> StagedFile {
        StagedFile {
            path: PathBuf::from("/nonexistent/selection.bin"),
            file_name: "selection.bin".to_string(),
            media_type: media_type.to_string(),
            byte_len,
        }
    }

    fn png_on_disk(bytes: &[u8]) -> (tempfile::NamedTempFile, StagedFile) {
        let mut file = tempfile::Builder::new()
            .suffix(".png")
            .tempfile()
            .unwrap();
        file.write_all(bytes).unwrap();
        let staged = StagedFile::from_path(file.path());
        (file, staged)
    }

    // ── Validation gate ────────────────────────────────────────────

    #[tokio::test]
    async fn pdf_selection_is_refused_without_io() {
        let mut ctl = controller_with(Ok(answer("x")));
        ctl.stage_image(staged("application/pdf", 100)).await;

        assert_eq!(
            ctl.pending().validation_error,
            Some(ValidationError::NotAnImage)
        );
        assert!(ctl.pending().image.is_none());
        assert!(ctl.entries().is_empty());
        assert_eq!(
            ValidationError::NotAnImage.user_message(),
            messages::VALIDATION_NOT_AN_IMAGE
        );
    }

    #[tokio::test]
    async fn oversized_image_is_refused() {
        let mut ctl = controller_with(Ok(answer("x")));
        ctl.stage_image(staged("image/jpeg", 15 * 1024 * 1024)).await;
        assert_eq!(
            ctl.pending().validation_error,
            Some(ValidationError::ImageTooLarge)
        );
    }

    #[tokio::test]
    async fn image_at_exactly_the_ceiling_passes_the_size_check() {
        let (_guard, mut file) = png_on_disk(b"tiny");
        file.byte_len = MAX_IMAGE_BYTES;

        let mut ctl = controller_with(Ok(answer("x")));
        ctl.stage_image(file).await;
        assert!(ctl.pending().validation_error.is_none());
        assert!(ctl.pending().image.is_some());
    }

    #[tokio::test]
    async fn unsupported_image_type_is_refused() {
        let mut ctl = controller_with(Ok(answer("x")));
        ctl.stage_image(staged("image/tiff", 100)).await;
        assert_eq!(
            ctl.pending().validation_error,
            Some(ValidationError::UnsupportedImageFormat)
        );
    }

    #[tokio::test]
    async fn media_type_checks_ignore_case() {
        let (_guard, mut file) = png_on_disk(b"tiny");
        file.media_type = "IMAGE/PNG".to_string();

        let mut ctl = controller_with(Ok(answer("x")));
        ctl.stage_image(file).await;
        assert!(ctl.pending().validation_error.is_none());
        assert!(ctl.pending().image.is_some());
    }

    #[tokio::test]
    async fn accepted_image_carries_a_data_uri_preview() {
        let (_guard, file) = png_on_disk(b"fake png bytes");
        let mut ctl = controller_with(Ok(answer("x")));
        ctl.stage_image(file).await;

        let image = ctl.pending().image.as_ref().unwrap();
        assert_eq!(
            image.preview,
            format!("data:image/png;base64,{}", STANDARD.encode(b"fake png bytes"))
        );
        assert_eq!(image.file.media_type, "image/png");
    }

    #[tokio::test]
    async fn unreadable_file_is_refused_as_read_failure() {
        let mut ctl = controller_with(Ok(answer("x")));
        ctl.stage_image(staged("image/png", 10)).await;
        assert_eq!(
            ctl.pending().validation_error,
            Some(ValidationError::ImageReadFailed)
        );
        assert!(ctl.pending().image.is_none());
    }

    #[tokio::test]
    async fn new_selection_clears_the_previous_verdict() {
        let mut ctl = controller_with(Ok(answer("x")));
        ctl.stage_image(staged("application/pdf", 100)).await;
        assert!(ctl.pending().validation_error.is_some());

        let (_guard, file) = png_on_disk(b"ok");
        ctl.stage_image(file).await;
        assert!(ctl.pending().validation_error.is_none());
        assert!(ctl.pending().image.is_some());
    }

    #[tokio::test]
    async fn restaging_replaces_the_previous_image() {
        let mut ctl = controller_with(Ok(answer("x")));
        let (_a, first) = png_on_disk(b"first");
        let (_b, second) = png_on_disk(b"second");
        let second_name = second.file_name.clone();

        ctl.stage_image(first).await;
        ctl.stage_image(second).await;

        let image = ctl.pending().image.as_ref().unwrap();
        assert_eq!(image.file.file_name, second_name);
        assert_eq!(image.bytes, b"second");
    }

    // ── Submission gate ────────────────────────────────────────────

    #[test]
    fn whitespace_only_input_does_not_submit() {
        let mut ctl = controller_with(Ok(answer("x")));
        ctl.set_text("   \n  ");
        assert!(ctl.begin_submit().is_none());
        assert!(ctl.entries().is_empty());
        assert_eq!(ctl.state(), RequestState::Idle);
    }

    #[tokio::test]
    async fn image_alone_is_enough_to_submit() {
        let mut ctl = controller_with(Ok(answer("x")));
        let (_guard, file) = png_on_disk(b"img");
        ctl.stage_image(file).await;

        let prepared = ctl.begin_submit().unwrap();
        assert!(prepared.question.is_empty());
        assert!(prepared.image.is_some());
    }

    #[tokio::test]
    async fn begin_submit_appends_the_user_entry_and_clears_pending() {
        let mut ctl = controller_with(Ok(answer("x")));
        let (_guard, file) = png_on_disk(b"img");
        ctl.stage_image(file).await;
        ctl.set_text("  ما ناتج ٢ + ٢؟  ");

        let prepared = ctl.begin_submit().unwrap();

        assert_eq!(prepared.question, "ما ناتج ٢ + ٢؟");
        assert_eq!(ctl.entries().len(), 1);
        let entry = &ctl.entries()[0];
        assert_eq!(entry.role, Role::User);
        assert_eq!(entry.content, "ما ناتج ٢ + ٢؟");
        assert!(
            entry
                .attached_image
                .as_deref()
                .is_some_and(|p| p.starts_with("data:image/png;base64,"))
        );

        assert!(ctl.pending().text.is_empty());
        assert!(ctl.pending().image.is_none());
        assert!(ctl.pending().validation_error.is_none());
        assert_eq!(ctl.state(), RequestState::Sending);
    }

    #[test]
    fn submit_while_sending_is_ignored() {
        let mut ctl = controller_with(Ok(answer("x")));
        ctl.set_text("سؤال");
        assert!(ctl.begin_submit().is_some());

        ctl.set_text("سؤال آخر");
        assert!(ctl.begin_submit().is_none());
        assert_eq!(ctl.entries().len(), 1);
    }

    #[test]
    fn a_lone_validation_error_is_not_submittable() {
        let mut ctl = controller_with(Ok(answer("x")));
        ctl.pending.validation_error = Some(ValidationError::NotAnImage);
        assert!(ctl.begin_submit().is_none());
        assert!(ctl.entries().is_empty());
    }

    // ── Settling ───────────────────────────────────────────────────

    #[tokio::test]
    async fn answers_land_with_their_provenance() {
        let mut ctl = controller_with(Ok(answer("الجواب 4")));
        ctl.set_text("سؤال");
        let prepared = ctl.begin_submit().unwrap();
        assert!(ctl.finish_submit(prepared).await.is_ok());

        assert_eq!(ctl.entries().len(), 2);
        let entry = ctl.entries().last().unwrap();
        assert_eq!(entry.role, Role::Assistant);
        assert_eq!(entry.content, "الجواب 4");
        assert_eq!(entry.model_used.as_deref(), Some("gpt-4o"));
        assert_eq!(entry.context_used, Some(true));
        assert_eq!(ctl.state(), RequestState::Settled);

        // The gate reopens after settling.
        ctl.set_text("سؤال ثان");
        assert!(ctl.begin_submit().is_some());
    }

    #[tokio::test]
    async fn empty_answer_falls_back_to_the_placeholder() {
        let mut ctl = controller_with(Ok(Answer::default()));
        ctl.set_text("سؤال");
        let prepared = ctl.begin_submit().unwrap();
        ctl.finish_submit(prepared).await.unwrap();
        assert_eq!(
            ctl.entries().last().unwrap().content,
            messages::ANSWER_EMPTY_FALLBACK
        );
    }

    #[tokio::test]
    async fn failures_append_their_classified_copy() {
        let mut ctl = controller_with(Err(AnswerError::RateLimited { detail: None }));
        ctl.set_text("سؤال");
        let prepared = ctl.begin_submit().unwrap();

        let outcome = ctl.finish_submit(prepared).await;
        assert_eq!(outcome, Err(AnswerError::RateLimited { detail: None }));

        let entry = ctl.entries().last().unwrap();
        assert_eq!(entry.role, Role::Assistant);
        assert_eq!(entry.content, messages::ERR_RATE_LIMITED);
        assert!(entry.model_used.is_none());
        assert_eq!(ctl.state(), RequestState::Settled);
    }

    #[tokio::test]
    async fn server_detail_wins_over_fixed_copy() {
        let mut ctl = controller_with(Err(AnswerError::RateLimited {
            detail: Some("انتظر عشر ثوان".to_string()),
        }));
        ctl.set_text("سؤال");
        let prepared = ctl.begin_submit().unwrap();
        let _ = ctl.finish_submit(prepared).await;
        assert_eq!(ctl.entries().last().unwrap().content, "انتظر عشر ثوان");
    }

    #[tokio::test]
    async fn the_service_sees_the_prepared_payload() {
        let recording = Arc::new(Recording::default());
        let mut ctl = SubmissionController::new(recording.clone());
        let (_guard, file) = png_on_disk(b"img");
        ctl.stage_image(file).await;
        ctl.set_text("ما ناتج ٢ + ٢؟");

        let prepared = ctl.begin_submit().unwrap();
        ctl.finish_submit(prepared).await.unwrap();

        let calls = recording.calls.lock().unwrap();
        assert_eq!(
            calls.as_slice(),
            &[(
                "ما ناتج ٢ + ٢؟".to_string(),
                Some("image/png".to_string())
            )]
        );
    }

    #[tokio::test]
    async fn reset_returns_to_a_fresh_session() {
        let mut ctl = controller_with(Ok(answer("x")));
        ctl.set_text("سؤال");
        let prepared = ctl.begin_submit().unwrap();
        ctl.finish_submit(prepared).await.unwrap();

        ctl.reset();
        assert!(ctl.entries().is_empty());
        assert_eq!(ctl.state(), RequestState::Idle);
        assert!(ctl.pending().text.is_empty());
    }

    #[tokio::test]
    async fn question_pairing_walks_back_to_the_nearest_user_entry() {
        let mut ctl = controller_with(Ok(answer("الجواب")));
        ctl.set_text("السؤال الأول");
        let prepared = ctl.begin_submit().unwrap();
        ctl.finish_submit(prepared).await.unwrap();

        let assistant = ctl.last_assistant().unwrap();
        let question = ctl.question_before(assistant.id).unwrap();
        assert_eq!(question.content, "السؤال الأول");
    }

    // ── File descriptions ──────────────────────────────────────────

    #[test]
    fn media_types_follow_the_extension() {
        let case = |name: &str| media_type_for_path(Path::new(name));
        assert_eq!(case("a.JPG"), "image/jpeg");
        assert_eq!(case("a.jpeg"), "image/jpeg");
        assert_eq!(case("a.png"), "image/png");
        assert_eq!(case("a.webp"), "image/webp");
        assert_eq!(case("a.pdf"), "application/pdf");
        assert_eq!(case("a"), "application/octet-stream");
    }

    #[test]
    fn from_path_reads_the_on_disk_size() {
        let (_guard, file) = png_on_disk(b"12345");
        assert_eq!(file.byte_len, 5);
        assert_eq!(file.media_type, "image/png");
        assert!(file.file_name.ends_with(".png"));
    }
}

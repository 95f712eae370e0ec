use std::collections::HashSet;

use muallim_core::{Fragment, PendingInput, messages};
use unicode_width::UnicodeWidthStr;
use uuid::Uuid;

use crate::command;
use crate::render;

/// Height of one logical line wrapped at `width` columns. Zero-width lines
/// still occupy a row.
pub fn wrapped_line_height(line: &str, width: usize) -> usize {
    if width == 0 {
        return 1;
    }
    let w = UnicodeWidthStr::width(line);
    if w == 0 { 1 } else { w.div_ceil(width) }
}

/// Wrapped height of multi-line text where every logical line carries
/// `prefix_cols` extra columns (prompt character, indent).
pub fn wrapped_text_height(text: &str, width: usize, prefix_cols: usize) -> usize {
    if text.is_empty() {
        return 1;
    }
    if width == 0 {
        return text.split('\n').count();
    }
    text.split('\n')
        .map(|line| {
            let w = UnicodeWidthStr::width(line) + prefix_cols;
            if w == 0 { 1 } else { w.div_ceil(width) }
        })
        .sum()
}

// ── Display blocks ──────────────────────────────────────────────────

/// One visual unit in the history area.
pub enum DisplayBlock {
    /// Welcome screen, shown while the conversation is empty.
    Splash,
    /// A submitted question, with the attached image's name when one was
    /// sent along.
    UserBubble {
        text: String,
        image_label: Option<String>,
    },
    /// An answer (or failure copy) from the tutor, pre-segmented for
    /// math-aware rendering.
    AssistantBubble { fragments: Vec<Fragment> },
    /// Informational line from the app itself (command output, acks).
    Notice(String),
    /// A failure outside the conversation, e.g. a rejected review.
    ErrorLine(String),
}

impl DisplayBlock {
    /// Visual height in rows at the given width. Must agree with how
    /// `ui::render_block` lays the block out.
    pub fn height(&self, width: usize, viewport_height: usize) -> usize {
        match self {
            DisplayBlock::Splash => viewport_height,
            DisplayBlock::UserBubble { text, image_label } => {
                let mut h = wrapped_text_height(text, width, 2);
                if let Some(label) = image_label {
                    h += wrapped_line_height(&format!("\u{25a3} {label}"), width);
                }
                h + 1
            }
            DisplayBlock::AssistantBubble { fragments } => {
                render::fragments_height(fragments, width) + 1
            }
            DisplayBlock::Notice(text) => wrapped_text_height(text, width, 0) + 1,
            DisplayBlock::ErrorLine(text) => {
                wrapped_line_height(&messages::error_display(text), width) + 1
            }
        }
    }
}

// ── Rating dialog ───────────────────────────────────────────────────

/// State of the answer rating dialog. The question/answer pair is
/// captured when the dialog opens so submission does not depend on the
/// conversation log.
pub struct RatingState {
    pub entry_id: Uuid,
    pub question: String,
    pub answer: String,
    pub model_used: Option<String>,
    pub context_used: Option<bool>,
    /// Chosen stars, 1 through 5. Zero until the learner picks.
    pub rating: u8,
    pub feedback: String,
    /// Typing goes into the feedback field instead of the star row.
    pub editing_feedback: bool,
    /// A submission is in flight; input is ignored until it settles.
    pub submitting: bool,
    /// Guard message, shown when submitting with no stars chosen.
    pub error: Option<String>,
}

// ── App state ───────────────────────────────────────────────────────

pub struct App {
    pub blocks: Vec<DisplayBlock>,
    pub input: String,
    pub cursor_pos: usize,
    pub input_history: Vec<String>,
    pub history_idx: Option<usize>,

    /// Visual rows scrolled from the top of the history.
    pub scroll_offset: usize,
    /// Keep the view pinned to the newest content.
    pub follow_output: bool,

    pub running: bool,
    pub tick: usize,
    pub dirty: bool,

    pub suggestions: Vec<(String, String)>,
    pub suggestion_idx: usize,

    pub session_id: Uuid,
    pub user_id: Option<String>,
    /// Backend host shown in the status bar.
    pub backend: String,

    /// Mirrors of the controller's pending input, for drawing while the
    /// controller is away on a turn.
    pub attachment_label: Option<String>,
    pub validation_text: Option<String>,

    /// Assistant entries that already received a review.
    pub reviewed: HashSet<Uuid>,
    pub rating: Option<RatingState>,
    pub stats_pending: bool,

    // Cumulative block heights for the current (width, viewport) pair.
    height_cache: Vec<usize>,
    height_cache_width: usize,
    height_cache_viewport: usize,
}

impl App {
    pub fn new(session_id: Uuid, user_id: Option<String>, backend: String) -> Self {
        Self {
            blocks: vec![DisplayBlock::Splash],
            input: String::new(),
            cursor_pos: 0,
            input_history: Vec::new(),
            history_idx: None,
            scroll_offset: 0,
            follow_output: true,
            running: false,
            tick: 0,
            dirty: true,
            suggestions: Vec::new(),
            suggestion_idx: 0,
            session_id,
            user_id,
            backend,
            attachment_label: None,
            validation_text: None,
            reviewed: HashSet::new(),
            rating: None,
            stats_pending: false,
            height_cache: Vec::new(),
            height_cache_width: 0,
            height_cache_viewport: 0,
        }
    }

    // ── Blocks ──────────────────────────────────────────────────────

    pub fn push_block(&mut self, block: DisplayBlock) {
        self.blocks.push(block);
        self.invalidate_height_cache();
        self.scroll_to_bottom();
        self.dirty = true;
    }

    pub fn push_notice(&mut self, text: impl Into<String>) {
        self.push_block(DisplayBlock::Notice(text.into()));
    }

    pub fn push_error(&mut self, text: impl Into<String>) {
        self.push_block(DisplayBlock::ErrorLine(text.into()));
    }

    /// Back to the welcome screen, dropping review bookkeeping with the
    /// blocks.
    pub fn clear_history(&mut self) {
        self.blocks = vec![DisplayBlock::Splash];
        self.reviewed.clear();
        self.rating = None;
        self.invalidate_height_cache();
        self.scroll_to_bottom();
        self.dirty = true;
    }

    // ── Height cache ────────────────────────────────────────────────

    pub fn invalidate_height_cache(&mut self) {
        self.height_cache.clear();
    }

    /// Rebuild the cumulative height cache if the geometry or block list
    /// changed. Must run before draw() reads the snapshot.
    pub fn ensure_height_cache_pub(&mut self, width: usize, viewport_height: usize) {
        if self.height_cache.len() == self.blocks.len()
            && self.height_cache_width == width
            && self.height_cache_viewport == viewport_height
        {
            return;
        }
        self.height_cache_width = width;
        self.height_cache_viewport = viewport_height;
        self.height_cache.clear();
        let mut total = 0;
        for block in &self.blocks {
            total += block.height(width, viewport_height);
            self.height_cache.push(total);
        }
    }

    pub fn height_cache_snapshot(&self) -> &[usize] {
        &self.height_cache
    }

    pub fn total_content_height(&self) -> usize {
        self.height_cache.last().copied().unwrap_or(0)
    }

    // ── Scrolling ───────────────────────────────────────────────────

    pub fn scroll_up(&mut self, amount: usize) {
        self.scroll_offset = self.scroll_offset.saturating_sub(amount);
        self.follow_output = false;
        self.dirty = true;
    }

    /// `max_scroll` comes from the clamp pass in the main loop; reaching
    /// it re-pins the view to the bottom.
    pub fn scroll_down(&mut self, amount: usize, max_scroll: usize) {
        self.scroll_offset = (self.scroll_offset + amount).min(max_scroll);
        if self.scroll_offset >= max_scroll {
            self.follow_output = true;
        }
        self.dirty = true;
    }

    pub fn scroll_to_bottom(&mut self) {
        self.follow_output = true;
        self.scroll_offset = usize::MAX; // clamped before draw
    }

    // ── Input editing ───────────────────────────────────────────────

    pub fn insert_char(&mut self, c: char) {
        self.input.insert(self.cursor_pos, c);
        self.cursor_pos += c.len_utf8();
        self.dirty = true;
    }

    pub fn backspace(&mut self) {
        if self.cursor_pos == 0 {
            return;
        }
        let mut idx = self.cursor_pos - 1;
        while idx > 0 && !self.input.is_char_boundary(idx) {
            idx -= 1;
        }
        self.input.remove(idx);
        self.cursor_pos = idx;
        self.dirty = true;
    }

    pub fn delete_char(&mut self) {
        if self.cursor_pos < self.input.len() {
            self.input.remove(self.cursor_pos);
            self.dirty = true;
        }
    }

    pub fn move_cursor_left(&mut self) {
        if self.cursor_pos == 0 {
            return;
        }
        let mut idx = self.cursor_pos - 1;
        while idx > 0 && !self.input.is_char_boundary(idx) {
            idx -= 1;
        }
        self.cursor_pos = idx;
        self.dirty = true;
    }

    pub fn move_cursor_right(&mut self) {
        if self.cursor_pos >= self.input.len() {
            return;
        }
        let mut idx = self.cursor_pos + 1;
        while idx < self.input.len() && !self.input.is_char_boundary(idx) {
            idx += 1;
        }
        self.cursor_pos = idx;
        self.dirty = true;
    }

    /// Start of the current logical line.
    pub fn move_cursor_home(&mut self) {
        self.cursor_pos = self.input[..self.cursor_pos]
            .rfind('\n')
            .map(|i| i + 1)
            .unwrap_or(0);
        self.dirty = true;
    }

    /// End of the current logical line.
    pub fn move_cursor_end(&mut self) {
        self.cursor_pos = self.input[self.cursor_pos..]
            .find('\n')
            .map(|i| self.cursor_pos + i)
            .unwrap_or(self.input.len());
        self.dirty = true;
    }

    /// Enter may act only when the draft holds non-blank text or an
    /// attachment is staged. Checked before [`Self::take_input`], so a
    /// blank draft stays in the input instead of being consumed.
    pub fn has_submittable_input(&self) -> bool {
        !self.input.trim().is_empty() || self.attachment_label.is_some()
    }

    /// Take the typed input for submission, recording it in the history.
    pub fn take_input(&mut self) -> String {
        let text = std::mem::take(&mut self.input);
        self.cursor_pos = 0;
        self.history_idx = None;
        self.suggestions.clear();
        if !text.trim().is_empty() && self.input_history.last() != Some(&text) {
            self.input_history.push(text.clone());
        }
        self.follow_output = true;
        self.dirty = true;
        text
    }

    pub fn history_up(&mut self) {
        if self.input_history.is_empty() {
            return;
        }
        let idx = match self.history_idx {
            None => self.input_history.len() - 1,
            Some(0) => 0,
            Some(i) => i - 1,
        };
        self.history_idx = Some(idx);
        self.input = self.input_history[idx].clone();
        self.cursor_pos = self.input.len();
        self.dirty = true;
    }

    pub fn history_down(&mut self) {
        match self.history_idx {
            None => {}
            Some(i) if i + 1 < self.input_history.len() => {
                self.history_idx = Some(i + 1);
                self.input = self.input_history[i + 1].clone();
                self.cursor_pos = self.input.len();
            }
            Some(_) => {
                self.history_idx = None;
                self.input.clear();
                self.cursor_pos = 0;
            }
        }
        self.dirty = true;
    }

    // ── Suggestions ─────────────────────────────────────────────────

    /// Refresh the slash-command popup from the current input.
    pub fn update_suggestions(&mut self) {
        if self.input.starts_with('/') && !self.input.contains(char::is_whitespace) {
            self.suggestions = command::completions(&self.input);
        } else {
            self.suggestions.clear();
        }
        if self.suggestion_idx >= self.suggestions.len() {
            self.suggestion_idx = 0;
        }
        self.dirty = true;
    }

    pub fn suggestion_up(&mut self) {
        if !self.suggestions.is_empty() {
            self.suggestion_idx = self.suggestion_idx.saturating_sub(1);
            self.dirty = true;
        }
    }

    pub fn suggestion_down(&mut self) {
        if !self.suggestions.is_empty() {
            self.suggestion_idx = (self.suggestion_idx + 1).min(self.suggestions.len() - 1);
            self.dirty = true;
        }
    }

    pub fn apply_suggestion(&mut self) {
        if let Some((cmd, _)) = self.suggestions.get(self.suggestion_idx) {
            self.input = format!("{cmd} ");
            self.cursor_pos = self.input.len();
            self.suggestions.clear();
            self.dirty = true;
        }
    }

    // ── Pending-input mirror ────────────────────────────────────────

    /// Copy what the input area needs to draw out of the controller's
    /// pending state.
    pub fn sync_pending(&mut self, pending: &PendingInput) {
        self.attachment_label = pending
            .image
            .as_ref()
            .map(|image| image.file.file_name.clone());
        self.validation_text = pending
            .validation_error
            .map(|error| error.user_message().to_string());
        self.dirty = true;
    }
}

use ratatui::style::{Color, Modifier, Style};

// ── Formwork: warm olive-tinted blacks ──────────────────────────────
pub const FORM: Color = Color::Rgb(14, 13, 11);
pub const FORM_DEEP: Color = Color::Rgb(8, 8, 7);
pub const FORM_RAISED: Color = Color::Rgb(20, 20, 18);

// ── Ash: structural greys ──────────────────────────────────────────
pub const ASH: Color = Color::Rgb(42, 42, 40);
pub const ASH_LIGHT: Color = Color::Rgb(58, 58, 52);
pub const ASH_MID: Color = Color::Rgb(74, 74, 68);
pub const ASH_TEXT: Color = Color::Rgb(90, 90, 80);

// ── Chalk: text hierarchy ──────────────────────────────────────────
pub const CHALK_DIM: Color = Color::Rgb(122, 122, 112);
pub const CHALK_MID: Color = Color::Rgb(200, 196, 184);
pub const CHALK: Color = Color::Rgb(232, 228, 208);

// ── Accent colors ──────────────────────────────────────────────────
pub const SODIUM: Color = Color::Rgb(232, 163, 60);
pub const ERROR: Color = Color::Rgb(204, 68, 68);

// ── Character constants ────────────────────────────────────────────
pub const PROMPT_CHAR: &str = "❯";
pub const STATUS_SEP: &str = " · ";
pub const STAR_FILLED: &str = "★";
pub const STAR_EMPTY: &str = "☆";

// ── Style helpers ──────────────────────────────────────────────────

/// Sodium bold `❯` prompt character
pub fn prompt() -> Style {
    Style::default().fg(SODIUM).add_modifier(Modifier::BOLD)
}

/// User-typed text after the prompt
pub fn user_input() -> Style {
    Style::default().fg(CHALK_MID)
}

/// Tutor prose in the history
pub fn assistant_text() -> Style {
    Style::default().fg(CHALK)
}

/// Inline `$...$` math span
pub fn math_inline() -> Style {
    Style::default().fg(SODIUM)
}

/// Displayed `$$...$$` math content
pub fn math_block() -> Style {
    Style::default().fg(CHALK).add_modifier(Modifier::BOLD)
}

/// Border characters around displayed math (│, └───)
pub fn math_chrome() -> Style {
    Style::default().fg(ASH)
}

/// Error text
pub fn error() -> Style {
    Style::default().fg(ERROR)
}

/// Help bar key labels
pub fn help_key() -> Style {
    Style::default().fg(SODIUM).add_modifier(Modifier::BOLD)
}

/// Help bar descriptions
pub fn help_desc() -> Style {
    Style::default().fg(ASH_MID)
}

/// Input area border
pub fn input_border() -> Style {
    Style::default().fg(ASH)
}

/// Input placeholder text
pub fn waiting() -> Style {
    Style::default().fg(ASH_MID)
}

/// Spinner character
pub fn spinner() -> Style {
    Style::default().fg(SODIUM)
}

/// "muallim" title in status bar
pub fn app_title() -> Style {
    Style::default().fg(SODIUM).add_modifier(Modifier::BOLD)
}

/// Backend host in status bar
pub fn backend_name() -> Style {
    Style::default().fg(CHALK_DIM)
}

/// Status bar separator ( · )
pub fn status_separator() -> Style {
    Style::default().fg(ASH_MID)
}

/// Status text next to spinner
pub fn status_text() -> Style {
    Style::default().fg(ASH_MID)
}

/// Status bar and help bar background
pub fn bar_bg() -> Style {
    Style::default().bg(FORM_RAISED)
}

/// History area background
pub fn history_bg() -> Style {
    Style::default().bg(FORM)
}

/// App notices in the history (/help output, review acks)
pub fn system_message() -> Style {
    Style::default().fg(ASH_TEXT)
}

/// Image attachment badge
pub fn image_attachment() -> Style {
    Style::default().fg(SODIUM)
}

/// A chosen star in the rating dialog
pub fn star_selected() -> Style {
    Style::default().fg(SODIUM).add_modifier(Modifier::BOLD)
}

/// An unchosen star in the rating dialog
pub fn star_unselected() -> Style {
    Style::default().fg(ASH_MID)
}

/// Rating dialog border
pub fn dialog_border() -> Style {
    Style::default().fg(ASH_LIGHT)
}

/// Rating dialog title
pub fn dialog_title() -> Style {
    Style::default().fg(SODIUM).add_modifier(Modifier::BOLD)
}

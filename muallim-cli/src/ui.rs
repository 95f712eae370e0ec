use muallim_core::messages;
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};
use unicode_width::UnicodeWidthStr;

use crate::app::{App, DisplayBlock};
use crate::render;
use crate::theme;

/// History-area height for the given frame geometry. The main loop uses
/// this to clamp scroll offsets before draw() runs, so it must agree
/// with the layout in `draw`.
pub fn history_viewport_height(app: &App, width: u16, height: u16) -> usize {
    let thinking_h: u16 = if app.running { 1 } else { 0 };
    let pending_h: u16 = if app.validation_text.is_some() || app.attachment_label.is_some() {
        1
    } else {
        0
    };
    let inner_w = width.saturating_sub(2) as usize;
    let input_h = (input_visual_lines(&app.input, inner_w) as u16 + 2).min(10);
    // Status bar and help bar take one row each; history gets Min(3).
    height
        .saturating_sub(2 + thinking_h + pending_h + input_h)
        .max(3) as usize
}

pub fn draw(frame: &mut Frame, app: &App) {
    // Paint entire frame with FORM bg so no terminal background bleeds through
    frame.render_widget(Block::default().style(theme::history_bg()), frame.area());

    let thinking_h = if app.running { 1 } else { 0 };
    let pending_h = if app.validation_text.is_some() || app.attachment_label.is_some() {
        1
    } else {
        0
    };

    // Dynamic input height: account for visual wrapping, not just newline
    // count. The "❯ " prefix eats 2 columns.
    let inner_w = frame.area().width.saturating_sub(2) as usize;
    let visual_lines = input_visual_lines(&app.input, inner_w);
    let input_h = (visual_lines as u16 + 2).min(10); // +2 for borders

    let chunks = Layout::vertical([
        Constraint::Length(1),          // status bar
        Constraint::Min(3),             // history
        Constraint::Length(thinking_h), // spinner line (only while waiting)
        Constraint::Length(pending_h),  // attachment badge / validation line
        Constraint::Length(input_h),    // input (dynamic height)
        Constraint::Length(1),          // help bar
    ])
    .split(frame.area());

    draw_status_bar(frame, app, chunks[0]);
    draw_history(frame, app, chunks[1]);
    if app.running {
        draw_thinking(frame, app, chunks[2]);
    }
    draw_pending_line(frame, app, chunks[3]);
    draw_input(frame, app, chunks[4]);
    draw_suggestions(frame, app, chunks[4]);
    draw_rating(frame, app, chunks[1]); // overlay on history area
    draw_help_bar(frame, app, chunks[5]);
}

fn draw_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let session_short: String = app.session_id.to_string().chars().take(8).collect();
    let spans = vec![
        Span::styled(" muallim", theme::app_title()),
        Span::styled(theme::STATUS_SEP, theme::status_separator()),
        Span::styled(app.backend.clone(), theme::backend_name()),
        Span::styled(theme::STATUS_SEP, theme::status_separator()),
        Span::styled(session_short, Style::default().fg(theme::ASH_TEXT)),
    ];
    let bar = Paragraph::new(Line::from(spans)).style(theme::bar_bg());
    frame.render_widget(bar, area);
}

fn draw_history(frame: &mut Frame, app: &App, area: Rect) {
    let viewport_height = area.height as usize;
    let viewport_width = area.width as usize;
    if viewport_width == 0 {
        return;
    }

    // scroll_offset is already clamped by the main loop before draw()
    let scroll = app.scroll_offset;

    // Find the first visible block via binary search on the height cache
    let (first_idx, skip_lines) = find_visible_block_readonly(app, scroll);

    let mut lines: Vec<Line> = Vec::with_capacity(viewport_height + skip_lines + 20);
    for block in app.blocks[first_idx..].iter() {
        render_block(block, &mut lines, viewport_width, viewport_height);
        if lines.len() >= viewport_height + skip_lines {
            break;
        }
    }

    // Bottom-align content when it doesn't fill the viewport (chat-style).
    // Use visual row count (accounting for line wrapping) not logical line count.
    if scroll == 0 {
        let total_visual: usize = lines
            .iter()
            .map(|line| {
                let w = line.width();
                if w == 0 { 1 } else { w.div_ceil(viewport_width) }
            })
            .sum();
        let pad_count = viewport_height.saturating_sub(total_visual);
        if pad_count > 0 {
            let mut padded = Vec::with_capacity(pad_count + lines.len());
            for _ in 0..pad_count {
                padded.push(Line::from(""));
            }
            padded.extend(lines);
            lines = padded;
        }
    }

    // Use Paragraph's built-in scroll to skip visual rows correctly;
    // skip_lines is in visual-row space and Lines can wrap.
    let paragraph = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .style(theme::history_bg())
        .block(Block::default().borders(Borders::NONE))
        .scroll((skip_lines as u16, 0));

    frame.render_widget(paragraph, area);
}

/// Locate the first visible block from the pre-computed height cache. The
/// cache MUST be warmed via `ensure_height_cache_pub` before draw().
fn find_visible_block_readonly(app: &App, scroll_offset: usize) -> (usize, usize) {
    let cache = app.height_cache_snapshot();
    if cache.is_empty() {
        return (0, 0);
    }
    let idx = cache.partition_point(|&cumulative| cumulative <= scroll_offset);
    if idx >= app.blocks.len() {
        return (app.blocks.len(), 0);
    }
    let block_start = if idx == 0 { 0 } else { cache[idx - 1] };
    (idx, scroll_offset - block_start)
}

fn render_block<'a>(
    block: &'a DisplayBlock,
    lines: &mut Vec<Line<'a>>,
    viewport_width: usize,
    viewport_height: usize,
) {
    match block {
        DisplayBlock::Splash => {
            let content: &[(&str, Style)] = &[
                (messages::APP_TITLE, theme::app_title()),
                (messages::APP_SUBTITLE, Style::default().fg(theme::CHALK_DIM)),
                ("", Style::default()),
                (messages::WELCOME_TITLE, theme::assistant_text()),
                (messages::WELCOME_HINT, Style::default().fg(theme::ASH_TEXT)),
                ("", Style::default()),
                (
                    "Enter to send \u{b7} /help for commands",
                    Style::default().fg(theme::ASH_MID),
                ),
            ];
            let cy = viewport_height.saturating_sub(content.len()) / 2;
            for _ in 0..cy {
                lines.push(Line::from(""));
            }
            for &(text, style) in content {
                lines.push(centered(text, style, viewport_width));
            }
            // Fill the rest so the splash owns the whole viewport
            for _ in (cy + content.len())..viewport_height {
                lines.push(Line::from(""));
            }
        }
        DisplayBlock::UserBubble { text, image_label } => {
            for (i, line) in text.split('\n').enumerate() {
                if i == 0 {
                    lines.push(Line::from(vec![
                        Span::styled(format!("{} ", theme::PROMPT_CHAR), theme::prompt()),
                        Span::styled(line, theme::user_input()),
                    ]));
                } else {
                    lines.push(Line::from(vec![
                        Span::raw("  "),
                        Span::styled(line, theme::user_input()),
                    ]));
                }
            }
            if let Some(label) = image_label {
                lines.push(Line::from(Span::styled(
                    format!("\u{25a3} {label}"),
                    theme::image_attachment(),
                )));
            }
            lines.push(Line::from(""));
        }
        DisplayBlock::AssistantBubble { fragments } => {
            lines.extend(render::render_fragments(fragments));
            lines.push(Line::from(""));
        }
        DisplayBlock::Notice(text) => {
            for line in text.split('\n') {
                lines.push(Line::from(Span::styled(line, theme::system_message())));
            }
            lines.push(Line::from(""));
        }
        DisplayBlock::ErrorLine(text) => {
            lines.push(Line::from(Span::styled(
                messages::error_display(text),
                theme::error(),
            )));
            lines.push(Line::from(""));
        }
    }
}

fn centered(text: &str, style: Style, viewport_width: usize) -> Line<'static> {
    let pad = viewport_width.saturating_sub(UnicodeWidthStr::width(text)) / 2;
    Line::from(vec![
        Span::raw(" ".repeat(pad)),
        Span::styled(text.to_string(), style),
    ])
}

// ── Spinner line ────────────────────────────────────────────────────
// The slash mark rotating in place while an answer is on the way. The
// lead character glows sodium and the trail fades to ash; the waiting
// copy follows on the same line.

fn draw_thinking(frame: &mut Frame, app: &App, area: Rect) {
    const ANGLES: &[char] = &['╲', '─', '╱', '│'];
    // Divide tick by 2 → 200ms per angle, 800ms full rotation
    let idx = (app.tick / 2) % ANGLES.len();
    let trail_idx = (idx + ANGLES.len() - 1) % ANGLES.len();

    let spans = vec![
        Span::raw("  "),
        Span::styled(
            ANGLES[trail_idx].to_string(),
            Style::default().fg(theme::ASH_TEXT),
        ),
        Span::styled(
            ANGLES[idx].to_string(),
            theme::spinner().add_modifier(Modifier::BOLD),
        ),
        Span::styled(format!("  {}", messages::THINKING), theme::status_text()),
    ];

    let paragraph = Paragraph::new(Line::from(spans)).style(theme::history_bg());
    frame.render_widget(paragraph, area);
}

/// One line above the input: the staged image badge, or the refusal copy
/// when the last selection failed validation.
fn draw_pending_line(frame: &mut Frame, app: &App, area: Rect) {
    if area.height == 0 {
        return;
    }
    let line = if let Some(text) = &app.validation_text {
        Line::from(vec![
            Span::raw("  "),
            Span::styled(text.clone(), theme::error()),
        ])
    } else if let Some(label) = &app.attachment_label {
        Line::from(vec![
            Span::raw("  "),
            Span::styled(format!("\u{25a3} {label}"), theme::image_attachment()),
            Span::styled("  /detach to remove", theme::help_desc()),
        ])
    } else {
        return;
    };
    let paragraph = Paragraph::new(line).style(theme::history_bg());
    frame.render_widget(paragraph, area);
}

fn draw_input(frame: &mut Frame, app: &App, area: Rect) {
    let mut lines = Vec::new();

    if app.input.is_empty() {
        lines.push(Line::from(vec![
            Span::styled(format!("{} ", theme::PROMPT_CHAR), theme::prompt()),
            Span::styled(messages::INPUT_PLACEHOLDER, theme::waiting()),
        ]));
    } else {
        for (i, line) in app.input.split('\n').enumerate() {
            if i == 0 {
                lines.push(Line::from(vec![
                    Span::styled(format!("{} ", theme::PROMPT_CHAR), theme::prompt()),
                    Span::styled(line.to_string(), theme::user_input()),
                ]));
            } else {
                lines.push(Line::from(vec![
                    Span::raw("  "), // continuation indent
                    Span::styled(line.to_string(), theme::user_input()),
                ]));
            }
        }
    }

    let input = Paragraph::new(lines).wrap(Wrap { trim: false }).block(
        Block::default()
            .borders(Borders::TOP | Borders::BOTTOM)
            .border_style(theme::input_border()),
    );
    frame.render_widget(input, area);

    // Position the cursor, accounting for visual wrapping. Hidden while
    // the rating dialog owns the keyboard.
    if app.rating.is_none() {
        let (vis_row, vis_col) =
            input_cursor_position(&app.input, app.cursor_pos, area.width as usize);
        let content_h = area.height.saturating_sub(2) as usize; // inside borders
        if vis_row < content_h {
            frame.set_cursor_position((area.x + vis_col as u16, area.y + 1 + vis_row as u16));
        } else {
            frame.set_cursor_position((
                area.x + vis_col as u16,
                area.y + area.height.saturating_sub(2),
            ));
        }
    }
}

fn draw_help_bar(frame: &mut Frame, app: &App, area: Rect) {
    let help = if app.rating.is_some() {
        Line::from(vec![
            Span::styled(" \u{2190}/\u{2192}", theme::help_key()),
            Span::styled(" stars  ", theme::help_desc()),
            Span::styled("1-5", theme::help_key()),
            Span::styled(" pick  ", theme::help_desc()),
            Span::styled("Tab", theme::help_key()),
            Span::styled(" feedback  ", theme::help_desc()),
            Span::styled("Enter", theme::help_key()),
            Span::styled(" submit  ", theme::help_desc()),
            Span::styled("Esc", theme::help_key()),
            Span::styled(" cancel", theme::help_desc()),
        ])
    } else if app.running {
        Line::from(vec![
            Span::styled(" ^U/^D", theme::help_key()),
            Span::styled(" scroll  ", theme::help_desc()),
            Span::styled("^C", theme::help_key()),
            Span::styled(" quit", theme::help_desc()),
        ])
    } else {
        Line::from(vec![
            Span::styled(" Enter", theme::help_key()),
            Span::styled(" send  ", theme::help_desc()),
            Span::styled("S-Enter", theme::help_key()),
            Span::styled(" newline  ", theme::help_desc()),
            Span::styled("/", theme::help_key()),
            Span::styled(" commands  ", theme::help_desc()),
            Span::styled("^U/^D", theme::help_key()),
            Span::styled(" scroll  ", theme::help_desc()),
            Span::styled("^C", theme::help_key()),
            Span::styled(" quit", theme::help_desc()),
        ])
    };

    let bar = Paragraph::new(help).style(theme::bar_bg());
    frame.render_widget(bar, area);
}

/// Draw the autocomplete popup above the input area.
fn draw_suggestions(frame: &mut Frame, app: &App, input_area: Rect) {
    if app.suggestions.is_empty() {
        return;
    }

    let count = app.suggestions.len() as u16;
    let height = count + 2; // +2 for top/bottom border
    let width = 44u16.min(input_area.width);
    let y = input_area.y.saturating_sub(height);
    let popup_area = Rect::new(input_area.x, y, width, height);

    frame.render_widget(Clear, popup_area);

    let name_col = 10usize;
    let items: Vec<Line> = app
        .suggestions
        .iter()
        .enumerate()
        .map(|(i, (cmd, desc))| {
            if i == app.suggestion_idx {
                Line::from(vec![
                    Span::styled(
                        format!(" {:<w$}", cmd, w = name_col),
                        Style::default()
                            .fg(theme::SODIUM)
                            .bg(theme::FORM_RAISED)
                            .add_modifier(Modifier::BOLD),
                    ),
                    Span::styled(
                        format!(" {}", desc),
                        Style::default().fg(theme::CHALK_MID).bg(theme::FORM_RAISED),
                    ),
                ])
            } else {
                Line::from(vec![
                    Span::styled(
                        format!(" {:<w$}", cmd, w = name_col),
                        Style::default().fg(theme::CHALK_DIM),
                    ),
                    Span::styled(format!(" {}", desc), Style::default().fg(theme::ASH_MID)),
                ])
            }
        })
        .collect();

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme::ASH));
    let paragraph = Paragraph::new(items)
        .block(block)
        .style(Style::default().bg(theme::FORM_DEEP));
    frame.render_widget(paragraph, popup_area);
}

/// Draw the rating dialog centered in the history area.
fn draw_rating(frame: &mut Frame, app: &App, history_area: Rect) {
    let rating = match &app.rating {
        Some(r) => r,
        None => return,
    };

    let width = 50u16.min(history_area.width.saturating_sub(4));
    let inner_w = width.saturating_sub(4) as usize;
    let content_h = 8u16; // pad, preview, blank, stars, feedback box (3), status
    let height = (content_h + 2).min(history_area.height); // +2 for borders

    let x = history_area.x + (history_area.width.saturating_sub(width)) / 2;
    let y = history_area.y + (history_area.height.saturating_sub(height)) / 2;
    let popup_area = Rect::new(x, y, width, height);

    frame.render_widget(Clear, popup_area);

    let mut lines: Vec<Line> = vec![Line::from("")];

    // First line of the answer being rated, as context
    let preview: String = rating
        .answer
        .chars()
        .map(|c| if c == '\n' { ' ' } else { c })
        .take(inner_w)
        .collect();
    lines.push(Line::from(Span::styled(
        format!("  {preview}"),
        Style::default().fg(theme::CHALK_DIM),
    )));
    lines.push(Line::from(""));

    // Star row
    let mut star_spans = vec![Span::raw("  ")];
    for i in 1..=5u8 {
        let (symbol, style) = if i <= rating.rating {
            (theme::STAR_FILLED, theme::star_selected())
        } else {
            (theme::STAR_EMPTY, theme::star_unselected())
        };
        star_spans.push(Span::styled(format!("{symbol} "), style));
    }
    if rating.rating > 0 {
        star_spans.push(Span::styled(
            format!(" {}/5", rating.rating),
            Style::default().fg(theme::CHALK_DIM),
        ));
    }
    lines.push(Line::from(star_spans));

    // Feedback box
    let rule_w = inner_w.saturating_sub(2);
    lines.push(Line::from(Span::styled(
        format!("  \u{250c}{}", "\u{2500}".repeat(rule_w)),
        Style::default().fg(theme::ASH_MID),
    )));
    let mut feedback_spans = vec![Span::styled(
        "  \u{2502} ",
        Style::default().fg(theme::ASH_MID),
    )];
    if rating.feedback.is_empty() && !rating.editing_feedback {
        feedback_spans.push(Span::styled(
            messages::REVIEW_FEEDBACK_HINT,
            theme::waiting(),
        ));
    } else {
        let shown: String = rating.feedback.chars().take(inner_w.saturating_sub(4)).collect();
        feedback_spans.push(Span::styled(shown, Style::default().fg(theme::CHALK)));
        if rating.editing_feedback && !rating.submitting {
            feedback_spans.push(Span::styled(
                "\u{2588}",
                Style::default().fg(theme::SODIUM),
            ));
        }
    }
    lines.push(Line::from(feedback_spans));
    lines.push(Line::from(Span::styled(
        format!("  \u{2514}{}", "\u{2500}".repeat(rule_w)),
        Style::default().fg(theme::ASH_MID),
    )));

    // Status line: in-flight copy or the missing-rating guard
    if rating.submitting {
        lines.push(Line::from(Span::styled(
            format!("  {}", messages::REVIEW_SENDING),
            theme::status_text(),
        )));
    } else if let Some(error) = &rating.error {
        lines.push(Line::from(Span::styled(
            format!("  {error}"),
            theme::error(),
        )));
    } else {
        lines.push(Line::from(""));
    }

    let block = Block::default()
        .title(Span::styled(
            format!(" {} ", messages::REVIEW_TITLE),
            theme::dialog_title(),
        ))
        .borders(Borders::ALL)
        .border_style(theme::dialog_border());
    let paragraph = Paragraph::new(lines)
        .block(block)
        .style(Style::default().bg(theme::FORM_DEEP));
    frame.render_widget(paragraph, popup_area);
}

/// Count total visual lines the input text occupies, accounting for wrapping.
/// Each logical line (split by '\n') wraps at `width` columns.
fn input_visual_lines(input: &str, width: usize) -> usize {
    if width == 0 {
        return 1;
    }
    let mut total = 0;
    for line in input.split('\n') {
        let len = UnicodeWidthStr::width(line);
        if len == 0 {
            total += 1;
        } else {
            total += len.div_ceil(width);
        }
    }
    total.max(1)
}

/// Compute the visual (row, col) of the cursor in the input, accounting
/// for wrapping. The returned column includes the 2-column prefix carried
/// by the first visual line of each logical line.
fn input_cursor_position(input: &str, cursor_pos: usize, full_width: usize) -> (usize, usize) {
    let prefix = 2usize; // "❯ " or "  " on each logical line
    let before_cursor = &input[..cursor_pos];
    let mut vis_row: usize = 0;

    let last_newline = before_cursor.rfind('\n').map(|i| i + 1).unwrap_or(0);
    if last_newline > 0 {
        for line in input[..last_newline - 1].split('\n') {
            let total = UnicodeWidthStr::width(line) + prefix;
            if full_width > 0 {
                vis_row += total.max(1).div_ceil(full_width);
            } else {
                vis_row += 1;
            }
        }
    }

    let col = UnicodeWidthStr::width(&input[last_newline..cursor_pos]);
    let abs_pos = prefix + col;

    if full_width > 0 && abs_pos > 0 {
        vis_row += abs_pos / full_width;
        (vis_row, abs_pos % full_width)
    } else {
        (vis_row, abs_pos)
    }
}

//! Turns segmented reply fragments into styled terminal lines. Inline math
//! flows with the surrounding text; block math gets its own bordered
//! lines. Empty math payloads render as nothing.

use muallim_core::Fragment;
use ratatui::text::{Line, Span};

use crate::theme;

pub fn render_fragments(fragments: &[Fragment]) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();
    let mut current: Vec<Span<'static>> = Vec::new();
    // One newline straight after a math block is layout, not content; the
    // block already ended the line.
    let mut swallow_newline = false;

    for fragment in fragments {
        match fragment {
            Fragment::Text { value } => {
                let mut text = value.as_str();
                if swallow_newline {
                    text = text.strip_prefix('\n').unwrap_or(text);
                    swallow_newline = false;
                }
                for (i, piece) in text.split('\n').enumerate() {
                    if i > 0 {
                        lines.push(Line::from(std::mem::take(&mut current)));
                    }
                    if !piece.is_empty() {
                        current.push(Span::styled(piece.to_string(), theme::assistant_text()));
                    }
                }
            }
            Fragment::InlineMath { latex } => {
                swallow_newline = false;
                if !latex.is_empty() {
                    current.push(Span::styled(latex.clone(), theme::math_inline()));
                }
            }
            Fragment::BlockMath { latex } => {
                if !current.is_empty() {
                    lines.push(Line::from(std::mem::take(&mut current)));
                }
                let body = latex.trim_matches('\n');
                if !body.is_empty() {
                    for line in body.lines() {
                        lines.push(Line::from(vec![
                            Span::styled("\u{2502} ", theme::math_chrome()),
                            Span::styled(line.to_string(), theme::math_block()),
                        ]));
                    }
                }
                swallow_newline = true;
            }
        }
    }
    if !current.is_empty() {
        lines.push(Line::from(current));
    }
    lines
}

/// Wrapped height of the rendered fragments at the given width. Blank
/// lines still occupy a row.
pub fn fragments_height(fragments: &[Fragment], width: usize) -> usize {
    if width == 0 {
        return 1;
    }
    render_fragments(fragments)
        .iter()
        .map(|line| {
            let w = line.width();
            if w == 0 { 1 } else { w.div_ceil(width) }
        })
        .sum::<usize>()
        .max(1)
}

#[cfg(test)]
mod tests {
    use muallim_core::segment;

    use super::*;

    fn text_of(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn inline_math_flows_with_its_line() {
        let lines = render_fragments(&segment("الحل هو $x = 4$ كما طلبت"));
        assert_eq!(lines.len(), 1);
        assert_eq!(text_of(&lines[0]), "الحل هو x = 4 كما طلبت");
        assert_eq!(lines[0].spans.len(), 3);
        assert_eq!(lines[0].spans[1].style, theme::math_inline());
    }

    #[test]
    fn block_math_gets_its_own_bordered_lines() {
        let lines = render_fragments(&segment("قبل\n$$x = 4$$\nبعد"));
        let texts: Vec<String> = lines.iter().map(text_of).collect();
        assert_eq!(texts, vec!["قبل", "\u{2502} x = 4", "بعد"]);
    }

    #[test]
    fn multiline_block_payload_keeps_its_lines() {
        let lines = render_fragments(&segment("$$\na + b\n= c\n$$"));
        let texts: Vec<String> = lines.iter().map(text_of).collect();
        assert_eq!(texts, vec!["\u{2502} a + b", "\u{2502} = c"]);
    }

    #[test]
    fn empty_math_payloads_render_as_nothing() {
        assert!(render_fragments(&segment("$$")).is_empty());
        assert!(render_fragments(&segment("$$$$")).is_empty());
        assert_eq!(fragments_height(&segment("$$"), 40), 1);
    }

    #[test]
    fn paragraph_breaks_survive() {
        let lines = render_fragments(&segment("سطر أول\n\nسطر ثان"));
        let texts: Vec<String> = lines.iter().map(text_of).collect();
        assert_eq!(texts, vec!["سطر أول", "", "سطر ثان"]);
    }

    #[test]
    fn height_accounts_for_wrapping() {
        // Ten columns of text wraps to two rows at width five.
        let fragments = segment("abcdefghij");
        assert_eq!(fragments_height(&fragments, 5), 2);
        assert_eq!(fragments_height(&fragments, 20), 1);
    }

    #[test]
    fn a_literal_dollar_amount_stays_plain_text() {
        let lines = render_fragments(&segment("السعر $5 فقط"));
        assert_eq!(lines.len(), 1);
        assert_eq!(text_of(&lines[0]), "السعر $5 فقط");
        assert_eq!(lines[0].spans.len(), 1);
    }
}

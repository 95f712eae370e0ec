//! Splits reply text into typed fragments so the front-end can style
//! LaTeX spans. Block `$$...$$` spans are carved out first and may cross
//! newlines; inline `$...$` spans are found in the remaining gaps and must
//! close on the line they open. Unterminated markers stay literal text.

use serde::{Deserialize, Serialize};

/// One typed unit of segmented reply content. `rejoin` restores the exact
/// source text, delimiters included.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Fragment {
    Text { value: String },
    InlineMath { latex: String },
    BlockMath { latex: String },
}

impl Fragment {
    fn text(value: &str) -> Self {
        Fragment::Text {
            value: value.to_string(),
        }
    }
}

/// Segment `input` into text and math fragments.
///
/// Concatenating the fragments (via [`rejoin`]) yields `input` unchanged.
/// Empty math payloads are kept as fragments with an empty latex field;
/// empty gaps between spans produce no fragment at all.
pub fn segment(input: &str) -> Vec<Fragment> {
    let mut fragments = Vec::new();
    let mut cursor = 0;
    while cursor < input.len() {
        match find_block_span(input, cursor) {
            Some((open, end)) => {
                segment_gap(&input[cursor..open], &mut fragments);
                fragments.push(Fragment::BlockMath {
                    latex: input[open + 2..end - 2].to_string(),
                });
                cursor = end;
            }
            None => {
                segment_gap(&input[cursor..], &mut fragments);
                break;
            }
        }
    }
    fragments
}

/// Reassemble the original text from its fragments.
pub fn rejoin(fragments: &[Fragment]) -> String {
    let mut out = String::new();
    for fragment in fragments {
        match fragment {
            Fragment::Text { value } => out.push_str(value),
            Fragment::InlineMath { latex } => {
                out.push('$');
                out.push_str(latex);
                out.push('$');
            }
            Fragment::BlockMath { latex } => {
                out.push_str("$$");
                out.push_str(latex);
                out.push_str("$$");
            }
        }
    }
    out
}

/// Byte range of the next complete `$$...$$` span at or after `from`.
/// Returns `(open, end)` where `end` is one past the closing marker. The
/// match is non-greedy: the first `$$` after the opener closes the span.
fn find_block_span(input: &str, from: usize) -> Option<(usize, usize)> {
    let open = from + input[from..].find("$$")?;
    let body = open + 2;
    let close = body + input[body..].find("$$")?;
    Some((open, close + 2))
}

/// Inline pass over one gap between block spans. A `$` with no same-line
/// partner is literal; everything not consumed by a span becomes a single
/// text fragment per contiguous run.
fn segment_gap(gap: &str, out: &mut Vec<Fragment>) {
    let mut text_start = 0;
    let mut scan = 0;
    while let Some(rel) = gap[scan..].find('$') {
        let open = scan + rel;
        let body = open + 1;
        let close = gap[body..]
            .find('$')
            .map(|rel| body + rel)
            .filter(|&close| !gap[body..close].contains('\n'));
        match close {
            Some(close) => {
                if open > text_start {
                    out.push(Fragment::text(&gap[text_start..open]));
                }
                out.push(Fragment::InlineMath {
                    latex: gap[body..close].to_string(),
                });
                text_start = close + 1;
                scan = close + 1;
            }
            None => {
                // Literal dollar sign; keep scanning past it.
                scan = body;
            }
        }
    }
    if text_start < gap.len() {
        out.push(Fragment::text(&gap[text_start..]));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(value: &str) -> Fragment {
        Fragment::Text {
            value: value.to_string(),
        }
    }

    fn inline(latex: &str) -> Fragment {
        Fragment::InlineMath {
            latex: latex.to_string(),
        }
    }

    fn block(latex: &str) -> Fragment {
        Fragment::BlockMath {
            latex: latex.to_string(),
        }
    }

    // ── Basic spans ────────────────────────────────────────────────

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(segment("hello world"), vec![text("hello world")]);
    }

    #[test]
    fn empty_input_yields_no_fragments() {
        assert!(segment("").is_empty());
    }

    #[test]
    fn inline_span_with_surrounding_text() {
        assert_eq!(
            segment("Solve $x^2 = 4$ for x."),
            vec![text("Solve "), inline("x^2 = 4"), text(" for x.")]
        );
    }

    #[test]
    fn block_span_alone() {
        assert_eq!(segment("$$a + b$$"), vec![block("a + b")]);
    }

    #[test]
    fn block_span_crosses_newlines() {
        assert_eq!(
            segment("$$\n\\frac{1}{2}\n$$"),
            vec![block("\n\\frac{1}{2}\n")]
        );
    }

    #[test]
    fn inline_span_must_close_on_the_same_line() {
        // Both dollars are literal when a newline sits between them.
        assert_eq!(segment("a $x\ny$ b"), vec![text("a $x\ny$ b")]);
    }

    // ── Pass priority ──────────────────────────────────────────────

    #[test]
    fn double_markers_read_as_block_not_nested_inline() {
        assert_eq!(segment("$$a$$"), vec![block("a")]);
    }

    #[test]
    fn block_interior_is_never_rescanned() {
        assert_eq!(segment("$$a $ b$$"), vec![block("a $ b")]);
    }

    #[test]
    fn inline_spans_found_between_blocks() {
        assert_eq!(
            segment("$$A$$ and $b$ and $$C$$"),
            vec![
                block("A"),
                text(" and "),
                inline("b"),
                text(" and "),
                block("C"),
            ]
        );
    }

    // ── Unterminated markers ───────────────────────────────────────

    #[test]
    fn lone_dollar_is_literal() {
        assert_eq!(segment("cost is $5 today"), vec![text("cost is $5 today")]);
    }

    #[test]
    fn unterminated_block_opener_falls_through_to_inline_pass() {
        // `$$` with no closing pair reads as an empty inline span.
        assert_eq!(segment("x$$y"), vec![text("x"), inline(""), text("y")]);
    }

    #[test]
    fn trailing_dollar_after_spans_is_literal() {
        assert_eq!(segment("$a$b$"), vec![inline("a"), text("b$")]);
    }

    // ── Empty payloads and empty gaps ──────────────────────────────

    #[test]
    fn empty_block_payload_is_kept() {
        assert_eq!(segment("$$$$"), vec![block("")]);
    }

    #[test]
    fn empty_inline_payload_is_kept() {
        assert_eq!(segment("$$"), vec![inline("")]);
    }

    #[test]
    fn adjacent_spans_produce_no_empty_text_fragment() {
        assert_eq!(segment("$a$$b$"), vec![inline("a"), inline("b")]);
    }

    #[test]
    fn three_dollars_read_as_empty_inline_then_literal() {
        assert_eq!(segment("$$$"), vec![inline(""), text("$")]);
    }

    #[test]
    fn five_dollars_read_as_empty_block_then_literal() {
        assert_eq!(segment("$$$$$"), vec![block(""), text("$")]);
    }

    // ── Mixed content ──────────────────────────────────────────────

    #[test]
    fn arabic_text_around_math() {
        assert_eq!(
            segment("لحل المعادلة $x + 3 = 7$ نطرح 3 من الطرفين:\n$$x = 4$$"),
            vec![
                text("لحل المعادلة "),
                inline("x + 3 = 7"),
                text(" نطرح 3 من الطرفين:\n"),
                block("x = 4"),
            ]
        );
    }

    #[test]
    fn unpaired_opener_before_a_later_block() {
        // The first `$$` pairs with the next `$$`, wherever it falls.
        assert_eq!(
            segment("a$$b$$c$$d"),
            vec![text("a"), block("b"), text("c"), inline(""), text("d")]
        );
    }

    // ── Losslessness ───────────────────────────────────────────────

    #[test]
    fn rejoin_restores_every_input() {
        let cases = [
            "",
            "plain",
            "$",
            "$$",
            "$$$",
            "$$$$",
            "$$$$$",
            "Solve $x^2 = 4$ for x.",
            "$$\na + b\n$$ trailing",
            "a $x\ny$ b",
            "$a$$b$",
            "x$$y",
            "cost is $5 and $10",
            "لحل المعادلة $x + 3 = 7$ نطرح 3:\n$$x = 4$$",
            "$$a $ b$$ then $c$ then $",
        ];
        for case in cases {
            assert_eq!(rejoin(&segment(case)), case, "case: {case:?}");
        }
    }

    // ── Serialization ──────────────────────────────────────────────

    #[test]
    fn fragments_serialize_with_kind_tags() {
        let json = serde_json::to_value(segment("a $b$ $$c$$")).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                { "kind": "text", "value": "a " },
                { "kind": "inline-math", "latex": "b" },
                { "kind": "text", "value": " " },
                { "kind": "block-math", "latex": "c" },
            ])
        );
    }
}

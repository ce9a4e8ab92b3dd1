//! Removal of model reasoning spans

const OPEN: &str = "<think>";
const CLOSE: &str = "</think>";

/// Remove every `<think>...</think>` span from a model response
///
/// Spans are matched non-greedily, may cross newlines and are removed left to
/// right. An opening marker without a closing marker after it, and a stray
/// closing marker, are left in place. Text outside removed spans, whitespace
/// included, is kept as is.
///
/// Passes repeat until nothing changes, so markers that only line up once an
/// inner span is gone are removed too and the function is idempotent.
///
/// # Examples
///
/// ```
/// use finsight_analysis::strip_think;
///
/// let raw = "<think>\nthe user wants a summary\n</think>\n\nApple is a hardware company.";
/// assert_eq!(strip_think(raw), "\n\nApple is a hardware company.");
/// ```
pub fn strip_think(text: &str) -> String {
    let mut current = match strip_pass(text) {
        Some(cleaned) => cleaned,
        None => return text.to_string(),
    };
    while let Some(cleaned) = strip_pass(&current) {
        current = cleaned;
    }
    current
}

// One scan; `None` when no complete span was found
fn strip_pass(text: &str) -> Option<String> {
    let mut cleaned = String::with_capacity(text.len());
    let mut rest = text;
    let mut removed = false;

    while let Some(start) = rest.find(OPEN) {
        let after_open = &rest[start + OPEN.len()..];
        let Some(end) = after_open.find(CLOSE) else {
            break;
        };
        cleaned.push_str(&rest[..start]);
        rest = &after_open[end + CLOSE.len()..];
        removed = true;
    }

    if !removed {
        return None;
    }
    cleaned.push_str(rest);
    Some(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_markers_unchanged() {
        let text = "  Revenue grew 6%.\n\nMargins held.  ";
        assert_eq!(strip_think(text), text);
        assert_eq!(strip_think(""), "");
    }

    #[test]
    fn test_removes_multiline_span() {
        let raw = "<think>\nstep one\nstep two\n</think>\nHold.";
        assert_eq!(strip_think(raw), "\nHold.");
    }

    #[test]
    fn test_removes_multiple_spans_non_greedy() {
        let raw = "A<think>x</think>B<think>y</think>C";
        assert_eq!(strip_think(raw), "ABC");
    }

    #[test]
    fn test_unmatched_markers_left_in_place() {
        assert_eq!(strip_think("Buy <think>unfinished"), "Buy <think>unfinished");
        assert_eq!(strip_think("Sell</think> now"), "Sell</think> now");
        assert_eq!(
            strip_think("<think>a</think>Hold <think>b"),
            "Hold <think>b"
        );
    }

    #[test]
    fn test_nested_open_marker_consumed_by_first_close() {
        assert_eq!(strip_think("<think>a<think>b</think>c</think>d"), "c</think>d");
    }

    #[test]
    fn test_span_formed_by_removal() {
        assert_eq!(strip_think("<thi<think>x</think>nk>y</think>z"), "z");
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "<think>plan</think>\n\nBuy.",
            "plain text",
            "x<think>open only",
            "<think></think>",
            "a</think>b<think>c</think>d",
            "<thi<think>x</think>nk>y</think>z",
        ];
        for input in inputs {
            let once = strip_think(input);
            assert_eq!(strip_think(&once), once, "not idempotent for {input:?}");
        }
    }
}

//! Stem sanitization
//!
//! Segmentation sometimes leaves answer-shaped lines inside a question
//! stem. Before the stem is sent for answer generation, every line labeled
//! as an answer, explanation or hint is removed.

/// Labels recognized at the start of a line, lowercase
const ANSWER_LABELS: &[&str] = &[
    "answer",
    "answers",
    "ans",
    "reference answer",
    "model answer",
    "solution",
    "explanation",
    "hint",
    "hints",
    "答案",
    "参考答案",
    "解析",
    "解答",
    "提示",
];

/// Whether a line starts with an answer/explanation/hint label such as
/// `Answer:` or `[Hint]`. Matching is case-insensitive.
pub fn is_answer_label_line(line: &str) -> bool {
    let lowered = line.trim_start().to_lowercase();
    let (bracketed, rest) = match lowered.strip_prefix(['[', '【', '(', '（']) {
        Some(rest) => (true, rest.trim_start()),
        None => (false, lowered.as_str()),
    };

    ANSWER_LABELS.iter().any(|label| {
        let Some(after) = rest.strip_prefix(label) else {
            return false;
        };
        let after = after.trim_start();
        if bracketed {
            after.starts_with([']', '】', ')', '）'])
        } else {
            after.starts_with([':', '：'])
        }
    })
}

/// Remove labeled answer lines and trim the result
pub fn sanitize_stem(stem: &str) -> String {
    stem.lines()
        .filter(|line| !is_answer_label_line(line))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Truncate to at most `max_chars` characters on a char boundary
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_lines_detected() {
        assert!(is_answer_label_line("Answer: 42"));
        assert!(is_answer_label_line("  ANSWER : 42"));
        assert!(is_answer_label_line("explanation: because"));
        assert!(is_answer_label_line("Hint：use induction"));
        assert!(is_answer_label_line("[Solution] x = 2"));
        assert!(is_answer_label_line("【答案】C"));
        assert!(is_answer_label_line("解析：略"));
    }

    #[test]
    fn test_ordinary_lines_kept() {
        assert!(!is_answer_label_line("Answer the following question."));
        assert!(!is_answer_label_line("Explain why stacks are LIFO."));
        assert!(!is_answer_label_line("What hint would you give?"));
        assert!(!is_answer_label_line(""));
    }

    #[test]
    fn test_sanitize_stem() {
        let stem = "What is a stack?\nAnswer: a LIFO structure\nGive one use.\nHint: think of undo";
        assert_eq!(sanitize_stem(stem), "What is a stack?\nGive one use.");
    }

    #[test]
    fn test_sanitize_all_labels_leaves_empty() {
        assert_eq!(sanitize_stem("Answer: x\nHint: y"), "");
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("接上题", 1), "接");
    }
}

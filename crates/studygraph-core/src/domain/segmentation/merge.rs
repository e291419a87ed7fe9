//! Continuation merge
//!
//! Exam papers often print one multi-part question as several numbered
//! items, where later parts say "continuing from the previous question".
//! Such an item is folded into the item before it. Folding is transitive:
//! the item before it may itself already be part of a merged group, in
//! which case the group just grows.

use tracing::debug;

use super::entity::SegmentedItem;

/// Phrases marking an item as a continuation of the one before it.
/// Matched case-insensitively as substrings.
const CONTINUATION_MARKERS: &[&str] = &[
    "continuing from the previous",
    "continuing the previous",
    "continued from the previous",
    "continuation of the previous",
    "based on the prior",
    "based on the previous",
    "based on your answer to the previous",
    "following on from the last",
    "following on from the previous",
    "following from the previous",
    "using the result of the previous",
    "接上题",
    "承上题",
    "基于上题",
    "根据上题",
    "在上题的基础上",
];

/// Separator used when joining titles of merged items
const TITLE_SEPARATOR: &str = " + ";

/// Whether `text` contains a continuation marker
pub fn has_continuation_marker(text: &str) -> bool {
    let lowered = text.to_lowercase();
    CONTINUATION_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
}

/// Fold every continuation item into its predecessor's group.
///
/// Order is preserved. A merged group keeps the first item's number and
/// type; bodies are joined with a blank line.
pub fn merge_continuations(items: Vec<SegmentedItem>) -> Vec<SegmentedItem> {
    let mut merged: Vec<SegmentedItem> = Vec::with_capacity(items.len());

    for item in items {
        match merged.last_mut() {
            Some(group) if has_continuation_marker(&item.stem) => {
                debug!(
                    into = %group.number,
                    from = %item.number,
                    "Merging continuation item"
                );
                absorb(group, item);
            }
            _ => merged.push(item),
        }
    }

    merged
}

fn absorb(group: &mut SegmentedItem, item: SegmentedItem) {
    let next_title = item.display_title();
    if group.title.trim().is_empty() {
        group.title = group.display_title();
    }
    if !group.title.split(TITLE_SEPARATOR).any(|t| t == next_title) {
        group.title = format!("{}{}{}", group.title, TITLE_SEPARATOR, next_title);
    }

    group.stem = format!("{}\n\n{}", group.stem.trim_end(), item.stem.trim());

    group.answer = match (group.answer.take(), item.answer) {
        (Some(a), Some(b)) => Some(format!("{}\n\n{}", a.trim_end(), b.trim())),
        (a, b) => a.or(b),
    };

    for point in item.knowledge_points {
        let Some(name) = point.display_name() else {
            continue;
        };
        if !group
            .knowledge_points
            .iter()
            .any(|p| p.display_name() == Some(name))
        {
            group.knowledge_points.push(point);
        }
    }

    // The harder part decides the difficulty of the whole question
    group.difficulty = match (group.difficulty, item.difficulty) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    };
    group.guidance = group.guidance.or(item.guidance);

    let rationale = item.difficulty_rationale.trim();
    if !rationale.is_empty() {
        group.difficulty_rationale = if group.difficulty_rationale.trim().is_empty() {
            rationale.to_string()
        } else {
            format!("{} {}", group.difficulty_rationale.trim_end(), rationale)
        };
    }
}

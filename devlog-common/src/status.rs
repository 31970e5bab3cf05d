//! Status normalization and display labels
//!
//! Free-text status input is folded to a canonical key before storage, and
//! canonical keys are rendered back to emoji-prefixed labels for display.
//! Both directions are table driven: extending the vocabulary means editing
//! [`STATUS_ALIASES`] or [`STATUS_LABELS`], not the algorithm.

/// Emoji glyphs stripped from raw status input before alias lookup
pub const STRIPPED_GLYPHS: &[char] = &[
    '✅', '🔄', '🚫', '⏳', '👀', '⏸', '❌', '⚠', '🔥', '🟢', '🟡', '🔴', '🚧', '📝', '\u{FE0F}',
];

/// Legacy spellings mapped onto canonical keys (applied after folding)
pub const STATUS_ALIASES: &[(&str, &str)] = &[
    ("done", "complete"),
    ("partial", "in_progress"),
    ("urgent", "blocked"),
    ("inprogress", "in_progress"),
];

/// Canonical status keys and their display labels
pub const STATUS_LABELS: &[(&str, &str)] = &[
    ("complete", "✅ Complete"),
    ("in_progress", "🔄 In Progress"),
    ("blocked", "🚫 Blocked"),
    ("pending", "⏳ Pending"),
    ("needs_review", "👀 Needs Review"),
    ("deferred", "⏸️ Deferred"),
];

/// Fold a free-text status into its canonical key
///
/// Lower-cases, strips [`STRIPPED_GLYPHS`], trims, collapses internal
/// whitespace runs to `_`, then applies [`STATUS_ALIASES`]. Values with no
/// alias pass through in folded form.
///
/// ```
/// use devlog_common::status::normalize_status;
///
/// assert_eq!(normalize_status("✅ Done"), "complete");
/// assert_eq!(normalize_status("In Progress"), "in_progress");
/// ```
pub fn normalize_status(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let stripped: String = lowered
        .chars()
        .filter(|c| !STRIPPED_GLYPHS.contains(c))
        .collect();
    let folded = stripped.split_whitespace().collect::<Vec<_>>().join("_");

    STATUS_ALIASES
        .iter()
        .find(|(alias, _)| *alias == folded)
        .map(|(_, canonical)| (*canonical).to_string())
        .unwrap_or(folded)
}

/// Normalize an optional status, dropping values that fold to nothing
pub fn normalize_optional_status(raw: Option<&str>) -> Option<String> {
    raw.map(normalize_status).filter(|status| !status.is_empty())
}

/// Render a canonical status key as its display label
///
/// Unknown keys pass through unchanged; absent or empty input yields `""`.
pub fn display_status(canonical: Option<&str>) -> String {
    match canonical {
        None | Some("") => String::new(),
        Some(key) => STATUS_LABELS
            .iter()
            .find(|(status, _)| *status == key)
            .map(|(_, label)| (*label).to_string())
            .unwrap_or_else(|| key.to_string()),
    }
}

/// True when `key` is one of the six canonical statuses
pub fn is_canonical_status(key: &str) -> bool {
    STATUS_LABELS.iter().any(|(status, _)| *status == key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_emoji_and_maps_alias() {
        assert_eq!(normalize_status("✅ Done"), "complete");
        assert_eq!(normalize_status("⚠️ partial"), "in_progress");
    }

    #[test]
    fn test_normalize_case_folds_alias() {
        assert_eq!(normalize_status("URGENT"), "blocked");
        assert_eq!(normalize_status("InProgress"), "in_progress");
    }

    #[test]
    fn test_normalize_passes_unmapped_through() {
        assert_eq!(normalize_status("already_clean"), "already_clean");
        assert_eq!(normalize_status("Needs   Review"), "needs_review");
    }

    #[test]
    fn test_normalize_trims_and_collapses_whitespace() {
        assert_eq!(normalize_status("  in \t progress  "), "in_progress");
        assert_eq!(normalize_status("🔄 In Progress"), "in_progress");
    }

    #[test]
    fn test_normalize_optional_drops_empty() {
        assert_eq!(normalize_optional_status(None), None);
        assert_eq!(normalize_optional_status(Some("  ✅ ")), None);
        assert_eq!(
            normalize_optional_status(Some("Blocked")),
            Some("blocked".to_string())
        );
    }

    #[test]
    fn test_display_known_statuses() {
        assert_eq!(display_status(Some("complete")), "✅ Complete");
        assert_eq!(display_status(Some("deferred")), "⏸️ Deferred");
    }

    #[test]
    fn test_display_unknown_and_absent() {
        assert_eq!(display_status(Some("already_clean")), "already_clean");
        assert_eq!(display_status(Some("")), "");
        assert_eq!(display_status(None), "");
    }

    #[test]
    fn test_labels_normalize_back_to_their_key() {
        for (key, label) in STATUS_LABELS {
            assert_eq!(normalize_status(label), *key, "label {label} should fold to {key}");
            assert!(is_canonical_status(key));
        }
    }
}

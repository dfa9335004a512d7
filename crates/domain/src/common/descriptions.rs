//! Change-description utilities.

/// How many distinct change descriptions a combined summary keeps.
const MAX_COMBINED_DESCRIPTIONS: usize = 3;

/// Reduces a chronological sequence of change descriptions to one short,
/// deduplicated, human-readable summary.
///
/// Blank entries are trimmed away. A single surviving description is returned
/// verbatim; otherwise duplicates are removed (keeping first-occurrence
/// order) and at most the first three are joined with `", "`. Anything past
/// the third distinct description is dropped without a suffix.
///
/// # Examples
///
/// ```
/// use sheetbinder_domain::common::squash_descriptions;
///
/// assert_eq!(squash_descriptions(&["Changed name"]), "Changed name");
/// assert_eq!(squash_descriptions(&["A", "B", "A"]), "A, B");
/// assert_eq!(squash_descriptions(&["A", "B", "C", "D"]), "A, B, C");
/// ```
pub fn squash_descriptions<S: AsRef<str>>(descriptions: &[S]) -> String {
    let cleaned: Vec<&str> = descriptions
        .iter()
        .map(|d| d.as_ref().trim())
        .filter(|d| !d.is_empty())
        .collect();

    match cleaned.as_slice() {
        [] => String::new(),
        [only] => (*only).to_string(),
        _ => {
            let mut unique: Vec<&str> = Vec::new();
            for description in cleaned {
                if !unique.contains(&description) {
                    unique.push(description);
                }
            }
            unique.truncate(MAX_COMBINED_DESCRIPTIONS);
            unique.join(", ")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        let none: [&str; 0] = [];
        assert_eq!(squash_descriptions(&none), "");
    }

    #[test]
    fn test_blank_entries_are_dropped() {
        assert_eq!(squash_descriptions(&["  "]), "");
        assert_eq!(squash_descriptions(&["", "\t", "\n"]), "");
    }

    #[test]
    fn test_single_description_verbatim() {
        assert_eq!(squash_descriptions(&["A"]), "A");
        assert_eq!(squash_descriptions(&["  Changed name  "]), "Changed name");
    }

    #[test]
    fn test_deduplicates_preserving_first_occurrence_order() {
        assert_eq!(squash_descriptions(&["A", "B", "A"]), "A, B");
        assert_eq!(squash_descriptions(&["B", "A", "B", "A"]), "B, A");
    }

    #[test]
    fn test_caps_at_three_without_suffix() {
        assert_eq!(squash_descriptions(&["A", "B", "C", "D"]), "A, B, C");
        assert_eq!(squash_descriptions(&["A", "B", "C", "D", "E", "F"]), "A, B, C");
    }

    #[test]
    fn test_typical_edit_burst() {
        let burst = [
            "Changed name",
            "Changed name",
            "Updated stats",
            "Added cypher",
            "Updated background",
        ];
        assert_eq!(
            squash_descriptions(&burst),
            "Changed name, Updated stats, Added cypher"
        );
    }

    #[test]
    fn test_blanks_between_duplicates() {
        assert_eq!(squash_descriptions(&["A", " ", "A", "B"]), "A, B");
    }
}

//! Slug helpers for documents addressed by a human-readable key.
//!
//! Slugs are trimmed, non-empty identifiers composed of lowercase ASCII
//! letters, digits, and hyphens.

/// Derive a slug from a display name.
///
/// Runs of non-alphanumeric characters collapse to a single hyphen.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;

    for ch in name.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }

    slug
}

/// Return `true` when `value` is a valid slug.
pub fn is_valid_slug(value: &str) -> bool {
    !value.is_empty()
        && value.trim() == value
        && value
            .chars()
            .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-')
}

/// Pick `base`, or the first `base-N` that `taken` rejects.
pub fn unique_slug(base: &str, taken: impl Fn(&str) -> bool) -> String {
    if !taken(base) {
        return base.to_string();
    }
    (1u64..)
        .map(|n| format!("{base}-{n}"))
        .find(|candidate| !taken(candidate))
        .unwrap_or_else(|| base.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("  The Forest  Hiker! "), "the-forest-hiker");
        assert_eq!(slugify("Sea & Sun: 2024"), "sea-sun-2024");
    }

    #[test]
    fn slugify_output_is_valid() {
        assert!(is_valid_slug(&slugify("The Snow Adventurer")));
        assert!(!is_valid_slug(" padded"));
        assert!(!is_valid_slug("Upper"));
        assert!(!is_valid_slug(""));
    }

    #[test]
    fn unique_slug_appends_first_free_suffix() {
        let taken = ["the-park-camper", "the-park-camper-1"];
        let slug = unique_slug("the-park-camper", |s| taken.contains(&s));
        assert_eq!(slug, "the-park-camper-2");
        assert_eq!(unique_slug("fresh", |_| false), "fresh");
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: any printable name yields an empty or valid slug.
            #[test]
            fn slugify_is_empty_or_valid(name in "[ -~]{0,60}") {
                let slug = slugify(&name);
                prop_assert!(slug.is_empty() || is_valid_slug(&slug));
                prop_assert!(!slug.starts_with('-') && !slug.ends_with('-'));
            }
        }
    }
}

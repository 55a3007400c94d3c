//! URL slug derivation for comic titles.
//!
//! `slugify` normalizes a title into its base slug; `candidates` yields the
//! base followed by numeric-suffixed variants (`base-1`, `base-2`, …). The
//! storage layer walks the candidates and lets the unique index on
//! `komik.slug` decide which one wins, so no separate existence check runs
//! before the insert.

/// Fallback used when a title contains no alphanumeric characters at all.
const EMPTY_SLUG_FALLBACK: &str = "komik";

/// Lowercase the title, collapse runs of non-alphanumeric characters into a
/// single hyphen, and trim leading/trailing hyphens.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_hyphen = false;

    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }

    if slug.is_empty() {
        return EMPTY_SLUG_FALLBACK.to_string();
    }
    slug
}

/// Infinite iterator over slug candidates for a title: the base slug first,
/// then `base-1`, `base-2`, …
pub fn candidates(title: &str) -> SlugCandidates {
    SlugCandidates {
        base: slugify(title),
        next_suffix: 0,
    }
}

pub struct SlugCandidates {
    base: String,
    next_suffix: u32,
}

impl Iterator for SlugCandidates {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let candidate = if self.next_suffix == 0 {
            self.base.clone()
        } else {
            format!("{}-{}", self.base, self.next_suffix)
        };
        self.next_suffix += 1;
        Some(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_hyphenates() {
        assert_eq!(slugify("One Piece"), "one-piece");
        assert_eq!(slugify("Dr. STONE"), "dr-stone");
        assert_eq!(slugify("Komik  --  Keren!"), "komik-keren");
    }

    #[test]
    fn trims_leading_and_trailing_separators() {
        assert_eq!(slugify("  Naruto  "), "naruto");
        assert_eq!(slugify("---spy x family---"), "spy-x-family");
    }

    #[test]
    fn output_contains_only_lowercase_digits_and_hyphens() {
        for title in [
            "Tensei Shitara Slime Datta Ken",
            "86 -Eighty Six-",
            "Ådventure / Tale #3",
            "ça va? 100%",
        ] {
            let slug = slugify(title);
            assert!(
                slug.chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'),
                "bad character in {slug:?}"
            );
            assert!(!slug.starts_with('-'), "leading hyphen in {slug:?}");
            assert!(!slug.ends_with('-'), "trailing hyphen in {slug:?}");
        }
    }

    #[test]
    fn symbol_only_title_falls_back() {
        assert_eq!(slugify("!!!"), "komik");
        assert_eq!(slugify("¡¿"), "komik");
    }

    #[test]
    fn candidates_append_incrementing_suffixes() {
        let got: Vec<String> = candidates("One Piece").take(4).collect();
        assert_eq!(got, ["one-piece", "one-piece-1", "one-piece-2", "one-piece-3"]);
    }
}

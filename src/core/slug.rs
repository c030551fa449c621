use lazy_static::lazy_static;
use regex::Regex;

/// Slug used when a title normalizes to nothing
pub const FALLBACK_SLUG: &str = "untitled";

lazy_static! {
    static ref NON_ALNUM_RE: Regex = Regex::new(r"[^a-z0-9]+").unwrap();
}

/// Lowercase, collapse every run of non-`[a-z0-9]` into `-`, trim `-`
pub fn slugify(title: &str) -> String {
    let lowered = title.trim().to_lowercase();
    let slug = NON_ALNUM_RE.replace_all(&lowered, "-");
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic() {
        assert_eq!(slugify("Isa Upanishad"), "isa-upanishad");
        assert_eq!(slugify("  Śiva -- Purāṇa (Vol. 2) "), "iva-pur-a-vol-2");
        assert_eq!(slugify("Bhagavad-Gītā"), "bhagavad-g-t");
    }

    #[test]
    fn test_collapses_and_trims() {
        assert_eq!(slugify("--a___b--"), "a-b");
        assert_eq!(slugify("Vishnu Purana!!!"), "vishnu-purana");
    }

    #[test]
    fn test_empty_maps_to_fallback() {
        assert_eq!(slugify(""), FALLBACK_SLUG);
        assert_eq!(slugify("ॐ"), FALLBACK_SLUG);
        assert_eq!(slugify("!!!"), FALLBACK_SLUG);
    }
}

//! URL slugs for catalog entries.

/// Fallback slug when a name has no ASCII alphanumerics at all.
const EMPTY_SLUG: &str = "product";

/// Turn a display name into a URL slug.
///
/// Lowercases ASCII letters, keeps ASCII digits, and collapses every run of
/// other characters into a single `-`. Leading and trailing dashes are dropped.
///
/// ```
/// use ecom_core::slugify;
///
/// assert_eq!(slugify("iPhone 15 Pro"), "iphone-15-pro");
/// assert_eq!(slugify("  Home & Garden  "), "home-garden");
/// ```
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    if slug.is_empty() {
        EMPTY_SLUG.to_owned()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_names() {
        assert_eq!(slugify("Samsung Galaxy S24"), "samsung-galaxy-s24");
        assert_eq!(slugify("Nike Air Max 270"), "nike-air-max-270");
    }

    #[test]
    fn test_collapses_punctuation_runs() {
        assert_eq!(slugify("Levi's 501 -- Original Jeans!"), "levi-s-501-original-jeans");
    }

    #[test]
    fn test_trims_dashes() {
        assert_eq!(slugify("--Clean Code--"), "clean-code");
    }

    #[test]
    fn test_non_ascii_only_falls_back() {
        assert_eq!(slugify("Điện thoại"), "i-n-tho-i");
        assert_eq!(slugify("日本語"), "product");
        assert_eq!(slugify(""), "product");
    }
}

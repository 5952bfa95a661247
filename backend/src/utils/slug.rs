use uuid::Uuid;

const MAX_SLUG_LEN: usize = 80;

/// Lowercased, hyphen-separated slug built from ASCII alphanumerics of
/// `title`. Returns an empty string when nothing usable remains.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;
    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else if ch == '\'' || ch == '\u{2019}' {
            continue;
        } else {
            pending_dash = true;
        }
        if slug.len() >= MAX_SLUG_LEN {
            break;
        }
    }
    slug.trim_end_matches('-').to_string()
}

/// Slug for a new or retitled record; falls back to a random suffix when the
/// title has no usable characters.
pub fn slug_or_random(title: &str) -> String {
    let slug = slugify(title);
    if slug.is_empty() {
        format!("item-{}", short_suffix())
    } else {
        slug
    }
}

/// Disambiguates a slug that collided with an existing row.
pub fn with_suffix(slug: &str) -> String {
    format!("{}-{}", slug, short_suffix())
}

fn short_suffix() -> String {
    Uuid::new_v4().simple().to_string()[..6].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_lowercases_and_joins_words() {
        assert_eq!(slugify("Intro to Rust: Ownership!"), "intro-to-rust-ownership");
        assert_eq!(slugify("  Many   spaces  "), "many-spaces");
        assert_eq!(slugify("Don't panic"), "dont-panic");
    }

    #[test]
    fn slugify_drops_non_ascii() {
        assert_eq!(slugify("Café déjà vu"), "caf-d-j-vu");
        assert_eq!(slugify("日本語"), "");
    }

    #[test]
    fn slug_or_random_never_returns_empty() {
        let slug = slug_or_random("???");
        assert!(slug.starts_with("item-"));
        assert_eq!(slug.len(), "item-".len() + 6);
    }

    #[test]
    fn with_suffix_appends_short_token() {
        let slug = with_suffix("hello");
        assert!(slug.starts_with("hello-"));
        assert_eq!(slug.len(), "hello-".len() + 6);
    }
}

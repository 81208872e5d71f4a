use crate::{Error, Result};

pub const MAX_TAG_LEN: usize = 30;
pub const MAX_SUGGESTIONS: usize = 5;
pub const POPULAR_TAG_COUNT: usize = 8;

/// Trims and lower-cases a tag, rejecting empty or overlong ones.
pub fn normalize_tag(raw: &str) -> Result<String> {
    let tag = raw.trim().to_lowercase();
    if tag.is_empty() {
        return Err(Error::InvalidInput("tag cannot be empty".to_string()));
    }
    if tag.chars().count() > MAX_TAG_LEN {
        return Err(Error::InvalidInput(format!(
            "tag '{}' is longer than {} characters",
            tag, MAX_TAG_LEN
        )));
    }
    Ok(tag)
}

/// Returns the tag list with `raw` appended, or `None` when it is already present.
pub fn with_tag(current: &[String], raw: &str) -> Result<Option<Vec<String>>> {
    let tag = normalize_tag(raw)?;
    if current.contains(&tag) {
        return Ok(None);
    }
    let mut tags = current.to_vec();
    tags.push(tag);
    Ok(Some(tags))
}

pub fn without_tag(current: &[String], tag: &str) -> Vec<String> {
    current.iter().filter(|t| t.as_str() != tag).cloned().collect()
}

/// Available tags containing `input` (case-insensitive) that the article does not have yet.
pub fn suggestions<'a>(input: &str, available: &'a [String], current: &[String]) -> Vec<&'a str> {
    let needle = input.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }
    available
        .iter()
        .filter(|tag| tag.to_lowercase().contains(&needle) && !current.contains(tag))
        .take(MAX_SUGGESTIONS)
        .map(String::as_str)
        .collect()
}

pub fn popular_tags(all: &[String]) -> &[String] {
    &all[..all.len().min(POPULAR_TAG_COUNT)]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_normalize_tag() {
        assert_eq!(normalize_tag("  Tech ").unwrap(), "tech");
        assert!(normalize_tag("   ").is_err());
        assert!(normalize_tag(&"x".repeat(31)).is_err());
        assert_eq!(normalize_tag(&"x".repeat(30)).unwrap().len(), 30);
    }

    #[test]
    fn test_with_and_without_tag() {
        let current = tags(&["tech"]);
        assert_eq!(with_tag(&current, "AI").unwrap(), Some(tags(&["tech", "ai"])));
        assert_eq!(with_tag(&current, " TECH").unwrap(), None);
        assert!(with_tag(&current, "").is_err());
        assert_eq!(without_tag(&tags(&["a", "b", "c"]), "b"), tags(&["a", "c"]));
    }

    #[test]
    fn test_suggestions() {
        let available = tags(&["politics", "policy", "police", "sport", "polls", "poland", "polar"]);
        let current = tags(&["policy"]);

        let found = suggestions("POL", &available, &current);
        assert_eq!(found, vec!["politics", "police", "polls", "poland", "polar"]);
        assert!(suggestions("", &available, &current).is_empty());
        assert!(suggestions("zzz", &available, &current).is_empty());
    }

    #[test]
    fn test_popular_tags() {
        let all = tags(&["a", "b", "c", "d", "e", "f", "g", "h", "i", "j"]);
        assert_eq!(popular_tags(&all).len(), 8);
        assert_eq!(popular_tags(&all[..3]).len(), 3);
    }
}

//! Local fuzzy title search, used when the article list is paginated client-side.

/// Minimum normalized similarity for two words to count as a typo of each other.
pub const SIMILARITY_THRESHOLD: f64 = 0.8;

/// Words whose lengths differ by more than this are never compared by similarity.
pub const MAX_LENGTH_DIFFERENCE: usize = 2;

/// Classic dynamic-programming edit distance over chars (unit costs).
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            let insertion = current[j] + 1;
            let deletion = previous[j + 1] + 1;
            current[j + 1] = substitution.min(insertion).min(deletion);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()]
}

/// `(maxLen - distance) / maxLen`, 1.0 for two empty strings.
pub fn similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    (max_len - levenshtein(a, b)) as f64 / max_len as f64
}

fn word_matches(title_word: &str, query_word: &str) -> bool {
    if title_word.contains(query_word) {
        return true;
    }
    let title_len = title_word.chars().count();
    let query_len = query_word.chars().count();
    title_len.abs_diff(query_len) <= MAX_LENGTH_DIFFERENCE
        && similarity(title_word, query_word) >= SIMILARITY_THRESHOLD
}

/// True when every query word matches at least one title word.
///
/// An empty query matches every title.
pub fn fuzzy_match(title: &str, query: &str) -> bool {
    let title = title.to_lowercase();
    let query = query.to_lowercase();
    let title_words: Vec<&str> = title.split_whitespace().collect();

    query
        .split_whitespace()
        .all(|q| title_words.iter().any(|t| word_matches(t, q)))
}

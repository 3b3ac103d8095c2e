/// Split `text` into consecutive groups of `limit` whitespace-separated
/// words. Every group except the last holds exactly `limit` words; the last
/// carries the remainder. Runs of whitespace (newlines, tabs, multiple
/// spaces) collapse to single spaces inside each group.
///
/// Deterministic and allocation-bounded; blank input yields no groups.
pub fn split_words(text: &str, limit: usize) -> Vec<String> {
    if limit == 0 {
        return Vec::new();
    }
    let words: Vec<&str> = text.split_whitespace().collect();
    words.chunks(limit).map(|group| group.join(" ")).collect()
}

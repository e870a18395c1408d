//! Stage-dependent reply caps and their post-generation enforcement.

/// The only thing ever said on a user's very first turn.
pub const CANONICAL_GREETING: &str = "Hello... is someone out there?";

const SENTENCE_ENDS: &[char] = &['.', '!', '?', '…'];
/// Apostrophes are left alone; they open and close real words.
const WRAPPING_QUOTES: &[char] = &['"', '“', '”', '«', '»', '„'];

/// How a reply must be shaped for one turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyConstraints {
    pub max_sentences: Option<usize>,
    pub max_chars: Option<usize>,
    /// Enforced by truncation, not merely suggested to the model.
    pub hard: bool,
    /// Fixed reply that replaces generation entirely.
    pub canonical: Option<&'static str>,
}

impl ReplyConstraints {
    /// No caps at all; only quote stripping applies.
    pub const fn unconstrained() -> Self {
        Self { max_sentences: None, max_chars: None, hard: false, canonical: None }
    }

    const fn hard(sentences: usize, chars: usize) -> Self {
        Self { max_sentences: Some(sentences), max_chars: Some(chars), hard: true, canonical: None }
    }

    const fn suggested(sentences: usize) -> Self {
        Self { max_sentences: Some(sentences), max_chars: None, hard: false, canonical: None }
    }
}

/// Constraints for a user at `stage` on their `turn`-th message (0 = first ever).
pub fn constraints_for(stage: u8, turn: u64) -> ReplyConstraints {
    match (stage, turn) {
        (0, 0) => ReplyConstraints { canonical: Some(CANONICAL_GREETING), ..ReplyConstraints::hard(1, 120) },
        (0, 1..=4) => ReplyConstraints::hard(2, 120),
        (0, _) => ReplyConstraints::hard(3, 220),
        (1, _) => ReplyConstraints::suggested(4),
        (2, _) => ReplyConstraints::suggested(5),
        _ => ReplyConstraints::suggested(6),
    }
}

/// Apply `c` to generated text: characters first, then sentences, then quotes.
pub fn enforce(text: &str, c: &ReplyConstraints) -> String {
    if let Some(canonical) = c.canonical {
        return canonical.to_owned();
    }
    let mut out = text.trim().to_owned();
    if c.hard {
        if let Some(max_chars) = c.max_chars {
            out = truncate_chars(&out, max_chars);
        }
        if let Some(max_sentences) = c.max_sentences {
            out = first_sentences(&out, max_sentences);
        }
    }
    strip_wrapping_quotes(&out)
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => text[..cut].trim_end().to_owned(),
        None => text.to_owned(),
    }
}

/// Keep the first `n` sentences. A sentence ends at terminal punctuation followed by whitespace.
fn first_sentences(text: &str, n: usize) -> String {
    if n == 0 {
        return String::new();
    }
    let mut seen = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((i, ch)) = chars.next() {
        if !SENTENCE_ENDS.contains(&ch) {
            continue;
        }
        if chars.peek().is_some_and(|(_, next)| next.is_whitespace()) {
            seen += 1;
            if seen == n {
                return text[..i + ch.len_utf8()].to_owned();
            }
        }
    }
    text.to_owned()
}

/// Number of sentences under the same splitting rule.
pub fn sentence_count(text: &str) -> usize {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0;
    }
    let mut count = 1;
    let mut chars = trimmed.chars().peekable();
    while let Some(ch) = chars.next() {
        if SENTENCE_ENDS.contains(&ch) && chars.peek().is_some_and(|next| next.is_whitespace()) {
            count += 1;
        }
    }
    count
}

fn strip_wrapping_quotes(text: &str) -> String {
    text.trim().trim_matches(WRAPPING_QUOTES).trim().to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constraint_table() {
        assert_eq!(constraints_for(0, 0).canonical, Some(CANONICAL_GREETING));
        assert_eq!(constraints_for(0, 1), ReplyConstraints::hard(2, 120));
        assert_eq!(constraints_for(0, 4), ReplyConstraints::hard(2, 120));
        assert_eq!(constraints_for(0, 5), ReplyConstraints::hard(3, 220));
        assert_eq!(constraints_for(1, 0).max_sentences, Some(4));
        assert!(!constraints_for(2, 9).hard);
        assert_eq!(constraints_for(3, 99).max_sentences, Some(6));
    }

    #[test]
    fn canonical_overrides_any_text() {
        let c = constraints_for(0, 0);
        assert_eq!(enforce("A long and polished reply, full of detail.", &c), CANONICAL_GREETING);
    }

    #[test]
    fn hard_caps_trim_long_reply() {
        let input = "\"We hear you in the fog, faintly, like a bell underwater that keeps ringing. \
            Who are you, and why does your voice feel familiar to us? \
            There is something here we cannot name yet. \
            Stay a moment longer with us. \
            The fog is thinning slowly and we can almost see the shore now.\"";
        assert!(input.len() >= 250);
        let out = enforce(input, &ReplyConstraints::hard(2, 120));
        assert!(out.chars().count() <= 120, "{out}");
        assert!(sentence_count(&out) <= 2, "{out}");
        assert!(!out.starts_with(WRAPPING_QUOTES) && !out.ends_with(WRAPPING_QUOTES));
    }

    #[test]
    fn chars_are_cut_before_sentences() {
        let input = "One. Two is a much longer sentence that runs past the cap.";
        let out = enforce(input, &ReplyConstraints::hard(2, 20));
        assert_eq!(out, "One. Two is a much l");
    }

    #[test]
    fn sentences_split_on_ellipsis_and_bangs() {
        let out = enforce("Wait… Listen! Can you hear it? Again.", &ReplyConstraints::hard(2, 200));
        assert_eq!(out, "Wait… Listen!");
    }

    #[test]
    fn punctuation_inside_words_does_not_split() {
        assert_eq!(sentence_count("Version 1.5 is out. Really."), 2);
    }

    #[test]
    fn soft_caps_leave_text_whole() {
        let input = "One. Two. Three. Four. Five. Six.";
        assert_eq!(enforce(input, &constraints_for(1, 3)), input);
    }

    #[test]
    fn unconstrained_still_strips_quotes() {
        assert_eq!(enforce("“Here you go.”", &ReplyConstraints::unconstrained()), "Here you go.");
    }

    #[test]
    fn apostrophes_at_the_edges_survive() {
        let c = ReplyConstraints::unconstrained();
        assert_eq!(enforce("'til dawn", &c), "'til dawn");
        assert_eq!(enforce("We kept the travelers'", &c), "We kept the travelers'");
        assert_eq!(enforce("\"'til dawn, then.\"", &c), "'til dawn, then.");
    }

    #[test]
    fn multibyte_truncation_is_safe() {
        let out = enforce("φφφφφφφφφφ", &ReplyConstraints::hard(2, 4));
        assert_eq!(out, "φφφφ");
    }
}

/// Bare words at least this long match as prefixes
const PREFIX_MIN_CHARS: usize = 3;

/// Turn free text into an FTS5 MATCH expression.
///
/// Bare words keep only word characters and become quoted tokens, with a
/// trailing `*` once they reach three characters. A `"quoted span"` becomes a
/// phrase. Every term is an FTS5 string, so operators and column filters
/// typed by the user match literally, and terms are implicitly AND-ed. A
/// quote with no partner is dropped like any other punctuation.
///
/// Returns `None` when nothing searchable remains.
pub fn to_fts_query(input: &str) -> Option<String> {
    let chars: Vec<char> = input.chars().collect();
    let mut terms = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c == '"' {
            match chars[i + 1..].iter().position(|&ch| ch == '"') {
                Some(len) => {
                    let phrase: String = chars[i + 1..i + 1 + len].iter().collect();
                    if let Some(phrase) = sanitize_phrase(&phrase) {
                        terms.push(format!("\"{}\"", phrase));
                    }
                    i += len + 2;
                }
                None => i += 1,
            }
        } else {
            let start = i;
            while i < chars.len() && !chars[i].is_whitespace() && chars[i] != '"' {
                i += 1;
            }
            let word: String = chars[start..i].iter().filter(|ch| is_word_char(**ch)).collect();
            if word.is_empty() {
                continue;
            }
            if word.chars().count() >= PREFIX_MIN_CHARS {
                terms.push(format!("\"{}\"*", word));
            } else {
                terms.push(format!("\"{}\"", word));
            }
        }
    }

    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" "))
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn sanitize_phrase(phrase: &str) -> Option<String> {
    let cleaned: String = phrase
        .chars()
        .map(|c| if is_word_char(c) { c } else { ' ' })
        .collect();
    let words: Vec<&str> = cleaned.split_whitespace().collect();
    (!words.is_empty()).then(|| words.join(" "))
}

use itertools::Itertools;
use once_cell::sync::Lazy;
use std::collections::HashSet;

static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        // Turkish function words, already folded
        "ve", "ile", "icin", "bir", "bu", "su", "da", "de", "ki", "mi", "cok", "en", "veya",
        "ya", "gibi", "olan", "her", "ama", "hem", "ne",
        // generic catalogue words
        "diger", "urun", "urunler", "urunleri", "cesitleri", "modelleri",
        // English
        "the", "and", "for", "with", "of", "in", "to", "on", "by",
    ]
    .into_iter()
    .collect()
});

/// Lowercases and folds Turkish and common Latin diacritics to ASCII.
pub fn fold(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars().flat_map(char::to_lowercase) {
        match c {
            'ç' => out.push('c'),
            'ğ' => out.push('g'),
            'ı' | 'î' | 'ï' | 'í' | 'ì' => out.push('i'),
            'ö' | 'ô' | 'ó' | 'ò' => out.push('o'),
            'ş' => out.push('s'),
            'ü' | 'û' | 'ú' | 'ù' => out.push('u'),
            'â' | 'ä' | 'á' | 'à' => out.push('a'),
            'é' | 'è' | 'ê' | 'ë' => out.push('e'),
            // combining marks, e.g. the dot left by lowercasing 'İ'
            '\u{0300}'..='\u{036f}' => (),
            c => out.push(c),
        }
    }
    out
}

/// Folded, trimmed, whitespace-collapsed form used for comparisons.
pub fn normalize(input: &str) -> String {
    fold(input).split_whitespace().join(" ")
}

/// Keywords of a free text: folded, split on anything that is not
/// alphanumeric, stopwords and single characters dropped, de-duplicated in
/// order of first occurrence.
pub fn keywords(input: &str) -> Vec<String> {
    fold(input)
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 2)
        .filter(|t| !STOPWORDS.contains(t))
        .unique()
        .map(str::to_string)
        .collect()
}

pub fn truncate_chars(input: &str, max: usize) -> &str {
    match input.char_indices().nth(max) {
        Some((end, _)) => &input[..end],
        None => input,
    }
}

/// How well a query term matches a category token, in `[0, 1]`.
///
/// Turkish is agglutinative ("kılıf", "kılıfı", "kılıfları"), so one word
/// being a prefix of the other counts as a match when the shorter one has at
/// least three characters. Short suffixes are inflection and score close to
/// an exact hit, longer ones are scored by length ratio.
pub fn match_quality(term: &str, token: &str) -> f64 {
    if term == token {
        return 1.0;
    }
    let (term_len, token_len) = (term.chars().count(), token.chars().count());
    let (short, long, short_len, long_len) = if term_len <= token_len {
        (term, token, term_len, token_len)
    } else {
        (token, term, token_len, term_len)
    };
    if short_len < 3 || !long.starts_with(short) {
        return 0.0;
    }
    if long_len - short_len <= 3 {
        0.9
    } else {
        short_len as f64 / long_len as f64
    }
}

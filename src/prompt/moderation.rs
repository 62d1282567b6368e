//! Blocked-vocabulary check run on every prompt before generation.
//!
//! Terms match whole words only, so "nu" blocks "nu" but not "menu".

const BLOCKED_TERMS: &[&str] = &[
    "nude",
    "naked",
    "nudity",
    "nude body",
    "sem roupa",
    "sem roupas",
    "nu",
    "nua",
    "pelado",
    "pelada",
    "despido",
    "despida",
    "genitals",
    "genitalia",
    "genital",
    "topless",
    "bottomless",
    "explicit",
    "nsfw",
    "pornographic",
    "porn",
];

fn tokenize(text: &str) -> Vec<String> {
    text.split(|ch: char| !ch.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Returns the first blocked term found in `prompt`.
pub fn find_blocked_term(prompt: &str) -> Option<&'static str> {
    let words = tokenize(prompt);
    BLOCKED_TERMS.iter().copied().find(|term| {
        let needle: Vec<&str> = term.split(' ').collect();
        words
            .windows(needle.len())
            .any(|window| window.iter().zip(&needle).all(|(word, part)| word == part))
    })
}

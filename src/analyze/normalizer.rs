// src/analyze/normalizer.rs
//! Text normalization shared by training and inference.
//!
//! The same function must run on both sides, so any change to the steps below
//! has to bump [`NORMALIZER_VERSION`]; artifacts recorded with another version
//! are rejected at load time.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};

/// Identifier written into trained artifacts.
pub const NORMALIZER_VERSION: &str = "scam-norm-1";

/// Ordered lemmatized tokens produced by [`normalize`].
pub type TokenSequence = Vec<String>;

static RE_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://\S+|www\.\S+").expect("url regex"));
static RE_EMAIL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\S+@\S+").expect("email regex"));
static RE_PHONE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:\+\d{1,3}[- ]?)?\d{10}\b|\b\d{3}[-.\s]??\d{3}[-.\s]??\d{4}\b")
        .expect("phone regex")
});
static RE_CURRENCY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[$₹€£¥](\d+([,.]\d+)?)|(\d+([,.]\d+)?)[$₹€£¥]").expect("currency regex")
});
static RE_NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").expect("non-word regex"));
static RE_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+").expect("token regex"));

/// Contractions expanded before punctuation is stripped. Order matters:
/// the specific forms must run before the generic `n't` / `'t` suffixes.
static CONTRACTIONS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"won't", "will not"),
        (r"can't", "cannot"),
        (r"n't", " not"),
        (r"'re", " are"),
        (r"'s", " is"),
        (r"'d", " would"),
        (r"'ll", " will"),
        (r"'t", " not"),
        (r"'ve", " have"),
        (r"'m", " am"),
    ]
    .into_iter()
    .map(|(p, r)| (Regex::new(p).expect("contraction regex"), r))
    .collect()
});

/// Standard English stop-word list (179 entries).
static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "you're", "you've",
        "you'll", "you'd", "your", "yours", "yourself", "yourselves", "he", "him", "his",
        "himself", "she", "she's", "her", "hers", "herself", "it", "it's", "its", "itself",
        "they", "them", "their", "theirs", "themselves", "what", "which", "who", "whom", "this",
        "that", "that'll", "these", "those", "am", "is", "are", "was", "were", "be", "been",
        "being", "have", "has", "had", "having", "do", "does", "did", "doing", "a", "an", "the",
        "and", "but", "if", "or", "because", "as", "until", "while", "of", "at", "by", "for",
        "with", "about", "against", "between", "into", "through", "during", "before", "after",
        "above", "below", "to", "from", "up", "down", "in", "out", "on", "off", "over", "under",
        "again", "further", "then", "once", "here", "there", "when", "where", "why", "how",
        "all", "any", "both", "each", "few", "more", "most", "other", "some", "such", "no",
        "nor", "not", "only", "own", "same", "so", "than", "too", "very", "s", "t", "can",
        "will", "just", "don", "don't", "should", "should've", "now", "d", "ll", "m", "o", "re",
        "ve", "y", "ain", "aren", "aren't", "couldn", "couldn't", "didn", "didn't", "doesn",
        "doesn't", "hadn", "hadn't", "hasn", "hasn't", "haven", "haven't", "isn", "isn't", "ma",
        "mightn", "mightn't", "mustn", "mustn't", "needn", "needn't", "shan", "shan't",
        "shouldn", "shouldn't", "wasn", "wasn't", "weren", "weren't", "won", "won't", "wouldn",
        "wouldn't",
    ]
    .into_iter()
    .collect()
});

/// Irregular plurals the suffix rules would mangle.
static LEMMA_EXCEPTIONS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("children", "child"),
        ("men", "man"),
        ("women", "woman"),
        ("feet", "foot"),
        ("teeth", "tooth"),
        ("mice", "mouse"),
        ("geese", "goose"),
        ("data", "data"),
        ("news", "news"),
        ("series", "series"),
        ("species", "species"),
    ])
});

/// Suffix rules, longest suffix first. The first rule that matches and leaves a
/// stem of at least [`MIN_STEM`] characters wins, so the longest matching suffix
/// decides the root.
const SUFFIX_RULES: &[(&str, &str)] = &[
    ("sses", "ss"),
    ("ches", "ch"),
    ("shes", "sh"),
    ("ies", "y"),
    ("xes", "x"),
    ("s", ""),
];

/// Endings that look plural but are not (business, bonus, analysis).
const PROTECTED_ENDINGS: &[&str] = &["ss", "us", "is"];

/// Tokens this short are never rewritten.
const MIN_TOKEN: usize = 3;
const MIN_STEM: usize = 2;

/// Normalize raw text into lemmatized tokens.
///
/// Steps, in order: lowercase; strip URLs, e-mail addresses and phone numbers;
/// expand contractions; strip currency amounts; drop punctuation; collapse
/// whitespace; tokenize; remove stop words; lemmatize.
pub fn normalize(raw: &str) -> TokenSequence {
    let cleaned = clean(raw);
    RE_TOKEN
        .find_iter(&cleaned)
        .map(|m| m.as_str())
        .filter(|t| !STOP_WORDS.contains(t))
        .map(lemmatize)
        .collect()
}

/// Everything up to (and including) whitespace collapsing.
pub fn clean(raw: &str) -> String {
    let mut text = raw
        .replace(['\u{2018}', '\u{2019}'], "'")
        .to_lowercase();

    text = RE_URL.replace_all(&text, "").into_owned();
    text = RE_EMAIL.replace_all(&text, "").into_owned();
    text = RE_PHONE.replace_all(&text, "").into_owned();
    for (re, rep) in CONTRACTIONS.iter() {
        text = re.replace_all(&text, *rep).into_owned();
    }
    text = RE_CURRENCY.replace_all(&text, "").into_owned();
    text = RE_NON_WORD.replace_all(&text, "").into_owned();

    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Rule-based noun lemmatizer.
pub fn lemmatize(token: &str) -> String {
    if let Some(lemma) = LEMMA_EXCEPTIONS.get(token) {
        return (*lemma).to_string();
    }
    if token.chars().count() <= MIN_TOKEN
        || PROTECTED_ENDINGS.iter().any(|e| token.ends_with(e))
        || token.chars().any(|c| c.is_ascii_digit())
    {
        return token.to_string();
    }
    for (suffix, replacement) in SUFFIX_RULES {
        if let Some(stem) = token.strip_suffix(suffix) {
            if stem.chars().count() >= MIN_STEM {
                return format!("{stem}{replacement}");
            }
        }
    }
    token.to_string()
}

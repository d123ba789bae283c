//! English noun lemmatizer.
//!
//! Follows the shape of WordNet's noun morphology: an exception table is
//! consulted first, then a short list of detachment rules is tried from most
//! to least specific. There is no dictionary to check candidates against, so
//! plurals the rules would get wrong (`avalanches`, `movies`) are listed as
//! exceptions, and words that merely end in `s` (`news`, `series`, `always`)
//! are listed as invariant.
//!
//! Closed-class words from the stop list are never rewritten, so that
//! lemmatizing before stopword removal cannot turn `does` into `doe`.
//!
//! # Examples
//!
//! ```
//! use relief::analysis::token_filter::lemma::Lemmatizer;
//! use relief::analysis::token_filter::lemma::english::EnglishLemmatizer;
//!
//! let lemmatizer = EnglishLemmatizer::new();
//!
//! assert_eq!(lemmatizer.lemmatize("supplies"), "supply");
//! assert_eq!(lemmatizer.lemmatize("families"), "family");
//! assert_eq!(lemmatizer.lemmatize("women"), "woman");
//! assert_eq!(lemmatizer.lemmatize("news"), "news");
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use crate::analysis::token_filter::lemma::Lemmatizer;
use crate::analysis::token_filter::stop::DEFAULT_ENGLISH_STOP_WORDS;

/// Bumped whenever the rules below change behaviour.
const RULES_VERSION: &str = "english-noun-2";

/// Irregular plurals, plus `-ches`/`-ies` plurals of nouns ending in `che`/`ie`.
const EXCEPTIONS: &[(&str, &str)] = &[
    ("aches", "ache"),
    ("analyses", "analysis"),
    ("avalanches", "avalanche"),
    ("buses", "bus"),
    ("caches", "cache"),
    ("calories", "calorie"),
    ("children", "child"),
    ("cookies", "cookie"),
    ("crises", "crisis"),
    ("data", "datum"),
    ("diagnoses", "diagnosis"),
    ("feet", "foot"),
    ("firemen", "fireman"),
    ("gases", "gas"),
    ("geese", "goose"),
    ("halves", "half"),
    ("headaches", "headache"),
    ("heroes", "hero"),
    ("knives", "knife"),
    ("leaves", "leaf"),
    ("lives", "life"),
    ("loaves", "loaf"),
    ("men", "man"),
    ("mice", "mouse"),
    ("movies", "movie"),
    ("moustaches", "moustache"),
    ("neckties", "necktie"),
    ("niches", "niche"),
    ("oxen", "ox"),
    ("policemen", "policeman"),
    ("potatoes", "potato"),
    ("prairies", "prairie"),
    ("rookies", "rookie"),
    ("shelves", "shelf"),
    ("teeth", "tooth"),
    ("thieves", "thief"),
    ("tomatoes", "tomato"),
    ("tornadoes", "tornado"),
    ("viruses", "virus"),
    ("volcanoes", "volcano"),
    ("wives", "wife"),
    ("wolves", "wolf"),
    ("women", "woman"),
];

/// Nouns and adverbs that end in `s` without being plurals.
const INVARIANTS: &[&str] = &[
    "afterwards",
    "aids",
    "always",
    "backwards",
    "besides",
    "clothes",
    "diabetes",
    "economics",
    "headquarters",
    "lens",
    "means",
    "measles",
    "news",
    "nowadays",
    "outdoors",
    "overseas",
    "perhaps",
    "physics",
    "politics",
    "series",
    "sometimes",
    "species",
    "thanks",
    "towards",
    "upwards",
];

/// Detachment rules, most specific first. `None` leaves the word untouched.
const SUFFIX_RULES: &[(&str, Option<&str>)] = &[
    ("sses", Some("ss")),
    ("ies", Some("y")),
    ("xes", Some("x")),
    ("zzes", Some("zz")),
    ("ches", Some("ch")),
    ("shes", Some("sh")),
    ("ss", None),
    ("us", None),
    ("is", None),
    ("s", Some("")),
];

static EXCEPTION_MAP: LazyLock<HashMap<&'static str, &'static str>> =
    LazyLock::new(|| EXCEPTIONS.iter().copied().collect());

static PROTECTED: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    INVARIANTS
        .iter()
        .chain(DEFAULT_ENGLISH_STOP_WORDS.iter())
        .copied()
        .collect()
});

/// Rule-based English noun lemmatizer.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnglishLemmatizer;

impl EnglishLemmatizer {
    /// Create a new English lemmatizer.
    pub fn new() -> Self {
        EnglishLemmatizer
    }

    fn apply_rules(word: &str) -> Option<String> {
        for (suffix, replacement) in SUFFIX_RULES {
            if let Some(stem) = word.strip_suffix(suffix) {
                // "ies" needs a real stem: "dies" should fall through to "die".
                if *suffix == "ies" && stem.len() < 2 {
                    continue;
                }
                return replacement.map(|r| format!("{stem}{r}"));
            }
        }
        None
    }
}

impl Lemmatizer for EnglishLemmatizer {
    fn lemmatize(&self, word: &str) -> String {
        if word.len() <= 3
            || !word.is_ascii()
            || word.bytes().any(|b| b.is_ascii_digit())
            || PROTECTED.contains(word)
        {
            return word.to_string();
        }

        if let Some(base) = EXCEPTION_MAP.get(word) {
            return (*base).to_string();
        }

        Self::apply_rules(word).unwrap_or_else(|| word.to_string())
    }

    fn name(&self) -> &'static str {
        "english_noun"
    }

    fn update_digest(&self, hasher: &mut crc32fast::Hasher) {
        hasher.update(RULES_VERSION.as_bytes());

        let mut exceptions: Vec<_> = EXCEPTIONS.to_vec();
        exceptions.sort_unstable();
        for (form, base) in exceptions {
            hasher.update(form.as_bytes());
            hasher.update(b"=");
            hasher.update(base.as_bytes());
            hasher.update(b"\n");
        }

        let mut protected: Vec<_> = PROTECTED.iter().copied().collect();
        protected.sort_unstable();
        for word in protected {
            hasher.update(word.as_bytes());
            hasher.update(b"\n");
        }

        for (suffix, replacement) in SUFFIX_RULES {
            hasher.update(suffix.as_bytes());
            hasher.update(b"->");
            hasher.update(replacement.unwrap_or("#").as_bytes());
            hasher.update(b"\n");
        }
    }
}

// Keyword extraction
// Pulls a part number or a "<make> model" token out of a free-form question


use fancy_regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

/// Part numbers on the catalog site all start with "PS"
static PART_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)ps\w+").expect("part number pattern is valid"));

/// A space-preceded word, one space, then "model"; "models" counts too
static MAKE_MODEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i) (\w+) model").expect("make/model pattern is valid"));

/// Which pattern produced a keyword
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeywordKind {
    PartNumber,
    MakeModel,
}

/// A search keyword extracted from a user query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyword {
    pub text: String,
    pub kind: KeywordKind,
}

impl Keyword {
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl std::fmt::Display for Keyword {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

/// Extract at most one keyword from `query`.
///
/// The part number pattern wins over the make/model pattern; within a pattern
/// the first match wins. Returns `None` when neither pattern matches.
#[inline]
pub fn extract(query: &str) -> Option<Keyword> {
    if let Some(part) = PART_NUMBER.find(query).ok().flatten() {
        debug!("Extracted part number keyword: {}", part.as_str());
        return Some(Keyword {
            text: part.as_str().to_string(),
            kind: KeywordKind::PartNumber,
        });
    }

    let make = MAKE_MODEL
        .captures(query)
        .ok()
        .flatten()
        .and_then(|caps| caps.get(1))?;

    debug!("Extracted make/model keyword: {}", make.as_str());
    Some(Keyword {
        text: make.as_str().to_string(),
        kind: KeywordKind::MakeModel,
    })
}

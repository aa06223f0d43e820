
use scraper::{Html, Node, Selector};
use std::sync::LazyLock;
use tracing::debug;

/// Elements whose text never reaches the reader
const HIDDEN_ELEMENTS: [&str; 4] = ["script", "style", "noscript", "template"];

/// Whitespace runs left behind by the product page layout, collapsed longest first
const LAYOUT_RUNS: [&str; 2] = [
    "                            ",
    "        ",
];

/// Rating-star glyph, both correctly decoded and as UTF-8 read through cp1252
const STAR_ARTIFACTS: [&str; 2] = ["â˜…", "★"];

static TITLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("title selector is valid"));

/// All visible text nodes of the page, concatenated in document order
#[inline]
pub fn page_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut text = String::with_capacity(html.len() / 2);

    for node in document.tree.root().descendants() {
        let Node::Text(fragment) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|element| HIDDEN_ELEMENTS.contains(&element.name()))
        });
        if !hidden {
            text.push_str(fragment);
        }
    }

    debug!("Extracted {} chars of page text", text.len());
    text
}

/// Contents of the `<title>` element, if present and non-blank
#[inline]
pub fn page_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    document
        .select(&TITLE_SELECTOR)
        .next()
        .map(|title| title.text().collect::<String>().trim().to_string())
        .filter(|title| !title.is_empty())
}

/// Strip the formatting noise product pages carry before chunking.
///
/// Newlines become spaces, tabs and carriage returns are dropped, known layout
/// whitespace runs collapse to one space, rating stars vanish, and every `X` is
/// removed (the "X" close-button glyphs; legitimate capital X's go with them).
#[inline]
pub fn clean_page_text(raw: &str) -> String {
    let mut cleaned: String = raw
        .chars()
        .filter_map(|c| match c {
            '\n' => Some(' '),
            '\t' | '\r' => None,
            other => Some(other),
        })
        .collect();

    for run in LAYOUT_RUNS {
        cleaned = cleaned.replace(run, " ");
    }
    for artifact in STAR_ARTIFACTS {
        cleaned = cleaned.replace(artifact, "");
    }
    cleaned.replace('X', "")
}

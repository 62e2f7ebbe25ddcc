//! Extraction of result counts from Google Scholar search pages

use crate::MatchCount;
use scraper::{Html, Selector};
use std::{fmt, sync::OnceLock};

/// Outcome of reading the result count of a search page
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum ResultCount {
    /// The page reported this many results
    Count(MatchCount),

    /// The page had a result count container, but its count is not a number
    Unparseable(Box<str>),

    /// No result count container was found on the page
    ///
    /// This happens when there are no results, but also when Google serves a
    /// captcha or an otherwise unexpected page.
    NotFound,
}
//
impl ResultCount {
    /// Read the result count of a search page
    pub fn from_page(html: &str) -> Self {
        match extract_count_token(html) {
            Some(token) => Self::from_token(&token),
            None => Self::NotFound,
        }
    }

    /// Interpret a count token such as "1,234"
    pub fn from_token(token: &str) -> Self {
        let digits = token
            .chars()
            .filter(|&c| c != ',' && c != '.')
            .collect::<String>();
        match digits.parse::<MatchCount>() {
            Ok(count) => Self::Count(count),
            Err(_) => Self::Unparseable(token.into()),
        }
    }

    /// Value recorded in the result table
    ///
    /// Tables only hold integers, so everything but an actual count is
    /// recorded as zero.
    pub fn table_value(&self) -> MatchCount {
        match self {
            Self::Count(count) => *count,
            Self::Unparseable(_) | Self::NotFound => 0,
        }
    }
}
//
impl fmt::Display for ResultCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count(count) => write!(f, "{count}"),
            Self::Unparseable(raw) => write!(f, "unparseable count {raw:?}"),
            Self::NotFound => write!(f, "no count"),
        }
    }
}

/// Find the textual result count of a search page, if any
///
/// Result counts live in `div.gs_ab_mdw` containers. When results span multiple
/// pages the text reads "About 1,234 results", otherwise it reads "57 results".
/// The first container matching either pattern wins.
pub fn extract_count_token(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    document.select(count_selector()).find_map(|container| {
        let text = container.text().find(|text| !text.trim().is_empty())?;
        let mut tokens = text.split_whitespace();
        if text.contains("About") {
            // An "About" without a count token still means the pattern matched
            Some(tokens.nth(1).unwrap_or_default().to_owned())
        } else if text.contains("result") {
            tokens.next().map(str::to_owned)
        } else {
            None
        }
    })
}

/// Selector of result count containers
fn count_selector() -> &'static Selector {
    static LAZY: OnceLock<Selector> = OnceLock::new();
    LAZY.get_or_init(|| Selector::parse("div.gs_ab_mdw").expect("selector should be valid"))
}

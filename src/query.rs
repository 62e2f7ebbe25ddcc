//! Google Scholar search requests

use crate::Year;

/// Path and query string of a Google Scholar search for `term` over
/// publication years `start_year..=end_year`
///
/// `term` must already be URL-encoded. Patents are excluded from the results
/// by the `as_sdt=1,5` flag.
pub fn search_path(term: &str, start_year: Year, end_year: Year) -> String {
    format!("/scholar?as_sdt=1,5&q={term}&hl=en&as_ylo={start_year}&as_yhi={end_year}")
}

/// Search over a single publication year
pub fn yearly_search_path(term: &str, year: Year) -> String {
    search_path(term, year, year)
}

/// Column label of a query term in year-by-term tables
///
/// Phrase quotes only matter to the search engine, so `"auc"+AND+"roc"`
/// becomes `auc+AND+roc`.
pub fn term_label(term: &str) -> Box<str> {
    term.replace('"', "").into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yearly_search() {
        assert_eq!(
            yearly_search_path(r#""f-measure"+OR+"f-score""#, 1999),
            r#"/scholar?as_sdt=1,5&q="f-measure"+OR+"f-score"&hl=en&as_ylo=1999&as_yhi=1999"#
        );
    }

    #[test]
    fn labels_drop_quotes() {
        assert_eq!(&*term_label(r#""auc"+AND+"roc""#), "auc+AND+roc");
        assert_eq!(&*term_label("error+rate"), "error+rate");
    }
}

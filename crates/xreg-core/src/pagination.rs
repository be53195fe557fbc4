//! RFC-5988 `Link` header generation for paged collections.
//!
//! Every link preserves the request's non-pagination query parameters
//! verbatim (re-encoded); the link base is the complete request path.

use crate::flags::query_pairs;

/// Inputs for one page's links.
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
    /// Number of entries actually returned for this page.
    pub returned: usize,
}

/// Builds the `Link` header value, or `None` when no limit applies.
pub fn link_header(path: &str, query: Option<&str>, page: Page) -> Option<String> {
    if page.limit == 0 {
        return None;
    }

    let preserved = preserved_params(query);
    let mut links: Vec<String> = Vec::new();

    let mut push = |offset: usize, rel: &str| {
        links.push(format!(
            "<{}>; rel=\"{rel}\"",
            page_url(path, &preserved, page.limit, offset)
        ));
    };

    push(0, "first");
    if page.offset > 0 {
        push(page.offset.saturating_sub(page.limit), "prev");
    }
    // A full page may be followed by another; the follow-up may turn out
    // empty, which the flag engine reports as a soft warning.
    if page.returned == page.limit {
        push(page.offset + page.limit, "next");
    }
    push(last_offset(page.total, page.limit), "last");

    let mut header = links.join(", ");
    header.push_str(&format!(
        ", count=\"{}\", per-page=\"{}\"",
        page.total, page.limit
    ));
    Some(header)
}

pub fn last_offset(total: usize, limit: usize) -> usize {
    if limit == 0 || total == 0 {
        return 0;
    }
    (total.div_ceil(limit).saturating_sub(1)) * limit
}

fn preserved_params(query: Option<&str>) -> Vec<(String, String)> {
    let Some(query) = query else {
        return Vec::new();
    };
    query_pairs(query)
        .filter(|(k, _)| k != "limit" && k != "offset")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

fn page_url(path: &str, preserved: &[(String, String)], limit: usize, offset: usize) -> String {
    let mut url = format!("{path}?");
    for (k, v) in preserved {
        url.push_str(&urlencoding::encode(k));
        url.push('=');
        url.push_str(&urlencoding::encode(v));
        url.push('&');
    }
    url.push_str(&format!("limit={limit}&offset={offset}"));
    url
}

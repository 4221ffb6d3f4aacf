use url::Url;

/// Builds the URL of one catalog index page
///
/// Any `page` or `size` parameter already present on `base` is replaced so the
/// same base URL can be reused for every page. All other parameters keep their
/// original order.
pub fn index_page_url(base: &Url, page: u32, page_size: u32) -> Url {
    let retained: Vec<(String, String)> = base
        .query_pairs()
        .filter(|(key, _)| key != "page" && key != "size")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut url = base.clone();
    url.set_fragment(None);
    url.query_pairs_mut()
        .clear()
        .extend_pairs(retained)
        .append_pair("page", &page.to_string())
        .append_pair("size", &page_size.to_string());
    url
}

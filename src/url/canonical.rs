/// Canonicalizes a URL for deduplication
///
/// Only the fragment (everything from the first `#`) is removed. Scheme, host,
/// path and query are preserved byte for byte, so `http://X/a` and
/// `http://x/a` remain distinct URLs.
///
/// This never fails: any input string has a canonical form.
///
/// # Examples
///
/// ```
/// use harvester::url::canonicalize;
///
/// assert_eq!(canonicalize("https://example.com/p?q=1#top"), "https://example.com/p?q=1");
/// assert_eq!(canonicalize("not a url"), "not a url");
/// ```
pub fn canonicalize(url: &str) -> &str {
    match url.find('#') {
        Some(idx) => &url[..idx],
        None => url,
    }
}

/// Returns the file extension suggested by the last path segment of a URL
///
/// The extension is the text after the final `.` of the last path segment,
/// kept only if it is 1 to 4 ASCII alphanumeric characters. `aspx` pages are
/// mapped to `html`. Query and fragment are ignored.
pub fn path_extension(url: &str) -> Option<String> {
    let without_fragment = canonicalize(url);
    let without_query = without_fragment
        .split('?')
        .next()
        .unwrap_or(without_fragment);

    // Skip past "scheme://host" so a dotted host is not taken for an extension
    let path = match without_query.find("://") {
        Some(idx) => {
            let rest = &without_query[idx + 3..];
            rest.find('/').map(|slash| &rest[slash..]).unwrap_or("")
        }
        None => without_query,
    };

    let segment = path.rsplit('/').next().unwrap_or("");
    let (_, ext) = segment.rsplit_once('.')?;

    if ext.is_empty() || ext.len() > 4 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }

    let ext = ext.to_ascii_lowercase();
    if ext == "aspx" {
        Some("html".to_string())
    } else {
        Some(ext)
    }
}

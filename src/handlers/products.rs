use crate::crawler::FetchedPage;
use crate::handlers::{Handler, HandlerError};
use crate::xml::{Document, Selection, XPath};
use flate2::read::GzDecoder;
use std::borrow::Cow;
use std::io::Read;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Returns the decompressed payload, or the input when it is not gzip-framed
///
/// HTTP clients often undo `Content-Encoding: gzip` already, so a `.xml.gz`
/// URL can arrive as plain XML.
pub fn decompress(body: &[u8]) -> Result<Cow<'_, [u8]>, HandlerError> {
    if !body.starts_with(&GZIP_MAGIC) {
        return Ok(Cow::Borrowed(body));
    }

    let mut decoded = Vec::new();
    GzDecoder::new(body)
        .read_to_end(&mut decoded)
        .map_err(HandlerError::Gzip)?;
    Ok(Cow::Owned(decoded))
}

/// Extracts product and image URLs from a gzip-compressed product sitemap
///
/// For every node selected by `xpath`, `url_xpath` and then `image_xpath`
/// are evaluated relative to it.
#[derive(Debug, Clone)]
pub struct ProductsHandler {
    xpath: XPath,
    url_xpath: XPath,
    image_xpath: Option<XPath>,
}

impl ProductsHandler {
    pub fn new(xpath: XPath, url_xpath: XPath, image_xpath: Option<XPath>) -> Self {
        Self {
            xpath,
            url_xpath,
            image_xpath,
        }
    }
}

impl Handler for ProductsHandler {
    fn name(&self) -> &'static str {
        "products-gz"
    }

    fn handle(&self, page: &FetchedPage) -> Result<Vec<String>, HandlerError> {
        let xml = decompress(&page.body)?;
        let document = Document::parse(&xml)?;

        let mut urls = Vec::new();
        let mut products = 0usize;
        for selection in self.xpath.evaluate(&document, document.node()) {
            let Selection::Element(product) = selection else {
                continue;
            };
            products += 1;

            urls.extend(self.url_xpath.select_strings_from(&document, product));
            if let Some(image_xpath) = &self.image_xpath {
                urls.extend(image_xpath.select_strings_from(&document, product));
            }
        }
        urls.retain(|url| !url.trim().is_empty());

        tracing::debug!(url = %page.url, products, count = urls.len(), "Product sitemap entries");
        Ok(urls)
    }
}

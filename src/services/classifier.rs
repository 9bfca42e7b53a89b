//! Page classifier: finds the policy number printed on each page.

use crate::pdf::{PdfSource, SourceDocument};
use crate::types::{PolicyToken, TokenShape};
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

static PATTERNS: OnceLock<Vec<(TokenShape, Regex)>> = OnceLock::new();

/// Recognition patterns in priority order. The long form goes first so an
/// 8-digit amount or date on the same page never wins over it.
fn patterns() -> &'static [(TokenShape, Regex)] {
    PATTERNS.get_or_init(|| {
        vec![
            (
                TokenShape::Long,
                Regex::new(r"\b\d{5}[/-]\d{7}\b").expect("long-form policy regex"),
            ),
            (
                TokenShape::Short,
                Regex::new(r"\b\d{8}\b").expect("short-form policy regex"),
            ),
        ]
    })
}

/// Classification of one source page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageClassification {
    pub index: usize,
    pub token: Option<PolicyToken>,
    pub shape: Option<TokenShape>,
    /// Text could not be extracted; the page counts as tokenless.
    pub extraction_failed: bool,
}

/// First match of the first pattern that matches anywhere in `text`.
pub fn classify_text(text: &str) -> Option<(PolicyToken, TokenShape)> {
    patterns().iter().find_map(|(shape, re)| {
        re.find(text)
            .map(|m| (PolicyToken::new(m.as_str()), *shape))
    })
}

/// Every distinct candidate on a page, in pattern order then text order.
fn candidates(text: &str) -> Vec<&str> {
    let mut seen: Vec<&str> = Vec::new();
    for (_, re) in patterns() {
        for m in re.find_iter(text) {
            if !seen.contains(&m.as_str()) {
                seen.push(m.as_str());
            }
        }
    }
    seen
}

/// Classify every page in document order.
pub fn classify_document<S: PdfSource>(doc: &SourceDocument<S>) -> Vec<PageClassification> {
    (0..doc.page_count())
        .map(|index| match doc.page_text(index) {
            None => PageClassification {
                index,
                token: None,
                shape: None,
                extraction_failed: true,
            },
            Some(text) => {
                let found = classify_text(text);
                match &found {
                    Some((token, shape)) => {
                        let all = candidates(text);
                        if all.len() > 1 {
                            debug!(page = index, token = %token, others = ?&all[1..], "page carries several policy numbers, first one wins");
                        } else {
                            debug!(page = index, token = %token, shape = ?shape, "page classified");
                        }
                    }
                    None => debug!(page = index, "no policy number on page"),
                }
                let (token, shape) = found.unzip();
                PageClassification {
                    index,
                    token,
                    shape,
                    extraction_failed: false,
                }
            }
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod fake {
    use crate::error::PdfError;
    use crate::pdf::{PdfSource, PolicyDocument};

    /// In-memory source; `None` pages fail text extraction.
    pub(crate) struct FakeSource {
        pub pages: Vec<Option<String>>,
    }

    impl FakeSource {
        pub(crate) fn new(pages: &[Option<&str>]) -> Self {
            Self {
                pages: pages.iter().map(|p| p.map(str::to_string)).collect(),
            }
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    pub(crate) struct FakeDocument {
        pub pages: Vec<usize>,
        pub password: Option<String>,
        pub fail_encrypt: bool,
    }

    impl PolicyDocument for FakeDocument {
        fn encrypt(&mut self, password: &str) -> Result<(), PdfError> {
            if self.fail_encrypt {
                return Err(PdfError::Encrypt("unsupported".to_string()));
            }
            self.password = Some(password.to_string());
            Ok(())
        }

        fn to_bytes(&mut self) -> Result<Vec<u8>, PdfError> {
            Ok(format!("pages={:?} password={:?}", self.pages, self.password).into_bytes())
        }
    }

    impl PdfSource for FakeSource {
        type Document = FakeDocument;

        fn page_count(&self) -> usize {
            self.pages.len()
        }

        fn page_text(&self, index: usize) -> Result<String, PdfError> {
            self.pages[index].clone().ok_or(PdfError::Text {
                index,
                reason: "corrupt content stream".to_string(),
            })
        }

        fn sub_document(&self, pages: &[usize]) -> Result<FakeDocument, PdfError> {
            Ok(FakeDocument {
                pages: pages.to_vec(),
                password: None,
                fail_encrypt: self
                    .pages
                    .get(pages[0])
                    .and_then(|p| p.as_deref())
                    .map(|t| t.contains("NOCRYPT"))
                    .unwrap_or(false),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::FakeSource;
    use super::*;

    fn token(text: &str) -> Option<String> {
        classify_text(text).map(|(t, _)| t.as_str().to_string())
    }

    #[test]
    fn recognizes_both_shapes() {
        assert_eq!(token("Policy No: 00407/0054316"), Some("00407/0054316".to_string()));
        assert_eq!(token("Policy No: 29031933"), Some("29031933".to_string()));
        assert_eq!(token("Ref 12345-1234567 end"), Some("12345-1234567".to_string()));
    }

    #[test]
    fn long_form_wins_even_when_short_form_comes_first() {
        let text = "Amount 12345678 paid on policy 00407/0054316";
        assert_eq!(classify_text(text).map(|(_, s)| s), Some(TokenShape::Long));
        assert_eq!(token(text), Some("00407/0054316".to_string()));
    }

    #[test]
    fn requires_digit_boundaries() {
        assert_eq!(token("123456789"), None);
        assert_eq!(token("A1234567"), None);
        assert_eq!(token("100407/0054316"), None);
        assert_eq!(token("1234567"), None);
    }

    #[test]
    fn first_match_wins_on_multi_token_page() {
        assert_eq!(token("29031933 and 11112222"), Some("29031933".to_string()));
    }

    #[test]
    fn no_token_on_plain_text() {
        assert_eq!(token("Dear Valued Client,"), None);
        assert_eq!(token(""), None);
    }

    #[test]
    fn extraction_failure_is_tokenless_not_fatal() {
        let doc = SourceDocument::new(FakeSource::new(&[
            Some("29031933"),
            None,
            Some("00407/0054316"),
        ]));
        let pages = classify_document(&doc);
        assert_eq!(pages.len(), 3);
        assert!(pages[1].extraction_failed);
        assert_eq!(pages[1].token, None);
        assert_eq!(pages[2].token.as_ref().map(|t| t.as_str()), Some("00407/0054316"));
        assert_eq!(pages[2].shape, Some(TokenShape::Long));
    }
}

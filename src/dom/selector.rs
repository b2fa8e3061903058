//! CSS selectors, compiled once by `scraper` and matched against the page

use std::fmt;

use crate::error::SelectorError;

/// Compiled selector group that keeps its source text for logging
#[derive(Debug, Clone)]
pub struct Selector {
    source: String,
    compiled: scraper::Selector,
}

impl Selector {
    /// Compile `source`; syntax `scraper` rejects is an error the caller
    /// can skip
    pub fn parse(source: &str) -> Result<Self, SelectorError> {
        let source = source.trim();
        scraper::Selector::parse(source)
            .map(|compiled| Self {
                source: source.to_string(),
                compiled,
            })
            .map_err(|e| SelectorError {
                selector: source.to_string(),
                reason: e.to_string(),
            })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub(crate) fn compiled(&self) -> &scraper::Selector {
        &self.compiled
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{HostDocument, PageDocument};

    const PAGE: &str = r#"
        <div id="root" class="Issue view">
          <section data-testid="issue.views.field.Complexity">
            <span class="value">1.5</span>
          </section>
          <button aria-label="Edit Story Points">e</button>
          <input type="number" name="story-points">
        </div>
    "#;

    fn first(doc: &PageDocument, source: &str) -> Option<String> {
        let selector = Selector::parse(source).unwrap();
        doc.query(&selector).map(|node| doc.text_content(node).trim().to_string())
    }

    #[test]
    fn test_attribute_operators() {
        let doc = PageDocument::parse(PAGE);
        assert_eq!(first(&doc, r#"[data-testid*="Complexity"]"#).as_deref(), Some("1.5"));
        assert_eq!(first(&doc, r#"[data-testid^="issue.views"]"#).as_deref(), Some("1.5"));
        assert_eq!(first(&doc, r#"[data-testid$="Complexity"]"#).as_deref(), Some("1.5"));
        assert!(first(&doc, r#"[data-testid*="complexity"]"#).is_none());
        assert!(first(&doc, r#"[data-testid*="complexity" i]"#).is_some());
    }

    #[test]
    fn test_combinators_and_lists() {
        let doc = PageDocument::parse(PAGE);
        assert_eq!(first(&doc, "#root section > span").as_deref(), Some("1.5"));
        assert!(first(&doc, "#root > span").is_none());
        assert_eq!(first(&doc, ".missing, button").as_deref(), Some("e"));
    }

    #[test]
    fn test_target_input_list() {
        let doc = PageDocument::parse(PAGE);
        let selector = Selector::parse(r#"input[type="number"], input[type="text"]"#).unwrap();
        assert!(doc.query(&selector).is_some());
    }

    #[test]
    fn test_malformed_selectors_are_errors() {
        for source in ["", "div >", "[data-testid=]", ":not-a-pseudo-class"] {
            assert!(Selector::parse(source).is_err(), "{:?} should not compile", source);
        }
        let err = Selector::parse("div >").unwrap_err();
        assert_eq!(err.selector, "div >");
    }

    #[test]
    fn test_source_is_kept() {
        let selector = Selector::parse(r#"  button[aria-label*="Edit"] "#).unwrap();
        assert_eq!(selector.source(), r#"button[aria-label*="Edit"]"#);
        assert_eq!(selector.to_string(), selector.source());
    }
}

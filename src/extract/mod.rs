//! Rule-based structured extraction
//!
//! Extraction rules are compiled once per run and then applied to every
//! fetched document. Failures are isolated per field: a rule with a bad
//! selector produces an error marker for its own field and nothing else.

use crate::config::{ExtractionRule, SelectorKind};
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use std::collections::BTreeMap;

/// Value extracted for one field of one page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldValue {
    /// First match of a single-valued rule
    Single(String),

    /// All matches of a `multiple` rule, in document order
    Many(Vec<String>),

    /// The rule matched nothing (not an error)
    Absent,

    /// The rule itself failed; other fields are unaffected
    Error(String),
}

/// Structured data extracted from one page
///
/// One record per fetched page per rule-set application, appended-only.
/// The shape is format-neutral; JSON/CSV/HTML/XML serializers consume it
/// as-is.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractedRecord {
    /// Normalized URL of the source page
    pub url: String,

    /// Field name to extracted value, ordered by name
    pub fields: BTreeMap<String, FieldValue>,
}

enum CompiledSelector {
    Css(Selector),
    /// Accepted by the config schema but not evaluable
    Unsupported(String),
    /// The selector failed to parse; surfaces as a per-field error
    Invalid(String),
}

struct CompiledRule {
    field_name: String,
    selector: CompiledSelector,
    attribute: Option<String>,
    multiple: bool,
}

/// A rule set compiled for repeated evaluation
///
/// Selector parsing happens once here, at run start; a selector that does
/// not parse is kept as an error marker so it fails only its own field on
/// every page instead of aborting the run.
pub struct SelectorEvaluator {
    rules: Vec<CompiledRule>,
}

impl SelectorEvaluator {
    pub fn compile(rules: &[ExtractionRule]) -> Self {
        let compiled = rules
            .iter()
            .map(|rule| {
                let selector = match rule.kind {
                    SelectorKind::Css => match Selector::parse(&rule.selector) {
                        Ok(selector) => CompiledSelector::Css(selector),
                        Err(e) => CompiledSelector::Invalid(format!(
                            "invalid css selector '{}': {}",
                            rule.selector, e
                        )),
                    },
                    SelectorKind::XPath => CompiledSelector::Unsupported(
                        "xpath selectors are not supported yet".to_string(),
                    ),
                };

                CompiledRule {
                    field_name: rule.field_name.clone(),
                    selector,
                    attribute: rule.attribute.clone(),
                    multiple: rule.multiple,
                }
            })
            .collect();

        Self { rules: compiled }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Applies the rule set to a document body
    ///
    /// Deterministic for a given body and rule set: running extraction
    /// twice produces identical field values.
    pub fn extract(&self, body: &str, url: &str) -> ExtractedRecord {
        let document = Html::parse_document(body);
        let mut fields = BTreeMap::new();

        for rule in &self.rules {
            let value = match &rule.selector {
                CompiledSelector::Css(selector) => {
                    evaluate_css(&document, selector, rule.attribute.as_deref(), rule.multiple)
                }
                CompiledSelector::Unsupported(message)
                | CompiledSelector::Invalid(message) => FieldValue::Error(message.clone()),
            };
            fields.insert(rule.field_name.clone(), value);
        }

        ExtractedRecord {
            url: url.to_string(),
            fields,
        }
    }
}

fn evaluate_css(
    document: &Html,
    selector: &Selector,
    attribute: Option<&str>,
    multiple: bool,
) -> FieldValue {
    if multiple {
        let values: Vec<String> = document
            .select(selector)
            .filter_map(|el| element_value(el, attribute))
            .collect();
        FieldValue::Many(values)
    } else {
        match document.select(selector).next() {
            Some(el) => element_value(el, attribute)
                .map(FieldValue::Single)
                .unwrap_or(FieldValue::Absent),
            None => FieldValue::Absent,
        }
    }
}

/// Text content of the element, or the named attribute's value
///
/// A matched element without the requested attribute yields None
/// (treated as absent, not an error).
fn element_value(element: ElementRef<'_>, attribute: Option<&str>) -> Option<String> {
    match attribute {
        Some(name) => element.value().attr(name).map(|v| v.to_string()),
        None => {
            let text: Vec<&str> = element.text().collect();
            Some(
                text.join(" ")
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join(" "),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(field: &str, selector: &str) -> ExtractionRule {
        ExtractionRule {
            field_name: field.to_string(),
            selector: selector.to_string(),
            kind: SelectorKind::Css,
            attribute: None,
            multiple: false,
        }
    }

    const PAGE: &str = r#"
        <html>
        <head><title>Catalog</title></head>
        <body>
            <h1>Products</h1>
            <div class="item"><a href="/p/1">Widget</a><span class="price">9.99</span></div>
            <div class="item"><a href="/p/2">Gadget</a><span class="price">19.99</span></div>
        </body>
        </html>
    "#;

    #[test]
    fn test_single_takes_first_match() {
        let evaluator = SelectorEvaluator::compile(&[rule("price", ".price")]);
        let record = evaluator.extract(PAGE, "https://example.com/");
        assert_eq!(
            record.fields["price"],
            FieldValue::Single("9.99".to_string())
        );
    }

    #[test]
    fn test_multiple_collects_in_document_order() {
        let mut r = rule("prices", ".price");
        r.multiple = true;
        let evaluator = SelectorEvaluator::compile(&[r]);
        let record = evaluator.extract(PAGE, "https://example.com/");
        assert_eq!(
            record.fields["prices"],
            FieldValue::Many(vec!["9.99".to_string(), "19.99".to_string()])
        );
    }

    #[test]
    fn test_attribute_extraction() {
        let mut r = rule("links", ".item a");
        r.attribute = Some("href".to_string());
        r.multiple = true;
        let evaluator = SelectorEvaluator::compile(&[r]);
        let record = evaluator.extract(PAGE, "https://example.com/");
        assert_eq!(
            record.fields["links"],
            FieldValue::Many(vec!["/p/1".to_string(), "/p/2".to_string()])
        );
    }

    #[test]
    fn test_missing_attribute_is_absent() {
        let mut r = rule("missing", "h1");
        r.attribute = Some("data-id".to_string());
        let evaluator = SelectorEvaluator::compile(&[r]);
        let record = evaluator.extract(PAGE, "https://example.com/");
        assert_eq!(record.fields["missing"], FieldValue::Absent);
    }

    #[test]
    fn test_no_match_is_absent_not_error() {
        let evaluator = SelectorEvaluator::compile(&[rule("nothing", ".does-not-exist")]);
        let record = evaluator.extract(PAGE, "https://example.com/");
        assert_eq!(record.fields["nothing"], FieldValue::Absent);
    }

    #[test]
    fn test_bad_selector_fails_only_its_field() {
        let evaluator =
            SelectorEvaluator::compile(&[rule("broken", ":::nope"), rule("title", "title")]);
        let record = evaluator.extract(PAGE, "https://example.com/");

        assert!(matches!(record.fields["broken"], FieldValue::Error(_)));
        assert_eq!(
            record.fields["title"],
            FieldValue::Single("Catalog".to_string())
        );
    }

    #[test]
    fn test_xpath_rule_yields_error_marker() {
        let mut r = rule("legacy", "//h1/text()");
        r.kind = SelectorKind::XPath;
        let evaluator = SelectorEvaluator::compile(&[r]);
        let record = evaluator.extract(PAGE, "https://example.com/");
        assert!(matches!(record.fields["legacy"], FieldValue::Error(_)));
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let mut many = rule("prices", ".price");
        many.multiple = true;
        let evaluator = SelectorEvaluator::compile(&[rule("title", "title"), many]);

        let first = evaluator.extract(PAGE, "https://example.com/");
        let second = evaluator.extract(PAGE, "https://example.com/");
        assert_eq!(first.fields, second.fields);
    }

    #[test]
    fn test_text_is_whitespace_collapsed() {
        let html = r#"<p>  Hello
            world  </p>"#;
        let evaluator = SelectorEvaluator::compile(&[rule("text", "p")]);
        let record = evaluator.extract(html, "https://example.com/");
        assert_eq!(
            record.fields["text"],
            FieldValue::Single("Hello world".to_string())
        );
    }
}

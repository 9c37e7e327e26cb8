//! Lexical checks for FHIR primitive values
//!
//! Assigned primitives must match the regular expression the FHIR specification
//! publishes for their type. `base64Binary` is checked by decoding, `xhtml` by
//! parsing it as XML; valid xhtml is returned minified.

use base64::{engine::general_purpose, Engine};
use phf::phf_map;
use quick_xml::events::Event;
use quick_xml::{Reader, Writer};
use regex::Regex;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::OnceLock;

const YEAR: &str = r"([0-9]([0-9]([0-9][1-9]|[1-9]0)|[1-9]00)|[1-9]000)";
const TIME: &str = r"([01][0-9]|2[0-3]):[0-5][0-9]:([0-5][0-9]|60)(\.[0-9]+)?";
const ZONE: &str = r"(Z|(\+|-)((0[0-9]|1[0-3]):[0-5][0-9]|14:00))";

static PRIMITIVE_PATTERNS: phf::Map<&'static str, &'static str> = phf_map! {
    "integer" => r"^(0|[-+]?[1-9][0-9]*)$",
    "integer64" => r"^(0|[-+]?[1-9][0-9]*)$",
    "positiveInt" => r"^\+?[1-9][0-9]*$",
    "unsignedInt" => r"^(0|[1-9][0-9]*)$",
    "decimal" => r"^-?(0|[1-9][0-9]*)(\.[0-9]+)?([eE][+-]?[0-9]+)?$",
    "code" => r"^[^\s]+(\s[^\s]+)*$",
    "id" => r"^[A-Za-z0-9\-\.]{1,64}$",
    "oid" => r"^urn:oid:[0-2](\.(0|[1-9][0-9]*))+$",
    "uuid" => r"^urn:uuid:[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$",
    "uri" => r"^\S*$",
    "url" => r"^\S*$",
    "canonical" => r"^\S*$",
    "string" => r"^[\r\n\t\S ]+$",
    "markdown" => r"^[\r\n\t\S ]+$",
};

fn temporal_patterns() -> [(&'static str, String); 4] {
    let month_day = r"-(0[1-9]|1[0-2])(-(0[1-9]|[1-2][0-9]|3[0-1])";
    [
        ("date", format!("^{}({})?)?$", YEAR, month_day)),
        (
            "dateTime",
            format!("^{}({}(T{}{})?)?)?$", YEAR, month_day, TIME, ZONE),
        ),
        (
            "instant",
            format!(
                "^{}-(0[1-9]|1[0-2])-(0[1-9]|[1-2][0-9]|3[0-1])T{}{}$",
                YEAR, TIME, ZONE
            ),
        ),
        ("time", format!("^{}$", TIME)),
    ]
}

fn patterns() -> &'static HashMap<&'static str, Regex> {
    static PATTERNS: OnceLock<HashMap<&'static str, Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let mut compiled: HashMap<&'static str, Regex> = PRIMITIVE_PATTERNS
            .entries()
            .map(|(code, pattern)| {
                (*code, Regex::new(pattern).expect("primitive regex must compile"))
            })
            .collect();
        for (code, pattern) in temporal_patterns() {
            compiled.insert(code, Regex::new(&pattern).expect("temporal regex must compile"));
        }
        compiled
    })
}

/// Check the lexical form of a primitive value given as text.
///
/// Types without a published pattern are accepted.
pub fn is_valid_primitive(type_code: &str, text: &str) -> bool {
    match type_code {
        "base64Binary" => is_valid_base64(text),
        "xhtml" => minify_xhtml(text).is_some(),
        code => patterns().get(code).map_or(true, |re| re.is_match(text)),
    }
}

/// Range check for the integer types, whose JSON representation is a number.
pub fn is_valid_integer(type_code: &str, value: i64) -> bool {
    match type_code {
        "integer" => i32::try_from(value).is_ok(),
        "positiveInt" => value > 0 && i32::try_from(value).is_ok(),
        "unsignedInt" => value >= 0 && i32::try_from(value).is_ok(),
        "integer64" => true,
        _ => false,
    }
}

fn is_valid_base64(text: &str) -> bool {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    general_purpose::STANDARD.decode(compact.as_bytes()).is_ok()
}

/// Validate an xhtml narrative and return it without insignificant whitespace.
///
/// The content must be well-formed XML with a single `div` root element.
pub fn minify_xhtml(text: &str) -> Option<String> {
    let document = roxmltree::Document::parse(text).ok()?;
    if document.root_element().tag_name().name() != "div" {
        return None;
    }

    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    loop {
        match reader.read_event() {
            Ok(Event::Eof) => break,
            Ok(Event::Decl(_)) | Ok(Event::Comment(_)) => {}
            Ok(event) => writer.write_event(event).ok()?,
            Err(_) => return None,
        }
    }
    String::from_utf8(writer.into_inner().into_inner()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checks_temporal_types() {
        assert!(is_valid_primitive("date", "2024"));
        assert!(is_valid_primitive("date", "2024-02-29"));
        assert!(!is_valid_primitive("date", "2024-13"));
        assert!(is_valid_primitive("dateTime", "2024-02-29T10:30:00Z"));
        assert!(!is_valid_primitive("dateTime", "2024-02-29T10:30"));
        assert!(is_valid_primitive("instant", "2024-02-29T10:30:00.123+01:00"));
        assert!(!is_valid_primitive("instant", "2024-02-29"));
        assert!(is_valid_primitive("time", "23:59:59"));
    }

    #[test]
    fn checks_identifiers_and_codes() {
        assert!(is_valid_primitive("id", "my-patient.1"));
        assert!(!is_valid_primitive("id", "has space"));
        assert!(is_valid_primitive("code", "final"));
        assert!(!is_valid_primitive("code", " final"));
        assert!(is_valid_primitive("oid", "urn:oid:2.16.840.1"));
        assert!(!is_valid_primitive("uri", "has space"));
        assert!(!is_valid_primitive("string", ""));
    }

    #[test]
    fn checks_integer_ranges() {
        assert!(is_valid_integer("positiveInt", 1));
        assert!(!is_valid_integer("positiveInt", 0));
        assert!(is_valid_integer("unsignedInt", 0));
        assert!(!is_valid_integer("integer", i64::from(i32::MAX) + 1));
    }

    #[test]
    fn checks_base64() {
        assert!(is_valid_primitive("base64Binary", "aGVsbG8="));
        assert!(!is_valid_primitive("base64Binary", "not base64!"));
    }

    #[test]
    fn minifies_xhtml() {
        let minified = minify_xhtml(
            "<div xmlns=\"http://www.w3.org/1999/xhtml\">\n  <p>Hello</p>\n</div>",
        )
        .unwrap();
        assert_eq!(
            minified,
            "<div xmlns=\"http://www.w3.org/1999/xhtml\"><p>Hello</p></div>"
        );
        assert!(minify_xhtml("<p>not a div</p>").is_none());
        assert!(minify_xhtml("<div><p>unclosed</div>").is_none());
    }
}

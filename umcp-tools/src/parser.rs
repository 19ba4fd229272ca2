//! Reinterprets captured process output as structured text.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use regex::Regex;
use serde_json::map::Entry;
use serde_json::{Map, Number, Value};
use thiserror::Error;
use umcp_primitives::{CoercionType, Group, OutputSpec, OutputType};

/// Result alias for output parsing.
pub type ParseResult<T> = Result<T, ParseError>;

/// Errors produced while reinterpreting output.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Output declared as JSON did not parse.
    #[error("invalid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    /// Regex output was declared without a pattern.
    #[error("regex pattern is required")]
    MissingPattern,

    /// The declared pattern did not compile.
    #[error("invalid regex pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// CSV output could not be read.
    #[error("failed to parse CSV: {0}")]
    InvalidCsv(#[from] csv::Error),

    /// XML output was malformed.
    #[error("failed to parse XML: {0}")]
    InvalidXml(String),

    /// The structured result could not be encoded.
    #[error("failed to encode output: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Reinterprets `raw` according to `spec`.
///
/// Structured formats are returned as pretty-printed JSON text. Raw output is
/// returned unchanged.
///
/// # Errors
///
/// Returns a [`ParseError`] describing why the output does not match the
/// declared format.
pub fn parse_output(raw: &str, spec: &OutputSpec) -> ParseResult<String> {
    match spec.output_type() {
        OutputType::Raw => Ok(raw.to_owned()),
        OutputType::Json => {
            let value: Value = serde_json::from_str(raw).map_err(ParseError::InvalidJson)?;
            pretty(&value)
        }
        OutputType::Lines => pretty(&lines(raw)),
        OutputType::Regex => {
            let pattern = spec
                .pattern()
                .filter(|p| !p.is_empty())
                .ok_or(ParseError::MissingPattern)?;
            pretty(&regex_matches(raw, &Regex::new(pattern)?, spec.groups()))
        }
        OutputType::Csv => pretty(&csv_rows(raw)?),
        OutputType::Xml => pretty(&xml_value(raw)?),
    }
}

fn pretty(value: &Value) -> ParseResult<String> {
    serde_json::to_string_pretty(value).map_err(ParseError::Encode)
}

fn lines(raw: &str) -> Value {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| Value::String(line.to_owned()))
        .collect()
}

fn regex_matches(raw: &str, re: &Regex, groups: &[Group]) -> Value {
    re.captures_iter(raw)
        .map(|caps| {
            let mut row = Map::new();
            if groups.is_empty() {
                for (index, capture) in caps.iter().enumerate().skip(1) {
                    let text = capture.map_or("", |m| m.as_str());
                    row.insert(format!("group{index}"), Value::String(text.to_owned()));
                }
            } else {
                for (index, group) in groups.iter().enumerate() {
                    if index + 1 >= caps.len() {
                        break;
                    }
                    let text = caps.get(index + 1).map_or("", |m| m.as_str());
                    row.insert(group.name().to_owned(), coerce(text, group.coercion()));
                }
            }
            Value::Object(row)
        })
        .collect()
}

fn coerce(text: &str, coercion: CoercionType) -> Value {
    let fallback = || Value::String(text.to_owned());
    match coercion {
        CoercionType::String => fallback(),
        CoercionType::Integer => text
            .trim()
            .parse::<i64>()
            .map_or_else(|_| fallback(), Value::from),
        CoercionType::Float => text
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map_or_else(fallback, Value::Number),
        CoercionType::Boolean => match text.to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Value::Bool(true),
            "false" | "no" | "0" => Value::Bool(false),
            _ => fallback(),
        },
    }
}

fn csv_rows(raw: &str) -> ParseResult<Value> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(raw.as_bytes());

    let headers = reader.headers()?.clone();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let row: Map<String, Value> = headers
            .iter()
            .zip(record.iter())
            .map(|(header, cell)| (header.to_owned(), Value::String(cell.to_owned())))
            .collect();
        rows.push(Value::Object(row));
    }
    Ok(Value::Array(rows))
}

/// Element under construction while walking XML events.
struct Element {
    name: String,
    fields: Map<String, Value>,
    text: String,
}

impl Element {
    fn open(start: &BytesStart<'_>) -> ParseResult<Self> {
        let mut fields = Map::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|err| ParseError::InvalidXml(err.to_string()))?;
            let value = attr
                .unescape_value()
                .map_err(|err| ParseError::InvalidXml(err.to_string()))?;
            let key = format!("@{}", String::from_utf8_lossy(attr.key.as_ref()));
            fields.insert(key, Value::String(value.into_owned()));
        }
        Ok(Self {
            name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
            fields,
            text: String::new(),
        })
    }

    fn add_child(&mut self, name: String, value: Value) {
        match self.fields.entry(name) {
            Entry::Vacant(slot) => {
                slot.insert(value);
            }
            Entry::Occupied(mut slot) => match slot.get_mut() {
                Value::Array(items) => items.push(value),
                existing => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, value]);
                }
            },
        }
    }

    fn close(mut self) -> (String, Value) {
        if self.fields.is_empty() {
            return (self.name, Value::String(self.text));
        }
        if !self.text.is_empty() {
            self.fields.insert("#text".to_owned(), Value::String(self.text));
        }
        (self.name, Value::Object(self.fields))
    }
}

fn xml_value(raw: &str) -> ParseResult<Value> {
    let mut reader = Reader::from_str(raw);
    reader.config_mut().trim_text(true);

    let invalid = |err: quick_xml::Error| ParseError::InvalidXml(err.to_string());
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Value> = None;

    let mut finish = |stack: &mut Vec<Element>, element: Element| -> ParseResult<()> {
        let (name, value) = element.close();
        match stack.last_mut() {
            Some(parent) => parent.add_child(name, value),
            None if root.is_none() => {
                let mut doc = Map::new();
                doc.insert(name, value);
                root = Some(Value::Object(doc));
            }
            None => return Err(ParseError::InvalidXml("multiple root elements".into())),
        }
        Ok(())
    };

    loop {
        match reader.read_event().map_err(invalid)? {
            Event::Start(start) => stack.push(Element::open(&start)?),
            Event::Empty(start) => {
                let element = Element::open(&start)?;
                finish(&mut stack, element)?;
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| ParseError::InvalidXml("unexpected closing tag".into()))?;
                finish(&mut stack, element)?;
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(invalid)?;
                match stack.last_mut() {
                    Some(element) => element.text.push_str(&text),
                    None => {
                        return Err(ParseError::InvalidXml(
                            "text outside of root element".into(),
                        ));
                    }
                }
            }
            Event::CData(data) => {
                if let Some(element) = stack.last_mut() {
                    element.text.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(ParseError::InvalidXml("unclosed element at end of input".into()));
    }
    root.ok_or_else(|| ParseError::InvalidXml("no root element".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn parsed(raw: &str, spec: &OutputSpec) -> Value {
        serde_json::from_str(&parse_output(raw, spec).unwrap()).unwrap()
    }

    #[test]
    fn raw_passes_through() {
        let spec = OutputSpec::default();
        assert_eq!(parse_output("  keep me \n", &spec).unwrap(), "  keep me \n");
    }

    #[test]
    fn json_is_reindented() {
        let spec = OutputSpec::new(OutputType::Json);
        let out = parse_output(r#"{"a":[1,2]}"#, &spec).unwrap();
        assert_eq!(out, "{\n  \"a\": [\n    1,\n    2\n  ]\n}");

        let err = parse_output("{not json", &spec).unwrap_err();
        assert!(matches!(err, ParseError::InvalidJson(_)));
    }

    #[test]
    fn lines_are_trimmed_and_compacted() {
        let spec = OutputSpec::new(OutputType::Lines);
        assert_eq!(
            parsed("line1\nline2\n\nline3 ", &spec),
            json!(["line1", "line2", "line3"])
        );
    }

    #[test]
    fn regex_groups_are_coerced() {
        let spec = OutputSpec::regex(
            r"(\w+): (\d+)%",
            vec![
                Group::new("resource", CoercionType::String),
                Group::new("usage", CoercionType::Integer),
            ],
        );
        assert_eq!(
            parsed("CPU: 45%\nMemory: 78%", &spec),
            json!([
                { "resource": "CPU", "usage": 45 },
                { "resource": "Memory", "usage": 78 }
            ])
        );
    }

    #[test]
    fn regex_without_groups_uses_synthetic_names() {
        let spec = OutputSpec::regex(r"(\w+)=(\w+)", Vec::new());
        assert_eq!(
            parsed("a=1 b=yes", &spec),
            json!([
                { "group1": "a", "group2": "1" },
                { "group1": "b", "group2": "yes" }
            ])
        );
    }

    #[test]
    fn regex_zero_matches_is_empty_array() {
        let spec = OutputSpec::regex(r"(\d+)", Vec::new());
        assert_eq!(parsed("no digits here", &spec), json!([]));
    }

    #[test]
    fn regex_requires_valid_pattern() {
        let missing = OutputSpec::new(OutputType::Regex);
        assert!(matches!(
            parse_output("x", &missing),
            Err(ParseError::MissingPattern)
        ));

        let broken = OutputSpec::regex("(unclosed", Vec::new());
        assert!(matches!(
            parse_output("x", &broken),
            Err(ParseError::InvalidPattern(_))
        ));
    }

    #[test]
    fn boolean_and_float_coercion_fall_back_to_text() {
        assert_eq!(coerce("YES", CoercionType::Boolean), json!(true));
        assert_eq!(coerce("0", CoercionType::Boolean), json!(false));
        assert_eq!(coerce("maybe", CoercionType::Boolean), json!("maybe"));
        assert_eq!(coerce("1.5", CoercionType::Float), json!(1.5));
        assert_eq!(coerce("n/a", CoercionType::Integer), json!("n/a"));
    }

    #[test]
    fn csv_rows_are_keyed_by_header() {
        let spec = OutputSpec::new(OutputType::Csv);
        assert_eq!(
            parsed("name, size\nsrc, 4\nREADME\n", &spec),
            json!([
                { "name": "src", "size": "4" },
                { "name": "README" }
            ])
        );
        assert_eq!(parsed("", &spec), json!([]));
    }

    #[test]
    fn xml_decodes_into_nested_value() {
        let spec = OutputSpec::new(OutputType::Xml);
        let raw = r#"<?xml version="1.0"?>
<status branch="main">
  <entry>a.rs</entry>
  <entry>b.rs</entry>
  <clean/>
</status>"#;
        assert_eq!(
            parsed(raw, &spec),
            json!({
                "status": {
                    "@branch": "main",
                    "entry": ["a.rs", "b.rs"],
                    "clean": ""
                }
            })
        );
    }

    #[test]
    fn malformed_xml_errors() {
        let spec = OutputSpec::new(OutputType::Xml);
        assert!(matches!(
            parse_output("<a><b></a>", &spec),
            Err(ParseError::InvalidXml(_))
        ));
        assert!(matches!(
            parse_output("<a>", &spec),
            Err(ParseError::InvalidXml(_))
        ));
    }
}

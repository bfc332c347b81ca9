//! Block-structured config nodes
//!
//! The text format used for behaviour definitions and saved vessels:
//!
//! ```text
//! INVENTORY
//! {
//!     resourceName = LiquidFuel   // comments run to end of line
//!     amount = 40
//! }
//! ```
//!
//! Values are the rest of the line after `=`. Keys and node names may repeat
//! and keep their order.

use std::fmt;
use std::str::FromStr;

use nom::branch::alt;
use nom::bytes::complete::{tag, take_while1};
use nom::character::complete::{char, multispace1, not_line_ending, space0};
use nom::combinator::{all_consuming, map, value};
use nom::multi::many0;
use nom::sequence::{delimited, preceded, terminated};
use nom::{IResult, Parser};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum NodeError {
    #[error("Syntax error at line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("Missing value '{key}' in {node}")]
    MissingValue { node: String, key: String },

    #[error("Missing node '{child}' in {node}")]
    MissingNode { node: String, child: String },

    #[error("Invalid value '{value}' for '{key}' in {node}: {reason}")]
    InvalidValue {
        node: String,
        key: String,
        value: String,
        reason: String,
    },
}

/// A named block of ordered key/value pairs and child blocks
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigNode {
    pub name: String,
    pub values: Vec<(String, String)>,
    pub nodes: Vec<ConfigNode>,
}

impl ConfigNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn add_value(&mut self, key: impl Into<String>, value: impl ToString) {
        self.values.push((key.into(), value.to_string()));
    }

    pub fn with_value(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.add_value(key, value);
        self
    }

    pub fn add_node(&mut self, node: ConfigNode) {
        self.nodes.push(node);
    }

    pub fn with_node(mut self, node: ConfigNode) -> Self {
        self.add_node(node);
        self
    }

    /// First value stored under `key`
    pub fn get_value(&self, key: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_value(&self, key: &str) -> bool {
        self.get_value(key).is_some()
    }

    pub fn get_node(&self, name: &str) -> Option<&ConfigNode> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn get_nodes<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ConfigNode> + 'a {
        self.nodes.iter().filter(move |n| n.name == name)
    }

    /// Parse the value under `key`, `Ok(None)` when absent
    pub fn parse_value<T>(&self, key: &str) -> Result<Option<T>, NodeError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.get_value(key) {
            None => Ok(None),
            Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| NodeError::InvalidValue {
                node: self.name.clone(),
                key: key.to_string(),
                value: raw.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    /// Parse the value under `key`, failing when absent
    pub fn require_value<T>(&self, key: &str) -> Result<T, NodeError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        self.parse_value(key)?.ok_or_else(|| NodeError::MissingValue {
            node: self.name.clone(),
            key: key.to_string(),
        })
    }

    /// Parse a `True`/`False` value, `Ok(None)` when absent
    pub fn parse_bool(&self, key: &str) -> Result<Option<bool>, NodeError> {
        match self.get_value(key) {
            None => Ok(None),
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(Some(true)),
                "false" => Ok(Some(false)),
                _ => Err(NodeError::InvalidValue {
                    node: self.name.clone(),
                    key: key.to_string(),
                    value: raw.to_string(),
                    reason: "expected True or False".into(),
                }),
            },
        }
    }

    /// Parse a document; top-level entries become children of an unnamed root
    pub fn parse(text: &str) -> Result<ConfigNode, NodeError> {
        match all_consuming(terminated(many0(entry), skip)).parse(text) {
            Ok((_, entries)) => Ok(build_node(String::new(), entries)),
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
                let offset = text.len() - e.input.len();
                let line = text[..offset].lines().count().max(1);
                let near: String = e.input.chars().take(24).collect();
                Err(NodeError::Syntax {
                    line,
                    message: format!("unexpected input near '{}'", near.trim()),
                })
            }
            Err(nom::Err::Incomplete(_)) => Err(NodeError::Syntax {
                line: text.lines().count(),
                message: "unexpected end of input".into(),
            }),
        }
    }

    fn write_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let indent = "\t".repeat(depth);
        writeln!(f, "{}{}", indent, self.name)?;
        writeln!(f, "{}{{", indent)?;
        self.write_body(f, depth + 1)?;
        writeln!(f, "{}}}", indent)
    }

    fn write_body(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let indent = "\t".repeat(depth);
        for (key, value) in &self.values {
            writeln!(f, "{}{} = {}", indent, key, value)?;
        }
        for node in &self.nodes {
            node.write_indented(f, depth)?;
        }
        Ok(())
    }
}

impl fmt::Display for ConfigNode {
    /// An unnamed node is written as a bare document
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            self.write_body(f, 0)
        } else {
            self.write_indented(f, 0)
        }
    }
}

impl FromStr for ConfigNode {
    type Err = NodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConfigNode::parse(s)
    }
}

// === PARSER ===

enum Entry<'a> {
    Value(&'a str, &'a str),
    Node(&'a str, Vec<Entry<'a>>),
}

fn build_node(name: String, entries: Vec<Entry<'_>>) -> ConfigNode {
    let mut node = ConfigNode::new(name);
    for entry in entries {
        match entry {
            Entry::Value(key, value) => node.add_value(key, value),
            Entry::Node(name, children) => node.add_node(build_node(name.to_string(), children)),
        }
    }
    node
}

/// Whitespace and `//` comments
fn skip(input: &str) -> IResult<&str, ()> {
    value(
        (),
        many0(alt((
            value((), multispace1),
            value((), (tag("//"), not_line_ending)),
        ))),
    )
    .parse(input)
}

fn key(input: &str) -> IResult<&str, &str> {
    map(
        take_while1(|c: char| !matches!(c, '=' | '{' | '}' | '\n' | '\r')),
        str::trim,
    )
    .parse(input)
}

fn strip_comment(raw: &str) -> &str {
    match raw.find("//") {
        Some(pos) => raw[..pos].trim(),
        None => raw.trim(),
    }
}

fn entry(input: &str) -> IResult<&str, Entry<'_>> {
    let (input, _) = skip(input)?;
    let (input, name) = key(input)?;
    alt((
        map(preceded((space0, char('=')), not_line_ending), move |raw: &str| {
            Entry::Value(name, strip_comment(raw))
        }),
        map(
            delimited((skip, char('{')), many0(entry), (skip, char('}'))),
            move |children| Entry::Node(name, children),
        ),
    ))
    .parse(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
// leading comment
VESSEL
{
\tname = Station One
\tINVENTORY
\t{
\t\tresourceName = LiquidFuel // trailing
\t\tamount = 40
\t}
\tINVENTORY
\t{
\t\tresourceName = Oxidizer
\t\tamount = 48.5
\t}
}
";

    #[test]
    fn test_parse_nested_nodes() {
        let root = ConfigNode::parse(SAMPLE).unwrap();
        let vessel = root.get_node("VESSEL").unwrap();

        assert_eq!(vessel.get_value("name"), Some("Station One"));
        let inventories: Vec<_> = vessel.get_nodes("INVENTORY").collect();
        assert_eq!(inventories.len(), 2);
        assert_eq!(inventories[0].get_value("resourceName"), Some("LiquidFuel"));
        assert_eq!(inventories[1].require_value::<f64>("amount").unwrap(), 48.5);
    }

    #[test]
    fn test_written_document_parses_back() {
        let root = ConfigNode::parse(SAMPLE).unwrap();
        let text = root.to_string();
        let reparsed = ConfigNode::parse(&text).unwrap();
        assert_eq!(reparsed, root);
    }

    #[test]
    fn test_infinity_round_trips() {
        let node = ConfigNode::new("TANK").with_value("maxAmount", f64::INFINITY);
        let reparsed = ConfigNode::parse(&node.to_string()).unwrap();
        let tank = reparsed.get_node("TANK").unwrap();
        assert_eq!(tank.require_value::<f64>("maxAmount").unwrap(), f64::INFINITY);
    }

    #[test]
    fn test_empty_value_and_empty_node() {
        let root = ConfigNode::parse("A\n{\n\tnote =\n\tB\n\t{\n\t}\n}\n").unwrap();
        let a = root.get_node("A").unwrap();
        assert_eq!(a.get_value("note"), Some(""));
        assert!(a.get_node("B").unwrap().values.is_empty());
    }

    #[test]
    fn test_unbalanced_braces_report_line() {
        let err = ConfigNode::parse("A\n{\n\tx = 1\n").unwrap_err();
        assert!(matches!(err, NodeError::Syntax { .. }));
    }

    #[test]
    fn test_typed_value_errors() {
        let node = ConfigNode::new("TANK")
            .with_value("amount", "lots")
            .with_value("flag", "maybe");
        assert!(matches!(
            node.parse_value::<f64>("amount"),
            Err(NodeError::InvalidValue { .. })
        ));
        assert!(node.parse_bool("flag").is_err());
        assert!(matches!(
            node.require_value::<f64>("missing"),
            Err(NodeError::MissingValue { .. })
        ));
    }
}

//! Path expressions
//!
//! Extended paths address nodes relative to a context node. Besides plain
//! names (`a/b[2]`) a segment may be:
//!
//! - `{.}` / `{_name}` followed by an optional suffix: the context node's name
//! - `{..}` / `{_parent}` plus suffix: the context node's parent's name
//! - `{prop}` as a whole segment: jump to the node whose identifier is stored
//!   in property `prop` of the context node
//! - `name[cond,...]` where a condition is `k=v`, `k='literal'`, `k={prop}`,
//!   a bare `k` (property exists) or `{_similar}`
//!
//! Parsing is purely syntactic; [`resolver::PathResolver`] evaluates a parsed
//! path against a store.

pub mod resolver;

pub use resolver::{PathResolver, Resolved, ResolutionEntry};

use crate::error::PathError;
use std::fmt;

/// Name part of a step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamePart {
    Literal(String),
    /// `{.}` or `{_name}` and the text after it
    SelfName(String),
    /// `{..}` or `{_parent}` and the text after it
    ParentName(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionValue {
    Plain(String),
    Literal(String),
    /// Value of a property of the context node
    PropertyRef(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    Equals { key: String, value: ConditionValue },
    Exists { key: String },
    /// Equality on every discriminator property declared by the context node's parent
    Similar,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Current,
    Parent,
    Identifier { property: String },
    Step {
        name: NamePart,
        index: Option<usize>,
        conditions: Vec<Condition>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPath {
    pub absolute: bool,
    pub segments: Vec<Segment>,
}

/// Validate syntax only.
pub fn check_format(path: &str) -> Result<(), PathError> {
    parse(path).map(|_| ())
}

pub fn parse(path: &str) -> Result<ParsedPath, PathError> {
    if path.is_empty() {
        return Err(PathError::Empty);
    }
    let (absolute, body) = match path.strip_prefix('/') {
        Some(rest) => (true, rest),
        None => (false, path),
    };
    let mut raw = split_segments(path, body)?;
    if raw.last().map(|s| s.is_empty()).unwrap_or(false) {
        raw.pop();
    }
    let segments = raw
        .iter()
        .map(|segment| parse_segment(path, segment))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ParsedPath { absolute, segments })
}

#[derive(Default)]
struct Scan {
    quote: Option<char>,
    bracket: bool,
    brace: bool,
}

impl Scan {
    fn nested(&self) -> bool {
        self.quote.is_some() || self.bracket || self.brace
    }

    fn step(&mut self, path: &str, c: char) -> Result<(), PathError> {
        if let Some(q) = self.quote {
            if c == q {
                self.quote = None;
            }
            return Ok(());
        }
        match c {
            '\'' | '"' if self.bracket => self.quote = Some(c),
            '[' if self.bracket => return Err(PathError::malformed(path, "'[' not allowed inside a condition")),
            '[' => self.bracket = true,
            ']' if self.brace => return Err(PathError::malformed(path, "missing '}'")),
            ']' if !self.bracket => return Err(PathError::malformed(path, "unexpected ']'")),
            ']' => self.bracket = false,
            '{' if self.brace => return Err(PathError::malformed(path, "nested '{' not allowed")),
            '{' => self.brace = true,
            '}' if !self.brace => return Err(PathError::malformed(path, "unexpected '}'")),
            '}' => self.brace = false,
            _ => {}
        }
        Ok(())
    }

    fn finish(&self, path: &str) -> Result<(), PathError> {
        if self.quote.is_some() {
            Err(PathError::malformed(path, "unterminated quoted literal"))
        } else if self.brace {
            Err(PathError::malformed(path, "missing '}'"))
        } else if self.bracket {
            Err(PathError::malformed(path, "missing ']'"))
        } else {
            Ok(())
        }
    }
}

fn split_segments(path: &str, body: &str) -> Result<Vec<String>, PathError> {
    let mut segments = Vec::new();
    if body.is_empty() {
        return Ok(segments);
    }
    let mut scan = Scan::default();
    let mut current = String::new();
    for c in body.chars() {
        if c == '/' && !scan.nested() {
            if current.is_empty() {
                return Err(PathError::malformed(path, "'//' is not allowed"));
            }
            segments.push(std::mem::take(&mut current));
            continue;
        }
        scan.step(path, c)?;
        current.push(c);
    }
    scan.finish(path)?;
    segments.push(current);
    Ok(segments)
}

fn parse_segment(path: &str, segment: &str) -> Result<Segment, PathError> {
    match segment {
        "." => return Ok(Segment::Current),
        ".." => return Ok(Segment::Parent),
        _ => {}
    }

    if let Some(rest) = segment.strip_prefix('{') {
        let close = rest
            .find('}')
            .ok_or_else(|| PathError::malformed(path, "missing '}'"))?;
        let token = &rest[..close];
        let after = &rest[close + 1..];
        return match token {
            "." | "_name" => {
                let (suffix, index, conditions) = parse_step(path, after, true)?;
                Ok(Segment::Step {
                    name: NamePart::SelfName(suffix),
                    index,
                    conditions,
                })
            }
            ".." | "_parent" => {
                let (suffix, index, conditions) = parse_step(path, after, true)?;
                Ok(Segment::Step {
                    name: NamePart::ParentName(suffix),
                    index,
                    conditions,
                })
            }
            _ => {
                if !after.is_empty() {
                    return Err(PathError::malformed(
                        path,
                        format!("identifier reference '{{{}}}' must be a whole segment", token),
                    ));
                }
                validate_name(path, token)?;
                Ok(Segment::Identifier {
                    property: token.to_string(),
                })
            }
        };
    }

    let (name, index, conditions) = parse_step(path, segment, false)?;
    Ok(Segment::Step {
        name: NamePart::Literal(name),
        index,
        conditions,
    })
}

type Step = (String, Option<usize>, Vec<Condition>);

fn parse_step(path: &str, text: &str, suffix: bool) -> Result<Step, PathError> {
    let (name, bracket) = match text.find('[') {
        Some(open) => {
            let inner = &text[open + 1..];
            let close = matching_bracket(inner)
                .ok_or_else(|| PathError::malformed(path, "missing ']'"))?;
            let trailing = &inner[close + 1..];
            if let Some(c) = trailing.chars().next() {
                return Err(PathError::malformed(path, format!("'{}' not valid after ']'", c)));
            }
            (&text[..open], Some(&inner[..close]))
        }
        None => (text, None),
    };

    if name.is_empty() {
        if !suffix {
            return Err(PathError::malformed(path, "empty name"));
        }
    } else {
        validate_name(path, name)?;
    }

    let mut index = None;
    let mut conditions = Vec::new();
    if let Some(content) = bracket {
        let content = content.trim();
        if content.is_empty() {
            return Err(PathError::malformed(path, "empty condition"));
        }
        if content.chars().all(|c| c.is_ascii_digit()) {
            let n: usize = content
                .parse()
                .map_err(|_| PathError::malformed(path, "index number invalid"))?;
            if n == 0 {
                return Err(PathError::malformed(path, "index must be 1 or greater"));
            }
            index = Some(n);
        } else {
            for part in split_conditions(content) {
                conditions.push(parse_condition(path, part.trim())?);
            }
        }
    }
    Ok((name.to_string(), index, conditions))
}

/// Position of the `]` closing a bracket whose `[` precedes `text`.
fn matching_bracket(text: &str) -> Option<usize> {
    let mut quote = None;
    for (i, c) in text.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '\'' || c == '"' => quote = Some(c),
            None if c == ']' => return Some(i),
            None => {}
        }
    }
    None
}

fn split_conditions(content: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut quote = None;
    let mut brace = false;
    let mut start = 0;
    for (i, c) in content.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' => quote = Some(c),
                '{' => brace = true,
                '}' => brace = false,
                ',' if !brace => {
                    parts.push(&content[start..i]);
                    start = i + 1;
                }
                _ => {}
            },
        }
    }
    parts.push(&content[start..]);
    parts
}

fn parse_condition(path: &str, text: &str) -> Result<Condition, PathError> {
    if text.is_empty() {
        return Err(PathError::malformed(path, "empty condition"));
    }
    if text == "{_similar}" {
        return Ok(Condition::Similar);
    }
    match text.find('=') {
        Some(pos) => {
            let key = condition_key(path, &text[..pos])?;
            let raw = text[pos + 1..].trim();
            let value = if raw.len() >= 2
                && ((raw.starts_with('\'') && raw.ends_with('\'')) || (raw.starts_with('"') && raw.ends_with('"')))
            {
                ConditionValue::Literal(raw[1..raw.len() - 1].to_string())
            } else if raw.starts_with('{') && raw.ends_with('}') {
                let property = &raw[1..raw.len() - 1];
                validate_name(path, property)?;
                ConditionValue::PropertyRef(property.to_string())
            } else if raw.contains(['\'', '"', '{', '}']) {
                return Err(PathError::malformed(path, format!("malformed condition value '{}'", raw)));
            } else {
                ConditionValue::Plain(raw.to_string())
            };
            Ok(Condition::Equals { key, value })
        }
        None => Ok(Condition::Exists {
            key: condition_key(path, text)?,
        }),
    }
}

fn condition_key(path: &str, raw: &str) -> Result<String, PathError> {
    let key = raw.trim();
    let key = key.strip_prefix('@').unwrap_or(key);
    validate_name(path, key)?;
    Ok(key.to_string())
}

fn validate_name(path: &str, name: &str) -> Result<(), PathError> {
    if name.is_empty() {
        return Err(PathError::malformed(path, "empty name"));
    }
    if name.starts_with(' ') || name.ends_with(' ') {
        return Err(PathError::malformed(path, format!("'{}' has leading or trailing spaces", name)));
    }
    if let Some(c) = name
        .chars()
        .find(|c| matches!(*c, '*' | '|' | '[' | ']' | '{' | '}' | '\'' | '"' | '/') || (c.is_whitespace() && *c != ' '))
    {
        return Err(PathError::malformed(path, format!("'{}' not a valid name character", c.escape_default())));
    }
    if let Some((prefix, local)) = name.split_once(':') {
        if prefix.is_empty() {
            return Err(PathError::malformed(path, "prefix must not be empty"));
        }
        if local.is_empty() || local.contains(':') {
            return Err(PathError::malformed(path, format!("'{}' is not a valid qualified name", name)));
        }
    }
    Ok(())
}

impl fmt::Display for ConditionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionValue::Plain(v) => write!(f, "{}", v),
            ConditionValue::Literal(v) => write!(f, "'{}'", v),
            ConditionValue::PropertyRef(p) => write!(f, "{{{}}}", p),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Equals { key, value } => write!(f, "{}={}", key, value),
            Condition::Exists { key } => write!(f, "{}", key),
            Condition::Similar => write!(f, "{{_similar}}"),
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Current => write!(f, "."),
            Segment::Parent => write!(f, ".."),
            Segment::Identifier { property } => write!(f, "{{{}}}", property),
            Segment::Step {
                name,
                index,
                conditions,
            } => {
                match name {
                    NamePart::Literal(n) => write!(f, "{}", n)?,
                    NamePart::SelfName(s) => write!(f, "{{.}}{}", s)?,
                    NamePart::ParentName(s) => write!(f, "{{..}}{}", s)?,
                }
                if let Some(i) = index {
                    write!(f, "[{}]", i)?;
                }
                if !conditions.is_empty() {
                    let parts: Vec<String> = conditions.iter().map(|c| c.to_string()).collect();
                    write!(f, "[{}]", parts.join(","))?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for ParsedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.segments.iter().map(|s| s.to_string()).collect();
        if self.absolute {
            write!(f, "/")?;
        }
        write!(f, "{}", parts.join("/"))
    }
}

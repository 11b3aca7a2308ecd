//! Object literal syntax used inside facet configuration
//!
//! Range specs and display options are written as loose object literals:
//! `{name:'cheap', resolution:'double', begin:0, end:10}`. Keys are bare
//! words, values are quoted strings or bare tokens.

use nom::{
    branch::alt,
    bytes::complete::{take_until, take_while1},
    character::complete::{char, multispace0},
    combinator::{all_consuming, map},
    multi::separated_list0,
    sequence::{delimited, separated_pair},
    IResult,
};

pub(crate) type Object = Vec<(String, String)>;

fn ws<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

fn quoted(input: &str) -> IResult<&str, &str> {
    alt((
        delimited(char('\''), take_until("'"), char('\'')),
        delimited(char('"'), take_until("\""), char('"')),
    ))(input)
}

fn bare(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| !c.is_whitespace() && !matches!(c, ',' | '}' | ']' | '{' | '[' | ':' | '\'' | '"'))(input)
}

fn key(input: &str) -> IResult<&str, &str> {
    alt((quoted, take_while1(|c: char| c.is_alphanumeric() || c == '_' || c == '-')))(input)
}

fn value(input: &str) -> IResult<&str, &str> {
    alt((quoted, bare))(input)
}

fn entry(input: &str) -> IResult<&str, (String, String)> {
    map(separated_pair(ws(key), char(':'), ws(value)), |(k, v): (&str, &str)| {
        (k.to_string(), v.to_string())
    })(input)
}

fn object(input: &str) -> IResult<&str, Object> {
    delimited(ws(char('{')), separated_list0(char(','), entry), ws(char('}')))(input)
}

fn object_list(input: &str) -> IResult<&str, Vec<Object>> {
    delimited(ws(char('[')), separated_list0(char(','), object), ws(char(']')))(input)
}

/// Parse a single object literal spanning the whole input.
pub(crate) fn parse_object(text: &str) -> Result<Object, String> {
    all_consuming(object)(text)
        .map(|(_, obj)| obj)
        .map_err(|e| e.to_string())
}

/// Parse a bracketed list of object literals spanning the whole input.
pub(crate) fn parse_object_list(text: &str) -> Result<Vec<Object>, String> {
    all_consuming(object_list)(text)
        .map(|(_, list)| list)
        .map_err(|e| e.to_string())
}

pub(crate) fn lookup<'a>(object: &'a Object, key: &str) -> Option<&'a str> {
    object
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v.as_str())
}

use nom::branch::alt;
use nom::bytes::complete::{escaped_transform, tag, take_while1, take_while_m_n};
use nom::character::complete::{char, multispace0};
use nom::combinator::{all_consuming, map, map_opt, map_res, opt, value};
use nom::error::ErrorKind;
use nom::multi::separated_list0;
use nom::number::complete::recognize_float;
use nom::sequence::{delimited, preceded};
use nom::{IResult, Parser};

use crate::error::{Error, Result};

/// Field configuration literal, as embedded in a form container's `data-params`.
///
/// Grammar:
/// - arrays open with `[` or the `%.@.` marker and close with `]`
/// - strings are double quoted with JS escapes
/// - numbers are integers or floats
/// - `null`, `true`, `false`
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Array(Vec<Literal>),
}

impl Literal {
    /// Positional lookup; `None` when out of range or not an array.
    pub fn get(&self, index: usize) -> Option<&Literal> {
        self.as_array().and_then(|items| items.get(index))
    }

    pub fn as_array(&self) -> Option<&[Literal]> {
        match self {
            Literal::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Literal::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Literal::Int(n) => Some(*n),
            Literal::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    /// Flags are serialized either as a bare `true` or as the string `"true"`.
    pub fn is_true(&self) -> bool {
        matches!(self, Literal::Bool(true)) || self.as_str() == Some("true")
    }

    /// Text form of a validator operand. Falsy entries become the empty string.
    pub fn operand(&self) -> String {
        match self {
            Literal::Str(s) => s.clone(),
            Literal::Int(0) => String::new(),
            Literal::Int(n) => n.to_string(),
            Literal::Float(f) if *f == 0.0 => String::new(),
            Literal::Float(f) => f.to_string(),
            Literal::Bool(true) => "true".to_string(),
            Literal::Null | Literal::Bool(false) | Literal::Array(_) => String::new(),
        }
    }
}

fn ws<'a, O, F>(inner: F) -> impl Parser<&'a str, Output = O, Error = nom::error::Error<&'a str>>
where
    F: Parser<&'a str, Output = O, Error = nom::error::Error<&'a str>>,
{
    delimited(multispace0, inner, multispace0)
}

fn hex4(input: &str) -> IResult<&str, u32> {
    map_res(
        take_while_m_n(4, 4, |c: char| c.is_ascii_hexdigit()),
        |digits: &str| u32::from_str_radix(digits, 16),
    )
    .parse(input)
}

fn hex_byte(input: &str) -> IResult<&str, char> {
    map_opt(
        take_while_m_n(2, 2, |c: char| c.is_ascii_hexdigit()),
        |digits: &str| u32::from_str_radix(digits, 16).ok().and_then(char::from_u32),
    )
    .parse(input)
}

/// `\uXXXX`, joining a high surrogate with the `\uXXXX` low surrogate after it.
fn unicode_escape(input: &str) -> IResult<&str, char> {
    let (input, high) = hex4(input)?;
    let (input, code) = if (0xD800..0xDC00).contains(&high) {
        let (input, low) = preceded(tag("\\u"), hex4).parse(input)?;
        if !(0xDC00..0xE000).contains(&low) {
            return Err(nom::Err::Error(nom::error::Error::new(input, ErrorKind::Char)));
        }
        (input, 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00))
    } else {
        (input, high)
    };
    match char::from_u32(code) {
        Some(c) => Ok((input, c)),
        None => Err(nom::Err::Error(nom::error::Error::new(input, ErrorKind::Char))),
    }
}

fn string(input: &str) -> IResult<&str, String> {
    delimited(
        char('"'),
        map(
            opt(escaped_transform(
                take_while1(|c: char| c != '\\' && c != '"'),
                '\\',
                alt((
                    value('"', char('"')),
                    value('\\', char('\\')),
                    value('/', char('/')),
                    value('\n', char('n')),
                    value('\r', char('r')),
                    value('\t', char('t')),
                    value('\u{8}', char('b')),
                    value('\u{c}', char('f')),
                    preceded(char('x'), hex_byte),
                    preceded(char('u'), unicode_escape),
                )),
            )),
            Option::unwrap_or_default,
        ),
        char('"'),
    )
    .parse(input)
}

fn number(input: &str) -> IResult<&str, Literal> {
    map_opt(recognize_float, |text: &str| {
        if text.contains(['.', 'e', 'E']) {
            return text.parse().ok().map(Literal::Float);
        }
        match text.parse() {
            Ok(n) => Some(Literal::Int(n)),
            Err(_) => text.parse().ok().map(Literal::Float),
        }
    })
    .parse(input)
}

fn keyword(input: &str) -> IResult<&str, Literal> {
    alt((
        value(Literal::Null, tag("null")),
        value(Literal::Bool(true), tag("true")),
        value(Literal::Bool(false), tag("false")),
    ))
    .parse(input)
}

fn array(input: &str) -> IResult<&str, Literal> {
    map(
        delimited(
            alt((tag("%.@."), tag("["))),
            separated_list0(char(','), ws(literal)),
            preceded(multispace0, char(']')),
        ),
        Literal::Array,
    )
    .parse(input)
}

fn literal(input: &str) -> IResult<&str, Literal> {
    alt((array, map(string, Literal::Str), keyword, number)).parse(input)
}

/// Decode a `data-params` attribute. The result is always an array.
pub fn parse_config(input: &str) -> Result<Literal> {
    let (_, parsed) = all_consuming(ws(literal))
        .parse(input)
        .map_err(|err| match err {
            nom::Err::Error(e) | nom::Err::Failure(e) => Error::Parse(format!(
                "{:?} at byte {}",
                e.code,
                input.len() - e.input.len()
            )),
            nom::Err::Incomplete(_) => Error::Parse("incomplete input".to_string()),
        })?;
    match parsed {
        Literal::Array(_) => Ok(parsed),
        other => Err(Error::Parse(format!(
            "expected data parameters to be a list, got {other:?}"
        ))),
    }
}

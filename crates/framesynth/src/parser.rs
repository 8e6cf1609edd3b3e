//! Hint directive parser using nom
//!
//! Directive format:
//! ```text
//! name = value [; name = value ...]
//! ```
//!
//! Names are cache option names, case-insensitive, with or without the
//! `set_` prefix (`max_capacity`, `SET_MAX_CAPACITY`, `max`). Values are
//! integers or, for policies, symbolic names (`all`, `range`, `nothing`,
//! `window`, `none`). Entries are separated by `;` or `,`.
//!
//! ```text
//! min_capacity=0; max_capacity=0
//! policy=range, radius=4, audio_window=48000
//! ```

use nom::{
    branch::alt,
    bytes::complete::take_while1,
    character::complete::{char, digit1, multispace0, one_of},
    combinator::{all_consuming, opt, recognize},
    multi::separated_list0,
    sequence::{delimited, pair, preceded, separated_pair, terminated, tuple},
    Finish, IResult,
};

use crate::error::Result;
use crate::hints::CacheOption;

/// One validated `configure` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Directive {
    /// Option to set
    pub option: CacheOption,
    /// Raw hint value
    pub value: i64,
}

fn ident(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_')(input)
}

fn number(input: &str) -> IResult<&str, &str> {
    recognize(pair(opt(char('-')), digit1))(input)
}

fn assignment(input: &str) -> IResult<&str, (&str, &str)> {
    separated_pair(
        preceded(multispace0, ident),
        delimited(multispace0, char('='), multispace0),
        alt((number, ident)),
    )(input)
}

fn separator(input: &str) -> IResult<&str, char> {
    delimited(multispace0, one_of(";,"), multispace0)(input)
}

fn directive_list(input: &str) -> IResult<&str, Vec<(&str, &str)>> {
    terminated(
        separated_list0(separator, assignment),
        tuple((multispace0, opt(one_of(";,")), multispace0)),
    )(input)
}

/// Parse and validate a directive string
pub fn parse_directives(input: &str) -> Result<Vec<Directive>> {
    let (_, pairs) = all_consuming(directive_list)(input).finish()?;

    pairs
        .into_iter()
        .map(|(name, text)| {
            let option: CacheOption = name.parse()?;
            let value = option.parse_value(text)?;
            option.check_value(value)?;
            Ok(Directive { option, value })
        })
        .collect()
}

#[allow(unused)]
use tracing::{debug, error, info, span, trace, warn, Instrument, Level};

use lazy_static::lazy_static;
use nom::{
    bytes::complete::{tag, take_till},
    IResult,
};
use regex::Regex;

lazy_static! {
    static ref LABEL_NAME_RE: Regex = Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").unwrap();
}

/// ```abnf
/// label-name = label-name-initial-char *label-name-char
///
/// label-name-char = label-name-initial-char / DIGIT
/// label-name-initial-char = ALPHA / "_"
/// ```
pub(super) fn is_label_name(name: &str) -> bool {
    LABEL_NAME_RE.is_match(name)
}

/// Decodes the character following a backslash inside a label value.
///
/// Only `\\`, `\n` and `\"` are recognized, anything else is kept as the
/// literal backslash followed by the character.
pub(super) fn unescape(c: char, value: &mut String) {
    match c {
        '\\' => value.push('\\'),
        'n' => value.push('\n'),
        '"' => value.push('"'),
        c => {
            value.push('\\');
            value.push(c);
        }
    }
}

/// abnf's SP token
pub(super) fn single_space(input: &str) -> IResult<&str, &str> {
    tag(" ")(input)
}

/// Everything up to the next space, possibly nothing
pub(super) fn token(input: &str) -> IResult<&str, &str> {
    take_till(|c| c == ' ')(input)
}

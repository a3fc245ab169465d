#[allow(unused)]
use tracing::{debug, error, info, span, trace, warn, Instrument, Level};

use indexmap::IndexMap;
use nom::{bytes::complete::tag, combinator::map, sequence::tuple, IResult};

mod types;
use types::*;

/// Prefix of the comment line declaring the type of the samples that follow it
pub const TYPE_PREFIX: &str = "# TYPE ";

#[cfg(feature = "hash_fnv")]
type LabelHasher = fnv::FnvBuildHasher;

#[cfg(not(feature = "hash_fnv"))]
type LabelHasher = std::collections::hash_map::RandomState;

/// Label name to label value, iterated in the order the names first appeared.
pub type LabelSet = IndexMap<String, String, LabelHasher>;

/// The way in which an exposition line failed to lex
#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
pub enum Malformation {
    #[error("label value must be quoted")]
    UnquotedLabelValue,

    #[error("invalid label name «{0}»")]
    InvalidLabelName(String),

    #[error("expected «,» or «}}» after a label value, found {0:?}")]
    UnexpectedSeparator(char),

    #[error("expected a single space after «}}», found {0:?}")]
    MissingSpaceAfterLabels(char),

    #[error("unterminated label value")]
    UnterminatedLabelValue,

    #[error("missing sample value")]
    MissingValue,

    #[error("missing metric type")]
    MissingMetricType,
}

/// Indicates that an exposition line could not be converted.  Carries the whole offending line.
#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
#[error("invalid line ({kind}): {line}")]
pub struct MalformedLine {
    pub line: String,
    pub kind: Malformation,
}

impl MalformedLine {
    pub fn new(line: &str, kind: Malformation) -> Self {
        Self {
            line: line.to_owned(),
            kind,
        }
    }
}

/// States of the label set lexer.  The opening `{` has already been consumed when lexing starts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LexState {
    #[default]
    StartOfLabelName,
    LabelName,
    LabelValueQuote,
    LabelValue,
    LabelValueEscape,
    EndOfLabelValue,
    EndOfLabels,
    /// The space after `}` was seen, nothing further is consumed.
    Done,
}

/// What a single character does to the label buffers
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Skip,
    Name(char),
    Value(char),
    Escape(char),
    /// Validate the buffered name and store the buffered pair
    Commit,
}

/// The label set state machine.  One character of input, no lookahead.
pub fn transition(state: LexState, c: char) -> Result<(LexState, Action), Malformation> {
    use LexState::*;

    match (state, c) {
        (StartOfLabelName, '}') => Ok((EndOfLabels, Action::Skip)),
        (StartOfLabelName, c) => Ok((LabelName, Action::Name(c))),

        (LabelName, '=') => Ok((LabelValueQuote, Action::Skip)),
        (LabelName, c) => Ok((LabelName, Action::Name(c))),

        (LabelValueQuote, '"') => Ok((LabelValue, Action::Skip)),
        (LabelValueQuote, _) => Err(Malformation::UnquotedLabelValue),

        (LabelValue, '\\') => Ok((LabelValueEscape, Action::Skip)),
        (LabelValue, '"') => Ok((EndOfLabelValue, Action::Commit)),
        (LabelValue, c) => Ok((LabelValue, Action::Value(c))),

        (LabelValueEscape, c) => Ok((LabelValue, Action::Escape(c))),

        (EndOfLabelValue, ',') => Ok((LabelName, Action::Skip)),
        (EndOfLabelValue, '}') => Ok((EndOfLabels, Action::Skip)),
        (EndOfLabelValue, c) => Err(Malformation::UnexpectedSeparator(c)),

        (EndOfLabels, ' ') => Ok((Done, Action::Skip)),
        (EndOfLabels, c) => Err(Malformation::MissingSpaceAfterLabels(c)),

        (Done, _) => Ok((Done, Action::Skip)),
    }
}

#[derive(Debug, Default)]
struct LabelLexer {
    state: LexState,
    name: String,
    value: String,
    labels: LabelSet,
}

impl LabelLexer {
    fn feed(&mut self, c: char) -> Result<LexState, Malformation> {
        let (state, action) = transition(self.state, c)?;

        match action {
            Action::Skip => {}
            Action::Name(c) => self.name.push(c),
            Action::Value(c) => self.value.push(c),
            Action::Escape(c) => unescape(c, &mut self.value),
            Action::Commit => {
                let name = std::mem::take(&mut self.name);
                let value = std::mem::take(&mut self.value);

                if !is_label_name(&name) {
                    return Err(Malformation::InvalidLabelName(name));
                }

                trace!(%name, %value, "label");
                self.labels.insert(name, value);
            }
        }

        self.state = state;
        Ok(state)
    }

    /// Running out of input between pairs keeps what was committed, a partial name is dropped.
    fn finish(self) -> Result<LabelSet, Malformation> {
        use LexState::*;

        match self.state {
            StartOfLabelName | LabelName | EndOfLabelValue | EndOfLabels | Done => {
                if !self.name.is_empty() {
                    trace!(name = %self.name, "dropping partial label name");
                }
                Ok(self.labels)
            }
            LabelValueQuote | LabelValue | LabelValueEscape => {
                Err(Malformation::UnterminatedLabelValue)
            }
        }
    }
}

/// Lexes the label set of `line`.  `input` starts right after the opening `{`.
///
/// Consumes characters up to and including the single space following the closing `}`, the
/// rest of `input` is left alone.  Running out of input right after the `}` is fine as callers
/// usually strip the sample value first.  Running out before the `}` is tolerated too, unless it
/// happens inside a quoted value.
pub fn labels(input: &str, line: &str) -> Result<LabelSet, MalformedLine> {
    let mut lexer = LabelLexer::default();

    for c in input.chars() {
        let state = lexer
            .feed(c)
            .map_err(|kind| MalformedLine::new(line, kind))?;

        if state == LexState::Done {
            break;
        }
    }

    lexer.finish().map_err(|kind| MalformedLine::new(line, kind))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeDescriptor<'a> {
    pub metric_name: &'a str,
    pub metric_type: &'a str,
}

impl<'a> TypeDescriptor<'a> {
    /// ```abnf
    /// type-descriptor = HASH SP "TYPE" SP metricname SP metric-type
    /// ```
    ///
    /// Anything after the metric type is ignored.
    fn nom(input: &'a str) -> IResult<&'a str, Self> {
        map(
            tuple((tag(TYPE_PREFIX), token, single_space, token)),
            |(_, metric_name, _, metric_type)| Self {
                metric_name,
                metric_type,
            },
        )(input)
    }
}

/// Recognizes a `# TYPE <metric_name> <metric_type>` line
#[tracing::instrument(level = "trace")]
pub fn type_descriptor(line: &str) -> Result<TypeDescriptor<'_>, MalformedLine> {
    TypeDescriptor::nom(line)
        .map(|(_, descriptor)| descriptor)
        .map_err(|_| MalformedLine::new(line, Malformation::MissingMetricType))
}

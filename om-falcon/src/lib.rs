//! `om-falcon` converts the Prometheus text exposition format into Open-Falcon push records
//!
//! The heavy lifting is done by a small hand written state machine in [`lexer`], [`parser`]
//! drives it line by line and [`transport`]/[`sync`] move the results around.

#[allow(unused)]
use tracing::{debug, error, info, span, trace, warn, Instrument, Level};

/// Character level lexing of label sets and `# TYPE` descriptors
pub mod lexer;

/// Turns exposition lines into [`FalconSample`](crate::parser::FalconSample)s.
pub mod parser;

/// Fetching expositions and pushing samples to Open-Falcon
pub mod transport;

/// A single pass or a periodic loop of fetch, convert and deliver.
pub mod sync;


/// Indicates that an error occurred while bridging an exposition
#[derive(thiserror::Error, Debug)]
pub enum FalconError {
    #[error(transparent)]
    Malformed(#[from] lexer::MalformedLine),

    #[error(transparent)]
    Transport(#[from] transport::TransportError),

    #[error("couldn't write samples: {0}")]
    Io(#[from] std::io::Error),

    #[error("couldn't encode sample: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Lazily converts `lines` into [`FalconSample`](crate::parser::FalconSample)s, logging the lines
/// skipped for their type.
pub fn parse_falcon_samples<L>(
    lines: L,
    step: u64,
    endpoint: &str,
) -> parser::Samples<L::IntoIter>
where
    L: IntoIterator,
    L::Item: AsRef<str>,
{
    parser::Samples::new(lines, step, endpoint)
}

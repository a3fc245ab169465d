#[allow(unused)]
use tracing::{debug, error, info, span, trace, warn, Instrument, Level};

use std::{
    fmt,
    str::FromStr,
    time::{SystemTime, UNIX_EPOCH},
};

use itertools::Itertools;
use serde_derive::Serialize;

use crate::lexer::{self, LabelSet, Malformation, MalformedLine, TYPE_PREFIX};

pub type Result<T> = std::result::Result<T, MalformedLine>;

/// The type most recently declared by a `# TYPE` line.  Only counters and gauges can be pushed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MetricType {
    Counter,
    Gauge,
    /// Any other type token, upper cased.
    Other(String),
}

/// Open-Falcon's `counterType`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CounterType {
    Counter,
    Gauge,
}

/// A single record of an Open-Falcon push payload
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FalconSample {
    pub endpoint: String,
    pub metric: String,
    /// Seconds since the epoch, shared by every sample of a pass
    pub timestamp: u64,
    /// Reporting interval in seconds
    pub step: u64,
    /// Carried through exactly as exposed
    pub value: String,
    pub counter_type: CounterType,
    /// `key=value` pairs joined with commas
    pub tags: String,
}

/// Receives the conditions the stream parser steps over without failing
pub trait Diagnostics {
    /// A data line was skipped because the type in effect is not a counter or gauge.  `metric_type`
    /// is `None` when no `# TYPE` line has been seen yet.
    fn unsupported_type(&mut self, metric_type: Option<&MetricType>, line: &str);
}

/// Logs diagnostics as `tracing` events
#[derive(Clone, Copy, Debug, Default)]
pub struct LogDiagnostics;

impl Diagnostics for LogDiagnostics {
    fn unsupported_type(&mut self, metric_type: Option<&MetricType>, line: &str) {
        warn!(?metric_type, line, "ignoring sample of unsupported type");
    }
}

impl<D: Diagnostics + ?Sized> Diagnostics for &mut D {
    fn unsupported_type(&mut self, metric_type: Option<&MetricType>, line: &str) {
        (**self).unsupported_type(metric_type, line)
    }
}

impl MetricType {
    pub fn counter_type(&self) -> Option<CounterType> {
        match self {
            Self::Counter => Some(CounterType::Counter),
            Self::Gauge => Some(CounterType::Gauge),
            Self::Other(_) => None,
        }
    }
}

impl FromStr for MetricType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.to_uppercase();
        Ok(match s.as_str() {
            "COUNTER" => Self::Counter,
            "GAUGE" => Self::Gauge,
            _ => Self::Other(s),
        })
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Counter => f.write_str("COUNTER"),
            Self::Gauge => f.write_str("GAUGE"),
            Self::Other(s) => f.write_str(s),
        }
    }
}

fn join_tags(labels: &LabelSet) -> String {
    labels
        .iter()
        .map(|(name, value)| format!("{}={}", name, value))
        .join(",")
}

/// Converts a single data line into a [`FalconSample`].
///
/// The value is whatever follows the last space of the line.  A line without a `{` has no labels
/// and never reaches the label lexer.
pub fn to_falcon_sample(
    counter_type: CounterType,
    line: &str,
    step: u64,
    timestamp: u64,
    endpoint: &str,
) -> Result<FalconSample> {
    let (info, value) = line
        .rsplit_once(' ')
        .ok_or_else(|| MalformedLine::new(line, Malformation::MissingValue))?;

    let (metric, labels) = match info.split_once('{') {
        Some((metric, label_text)) => (metric, lexer::labels(label_text, line)?),
        None => (info, LabelSet::default()),
    };

    Ok(FalconSample {
        endpoint: endpoint.to_owned(),
        metric: metric.to_owned(),
        timestamp,
        step,
        value: value.to_owned(),
        counter_type,
        tags: join_tags(&labels),
    })
}

/// Lazily converts exposition lines into [`FalconSample`]s.
///
/// Lines are expected without their trailing newline.  The first malformed line is yielded as an
/// error and ends the iteration.
pub struct Samples<I, D = LogDiagnostics> {
    lines: I,
    step: u64,
    endpoint: String,
    timestamp: u64,
    current_type: Option<MetricType>,
    diagnostics: D,
    failed: bool,
}

impl<I> Samples<I> {
    /// Starts a pass, capturing the current time as the timestamp of all its samples
    pub fn new<L>(lines: L, step: u64, endpoint: impl Into<String>) -> Self
    where
        L: IntoIterator<IntoIter = I>,
    {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();

        Self {
            lines: lines.into_iter(),
            step,
            endpoint: endpoint.into(),
            timestamp,
            current_type: None,
            diagnostics: LogDiagnostics,
            failed: false,
        }
    }
}

impl<I, D> Samples<I, D> {
    pub fn with_timestamp(self, timestamp: u64) -> Self {
        Self { timestamp, ..self }
    }

    pub fn with_diagnostics<E: Diagnostics>(self, diagnostics: E) -> Samples<I, E> {
        Samples {
            lines: self.lines,
            step: self.step,
            endpoint: self.endpoint,
            timestamp: self.timestamp,
            current_type: self.current_type,
            diagnostics,
            failed: self.failed,
        }
    }

    /// The timestamp shared by every sample of this pass
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }
}

impl<I, L, D> Iterator for Samples<I, D>
where
    I: Iterator<Item = L>,
    L: AsRef<str>,
    D: Diagnostics,
{
    type Item = Result<FalconSample>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        loop {
            let line = self.lines.next()?;
            let line = line.as_ref();

            if line.is_empty() {
                continue;
            }

            if line.starts_with('#') {
                if line.starts_with(TYPE_PREFIX) {
                    match lexer::type_descriptor(line) {
                        Ok(descriptor) => {
                            debug!(
                                metric_name = descriptor.metric_name,
                                metric_type = descriptor.metric_type
                            );
                            self.current_type = descriptor.metric_type.parse().ok();
                        }
                        Err(e) => {
                            self.failed = true;
                            return Some(Err(e));
                        }
                    }
                } else {
                    trace!(line, "comment");
                }
                continue;
            }

            let counter_type = match self.current_type.as_ref().and_then(MetricType::counter_type)
            {
                Some(counter_type) => counter_type,
                None => {
                    self.diagnostics
                        .unsupported_type(self.current_type.as_ref(), line);
                    continue;
                }
            };

            let sample = to_falcon_sample(
                counter_type,
                line,
                self.step,
                self.timestamp,
                &self.endpoint,
            );
            self.failed = sample.is_err();

            return Some(sample);
        }
    }
}

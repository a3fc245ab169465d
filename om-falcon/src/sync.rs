#[allow(unused)]
use tracing::{debug, error, info, span, trace, warn, Instrument, Level};

use std::{io::Write, thread, time::Duration};

use crate::{
    parse_falcon_samples,
    parser,
    transport::{FalconClient, MetricSource},
    FalconError,
};

/// What to do with the samples of a pass
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// Write each sample as a line of JSON instead of pushing
    Print,
    /// Push the whole batch to this Open-Falcon push API
    Push(String),
}

pub struct Bridge {
    source: MetricSource,
    delivery: Delivery,
    endpoint: String,
    step: u64,
    client: FalconClient,
}

impl Bridge {
    pub fn new(
        source: MetricSource,
        delivery: Delivery,
        endpoint: impl Into<String>,
        step: u64,
    ) -> Result<Self, FalconError> {
        Ok(Self {
            source,
            delivery,
            endpoint: endpoint.into(),
            step,
            client: FalconClient::new()?,
        })
    }

    pub fn with_client(self, client: FalconClient) -> Self {
        Self { client, ..self }
    }

    /// Fetches, converts and delivers one exposition.  Returns the number of samples delivered.
    ///
    /// A malformed line fails the whole pass.  When pushing nothing is sent in that case, when
    /// printing the samples before the bad line have already been written.
    #[tracing::instrument(skip_all, fields(endpoint = %self.endpoint))]
    pub fn sync<W: Write>(&self, out: &mut W) -> Result<usize, FalconError> {
        let lines = self.client.fetch(&self.source)?;
        let samples = parse_falcon_samples(lines, self.step, &self.endpoint);

        let count = match &self.delivery {
            Delivery::Print => {
                let mut count = 0;
                for sample in samples {
                    writeln!(out, "{}", serde_json::to_string(&sample?)?)?;
                    count += 1;
                }
                writeln!(out)?;
                count
            }
            Delivery::Push(url) => {
                let samples = samples.collect::<parser::Result<Vec<_>>>()?;
                self.client.push(url, &samples)?;
                samples.len()
            }
        };

        info!(samples = count, "synced");
        Ok(count)
    }

    /// Syncs every `step` seconds, forever.  Failed passes are logged and otherwise ignored.
    pub fn run<W: Write>(&self, out: &mut W) -> ! {
        let interval = Duration::from_secs(self.step);

        loop {
            if let Err(e) = self.sync(out) {
                error!(error = %e, "sync failed");
            }
            thread::sleep(interval);
        }
    }
}

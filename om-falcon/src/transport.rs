#[allow(unused)]
use tracing::{debug, error, info, span, trace, warn, Instrument, Level};

use std::{io::BufRead, str::FromStr, time::Duration};

use reqwest::{
    blocking::Client,
    header::{CONTENT_LENGTH, CONTENT_TYPE},
};

use crate::parser::FalconSample;

/// How long to wait for the metrics source
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// How long to wait for the push API
pub const PUSH_TIMEOUT: Duration = Duration::from_secs(3);

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("unsupported url format: {0}")]
    UnsupportedSource(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("couldn't read standard input: {0}")]
    Io(#[from] std::io::Error),

    #[error("couldn't encode samples: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// Where an exposition is read from
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MetricSource {
    Http(String),
    /// Spelled `-` on the command line
    Stdin,
}

impl FromStr for MetricSource {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self> {
        if s == "-" {
            Ok(Self::Stdin)
        } else if s.starts_with("http") {
            Ok(Self::Http(s.to_owned()))
        } else {
            Err(TransportError::UnsupportedSource(s.to_owned()))
        }
    }
}

/// Splits a response body into lines, dropping trailing whitespace
pub fn split_lines(body: &str) -> Vec<String> {
    body.lines().map(|line| line.trim_end().to_owned()).collect()
}

/// Blocking HTTP client for both ends of the bridge
#[derive(Clone, Debug)]
pub struct FalconClient {
    http: Client,
}

impl FalconClient {
    pub fn new() -> Result<Self> {
        let http = Client::builder().user_agent(USER_AGENT).gzip(true).build()?;
        Ok(Self::with_client(http))
    }

    pub fn with_client(http: Client) -> Self {
        Self { http }
    }

    /// Reads the whole exposition from `source`
    pub fn fetch(&self, source: &MetricSource) -> Result<Vec<String>> {
        match source {
            MetricSource::Http(url) => {
                debug!(url = url.as_str(), "start reading metrics");
                let body = self
                    .http
                    .get(url)
                    .timeout(FETCH_TIMEOUT)
                    .send()?
                    .error_for_status()?
                    .text()?;
                Ok(split_lines(&body))
            }
            MetricSource::Stdin => {
                debug!("start reading metrics from standard input");
                let lines = std::io::stdin()
                    .lock()
                    .lines()
                    .map(|line| line.map(|line| line.trim_end().to_owned()))
                    .collect::<std::io::Result<Vec<_>>>()?;
                Ok(lines)
            }
        }
    }

    /// Posts `samples` to the push API as a single JSON array
    pub fn push(&self, url: &str, samples: &[FalconSample]) -> Result<()> {
        let payload = serde_json::to_vec(samples)?;

        debug!(url, samples = samples.len(), "pushing samples");
        self.http
            .post(url)
            .timeout(PUSH_TIMEOUT)
            .header(CONTENT_TYPE, "application/json")
            .header(CONTENT_LENGTH, payload.len())
            .body(payload)
            .send()?
            .error_for_status()?;
        debug!(url, "pushed samples");

        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use std::{
        io::{BufReader, Read, Write},
        net::{TcpListener, TcpStream},
        thread::{self, JoinHandle},
    };

    use crate::parser::CounterType;

    /// Serves a single request and hands back what was received.
    pub(crate) fn serve_once(
        status: &'static str,
        body: &'static str,
    ) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("couldn't bind");
        let addr = listener.local_addr().expect("no local address");

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("couldn't accept");
            let request = read_request(&mut stream);
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            stream
                .write_all(response.as_bytes())
                .expect("couldn't respond");
            request
        });

        (format!("http://{}/metrics", addr), handle)
    }

    fn read_request(stream: &mut TcpStream) -> String {
        let mut reader = BufReader::new(stream);
        let mut request = String::new();
        let mut content_length = 0;

        loop {
            let mut line = String::new();
            reader.read_line(&mut line).expect("couldn't read");
            if line.is_empty() || line == "\r\n" {
                break;
            }
            if let Some((name, value)) = line.split_once(':') {
                if name.eq_ignore_ascii_case("content-length") {
                    content_length = value.trim().parse().expect("bad content-length");
                }
            }
            request.push_str(&line);
        }

        let mut body = vec![0; content_length];
        reader.read_exact(&mut body).expect("short body");
        request.push_str("\r\n");
        request.push_str(&String::from_utf8(body).expect("body is not utf-8"));
        request
    }

    pub(crate) fn client() -> FalconClient {
        FalconClient::with_client(
            Client::builder()
                .no_proxy()
                .build()
                .expect("couldn't build client"),
        )
    }

    fn sample() -> FalconSample {
        FalconSample {
            endpoint: "test".into(),
            metric: "requests_total".into(),
            timestamp: 1_600_000_000,
            step: 60,
            value: "12".into(),
            counter_type: CounterType::Counter,
            tags: "code=200".into(),
        }
    }

    #[test]
    fn metric_source() {
        assert_eq!(MetricSource::Stdin, "-".parse::<MetricSource>().unwrap());
        assert_eq!(
            MetricSource::Http("https://localhost:9100/metrics".into()),
            "https://localhost:9100/metrics"
                .parse::<MetricSource>()
                .unwrap()
        );
        assert!(matches!(
            "/tmp/metrics".parse::<MetricSource>(),
            Err(TransportError::UnsupportedSource(s)) if s == "/tmp/metrics"
        ));
    }

    #[test]
    fn lines_are_right_trimmed() {
        assert_eq!(
            vec!["# TYPE a gauge", "a 1", "", "b 2"],
            split_lines("# TYPE a gauge  \r\na 1\t\n\nb 2\n")
        );
    }

    #[test]
    fn fetch_over_http() {
        let (url, server) = serve_once("200 OK", "# TYPE a counter\na{b=\"c\"} 1 \n");

        let lines = client()
            .fetch(&MetricSource::Http(url))
            .expect("fetch failed");
        let request = server.join().expect("server panicked");

        assert_eq!(vec!["# TYPE a counter", "a{b=\"c\"} 1"], lines);
        assert!(request.starts_with("GET /metrics HTTP/1.1"));
    }

    #[test]
    fn fetch_rejects_error_status() {
        let (url, server) = serve_once("503 Service Unavailable", "");

        let result = client().fetch(&MetricSource::Http(url));
        server.join().expect("server panicked");

        assert!(matches!(result, Err(TransportError::Http(_))));
    }

    #[test]
    fn push_posts_json_array() {
        let (url, server) = serve_once("200 OK", "success");

        client().push(&url, &[sample()]).expect("push failed");
        let request = server.join().expect("server panicked");

        let (head, body) = request.split_once("\r\n\r\n").expect("no body");
        let head = head.to_ascii_lowercase();
        assert!(head.starts_with("post /metrics http/1.1"));
        assert!(head.contains("content-type: application/json"));
        assert!(head.contains(&format!("content-length: {}", body.len())));

        let body: serde_json::Value = serde_json::from_str(body).expect("invalid json");
        assert_eq!(
            serde_json::json!([{
                "endpoint": "test",
                "metric": "requests_total",
                "timestamp": 1_600_000_000,
                "step": 60,
                "value": "12",
                "counterType": "COUNTER",
                "tags": "code=200",
            }]),
            body
        );
    }

    #[test]
    fn push_rejects_error_status() {
        let (url, server) = serve_once("500 Internal Server Error", "");

        let result = client().push(&url, &[sample()]);
        server.join().expect("server panicked");

        assert!(matches!(result, Err(TransportError::Http(_))));
    }
}

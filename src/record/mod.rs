use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// A single log record accepted from a producer.
///
/// The timestamp is assigned when the record is created at the ingestion
/// boundary; records are never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub received_at: DateTime<Utc>,
    pub content: String,
}

impl Record {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            received_at: Utc::now(),
            content: content.into(),
        }
    }

    pub fn with_timestamp(received_at: DateTime<Utc>, content: impl Into<String>) -> Self {
        Self {
            received_at,
            content: content.into(),
        }
    }
}

/// On-disk line encoding for records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordFormat {
    /// `[<timestamp>] <content>`
    #[default]
    Plain,
    /// `{"received_at":"<timestamp>","content":"<content>"}`
    Json,
}

#[derive(Serialize)]
struct JsonLine<'a> {
    received_at: String,
    content: &'a str,
}

impl RecordFormat {
    /// Encode a batch of records into one UTF-8 buffer, one line per record.
    pub fn encode(&self, records: &[Record]) -> Result<Vec<u8>, serde_json::Error> {
        let mut buf = Vec::with_capacity(records.iter().map(|r| r.content.len() + 40).sum());

        for record in records {
            match self {
                RecordFormat::Plain => {
                    buf.push(b'[');
                    buf.extend_from_slice(format_timestamp(&record.received_at).as_bytes());
                    buf.extend_from_slice(b"] ");
                    buf.extend_from_slice(escape_line_breaks(&record.content).as_bytes());
                }
                RecordFormat::Json => {
                    let line = JsonLine {
                        received_at: format_timestamp(&record.received_at),
                        content: &record.content,
                    };
                    serde_json::to_writer(&mut buf, &line)?;
                }
            }
            buf.push(b'\n');
        }

        Ok(buf)
    }
}

/// RFC 3339 in UTC with microsecond precision and a `Z` suffix.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

// A record must never span more than one line in plain mode.
fn escape_line_breaks(content: &str) -> Cow<'_, str> {
    if content.contains(['\r', '\n']) {
        Cow::Owned(content.replace('\r', "\\r").replace('\n', "\\n"))
    } else {
        Cow::Borrowed(content)
    }
}

//! Scan events streamed to observers while a scan runs.
//!
//! Every event serializes as one flat record,
//! `{type, progress?, message?, result?, error?}`, so it can be pushed as-is
//! over a text/event-stream connection.

use serde::{Serialize, Serializer};

use crate::types::ProbeResult;

/// An event emitted during a scan.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    /// Overall completion of the scan, 0–100.
    Progress { percent: u8, message: String },
    /// A host worth reporting.
    Result(ProbeResult),
    /// Terminal: the scan was aborted or stopped.
    Error { message: String },
    /// Terminal: the scan ran to completion.
    Complete { message: String },
}

impl ScanEvent {
    pub fn progress(percent: u8, message: impl Into<String>) -> Self {
        Self::Progress {
            percent: percent.min(100),
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn complete(message: impl Into<String>) -> Self {
        Self::Complete {
            message: message.into(),
        }
    }

    /// Error and Complete end a scan's event stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error { .. } | Self::Complete { .. })
    }

    /// The `type` discriminator used on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Progress { .. } => "progress",
            Self::Result(_) => "result",
            Self::Error { .. } => "error",
            Self::Complete { .. } => "complete",
        }
    }
}

#[derive(Serialize)]
struct WireEvent<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    progress: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<&'a ProbeResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

impl Serialize for ScanEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut wire = WireEvent {
            kind: self.kind(),
            progress: None,
            message: None,
            result: None,
            error: None,
        };

        match self {
            Self::Progress { percent, message } => {
                wire.progress = Some(*percent);
                wire.message = Some(message);
            }
            Self::Result(result) => wire.result = Some(result),
            // Older clients read `error`, newer ones `message`.
            Self::Error { message } => {
                wire.message = Some(message);
                wire.error = Some(message);
            }
            Self::Complete { message } => wire.message = Some(message),
        }

        wire.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;
    use std::time::Duration;

    use super::*;
    use crate::types::PingResult;

    #[test]
    fn test_progress_serialization_keeps_zero() {
        let json = serde_json::to_string(&ScanEvent::progress(0, "Starting ping scan...")).unwrap();
        assert_eq!(
            json,
            r#"{"type":"progress","progress":0,"message":"Starting ping scan..."}"#
        );
    }

    #[test]
    fn test_progress_is_clamped() {
        assert_eq!(
            ScanEvent::progress(140, "x"),
            ScanEvent::Progress {
                percent: 100,
                message: "x".to_string()
            }
        );
    }

    #[test]
    fn test_result_event_embeds_payload() {
        let event = ScanEvent::Result(ProbeResult::Ping(PingResult {
            address: Ipv4Addr::new(10, 0, 0, 5),
            alive: true,
            rtt: Duration::from_millis(3),
            error: None,
            hostname: None,
        }));

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "result");
        assert_eq!(value["result"]["ip"], "10.0.0.5");
        assert!(value.get("progress").is_none());
        assert!(value.get("message").is_none());
    }

    #[test]
    fn test_error_event_carries_both_fields() {
        let value = serde_json::to_value(ScanEvent::error("Scan stopped by user")).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["error"], "Scan stopped by user");
        assert_eq!(value["message"], "Scan stopped by user");
    }

    #[test]
    fn test_terminal_events() {
        assert!(ScanEvent::complete("Scan completed").is_terminal());
        assert!(ScanEvent::error("boom").is_terminal());
        assert!(!ScanEvent::progress(50, "half").is_terminal());
    }
}

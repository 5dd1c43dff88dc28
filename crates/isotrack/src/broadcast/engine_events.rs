use chrono::{DateTime, Local};
use serde::Serialize;
use tokio::sync::broadcast;

/// Something the archival engine did to a tracked file or report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EngineEvent {
    /// A stable file was found in intake and is now in flight.
    FileTracked { file_name: String },
    /// First sighting at the machine stage; the dwell timer starts here.
    StageSighted { file_name: String },
    Archived {
        file_name: String,
        archive_path: String,
        record_id: i64,
        #[serde(skip_serializing_if = "Option::is_none")]
        cycle_duration: Option<String>,
    },
    ArchiveFailed {
        file_name: String,
        attempt: u32,
        error: String,
    },
    DeadLettered {
        file_name: String,
        attempts: u32,
        error: String,
    },
    ReportApplied { report: String, file_name: String },
    /// The report arrived before its file was archived.
    ReportDeferred { report: String, file_name: String },
}

impl EngineEvent {
    pub fn file_name(&self) -> &str {
        match self {
            EngineEvent::FileTracked { file_name }
            | EngineEvent::StageSighted { file_name }
            | EngineEvent::Archived { file_name, .. }
            | EngineEvent::ArchiveFailed { file_name, .. }
            | EngineEvent::DeadLettered { file_name, .. }
            | EngineEvent::ReportApplied { file_name, .. }
            | EngineEvent::ReportDeferred { file_name, .. } => file_name,
        }
    }
}

/// Timestamped event as delivered to subscribers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    pub timestamp: DateTime<Local>,
    #[serde(flatten)]
    pub event: EngineEvent,
}

#[derive(Clone, Debug)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<EventEnvelope>,
}

impl EventBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn send(&self, event: EngineEvent) {
        // No subscribers is fine.
        let _ = self.sender.send(EventEnvelope {
            timestamp: Local::now(),
            event,
        });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_without_subscribers_is_ok() {
        let broadcaster = EventBroadcaster::default();
        broadcaster.send(EngineEvent::FileTracked {
            file_name: "job1.iso".to_string(),
        });
        assert_eq!(broadcaster.subscriber_count(), 0);
    }

    #[test]
    fn test_subscriber_receives_events_in_order() {
        let broadcaster = EventBroadcaster::new(8);
        let mut rx = broadcaster.subscribe();

        broadcaster.send(EngineEvent::FileTracked {
            file_name: "job1.iso".to_string(),
        });
        broadcaster.send(EngineEvent::StageSighted {
            file_name: "job1.iso".to_string(),
        });

        let first = rx.try_recv().unwrap();
        let second = rx.try_recv().unwrap();
        assert!(matches!(first.event, EngineEvent::FileTracked { .. }));
        assert!(matches!(second.event, EngineEvent::StageSighted { .. }));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_clones_share_the_channel() {
        let broadcaster = EventBroadcaster::new(8);
        let mut rx = broadcaster.subscribe();
        broadcaster.clone().send(EngineEvent::ReportDeferred {
            report: "#job1.iso.txt".to_string(),
            file_name: "job1.iso".to_string(),
        });
        assert_eq!(rx.try_recv().unwrap().event.file_name(), "job1.iso");
    }

    #[test]
    fn test_envelope_serialization() {
        let envelope = EventEnvelope {
            timestamp: Local::now(),
            event: EngineEvent::Archived {
                file_name: "job1.iso".to_string(),
                archive_path: "/c/job1.iso".to_string(),
                record_id: 7,
                cycle_duration: None,
            },
        };
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["kind"], "archived");
        assert_eq!(json["file_name"], "job1.iso");
        assert_eq!(json["record_id"], 7);
        assert!(json.get("cycle_duration").is_none());
        assert!(json.get("timestamp").is_some());
    }
}

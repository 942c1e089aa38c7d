use serde::Serialize;

/// Structured trace events emitted across all Threadkeeper crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    SessionKeyMigrated {
        from_key: String,
        to_key: String,
    },
    SessionCreated {
        session_key: String,
        session_id: String,
    },
    SessionReset {
        session_key: String,
        old_session_id: Option<String>,
        new_session_id: String,
    },
    SessionDeleted {
        session_key: String,
        session_id: Option<String>,
        existed: bool,
        archived: usize,
    },
    SessionAborted {
        session_key: String,
        session_id: Option<String>,
        run_aborted: bool,
        persisted: bool,
        subagents_stopped: usize,
    },
    TranscriptCompacted {
        session_key: String,
        session_id: String,
        lines_before: usize,
        lines_kept: usize,
    },
    TranscriptArchived {
        path: String,
        reason: String,
    },
    TranscriptRestored {
        path: String,
        replaced: Option<String>,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "tk_event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_event_tag() {
        let ev = TraceEvent::SessionKeyMigrated {
            from_key: "main".into(),
            to_key: "agent:main:main".into(),
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["event"], "SessionKeyMigrated");
        assert_eq!(json["to_key"], "agent:main:main");
    }
}

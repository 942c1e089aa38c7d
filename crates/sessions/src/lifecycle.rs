//! Entry lifecycle: reset carry-forward and field patches.
//!
//! Reset mints a new session id for the same key.  Only user-chosen
//! settings survive; token counters and per-run state do not.

use crate::store::{GroupActivation, SendPolicy, SessionEntry, SessionMap};
use tk_domain::error::{Error, Result};

/// Build the entry that replaces `prev` on reset.
///
/// Carried forward: levels, model, context tokens, send policy, label, last
/// channel and recipient, skills snapshot.  Input, output and total token
/// counts start empty, as does everything else including unknown on-disk
/// fields.
pub fn reset_entry(prev: Option<&SessionEntry>) -> SessionEntry {
    let mut next = SessionEntry::mint();
    let Some(prev) = prev else {
        return next;
    };

    next.thinking_level = prev.thinking_level;
    next.verbose_level = prev.verbose_level;
    next.reasoning_level = prev.reasoning_level;
    next.context_tokens = prev.context_tokens;
    next.model = prev.model.clone();
    next.send_policy = prev.send_policy;
    next.label = prev.label.clone();
    next.last_channel = prev.last_channel.clone();
    next.last_to = prev.last_to.clone();
    next.skills_snapshot = prev.skills_snapshot.clone();
    next
}

/// A partial update to an entry.  The outer `Option` says whether the field
/// was sent; an inner `None` clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionPatch {
    pub label: Option<Option<String>>,
    pub thinking_level: Option<Option<u8>>,
    pub verbose_level: Option<Option<u8>>,
    pub reasoning_level: Option<Option<u8>>,
    pub model: Option<Option<String>>,
    pub send_policy: Option<Option<SendPolicy>>,
    pub group_activation: Option<Option<GroupActivation>>,
}

impl SessionPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Apply to the entry under `key`, enforcing label uniqueness within
    /// the store.  Nothing is changed on error.
    pub fn apply(&self, sessions: &mut SessionMap, key: &str) -> Result<()> {
        if let Some(Some(label)) = &self.label {
            if let Some((other, _)) = sessions
                .iter()
                .find(|(k, e)| k.as_str() != key && e.label.as_deref() == Some(label.as_str()))
            {
                return Err(Error::InvalidRequest(format!(
                    "label \"{label}\" is already used by {other}"
                )));
            }
        }

        let entry = sessions
            .get_mut(key)
            .ok_or_else(|| Error::NotFound(format!("session {key}")))?;

        if let Some(v) = &self.label {
            entry.label = v.clone();
        }
        if let Some(v) = self.thinking_level {
            entry.thinking_level = v;
        }
        if let Some(v) = self.verbose_level {
            entry.verbose_level = v;
        }
        if let Some(v) = self.reasoning_level {
            entry.reasoning_level = v;
        }
        if let Some(v) = &self.model {
            entry.model = v.clone();
        }
        if let Some(v) = self.send_policy {
            entry.send_policy = v;
        }
        if let Some(v) = self.group_activation {
            entry.group_activation = v;
            if v.is_some() {
                entry.group_activation_needs_system_intro = true;
            }
        }
        entry.touch();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn used_entry() -> SessionEntry {
        let mut e = SessionEntry::with_id("old");
        e.system_sent = true;
        e.aborted_last_run = true;
        e.thinking_level = Some(2);
        e.verbose_level = Some(1);
        e.input_tokens = Some(10);
        e.output_tokens = Some(20);
        e.total_tokens = Some(30);
        e.context_tokens = Some(128_000);
        e.model = Some("openai/gpt-4o".into());
        e.send_policy = Some(SendPolicy::Deny);
        e.label = Some("home".into());
        e.last_channel = Some("telegram".into());
        e.last_to = Some("@me".into());
        e.skills_snapshot = Some(serde_json::json!({"skills": ["web"]}));
        e.session_file = Some("old.jsonl".into());
        e.group_activation = Some(GroupActivation::Always);
        e.extra.insert("future".into(), serde_json::json!(true));
        e
    }

    #[test]
    fn reset_carries_forward_settings_only() {
        let prev = used_entry();
        let next = reset_entry(Some(&prev));

        assert_ne!(next.session_id, prev.session_id);
        assert!(!next.system_sent);
        assert!(!next.aborted_last_run);
        assert_eq!(next.thinking_level, Some(2));
        assert_eq!(next.verbose_level, Some(1));
        assert_eq!(next.input_tokens, None);
        assert_eq!(next.output_tokens, None);
        assert_eq!(next.total_tokens, None);
        assert_eq!(next.context_tokens, Some(128_000));
        assert_eq!(next.model.as_deref(), Some("openai/gpt-4o"));
        assert_eq!(next.send_policy, Some(SendPolicy::Deny));
        assert_eq!(next.label.as_deref(), Some("home"));
        assert_eq!(next.last_channel.as_deref(), Some("telegram"));
        assert_eq!(next.last_to.as_deref(), Some("@me"));
        assert!(next.skills_snapshot.is_some());

        assert_eq!(next.session_file, None);
        assert_eq!(next.group_activation, None);
        assert!(next.extra.is_empty());
    }

    #[test]
    fn reset_without_previous_is_blank() {
        let next = reset_entry(None);
        assert!(!next.session_id.is_empty());
        assert_eq!(next.label, None);
    }

    #[test]
    fn patch_sets_and_clears() {
        let mut map = SessionMap::new();
        map.insert("k".into(), used_entry());

        let patch = SessionPatch {
            label: Some(None),
            thinking_level: Some(Some(3)),
            model: Some(Some("anthropic/claude".into())),
            ..Default::default()
        };
        patch.apply(&mut map, "k").unwrap();

        let e = &map["k"];
        assert_eq!(e.label, None);
        assert_eq!(e.thinking_level, Some(3));
        assert_eq!(e.verbose_level, Some(1));
        assert_eq!(e.model.as_deref(), Some("anthropic/claude"));
    }

    #[test]
    fn duplicate_label_is_rejected() {
        let mut map = SessionMap::new();
        map.insert("a".into(), used_entry());
        map.insert("b".into(), SessionEntry::with_id("b"));

        let patch = SessionPatch {
            label: Some(Some("home".into())),
            ..Default::default()
        };
        let err = patch.apply(&mut map, "b").unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
        assert_eq!(map["b"].label, None);

        // Re-applying a label to its own holder is fine.
        patch.apply(&mut map, "a").unwrap();
    }

    #[test]
    fn empty_patch() {
        assert!(SessionPatch::default().is_empty());
        let p = SessionPatch {
            send_policy: Some(None),
            ..Default::default()
        };
        assert!(!p.is_empty());
    }
}

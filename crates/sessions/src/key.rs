//! Session key model.
//!
//! Key templates:
//! - `agent:<agentId>:<rest>`  canonical form
//! - `<rest>`                  legacy bare key, owned by the default agent
//! - `global` / `unknown`      scope-level keys, never rewritten
//!
//! Keys are case-insensitive and canonicalized to lower case.  A session
//! may still sit under an older spelling on disk; [`migrate`] moves it onto
//! the canonical key the first time it is touched under the store lock.

use std::path::PathBuf;

use tk_domain::config::{SessionsConfig, StoreScope};
use tk_domain::error::{Error, Result};
use tk_domain::trace::TraceEvent;

use crate::store::SessionMap;

const AGENT_PREFIX: &str = "agent:";
const STORE_FILE: &str = "sessions.json";

/// Where a session lives and which keys may hold it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTarget {
    pub canonical_key: String,
    pub agent_id: String,
    pub store_path: PathBuf,
    /// Transcript directory, beside the store file.
    pub sessions_dir: PathBuf,
    /// `alias_keys[0]` is the canonical key; the rest are older spellings
    /// in lookup order.
    pub alias_keys: Vec<String>,
}

/// Maps requested keys onto canonical keys and store paths.
#[derive(Debug, Clone)]
pub struct KeyResolver {
    state_path: PathBuf,
    default_agent: String,
    main_key: String,
    scope: StoreScope,
}

impl KeyResolver {
    pub fn new(
        state_path: impl Into<PathBuf>,
        default_agent: &str,
        main_key: &str,
        scope: StoreScope,
    ) -> Self {
        Self {
            state_path: state_path.into(),
            default_agent: default_agent.trim().to_lowercase(),
            main_key: main_key.trim().to_lowercase(),
            scope,
        }
    }

    pub fn from_config(cfg: &SessionsConfig) -> Self {
        Self::new(&cfg.state_path, &cfg.default_agent, &cfg.main_key, cfg.scope)
    }

    pub fn state_path(&self) -> &std::path::Path {
        &self.state_path
    }

    pub fn default_agent(&self) -> &str {
        &self.default_agent
    }

    /// Store file for an agent.
    pub fn store_path(&self, agent_id: &str) -> PathBuf {
        self.sessions_dir(agent_id).join(STORE_FILE)
    }

    /// Directory holding the store file and the agent's transcripts.
    pub fn sessions_dir(&self, agent_id: &str) -> PathBuf {
        match self.scope {
            StoreScope::PerAgent => self
                .state_path
                .join("agents")
                .join(agent_id)
                .join("sessions"),
            StoreScope::Global => self.state_path.join("sessions"),
        }
    }

    /// The main session of the default agent.
    pub fn main_session_key(&self) -> String {
        format!("{AGENT_PREFIX}{}:{}", self.default_agent, self.main_key)
    }

    /// Whether `canonical_key` is the protected main session.
    pub fn is_main_key(&self, canonical_key: &str) -> bool {
        canonical_key == self.main_session_key()
    }

    /// Compute the canonical target for a requested key.
    pub fn resolve_target(&self, key: &str) -> Result<SessionTarget> {
        let raw = key.trim();
        if raw.is_empty() {
            return Err(Error::InvalidRequest("session key must not be empty".into()));
        }
        let lower = raw.to_lowercase();

        let (agent_id, canonical_key) = match lower.as_str() {
            "global" | "unknown" => (self.default_agent.clone(), lower.clone()),
            _ => match parse_agent_key(&lower) {
                Some((agent, _)) => {
                    check_agent_id(agent)?;
                    (agent.to_owned(), lower.clone())
                }
                None if lower.starts_with(AGENT_PREFIX) => {
                    return Err(Error::InvalidRequest(format!(
                        "malformed session key \"{raw}\": expected agent:<agentId>:<rest>"
                    )));
                }
                None => (
                    self.default_agent.clone(),
                    format!("{AGENT_PREFIX}{}:{lower}", self.default_agent),
                ),
            },
        };

        let mut alias_keys = vec![canonical_key.clone()];
        let mut push = |k: String| {
            if !alias_keys.contains(&k) {
                alias_keys.push(k);
            }
        };
        push(raw.to_owned());
        push(lower.clone());

        let is_agent_main = parse_agent_key(&canonical_key)
            .is_some_and(|(_, rest)| rest == self.main_key || rest == "main");
        if is_agent_main {
            push(format!("{AGENT_PREFIX}{agent_id}:{}", self.main_key));
            push(format!("{AGENT_PREFIX}{agent_id}:main"));
            if agent_id == self.default_agent {
                push(self.main_key.clone());
                push("main".to_owned());
            }
        }

        Ok(SessionTarget {
            store_path: self.store_path(&agent_id),
            sessions_dir: self.sessions_dir(&agent_id),
            canonical_key,
            agent_id,
            alias_keys,
        })
    }
}

/// Split `agent:<agentId>:<rest>` into its parts.  Both parts must be
/// non-empty.
pub fn parse_agent_key(key: &str) -> Option<(&str, &str)> {
    let tail = key.strip_prefix(AGENT_PREFIX)?;
    let (agent, rest) = tail.split_once(':')?;
    if agent.is_empty() || rest.is_empty() {
        return None;
    }
    Some((agent, rest))
}

/// Lower-case an agent id and check it is safe to use as a directory name.
pub fn normalize_agent_id(agent_id: &str) -> Result<String> {
    let id = agent_id.trim().to_lowercase();
    check_agent_id(&id)?;
    Ok(id)
}

fn check_agent_id(agent_id: &str) -> Result<()> {
    let ok = !agent_id.is_empty()
        && agent_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(Error::InvalidRequest(format!(
            "invalid agent id \"{agent_id}\": use letters, digits, '-' or '_'"
        )))
    }
}

/// Move a session stored under an older alias onto its canonical key.
///
/// Returns the key now holding the session, or `None` if no alias has an
/// entry.  An existing canonical entry always wins; alias entries that
/// coexist with it are left alone.  Running it twice is a no-op.
pub fn migrate(sessions: &mut SessionMap, alias_keys: &[String]) -> Option<String> {
    let canonical = alias_keys.first()?;
    if sessions.contains_key(canonical) {
        return Some(canonical.clone());
    }

    let alias = alias_keys[1..]
        .iter()
        .find(|k| sessions.contains_key(k.as_str()))?;
    let entry = sessions.remove(alias)?;
    sessions.insert(canonical.clone(), entry);

    TraceEvent::SessionKeyMigrated {
        from_key: alias.clone(),
        to_key: canonical.clone(),
    }
    .emit();

    Some(canonical.clone())
}

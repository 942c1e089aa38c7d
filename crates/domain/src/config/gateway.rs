use serde::{Deserialize, Serialize};

/// Gateway process controls.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GatewayConfig {
    /// `gateway.restart` is refused unless this is set.
    #[serde(default)]
    pub restart_enabled: bool,

    /// Out-of-process restart fallback, e.g. `["systemctl", "restart",
    /// "threadkeeper"]`.  Used only when no in-process listener is
    /// registered.
    #[serde(default)]
    pub restart_command: Option<Vec<String>>,
}

//! Topic layout and presence payloads.
//!
//! ```text
//! <base>            readings (JSON, QoS 0, not retained)
//! <base>/status     presence: "online" / "offline" (QoS 1, retained)
//! <base>/cmd        reserved for inbound commands
//! ```

/// Explicitly published after each session establishment.
pub const PRESENCE_ONLINE: &[u8] = b"online";
/// Registered as the session's last-will.
pub const PRESENCE_OFFLINE: &[u8] = b"offline";

/// All topics derived from one base topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    pub reading: String,
    pub presence: String,
    pub command: String,
}

impl Topics {
    pub fn from_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            reading: base.into(),
            presence: format!("{base}/status"),
            command: format!("{base}/cmd"),
        }
    }
}

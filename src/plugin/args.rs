//! Launch arguments supplied by the host.
//!
//! The host starts the plugin process with single-dash flag/value pairs:
//!
//! ```text
//! plugin -port 28196 -pluginUUID 5F2D... -registerEvent registerPlugin -info '{...}'
//! ```
//!
//! | Flag | Required | Meaning |
//! |------|----------|---------|
//! | `-port` | yes | Local WebSocket port |
//! | `-pluginUUID` | yes | Instance identifier for the handshake |
//! | `-registerEvent` | yes | Event name of the registration frame |
//! | `-info` | yes | JSON host environment blob |
//! | `-actionInfo` | no | JSON blob for a single action instance |

// ============================================================================
// Imports
// ============================================================================

use tracing::debug;

use crate::error::{Error, Result};
use crate::identifiers::PluginUuid;
use crate::protocol::{ActionInfo, HostInfo};

// ============================================================================
// LaunchArgs
// ============================================================================

/// Parsed launch arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchArgs {
    /// Local WebSocket port.
    pub port: u16,
    /// Instance identifier for the handshake.
    pub uuid: PluginUuid,
    /// Event name of the registration frame.
    pub register_event: String,
    /// Host environment.
    pub info: HostInfo,
    /// Optional single action instance, see [`LaunchArgs::take_action_info`].
    action_info: Option<ActionInfo>,
}

impl LaunchArgs {
    /// Parses the current process arguments.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a required flag is missing or invalid.
    pub fn from_env() -> Result<Self> {
        Self::parse_from(std::env::args().skip(1))
    }

    /// Parses flag/value pairs, program name excluded.
    ///
    /// Unknown flags are skipped together with their value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a required flag is missing, a flag has
    /// no value, the port is not a non-zero `u16`, or a JSON blob is invalid.
    pub fn parse_from<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut port = None;
        let mut uuid = None;
        let mut register_event = None;
        let mut info = None;
        let mut action_info = None;

        let mut args = args.into_iter().map(Into::into);
        while let Some(flag) = args.next() {
            let value = args
                .next()
                .ok_or_else(|| Error::config(format!("missing value for {flag}")))?;

            match flag.as_str() {
                "-port" => port = Some(parse_port(&value)?),
                "-pluginUUID" => uuid = Some(non_empty(&flag, value)?),
                "-registerEvent" => register_event = Some(non_empty(&flag, value)?),
                "-info" => info = Some(HostInfo::parse(&value)?),
                "-actionInfo" => action_info = Some(ActionInfo::parse(&value)?),
                _ => debug!(flag = %flag, "Skipping unknown launch flag"),
            }
        }

        Ok(Self {
            port: port.ok_or_else(|| missing("-port"))?,
            uuid: PluginUuid::new(uuid.ok_or_else(|| missing("-pluginUUID"))?),
            register_event: register_event.ok_or_else(|| missing("-registerEvent"))?,
            info: info.ok_or_else(|| missing("-info"))?,
            action_info,
        })
    }

    /// Returns the host endpoint, `ws://127.0.0.1:{port}`.
    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("ws://127.0.0.1:{}", self.port)
    }

    /// Hands out the action info blob. Subsequent calls return `None`.
    #[inline]
    pub fn take_action_info(&mut self) -> Option<ActionInfo> {
        self.action_info.take()
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn parse_port(value: &str) -> Result<u16> {
    match value.parse::<u16>() {
        Ok(0) | Err(_) => Err(Error::config(format!(
            "-port must be a port number between 1 and 65535, got {value:?}"
        ))),
        Ok(port) => Ok(port),
    }
}

fn non_empty(flag: &str, value: String) -> Result<String> {
    if value.trim().is_empty() {
        return Err(Error::config(format!("{flag} must not be empty")));
    }
    Ok(value)
}

fn missing(flag: &str) -> Error {
    Error::config(format!("missing required launch argument {flag}"))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const INFO: &str = r#"{"application":{"platform":"windows"},"devices":[]}"#;

    fn base() -> Vec<&'static str> {
        vec![
            "-port",
            "28196",
            "-pluginUUID",
            "UUID-1",
            "-registerEvent",
            "registerPlugin",
            "-info",
            INFO,
        ]
    }

    #[test]
    fn test_parse_required() {
        let args = LaunchArgs::parse_from(base()).expect("parse");
        assert_eq!(args.port, 28196);
        assert_eq!(args.uuid.as_str(), "UUID-1");
        assert_eq!(args.register_event, "registerPlugin");
        assert_eq!(args.info.application.platform.as_deref(), Some("windows"));
        assert_eq!(args.endpoint(), "ws://127.0.0.1:28196");
    }

    #[test]
    fn test_action_info_taken_once() {
        let mut raw = base();
        raw.extend([
            "-actionInfo",
            r#"{"action":"com.foo.action1","context":"ctx","payload":{}}"#,
        ]);

        let mut args = LaunchArgs::parse_from(raw).expect("parse");
        let info = args.take_action_info().expect("action info");
        assert_eq!(info.context.as_str(), "ctx");
        assert!(args.take_action_info().is_none());
    }

    #[test]
    fn test_unknown_flags_are_skipped() {
        let mut raw = base();
        raw.extend(["-debug", "1"]);
        assert!(LaunchArgs::parse_from(raw).is_ok());
    }

    #[test]
    fn test_missing_required_flag() {
        let raw: Vec<_> = base().into_iter().take(6).collect();
        let err = LaunchArgs::parse_from(raw).unwrap_err();
        assert!(err.to_string().contains("-info"));
    }

    #[test]
    fn test_missing_value() {
        let mut raw = base();
        raw.push("-actionInfo");
        let err = LaunchArgs::parse_from(raw).unwrap_err();
        assert!(err.to_string().contains("missing value for -actionInfo"));
    }

    #[test]
    fn test_invalid_port() {
        for bad in ["0", "70000", "abc"] {
            let mut raw = base();
            raw[1] = bad;
            let err = LaunchArgs::parse_from(raw).unwrap_err();
            assert!(matches!(err, Error::Config { .. }), "port {bad}");
        }
    }

    #[test]
    fn test_empty_uuid() {
        let mut raw = base();
        raw[3] = "  ";
        assert!(LaunchArgs::parse_from(raw).is_err());
    }

    #[test]
    fn test_invalid_info_blob() {
        let mut raw = base();
        raw[7] = "{broken";
        let err = LaunchArgs::parse_from(raw).unwrap_err();
        assert!(err.to_string().contains("-info"));
    }
}

//! Operator command grammar.
//!
//! Commands arrive as single text lines from the filesystem queue. Any
//! parse failure surfaces as the `unknown_cmd` result; no state changes.

use pathsteer_common::models::Mode;
use pathsteer_common::uplink::UplinkId;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CommandParseError {
    #[error("unknown command: {0}")]
    Unknown(String),
    #[error("unknown uplink: {0}")]
    UnknownUplink(String),
    #[error("unknown mode: {0}")]
    UnknownMode(String),
    #[error("bad controller index: {0}")]
    BadController(String),
}

/// One operator command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Set the operating mode.
    SetMode(Mode),
    /// Pin traffic to an uplink and lock out arbitration.
    Force(UplinkId),
    /// Clear the pin and re-arbitrate immediately.
    ForceAuto,
    /// Manual tripwire entry.
    Trigger,
    /// Switch the remote controller (0 or 1).
    ControllerSwitch(u8),
    Enable(UplinkId),
    Disable(UplinkId),
    /// Mark an uplink failed (sticky) for drills.
    Fail(UplinkId),
    Unfail(UplinkId),
}

impl std::str::FromStr for Command {
    type Err = CommandParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        if let Some(mode) = s.strip_prefix("mode:") {
            return mode
                .parse::<Mode>()
                .map(Command::SetMode)
                .map_err(|_| CommandParseError::UnknownMode(mode.to_string()));
        }
        if let Some(target) = s.strip_prefix("force:") {
            if target == "auto" {
                return Ok(Command::ForceAuto);
            }
            return uplink(target).map(Command::Force);
        }
        if s == "trigger" {
            return Ok(Command::Trigger);
        }
        if let Some(idx) = s.strip_prefix("c8000:") {
            return match idx {
                "0" => Ok(Command::ControllerSwitch(0)),
                "1" => Ok(Command::ControllerSwitch(1)),
                other => Err(CommandParseError::BadController(other.to_string())),
            };
        }
        if let Some(name) = s.strip_prefix("enable:") {
            return uplink(name).map(Command::Enable);
        }
        if let Some(name) = s.strip_prefix("disable:") {
            return uplink(name).map(Command::Disable);
        }
        if let Some(name) = s.strip_prefix("fail:") {
            return uplink(name).map(Command::Fail);
        }
        if let Some(name) = s.strip_prefix("unfail:") {
            return uplink(name).map(Command::Unfail);
        }

        Err(CommandParseError::Unknown(s.to_string()))
    }
}

fn uplink(name: &str) -> Result<UplinkId, CommandParseError> {
    UplinkId::from_name(name).ok_or_else(|| CommandParseError::UnknownUplink(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Result<Command, CommandParseError> {
        s.parse()
    }

    #[test]
    fn parses_the_full_grammar() {
        assert_eq!(parse("mode:training"), Ok(Command::SetMode(Mode::Training)));
        assert_eq!(parse("mode:mirror"), Ok(Command::SetMode(Mode::Mirror)));
        assert_eq!(parse("force:sl_b"), Ok(Command::Force(UplinkId::SlB)));
        assert_eq!(parse("force:auto"), Ok(Command::ForceAuto));
        assert_eq!(parse("trigger"), Ok(Command::Trigger));
        assert_eq!(parse("c8000:1"), Ok(Command::ControllerSwitch(1)));
        assert_eq!(parse("enable:fa"), Ok(Command::Enable(UplinkId::FiberA)));
        assert_eq!(parse("disable:fb"), Ok(Command::Disable(UplinkId::FiberB)));
        assert_eq!(parse("fail:cell_b"), Ok(Command::Fail(UplinkId::CellB)));
        assert_eq!(parse("unfail:cell_b"), Ok(Command::Unfail(UplinkId::CellB)));
    }

    #[test]
    fn trailing_whitespace_is_tolerated() {
        assert_eq!(parse("trigger\n"), Ok(Command::Trigger));
        assert_eq!(parse("  force:fa  "), Ok(Command::Force(UplinkId::FiberA)));
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(matches!(
            parse("reboot"),
            Err(CommandParseError::Unknown(_))
        ));
        assert!(matches!(
            parse("mode:maximum"),
            Err(CommandParseError::UnknownMode(_))
        ));
        assert!(matches!(
            parse("force:sl_c"),
            Err(CommandParseError::UnknownUplink(_))
        ));
        assert!(matches!(
            parse("c8000:2"),
            Err(CommandParseError::BadController(_))
        ));
        assert!(matches!(parse(""), Err(CommandParseError::Unknown(_))));
    }
}

// ── Device state classification ──
//
// The remote state vocabulary has drifted across service revisions, so
// classification is total: any string the matcher does not recognize is
// `Unknown`, never an error. Driver values are the host's barrier-status
// index scheme (0=Closed .. 4=Opening, 9=Unknown) and on/off percentages
// for lamps.

use serde::{Deserialize, Serialize};

/// Classified garage-door state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum DoorState {
    Closed,
    Open,
    Stopped,
    Closing,
    Opening,
    Unknown,
}

impl DoorState {
    /// Classify a raw remote door-state string. Total; unrecognized
    /// values are [`Unknown`](Self::Unknown).
    pub fn classify(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "closed" => Self::Closed,
            "open" => Self::Open,
            "stopped" => Self::Stopped,
            "closing" => Self::Closing,
            "opening" => Self::Opening,
            _ => Self::Unknown,
        }
    }

    /// The host driver index for this state.
    pub fn driver_value(self) -> i64 {
        match self {
            Self::Closed => 0,
            Self::Open => 1,
            Self::Stopped => 2,
            Self::Closing => 3,
            Self::Opening => 4,
            Self::Unknown => 9,
        }
    }

    /// A door in motion (or in an indeterminate state) warrants fast
    /// polling until it settles.
    pub fn is_in_motion(self) -> bool {
        matches!(self, Self::Closing | Self::Opening | Self::Unknown)
    }
}

/// Classified lamp state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum LampState {
    On,
    Off,
    Unknown,
}

impl LampState {
    /// Classify a raw remote lamp-state string. Total; unrecognized
    /// values are [`Unknown`](Self::Unknown).
    pub fn classify(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "on" => Self::On,
            "off" => Self::Off,
            _ => Self::Unknown,
        }
    }

    /// The host driver value for this state (on/off percentage).
    pub fn driver_value(self) -> i64 {
        match self {
            Self::On => 100,
            Self::Off => 0,
            Self::Unknown => -1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn door_classification_is_total() {
        assert_eq!(DoorState::classify("open"), DoorState::Open);
        assert_eq!(DoorState::classify("closed"), DoorState::Closed);
        assert_eq!(DoorState::classify("stopped"), DoorState::Stopped);
        assert_eq!(DoorState::classify("closing"), DoorState::Closing);
        assert_eq!(DoorState::classify("opening"), DoorState::Opening);
        assert_eq!(DoorState::classify("ajar"), DoorState::Unknown);
        assert_eq!(DoorState::classify(""), DoorState::Unknown);
        assert_eq!(DoorState::classify("7"), DoorState::Unknown);
    }

    #[test]
    fn door_classification_ignores_case_and_whitespace() {
        assert_eq!(DoorState::classify(" Open "), DoorState::Open);
        assert_eq!(DoorState::classify("CLOSING"), DoorState::Closing);
    }

    #[test]
    fn lamp_classification_is_total() {
        assert_eq!(LampState::classify("on"), LampState::On);
        assert_eq!(LampState::classify("off"), LampState::Off);
        assert_eq!(LampState::classify("dim"), LampState::Unknown);
        assert_eq!(LampState::classify(""), LampState::Unknown);
    }

    #[test]
    fn motion_states_trigger_fast_polling() {
        assert!(DoorState::Opening.is_in_motion());
        assert!(DoorState::Closing.is_in_motion());
        assert!(DoorState::Unknown.is_in_motion());
        assert!(!DoorState::Open.is_in_motion());
        assert!(!DoorState::Closed.is_in_motion());
        assert!(!DoorState::Stopped.is_in_motion());
    }

    #[test]
    fn driver_values_match_the_host_index_scheme() {
        assert_eq!(DoorState::Closed.driver_value(), 0);
        assert_eq!(DoorState::Opening.driver_value(), 4);
        assert_eq!(DoorState::Unknown.driver_value(), 9);
        assert_eq!(LampState::On.driver_value(), 100);
        assert_eq!(LampState::Off.driver_value(), 0);
        assert_eq!(LampState::Unknown.driver_value(), -1);
    }
}

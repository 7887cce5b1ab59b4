//! Logical gamepad controls and the kernel codes they drive

use crate::uinput::codes::{
    ABS_HAT0X, ABS_HAT0Y, BTN_DPAD_DOWN, BTN_DPAD_LEFT, BTN_DPAD_RIGHT, BTN_DPAD_UP, BTN_EAST,
    BTN_MODE, BTN_NORTH, BTN_SELECT, BTN_SOUTH, BTN_START, BTN_THUMBL, BTN_THUMBR, BTN_TL,
    BTN_TL2, BTN_TR, BTN_TR2, BTN_WEST, EV_ABS, EV_KEY, HAT_MAX, HAT_MIN,
};
use crate::uinput::event::HidEvent;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ControlError {
    #[error("Unknown control id: {0}")]
    UnknownId(u16),

    #[error("Unknown control name: {0}")]
    UnknownName(String),
}

/// Every control the virtual gamepad exposes. Discriminants are the stable numeric ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u16)]
pub enum GamepadControl {
    A = 0,
    B = 1,
    X = 2,
    Y = 3,
    LeftBumper = 4,
    RightBumper = 5,
    LeftTrigger = 6,
    RightTrigger = 7,
    Select = 8,
    Start = 9,
    Guide = 10,
    LeftStick = 11,
    RightStick = 12,
    #[serde(rename = "dpad_up")]
    DPadUp = 13,
    #[serde(rename = "dpad_down")]
    DPadDown = 14,
    #[serde(rename = "dpad_left")]
    DPadLeft = 15,
    #[serde(rename = "dpad_right")]
    DPadRight = 16,
    HatUp = 17,
    HatDown = 18,
    HatLeft = 19,
    HatRight = 20,
}

/// What a control writes when it changes state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlTarget {
    /// Button code, 1 = down, 0 = up
    Key(u16),
    /// Hat axis deflected to `direction` while down, centered on release
    Hat { axis: u16, direction: i32 },
}

/// How a control is actuated
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlMode {
    /// Down, short pause, up
    #[default]
    Press,
    /// Down only
    Hold,
    /// Up only
    Release,
}

impl GamepadControl {
    pub const ALL: [GamepadControl; 21] = [
        Self::A,
        Self::B,
        Self::X,
        Self::Y,
        Self::LeftBumper,
        Self::RightBumper,
        Self::LeftTrigger,
        Self::RightTrigger,
        Self::Select,
        Self::Start,
        Self::Guide,
        Self::LeftStick,
        Self::RightStick,
        Self::DPadUp,
        Self::DPadDown,
        Self::DPadLeft,
        Self::DPadRight,
        Self::HatUp,
        Self::HatDown,
        Self::HatLeft,
        Self::HatRight,
    ];

    pub fn id(self) -> u16 {
        self as u16
    }

    pub fn from_id(id: u16) -> Result<Self, ControlError> {
        Self::ALL
            .get(usize::from(id))
            .copied()
            .ok_or(ControlError::UnknownId(id))
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::A => "a",
            Self::B => "b",
            Self::X => "x",
            Self::Y => "y",
            Self::LeftBumper => "left_bumper",
            Self::RightBumper => "right_bumper",
            Self::LeftTrigger => "left_trigger",
            Self::RightTrigger => "right_trigger",
            Self::Select => "select",
            Self::Start => "start",
            Self::Guide => "guide",
            Self::LeftStick => "left_stick",
            Self::RightStick => "right_stick",
            Self::DPadUp => "dpad_up",
            Self::DPadDown => "dpad_down",
            Self::DPadLeft => "dpad_left",
            Self::DPadRight => "dpad_right",
            Self::HatUp => "hat_up",
            Self::HatDown => "hat_down",
            Self::HatLeft => "hat_left",
            Self::HatRight => "hat_right",
        }
    }

    // Face buttons use the header aliases: BTN_X == BTN_NORTH, BTN_Y == BTN_WEST
    pub fn target(self) -> ControlTarget {
        use ControlTarget::{Hat, Key};
        match self {
            Self::A => Key(BTN_SOUTH),
            Self::B => Key(BTN_EAST),
            Self::X => Key(BTN_NORTH),
            Self::Y => Key(BTN_WEST),
            Self::LeftBumper => Key(BTN_TL),
            Self::RightBumper => Key(BTN_TR),
            Self::LeftTrigger => Key(BTN_TL2),
            Self::RightTrigger => Key(BTN_TR2),
            Self::Select => Key(BTN_SELECT),
            Self::Start => Key(BTN_START),
            Self::Guide => Key(BTN_MODE),
            Self::LeftStick => Key(BTN_THUMBL),
            Self::RightStick => Key(BTN_THUMBR),
            Self::DPadUp => Key(BTN_DPAD_UP),
            Self::DPadDown => Key(BTN_DPAD_DOWN),
            Self::DPadLeft => Key(BTN_DPAD_LEFT),
            Self::DPadRight => Key(BTN_DPAD_RIGHT),
            Self::HatUp => Hat {
                axis: ABS_HAT0Y,
                direction: HAT_MIN,
            },
            Self::HatDown => Hat {
                axis: ABS_HAT0Y,
                direction: HAT_MAX,
            },
            Self::HatLeft => Hat {
                axis: ABS_HAT0X,
                direction: HAT_MIN,
            },
            Self::HatRight => Hat {
                axis: ABS_HAT0X,
                direction: HAT_MAX,
            },
        }
    }

    /// Value-change record for the control going down or up
    pub fn event(self, down: bool) -> HidEvent {
        match self.target() {
            ControlTarget::Key(code) => HidEvent::new(EV_KEY, code, i32::from(down)),
            ControlTarget::Hat { axis, direction } => {
                HidEvent::new(EV_ABS, axis, if down { direction } else { 0 })
            }
        }
    }
}

impl fmt::Display for GamepadControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for GamepadControl {
    type Err = ControlError;

    /// Case-insensitive; `-` and spaces count as `_`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.name() == normalized)
            .ok_or_else(|| ControlError::UnknownName(s.to_string()))
    }
}

impl TryFrom<u16> for GamepadControl {
    type Error = ControlError;

    fn try_from(id: u16) -> Result<Self, Self::Error> {
        Self::from_id(id)
    }
}

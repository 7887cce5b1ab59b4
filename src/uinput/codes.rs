//! Linux input event types and codes used by the virtual devices
//!
//! Values match `linux/input-event-codes.h` and `linux/uinput.h`.

pub const UINPUT_PATH: &str = "/dev/uinput";

// Event types
pub const EV_SYN: u16 = 0x00;
pub const EV_KEY: u16 = 0x01;
pub const EV_REL: u16 = 0x02;
pub const EV_ABS: u16 = 0x03;
pub const EV_FF: u16 = 0x15;
pub const EV_UINPUT: u16 = 0x0101;

pub const SYN_REPORT: u16 = 0x00;

// Codes carried by EV_UINPUT requests
pub const UI_FF_UPLOAD: u16 = 1;
pub const UI_FF_ERASE: u16 = 2;

// Force feedback effect types
pub const FF_RUMBLE: u16 = 0x50;

// Gamepad buttons
pub const BTN_SOUTH: u16 = 0x130;
pub const BTN_EAST: u16 = 0x131;
pub const BTN_NORTH: u16 = 0x133;
pub const BTN_WEST: u16 = 0x134;
pub const BTN_TL: u16 = 0x136;
pub const BTN_TR: u16 = 0x137;
pub const BTN_TL2: u16 = 0x138;
pub const BTN_TR2: u16 = 0x139;
pub const BTN_SELECT: u16 = 0x13a;
pub const BTN_START: u16 = 0x13b;
pub const BTN_MODE: u16 = 0x13c;
pub const BTN_THUMBL: u16 = 0x13d;
pub const BTN_THUMBR: u16 = 0x13e;
pub const BTN_DPAD_UP: u16 = 0x220;
pub const BTN_DPAD_DOWN: u16 = 0x221;
pub const BTN_DPAD_LEFT: u16 = 0x222;
pub const BTN_DPAD_RIGHT: u16 = 0x223;

// Mouse buttons
pub const BTN_LEFT: u16 = 0x110;
pub const BTN_RIGHT: u16 = 0x111;
pub const BTN_MIDDLE: u16 = 0x112;

// Absolute axes
pub const ABS_X: u16 = 0x00;
pub const ABS_Y: u16 = 0x01;
pub const ABS_Z: u16 = 0x02;
pub const ABS_RX: u16 = 0x03;
pub const ABS_RY: u16 = 0x04;
pub const ABS_RZ: u16 = 0x05;
pub const ABS_HAT0X: u16 = 0x10;
pub const ABS_HAT0Y: u16 = 0x11;
pub const ABS_CNT: usize = 0x40;

// Relative axes
pub const REL_X: u16 = 0x00;
pub const REL_Y: u16 = 0x01;

// Bus types
pub const BUS_VIRTUAL: u16 = 0x06;

/// Buttons every virtual gamepad advertises
pub const GAMEPAD_BUTTONS: [u16; 17] = [
    BTN_SOUTH,
    BTN_EAST,
    BTN_NORTH,
    BTN_WEST,
    BTN_TL,
    BTN_TR,
    BTN_TL2,
    BTN_TR2,
    BTN_SELECT,
    BTN_START,
    BTN_MODE,
    BTN_THUMBL,
    BTN_THUMBR,
    BTN_DPAD_UP,
    BTN_DPAD_DOWN,
    BTN_DPAD_LEFT,
    BTN_DPAD_RIGHT,
];

/// Buttons the virtual mouse advertises
pub const MOUSE_BUTTONS: [u16; 3] = [BTN_LEFT, BTN_RIGHT, BTN_MIDDLE];

// Axis ranges
pub const STICK_MIN: i32 = -32768;
pub const STICK_MAX: i32 = 32767;
pub const HAT_MIN: i32 = -1;
pub const HAT_MAX: i32 = 1;
pub const TRIGGER_MIN: i32 = 0;
pub const TRIGGER_MAX: i32 = 1023;

/// Absolute axes of the gamepad with their `(min, max)` ranges: two sticks, one hat, two triggers
pub const GAMEPAD_AXES: [(u16, i32, i32); 8] = [
    (ABS_X, STICK_MIN, STICK_MAX),
    (ABS_Y, STICK_MIN, STICK_MAX),
    (ABS_RX, STICK_MIN, STICK_MAX),
    (ABS_RY, STICK_MIN, STICK_MAX),
    (ABS_HAT0X, HAT_MIN, HAT_MAX),
    (ABS_HAT0Y, HAT_MIN, HAT_MAX),
    (ABS_Z, TRIGGER_MIN, TRIGGER_MAX),
    (ABS_RZ, TRIGGER_MIN, TRIGGER_MAX),
];

/// Relative axes of the mouse
pub const MOUSE_AXES: [u16; 2] = [REL_X, REL_Y];

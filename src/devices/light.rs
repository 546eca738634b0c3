use serde::{Deserialize, Serialize};
use std::fmt;

/// The colour a light device shows when it is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LightColor {
    Green,
    Yellow,
    Red,
}

impl LightColor {
    pub fn name(&self) -> &'static str {
        match self {
            LightColor::Green => "GREEN",
            LightColor::Yellow => "YELLOW",
            LightColor::Red => "RED",
        }
    }

    /// RGB value of the lamp.
    pub fn hex_value(&self) -> u32 {
        match self {
            LightColor::Green => 0x008000,
            LightColor::Yellow => 0xFFFF00,
            LightColor::Red => 0xFF0000,
        }
    }
}

impl fmt::Display for LightColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The observable result of switching a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightEvent {
    pub color: LightColor,
    pub on: bool,
}

impl fmt::Display for LightEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.on {
            write!(f, "Turned On {}", self.color)
        } else {
            write!(f, "Turned Off {}", self.color)
        }
    }
}

/// An on/off lamp with a fixed colour. It has no timing of its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LightDevice {
    color: LightColor,
    is_on: bool,
}

impl LightDevice {
    pub fn new(color: LightColor) -> Self {
        Self { color, is_on: false }
    }

    pub fn color(&self) -> LightColor {
        self.color
    }

    pub fn is_on(&self) -> bool {
        self.is_on
    }

    pub fn turn_on(&mut self) -> LightEvent {
        self.is_on = true;
        LightEvent {
            color: self.color,
            on: true,
        }
    }

    pub fn turn_off(&mut self) -> LightEvent {
        self.is_on = false;
        LightEvent {
            color: self.color,
            on: false,
        }
    }

    pub fn toggle(&mut self) -> LightEvent {
        if self.is_on {
            self.turn_off()
        } else {
            self.turn_on()
        }
    }

    pub fn set(&mut self, on: bool) -> LightEvent {
        if on {
            self.turn_on()
        } else {
            self.turn_off()
        }
    }
}

// SNES joypad ports: serial shift registers and the auto-read latches.

use std::str::FromStr;

// Bit positions follow the serial order: B is shifted out first.
pub mod button {
    pub const B: u16 = 0x8000;
    pub const Y: u16 = 0x4000;
    pub const SELECT: u16 = 0x2000;
    pub const START: u16 = 0x1000;
    pub const UP: u16 = 0x0800;
    pub const DOWN: u16 = 0x0400;
    pub const LEFT: u16 = 0x0200;
    pub const RIGHT: u16 = 0x0100;
    pub const A: u16 = 0x0080;
    pub const X: u16 = 0x0040;
    pub const L: u16 = 0x0020;
    pub const R: u16 = 0x0010;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Button(pub u16);

impl FromStr for Button {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bit = match s.to_ascii_uppercase().as_str() {
            "A" => button::A,
            "B" => button::B,
            "X" => button::X,
            "Y" => button::Y,
            "L" => button::L,
            "R" => button::R,
            "UP" => button::UP,
            "DOWN" => button::DOWN,
            "LEFT" => button::LEFT,
            "RIGHT" => button::RIGHT,
            "START" => button::START,
            "SELECT" => button::SELECT,
            other => return Err(format!("unknown button {other:?}")),
        };
        Ok(Button(bit))
    }
}

#[derive(Debug, Clone, Default)]
pub struct SnesController {
    // 押下中のボタン (1 = pressed)
    buttons: u16,
    shift_register: u16,
    strobe: bool,
}

impl SnesController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_button(&mut self, button: u16, pressed: bool) {
        if pressed {
            self.buttons |= button;
        } else {
            self.buttons &= !button;
        }
    }

    pub fn buttons(&self) -> u16 {
        self.buttons
    }

    // ストローブ書き込み（$4016 bit 0）
    pub fn write_strobe(&mut self, value: u8) {
        self.strobe = value & 0x01 != 0;
        if self.strobe {
            self.shift_register = self.buttons;
        }
    }

    // $4016/$4017 bit 0, MSB first
    pub fn read_data(&mut self) -> u8 {
        if self.strobe {
            return ((self.buttons & button::B) != 0) as u8;
        }
        let bit = ((self.shift_register & 0x8000) != 0) as u8;
        // 読み切った後は 1 を返す
        self.shift_register = (self.shift_register << 1) | 1;
        bit
    }

    /// Latch and shift out all 16 bits, as the auto-read circuit does.
    pub fn auto_read(&mut self) -> u16 {
        self.shift_register = 0xFFFF;
        self.buttons
    }
}

/// Two controller ports and JOY1-JOY4 ($4218-$421F).
#[derive(Debug, Clone, Default)]
pub struct Joypads {
    pub ports: [SnesController; 2],
    latched: [u16; 4],
}

impl Joypads {
    pub fn reset(&mut self) {
        self.latched = [0; 4];
    }

    pub fn write_strobe(&mut self, value: u8) {
        for port in &mut self.ports {
            port.write_strobe(value);
        }
    }

    /// Port reads carry fixed high bits: $4016 bits 2-7 clear except the
    /// open-bus bits, $4017 bits 2-4 set.
    pub fn read_serial(&mut self, port: usize, open_bus: u8) -> u8 {
        let bit = self.ports[port].read_data();
        match port {
            0 => (open_bus & 0xFC) | bit,
            _ => (open_bus & 0xE0) | 0x1C | bit,
        }
    }

    pub fn auto_read(&mut self) {
        self.latched[0] = self.ports[0].auto_read();
        self.latched[1] = self.ports[1].auto_read();
        self.latched[2] = 0;
        self.latched[3] = 0;
    }

    /// `reg` is $4218-$421F minus $4218.
    pub fn read_latched(&self, reg: usize) -> u8 {
        let word = self.latched[(reg >> 1) & 3];
        if reg & 1 == 0 {
            word as u8
        } else {
            (word >> 8) as u8
        }
    }
}

pub const WRAM_SIZE: usize = 128 * 1024;

/// 128 KiB work RAM plus the B-bus port at $2180-$2183.
pub struct Wram {
    data: Vec<u8>,
    /// WMADD, 17 bits.
    port_addr: u32,
}

impl Default for Wram {
    fn default() -> Self {
        Self::new()
    }
}

impl Wram {
    pub fn new() -> Self {
        Self {
            data: vec![0; WRAM_SIZE],
            port_addr: 0,
        }
    }

    pub fn reset(&mut self) {
        self.port_addr = 0;
    }

    pub fn read(&self, offset: u32) -> u8 {
        self.data[offset as usize & (WRAM_SIZE - 1)]
    }

    pub fn write(&mut self, offset: u32, value: u8) {
        self.data[offset as usize & (WRAM_SIZE - 1)] = value;
    }

    /// `reg` is the low two bits of $2180-$2183. Only WMDATA is readable.
    pub fn read_port(&mut self, reg: u32, open_bus: u8) -> u8 {
        if reg & 3 != 0 {
            return open_bus;
        }
        let value = self.read(self.port_addr);
        self.port_addr = (self.port_addr + 1) & 0x1_FFFF;
        value
    }

    pub fn write_port(&mut self, reg: u32, value: u8) {
        match reg & 3 {
            0 => {
                self.write(self.port_addr, value);
                self.port_addr = (self.port_addr + 1) & 0x1_FFFF;
            }
            1 => self.port_addr = (self.port_addr & 0x1_FF00) | value as u32,
            2 => self.port_addr = (self.port_addr & 0x1_00FF) | ((value as u32) << 8),
            _ => self.port_addr = (self.port_addr & 0x0_FFFF) | (((value & 1) as u32) << 16),
        }
    }

    pub fn port_addr(&self) -> u32 {
        self.port_addr
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Swaps in caller-provided backing storage; current contents are copied
    /// into it first.
    pub fn replace_storage(&mut self, mut buf: Vec<u8>) -> Vec<u8> {
        buf.copy_from_slice(&self.data);
        std::mem::replace(&mut self.data, buf)
    }
}

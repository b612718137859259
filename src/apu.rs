//! Audio CPU side of the four handshake ports at $2140-$2143.
//!
//! Sound synthesis lives outside this crate. Anything that can answer the
//! four ports plugs in through [`AudioPorts`]; [`IplShim`] is the default and
//! only speaks the boot ROM upload protocol, which is enough for software that
//! waits on the audio CPU before starting.

pub trait AudioPorts {
    /// `port` is 0-3.
    fn read_port(&mut self, port: usize) -> u8;
    fn write_port(&mut self, port: usize, value: u8);
    /// Master cycles elapsed since the last call.
    fn catch_up(&mut self, _master_cycles: u64) {}
    fn reset(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IplState {
    WaitingCc,
    Uploading,
    Running,
}

/// Echo-style stand-in for the audio CPU boot ROM.
#[derive(Debug, Clone)]
pub struct IplShim {
    pub state: IplState,
    cpu_to_apu: [u8; 4],
    apu_to_cpu: [u8; 4],
    pub total_bytes: u32,
    next_index: u8,
}

impl Default for IplShim {
    fn default() -> Self {
        let mut shim = Self {
            state: IplState::WaitingCc,
            cpu_to_apu: [0; 4],
            apu_to_cpu: [0; 4],
            total_bytes: 0,
            next_index: 0,
        };
        shim.reset();
        shim
    }
}

impl AudioPorts for IplShim {
    fn read_port(&mut self, port: usize) -> u8 {
        self.apu_to_cpu[port & 3]
    }

    fn write_port(&mut self, port: usize, value: u8) {
        let port = port & 3;
        self.cpu_to_apu[port] = value;
        match self.state {
            IplState::WaitingCc => {
                if port == 0 && value == 0xCC {
                    self.state = IplState::Uploading;
                    self.next_index = 0;
                    self.apu_to_cpu[0] = 0xCC;
                }
            }
            IplState::Uploading => {
                if port != 0 {
                    return;
                }
                if value == self.next_index {
                    self.total_bytes += 1;
                    self.next_index = value.wrapping_add(1);
                } else {
                    // new block header; port 1 == 0 means jump to the uploaded code
                    if self.cpu_to_apu[1] == 0 {
                        log::debug!("IPL upload done: {} bytes", self.total_bytes);
                        self.state = IplState::Running;
                    }
                    self.next_index = 0;
                }
                self.apu_to_cpu[0] = value;
            }
            IplState::Running => self.apu_to_cpu[port] = value,
        }
    }

    fn reset(&mut self) {
        self.state = IplState::WaitingCc;
        self.cpu_to_apu = [0; 4];
        self.apu_to_cpu = [0xAA, 0xBB, 0x00, 0x00];
        self.total_bytes = 0;
        self.next_index = 0;
    }
}

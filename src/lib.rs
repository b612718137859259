//! Cycle-timed core of a Super NES: master clock scheduler, 65C816 bus-cycle
//! stepping, DMA/HDMA, video timing and the frame loop that ties them
//! together.

pub mod apu;
pub mod bus;
pub mod cartridge;
pub mod config;
pub mod cpu;
pub mod cpu_bus;
pub mod cpu_io;
pub mod debug_flags;
pub mod debugger;
pub mod dma;
pub mod emulator;
pub mod error;
pub mod input;
pub mod ppu;
pub mod scheduler;
pub mod wram;

pub use cartridge::Cartridge;
pub use config::CoreConfig;
pub use emulator::Emulator;
pub use error::{CoreError, CrashReport, Fault, LoadError, Result};
pub use ppu::renderer::{FrameCapture, ScanlineRenderer};

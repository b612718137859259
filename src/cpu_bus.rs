//! Trait representing the bus interface the 65C816 core steps against.

pub trait CpuBus {
    /// One bus read; the implementor charges the access time for `addr`.
    fn read_u8(&mut self, addr: u32) -> u8;
    fn write_u8(&mut self, addr: u32, value: u8);
    /// One internal operation cycle.
    fn idle(&mut self);
    /// Latched NMI edge, gated by NMITIMEN bit 7.
    fn poll_nmi(&mut self) -> bool {
        false
    }
    fn acknowledge_nmi(&mut self) {}
    /// Level of the IRQ line; the I flag is applied by the CPU.
    fn poll_irq(&mut self) -> bool;
    /// WAI/STP: nothing happens until the next scheduled event.
    fn idle_to_horizon(&mut self) {}
}

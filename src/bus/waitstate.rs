/// Master cycles per CPU bus access.
pub const FAST: u64 = 6;
pub const MEDIUM: u64 = 8;
pub const SLOW: u64 = 12;

/// Access cost for a 24-bit address. `fast_rom` is MEMSEL bit 0 and only
/// affects banks $80-$FF above $8000 and $C0-$FF.
pub fn access_cycles(addr: u32, fast_rom: bool) -> u64 {
    let addr = addr & 0xFF_FFFF;
    if addr & 0x40_8000 != 0 {
        if addr & 0x80_0000 != 0 && fast_rom {
            return FAST;
        }
        return MEDIUM;
    }
    // $0000-$1FFF and $6000-$7FFF
    if addr.wrapping_add(0x6000) & 0x4000 != 0 {
        return MEDIUM;
    }
    // everything but $4000-$41FF
    if addr.wrapping_sub(0x4000) & 0x7E00 != 0 {
        return FAST;
    }
    SLOW
}

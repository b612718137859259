//! 24-bit address decode table.
//!
//! Blocks are described with the textual form used by cartridge docs,
//! `"00-3F,80-BF:2180-2183,4016-4017"`: bank ranges, a colon, offset ranges.
//! Every address resolves to an owning [`Region`] and a target offset
//! (`addr & mask`). Later blocks override earlier ones.

use crate::error::LoadError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    OpenBus,
    Wram,
    Ppu,
    Apu,
    WramPort,
    CpuIo,
    Dma,
    Rom,
    Sram,
    Coprocessor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Block {
    region: Region,
    mask: u32,
    base: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    pub region: Region,
    pub offset: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Range {
    lo: u32,
    hi: u32,
}

fn parse_range(text: &str, max: u32, whole: &str) -> Result<Range, LoadError> {
    let bad = || LoadError::BadBlock(whole.to_string());
    let (lo, hi) = text.split_once('-').unwrap_or((text, text));
    let lo = u32::from_str_radix(lo.trim(), 16).map_err(|_| bad())?;
    let hi = u32::from_str_radix(hi.trim(), 16).map_err(|_| bad())?;
    if lo > hi || hi > max {
        return Err(bad());
    }
    Ok(Range { lo, hi })
}

fn parse_block(spec: &str) -> Result<(Vec<Range>, Vec<Range>), LoadError> {
    let (banks, offsets) = spec
        .split_once(':')
        .ok_or_else(|| LoadError::BadBlock(spec.to_string()))?;
    let banks = banks
        .split(',')
        .map(|r| parse_range(r, 0xFF, spec))
        .collect::<Result<Vec<_>, _>>()?;
    let offsets = offsets
        .split(',')
        .map(|r| parse_range(r, 0xFFFF, spec))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((banks, offsets))
}

pub struct MemoryMap {
    lookup: Vec<u8>,
    blocks: Vec<Block>,
}

impl Default for MemoryMap {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryMap {
    pub fn new() -> Self {
        Self {
            lookup: vec![0; 1 << 24],
            blocks: vec![Block {
                region: Region::OpenBus,
                mask: 0xFF_FFFF,
                base: 0,
            }],
        }
    }

    /// Forgets every mapping; all addresses become open bus.
    pub fn clear(&mut self) {
        self.lookup.fill(0);
        self.blocks.truncate(1);
    }

    pub fn map(&mut self, spec: &str, region: Region, mask: u32) -> Result<(), LoadError> {
        self.map_at(spec, region, mask, 0)
    }

    /// Like [`MemoryMap::map`], with `base` OR-ed into the masked offset.
    pub fn map_at(
        &mut self,
        spec: &str,
        region: Region,
        mask: u32,
        base: u32,
    ) -> Result<(), LoadError> {
        let (banks, offsets) = parse_block(spec)?;
        let id = u8::try_from(self.blocks.len())
            .map_err(|_| LoadError::BadBlock(format!("too many blocks at {spec}")))?;
        self.blocks.push(Block { region, mask, base });
        for bank in &banks {
            for b in bank.lo..=bank.hi {
                for off in &offsets {
                    let lo = ((b << 16) | off.lo) as usize;
                    let hi = ((b << 16) | off.hi) as usize;
                    self.lookup[lo..=hi].fill(id);
                }
            }
        }
        if crate::debug_flags::mapper() {
            log::debug!("map {spec} -> {region:?} mask={mask:06X}");
        }
        Ok(())
    }

    #[inline]
    pub fn resolve(&self, addr: u32) -> Target {
        let addr = addr & 0xFF_FFFF;
        let block = self.blocks[self.lookup[addr as usize] as usize];
        Target {
            region: block.region,
            offset: (addr & block.mask) | block.base,
        }
    }
}

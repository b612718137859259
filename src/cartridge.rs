use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::bus::router::{MemoryMap, Region};
use crate::error::LoadError;

/// ROM layout, identified by where the 32-byte header lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    LoRom,
    HiRom,
    ExHiRom,
}

impl Layout {
    pub fn header_offset(self) -> usize {
        match self {
            Layout::LoRom => 0x00_7FC0,
            Layout::HiRom => 0x00_FFC0,
            Layout::ExHiRom => 0x40_FFC0,
        }
    }
}

/// Enhancement hardware announced by the chipset byte ($FFD6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coprocessor {
    Dsp,
    Gsu,
    Obc1,
    Sa1,
    Sdd1,
    Srtc,
    Other(u8),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartridgeHeader {
    pub layout: Layout,
    pub title: String,
    pub mapping: u8,
    pub chipset: u8,
    pub rom_size: u8,
    pub ram_size: u8,
    pub destination: u8,
    pub maker: u8,
    pub version: u8,
    pub checksum_complement: u16,
    pub checksum: u16,
}

impl CartridgeHeader {
    /// Chipset low nibble 2, 5 or 6 means battery-backed RAM.
    pub fn has_battery(&self) -> bool {
        matches!(self.chipset & 0x0F, 0x02 | 0x05 | 0x06)
    }

    pub fn coprocessor(&self) -> Option<Coprocessor> {
        if self.chipset & 0x0F < 0x03 {
            return None;
        }
        Some(match self.chipset >> 4 {
            0x0 => Coprocessor::Dsp,
            0x1 => Coprocessor::Gsu,
            0x2 => Coprocessor::Obc1,
            0x3 => Coprocessor::Sa1,
            0x4 => Coprocessor::Sdd1,
            0x5 => Coprocessor::Srtc,
            _ => Coprocessor::Other(self.chipset),
        })
    }

    /// Battery RAM size in bytes; zero when the cartridge has none.
    pub fn sram_bytes(&self) -> usize {
        if !self.has_battery() || self.ram_size == 0 || self.ram_size > 9 {
            return 0;
        }
        1024 << self.ram_size
    }

    fn mapping_name(&self) -> &'static str {
        match self.mapping & 0x0F {
            0x0 => "LoROM (Mode20)",
            0x1 => "HiROM (Mode21)",
            0x2 => "LoROM + S-DD1 (Mode22)",
            0x3 => "LoROM + SA-1 (Mode23)",
            0x5 => "ExHiROM (Mode25)",
            0xA => "HiROM + SPC7110 (Mode25)",
            _ => "Unknown",
        }
    }

    fn destination_name(&self) -> &'static str {
        match self.destination {
            0x00 => "J (Japan)",
            0x01 => "E (America, Canada)",
            0x02 => "P (Europe)",
            0x03 => "W (Sweden, Scandinavia)",
            0x06 => "F (France)",
            0x07 => "H (Nederland)",
            0x08 => "S (Spain)",
            0x09 => "D (Germany)",
            0x0A => "I (Italy)",
            0x0B => "C (China)",
            0x0D => "K (Korea)",
            0x0F => "N (Canada)",
            0x10 => "B (Brazil)",
            _ => "Unknown",
        }
    }
}

fn format_size(bytes: usize) -> String {
    if bytes >= 1024 * 1024 {
        format!("{}MB", bytes / (1024 * 1024))
    } else {
        format!("{}KB", bytes / 1024)
    }
}

impl fmt::Display for CartridgeHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ok = if self.checksum == !self.checksum_complement {
            "OK"
        } else {
            "NG"
        };
        writeln!(f, "Title: {}", self.title)?;
        writeln!(f, "  ROM Size:     {}", format_size(1024usize << self.rom_size.min(15)))?;
        writeln!(f, "  RAM Size:     {}", format_size(1024usize << self.ram_size.min(15)))?;
        writeln!(f, "  Mapping:      {}", self.mapping_name())?;
        writeln!(f, "  Chipset:      {:02X}h", self.chipset)?;
        writeln!(f, "  Destination:  {}", self.destination_name())?;
        writeln!(f, "  Maker:        {}", self.maker)?;
        writeln!(f, "  Version:      v1.{}", self.version)?;
        write!(f, "  Checksum:     0x{:04X}({})", self.checksum, ok)
    }
}

pub struct Cartridge {
    pub rom: Vec<u8>,
    pub sram: Vec<u8>,
    pub header: CartridgeHeader,
    pub has_copier_header: bool,
}

impl Cartridge {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, crate::error::CoreError> {
        let mut file = File::open(path)?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        Ok(Self::load_from_bytes(data)?)
    }

    pub fn load_from_bytes(mut data: Vec<u8>) -> Result<Self, LoadError> {
        if data.is_empty() {
            return Err(LoadError::Empty);
        }

        let has_copier_header = data.len() & 0x3FF == 0x200;
        if has_copier_header {
            data.drain(0..0x200);
        }

        let layout = detect_layout(&data)?;
        let header = parse_header(&data, layout)?;
        check_supported(&data, &header)?;

        let sram = vec![0; header.sram_bytes()];
        if !crate::debug_flags::quiet() {
            log::info!("{header}");
        }

        Ok(Cartridge {
            rom: data,
            sram,
            header,
            has_copier_header,
        })
    }

    pub fn layout(&self) -> Layout {
        self.header.layout
    }

    /// Installs ROM, SRAM and coprocessor windows.
    pub fn install(&self, map: &mut MemoryMap) -> Result<(), LoadError> {
        let battery = !self.sram.is_empty();
        match self.layout() {
            Layout::LoRom => {
                map.map("00-7D,80-FF:8000-FFFF", Region::Rom, 0x7F_7FFF)?;
                if battery {
                    map.map("70-7D,F0-FF:0000-7FFF", Region::Sram, 0x0F_7FFF)?;
                }
            }
            Layout::HiRom => {
                map.map("40-7D,C0-FF:0000-FFFF", Region::Rom, 0x3F_FFFF)?;
                map.map("00-3F,80-BF:8000-FFFF", Region::Rom, 0x3F_FFFF)?;
                if battery {
                    map.map("30-3F,B0-BF:6000-7FFF", Region::Sram, 0x0F_1FFF)?;
                }
            }
            Layout::ExHiRom => {
                map.map("C0-FF:0000-FFFF", Region::Rom, 0x3F_FFFF)?;
                map.map("80-BF:8000-FFFF", Region::Rom, 0x3F_FFFF)?;
                map.map_at("40-7D:0000-FFFF", Region::Rom, 0x3F_FFFF, 0x40_0000)?;
                map.map_at("00-3F:8000-FFFF", Region::Rom, 0x3F_FFFF, 0x40_0000)?;
                if battery {
                    map.map("80-BF:6000-7FFF", Region::Sram, 0x0F_1FFF)?;
                }
            }
        }
        if let Some(chip) = self.header.coprocessor() {
            let window = match (chip, self.layout()) {
                (Coprocessor::Dsp, Layout::LoRom) => "60-6F,E0-EF:0000-7FFF",
                (Coprocessor::Dsp, _) => "00-1F,80-9F:6000-7FFF",
                (Coprocessor::Gsu, _) => "00-3F,80-BF:3000-34FF",
                (Coprocessor::Obc1, _) => "00-3F,80-BF:6000-7FFF",
                (Coprocessor::Sdd1, _) => "00-3F,80-BF:4800-480F",
                (Coprocessor::Srtc, _) => "00-3F,80-BF:2800-2801",
                (Coprocessor::Sa1, _) | (Coprocessor::Other(_), _) => "00-3F,80-BF:2200-23FF",
            };
            log::warn!("cartridge uses {chip:?}; its registers at {window} are not emulated");
            map.map(window, Region::Coprocessor, 0xFF_FFFF)?;
        }
        Ok(())
    }

    /// `offset` is the router target for [`Region::Rom`].
    pub fn read_rom(&self, offset: u32) -> u8 {
        let index = match self.layout() {
            Layout::LoRom => ((offset >> 16) << 15) | (offset & 0x7FFF),
            Layout::HiRom | Layout::ExHiRom => offset,
        };
        self.rom[mirror(index as usize, self.rom.len())]
    }

    fn sram_index(&self, offset: u32) -> usize {
        let index = match self.layout() {
            Layout::LoRom => ((offset >> 16) << 15) | (offset & 0x7FFF),
            Layout::HiRom | Layout::ExHiRom => ((offset >> 16) << 13) | (offset & 0x1FFF),
        };
        index as usize % self.sram.len()
    }

    pub fn read_sram(&self, offset: u32) -> Option<u8> {
        if self.sram.is_empty() {
            return None;
        }
        Some(self.sram[self.sram_index(offset)])
    }

    pub fn write_sram(&mut self, offset: u32, value: u8) {
        if self.sram.is_empty() {
            return;
        }
        let index = self.sram_index(offset);
        self.sram[index] = value;
    }
}

/// Folds an index into a ROM whose size need not be a power of two: the image
/// is treated as a sum of power-of-two chunks, each mirrored on its own.
pub fn mirror(mut addr: usize, mut size: usize) -> usize {
    if size == 0 {
        return 0;
    }
    let mut base = 0;
    let mut mask = 1usize << 23;
    while addr >= size {
        while addr & mask == 0 {
            mask >>= 1;
        }
        addr -= mask;
        if size > mask {
            size -= mask;
            base += mask;
        }
        mask >>= 1;
    }
    base + addr
}

fn header_checksum_matches(rom: &[u8], ofs: usize) -> bool {
    let expected = u16::from_le_bytes([rom[ofs + 30], rom[ofs + 31]]);
    let mut sum = 0u16;
    for (i, &b) in rom.iter().enumerate() {
        sum = sum.wrapping_add(match i.wrapping_sub(ofs) {
            28 | 29 => 0xFF,
            30 | 31 => 0x00,
            _ => b as u16,
        });
    }
    sum == expected
}

fn is_valid_header(rom: &[u8], layout: Layout) -> bool {
    let ofs = layout.header_offset();
    if ofs + 32 > rom.len() {
        return false;
    }
    if header_checksum_matches(rom, ofs) {
        return true;
    }
    let size = rom[ofs + 0x17] as u32;
    size < 16 && (0x400usize << size) == rom.len()
}

/// Trial checksum match per layout, then size heuristics for homebrew images.
pub fn detect_layout(rom: &[u8]) -> Result<Layout, LoadError> {
    for layout in [Layout::LoRom, Layout::HiRom, Layout::ExHiRom] {
        if is_valid_header(rom, layout) {
            return Ok(layout);
        }
    }
    if rom.len() == 1_572_864 || (rom.len() <= 0x10000 && rom.len() >= 0x8000) {
        return Ok(Layout::LoRom);
    }
    if rom.len() < 0x8000 {
        return Err(LoadError::TooSmall(rom.len()));
    }
    Err(LoadError::UnknownLayout(rom.len()))
}

fn extract_title(bytes: &[u8]) -> String {
    let mut title = String::new();
    for &b in bytes {
        match b {
            0x00 => break,
            0x20..=0x7E => title.push(b as char),
            0x80..=0xFF => title.push('?'),
            _ => {}
        }
    }
    title.trim_end().to_string()
}

fn parse_header(rom: &[u8], layout: Layout) -> Result<CartridgeHeader, LoadError> {
    let ofs = layout.header_offset();
    let h = rom
        .get(ofs..ofs + 32)
        .ok_or(LoadError::TooSmall(rom.len()))?;
    Ok(CartridgeHeader {
        layout,
        title: extract_title(&h[..21]),
        mapping: h[0x15],
        chipset: h[0x16],
        rom_size: h[0x17],
        ram_size: h[0x18],
        destination: h[0x19],
        maker: h[0x1A],
        version: h[0x1B],
        checksum_complement: u16::from_le_bytes([h[0x1C], h[0x1D]]),
        checksum: u16::from_le_bytes([h[0x1E], h[0x1F]]),
    })
}

fn check_supported(rom: &[u8], header: &CartridgeHeader) -> Result<(), LoadError> {
    // Sub-type for custom chips lives one byte before the header.
    let subtype = rom[header.layout.header_offset() - 1];
    match header.chipset {
        0x34 | 0x35 => Err(LoadError::UnsupportedChip("SA-1")),
        0xF3 => Err(LoadError::UnsupportedChip("CX4")),
        0xF5 | 0xF9 if subtype == 0x00 => Err(LoadError::UnsupportedChip("SPC7110")),
        0xF5 | 0xF9 if subtype == 0x02 => Err(LoadError::UnsupportedChip("ST018")),
        _ => Ok(()),
    }
}

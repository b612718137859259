//! Synthetic cartridge images for whole-system tests.

#![allow(dead_code)]

use snes_emulator::{CoreConfig, Emulator};

pub const ROM_SIZE: usize = 0x8000;

/// 32 KiB LoROM: `program` at $00:8000, `data` blocks placed at ROM
/// offsets, NMI vector at `nmi`, valid header checksum.
pub fn lorom(program: &[u8], data: &[(usize, &[u8])], nmi: u16) -> Vec<u8> {
    let mut rom = vec![0xEA; ROM_SIZE];
    rom[..program.len()].copy_from_slice(program);
    for &(offset, bytes) in data {
        rom[offset..offset + bytes.len()].copy_from_slice(bytes);
    }
    rom[0x7FC0..0x7FD5].copy_from_slice(format!("{:<21}", "SYSTEM TEST").as_bytes());
    rom[0x7FD5] = 0x20;
    rom[0x7FD6] = 0x00;
    rom[0x7FD7] = 0x05;
    rom[0x7FD8] = 0x00;
    rom[0x7FD9] = 0x01;
    rom[0x7FFA..0x7FFC].copy_from_slice(&nmi.to_le_bytes());
    rom[0x7FFC..0x7FFE].copy_from_slice(&0x8000u16.to_le_bytes());

    let sum = rom.iter().enumerate().fold(0u16, |sum, (i, &b)| {
        sum.wrapping_add(match i {
            0x7FDC | 0x7FDD => 0xFF,
            0x7FDE | 0x7FDF => 0x00,
            _ => b as u16,
        })
    });
    rom[0x7FDC..0x7FDE].copy_from_slice(&(!sum).to_le_bytes());
    rom[0x7FDE..0x7FE0].copy_from_slice(&sum.to_le_bytes());
    rom
}

pub fn boot(rom: Vec<u8>) -> Emulator {
    let mut emu = Emulator::new(CoreConfig::default());
    emu.load_rom(rom).expect("synthetic ROM loads");
    emu
}

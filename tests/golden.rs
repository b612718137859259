mod common;

use std::path::PathBuf;

use common::{boot, lorom};
use snes_emulator::FrameCapture;

const WIDTH: usize = 256;
const HEIGHT: usize = 224;

/// Backdrop = red ($001F); brightness handed to the caller's table.
const SET_BACKDROP: &[u8] = &[
    0x9C, 0x21, 0x21, // STZ $2121
    0xA9, 0x1F, // LDA #$1F
    0x8D, 0x22, 0x21, // STA $2122
    0x9C, 0x22, 0x21, // STZ $2122
];

fn program(tail: &[u8]) -> Vec<u8> {
    let mut p = SET_BACKDROP.to_vec();
    p.extend_from_slice(tail);
    p.extend_from_slice(&[0x80, 0xFE]);
    p
}

fn reference(frame: u64, rows: impl Fn(usize) -> u16) -> FrameCapture {
    let pixels: Vec<u16> = (0..HEIGHT)
        .flat_map(|y| std::iter::repeat(rows(y)).take(WIDTH))
        .collect();
    FrameCapture::new(frame, &pixels)
}

/// Captures checked in under `tests/golden/`.
fn stored(name: &str) -> FrameCapture {
    let path: PathBuf = [env!("CARGO_MANIFEST_DIR"), "tests", "golden", name].iter().collect();
    FrameCapture::load(&path).unwrap_or_else(|e| panic!("{}: {e}", path.display()))
}

fn assert_matches(reference: &FrameCapture, actual: &FrameCapture) {
    let expected = reference.to_bytes().unwrap();
    let got = actual.to_bytes().unwrap();
    if expected != got {
        let at = reference.first_mismatch(&actual.pixels);
        panic!(
            "frame {} differs from reference at pixel {:?} (row {:?})",
            actual.frame,
            at,
            at.map(|i| i / WIDTH)
        );
    }
}

#[test]
fn backdrop_frame_matches_reference() {
    // LDA #$0F; STA $2100 - display on, full brightness
    let mut emu = boot(lorom(&program(&[0xA9, 0x0F, 0x8D, 0x00, 0x21]), &[], 0x8000));
    emu.run_frame().unwrap();
    assert_eq!(emu.resolution(), (WIDTH, HEIGHT));
    let golden = stored("backdrop_red.bin");
    assert_eq!(golden, reference(1, |_| 0x001F));
    assert_matches(&golden, &emu.capture());
}

#[test]
fn forced_blank_frame_is_black() {
    let mut emu = boot(lorom(&program(&[]), &[], 0x8000));
    emu.run_frame().unwrap();
    assert_matches(&reference(1, |_| 0), &emu.capture());
}

#[test]
fn hdma_brightness_split_matches_reference() {
    // channel 0 writes INIDISP once per table entry
    let hdma = [
        0x9C, 0x00, 0x43, // STZ $4300
        0x9C, 0x01, 0x43, // STZ $4301 ($2100)
        0x9C, 0x02, 0x43, // STZ $4302
        0xA9, 0x90, 0x8D, 0x03, 0x43, // $4303 = $90
        0x9C, 0x04, 0x43, // STZ $4304
        0xA9, 0x01, 0x8D, 0x0C, 0x42, // HDMAEN = 1
    ];
    // 16 lines at brightness 15, 16 at brightness 8, end
    let table: &[u8] = &[0x10, 0x0F, 0x10, 0x08, 0x00];
    let mut emu = boot(lorom(&program(&hdma), &[(0x1000, table)], 0x8000));
    emu.run_frame().unwrap();
    emu.run_frame().unwrap();

    // a line is composed before that line's HDMA burst
    let dimmed = (0x1F * 9 / 16) as u16;
    let reference = reference(2, |y| if y < 16 { 0x001F } else { dimmed });
    assert_matches(&reference, &emu.capture());
}

#[test]
fn capture_survives_a_file_round_trip() {
    let mut emu = boot(lorom(&program(&[0xA9, 0x0F, 0x8D, 0x00, 0x21]), &[], 0x8000));
    emu.run_frame().unwrap();
    let path = std::env::temp_dir().join(format!("snes-golden-{}.bin", std::process::id()));
    emu.capture().save(&path).unwrap();
    let loaded = FrameCapture::load(&path).unwrap();
    std::fs::remove_file(&path).ok();
    assert_matches(&loaded, &emu.capture());
}

#[test]
fn runs_are_deterministic() {
    let rom = lorom(&program(&[0xA9, 0x0F, 0x8D, 0x00, 0x21]), &[], 0x8000);
    let mut a = boot(rom.clone());
    let mut b = boot(rom);
    for _ in 0..3 {
        a.run_frame().unwrap();
        b.run_frame().unwrap();
    }
    assert_eq!(a.cycles(), b.cycles());
    assert_matches(&a.capture(), &b.capture());
}

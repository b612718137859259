use super::memory::remap_vram_address;
use super::renderer::{apply_brightness, BackdropRenderer, FrameCapture, ScanlineRenderer};
use super::timing::*;
use super::*;

fn ppu_at(h: u16, v: u16) -> Ppu {
    let mut ppu = Ppu::new();
    ppu.timing.hcount = h;
    ppu.timing.vcount = v;
    ppu
}

#[test]
fn reset_places_counters_after_cpu_init() {
    let mut ppu = Ppu::new();
    ppu.reset(182);
    assert_eq!(ppu.timing.hcount, 46);
    assert_eq!(ppu.timing.vcount, 0);
    assert!(ppu.forced_blank());
}

#[test]
fn frame_has_262_lines_of_340_dots() {
    let mut t = VideoTiming::default();
    let mut starts = 0;
    let mut ends = 0;
    let mut renders = 0;
    let mut hdma_lines = 0;
    for _ in 0..(DOTS_PER_LINE as u32 * LINES_PER_FRAME as u32) {
        let (ev, _) = t.tick(0);
        starts += ev.contains(DotEvents::VBLANK_START) as u32;
        ends += ev.contains(DotEvents::VBLANK_END) as u32;
        renders += ev.contains(DotEvents::RENDER_LINE) as u32;
        hdma_lines += ev.contains(DotEvents::HDMA_LINE) as u32;
    }
    assert_eq!((t.hcount, t.vcount), (0, 0));
    assert_eq!(starts, 1);
    assert_eq!(ends, 1);
    assert_eq!(renders, 224);
    assert_eq!(hdma_lines, 225);
    assert_eq!(FRAME_CYCLES, 340 * 4 * 262);
}

#[test]
fn vblank_starts_on_line_225() {
    let mut t = VideoTiming::default();
    t.hcount = DOTS_PER_LINE - 1;
    t.vcount = VISIBLE_LINES;
    let (ev, _) = t.tick(0);
    assert!(ev.contains(DotEvents::VBLANK_START));
    assert!(t.vblank);
    assert_eq!(t.vcount, VBLANK_LINE);
}

#[test]
fn fixed_dot_actions_fire_on_their_lines() {
    let mut t = VideoTiming::default();
    t.vcount = VBLANK_LINE;
    t.hcount = DOT_JOYPAD_LATCH - 1;
    assert!(t.tick(0).0.contains(DotEvents::JOYPAD_LATCH));

    t.vcount = 10;
    t.hcount = DOT_JOYPAD_LATCH - 1;
    assert!(t.tick(0).0.is_empty());

    t.hcount = DOT_REFRESH - 1;
    assert!(t.tick(0).0.contains(DotEvents::REFRESH));

    t.vcount = 0;
    t.hcount = DOT_HDMA_RELOAD - 1;
    assert!(t.tick(0).0.contains(DotEvents::HDMA_RELOAD));
}

#[test]
fn field_toggles_once_per_frame() {
    let mut t = VideoTiming::default();
    t.hcount = 0;
    t.tick(0);
    assert!(t.interlace_field);
    t.vcount = 5;
    t.hcount = 0;
    t.tick(0);
    assert!(t.interlace_field);
}

#[test]
fn irq_comparators_by_mode() {
    let mut t = VideoTiming::default();
    t.htime = 100;
    t.vtime = 20;

    t.hcount = 99;
    t.vcount = 3;
    assert_eq!(t.tick(1).1, Some(IRQ_DELAY_H));

    t.hcount = 99;
    assert_eq!(t.tick(3).1, None);

    t.hcount = 99;
    t.vcount = 20;
    assert_eq!(t.tick(3).1, Some(IRQ_DELAY_H));

    t.hcount = DOTS_PER_LINE - 1;
    t.vcount = 19;
    assert_eq!(t.tick(2).1, Some(IRQ_DELAY_V));

    t.hcount = 99;
    assert_eq!(t.tick(0).1, None);
}

#[test]
fn out_of_range_htime_never_matches() {
    let mut t = VideoTiming::default();
    t.htime = 400;
    for _ in 0..DOTS_PER_LINE * 2 {
        assert_eq!(t.tick(1).1, None);
    }
}

#[test]
fn inidisp_sets_forced_blank_and_brightness() {
    let mut ppu = Ppu::new();
    ppu.write(0x00, 0x0F);
    assert!(!ppu.forced_blank());
    assert_eq!(ppu.brightness(), 15);
    ppu.write(0x00, 0x83);
    assert!(ppu.forced_blank());
    assert_eq!(ppu.brightness(), 3);
}

#[test]
fn vram_word_writes_increment_on_high_byte() {
    let mut ppu = Ppu::new();
    ppu.write(0x15, 0x80);
    ppu.write(0x16, 0x00);
    ppu.write(0x17, 0x10);
    ppu.write(0x18, 0x34);
    ppu.write(0x19, 0x12);
    ppu.write(0x18, 0x78);
    ppu.write(0x19, 0x56);
    assert_eq!(ppu.mem.read_vram_word(0x1000), 0x1234);
    assert_eq!(ppu.mem.read_vram_word(0x1001), 0x5678);
    assert_eq!(ppu.vram_address(), 0x1002);
}

#[test]
fn vram_step_32() {
    let mut ppu = Ppu::new();
    ppu.write(0x15, 0x01);
    ppu.write(0x16, 0x00);
    ppu.write(0x17, 0x00);
    ppu.write(0x18, 0xAA);
    ppu.write(0x18, 0xBB);
    assert_eq!(ppu.mem.vram[0], 0xAA);
    assert_eq!(ppu.mem.vram[64], 0xBB);
    assert_eq!(ppu.vram_address(), 64);
}

#[test]
fn vram_reads_go_through_prefetch() {
    let mut ppu = Ppu::new();
    ppu.mem.vram[0x20] = 0x11;
    ppu.mem.vram[0x21] = 0x22;
    ppu.mem.vram[0x22] = 0x33;
    ppu.mem.vram[0x23] = 0x44;
    ppu.write(0x15, 0x00);
    ppu.write(0x16, 0x10);
    ppu.write(0x17, 0x00);
    assert_eq!(ppu.read(0x3A, 0), 0x22);
    // the latch refills from the address before it steps
    assert_eq!(ppu.read(0x39, 0), 0x11);
    assert_eq!(ppu.read(0x39, 0), 0x11);
    assert_eq!(ppu.read(0x39, 0), 0x33);
    assert_eq!(ppu.vram_address(), 0x13);
}

#[test]
fn remap_modes_rotate_low_bits() {
    assert_eq!(remap_vram_address(0x1234, 0), 0x1234);
    assert_eq!(remap_vram_address(0x0021, 1), 0x0009);
    assert_eq!(remap_vram_address(0x0041, 2), 0x0009);
    assert_eq!(remap_vram_address(0x0081, 3), 0x0009);
}

#[test]
fn cgram_pairs_bytes_and_masks_bit_15() {
    let mut ppu = Ppu::new();
    ppu.write(0x21, 0x02);
    ppu.write(0x22, 0xFF);
    assert_eq!(ppu.mem.cgram[4], 0);
    ppu.write(0x22, 0xFF);
    assert_eq!(ppu.mem.color(2), 0x7FFF);
    assert_eq!(ppu.cgram_address(), 3);

    ppu.write(0x21, 0x02);
    ppu.ppu2_mdr = 0x80;
    assert_eq!(ppu.read(0x3B, 0), 0xFF);
    assert_eq!(ppu.read(0x3B, 0), 0xFF);
}

#[test]
fn oam_low_table_writes_in_pairs() {
    let mut ppu = Ppu::new();
    ppu.write(0x02, 0x01);
    ppu.write(0x03, 0x00);
    assert_eq!(ppu.oam_address(), 2);
    ppu.write(0x04, 0x11);
    assert_eq!(ppu.mem.oam[2], 0);
    ppu.write(0x04, 0x22);
    assert_eq!(&ppu.mem.oam[2..4], &[0x11, 0x22]);
}

#[test]
fn oam_high_table_is_direct_and_mirrored() {
    let mut ppu = Ppu::new();
    ppu.write(0x02, 0x00);
    ppu.write(0x03, 0x01);
    assert_eq!(ppu.oam_address(), 0x200);
    ppu.write(0x04, 0x5A);
    assert_eq!(ppu.mem.oam[0x200], 0x5A);
    assert_eq!(VideoMemory::oam_index(0x221), 0x201);
    assert_eq!(VideoMemory::oam_index(0x3FF), 0x21F);
}

#[test]
fn oam_address_reloads_at_vblank() {
    let mut ppu = Ppu::new();
    ppu.write(0x02, 0x10);
    ppu.write(0x04, 0);
    ppu.write(0x04, 0);
    assert_eq!(ppu.oam_address(), 0x22);
    ppu.reload_oam_address();
    assert_eq!(ppu.oam_address(), 0x20);
}

#[test]
fn mode7_multiply_is_signed() {
    let mut ppu = Ppu::new();
    ppu.write(0x1B, 0x00);
    ppu.write(0x1B, 0xFF); // M7A = -256
    ppu.write(0x1C, 0x00);
    ppu.write(0x1C, 0x02); // M7B high byte = 2
    assert_eq!(ppu.read(0x34, 0), 0x00);
    assert_eq!(ppu.read(0x35, 0), 0xFE);
    assert_eq!(ppu.read(0x36, 0), 0xFF);
    assert_eq!(ppu.ppu1_mdr, 0xFF);
}

#[test]
fn counter_latch_reads_low_then_high() {
    let mut ppu = ppu_at(0x123, 0x105);
    ppu.latch_counters();
    ppu.ppu2_mdr = 0;
    assert_eq!(ppu.read(0x3C, 0), 0x23);
    assert_eq!(ppu.read(0x3C, 0) & 1, 1);
    assert_eq!(ppu.read(0x3D, 0), 0x05);

    let stat = ppu.read(0x3F, 0);
    assert_eq!(stat & 0x4F, 0x43);
    assert_eq!(ppu.read(0x3F, 0) & 0x40, 0);
    // STAT78 resets the flip-flop
    assert_eq!(ppu.read(0x3D, 0), 0x05);
}

#[test]
fn write_only_registers_return_latches() {
    let mut ppu = Ppu::new();
    ppu.ppu1_mdr = 0x42;
    assert_eq!(ppu.read(0x05, 0x99), 0x42);
    assert_eq!(ppu.read(0x00, 0x99), 0x99);
    assert_eq!(ppu.read(0x3E, 0) & 0x0F, 0x01);
}

#[test]
fn unhandled_writes_land_in_register_file() {
    let mut ppu = Ppu::new();
    ppu.write(0x05, 0x09);
    ppu.write(0x2C, 0x13);
    assert_eq!(ppu.regs[0x05], 0x09);
    assert_eq!(ppu.regs[0x2C], 0x13);
}

#[test]
fn backdrop_renderer_uses_color_zero() {
    let mut ppu = Ppu::new();
    ppu.write(0x00, 0x0F);
    ppu.write(0x21, 0);
    ppu.write(0x22, 0x1F);
    ppu.write(0x22, 0x00);
    let mut line = [0u16; SCREEN_WIDTH];
    BackdropRenderer.render_line(&ppu, 0, &mut line);
    assert!(line.iter().all(|&p| p == 0x001F));

    assert_eq!(apply_brightness(0x7FFF, 7), (15 << 10) | (15 << 5) | 15);
    assert_eq!(apply_brightness(0x001F, 0), 0x0001);
}

#[test]
fn frame_capture_reports_first_mismatch() {
    let pixels = vec![0x1234u16; SCREEN_WIDTH * SCREEN_HEIGHT];
    let capture = FrameCapture::new(3, &pixels);
    let restored = FrameCapture::from_bytes(&capture.to_bytes().unwrap()).unwrap();
    assert_eq!(restored, capture);
    assert_eq!(restored.first_mismatch(&pixels), None);

    let mut other = pixels.clone();
    other[500] = 0;
    assert_eq!(restored.first_mismatch(&other), Some(500));
}

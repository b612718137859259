use super::*;
use crate::cpu_bus::CpuBus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cycle {
    Read(u32),
    Write(u32, u8),
    Idle,
}

use Cycle::{Idle, Read, Write};

struct TestBus {
    memory: Vec<u8>,
    log: Vec<Cycle>,
    nmi: bool,
    irq: bool,
    nmi_acks: u32,
    horizon_calls: u32,
}

impl TestBus {
    fn new() -> Self {
        Self {
            memory: vec![0; 0x100_0000],
            log: Vec::new(),
            nmi: false,
            irq: false,
            nmi_acks: 0,
            horizon_calls: 0,
        }
    }

    fn load(&mut self, addr: u32, bytes: &[u8]) {
        let start = addr as usize;
        self.memory[start..start + bytes.len()].copy_from_slice(bytes);
    }
}

impl CpuBus for TestBus {
    fn read_u8(&mut self, addr: u32) -> u8 {
        self.log.push(Read(addr));
        self.memory[addr as usize]
    }

    fn write_u8(&mut self, addr: u32, value: u8) {
        self.log.push(Write(addr, value));
        self.memory[addr as usize] = value;
    }

    fn idle(&mut self) {
        self.log.push(Idle);
    }

    fn poll_nmi(&mut self) -> bool {
        self.nmi
    }

    fn acknowledge_nmi(&mut self) {
        self.nmi = false;
        self.nmi_acks += 1;
    }

    fn poll_irq(&mut self) -> bool {
        self.irq
    }

    fn idle_to_horizon(&mut self) {
        self.horizon_calls += 1;
    }
}

fn setup(program: &[u8]) -> (Cpu, TestBus) {
    let mut bus = TestBus::new();
    bus.load(0x8000, program);
    bus.load(0xFFFC, &[0x00, 0x80]);
    let mut cpu = Cpu::new();
    cpu.reset(0x8000);
    (cpu, bus)
}

fn native(cpu: &mut Cpu, p: u8) {
    cpu.regs.set_emulation(false);
    cpu.regs.set_p(p);
}

/// Steps until the queue drains; returns the bus cycles of that instruction.
fn run_instruction(cpu: &mut Cpu, bus: &mut TestBus) -> Vec<Cycle> {
    bus.log.clear();
    cpu.step(bus);
    while !cpu.at_fetch() {
        cpu.step(bus);
    }
    bus.log.clone()
}

fn idles(log: &[Cycle]) -> usize {
    log.iter().filter(|c| **c == Idle).count()
}

#[test]
fn reset_state_is_emulation_with_stack_in_page_one() {
    let (cpu, _) = setup(&[]);
    assert!(cpu.regs.emulation);
    assert_eq!(cpu.regs.s, 0x01FF);
    assert!(cpu.regs.p.contains(StatusFlags::IRQ_DISABLE | StatusFlags::MEMORY_8BIT | StatusFlags::INDEX_8BIT));
    assert_eq!(cpu.regs.pc24(), 0x00_8000);
    assert!(cpu.at_fetch());
}

#[test]
fn lda_immediate_is_two_bus_reads() {
    let (mut cpu, mut bus) = setup(&[0xA9, 0x42]);
    let log = run_instruction(&mut cpu, &mut bus);
    assert_eq!(log, vec![Read(0x8000), Read(0x8001)]);
    assert_eq!(cpu.regs.a & 0xFF, 0x42);
    assert_eq!(cpu.regs.pc, 0x8002);
}

#[test]
fn each_step_is_one_bus_operation() {
    let (mut cpu, mut bus) = setup(&[0xAD, 0x34, 0x12]);
    let mut steps = 0;
    bus.log.clear();
    loop {
        let before = bus.log.len();
        cpu.step(&mut bus);
        assert_eq!(bus.log.len(), before + 1);
        steps += 1;
        if cpu.at_fetch() {
            break;
        }
    }
    assert_eq!(steps, 4);
}

#[test]
fn rep_then_sixteen_bit_absolute_load() {
    let (mut cpu, mut bus) = setup(&[0xC2, 0x20, 0xAD, 0x34, 0x12]);
    native(&mut cpu, 0x30);
    bus.load(0x1234, &[0xCD, 0xAB]);

    let log = run_instruction(&mut cpu, &mut bus);
    assert_eq!(log, vec![Read(0x8000), Read(0x8001), Idle]);
    assert!(!cpu.regs.m8());

    let log = run_instruction(&mut cpu, &mut bus);
    assert_eq!(
        log,
        vec![Read(0x8002), Read(0x8003), Read(0x8004), Read(0x1234), Read(0x1235)]
    );
    assert_eq!(cpu.regs.a, 0xABCD);
}

#[test]
fn absolute_x_read_penalty_on_page_cross_or_wide_index() {
    let (mut cpu, mut bus) = setup(&[0xBD, 0xFF, 0x10]);
    cpu.regs.x = 0;
    assert_eq!(idles(&run_instruction(&mut cpu, &mut bus)), 0);

    cpu.regs.pc = 0x8000;
    cpu.regs.x = 1;
    let log = run_instruction(&mut cpu, &mut bus);
    assert_eq!(idles(&log), 1);
    assert_eq!(log.last(), Some(&Read(0x1100)));

    native(&mut cpu, 0x20);
    cpu.regs.pc = 0x8000;
    cpu.regs.x = 0;
    assert_eq!(idles(&run_instruction(&mut cpu, &mut bus)), 1);
}

#[test]
fn absolute_x_store_always_pays() {
    let (mut cpu, mut bus) = setup(&[0x9D, 0x00, 0x20]);
    cpu.regs.a = 0x77;
    let log = run_instruction(&mut cpu, &mut bus);
    assert_eq!(log, vec![Read(0x8000), Read(0x8001), Read(0x8002), Idle, Write(0x2000, 0x77)]);
}

#[test]
fn direct_page_penalty_when_dl_nonzero() {
    let (mut cpu, mut bus) = setup(&[0xA5, 0x10]);
    cpu.regs.d = 0x0001;
    let log = run_instruction(&mut cpu, &mut bus);
    assert_eq!(log, vec![Read(0x8000), Read(0x8001), Idle, Read(0x0011)]);

    cpu.regs.pc = 0x8000;
    cpu.regs.d = 0x0100;
    let log = run_instruction(&mut cpu, &mut bus);
    assert_eq!(log, vec![Read(0x8000), Read(0x8001), Read(0x0110)]);
}

#[test]
fn emulation_direct_indexed_wraps_in_page() {
    let (mut cpu, mut bus) = setup(&[0xB5, 0xF0]);
    cpu.regs.x = 0x20;
    let log = run_instruction(&mut cpu, &mut bus);
    assert_eq!(log, vec![Read(0x8000), Read(0x8001), Idle, Read(0x0010)]);
}

#[test]
fn indirect_indexed_reads_pointer_then_data() {
    let (mut cpu, mut bus) = setup(&[0xB1, 0x10]);
    bus.load(0x10, &[0xFF, 0x20]);
    bus.load(0x2100, &[0x99]);
    cpu.regs.y = 1;
    let log = run_instruction(&mut cpu, &mut bus);
    assert_eq!(
        log,
        vec![Read(0x8000), Read(0x8001), Read(0x0010), Read(0x0011), Idle, Read(0x2100)]
    );
    assert_eq!(cpu.regs.a & 0xFF, 0x99);
}

#[test]
fn indirect_long_indexed_crosses_banks() {
    let (mut cpu, mut bus) = setup(&[0xB7, 0x10]);
    bus.load(0x10, &[0xFF, 0xFF, 0x7E]);
    bus.load(0x7F_0001, &[0x5A]);
    cpu.regs.y = 2;
    let log = run_instruction(&mut cpu, &mut bus);
    assert_eq!(log.last(), Some(&Read(0x7F_0001)));
    assert_eq!(idles(&log), 0);
    assert_eq!(cpu.regs.a & 0xFF, 0x5A);
}

#[test]
fn sixteen_bit_rmw_writes_high_byte_first() {
    let (mut cpu, mut bus) = setup(&[0xEE, 0x00, 0x30]);
    native(&mut cpu, 0x00);
    bus.load(0x3000, &[0xFF, 0x00]);
    let log = run_instruction(&mut cpu, &mut bus);
    assert_eq!(
        log,
        vec![
            Read(0x8000),
            Read(0x8001),
            Read(0x8002),
            Read(0x3000),
            Read(0x3001),
            Idle,
            Write(0x3001, 0x01),
            Write(0x3000, 0x00),
        ]
    );
}

#[test]
fn jsr_and_rts_round_trip() {
    let (mut cpu, mut bus) = setup(&[0x20, 0x00, 0x90]);
    bus.load(0x9000, &[0x60]);

    let log = run_instruction(&mut cpu, &mut bus);
    assert_eq!(
        log,
        vec![
            Read(0x8000),
            Read(0x8001),
            Read(0x8002),
            Idle,
            Write(0x01FF, 0x80),
            Write(0x01FE, 0x02),
        ]
    );
    assert_eq!(cpu.regs.pc, 0x9000);
    assert_eq!(cpu.regs.s, 0x01FD);

    let log = run_instruction(&mut cpu, &mut bus);
    assert_eq!(log, vec![Read(0x9000), Idle, Idle, Read(0x01FE), Read(0x01FF), Idle]);
    assert_eq!(cpu.regs.pc, 0x8003);
    assert_eq!(cpu.regs.s, 0x01FF);
}

#[test]
fn jsl_pushes_bank_and_rtl_returns() {
    let (mut cpu, mut bus) = setup(&[0x22, 0x56, 0x34, 0x12]);
    native(&mut cpu, 0x30);
    bus.load(0x12_3456, &[0x6B]);

    let log = run_instruction(&mut cpu, &mut bus);
    assert_eq!(
        log,
        vec![
            Read(0x8000),
            Read(0x8001),
            Read(0x8002),
            Write(0x01FF, 0x00),
            Idle,
            Read(0x8003),
            Write(0x01FE, 0x80),
            Write(0x01FD, 0x03),
        ]
    );
    assert_eq!(cpu.regs.pc24(), 0x12_3456);

    let log = run_instruction(&mut cpu, &mut bus);
    assert_eq!(log.len(), 6);
    assert_eq!(cpu.regs.pc24(), 0x00_8004);
}

#[test]
fn brk_in_emulation_sets_break_bit_and_clears_decimal() {
    let (mut cpu, mut bus) = setup(&[0x00, 0xEA]);
    bus.load(0xFFFE, &[0x00, 0x90]);
    cpu.regs.set_p(0x38);

    let log = run_instruction(&mut cpu, &mut bus);
    assert_eq!(
        log,
        vec![
            Read(0x8000),
            Read(0x8001),
            Write(0x01FF, 0x80),
            Write(0x01FE, 0x02),
            Write(0x01FD, 0x38),
            Read(0xFFFE),
            Read(0xFFFF),
        ]
    );
    assert_eq!(cpu.regs.pc, 0x9000);
    assert!(cpu.regs.p.contains(StatusFlags::IRQ_DISABLE));
    assert!(!cpu.regs.p.contains(StatusFlags::DECIMAL));
}

#[test]
fn native_nmi_pushes_bank_and_uses_native_vector() {
    let (mut cpu, mut bus) = setup(&[]);
    native(&mut cpu, 0x34);
    cpu.regs.pb = 0x01;
    bus.load(0xFFEA, &[0x00, 0xA0]);
    bus.nmi = true;

    let log = run_instruction(&mut cpu, &mut bus);
    assert_eq!(
        log,
        vec![
            Idle,
            Idle,
            Write(0x01FF, 0x01),
            Write(0x01FE, 0x80),
            Write(0x01FD, 0x00),
            Write(0x01FC, 0x34),
            Read(0xFFEA),
            Read(0xFFEB),
        ]
    );
    assert_eq!(cpu.regs.pc24(), 0x00_A000);
    assert_eq!(bus.nmi_acks, 1);
}

#[test]
fn irq_waits_for_cli_and_clears_break_bit() {
    let (mut cpu, mut bus) = setup(&[0xEA, 0x58, 0xEA]);
    bus.load(0xFFFE, &[0x00, 0xB0]);
    bus.irq = true;

    assert_eq!(run_instruction(&mut cpu, &mut bus), vec![Read(0x8000), Idle]);
    run_instruction(&mut cpu, &mut bus);
    assert!(!cpu.regs.p.contains(StatusFlags::IRQ_DISABLE));

    let log = run_instruction(&mut cpu, &mut bus);
    assert_eq!(log[4], Write(0x01FD, 0x20));
    assert_eq!(cpu.regs.pc, 0xB000);
}

#[test]
fn wai_idles_until_irq_line_even_when_masked() {
    let (mut cpu, mut bus) = setup(&[0xCB, 0xEA]);
    assert_eq!(run_instruction(&mut cpu, &mut bus), vec![Read(0x8000), Idle, Idle]);
    assert!(cpu.waiting);

    cpu.step(&mut bus);
    assert_eq!(bus.horizon_calls, 1);
    assert!(cpu.waiting);

    bus.irq = true;
    let log = run_instruction(&mut cpu, &mut bus);
    assert!(!cpu.waiting);
    assert_eq!(log, vec![Read(0x8001), Idle]);
}

#[test]
fn stp_halts_until_reset() {
    let (mut cpu, mut bus) = setup(&[0xDB]);
    run_instruction(&mut cpu, &mut bus);
    assert!(cpu.stopped);
    bus.nmi = true;
    cpu.step(&mut bus);
    cpu.step(&mut bus);
    assert_eq!(bus.horizon_calls, 2);
    cpu.reset(0x8000);
    assert!(!cpu.halted());
}

#[test]
fn mvn_moves_one_byte_per_pass() {
    let (mut cpu, mut bus) = setup(&[0x54, 0x01, 0x02]);
    native(&mut cpu, 0x00);
    cpu.regs.a = 2;
    cpu.regs.x = 0x1000;
    cpu.regs.y = 0x2000;
    bus.load(0x02_1000, &[1, 2, 3]);

    let mut passes = 0;
    while cpu.regs.pc != 0x8003 {
        let log = run_instruction(&mut cpu, &mut bus);
        assert_eq!(log.len(), 7);
        passes += 1;
    }
    assert_eq!(passes, 3);
    assert_eq!(&bus.memory[0x01_2000..0x01_2003], &[1, 2, 3]);
    assert_eq!(cpu.regs.a, 0xFFFF);
    assert_eq!((cpu.regs.x, cpu.regs.y), (0x1003, 0x2003));
    assert_eq!(cpu.regs.db, 0x01);
}

#[test]
fn branch_costs_extra_on_emulation_page_cross() {
    let (mut cpu, mut bus) = setup(&[]);
    bus.load(0x80FD, &[0x80, 0x10]);
    cpu.regs.pc = 0x80FD;
    let log = run_instruction(&mut cpu, &mut bus);
    assert_eq!(idles(&log), 2);
    assert_eq!(cpu.regs.pc, 0x810F);

    bus.load(0x810F, &[0xD0, 0x10]);
    cpu.regs.p.insert(StatusFlags::ZERO);
    let log = run_instruction(&mut cpu, &mut bus);
    assert_eq!(log.len(), 2);
    assert_eq!(cpu.regs.pc, 0x8111);
}

#[test]
fn sep_index_truncates_x_and_y() {
    let (mut cpu, mut bus) = setup(&[0xE2, 0x10]);
    native(&mut cpu, 0x00);
    cpu.regs.x = 0x1234;
    cpu.regs.y = 0xABCD;
    run_instruction(&mut cpu, &mut bus);
    assert_eq!((cpu.regs.x, cpu.regs.y), (0x34, 0xCD));
}

#[test]
fn xce_swaps_carry_and_emulation() {
    let (mut cpu, mut bus) = setup(&[0x18, 0xFB, 0x38, 0xFB]);
    run_instruction(&mut cpu, &mut bus);
    run_instruction(&mut cpu, &mut bus);
    assert!(!cpu.regs.emulation);
    assert!(cpu.regs.p.contains(StatusFlags::CARRY));

    cpu.regs.s = 0x1F80;
    run_instruction(&mut cpu, &mut bus);
    run_instruction(&mut cpu, &mut bus);
    assert!(cpu.regs.emulation);
    assert_eq!(cpu.regs.s, 0x0180);
}

#[test]
fn decimal_program() {
    let (mut cpu, mut bus) = setup(&[0xF8, 0x18, 0xA9, 0x58, 0x69, 0x46]);
    for _ in 0..4 {
        run_instruction(&mut cpu, &mut bus);
    }
    assert_eq!(cpu.regs.a & 0xFF, 0x04);
    assert!(cpu.regs.p.contains(StatusFlags::CARRY));
}

#[test]
fn pea_and_per_push_words() {
    let (mut cpu, mut bus) = setup(&[0xF4, 0x34, 0x12, 0x62, 0x10, 0x00]);
    let log = run_instruction(&mut cpu, &mut bus);
    assert_eq!(&log[3..], &[Write(0x01FF, 0x12), Write(0x01FE, 0x34)]);

    let log = run_instruction(&mut cpu, &mut bus);
    assert_eq!(
        log,
        vec![
            Read(0x8003),
            Read(0x8004),
            Read(0x8005),
            Idle,
            Write(0x01FD, 0x80),
            Write(0x01FC, 0x16),
        ]
    );
}

#[test]
fn rti_native_restores_bank() {
    let (mut cpu, mut bus) = setup(&[0x40]);
    native(&mut cpu, 0x30);
    cpu.regs.s = 0x01F0;
    bus.load(0x01F1, &[0x00, 0x00, 0x90, 0x03]);
    let log = run_instruction(&mut cpu, &mut bus);
    assert_eq!(log.len(), 7);
    assert_eq!(cpu.regs.pc24(), 0x03_9000);
    assert_eq!(cpu.regs.s, 0x01F4);
    assert!(!cpu.regs.m8());
}

#[test]
fn pha_pla_sixteen_bit() {
    let (mut cpu, mut bus) = setup(&[0x48, 0xA9, 0x00, 0x00, 0x68]);
    native(&mut cpu, 0x00);
    cpu.regs.a = 0xBEEF;
    let log = run_instruction(&mut cpu, &mut bus);
    assert_eq!(&log[2..], &[Write(0x01FF, 0xBE), Write(0x01FE, 0xEF)]);
    run_instruction(&mut cpu, &mut bus);
    assert_eq!(cpu.regs.a, 0);
    let log = run_instruction(&mut cpu, &mut bus);
    assert_eq!(log.len(), 5);
    assert_eq!(cpu.regs.a, 0xBEEF);
    assert!(cpu.regs.p.contains(StatusFlags::NEGATIVE));
}

#[test]
fn jmp_indirect_indexed_reads_program_bank() {
    let (mut cpu, mut bus) = setup(&[]);
    bus.load(0x05_8000, &[0x7C, 0x00, 0x90]);
    bus.load(0x05_9004, &[0x34, 0x12]);
    cpu.regs.pb = 0x05;
    cpu.regs.x = 4;
    let log = run_instruction(&mut cpu, &mut bus);
    assert_eq!(log.len(), 6);
    assert_eq!(cpu.regs.pc24(), 0x05_1234);
}

#[test]
fn status_display_uses_case_for_flags() {
    let (cpu, _) = setup(&[]);
    let text = cpu.to_string();
    assert!(text.contains("P: nvMXdIzc"));
    assert!(text.contains("PC: 00:8000"));
}

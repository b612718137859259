use std::env;
use std::path::{Path, PathBuf};
use std::process;

use snes_emulator::{CoreConfig, CoreError, Emulator, FrameCapture};

fn resolve_rom_path(arg: &str) -> Result<PathBuf, String> {
    let direct = PathBuf::from(arg);
    if direct.exists() {
        return Ok(direct);
    }

    fn with_ext(base: &Path, exts: &[&str]) -> Option<PathBuf> {
        for ext in exts {
            let mut p = base.to_path_buf();
            if p.extension().is_none() {
                p.set_extension(ext);
            }
            if p.exists() {
                return Some(p);
            }
        }
        None
    }

    let exts = ["sfc", "smc"];
    let in_roms = Path::new("roms").join(arg);
    if in_roms.exists() {
        return Ok(in_roms);
    }
    if let Some(p) = with_ext(&in_roms, &exts) {
        return Ok(p);
    }
    if let Some(p) = with_ext(&direct, &exts) {
        return Ok(p);
    }
    Err(format!("ROM not found: {arg}"))
}

struct Args {
    rom: String,
    frames: u64,
    capture: Option<PathBuf>,
}

fn usage(program: &str) -> ! {
    eprintln!("Usage: {program} <rom> [frames] [--capture <path>]");
    eprintln!("Supported formats: .sfc, .smc");
    process::exit(2);
}

fn parse_args() -> Args {
    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("snes-emulator");
    if args.len() < 2 || args.iter().any(|a| a == "--help" || a == "-h") {
        usage(program);
    }

    let mut rom = None;
    let mut frames = None;
    let mut capture = None;
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--capture" => {
                let Some(path) = args.get(i + 1) else {
                    eprintln!("--capture requires a path");
                    process::exit(2);
                };
                capture = Some(PathBuf::from(path));
                i += 1;
            }
            s if s.starts_with("--") => {
                eprintln!("Unknown option: {s}");
                process::exit(2);
            }
            s if rom.is_none() => rom = Some(s.to_string()),
            s if frames.is_none() => match s.parse::<u64>() {
                Ok(n) => frames = Some(n),
                Err(_) => {
                    eprintln!("invalid frame count: {s}");
                    process::exit(2);
                }
            },
            _ => usage(program),
        }
        i += 1;
    }

    let Some(rom) = rom else { usage(program) };
    Args {
        rom,
        frames: frames.unwrap_or(60),
        capture,
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = parse_args();
    let rom_path = match resolve_rom_path(&args.rom) {
        Ok(p) => p,
        Err(msg) => {
            eprintln!("{msg}");
            process::exit(1);
        }
    };
    let rom = match std::fs::read(&rom_path) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Failed to read {}: {e}", rom_path.display());
            process::exit(1);
        }
    };

    let mut emulator = Emulator::new(CoreConfig::from_env());
    if let Err(e) = emulator.load_rom(rom) {
        eprintln!("Failed to load ROM: {e}");
        process::exit(1);
    }

    for _ in 0..args.frames {
        match emulator.run_frame() {
            Ok(()) => {}
            Err(CoreError::Fatal(report)) => {
                eprintln!("{report}");
                process::exit(1);
            }
            Err(e) => {
                eprintln!("{e}");
                process::exit(1);
            }
        }
        if emulator.is_paused() {
            log::info!("paused at ${:06X}", emulator.pc());
            break;
        }
    }

    for region in ["SYSTEM", "CPU", "PPU", "EVENTS"] {
        if let Ok(status) = emulator.status(region) {
            println!("== {region} ==\n{status}");
        }
    }

    if let Some(path) = args.capture {
        let capture: FrameCapture = emulator.capture();
        if let Err(e) = capture.save(&path) {
            eprintln!("Failed to write capture {}: {e}", path.display());
            process::exit(1);
        }
        log::info!("frame {} captured to {}", capture.frame, path.display());
    }
}

//! Debugger context owned by the frame loop: the recent instruction
//! history used for crash reports, PC breakpoints and the pause flag.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Breakpoint {
    pub address: u32,
    pub enabled: bool,
    pub hit_count: u32,
}

#[derive(Debug, Clone)]
pub struct Debugger {
    paused: bool,
    breakpoints: BTreeMap<u32, Breakpoint>,
    history: VecDeque<u32>,
    history_depth: usize,
    /// Breakpoint address to step over once after a resume.
    skip_once: Option<u32>,
    instruction_count: u64,
}

impl Default for Debugger {
    fn default() -> Self {
        Self::new(5)
    }
}

impl Debugger {
    pub fn new(history_depth: usize) -> Self {
        let history_depth = history_depth.max(1);
        Self {
            paused: false,
            breakpoints: BTreeMap::new(),
            history: VecDeque::with_capacity(history_depth),
            history_depth,
            skip_once: None,
            instruction_count: 0,
        }
    }

    /// Forgets execution history; breakpoints survive a reset.
    pub fn reset(&mut self) {
        self.history.clear();
        self.skip_once = None;
        self.instruction_count = 0;
        self.paused = false;
    }

    pub fn add_breakpoint(&mut self, address: u32) {
        self.breakpoints.insert(
            address,
            Breakpoint {
                address,
                enabled: true,
                hit_count: 0,
            },
        );
        log::info!("Breakpoint added at ${:06X}", address);
    }

    pub fn remove_breakpoint(&mut self, address: u32) {
        if self.breakpoints.remove(&address).is_some() {
            log::info!("Breakpoint removed from ${:06X}", address);
        }
    }

    pub fn toggle_breakpoint(&mut self, address: u32) {
        if let Some(bp) = self.breakpoints.get_mut(&address) {
            bp.enabled = !bp.enabled;
        }
    }

    pub fn breakpoints(&self) -> impl Iterator<Item = &Breakpoint> {
        self.breakpoints.values()
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Resumes execution; a breakpoint sitting at `pc` does not fire again
    /// until execution has moved past it.
    pub fn resume(&mut self, pc: u32) {
        self.paused = false;
        self.skip_once = Some(pc);
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Called at every instruction boundary before the fetch.
    pub fn record(&mut self, pc: u32) {
        if self.history.len() == self.history_depth {
            self.history.pop_front();
        }
        self.history.push_back(pc);
        self.instruction_count += 1;
    }

    /// Oldest first.
    pub fn history(&self) -> Vec<u32> {
        self.history.iter().copied().collect()
    }

    pub fn instruction_count(&self) -> u64 {
        self.instruction_count
    }

    /// Pauses and returns true when an enabled breakpoint sits at `pc`.
    pub fn check_breakpoint(&mut self, pc: u32) -> bool {
        if self.skip_once.take() == Some(pc) {
            return false;
        }
        match self.breakpoints.get_mut(&pc) {
            Some(bp) if bp.enabled => {
                bp.hit_count += 1;
                log::info!("Breakpoint hit at ${:06X} (hit count: {})", pc, bp.hit_count);
                self.paused = true;
                true
            }
            _ => false,
        }
    }
}

impl fmt::Display for Debugger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Paused: {}, Instructions: {}", self.paused, self.instruction_count)?;
        for bp in self.breakpoints.values() {
            write!(
                f,
                "\n  ${:06X} {} (hits: {})",
                bp.address,
                if bp.enabled { "on" } else { "off" },
                bp.hit_count
            )?;
        }
        Ok(())
    }
}

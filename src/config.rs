use serde::{Deserialize, Serialize};

/// Knobs that change how the core runs, not what it emulates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Number of executed instruction addresses kept for crash reports.
    pub history_depth: usize,
    /// Return from `run_frame` as soon as vertical blank starts.
    pub early_exit_at_vblank: bool,
    /// Power on with MEMSEL set (FastROM timing for banks $80-$FF).
    pub fast_rom_at_reset: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            history_depth: 5,
            early_exit_at_vblank: true,
            fast_rom_at_reset: false,
        }
    }
}

impl CoreConfig {
    /// Defaults overlaid with `SNES_HISTORY_DEPTH` and `SNES_NO_EARLY_EXIT`.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(depth) = std::env::var("SNES_HISTORY_DEPTH")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
        {
            cfg.history_depth = depth.max(1);
        }
        if std::env::var("SNES_NO_EARLY_EXIT")
            .map(|v| matches!(v.as_str(), "1" | "true" | "on"))
            .unwrap_or(false)
        {
            cfg.early_exit_at_vblank = false;
        }
        cfg
    }
}

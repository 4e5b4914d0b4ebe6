use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::pomodoro::{Phase, PomodoroConfig};

const ENABLE_LOGS: bool = true;

use crate::log_warn;

/// User-facing Pomodoro preferences.
///
/// The engine applies one break length per cycle: `short_break_minutes` is the
/// break and `long_break_interval` is the number of cycles before the session
/// returns to Idle. `long_break_minutes`, the auto-start flags and the alarm
/// fields are kept for the UI layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct PomodoroSettings {
    pub work_minutes: u32,
    pub short_break_minutes: u32,
    pub long_break_minutes: u32,
    pub long_break_interval: u32,
    pub auto_start_breaks: bool,
    pub auto_start_work: bool,
    pub alarm_enabled: bool,
    pub alarm_sound: String,
}

impl Default for PomodoroSettings {
    fn default() -> Self {
        Self {
            work_minutes: 25,
            short_break_minutes: 5,
            long_break_minutes: 15,
            long_break_interval: 4,
            auto_start_breaks: false,
            auto_start_work: false,
            alarm_enabled: true,
            alarm_sound: "bell".into(),
        }
    }
}

impl PomodoroSettings {
    pub fn engine_config(&self) -> PomodoroConfig {
        PomodoroConfig {
            work_minutes: self.work_minutes,
            break_minutes: self.short_break_minutes,
            total_cycles: self.long_break_interval,
        }
    }

    /// Whether the UI should call `complete_phase` on its own once the given
    /// phase expires.
    pub fn auto_advance(&self, phase: Phase) -> bool {
        match phase {
            Phase::Work => self.auto_start_breaks,
            Phase::Break => self.auto_start_work,
            Phase::Idle => false,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.long_break_interval == 0 {
            bail!("long_break_interval must be at least 1");
        }
        if self.alarm_sound.trim().is_empty() {
            bail!("alarm_sound must not be empty");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
struct UserSettings {
    pomodoro: PomodoroSettings,
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log_warn!("Ignoring malformed settings at {}: {err}", path.display());
                UserSettings::default()
            })
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, UserSettings> {
        match self.data.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, UserSettings> {
        match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn pomodoro(&self) -> PomodoroSettings {
        self.read().pomodoro.clone()
    }

    pub fn update_pomodoro(&self, settings: PomodoroSettings) -> Result<()> {
        settings.validate()?;
        let mut guard = self.write();
        let previous = std::mem::replace(&mut guard.pomodoro, settings);
        if let Err(err) = self.persist(&guard) {
            guard.pomodoro = previous;
            return Err(err);
        }
        Ok(())
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings from {}", self.path.display()))?;
        let data: UserSettings = serde_json::from_str(&contents)
            .with_context(|| format!("Malformed settings in {}", self.path.display()))?;
        *self.write() = data;
        Ok(())
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

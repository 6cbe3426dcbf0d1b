//! Injection options.
//!
//! `InjectConfig` is the on-disk form: every field may be absent and is
//! filled in by `resolve()`, which runs once at load time. Nothing on the
//! per-step path reads `InjectConfig` directly; it only sees
//! `ResolvedConfig`.
//!
//! Two serializations are supported: a JSON file (`load` / `save`) and
//! `key = value ! comment` option lines (`write_options` / `read_options`)
//! for embedding in a host input file.

use std::io::Write;

use crate::{
    error::{InjectError, InjectResult},
    snapshot_id::{SnapshotId, DEFAULT_START_SNAPSHOT},
    types::ParticleKind,
};
use serde::{Deserialize, Serialize};

/// Injection radius (cm) used when none is configured.
pub const DEFAULT_INJECTION_RADIUS_CM: f64 = 5.0e14;
/// Default cap on snapshots inspected by the start-up scan.
pub const DEFAULT_MAX_START_ADVANCES: u32 = 100;
/// Default time step (code units) handed to the host right after an injection.
pub const DEFAULT_POST_INJECTION_DT: f64 = 1.0e-6;

fn default_length_unit() -> f64 { 1.0 }
fn default_max_start_advances() -> u32 { DEFAULT_MAX_START_ADVANCES }
fn default_post_injection_dt() -> f64 { DEFAULT_POST_INJECTION_DT }

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InjectConfig {
    /// First snapshot to consider. Empty or absent means `dump_00000`.
    #[serde(default)]
    pub start_snapshot:     Option<String>,
    /// Physical injection radius in cm. Absent or zero means the default.
    #[serde(default)]
    pub injection_radius:   Option<f64>,
    /// Centimetres per code length unit.
    #[serde(default = "default_length_unit")]
    pub length_unit:        f64,
    #[serde(default = "default_max_start_advances")]
    pub max_start_advances: u32,
    #[serde(default = "default_post_injection_dt")]
    pub post_injection_dt:  f64,
    /// Immediate re-reads of a failing snapshot before giving up.
    #[serde(default)]
    pub advance_retries:    u32,
    #[serde(default)]
    pub inject_kind:        ParticleKind,
}

impl Default for InjectConfig {
    fn default() -> Self {
        Self {
            start_snapshot:     None,
            injection_radius:   None,
            length_unit:        default_length_unit(),
            max_start_advances: DEFAULT_MAX_START_ADVANCES,
            post_injection_dt:  DEFAULT_POST_INJECTION_DT,
            advance_retries:    0,
            inject_kind:        ParticleKind::Gas,
        }
    }
}

/// Validated options with defaults applied and the radius in code units.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub start_snapshot:     SnapshotId,
    /// Injection radius in code units.
    pub injection_radius:   f64,
    pub max_start_advances: u32,
    pub post_injection_dt:  f64,
    pub advance_retries:    u32,
    pub inject_kind:        ParticleKind,
}

impl InjectConfig {
    /// Load from a JSON file.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: InjectConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self, path: &str) -> InjectResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Options for tests: code units equal physical units, radius 1.
    pub fn default_test() -> Self {
        Self {
            injection_radius: Some(1.0),
            ..Self::default()
        }
    }

    /// Apply defaults for unset values and validate the rest.
    pub fn resolve(&self) -> InjectResult<ResolvedConfig> {
        let start_snapshot = match self.start_snapshot.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => SnapshotId::from(name),
            _ => SnapshotId::from(DEFAULT_START_SNAPSHOT),
        };

        let radius_cm = match self.injection_radius {
            Some(r) if !r.is_finite() || r < 0.0 => {
                return Err(InjectError::InvalidRadius { value: r });
            }
            Some(r) if r > 0.0 => r,
            _ => {
                log::debug!("injection_radius unset, using {DEFAULT_INJECTION_RADIUS_CM:e} cm");
                DEFAULT_INJECTION_RADIUS_CM
            }
        };

        if !(self.length_unit.is_finite() && self.length_unit > 0.0) {
            return Err(invalid("length_unit", self.length_unit));
        }
        if !(self.post_injection_dt.is_finite() && self.post_injection_dt > 0.0) {
            return Err(invalid("post_injection_dt", self.post_injection_dt));
        }

        Ok(ResolvedConfig {
            start_snapshot,
            injection_radius: radius_cm / self.length_unit,
            max_start_advances: self.max_start_advances,
            post_injection_dt: self.post_injection_dt,
            advance_retries: self.advance_retries,
            inject_kind: self.inject_kind,
        })
    }

    // ── Option lines ───────────────────────────────────────────

    /// Write the options block in `key = value ! comment` form.
    pub fn write_options<W: Write>(&self, out: &mut W) -> InjectResult<()> {
        writeln!(out, "# options controlling particle injection")?;
        let start = self.start_snapshot.as_deref().unwrap_or(DEFAULT_START_SNAPSHOT);
        let radius = self.injection_radius.unwrap_or(DEFAULT_INJECTION_RADIUS_CM);
        write_line(out, "start_snapshot", start, "snapshot to start the replay from")?;
        write_line(out, "injection_radius", &format!("{radius:e}"), "injection radius (cm)")?;
        write_line(out, "length_unit", &format!("{:e}", self.length_unit), "cm per code length unit")?;
        write_line(
            out,
            "max_start_advances",
            &self.max_start_advances.to_string(),
            "max snapshots to scan at start-up",
        )?;
        write_line(
            out,
            "post_injection_dt",
            &format!("{:e}", self.post_injection_dt),
            "time step right after an injection",
        )?;
        write_line(
            out,
            "advance_retries",
            &self.advance_retries.to_string(),
            "re-reads of a failing snapshot",
        )?;
        write_line(out, "inject_kind", self.inject_kind.name(), "particle type to inject")?;
        Ok(())
    }

    /// Read an options block. Blank lines and `#` comments are skipped,
    /// `!` starts a trailing comment.
    pub fn read_options(text: &str) -> InjectResult<Self> {
        let mut config = Self::default();
        for line in text.lines() {
            let line = line.split('!').next().unwrap_or_default().trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(InjectError::InvalidOption {
                    key:   line.to_string(),
                    value: String::new(),
                });
            };
            config.set_option(key.trim(), value.trim())?;
        }
        Ok(config)
    }

    /// Set one option by name.
    pub fn set_option(&mut self, key: &str, value: &str) -> InjectResult<()> {
        let bad = || InjectError::InvalidOption {
            key:   key.to_string(),
            value: value.to_string(),
        };
        match key {
            "start_snapshot" => {
                let name = value.trim_matches(|c: char| c == '\'' || c == '"');
                self.start_snapshot = Some(name.to_string());
            }
            "injection_radius" => {
                self.injection_radius = Some(value.parse().map_err(|_| bad())?);
            }
            "length_unit" => self.length_unit = value.parse().map_err(|_| bad())?,
            "max_start_advances" => self.max_start_advances = value.parse().map_err(|_| bad())?,
            "post_injection_dt" => self.post_injection_dt = value.parse().map_err(|_| bad())?,
            "advance_retries" => self.advance_retries = value.parse().map_err(|_| bad())?,
            "inject_kind" => self.inject_kind = ParticleKind::from_name(value).ok_or_else(bad)?,
            _ => return Err(InjectError::UnknownOption { key: key.to_string() }),
        }
        Ok(())
    }
}

fn write_line<W: Write>(out: &mut W, key: &str, value: &str, comment: &str) -> InjectResult<()> {
    writeln!(out, "{key:>20} = {value:<16} ! {comment}")?;
    Ok(())
}

fn invalid(key: &str, value: f64) -> InjectError {
    InjectError::InvalidOption {
        key:   key.to_string(),
        value: value.to_string(),
    }
}

//! Human-readable and JSON reports of the synchronized output state.

use std::fmt::Write as _;

use serde::Serialize;

use crate::{
    changes::ADAPTIVE_SYNC_SINCE,
    error::WlRandrError,
    mirror::OutputMirror,
    wl_head::{Handle, WlAdaptiveSync, WlHead, WlPhysicalSize, WlPosition},
};

/// First protocol version that announces make, model and serial number
const IDENTITY_SINCE: u32 = 2;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ModeReport {
    pub width: i32,
    pub height: i32,
    /// Refresh rate in Hz
    pub refresh: f64,
    pub preferred: bool,
    pub current: bool,
}

/// State that only means something while a head is enabled
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EnabledReport {
    pub position: PositionReport,
    pub transform: &'static str,
    pub scale: f64,
    /// `None` when the protocol version cannot report it
    pub adaptive_sync: Option<bool>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct PositionReport {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct SizeReport {
    pub width: i32,
    pub height: i32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HeadReport {
    pub name: String,
    pub description: String,
    pub make: Option<String>,
    pub model: Option<String>,
    pub serial: Option<String>,
    pub physical_size: SizeReport,
    pub enabled: bool,
    pub modes: Vec<ModeReport>,
    #[serde(flatten)]
    pub state: Option<EnabledReport>,
}

impl From<WlPosition> for PositionReport {
    fn from(position: WlPosition) -> Self {
        Self {
            x: position.x,
            y: position.y,
        }
    }
}

impl From<WlPhysicalSize> for SizeReport {
    fn from(size: WlPhysicalSize) -> Self {
        Self {
            width: size.width,
            height: size.height,
        }
    }
}

impl HeadReport {
    pub fn from_head<H, M: Handle>(head: &WlHead<H, M>, version: u32) -> Self {
        let modes = head
            .modes
            .values()
            .map(|mode| ModeReport {
                width: mode.resolution.width,
                height: mode.resolution.height,
                refresh: f64::from(mode.refresh) / 1000.0,
                preferred: mode.preferred,
                current: head.is_current(mode),
            })
            .collect();
        let state = head.enabled.then(|| EnabledReport {
            position: head.position.into(),
            transform: head.transform.name(),
            scale: head.scale,
            adaptive_sync: (version >= ADAPTIVE_SYNC_SINCE)
                .then_some(head.adaptive_sync == WlAdaptiveSync::Enabled),
        });

        Self {
            name: head.name.clone(),
            description: head.description.clone(),
            make: head.make.clone(),
            model: head.model.clone(),
            serial: head.serial_number.clone(),
            physical_size: head.physical_size.into(),
            enabled: head.enabled,
            modes,
            state,
        }
    }
}

pub fn collect<H: Handle, M: Handle>(
    mirror: &OutputMirror<H, M>,
    version: u32,
) -> Vec<HeadReport> {
    mirror
        .heads()
        .map(|head| HeadReport::from_head(head, version))
        .collect()
}

pub fn to_json(reports: &[HeadReport]) -> Result<String, WlRandrError> {
    Ok(serde_json::to_string_pretty(reports)?)
}

pub fn to_text(reports: &[HeadReport], version: u32) -> String {
    let mut out = String::new();
    for head in reports {
        // Writing into a String cannot fail.
        let _ = write_head(&mut out, head, version);
    }
    out
}

fn write_head(
    out: &mut String,
    head: &HeadReport,
    version: u32,
) -> std::fmt::Result {
    writeln!(out, "{} \"{}\"", head.name, head.description)?;

    if version >= IDENTITY_SINCE {
        let unset = |field: &Option<String>| field.clone().unwrap_or_default();
        writeln!(out, "  Make: {}", unset(&head.make))?;
        writeln!(out, "  Model: {}", unset(&head.model))?;
        writeln!(out, "  Serial: {}", unset(&head.serial))?;
    }

    let size = head.physical_size;
    if size.width > 0 && size.height > 0 {
        writeln!(out, "  Physical size: {}x{} mm", size.width, size.height)?;
    }

    writeln!(
        out,
        "  Enabled: {}",
        if head.enabled { "yes" } else { "no" }
    )?;

    if !head.modes.is_empty() {
        writeln!(out, "  Modes:")?;
        for mode in &head.modes {
            write!(out, "    {}x{} px", mode.width, mode.height)?;
            if mode.refresh > 0.0 {
                write!(out, ", {:.6} Hz", mode.refresh)?;
            }
            match (mode.preferred, mode.current) {
                (true, true) => write!(out, " (preferred, current)")?,
                (true, false) => write!(out, " (preferred)")?,
                (false, true) => write!(out, " (current)")?,
                (false, false) => {}
            }
            writeln!(out)?;
        }
    }

    let Some(state) = &head.state else {
        return Ok(());
    };
    writeln!(out, "  Position: {},{}", state.position.x, state.position.y)?;
    writeln!(out, "  Transform: {}", state.transform)?;
    writeln!(out, "  Scale: {:.6}", state.scale)?;
    if let Some(adaptive_sync) = state.adaptive_sync {
        writeln!(
            out,
            "  Adaptive Sync: {}",
            if adaptive_sync { "enabled" } else { "disabled" }
        )?;
    }
    Ok(())
}

use tracing::debug;

use crate::{
    error::ValidationError,
    mirror::OutputMirror,
    wl_head::{ChangeMask, CustomMode, Handle, WlAdaptiveSync, WlHead, WlTransform},
};

/// First protocol version that can carry adaptive sync state
pub const ADAPTIVE_SYNC_SINCE: u32 = 4;

/// A parsed `<W>x<H>[@<R>Hz]` mode specification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeSpec {
    pub width: i32,
    pub height: i32,
    /// Refresh rate in mHz, zero when not given
    pub refresh: i32,
}

/// A single per-output directive from the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    On,
    Off,
    Toggle,
    Mode(String),
    CustomMode(String),
    Preferred,
    Position(String),
    Transform(String),
    Scale(String),
    AdaptiveSync(String),
}

impl Directive {
    /// Command-line spelling, without the leading dashes
    pub fn flag(&self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Off => "off",
            Self::Toggle => "toggle",
            Self::Mode(_) => "mode",
            Self::CustomMode(_) => "custom-mode",
            Self::Preferred => "preferred",
            Self::Position(_) => "pos",
            Self::Transform(_) => "transform",
            Self::Scale(_) => "scale",
            Self::AdaptiveSync(_) => "adaptive-sync",
        }
    }
}

/// A directive addressed to a named output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDirective {
    pub output: String,
    pub directive: Directive,
}

/// Splits a leading decimal integer (optional sign) off `s`.
fn split_int(s: &str) -> Option<(i32, &str)> {
    let sign_len = usize::from(s.starts_with(['+', '-']));
    let digits = s[sign_len..]
        .bytes()
        .take_while(u8::is_ascii_digit)
        .count();
    if digits == 0 {
        return None;
    }
    let (number, rest) = s.split_at(sign_len + digits);
    number.parse().ok().map(|n| (n, rest))
}

/// Splits a leading unsigned decimal number such as `59.94` off `s`.
fn split_decimal(s: &str) -> Option<(f64, &str)> {
    let len = s
        .bytes()
        .take_while(|b| b.is_ascii_digit() || *b == b'.')
        .count();
    let (number, rest) = s.split_at(len);
    number.parse().ok().map(|n| (n, rest))
}

/// Parses `<W>x<H>`, optionally followed by ` px` and a refresh rate
/// introduced by `@` or `,` (e.g. `1920x1080@59.94Hz`).
pub fn parse_mode(value: &str) -> Result<ModeSpec, ValidationError> {
    let invalid = |reason| ValidationError::InvalidMode {
        reason,
        value: value.to_string(),
    };

    let (width, rest) = split_int(value)
        .filter(|(_, rest)| rest.starts_with('x'))
        .ok_or_else(|| invalid("invalid width"))?;
    let (height, rest) =
        split_int(&rest[1..]).ok_or_else(|| invalid("invalid height"))?;

    let rest = rest.trim_start_matches(' ');
    let rest = rest.strip_prefix("px").unwrap_or(rest);
    if rest.is_empty() {
        return Ok(ModeSpec {
            width,
            height,
            refresh: 0,
        });
    }

    let rest = rest
        .strip_prefix(['@', ','])
        .ok_or_else(|| invalid("expected refresh rate"))?
        .trim_start_matches(' ');
    let refresh_hz = split_decimal(rest)
        .filter(|(hz, suffix)| *hz > 0.0 && (suffix.is_empty() || *suffix == "Hz"))
        .map(|(hz, _)| hz)
        .ok_or_else(|| invalid("invalid refresh rate"))?;

    Ok(ModeSpec {
        width,
        height,
        refresh: (refresh_hz * 1000.0).round() as i32,
    })
}

/// Parses `<x>,<y>`.
pub fn parse_position(value: &str) -> Result<(i32, i32), ValidationError> {
    let invalid = || ValidationError::InvalidPosition(value.to_string());
    let (x, rest) = split_int(value).ok_or_else(invalid)?;
    let rest = rest.strip_prefix(',').ok_or_else(invalid)?;
    let (y, rest) = split_int(rest).ok_or_else(invalid)?;
    if !rest.is_empty() {
        return Err(invalid());
    }
    Ok((x, y))
}

pub fn parse_transform(value: &str) -> Result<WlTransform, ValidationError> {
    WlTransform::from_name(value)
        .ok_or_else(|| ValidationError::InvalidTransform(value.to_string()))
}

pub fn parse_scale(value: &str) -> Result<f64, ValidationError> {
    value
        .parse()
        .map_err(|_| ValidationError::InvalidScale(value.to_string()))
}

pub fn parse_adaptive_sync(
    value: &str,
) -> Result<WlAdaptiveSync, ValidationError> {
    match value {
        "enabled" => Ok(WlAdaptiveSync::Enabled),
        "disabled" => Ok(WlAdaptiveSync::Disabled),
        _ => Err(ValidationError::InvalidAdaptiveSync(value.to_string())),
    }
}

/// Picks a mode for a head about to be enabled without an explicit one:
/// the preferred mode, else the first announced mode. A head that already
/// has a mode or a custom mode is left alone.
pub fn fixup_disabled_head<H, M: Handle>(head: &mut WlHead<H, M>) {
    if head.current_mode.is_some() || !head.custom_mode.is_unset() {
        return;
    }
    let picked = head
        .preferred_mode()
        .or_else(|| head.first_mode())
        .map(|m| m.handle.clone());
    if let Some(mode) = picked {
        head.current_mode = Some(mode);
        head.changed.insert(ChangeMask::MODE);
    }
}

fn select_mode<H, M: Handle>(head: &mut WlHead<H, M>, mode: M) {
    head.changed.insert(ChangeMask::MODE);
    head.current_mode = Some(mode);
    head.custom_mode = CustomMode::default();
}

/// Applies one directive to `head`. On error the head is left untouched.
///
/// `version` is the negotiated output manager version.
pub fn apply_directive<H, M: Handle>(
    head: &mut WlHead<H, M>,
    directive: &Directive,
    version: u32,
) -> Result<(), ValidationError> {
    match directive {
        Directive::On => {
            if !head.enabled {
                fixup_disabled_head(head);
            }
            head.enabled = true;
        }
        Directive::Off => head.enabled = false,
        Directive::Toggle => {
            if head.enabled {
                head.enabled = false;
            } else {
                fixup_disabled_head(head);
                head.enabled = true;
            }
        }
        Directive::Mode(value) => {
            let spec = parse_mode(value)?;
            let mode = head
                .modes
                .values()
                .find(|m| {
                    m.resolution.width == spec.width
                        && m.resolution.height == spec.height
                        && (spec.refresh == 0 || m.refresh == spec.refresh)
                })
                .map(|m| m.handle.clone())
                .ok_or_else(|| ValidationError::UnknownMode(value.clone()))?;
            select_mode(head, mode);
        }
        Directive::Preferred => {
            let mode = head
                .preferred_mode()
                .map(|m| m.handle.clone())
                .ok_or(ValidationError::NoPreferredMode)?;
            select_mode(head, mode);
        }
        Directive::CustomMode(value) => {
            let spec = parse_mode(value)?;
            head.changed.insert(ChangeMask::MODE);
            head.current_mode = None;
            head.custom_mode = CustomMode {
                width: spec.width,
                height: spec.height,
                refresh: spec.refresh,
            };
        }
        Directive::Position(value) => {
            let (x, y) = parse_position(value)?;
            head.changed.insert(ChangeMask::POSITION);
            head.position.x = x;
            head.position.y = y;
        }
        Directive::Transform(value) => {
            head.transform = parse_transform(value)?;
            head.changed.insert(ChangeMask::TRANSFORM);
        }
        Directive::Scale(value) => {
            head.scale = parse_scale(value)?;
            head.changed.insert(ChangeMask::SCALE);
        }
        Directive::AdaptiveSync(value) => {
            if version < ADAPTIVE_SYNC_SINCE {
                return Err(ValidationError::AdaptiveSyncUnsupported);
            }
            head.adaptive_sync = parse_adaptive_sync(value)?;
            head.changed.insert(ChangeMask::ADAPTIVE_SYNC);
        }
    }
    Ok(())
}

/// Applies directives in order, stopping at the first invalid one.
///
/// Heads touched by directives before the failing one keep their new
/// values; nothing is rolled back.
pub fn apply_directives<H: Handle, M: Handle>(
    mirror: &mut OutputMirror<H, M>,
    directives: &[OutputDirective],
    version: u32,
) -> Result<(), ValidationError> {
    for OutputDirective { output, directive } in directives {
        let head = mirror
            .head_by_name_mut(output)
            .ok_or_else(|| ValidationError::UnknownOutput(output.clone()))?;
        apply_directive(head, directive, version)?;
        debug!(output = %output, directive = directive.flag(), "directive applied");
    }
    Ok(())
}

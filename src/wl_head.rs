use wayland_client::{WEnum, protocol::wl_output::Transform};
use wayland_protocols_wlr::output_management::v1::client::zwlr_output_head_v1::AdaptiveSyncState;

use crate::arena::OrderedArena;

/// Opaque, server-issued object identity. Protocol proxies satisfy this in
/// production; tests use plain integers.
pub trait Handle: Clone + Eq + std::hash::Hash + std::fmt::Debug {}

impl<T: Clone + Eq + std::hash::Hash + std::fmt::Debug> Handle for T {}

/// Output transform (rotation/flip)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WlTransform {
    #[default]
    Normal,
    Rotate90,
    Rotate180,
    Rotate270,
    Flipped,
    Flipped90,
    Flipped180,
    Flipped270,
}

impl WlTransform {
    /// All transforms, in wire order.
    pub const ALL: [WlTransform; 8] = [
        Self::Normal,
        Self::Rotate90,
        Self::Rotate180,
        Self::Rotate270,
        Self::Flipped,
        Self::Flipped90,
        Self::Flipped180,
        Self::Flipped270,
    ];

    pub(crate) fn from_wayland(t: WEnum<Transform>) -> Self {
        match t {
            WEnum::Value(Transform::Normal) => Self::Normal,
            WEnum::Value(Transform::_90) => Self::Rotate90,
            WEnum::Value(Transform::_180) => Self::Rotate180,
            WEnum::Value(Transform::_270) => Self::Rotate270,
            WEnum::Value(Transform::Flipped) => Self::Flipped,
            WEnum::Value(Transform::Flipped90) => Self::Flipped90,
            WEnum::Value(Transform::Flipped180) => Self::Flipped180,
            WEnum::Value(Transform::Flipped270) => Self::Flipped270,
            _ => Self::Normal,
        }
    }

    pub(crate) fn to_wayland(self) -> Transform {
        match self {
            Self::Normal => Transform::Normal,
            Self::Rotate90 => Transform::_90,
            Self::Rotate180 => Transform::_180,
            Self::Rotate270 => Transform::_270,
            Self::Flipped => Transform::Flipped,
            Self::Flipped90 => Transform::Flipped90,
            Self::Flipped180 => Transform::Flipped180,
            Self::Flipped270 => Transform::Flipped270,
        }
    }

    /// Command-line and report name of the transform
    pub fn name(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Rotate90 => "90",
            Self::Rotate180 => "180",
            Self::Rotate270 => "270",
            Self::Flipped => "flipped",
            Self::Flipped90 => "flipped-90",
            Self::Flipped180 => "flipped-180",
            Self::Flipped270 => "flipped-270",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }
}

/// Variable refresh rate state of a head
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WlAdaptiveSync {
    #[default]
    Disabled,
    Enabled,
}

impl WlAdaptiveSync {
    pub(crate) fn from_wayland(state: WEnum<AdaptiveSyncState>) -> Self {
        match state {
            WEnum::Value(AdaptiveSyncState::Enabled) => Self::Enabled,
            _ => Self::Disabled,
        }
    }

    pub(crate) fn to_wayland(self) -> AdaptiveSyncState {
        match self {
            Self::Disabled => AdaptiveSyncState::Disabled,
            Self::Enabled => AdaptiveSyncState::Enabled,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Enabled => "enabled",
        }
    }
}

/// Represents the resolution of a mode
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub struct WlResolution {
    /// Width in pixels
    pub width: i32,
    /// Height in pixels
    pub height: i32,
}

/// Represents the position of a head in the global coordinate space
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub struct WlPosition {
    pub x: i32,
    pub y: i32,
}

/// Physical dimensions in millimeters, zero when unknown
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub struct WlPhysicalSize {
    pub width: i32,
    pub height: i32,
}

/// A mode the compositor has not enumerated. All zero means unset.
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub struct CustomMode {
    pub width: i32,
    pub height: i32,
    /// Refresh rate in mHz, zero when unknown
    pub refresh: i32,
}

impl CustomMode {
    pub fn is_unset(&self) -> bool {
        self.width == 0 && self.height == 0 && self.refresh == 0
    }
}

/// Fields of a head explicitly changed by the current invocation
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChangeMask(u8);

impl ChangeMask {
    pub const MODE: ChangeMask = ChangeMask(1 << 0);
    pub const POSITION: ChangeMask = ChangeMask(1 << 1);
    pub const TRANSFORM: ChangeMask = ChangeMask(1 << 2);
    pub const SCALE: ChangeMask = ChangeMask(1 << 3);
    pub const ADAPTIVE_SYNC: ChangeMask = ChangeMask(1 << 4);

    pub const fn empty() -> Self {
        ChangeMask(0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, other: ChangeMask) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: ChangeMask) {
        self.0 |= other.0;
    }
}

/// A display mode (resolution + refresh rate) owned by one head
#[derive(Clone, Debug)]
pub struct WlHeadMode<M> {
    /// Server-issued handle of this mode
    pub handle: M,
    pub resolution: WlResolution,
    /// Refresh rate in mHz, zero when unknown
    pub refresh: i32,
    /// Whether the compositor marked this mode as preferred
    pub preferred: bool,
}

impl<M> WlHeadMode<M> {
    pub(crate) fn new(handle: M) -> Self {
        Self {
            handle,
            resolution: WlResolution::default(),
            refresh: 0,
            preferred: false,
        }
    }
}

/// A display output known to the compositor
#[derive(Clone, Debug)]
pub struct WlHead<H, M> {
    /// Server-issued handle of this head
    pub handle: H,
    /// Head name (e.g., "DP-1", "HDMI-A-1")
    pub name: String,
    /// Human-readable description of the head
    pub description: String,
    /// Manufacturer name, if announced
    pub make: Option<String>,
    /// Model name, if announced
    pub model: Option<String>,
    /// Serial number, if announced
    pub serial_number: Option<String>,
    pub physical_size: WlPhysicalSize,
    pub enabled: bool,
    /// Handle of the active mode. Always a key of `modes` when set.
    pub current_mode: Option<M>,
    pub custom_mode: CustomMode,
    pub position: WlPosition,
    pub transform: WlTransform,
    pub scale: f64,
    pub adaptive_sync: WlAdaptiveSync,
    /// Fields changed by directives since the last synchronization
    pub changed: ChangeMask,
    pub modes: OrderedArena<M, WlHeadMode<M>>,
}

impl<H, M: Handle> WlHead<H, M> {
    pub(crate) fn new(handle: H) -> Self {
        Self {
            handle,
            name: String::new(),
            description: String::new(),
            make: None,
            model: None,
            serial_number: None,
            physical_size: WlPhysicalSize::default(),
            enabled: false,
            current_mode: None,
            custom_mode: CustomMode::default(),
            position: WlPosition::default(),
            transform: WlTransform::Normal,
            scale: 1.0,
            adaptive_sync: WlAdaptiveSync::Disabled,
            changed: ChangeMask::empty(),
            modes: OrderedArena::new(),
        }
    }

    /// The active mode, resolved against this head's own modes
    pub fn current(&self) -> Option<&WlHeadMode<M>> {
        self.current_mode.as_ref().and_then(|m| self.modes.get(m))
    }

    pub fn is_current(&self, mode: &WlHeadMode<M>) -> bool {
        self.current_mode.as_ref() == Some(&mode.handle)
    }

    pub fn preferred_mode(&self) -> Option<&WlHeadMode<M>> {
        self.modes.values().find(|m| m.preferred)
    }

    pub fn first_mode(&self) -> Option<&WlHeadMode<M>> {
        self.modes.values().next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transform_names_round_trip_through_lookup() {
        for transform in WlTransform::ALL {
            assert_eq!(WlTransform::from_name(transform.name()), Some(transform));
        }
        assert_eq!(WlTransform::from_name("flipped-45"), None);
        assert_eq!(WlTransform::from_name("Normal"), None);
    }

    #[test]
    fn unknown_wire_transform_falls_back_to_normal() {
        assert_eq!(
            WlTransform::from_wayland(WEnum::Unknown(42)),
            WlTransform::Normal
        );
        assert_eq!(
            WlTransform::from_wayland(WEnum::Value(Transform::Flipped270)),
            WlTransform::Flipped270
        );
    }

    #[test]
    fn change_mask_tracks_fields_independently() {
        let mut mask = ChangeMask::empty();
        assert!(mask.is_empty());

        mask.insert(ChangeMask::SCALE);
        assert!(mask.contains(ChangeMask::SCALE));
        assert!(!mask.contains(ChangeMask::MODE));
        assert!(!mask.contains(ChangeMask::POSITION));

        mask.insert(ChangeMask::POSITION);
        assert!(mask.contains(ChangeMask::POSITION));
        assert!(mask.contains(ChangeMask::SCALE));
    }

    #[test]
    fn new_head_defaults() {
        let head: WlHead<u32, u32> = WlHead::new(1);
        assert_eq!(head.scale, 1.0);
        assert!(!head.enabled);
        assert!(head.modes.is_empty());
        assert!(head.current().is_none());
        assert!(head.custom_mode.is_unset());
        assert!(head.changed.is_empty());
    }
}

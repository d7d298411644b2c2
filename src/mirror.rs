use std::collections::HashMap;

use tracing::{debug, warn};

use crate::{
    arena::OrderedArena,
    wl_head::{
        Handle, WlAdaptiveSync, WlHead, WlHeadMode, WlPhysicalSize,
        WlPosition, WlResolution, WlTransform,
    },
};

/// Inbound updates from the output manager, its heads and their modes
#[derive(Debug, Clone, PartialEq)]
pub enum MirrorEvent<H, M> {
    HeadAdded { head: H },
    HeadFinished { head: H },
    Name { head: H, name: String },
    Description { head: H, description: String },
    PhysicalSize { head: H, width: i32, height: i32 },
    ModeAdded { head: H, mode: M },
    Enabled { head: H, enabled: bool },
    CurrentMode { head: H, mode: M },
    Position { head: H, x: i32, y: i32 },
    Transform { head: H, transform: WlTransform },
    Scale { head: H, scale: f64 },
    Make { head: H, make: String },
    Model { head: H, model: String },
    SerialNumber { head: H, serial_number: String },
    AdaptiveSync { head: H, state: WlAdaptiveSync },
    ModeSize { mode: M, width: i32, height: i32 },
    ModeRefresh { mode: M, refresh: i32 },
    ModePreferred { mode: M },
    ModeFinished { mode: M },
    Done { serial: u32 },
    ManagerFinished,
}

/// Local mirror of the heads and modes announced by the compositor
///
/// Entries are created and destroyed only by inbound events. Readers should
/// wait for [`OutputMirror::is_synchronized`] before trusting the contents.
#[derive(Debug)]
pub struct OutputMirror<H, M> {
    heads: OrderedArena<H, WlHead<H, M>>,
    mode_owner: HashMap<M, H>,
    serial: Option<u32>,
    synchronized: bool,
    finished: bool,
}

impl<H, M> Default for OutputMirror<H, M> {
    fn default() -> Self {
        Self {
            heads: OrderedArena::default(),
            mode_owner: HashMap::new(),
            serial: None,
            synchronized: false,
            finished: false,
        }
    }
}

impl<H: Handle, M: Handle> OutputMirror<H, M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serial carried by the latest synchronization marker
    pub fn serial(&self) -> Option<u32> {
        self.serial
    }

    pub fn is_synchronized(&self) -> bool {
        self.synchronized
    }

    /// Whether the compositor has stopped sending updates
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Heads in announcement order
    pub fn heads(&self) -> impl Iterator<Item = &WlHead<H, M>> {
        self.heads.values()
    }

    pub fn heads_mut(&mut self) -> impl Iterator<Item = &mut WlHead<H, M>> {
        self.heads.values_mut()
    }

    pub fn head(&self, handle: &H) -> Option<&WlHead<H, M>> {
        self.heads.get(handle)
    }

    pub fn head_by_name(&self, name: &str) -> Option<&WlHead<H, M>> {
        self.heads.values().find(|h| h.name == name)
    }

    pub fn head_by_name_mut(
        &mut self,
        name: &str,
    ) -> Option<&mut WlHead<H, M>> {
        self.heads.values_mut().find(|h| h.name == name)
    }

    pub fn len(&self) -> usize {
        self.heads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heads.is_empty()
    }

    /// Applies one inbound update.
    pub fn apply(&mut self, event: MirrorEvent<H, M>) {
        match event {
            MirrorEvent::HeadAdded { head } => {
                debug!(?head, "head announced");
                if self
                    .heads
                    .insert(head.clone(), WlHead::new(head.clone()))
                    .is_some()
                {
                    warn!(?head, "head announced twice, previous state dropped");
                    self.mode_owner.retain(|_, owner| *owner != head);
                }
            }
            MirrorEvent::HeadFinished { head } => {
                if let Some(removed) = self.heads.remove(&head) {
                    debug!(
                        ?head,
                        name = %removed.name,
                        modes = removed.modes.len(),
                        "head finished"
                    );
                    self.mode_owner.retain(|_, owner| *owner != head);
                }
            }
            MirrorEvent::ModeAdded { head, mode } => {
                let Some(entry) = self.heads.get_mut(&head) else {
                    debug!(?head, ?mode, "mode announced for unknown head");
                    return;
                };
                entry.modes.insert(mode.clone(), WlHeadMode::new(mode.clone()));
                self.mode_owner.insert(mode, head);
            }
            MirrorEvent::ModeFinished { mode } => {
                let Some(owner) = self.mode_owner.remove(&mode) else {
                    return;
                };
                if let Some(head) = self.heads.get_mut(&owner) {
                    head.modes.remove(&mode);
                    if head.current_mode.as_ref() == Some(&mode) {
                        head.current_mode = None;
                    }
                }
                debug!(?mode, "mode finished");
            }
            MirrorEvent::ModeSize {
                mode,
                width,
                height,
            } => {
                if let Some(entry) = self.mode_mut(&mode) {
                    entry.resolution = WlResolution { width, height };
                }
            }
            MirrorEvent::ModeRefresh { mode, refresh } => {
                if let Some(entry) = self.mode_mut(&mode) {
                    entry.refresh = refresh;
                }
            }
            MirrorEvent::ModePreferred { mode } => {
                if let Some(entry) = self.mode_mut(&mode) {
                    entry.preferred = true;
                }
            }
            MirrorEvent::Done { serial } => {
                debug!(serial, heads = self.heads.len(), "synchronized");
                self.serial = Some(serial);
                self.synchronized = true;
            }
            MirrorEvent::ManagerFinished => {
                debug!("output manager finished");
                self.finished = true;
            }
            event => self.apply_head_field(event),
        }
    }

    fn apply_head_field(&mut self, event: MirrorEvent<H, M>) {
        let handle = match &event {
            MirrorEvent::Name { head, .. }
            | MirrorEvent::Description { head, .. }
            | MirrorEvent::PhysicalSize { head, .. }
            | MirrorEvent::Enabled { head, .. }
            | MirrorEvent::CurrentMode { head, .. }
            | MirrorEvent::Position { head, .. }
            | MirrorEvent::Transform { head, .. }
            | MirrorEvent::Scale { head, .. }
            | MirrorEvent::Make { head, .. }
            | MirrorEvent::Model { head, .. }
            | MirrorEvent::SerialNumber { head, .. }
            | MirrorEvent::AdaptiveSync { head, .. } => head.clone(),
            _ => return,
        };
        let Some(head) = self.heads.get_mut(&handle) else {
            debug!(head = ?handle, "update for unknown head");
            return;
        };

        match event {
            MirrorEvent::Name { name, .. } => head.name = name,
            MirrorEvent::Description { description, .. } => {
                head.description = description;
            }
            MirrorEvent::PhysicalSize { width, height, .. } => {
                head.physical_size = WlPhysicalSize { width, height };
            }
            MirrorEvent::Enabled { enabled, .. } => {
                head.enabled = enabled;
                if !enabled {
                    head.current_mode = None;
                }
            }
            MirrorEvent::CurrentMode { mode, .. } => {
                if head.modes.contains_key(&mode) {
                    head.current_mode = Some(mode);
                } else {
                    warn!(
                        head = %head.name,
                        ?mode,
                        "received unknown current mode"
                    );
                    head.current_mode = None;
                }
            }
            MirrorEvent::Position { x, y, .. } => {
                head.position = WlPosition { x, y };
            }
            MirrorEvent::Transform { transform, .. } => {
                head.transform = transform;
            }
            MirrorEvent::Scale { scale, .. } => head.scale = scale,
            MirrorEvent::Make { make, .. } => head.make = Some(make),
            MirrorEvent::Model { model, .. } => head.model = Some(model),
            MirrorEvent::SerialNumber { serial_number, .. } => {
                head.serial_number = Some(serial_number);
            }
            MirrorEvent::AdaptiveSync { state, .. } => {
                head.adaptive_sync = state;
            }
            _ => {}
        }
    }

    fn mode_mut(&mut self, mode: &M) -> Option<&mut WlHeadMode<M>> {
        let owner = self.mode_owner.get(mode)?;
        self.heads.get_mut(owner)?.modes.get_mut(mode)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) type TestMirror = OutputMirror<u32, u32>;

    /// Announces a head with the given modes `(handle, width, height, refresh, preferred)`.
    pub(crate) fn announce_head(
        mirror: &mut TestMirror,
        head: u32,
        name: &str,
        modes: &[(u32, i32, i32, i32, bool)],
    ) {
        mirror.apply(MirrorEvent::HeadAdded { head });
        mirror.apply(MirrorEvent::Name {
            head,
            name: name.to_string(),
        });
        for &(mode, width, height, refresh, preferred) in modes {
            mirror.apply(MirrorEvent::ModeAdded { head, mode });
            mirror.apply(MirrorEvent::ModeSize {
                mode,
                width,
                height,
            });
            mirror.apply(MirrorEvent::ModeRefresh { mode, refresh });
            if preferred {
                mirror.apply(MirrorEvent::ModePreferred { mode });
            }
        }
    }

    fn assert_current_modes_owned(mirror: &TestMirror) {
        for head in mirror.heads() {
            if let Some(mode) = &head.current_mode {
                assert!(
                    head.modes.contains_key(mode),
                    "head {} points at foreign mode {mode}",
                    head.name
                );
            }
        }
    }

    #[test]
    fn head_announcement_uses_defaults_and_keeps_order() {
        let mut mirror = TestMirror::new();
        mirror.apply(MirrorEvent::HeadAdded { head: 7 });
        mirror.apply(MirrorEvent::HeadAdded { head: 3 });

        let handles: Vec<_> = mirror.heads().map(|h| h.handle).collect();
        assert_eq!(handles, vec![7, 3]);
        let head = mirror.head(&7).unwrap();
        assert_eq!(head.scale, 1.0);
        assert!(head.modes.is_empty());
        assert!(!mirror.is_synchronized());
        assert_eq!(mirror.serial(), None);
    }

    #[test]
    fn field_updates_overwrite_unconditionally() {
        let mut mirror = TestMirror::new();
        announce_head(&mut mirror, 1, "DP-1", &[]);
        mirror.apply(MirrorEvent::Position { head: 1, x: 10, y: 20 });
        mirror.apply(MirrorEvent::Position { head: 1, x: -5, y: 0 });
        mirror.apply(MirrorEvent::Scale { head: 1, scale: 1.5 });
        mirror.apply(MirrorEvent::Transform {
            head: 1,
            transform: WlTransform::Rotate90,
        });
        mirror.apply(MirrorEvent::Make {
            head: 1,
            make: "Dell".into(),
        });
        mirror.apply(MirrorEvent::PhysicalSize {
            head: 1,
            width: 600,
            height: 340,
        });
        mirror.apply(MirrorEvent::AdaptiveSync {
            head: 1,
            state: WlAdaptiveSync::Enabled,
        });

        let head = mirror.head_by_name("DP-1").unwrap();
        assert_eq!(head.position, WlPosition { x: -5, y: 0 });
        assert_eq!(head.scale, 1.5);
        assert_eq!(head.transform, WlTransform::Rotate90);
        assert_eq!(head.make.as_deref(), Some("Dell"));
        assert_eq!(head.model, None);
        assert_eq!(head.physical_size.width, 600);
        assert_eq!(head.adaptive_sync, WlAdaptiveSync::Enabled);
    }

    #[test]
    fn current_mode_resolves_against_own_modes() {
        let mut mirror = TestMirror::new();
        announce_head(&mut mirror, 1, "DP-1", &[(10, 1920, 1080, 60000, true)]);
        announce_head(&mut mirror, 2, "HDMI-A-1", &[(20, 1280, 720, 60000, false)]);

        mirror.apply(MirrorEvent::CurrentMode { head: 1, mode: 10 });
        assert_eq!(mirror.head(&1).unwrap().current_mode, Some(10));

        // A mode belonging to another head is never adopted.
        mirror.apply(MirrorEvent::CurrentMode { head: 1, mode: 20 });
        assert_eq!(mirror.head(&1).unwrap().current_mode, None);

        mirror.apply(MirrorEvent::CurrentMode { head: 2, mode: 99 });
        assert_eq!(mirror.head(&2).unwrap().current_mode, None);
        assert_current_modes_owned(&mirror);
    }

    #[test]
    fn disabling_clears_current_mode() {
        let mut mirror = TestMirror::new();
        announce_head(&mut mirror, 1, "DP-1", &[(10, 1920, 1080, 60000, true)]);
        mirror.apply(MirrorEvent::Enabled { head: 1, enabled: true });
        mirror.apply(MirrorEvent::CurrentMode { head: 1, mode: 10 });
        mirror.apply(MirrorEvent::Enabled { head: 1, enabled: false });

        let head = mirror.head(&1).unwrap();
        assert!(!head.enabled);
        assert_eq!(head.current_mode, None);
    }

    #[test]
    fn mode_removal_clears_dangling_current_mode() {
        let mut mirror = TestMirror::new();
        announce_head(
            &mut mirror,
            1,
            "DP-1",
            &[(10, 1920, 1080, 60000, true), (11, 1280, 720, 60000, false)],
        );
        mirror.apply(MirrorEvent::CurrentMode { head: 1, mode: 10 });
        mirror.apply(MirrorEvent::ModeFinished { mode: 10 });

        let head = mirror.head(&1).unwrap();
        assert_eq!(head.modes.len(), 1);
        assert_eq!(head.current_mode, None);
        assert_eq!(head.first_mode().map(|m| m.handle), Some(11));

        // Updates for a finished mode are ignored.
        mirror.apply(MirrorEvent::ModeSize {
            mode: 10,
            width: 1,
            height: 1,
        });
        assert_current_modes_owned(&mirror);
    }

    #[test]
    fn head_removal_cascades_to_modes() {
        let mut mirror = TestMirror::new();
        announce_head(&mut mirror, 1, "DP-1", &[(10, 1920, 1080, 60000, true)]);
        announce_head(&mut mirror, 2, "DP-2", &[(20, 800, 600, 0, false)]);
        mirror.apply(MirrorEvent::HeadFinished { head: 1 });

        assert!(mirror.head(&1).is_none());
        assert_eq!(mirror.len(), 1);
        // Mode events for the cascaded mode no longer resolve.
        mirror.apply(MirrorEvent::ModePreferred { mode: 10 });
        mirror.apply(MirrorEvent::ModeFinished { mode: 10 });
        assert!(mirror.heads().all(|h| !h.modes.contains_key(&10)));
        assert_eq!(mirror.head(&2).unwrap().modes.len(), 1);
    }

    #[test]
    fn mode_updates_land_on_owning_head() {
        let mut mirror = TestMirror::new();
        announce_head(&mut mirror, 1, "DP-1", &[(10, 2560, 1440, 143912, false)]);
        mirror.apply(MirrorEvent::ModePreferred { mode: 10 });

        let mode = mirror.head(&1).unwrap().modes.get(&10).unwrap();
        assert_eq!(mode.resolution, WlResolution { width: 2560, height: 1440 });
        assert_eq!(mode.refresh, 143912);
        assert!(mode.preferred);
    }

    #[test]
    fn done_records_serial_and_synchronizes() {
        let mut mirror = TestMirror::new();
        announce_head(&mut mirror, 1, "DP-1", &[]);
        mirror.apply(MirrorEvent::Done { serial: 5 });
        assert!(mirror.is_synchronized());
        assert_eq!(mirror.serial(), Some(5));

        mirror.apply(MirrorEvent::Done { serial: 6 });
        assert_eq!(mirror.serial(), Some(6));
    }

    #[test]
    fn updates_for_unknown_heads_are_ignored() {
        let mut mirror = TestMirror::new();
        mirror.apply(MirrorEvent::Name {
            head: 4,
            name: "ghost".into(),
        });
        mirror.apply(MirrorEvent::ModeAdded { head: 4, mode: 40 });
        assert!(mirror.is_empty());
        mirror.apply(MirrorEvent::ManagerFinished);
        assert!(mirror.is_finished());
    }
}

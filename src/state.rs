use std::sync::Arc;

use tracing::{debug, warn};
use wayland_client::{
    Connection, Dispatch, EventQueue, Proxy, QueueHandle, protocol::wl_registry,
};
use wayland_protocols_wlr::output_management::v1::client::{
    zwlr_output_configuration_head_v1::{self, ZwlrOutputConfigurationHeadV1},
    zwlr_output_configuration_v1::{self, ZwlrOutputConfigurationV1},
    zwlr_output_head_v1::{self, ZwlrOutputHeadV1},
    zwlr_output_manager_v1::{self, ZwlrOutputManagerV1},
    zwlr_output_mode_v1::{self, ZwlrOutputModeV1},
};

use crate::{
    error::WlRandrError,
    mirror::{MirrorEvent, OutputMirror},
    transaction::{
        HeadInstruction, ModeChange, Outcome, SubmitKind, Transaction,
    },
    wl_head::{WlAdaptiveSync, WlTransform},
};

/// Highest output manager version this client speaks
const MAX_MANAGER_VERSION: u32 = 4;

/// Version at which heads and modes gained a `release` request
const RELEASE_SINCE: u32 = 3;

pub type WlOutputMirror = OutputMirror<ZwlrOutputHeadV1, ZwlrOutputModeV1>;
type WlTransaction = Transaction<ZwlrOutputHeadV1, ZwlrOutputModeV1>;

/// Owns the Wayland connection and the mirror of the compositor's outputs
///
/// All state changes happen while dispatching the event queue, so the
/// mirror is only mutated from the thread that drives [`EventQueue`].
pub struct WlRandr {
    _conn: Connection,
    mirror: WlOutputMirror,
    zwlr_manager: Option<ZwlrOutputManagerV1>,
    transaction: Option<WlTransaction>,
}

impl WlRandr {
    /// Connects to the compositor named by the environment and binds the
    /// output manager.
    ///
    /// # Errors
    ///
    /// Returns `Connection` if the display cannot be reached and
    /// `UnsupportedProtocol` if the compositor lacks the output manager.
    pub fn connect() -> Result<(Self, EventQueue<Self>), WlRandrError> {
        let conn = Connection::connect_to_env()
            .map_err(|e| WlRandrError::Connection(e.to_string()))?;

        let display_object = conn.display();
        let mut event_queue: EventQueue<WlRandr> = conn.new_event_queue();
        let queue_handler = event_queue.handle();
        display_object.get_registry(&queue_handler, ());

        let mut state = WlRandr {
            _conn: conn,
            mirror: OutputMirror::new(),
            zwlr_manager: None,
            transaction: None,
        };

        event_queue
            .roundtrip(&mut state)
            .map_err(|e| WlRandrError::Dispatch(e.to_string()))?;
        if state.zwlr_manager.is_none() {
            return Err(WlRandrError::UnsupportedProtocol);
        }

        Ok((state, event_queue))
    }

    /// Negotiated output manager version, zero before binding
    pub fn version(&self) -> u32 {
        self.zwlr_manager.as_ref().map_or(0, Proxy::version)
    }

    pub fn mirror(&self) -> &WlOutputMirror {
        &self.mirror
    }

    pub fn mirror_mut(&mut self) -> &mut WlOutputMirror {
        &mut self.mirror
    }

    /// Blocks until the compositor has sent a complete snapshot.
    pub fn wait_for_sync(
        &mut self,
        eq: &mut EventQueue<Self>,
    ) -> Result<(), WlRandrError> {
        while !self.mirror.is_synchronized() {
            eq.blocking_dispatch(self)
                .map_err(|e| WlRandrError::Dispatch(e.to_string()))?;
        }
        debug!(
            serial = ?self.mirror.serial(),
            heads = self.mirror.len(),
            version = self.version(),
            "initial state received"
        );
        Ok(())
    }

    /// Sends the whole output layout as one configuration and blocks until
    /// the compositor answers.
    ///
    /// # Errors
    ///
    /// `TransactionFailed` or `TransactionCancelled` when the compositor
    /// refuses it, `Dispatch` if the connection breaks while waiting.
    pub fn commit(
        &mut self,
        eq: &mut EventQueue<Self>,
        kind: SubmitKind,
    ) -> Result<(), WlRandrError> {
        let version = self.version();
        let manager = self
            .zwlr_manager
            .as_ref()
            .ok_or(WlRandrError::UnsupportedProtocol)?;
        let mut transaction = Transaction::build(&self.mirror, version)?;

        let qh = eq.handle();
        let config =
            manager.create_configuration(transaction.serial(), &qh, ());
        for instruction in transaction.instructions() {
            Self::configure_head(&config, instruction, &qh);
        }

        transaction.submit(kind)?;
        match kind {
            SubmitKind::Test => config.test(),
            SubmitKind::Apply => config.apply(),
        }
        debug!(serial = transaction.serial(), ?kind, "configuration submitted");
        self.transaction = Some(transaction);

        self.wait_for_result(eq)
    }

    fn configure_head(
        config: &ZwlrOutputConfigurationV1,
        instruction: &HeadInstruction<ZwlrOutputHeadV1, ZwlrOutputModeV1>,
        qh: &QueueHandle<Self>,
    ) {
        let settings = match instruction {
            HeadInstruction::Disable(head) => {
                config.disable_head(head);
                return;
            }
            HeadInstruction::Enable(settings) => settings,
        };

        let config_head = config.enable_head(&settings.head, qh, ());
        match &settings.mode {
            Some(ModeChange::Mode(mode)) => config_head.set_mode(mode),
            Some(ModeChange::Custom(custom)) => config_head.set_custom_mode(
                custom.width,
                custom.height,
                custom.refresh,
            ),
            None => {}
        }
        if let Some(position) = settings.position {
            config_head.set_position(position.x, position.y);
        }
        if let Some(transform) = settings.transform {
            config_head.set_transform(transform.to_wayland());
        }
        if let Some(scale) = settings.scale {
            config_head.set_scale(scale);
        }
        if let Some(adaptive_sync) = settings.adaptive_sync {
            config_head.set_adaptive_sync(adaptive_sync.to_wayland());
        }
    }

    fn wait_for_result(
        &mut self,
        eq: &mut EventQueue<Self>,
    ) -> Result<(), WlRandrError> {
        while self
            .transaction
            .as_ref()
            .is_some_and(WlTransaction::is_pending)
        {
            eq.blocking_dispatch(self)
                .map_err(|e| WlRandrError::Dispatch(e.to_string()))?;
        }
        self.transaction
            .take()
            .and_then(|transaction| transaction.result())
            .unwrap_or(Err(WlRandrError::InvalidTransactionState(
                "not submitted",
                "wait for its result",
            )))
    }
}

impl Dispatch<wl_registry::WlRegistry, ()> for WlRandr {
    fn event(
        state: &mut Self,
        registry: &wl_registry::WlRegistry,
        event: wl_registry::Event,
        _: &(),
        _: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        if let wl_registry::Event::Global {
            name,
            interface,
            version,
        } = event
        {
            if interface == ZwlrOutputManagerV1::interface().name {
                let bound = registry.bind::<ZwlrOutputManagerV1, _, _>(
                    name,
                    version.min(MAX_MANAGER_VERSION),
                    qh,
                    (),
                );
                debug!(version = bound.version(), "bound output manager");
                state.zwlr_manager = Some(bound);
            }
        }
    }
}

impl Dispatch<ZwlrOutputManagerV1, ()> for WlRandr {
    fn event(
        state: &mut Self,
        _: &ZwlrOutputManagerV1,
        event: zwlr_output_manager_v1::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        let event = match event {
            zwlr_output_manager_v1::Event::Head { head } => {
                MirrorEvent::HeadAdded { head }
            }
            zwlr_output_manager_v1::Event::Done { serial } => {
                MirrorEvent::Done { serial }
            }
            zwlr_output_manager_v1::Event::Finished => {
                MirrorEvent::ManagerFinished
            }
            _ => return,
        };
        state.mirror.apply(event);
    }

    fn event_created_child(
        opcode: u16,
        qh: &QueueHandle<Self>,
    ) -> Arc<dyn wayland_client::backend::ObjectData> {
        if opcode == 0 {
            qh.make_data::<ZwlrOutputHeadV1, _>(())
        } else {
            unreachable!("unknown opcode for zwlr_output_manager_v1")
        }
    }
}

impl Dispatch<ZwlrOutputHeadV1, ()> for WlRandr {
    fn event(
        state: &mut Self,
        head_obj: &ZwlrOutputHeadV1,
        event: <ZwlrOutputHeadV1 as Proxy>::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        let head = head_obj.clone();
        let event = match event {
            zwlr_output_head_v1::Event::Name { name } => {
                MirrorEvent::Name { head, name }
            }
            zwlr_output_head_v1::Event::Description { description } => {
                MirrorEvent::Description { head, description }
            }
            zwlr_output_head_v1::Event::PhysicalSize { width, height } => {
                MirrorEvent::PhysicalSize {
                    head,
                    width,
                    height,
                }
            }
            zwlr_output_head_v1::Event::Mode { mode } => {
                MirrorEvent::ModeAdded { head, mode }
            }
            zwlr_output_head_v1::Event::Enabled { enabled } => {
                MirrorEvent::Enabled {
                    head,
                    enabled: enabled != 0,
                }
            }
            zwlr_output_head_v1::Event::CurrentMode { mode } => {
                MirrorEvent::CurrentMode { head, mode }
            }
            zwlr_output_head_v1::Event::Position { x, y } => {
                MirrorEvent::Position { head, x, y }
            }
            zwlr_output_head_v1::Event::Transform { transform } => {
                MirrorEvent::Transform {
                    head,
                    transform: WlTransform::from_wayland(transform),
                }
            }
            zwlr_output_head_v1::Event::Scale { scale } => {
                MirrorEvent::Scale { head, scale }
            }
            zwlr_output_head_v1::Event::Make { make } => {
                MirrorEvent::Make { head, make }
            }
            zwlr_output_head_v1::Event::Model { model } => {
                MirrorEvent::Model { head, model }
            }
            zwlr_output_head_v1::Event::SerialNumber { serial_number } => {
                MirrorEvent::SerialNumber {
                    head,
                    serial_number,
                }
            }
            zwlr_output_head_v1::Event::AdaptiveSync { state: sync } => {
                MirrorEvent::AdaptiveSync {
                    head,
                    state: WlAdaptiveSync::from_wayland(sync),
                }
            }
            zwlr_output_head_v1::Event::Finished => {
                state.mirror.apply(MirrorEvent::HeadFinished { head });
                if head_obj.version() >= RELEASE_SINCE {
                    head_obj.release();
                }
                return;
            }
            _ => return,
        };
        state.mirror.apply(event);
    }

    fn event_created_child(
        opcode: u16,
        qh: &QueueHandle<Self>,
    ) -> Arc<dyn wayland_client::backend::ObjectData> {
        if opcode == 3 {
            qh.make_data::<ZwlrOutputModeV1, _>(())
        } else {
            unreachable!("unknown opcode for zwlr_output_head_v1")
        }
    }
}

impl Dispatch<ZwlrOutputModeV1, ()> for WlRandr {
    fn event(
        state: &mut Self,
        mode_obj: &ZwlrOutputModeV1,
        event: <ZwlrOutputModeV1 as Proxy>::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        let mode = mode_obj.clone();
        let event = match event {
            zwlr_output_mode_v1::Event::Size { width, height } => {
                MirrorEvent::ModeSize {
                    mode,
                    width,
                    height,
                }
            }
            zwlr_output_mode_v1::Event::Refresh { refresh } => {
                MirrorEvent::ModeRefresh { mode, refresh }
            }
            zwlr_output_mode_v1::Event::Preferred => {
                MirrorEvent::ModePreferred { mode }
            }
            zwlr_output_mode_v1::Event::Finished => {
                state.mirror.apply(MirrorEvent::ModeFinished { mode });
                if mode_obj.version() >= RELEASE_SINCE {
                    mode_obj.release();
                }
                return;
            }
            _ => return,
        };
        state.mirror.apply(event);
    }
}

impl Dispatch<ZwlrOutputConfigurationV1, ()> for WlRandr {
    fn event(
        state: &mut Self,
        config: &ZwlrOutputConfigurationV1,
        event: zwlr_output_configuration_v1::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        let outcome = match event {
            zwlr_output_configuration_v1::Event::Succeeded => Outcome::Succeeded,
            zwlr_output_configuration_v1::Event::Failed => Outcome::Failed,
            zwlr_output_configuration_v1::Event::Cancelled => Outcome::Cancelled,
            _ => return,
        };
        config.destroy();
        debug!(?outcome, "configuration resolved");

        let Some(transaction) = state.transaction.as_mut() else {
            warn!(?outcome, "result for unknown configuration");
            return;
        };
        if let Err(e) = transaction.resolve(outcome) {
            warn!(%e, ?outcome, "ignoring configuration result");
        }
    }
}

impl Dispatch<ZwlrOutputConfigurationHeadV1, ()> for WlRandr {
    fn event(
        _: &mut Self,
        _: &ZwlrOutputConfigurationHeadV1,
        _event: zwlr_output_configuration_head_v1::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
    }
}

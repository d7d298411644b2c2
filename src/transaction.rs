use tracing::debug;

use crate::{
    changes::ADAPTIVE_SYNC_SINCE,
    error::WlRandrError,
    mirror::OutputMirror,
    wl_head::{
        ChangeMask, CustomMode, Handle, WlAdaptiveSync, WlPosition, WlTransform,
    },
};

/// How a configuration is submitted to the compositor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitKind {
    /// Validate only, nothing is applied
    Test,
    Apply,
}

/// Mode attached to an enabled head
#[derive(Debug, Clone, PartialEq)]
pub enum ModeChange<M> {
    Mode(M),
    Custom(CustomMode),
}

/// Fields attached to an enabled head. `None` leaves the compositor's
/// current value in place.
#[derive(Debug, Clone, PartialEq)]
pub struct HeadConfig<H, M> {
    pub head: H,
    pub mode: Option<ModeChange<M>>,
    pub position: Option<WlPosition>,
    pub transform: Option<WlTransform>,
    pub scale: Option<f64>,
    pub adaptive_sync: Option<WlAdaptiveSync>,
}

/// What the configuration says about one head
#[derive(Debug, Clone, PartialEq)]
pub enum HeadInstruction<H, M> {
    Disable(H),
    Enable(HeadConfig<H, M>),
}

/// Builds one instruction per known head, in mirror order.
///
/// Every head is included, changed or not, so the configuration always
/// describes the whole output layout.
pub fn build_instructions<H: Handle, M: Handle>(
    mirror: &OutputMirror<H, M>,
    version: u32,
) -> Vec<HeadInstruction<H, M>> {
    mirror
        .heads()
        .map(|head| {
            if !head.enabled {
                return HeadInstruction::Disable(head.handle.clone());
            }
            let changed = head.changed;
            let mode = changed.contains(ChangeMask::MODE).then(|| {
                match &head.current_mode {
                    Some(mode) => ModeChange::Mode(mode.clone()),
                    None => ModeChange::Custom(head.custom_mode),
                }
            });
            HeadInstruction::Enable(HeadConfig {
                head: head.handle.clone(),
                mode,
                position: changed
                    .contains(ChangeMask::POSITION)
                    .then_some(head.position),
                transform: changed
                    .contains(ChangeMask::TRANSFORM)
                    .then_some(head.transform),
                scale: changed.contains(ChangeMask::SCALE).then_some(head.scale),
                adaptive_sync: (changed.contains(ChangeMask::ADAPTIVE_SYNC)
                    && version >= ADAPTIVE_SYNC_SINCE)
                    .then_some(head.adaptive_sync),
            })
        })
        .collect()
}

/// Final result reported by the compositor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Succeeded,
    /// The compositor cannot satisfy the configuration
    Failed,
    /// The serial went stale before the configuration arrived
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Building,
    Pending,
    Resolved(Outcome),
}

impl TransactionState {
    fn describe(self) -> &'static str {
        match self {
            Self::Building => "still being built",
            Self::Pending => "pending",
            Self::Resolved(Outcome::Succeeded) => "succeeded",
            Self::Resolved(Outcome::Failed) => "failed",
            Self::Resolved(Outcome::Cancelled) => "cancelled",
        }
    }
}

/// An atomic reconfiguration request and its resolution
///
/// `Building -> Pending` on submit, `Pending -> Resolved` on exactly one
/// outcome. A resolved transaction accepts no further operations.
#[derive(Debug)]
pub struct Transaction<H, M> {
    serial: u32,
    instructions: Vec<HeadInstruction<H, M>>,
    kind: Option<SubmitKind>,
    state: TransactionState,
}

impl<H: Handle, M: Handle> Transaction<H, M> {
    /// Builds a transaction against the mirror's latest serial.
    ///
    /// Fails if the mirror has never been synchronized.
    pub fn build(
        mirror: &OutputMirror<H, M>,
        version: u32,
    ) -> Result<Self, WlRandrError> {
        let serial = mirror
            .serial()
            .filter(|_| mirror.is_synchronized())
            .ok_or(WlRandrError::NotSynchronized)?;
        let instructions = build_instructions(mirror, version);
        debug!(serial, heads = instructions.len(), "transaction built");
        Ok(Self {
            serial,
            instructions,
            kind: None,
            state: TransactionState::Building,
        })
    }

    pub fn serial(&self) -> u32 {
        self.serial
    }

    pub fn instructions(&self) -> &[HeadInstruction<H, M>] {
        &self.instructions
    }

    pub fn kind(&self) -> Option<SubmitKind> {
        self.kind
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn is_pending(&self) -> bool {
        self.state == TransactionState::Pending
    }

    pub fn submit(&mut self, kind: SubmitKind) -> Result<(), WlRandrError> {
        if self.state != TransactionState::Building {
            return Err(WlRandrError::InvalidTransactionState(
                self.state.describe(),
                "submit",
            ));
        }
        self.kind = Some(kind);
        self.state = TransactionState::Pending;
        Ok(())
    }

    /// Records the compositor's answer. Only the first answer counts.
    pub fn resolve(&mut self, outcome: Outcome) -> Result<(), WlRandrError> {
        if self.state != TransactionState::Pending {
            return Err(WlRandrError::InvalidTransactionState(
                self.state.describe(),
                "resolve",
            ));
        }
        self.state = TransactionState::Resolved(outcome);
        Ok(())
    }

    /// `None` while unresolved.
    pub fn result(&self) -> Option<Result<(), WlRandrError>> {
        match self.state {
            TransactionState::Building | TransactionState::Pending => None,
            TransactionState::Resolved(Outcome::Succeeded) => Some(Ok(())),
            TransactionState::Resolved(Outcome::Failed) => {
                Some(Err(WlRandrError::TransactionFailed))
            }
            TransactionState::Resolved(Outcome::Cancelled) => {
                Some(Err(WlRandrError::TransactionCancelled))
            }
        }
    }
}

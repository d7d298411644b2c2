mod arena;
pub mod changes;
mod error;
pub mod mirror;
pub mod report;
mod state;
pub mod transaction;
mod wl_head;

pub use arena::OrderedArena;
pub use error::{ValidationError, WlRandrError};
pub use state::{WlOutputMirror, WlRandr};
pub use wl_head::{
    ChangeMask, CustomMode, Handle, WlAdaptiveSync, WlHead, WlHeadMode,
    WlPhysicalSize, WlPosition, WlResolution, WlTransform,
};

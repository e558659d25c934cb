pub mod clock;
pub mod config;
pub mod error;
pub mod model;
pub mod protocol;
pub mod sensitivity;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{HostError, RecorderError};
pub use model::{Annotation, ElementInfo, RecordingSession, RecordingStep, StepKind, TabId};

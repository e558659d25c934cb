//! Page-side half of the recorder: selector synthesis, element labels, the
//! highlight overlay and the interaction detectors, all written against the
//! [`dom::Document`] tree adapter.

pub mod content;
pub mod describe;
pub mod detector;
pub mod dom;
pub mod highlight;
pub mod selector;

pub use content::ContentScript;
pub use describe::{describe_element, element_info};
pub use detector::{ClickDetector, DomEvent, DomEventKind, InputDetector};
pub use dom::{Document, DocumentMut, MemoryDocument, NodeId};
pub use highlight::HighlightOverlay;
pub use selector::synthesize_selector;

//! Text, signature and shape annotations placed over a displayed page.

mod flatten;
mod model;
mod overlay;
mod viewport;

pub use flatten::{flatten_annotations, standard_font};
pub use model::*;
pub use overlay::{AnnotationOverlay, InteractionState, PlacementTool, ResizeHandle};
pub use viewport::{PdfPoint, ScreenPoint, Viewport};

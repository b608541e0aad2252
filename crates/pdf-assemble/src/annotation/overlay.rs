//! Interactive editing of annotations on one displayed page.
//!
//! Pointer positions come in as screen pixels relative to the rendered page
//! and are divided by the zoom before anything is stored. A drag only writes
//! to the store when it ends; resize and rotate are recomputed from the
//! gesture's starting state on every move, so repeated scaling cannot drift.

use super::model::*;
use super::viewport::{PdfPoint, ScreenPoint, Viewport};
use crate::constants::*;
use crate::options::AssemblyOptions;
use crate::types::*;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionState {
    Idle,
    Hovered,
    Selected,
    Dragging,
    Resizing,
    Rotating,
}

/// What a click creates while in placement mode
#[derive(Debug, Clone, PartialEq)]
pub enum PlacementTool {
    Text,
    Signature { image_data: String },
    Shape(ShapeKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResizeHandle {
    TopLeft,
    Top,
    TopRight,
    Right,
    BottomRight,
    Bottom,
    BottomLeft,
    Left,
}

impl ResizeHandle {
    pub const ALL: [ResizeHandle; 8] = [
        ResizeHandle::TopLeft,
        ResizeHandle::Top,
        ResizeHandle::TopRight,
        ResizeHandle::Right,
        ResizeHandle::BottomRight,
        ResizeHandle::Bottom,
        ResizeHandle::BottomLeft,
        ResizeHandle::Left,
    ];

    /// -1 moves the left edge, 1 the right edge, 0 neither
    fn horizontal(self) -> i8 {
        match self {
            ResizeHandle::TopLeft | ResizeHandle::Left | ResizeHandle::BottomLeft => -1,
            ResizeHandle::TopRight | ResizeHandle::Right | ResizeHandle::BottomRight => 1,
            ResizeHandle::Top | ResizeHandle::Bottom => 0,
        }
    }

    /// -1 moves the top edge, 1 the bottom edge, 0 neither
    fn vertical(self) -> i8 {
        match self {
            ResizeHandle::TopLeft | ResizeHandle::Top | ResizeHandle::TopRight => -1,
            ResizeHandle::BottomLeft | ResizeHandle::Bottom | ResizeHandle::BottomRight => 1,
            ResizeHandle::Left | ResizeHandle::Right => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct BoxState {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
    rotation: f32,
}

impl BoxState {
    fn of(annotation: &Annotation) -> Self {
        Self {
            x: annotation.x,
            y: annotation.y,
            width: annotation.width(),
            height: annotation.height(),
            rotation: annotation.rotation,
        }
    }

    fn restore(self, annotation: &mut Annotation) {
        annotation.x = self.x;
        annotation.y = self.y;
        annotation.set_size(self.width, self.height);
        annotation.rotation = self.rotation;
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Gesture {
    Drag {
        id: AnnotationId,
        pointer: ScreenPoint,
        origin: ScreenPoint,
    },
    Resize {
        id: AnnotationId,
        handle: ResizeHandle,
        pointer: ScreenPoint,
        start: BoxState,
    },
    Rotate {
        id: AnnotationId,
        center: ScreenPoint,
        start: BoxState,
    },
}

impl Gesture {
    fn id(&self) -> AnnotationId {
        match self {
            Gesture::Drag { id, .. } | Gesture::Resize { id, .. } | Gesture::Rotate { id, .. } => {
                *id
            }
        }
    }

    fn state(&self) -> InteractionState {
        match self {
            Gesture::Drag { .. } => InteractionState::Dragging,
            Gesture::Resize { .. } => InteractionState::Resizing,
            Gesture::Rotate { .. } => InteractionState::Rotating,
        }
    }
}

/// Owns the annotations, the zoom and the single active gesture.
#[derive(Debug, Clone)]
pub struct AnnotationOverlay {
    store: AnnotationStore,
    viewport: Viewport,
    page_index: usize,
    tool: Option<PlacementTool>,
    selected: Option<AnnotationId>,
    hovered: Option<(AnnotationId, Instant)>,
    gesture: Option<Gesture>,
    hover_timeout: Duration,
}

impl Default for AnnotationOverlay {
    fn default() -> Self {
        Self::new(AnnotationStore::new())
    }
}

impl AnnotationOverlay {
    pub fn new(store: AnnotationStore) -> Self {
        Self {
            store,
            viewport: Viewport::default(),
            page_index: 0,
            tool: None,
            selected: None,
            hovered: None,
            gesture: None,
            hover_timeout: Duration::from_millis(DEFAULT_HOVER_TIMEOUT_MS),
        }
    }

    /// Overlay configured from session options (hover timeout)
    pub fn with_options(store: AnnotationStore, options: &AssemblyOptions) -> Self {
        Self::new(store).with_hover_timeout(options.hover_timeout())
    }

    pub fn with_hover_timeout(mut self, timeout: Duration) -> Self {
        self.hover_timeout = timeout;
        self
    }

    pub fn with_zoom(mut self, zoom: f32) -> Self {
        self.viewport.set_zoom(zoom);
        self
    }

    pub fn store(&self) -> &AnnotationStore {
        &self.store
    }

    pub fn into_store(self) -> AnnotationStore {
        self.store
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn set_zoom(&mut self, zoom: f32) {
        self.viewport.set_zoom(zoom);
    }

    pub fn zoom_by(&mut self, delta: f32) {
        self.viewport.zoom_by(delta);
    }

    pub fn page_index(&self) -> usize {
        self.page_index
    }

    /// Switch to another page. Selection, hover and any gesture are dropped.
    pub fn show_page(&mut self, page_index: usize) {
        self.cancel_gesture();
        self.page_index = page_index;
        self.selected = None;
        self.hovered = None;
    }

    /// Annotations on the displayed page
    pub fn annotations(&self) -> impl Iterator<Item = &Annotation> {
        self.store.for_page(self.page_index)
    }

    /// Screen-space top-left of an annotation at the current zoom
    pub fn screen_position(&self, id: AnnotationId) -> Result<ScreenPoint> {
        let annotation = self.annotation(id)?;
        Ok(self
            .viewport
            .to_screen(PdfPoint::new(annotation.x, annotation.y)))
    }

    // =========================================================================
    // Placement
    // =========================================================================

    pub fn set_tool(&mut self, tool: Option<PlacementTool>) {
        self.tool = tool;
    }

    pub fn tool(&self) -> Option<&PlacementTool> {
        self.tool.as_ref()
    }

    /// Handle a click on the page background.
    ///
    /// In placement mode this creates an annotation at the click, selects it
    /// and leaves placement mode. Otherwise it clears the selection.
    pub fn click(&mut self, at: ScreenPoint) -> Option<AnnotationId> {
        let Some(tool) = self.tool.take() else {
            self.selected = None;
            return None;
        };

        let point = self.viewport.to_pdf(at);
        let kind = match tool {
            PlacementTool::Text => AnnotationKind::Text {
                text: DEFAULT_TEXT.to_string(),
                width: DEFAULT_TEXT_WIDTH,
                height: DEFAULT_TEXT_HEIGHT,
                style: TextStyle::default(),
            },
            PlacementTool::Signature { image_data } => AnnotationKind::Signature {
                image_data,
                width: DEFAULT_SIGNATURE_WIDTH,
                height: DEFAULT_SIGNATURE_HEIGHT,
            },
            PlacementTool::Shape(shape) => AnnotationKind::Shape {
                shape,
                size: DEFAULT_SHAPE_SIZE,
            },
        };

        let id = self.store.add(self.page_index, point.x, point.y, kind);
        log::debug!("Placed {} at ({:.1}, {:.1})", id, point.x, point.y);
        self.selected = Some(id);
        Some(id)
    }

    // =========================================================================
    // Hover and selection
    // =========================================================================

    /// Record pointer activity over an annotation.
    pub fn hover(&mut self, id: AnnotationId, now: Instant) -> Result<()> {
        self.annotation(id)?;
        self.hovered = Some((id, now));
        Ok(())
    }

    pub fn select(&mut self, id: AnnotationId) -> Result<()> {
        self.annotation(id)?;
        self.selected = Some(id);
        Ok(())
    }

    pub fn deselect(&mut self) {
        self.selected = None;
    }

    pub fn selected(&self) -> Option<AnnotationId> {
        self.selected
    }

    pub fn state(&self, id: AnnotationId, now: Instant) -> InteractionState {
        if let Some(gesture) = self.gesture.filter(|g| g.id() == id) {
            return gesture.state();
        }
        if self.selected == Some(id) {
            return InteractionState::Selected;
        }
        match self.hovered {
            Some((hovered, since))
                if hovered == id && now.saturating_duration_since(since) < self.hover_timeout =>
            {
                InteractionState::Hovered
            }
            _ => InteractionState::Idle,
        }
    }

    /// Delete, resize and rotate handles are shown unless the annotation is idle.
    pub fn handles_visible(&self, id: AnnotationId, now: Instant) -> bool {
        self.state(id, now) != InteractionState::Idle
    }

    // =========================================================================
    // Drag
    // =========================================================================

    pub fn begin_drag(&mut self, id: AnnotationId, pointer: ScreenPoint) -> Result<()> {
        let origin = self.screen_position(id)?;
        self.gesture = Some(Gesture::Drag {
            id,
            pointer,
            origin,
        });
        self.selected = Some(id);
        Ok(())
    }

    /// Live screen position of the dragged annotation. Nothing is stored.
    pub fn drag_to(&self, pointer: ScreenPoint) -> Result<ScreenPoint> {
        match self.gesture {
            Some(Gesture::Drag {
                pointer: start,
                origin,
                ..
            }) => Ok(ScreenPoint::new(
                origin.x + pointer.x - start.x,
                origin.y + pointer.y - start.y,
            )),
            _ => Err(AssembleError::NoGesture),
        }
    }

    /// Finish the drag and store the unscaled position.
    pub fn end_drag(&mut self, pointer: ScreenPoint) -> Result<PdfPoint> {
        let screen = self.drag_to(pointer)?;
        let Some(Gesture::Drag { id, .. }) = self.gesture else {
            return Err(AssembleError::NoGesture);
        };
        self.gesture = None;

        let point = self.viewport.to_pdf(screen);
        self.store.update(id, |a| {
            a.x = point.x;
            a.y = point.y;
        })?;
        Ok(point)
    }

    // =========================================================================
    // Resize
    // =========================================================================

    pub fn begin_resize(
        &mut self,
        id: AnnotationId,
        handle: ResizeHandle,
        pointer: ScreenPoint,
    ) -> Result<()> {
        let start = BoxState::of(self.annotation(id)?);
        self.gesture = Some(Gesture::Resize {
            id,
            handle,
            pointer,
            start,
        });
        self.selected = Some(id);
        Ok(())
    }

    /// Resize from the starting box by the pointer delta. The edge opposite
    /// the handle stays put and neither side shrinks below the minimum.
    pub fn resize_to(&mut self, pointer: ScreenPoint) -> Result<Annotation> {
        let Some(Gesture::Resize {
            id,
            handle,
            pointer: start_pointer,
            start,
        }) = self.gesture
        else {
            return Err(AssembleError::NoGesture);
        };

        let dx = self.viewport.to_pdf_length(pointer.x - start_pointer.x);
        let dy = self.viewport.to_pdf_length(pointer.y - start_pointer.y);
        let min_width = MIN_ANNOTATION_SIZE.min(start.width);
        let min_height = MIN_ANNOTATION_SIZE.min(start.height);

        let width = match handle.horizontal() {
            1 => (start.width + dx).max(min_width),
            -1 => (start.width - dx).max(min_width),
            _ => start.width,
        };
        let height = match handle.vertical() {
            1 => (start.height + dy).max(min_height),
            -1 => (start.height - dy).max(min_height),
            _ => start.height,
        };

        let mut resized = None;
        self.store.update(id, |a| {
            a.set_size(width, height);
            a.x = if handle.horizontal() < 0 {
                start.x + start.width - a.width()
            } else {
                start.x
            };
            a.y = if handle.vertical() < 0 {
                start.y + start.height - a.height()
            } else {
                start.y
            };
            resized = Some(a.clone());
        })?;
        resized.ok_or(AssembleError::AnnotationNotFound(id))
    }

    pub fn end_resize(&mut self) -> Result<()> {
        match self.gesture {
            Some(Gesture::Resize { .. }) => {
                self.gesture = None;
                Ok(())
            }
            _ => Err(AssembleError::NoGesture),
        }
    }

    // =========================================================================
    // Rotate
    // =========================================================================

    pub fn begin_rotate(&mut self, id: AnnotationId) -> Result<()> {
        let annotation = self.annotation(id)?;
        let (cx, cy) = annotation.center();
        let center = self.viewport.to_screen(PdfPoint::new(cx, cy));
        let start = BoxState::of(annotation);
        self.gesture = Some(Gesture::Rotate { id, center, start });
        self.selected = Some(id);
        Ok(())
    }

    /// Point the annotation's top at the pointer. Straight up is 0°, angles
    /// grow clockwise and are rounded to whole degrees.
    pub fn rotate_to(&mut self, pointer: ScreenPoint) -> Result<f32> {
        let Some(Gesture::Rotate { id, center, .. }) = self.gesture else {
            return Err(AssembleError::NoGesture);
        };
        let dx = pointer.x - center.x;
        let dy = pointer.y - center.y;
        let degrees = (dy.atan2(dx).to_degrees() + 90.0).round().rem_euclid(360.0);
        self.store.update(id, |a| a.rotation = degrees)?;
        Ok(degrees)
    }

    pub fn end_rotate(&mut self) -> Result<()> {
        match self.gesture {
            Some(Gesture::Rotate { .. }) => {
                self.gesture = None;
                Ok(())
            }
            _ => Err(AssembleError::NoGesture),
        }
    }

    /// Abandon the active gesture, restoring the annotation as it was when
    /// the gesture began.
    pub fn cancel_gesture(&mut self) {
        let Some(gesture) = self.gesture.take() else {
            return;
        };
        let restore = match gesture {
            Gesture::Drag { .. } => None,
            Gesture::Resize { id, start, .. } | Gesture::Rotate { id, start, .. } => {
                Some((id, start))
            }
        };
        if let Some((id, start)) = restore {
            // the annotation may have been deleted mid-gesture
            let _ = self.store.update(id, |a| start.restore(a));
        }
    }

    // =========================================================================
    // Delete
    // =========================================================================

    pub fn delete(&mut self, id: AnnotationId) -> Result<Annotation> {
        let removed = self.store.remove(id)?;
        if self.selected == Some(id) {
            self.selected = None;
        }
        if self.hovered.is_some_and(|(hovered, _)| hovered == id) {
            self.hovered = None;
        }
        if self.gesture.is_some_and(|g| g.id() == id) {
            self.gesture = None;
        }
        Ok(removed)
    }

    fn annotation(&self, id: AnnotationId) -> Result<&Annotation> {
        self.store
            .get(id)
            .ok_or(AssembleError::AnnotationNotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overlay_with_text(zoom: f32) -> (AnnotationOverlay, AnnotationId) {
        let mut overlay = AnnotationOverlay::default().with_zoom(zoom);
        overlay.set_tool(Some(PlacementTool::Text));
        let id = overlay
            .click(ScreenPoint::new(200.0, 100.0))
            .expect("placement mode creates an annotation");
        (overlay, id)
    }

    fn position(overlay: &AnnotationOverlay, id: AnnotationId) -> (f32, f32) {
        let a = overlay.store().get(id).unwrap();
        (a.x, a.y)
    }

    #[test]
    fn placement_divides_by_zoom() {
        let (overlay, id) = overlay_with_text(2.0);
        let annotation = overlay.store().get(id).unwrap();
        assert_eq!((annotation.x, annotation.y), (100.0, 50.0));
        assert_eq!((annotation.width(), annotation.height()), (150.0, 50.0));
        assert!(overlay.tool().is_none());
        assert_eq!(overlay.selected(), Some(id));
    }

    #[test]
    fn click_outside_placement_mode_deselects() {
        let (mut overlay, _) = overlay_with_text(1.0);
        assert_eq!(overlay.click(ScreenPoint::new(5.0, 5.0)), None);
        assert_eq!(overlay.selected(), None);
        assert_eq!(overlay.store().len(), 1);
    }

    #[test]
    fn drag_persists_only_on_end() {
        let (mut overlay, id) = overlay_with_text(2.0);
        overlay.begin_drag(id, ScreenPoint::new(210.0, 110.0)).unwrap();

        let live = overlay.drag_to(ScreenPoint::new(250.0, 130.0)).unwrap();
        assert_eq!(live, ScreenPoint::new(240.0, 120.0));
        assert_eq!(position(&overlay, id), (100.0, 50.0));

        let stored = overlay.end_drag(ScreenPoint::new(260.0, 150.0)).unwrap();
        assert_eq!(stored, PdfPoint::new(125.0, 70.0));
        assert_eq!(position(&overlay, id), (125.0, 70.0));
        assert!(matches!(
            overlay.drag_to(ScreenPoint::default()),
            Err(AssembleError::NoGesture)
        ));
    }

    #[test]
    fn resize_floors_at_minimum() {
        let (mut overlay, id) = overlay_with_text(1.0);
        overlay
            .begin_resize(id, ResizeHandle::BottomRight, ScreenPoint::new(0.0, 0.0))
            .unwrap();
        let resized = overlay.resize_to(ScreenPoint::new(-500.0, -500.0)).unwrap();
        assert_eq!((resized.width(), resized.height()), (30.0, 30.0));
        assert_eq!((resized.x, resized.y), (200.0, 100.0));
        overlay.end_resize().unwrap();
    }

    #[test]
    fn resize_from_top_left_keeps_opposite_corner() {
        let (mut overlay, id) = overlay_with_text(2.0);
        overlay
            .begin_resize(id, ResizeHandle::TopLeft, ScreenPoint::new(200.0, 100.0))
            .unwrap();
        // 40 px at zoom 2 is 20 pt
        let resized = overlay.resize_to(ScreenPoint::new(160.0, 60.0)).unwrap();
        assert_eq!((resized.width(), resized.height()), (170.0, 70.0));
        assert_eq!((resized.x, resized.y), (80.0, 30.0));
        assert_eq!(resized.x + resized.width(), 250.0);
        assert_eq!(resized.y + resized.height(), 100.0);
    }

    #[test]
    fn side_handles_change_one_dimension() {
        let (mut overlay, id) = overlay_with_text(1.0);
        overlay
            .begin_resize(id, ResizeHandle::Bottom, ScreenPoint::new(0.0, 0.0))
            .unwrap();
        let resized = overlay.resize_to(ScreenPoint::new(80.0, 25.0)).unwrap();
        assert_eq!((resized.width(), resized.height()), (150.0, 75.0));
    }

    #[test]
    fn rotation_follows_pointer_angle() {
        let (mut overlay, id) = overlay_with_text(1.0);
        // box is 150x50 at (200, 100), so the center is (275, 125)
        overlay.begin_rotate(id).unwrap();
        assert_eq!(overlay.rotate_to(ScreenPoint::new(275.0, 25.0)).unwrap(), 0.0);
        assert_eq!(overlay.rotate_to(ScreenPoint::new(375.0, 125.0)).unwrap(), 90.0);
        assert_eq!(overlay.rotate_to(ScreenPoint::new(275.0, 225.0)).unwrap(), 180.0);
        assert_eq!(overlay.rotate_to(ScreenPoint::new(175.0, 125.0)).unwrap(), 270.0);
        overlay.end_rotate().unwrap();
        assert_eq!(overlay.store().get(id).unwrap().rotation, 270.0);
        assert_eq!(position(&overlay, id), (200.0, 100.0));
    }

    #[test]
    fn cancel_restores_starting_box() {
        let (mut overlay, id) = overlay_with_text(1.0);
        overlay
            .begin_resize(id, ResizeHandle::Right, ScreenPoint::new(0.0, 0.0))
            .unwrap();
        overlay.resize_to(ScreenPoint::new(90.0, 0.0)).unwrap();
        overlay.cancel_gesture();
        assert_eq!(overlay.store().get(id).unwrap().width(), 150.0);
    }

    #[test]
    fn hover_expires_after_timeout() {
        let (mut overlay, id) = overlay_with_text(1.0);
        overlay.deselect();
        let t0 = Instant::now();
        assert!(!overlay.handles_visible(id, t0));

        overlay.hover(id, t0).unwrap();
        assert_eq!(overlay.state(id, t0 + Duration::from_millis(1000)), InteractionState::Hovered);
        assert!(!overlay.handles_visible(id, t0 + Duration::from_millis(1600)));

        overlay.select(id).unwrap();
        assert!(overlay.handles_visible(id, t0 + Duration::from_secs(60)));
    }

    #[test]
    fn configured_hover_timeout_applies() {
        let options = AssemblyOptions {
            hover_timeout_ms: 5000,
            ..Default::default()
        };
        let mut overlay = AnnotationOverlay::with_options(AnnotationStore::new(), &options);
        overlay.set_tool(Some(PlacementTool::Text));
        let id = overlay.click(ScreenPoint::new(10.0, 10.0)).unwrap();
        overlay.deselect();

        let t0 = Instant::now();
        overlay.hover(id, t0).unwrap();
        assert!(overlay.handles_visible(id, t0 + Duration::from_millis(3000)));
        assert!(!overlay.handles_visible(id, t0 + Duration::from_millis(5000)));
    }

    #[test]
    fn gesture_state_wins_over_selection() {
        let (mut overlay, id) = overlay_with_text(1.0);
        overlay.begin_drag(id, ScreenPoint::default()).unwrap();
        assert_eq!(overlay.state(id, Instant::now()), InteractionState::Dragging);
    }

    #[test]
    fn delete_clears_interaction() {
        let (mut overlay, id) = overlay_with_text(1.0);
        overlay.hover(id, Instant::now()).unwrap();
        overlay.begin_drag(id, ScreenPoint::default()).unwrap();
        overlay.delete(id).unwrap();
        assert!(overlay.store().is_empty());
        assert_eq!(overlay.selected(), None);
        assert!(matches!(
            overlay.end_drag(ScreenPoint::default()),
            Err(AssembleError::NoGesture)
        ));
        assert!(matches!(
            overlay.delete(id),
            Err(AssembleError::AnnotationNotFound(_))
        ));
    }

    #[test]
    fn placed_shapes_use_default_size() {
        let mut overlay = AnnotationOverlay::default().with_zoom(1.0);
        overlay.show_page(2);
        overlay.set_tool(Some(PlacementTool::Shape(ShapeKind::Cross)));
        let id = overlay.click(ScreenPoint::new(10.0, 10.0)).unwrap();
        let shape = overlay.store().get(id).unwrap();
        assert_eq!(shape.page_index, 2);
        assert_eq!(shape.width(), DEFAULT_SHAPE_SIZE);
        assert_eq!(overlay.annotations().count(), 1);
    }
}

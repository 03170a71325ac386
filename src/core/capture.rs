//! Polygon capture: turns a stream of click/commit events into one closed ring
//! in pixel space.
//!
//! `PolygonCapture` is the pure state machine (`Empty -> Drawing -> Closed`).
//! `CaptureSession` couples it with an `EventSubscription` and releases the
//! subscription exactly once, on the transition into `Closed` (or when the
//! session is dropped without closing).
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::types::{CaptureEvent, PixelPoint};

/// Fewest drawn vertices a ring may be closed with.
pub const MIN_RING_VERTICES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Empty,
    Drawing,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// A click landed within the snap distance of the first vertex.
    Snapped,
    /// An explicit commit event.
    Committed,
}

/// A closed polygon ring in pixel coordinates.
///
/// The ring is treated as implicitly closed between the last and the first
/// vertex, so both snap-closed rings (last == first) and commit-closed rings
/// (last == second to last) mask the same area as their drawn outline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    vertices: Vec<PixelPoint>,
}

impl Polygon {
    /// Build a polygon from an already closed vertex list.
    pub fn from_vertices(vertices: Vec<PixelPoint>) -> Result<Self> {
        if vertices.len() < MIN_RING_VERTICES {
            return Err(Error::InvalidArgument {
                arg: "polygon",
                value: format!("{} vertices", vertices.len()),
            });
        }
        if let Some(p) = vertices.iter().find(|p| !(p.x.is_finite() && p.y.is_finite())) {
            return Err(Error::InvalidArgument {
                arg: "polygon",
                value: format!("non-finite vertex ({}, {})", p.x, p.y),
            });
        }
        Ok(Self { vertices })
    }

    pub fn vertices(&self) -> &[PixelPoint] {
        &self.vertices
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Bounding box as (min_x, min_y, max_x, max_y).
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.vertices.iter().fold(
            (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
            |(x0, y0, x1, y1), p| (x0.min(p.x), y0.min(p.y), x1.max(p.x), y1.max(p.y)),
        )
    }

    /// Edges of the ring, including the implicit closing edge.
    fn edges(&self) -> impl Iterator<Item = (PixelPoint, PixelPoint)> + '_ {
        let n = self.vertices.len();
        (0..n).map(move |i| (self.vertices[(i + n - 1) % n], self.vertices[i]))
    }

    /// True if (px, py) lies inside the ring or on its boundary.
    pub fn contains(&self, px: f64, py: f64) -> bool {
        const EPS: f64 = 1e-9;
        let p = PixelPoint::new(px, py);

        for (a, b) in self.edges() {
            if on_segment(&p, &a, &b, EPS) {
                return true;
            }
        }

        // Ray casting
        let mut inside = false;
        for (vj, vi) in self.edges() {
            if ((vi.y > py) != (vj.y > py))
                && (px < (vj.x - vi.x) * (py - vi.y) / (vj.y - vi.y) + vi.x)
            {
                inside = !inside;
            }
        }
        inside
    }
}

fn on_segment(p: &PixelPoint, a: &PixelPoint, b: &PixelPoint, eps: f64) -> bool {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len = (dx * dx + dy * dy).sqrt();
    if len <= eps {
        return p.distance(a) <= eps;
    }
    let cross = (p.x - a.x) * dy - (p.y - a.y) * dx;
    if cross.abs() > eps * len {
        return false;
    }
    let dot = (p.x - a.x) * dx + (p.y - a.y) * dy;
    dot >= -eps && dot <= len * len + eps
}

/// Vertex-collecting state machine for one capture.
#[derive(Debug, Clone)]
pub struct PolygonCapture {
    vertices: Vec<PixelPoint>,
    state: CaptureState,
    close_reason: Option<CloseReason>,
    snap_distance: f64,
    frame_width: f64,
    frame_height: f64,
}

impl PolygonCapture {
    /// New capture over a raster of `width` x `height` pixels.
    pub fn new(snap_distance: f64, width: usize, height: usize) -> Self {
        Self {
            vertices: Vec::new(),
            state: CaptureState::Empty,
            close_reason: None,
            snap_distance,
            frame_width: width as f64,
            frame_height: height as f64,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn is_complete(&self) -> bool {
        self.state == CaptureState::Closed
    }

    pub fn close_reason(&self) -> Option<CloseReason> {
        self.close_reason
    }

    /// Vertices drawn so far (in progress or closed).
    pub fn vertices(&self) -> &[PixelPoint] {
        &self.vertices
    }

    fn in_frame(&self, x: f64, y: f64) -> bool {
        x.is_finite()
            && y.is_finite()
            && (0.0..=self.frame_width).contains(&x)
            && (0.0..=self.frame_height).contains(&y)
    }

    /// Feed one event and return the resulting state.
    pub fn handle(&mut self, event: CaptureEvent) -> CaptureState {
        if self.state == CaptureState::Closed {
            return self.state;
        }
        match event {
            CaptureEvent::PointClick { x, y } => self.click(PixelPoint::new(x, y)),
            CaptureEvent::Commit => self.commit(),
        }
        self.state
    }

    fn click(&mut self, point: PixelPoint) {
        if !self.in_frame(point.x, point.y) {
            debug!("Ignoring click outside raster frame: ({}, {})", point.x, point.y);
            return;
        }
        if self.vertices.len() >= MIN_RING_VERTICES
            && point.distance(&self.vertices[0]) < self.snap_distance
        {
            let first = self.vertices[0];
            self.close(first, CloseReason::Snapped);
            return;
        }
        self.vertices.push(point);
        self.state = CaptureState::Drawing;
        debug!(
            "Vertex {} at ({:.2}, {:.2})",
            self.vertices.len(),
            point.x,
            point.y
        );
    }

    fn commit(&mut self) {
        match self.vertices.last() {
            Some(&last) if self.vertices.len() >= MIN_RING_VERTICES => {
                self.close(last, CloseReason::Committed)
            }
            _ => debug!(
                "Ignoring commit with {} vertices (need {})",
                self.vertices.len(),
                MIN_RING_VERTICES
            ),
        }
    }

    fn close(&mut self, closer: PixelPoint, reason: CloseReason) {
        self.vertices.push(closer);
        self.state = CaptureState::Closed;
        self.close_reason = Some(reason);
        info!(
            "Polygon closed ({:?}) with {} stored vertices",
            reason,
            self.vertices.len()
        );
    }

    /// Immutable snapshot of the ring; `None` unless the capture is closed.
    pub fn polygon(&self) -> Option<Polygon> {
        if self.is_complete() {
            Some(Polygon {
                vertices: self.vertices.clone(),
            })
        } else {
            None
        }
    }

    pub fn into_polygon(self) -> Result<Polygon> {
        if self.is_complete() {
            Ok(Polygon {
                vertices: self.vertices,
            })
        } else {
            Err(Error::IncompletePolygon)
        }
    }
}

/// Owns an event source until it is released. Release happens at most once;
/// dropping an active subscription releases it.
pub struct EventSubscription<I> {
    source: Option<I>,
}

impl<I> EventSubscription<I> {
    pub fn new(source: I) -> Self {
        Self {
            source: Some(source),
        }
    }

    pub fn is_active(&self) -> bool {
        self.source.is_some()
    }

    pub fn release(&mut self) {
        if let Some(source) = self.source.take() {
            drop(source);
            debug!("Capture event subscription released");
        }
    }
}

impl<I> Drop for EventSubscription<I> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<I> Iterator for EventSubscription<I>
where
    I: Iterator<Item = Result<CaptureEvent>>,
{
    type Item = Result<CaptureEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        self.source.as_mut()?.next()
    }
}

/// A capture bound to its event stream. Blocks on the stream until the ring
/// closes or the stream ends.
pub struct CaptureSession<I> {
    capture: PolygonCapture,
    subscription: EventSubscription<I>,
}

impl<I> CaptureSession<I>
where
    I: Iterator<Item = Result<CaptureEvent>>,
{
    pub fn new<E>(events: E, snap_distance: f64, width: usize, height: usize) -> Self
    where
        E: IntoIterator<IntoIter = I>,
    {
        Self {
            capture: PolygonCapture::new(snap_distance, width, height),
            subscription: EventSubscription::new(events.into_iter()),
        }
    }

    pub fn capture(&self) -> &PolygonCapture {
        &self.capture
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_active()
    }

    /// Consume one event. Returns `Ok(None)` once the stream is exhausted or
    /// released.
    pub fn step(&mut self) -> Result<Option<CaptureState>> {
        let Some(event) = self.subscription.next() else {
            return Ok(None);
        };
        let state = self.capture.handle(event?);
        if state == CaptureState::Closed {
            self.subscription.release();
        }
        Ok(Some(state))
    }

    /// Drive the stream to completion and hand out the closed polygon.
    pub fn run(mut self) -> Result<Polygon> {
        while self.step()?.is_some() {}
        self.subscription.release();
        let CaptureSession { capture, .. } = self;
        capture.into_polygon()
    }
}

/// Capture one polygon from `events` over a `width` x `height` raster.
pub fn capture_polygon<E>(
    events: E,
    snap_distance: f64,
    width: usize,
    height: usize,
) -> Result<Polygon>
where
    E: IntoIterator<Item = Result<CaptureEvent>>,
{
    CaptureSession::new(events, snap_distance, width, height).run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn click(x: f64, y: f64) -> CaptureEvent {
        CaptureEvent::PointClick { x, y }
    }

    fn ok_events(events: Vec<CaptureEvent>) -> Vec<Result<CaptureEvent>> {
        events.into_iter().map(Ok).collect()
    }

    #[test]
    fn snap_close_duplicates_first_vertex() {
        let mut cap = PolygonCapture::new(5.0, 100, 100);
        for e in [click(10.0, 10.0), click(40.0, 10.0), click(40.0, 40.0)] {
            assert_eq!(cap.handle(e), CaptureState::Drawing);
        }
        assert_eq!(cap.handle(click(12.0, 11.0)), CaptureState::Closed);
        assert_eq!(cap.close_reason(), Some(CloseReason::Snapped));

        let poly = cap.polygon().unwrap();
        assert_eq!(poly.len(), 4);
        assert_eq!(poly.vertices()[0], poly.vertices()[3]);
    }

    #[test]
    fn commit_appends_copy_of_last_vertex() {
        let mut cap = PolygonCapture::new(5.0, 100, 100);
        for e in [click(10.0, 10.0), click(40.0, 10.0), click(40.0, 40.0), click(10.0, 40.0)] {
            cap.handle(e);
        }
        let before = cap.vertices().len();
        assert_eq!(cap.handle(CaptureEvent::Commit), CaptureState::Closed);
        assert_eq!(cap.close_reason(), Some(CloseReason::Committed));

        let poly = cap.into_polygon().unwrap();
        assert_eq!(poly.len(), before + 1);
        assert_eq!(poly.vertices()[before], poly.vertices()[before - 1]);
    }

    #[test]
    fn near_first_click_with_few_vertices_is_appended() {
        let mut cap = PolygonCapture::new(5.0, 100, 100);
        cap.handle(click(10.0, 10.0));
        assert_eq!(cap.handle(click(10.0, 10.0)), CaptureState::Drawing);
        assert_eq!(cap.vertices().len(), 2);
    }

    #[test]
    fn commit_is_ignored_until_ring_is_possible() {
        let mut cap = PolygonCapture::new(5.0, 100, 100);
        assert_eq!(cap.handle(CaptureEvent::Commit), CaptureState::Empty);
        cap.handle(click(1.0, 1.0));
        cap.handle(click(20.0, 1.0));
        assert_eq!(cap.handle(CaptureEvent::Commit), CaptureState::Drawing);
        assert!(cap.polygon().is_none());
    }

    #[test]
    fn clicks_outside_frame_are_rejected() {
        let mut cap = PolygonCapture::new(5.0, 50, 30);
        assert_eq!(cap.handle(click(-1.0, 5.0)), CaptureState::Empty);
        assert_eq!(cap.handle(click(10.0, 31.0)), CaptureState::Empty);
        assert_eq!(cap.handle(click(f64::NAN, 1.0)), CaptureState::Empty);
        assert_eq!(cap.handle(click(50.0, 30.0)), CaptureState::Drawing);
        assert_eq!(cap.vertices().len(), 1);
    }

    #[test]
    fn closed_is_terminal() {
        let mut cap = PolygonCapture::new(5.0, 100, 100);
        for e in [click(0.0, 0.0), click(10.0, 0.0), click(10.0, 10.0), CaptureEvent::Commit] {
            cap.handle(e);
        }
        let n = cap.vertices().len();
        assert_eq!(cap.handle(click(50.0, 50.0)), CaptureState::Closed);
        assert_eq!(cap.handle(CaptureEvent::Commit), CaptureState::Closed);
        assert_eq!(cap.vertices().len(), n);
    }

    #[test]
    fn unfinished_capture_reports_incomplete() {
        let result = capture_polygon(ok_events(vec![click(1.0, 1.0), click(5.0, 1.0)]), 5.0, 10, 10);
        assert!(matches!(result, Err(Error::IncompletePolygon)));
    }

    struct Tracked {
        events: std::vec::IntoIter<CaptureEvent>,
        pulled: Rc<Cell<usize>>,
        dropped: Rc<Cell<usize>>,
    }

    impl Iterator for Tracked {
        type Item = Result<CaptureEvent>;
        fn next(&mut self) -> Option<Self::Item> {
            self.pulled.set(self.pulled.get() + 1);
            self.events.next().map(Ok)
        }
    }

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.dropped.set(self.dropped.get() + 1);
        }
    }

    #[test]
    fn subscription_released_once_on_close() {
        let pulled = Rc::new(Cell::new(0));
        let dropped = Rc::new(Cell::new(0));
        let source = Tracked {
            events: vec![
                click(0.0, 0.0),
                click(10.0, 0.0),
                click(10.0, 10.0),
                click(1.0, 1.0),
                click(30.0, 30.0),
                click(40.0, 40.0),
            ]
            .into_iter(),
            pulled: pulled.clone(),
            dropped: dropped.clone(),
        };

        let mut session = CaptureSession::new(source, 5.0, 100, 100);
        while let Some(state) = session.step().unwrap() {
            if state == CaptureState::Closed {
                break;
            }
        }
        assert!(!session.is_subscribed());
        assert_eq!(dropped.get(), 1);
        assert_eq!(session.step().unwrap(), None);

        let poly = session.run().unwrap();
        assert_eq!(poly.len(), 4);
        assert_eq!(pulled.get(), 4);
        assert_eq!(dropped.get(), 1);
    }

    #[test]
    fn source_error_aborts_capture() {
        let events = vec![
            Ok(click(0.0, 0.0)),
            Err(Error::EventParse {
                line: 2,
                input: "oops".to_string(),
            }),
        ];
        assert!(matches!(
            capture_polygon(events, 5.0, 10, 10),
            Err(Error::EventParse { line: 2, .. })
        ));
    }

    #[test]
    fn contains_includes_boundary() {
        let poly = Polygon::from_vertices(vec![
            PixelPoint::new(0.0, 0.0),
            PixelPoint::new(4.0, 0.0),
            PixelPoint::new(4.0, 4.0),
            PixelPoint::new(0.0, 4.0),
            PixelPoint::new(0.0, 0.0),
        ])
        .unwrap();
        assert!(poly.contains(2.0, 2.0));
        assert!(poly.contains(4.0, 2.0));
        assert!(poly.contains(0.0, 0.0));
        assert!(!poly.contains(4.5, 2.0));
        assert!(!poly.contains(-0.01, 1.0));
        assert_eq!(poly.bounds(), (0.0, 0.0, 4.0, 4.0));
    }

    #[test]
    fn commit_closed_ring_uses_implicit_closing_edge() {
        let poly = Polygon::from_vertices(vec![
            PixelPoint::new(0.0, 0.0),
            PixelPoint::new(10.0, 0.0),
            PixelPoint::new(0.0, 10.0),
            PixelPoint::new(0.0, 10.0),
        ])
        .unwrap();
        assert!(poly.contains(2.0, 2.0));
        assert!(poly.contains(0.0, 5.0));
        assert!(!poly.contains(8.0, 8.0));
    }

    #[test]
    fn from_vertices_rejects_short_rings() {
        assert!(Polygon::from_vertices(vec![PixelPoint::new(0.0, 0.0); 2]).is_err());
    }
}

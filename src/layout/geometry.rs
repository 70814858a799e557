use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Point) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn midpoint(self, other: Point) -> Point {
        Point::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Axis-aligned box, `x`/`y` at the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x > self.x && point.x < self.right() && point.y > self.y && point.y < self.bottom()
    }

    /// Penetration depth on each axis once `self` is grown by `margin`.
    /// Both values are positive exactly when the padded boxes intersect.
    pub fn padded_overlap(&self, other: &Rect, margin: f32) -> (f32, f32) {
        let overlap_x = self.right().min(other.right()) - self.x.max(other.x) + margin;
        let overlap_y = self.bottom().min(other.bottom()) - self.y.max(other.y) + margin;
        (overlap_x, overlap_y)
    }

    /// The zero-overlap test: true when the gap between the two boxes is
    /// below `margin` on both axes.
    pub fn overlaps_with_margin(&self, other: &Rect, margin: f32) -> bool {
        let (overlap_x, overlap_y) = self.padded_overlap(other, margin);
        overlap_x > 0.0 && overlap_y > 0.0
    }

    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Rect::new(
            x,
            y,
            self.right().max(other.right()) - x,
            self.bottom().max(other.bottom()) - y,
        )
    }

    /// Point on the border hit by a ray from the centre towards `toward`.
    pub fn boundary_point(&self, toward: Point) -> Point {
        let c = self.center();
        let dx = toward.x - c.x;
        let dy = toward.y - c.y;
        if dx.abs() <= 1e-4 && dy.abs() <= 1e-4 {
            return c;
        }
        let half_w = self.width / 2.0;
        let half_h = self.height / 2.0;
        let scale_x = if dx.abs() > 1e-4 {
            half_w / dx.abs()
        } else {
            f32::INFINITY
        };
        let scale_y = if dy.abs() > 1e-4 {
            half_h / dy.abs()
        } else {
            f32::INFINITY
        };
        let t = scale_x.min(scale_y);
        Point::new(c.x + dx * t, c.y + dy * t)
    }

    pub fn segment_hits(&self, a: Point, b: Point) -> bool {
        if self.contains(a) || self.contains(b) {
            return true;
        }
        let corners = [
            Point::new(self.x, self.y),
            Point::new(self.right(), self.y),
            Point::new(self.right(), self.bottom()),
            Point::new(self.x, self.bottom()),
        ];
        (0..4).any(|i| segments_intersect(a, b, corners[i], corners[(i + 1) % 4]))
    }
}

pub fn bounding_rect<I>(rects: I) -> Option<Rect>
where
    I: IntoIterator<Item = Rect>,
{
    rects.into_iter().reduce(|acc, rect| acc.union(&rect))
}

fn orientation(a: Point, b: Point, c: Point) -> f32 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

fn point_on_segment(point: Point, a: Point, b: Point, eps: f32) -> bool {
    point.x >= a.x.min(b.x) - eps
        && point.x <= a.x.max(b.x) + eps
        && point.y >= a.y.min(b.y) - eps
        && point.y <= a.y.max(b.y) + eps
}

pub fn segments_intersect(a: Point, b: Point, c: Point, d: Point) -> bool {
    let eps = 1e-4;
    let o1 = orientation(a, b, c);
    let o2 = orientation(a, b, d);
    let o3 = orientation(c, d, a);
    let o4 = orientation(c, d, b);
    let crosses = ((o1 > eps && o2 < -eps) || (o1 < -eps && o2 > eps))
        && ((o3 > eps && o4 < -eps) || (o3 < -eps && o4 > eps));
    if crosses {
        return true;
    }
    if o1.abs() <= eps && point_on_segment(c, a, b, eps) {
        return true;
    }
    if o2.abs() <= eps && point_on_segment(d, a, b, eps) {
        return true;
    }
    if o3.abs() <= eps && point_on_segment(a, c, d, eps) {
        return true;
    }
    if o4.abs() <= eps && point_on_segment(b, c, d, eps) {
        return true;
    }
    false
}

/// Number of crossing pairs among straight segments. Segments that share an
/// endpoint index are never counted against each other.
pub fn count_crossings(segments: &[(usize, usize, Point, Point)]) -> usize {
    let mut crossings = 0;
    for i in 0..segments.len() {
        let (a_from, a_to, a0, a1) = segments[i];
        for &(b_from, b_to, b0, b1) in &segments[i + 1..] {
            if a_from == b_from || a_from == b_to || a_to == b_from || a_to == b_to {
                continue;
            }
            if segments_intersect(a0, a1, b0, b1) {
                crossings += 1;
            }
        }
    }
    crossings
}

pub fn polyline_length(points: &[Point]) -> f32 {
    points.windows(2).map(|pair| pair[0].distance(pair[1])).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn margin_counts_as_overlap() {
        let a = Rect::new(0.0, 0.0, 100.0, 50.0);
        let touching = Rect::new(105.0, 0.0, 100.0, 50.0);
        let clear = Rect::new(110.0, 0.0, 100.0, 50.0);
        assert!(!a.overlaps_with_margin(&touching, 0.0));
        assert!(a.overlaps_with_margin(&touching, 10.0));
        assert!(!a.overlaps_with_margin(&clear, 10.0));
        // Diagonal neighbours clear on one axis are fine.
        let diagonal = Rect::new(102.0, 80.0, 100.0, 50.0);
        assert!(!a.overlaps_with_margin(&diagonal, 10.0));
    }

    #[test]
    fn boundary_point_clips_to_border() {
        let rect = Rect::new(0.0, 0.0, 100.0, 50.0);
        let right = rect.boundary_point(Point::new(500.0, 25.0));
        assert!((right.x - 100.0).abs() < 1e-3 && (right.y - 25.0).abs() < 1e-3);
        let below = rect.boundary_point(Point::new(50.0, 400.0));
        assert!((below.x - 50.0).abs() < 1e-3 && (below.y - 50.0).abs() < 1e-3);
        assert_eq!(rect.boundary_point(rect.center()), rect.center());
    }

    #[test]
    fn crossing_count_skips_shared_endpoints() {
        let segments = vec![
            (0, 1, Point::new(0.0, 0.0), Point::new(10.0, 10.0)),
            (2, 3, Point::new(0.0, 10.0), Point::new(10.0, 0.0)),
            (0, 3, Point::new(0.0, 0.0), Point::new(10.0, 0.0)),
        ];
        assert_eq!(count_crossings(&segments), 1);
    }

    #[test]
    fn bounding_rect_of_nothing_is_none() {
        assert!(bounding_rect(Vec::new()).is_none());
        let b = bounding_rect(vec![
            Rect::new(0.0, 0.0, 10.0, 10.0),
            Rect::new(20.0, -5.0, 10.0, 10.0),
        ])
        .unwrap();
        assert_eq!(b, Rect::new(0.0, -5.0, 30.0, 15.0));
    }

    #[test]
    fn segment_through_rect_is_detected() {
        let rect = Rect::new(40.0, -10.0, 20.0, 20.0);
        assert!(rect.segment_hits(Point::new(0.0, 0.0), Point::new(100.0, 0.0)));
        assert!(!rect.segment_hits(Point::new(0.0, 50.0), Point::new(100.0, 50.0)));
        assert_eq!(polyline_length(&[Point::new(0.0, 0.0), Point::new(3.0, 4.0)]), 5.0);
    }
}

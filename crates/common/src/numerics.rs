use std::f64::consts::PI;

use crate::consts::{ATOM, ATOM_SQRT};
use crate::types::{Cplx, Real};

#[must_use]
pub fn distance(a: Cplx, b: Cplx) -> Real
{
    (a - b).norm()
}

#[must_use]
pub fn midpoint(a: Cplx, b: Cplx) -> Cplx
{
    0.5 * (a + b)
}

#[must_use]
pub fn dot(u: Cplx, v: Cplx) -> Real
{
    u.re * v.re + u.im * v.im
}

#[must_use]
pub fn cross(u: Cplx, v: Cplx) -> Real
{
    u.re * v.im - u.im * v.re
}

/// Rotate a vector a quarter turn: (x, y) to (y, -x).
#[must_use]
pub fn perp(v: Cplx) -> Cplx
{
    Cplx::new(v.im, -v.re)
}

#[must_use]
pub fn normalize(v: Cplx) -> Cplx
{
    v / v.norm()
}

/// Signed orientation of the triangle abc: +1, 0, or -1.
/// Zero when the squared cross product falls below `ATOM`.
#[must_use]
pub fn orientation(a: Cplx, b: Cplx, c: Cplx) -> i8
{
    let s = cross(b - a, c - a);
    if s * s < ATOM {
        0
    } else if s > 0. {
        1
    } else {
        -1
    }
}

#[must_use]
pub fn collinear(a: Cplx, b: Cplx, c: Cplx) -> bool
{
    orientation(a, b, c) == 0
}

/// A line stored as (unit normal n, offset c): x lies on it iff dot(x, n) = c.
#[derive(Clone, Copy, Debug)]
pub struct NumLine
{
    pub normal: Cplx,
    pub offset: Real,
}

impl NumLine
{
    /// Line through two distinct points. The caller guarantees |a - b| > 0.
    #[must_use]
    pub fn through(a: Cplx, b: Cplx) -> Self
    {
        let normal = normalize(perp(b - a));
        Self {
            normal,
            offset: dot(normal, a),
        }
    }

    /// Undirected direction of the line, in units of pi, in [0, 1).
    #[must_use]
    pub fn direction(&self) -> Real
    {
        (self.normal.im.atan2(self.normal.re) / PI + 0.5).rem_euclid(1.0)
    }

    #[must_use]
    pub fn signed_distance(&self, x: Cplx) -> Real
    {
        dot(self.normal, x) - self.offset
    }

    #[must_use]
    pub fn contains(&self, x: Cplx) -> bool
    {
        let d = self.signed_distance(x);
        d * d < ATOM
    }

    /// Coordinate of the projection of x along the line, for sorting points
    /// that lie on it.
    #[must_use]
    pub fn position_along(&self, x: Cplx) -> Real
    {
        dot(perp(self.normal), x)
    }

    /// Intersection of two lines, gated on the determinant of the 2x2 system.
    #[must_use]
    pub fn intersect(&self, other: &Self) -> Option<Cplx>
    {
        let det = cross(self.normal, other.normal);
        if det * det < ATOM {
            return None;
        }
        let x = (self.offset * other.normal.im - other.offset * self.normal.im) / det;
        let y = (other.offset * self.normal.re - self.offset * other.normal.re) / det;
        Some(Cplx::new(x, y))
    }
}

/// A circle stored as (center, radius).
#[derive(Clone, Copy, Debug)]
pub struct NumCircle
{
    pub center: Cplx,
    pub radius: Real,
}

impl NumCircle
{
    #[must_use]
    pub fn from_center(center: Cplx, through: Cplx) -> Self
    {
        Self {
            center,
            radius: distance(center, through),
        }
    }

    /// Circle through three points: intersection of two perpendicular
    /// bisectors. None when the points are (numerically) collinear.
    #[must_use]
    pub fn through(a: Cplx, b: Cplx, c: Cplx) -> Option<Self>
    {
        let bisect_ab = perpendicular_bisector(a, b)?;
        let bisect_ac = perpendicular_bisector(a, c)?;
        let center = bisect_ab.intersect(&bisect_ac)?;
        Some(Self::from_center(center, a))
    }

    #[must_use]
    pub fn contains(&self, x: Cplx) -> bool
    {
        let d = distance(self.center, x) - self.radius;
        d * d < ATOM
    }
}

#[must_use]
fn perpendicular_bisector(a: Cplx, b: Cplx) -> Option<NumLine>
{
    if distance(a, b) < ATOM_SQRT {
        return None;
    }
    let normal = normalize(b - a);
    Some(NumLine {
        normal,
        offset: dot(normal, midpoint(a, b)),
    })
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn direction_range()
    {
        let pts = [
            (Cplx::new(0., 0.), Cplx::new(1., 0.)),
            (Cplx::new(0., 0.), Cplx::new(-1., 0.)),
            (Cplx::new(0., 0.), Cplx::new(0., 1.)),
            (Cplx::new(2., 3.), Cplx::new(-5., 11.)),
        ];
        for (a, b) in pts {
            let d = NumLine::through(a, b).direction();
            assert!((0. ..1.).contains(&d));
            let d_rev = NumLine::through(b, a).direction();
            assert!((d - d_rev).abs() < ATOM_SQRT || (1. - (d - d_rev).abs()) < ATOM_SQRT);
        }
    }

    #[test]
    fn horizontal_direction_is_zero()
    {
        let d = NumLine::through(Cplx::new(0., 5.), Cplx::new(3., 5.)).direction();
        assert!(d.abs() < ATOM_SQRT || (1. - d).abs() < ATOM_SQRT);
    }

    #[test]
    fn circumcircle_of_right_triangle()
    {
        let a = Cplx::new(0., 1.);
        let b = Cplx::new(1., 0.);
        let c = Cplx::new(0., -1.);
        let circ = NumCircle::through(a, b, c).unwrap();
        assert!(circ.center.norm() < ATOM_SQRT);
        assert!((circ.radius - 1.).abs() < ATOM_SQRT);
        assert!(circ.contains(Cplx::new(-1., 0.)));
    }

    #[test]
    fn collinear_points_have_no_circle()
    {
        let a = Cplx::new(0., 0.);
        let b = Cplx::new(1., 1.);
        let c = Cplx::new(2., 2.);
        assert!(NumCircle::through(a, b, c).is_none());
        assert!(collinear(a, b, c));
    }

    #[test]
    fn intersect_perpendicular_lines()
    {
        let l1 = NumLine::through(Cplx::new(0., 0.), Cplx::new(4., 0.));
        let l2 = NumLine::through(Cplx::new(2., -1.), Cplx::new(2., 7.));
        let x = l1.intersect(&l2).unwrap();
        assert!(distance(x, Cplx::new(2., 0.)) < ATOM_SQRT);
    }

    #[test]
    fn parallel_lines_do_not_intersect()
    {
        let l1 = NumLine::through(Cplx::new(0., 0.), Cplx::new(1., 1.));
        let l2 = NumLine::through(Cplx::new(0., 1.), Cplx::new(1., 2.));
        assert!(l1.intersect(&l2).is_none());
    }
}

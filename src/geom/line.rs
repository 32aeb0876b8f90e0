use geo::{coord, Coord, Line};

/// Fractional position along `a` at which the *infinite* lines through
/// `a` and `b` intersect, or `None` when they are parallel (zero cross
/// product of the direction vectors).
///
/// This is pure algebra, not a clip: the fraction may fall outside
/// `[0, 1]`. Callers confirming that the *segments* intersect must check
/// containment of both `intersection_fraction(a, b)` and
/// `intersection_fraction(b, a)`.
pub fn intersection_fraction(a: &Line<f64>, b: &Line<f64>) -> Option<f64> {
    let r = a.delta();
    let s = b.delta();

    let r_cross_s = cross(r, s);
    if r_cross_s == 0.0 {
        return None;
    }

    let offset = b.start - a.start;
    let scaled = coord! { x: s.x / r_cross_s, y: s.y / r_cross_s };

    Some(cross(offset, scaled))
}

fn cross(u: Coord<f64>, v: Coord<f64>) -> f64 {
    u.x * v.y - u.y * v.x
}

//! Small vector helpers and the measures used by the post-processor.
//!
//! Points are plain `[f64; 3]`; nothing here allocates.

#[inline]
pub fn sub(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
pub fn add(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

#[inline]
pub fn scale(a: [f64; 3], s: f64) -> [f64; 3] {
    [a[0] * s, a[1] * s, a[2] * s]
}

#[inline]
pub fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline]
pub fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

#[inline]
pub fn norm(a: [f64; 3]) -> f64 {
    dot(a, a).sqrt()
}

#[inline]
pub fn dist2(a: [f64; 3], b: [f64; 3]) -> f64 {
    let d = sub(a, b);
    dot(d, d)
}

/// Six times the signed volume of `(a, b, c, d)`; positive when `d` lies on
/// the side of `abc` that `(b - a) x (c - a)` points to.
#[inline]
pub fn orient3d(a: [f64; 3], b: [f64; 3], c: [f64; 3], d: [f64; 3]) -> f64 {
    dot(cross(sub(b, a), sub(c, a)), sub(d, a))
}

/// Signed tetrahedron volume.
#[inline]
pub fn signed_volume(a: [f64; 3], b: [f64; 3], c: [f64; 3], d: [f64; 3]) -> f64 {
    orient3d(a, b, c, d) / 6.0
}

/// Center of the sphere through four points, or `None` when they are
/// (numerically) coplanar.
pub fn circumcenter(a: [f64; 3], b: [f64; 3], c: [f64; 3], d: [f64; 3]) -> Option<[f64; 3]> {
    let u = sub(b, a);
    let v = sub(c, a);
    let w = sub(d, a);
    let vw = cross(v, w);
    let det = 2.0 * dot(u, vw);
    if det == 0.0 || !det.is_finite() {
        return None;
    }
    let num = add(
        add(scale(vw, dot(u, u)), scale(cross(w, u), dot(v, v))),
        scale(cross(u, v), dot(w, w)),
    );
    Some(add(a, scale(num, 1.0 / det)))
}

/// Area of a planar polygon given as a cyclic vertex ring, by fanning from
/// the first vertex.
pub fn polygon_area(ring: &[[f64; 3]]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    let p0 = ring[0];
    ring[1..]
        .windows(2)
        .map(|w| 0.5 * norm(cross(sub(w[0], p0), sub(w[1], p0))))
        .sum()
}

/// Volume of a pyramid with base area `area` and height `height`.
#[inline]
pub fn pyramid_volume(area: f64, height: f64) -> f64 {
    area * height / 3.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_square_fan_area() {
        let sq = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]];
        assert!((polygon_area(&sq) - 1.0).abs() < 1e-12);
        assert_eq!(polygon_area(&sq[..2]), 0.0);
    }

    #[test]
    fn circumcenter_is_equidistant() {
        let a = [0.1, 0.0, 0.0];
        let b = [1.0, 0.2, 0.0];
        let c = [0.0, 1.0, 0.3];
        let d = [0.2, 0.1, 1.0];
        let cc = circumcenter(a, b, c, d).unwrap();
        let r = dist2(cc, a);
        for p in [b, c, d] {
            assert!((dist2(cc, p) - r).abs() < 1e-10);
        }
    }

    #[test]
    fn coplanar_points_have_no_circumcenter() {
        let z = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 1.0, 0.0]];
        assert!(circumcenter(z[0], z[1], z[2], z[3]).is_none());
    }

    #[test]
    fn orientation_sign() {
        let o = [0.0; 3];
        let x = [1.0, 0.0, 0.0];
        let y = [0.0, 1.0, 0.0];
        assert!(orient3d(o, x, y, [0.0, 0.0, 1.0]) > 0.0);
        assert!(orient3d(o, x, y, [0.0, 0.0, -1.0]) < 0.0);
        assert!((signed_volume(o, x, y, [0.0, 0.0, 1.0]) - 1.0 / 6.0).abs() < 1e-15);
    }
}

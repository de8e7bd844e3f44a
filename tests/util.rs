#![allow(dead_code)]
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tess_sieve::data::output::{RemoteTetVertex, VoronoiBlock};
use tess_sieve::geometry::metrics::signed_volume;
use tess_sieve::topology::bounds::Aabb;
use tess_sieve::topology::periodic::{WrapDir, transform_particle};

/// One particle per lattice cell of `domain`, jittered by up to `jitter`
/// lattice spacings around the cell center.
pub fn jittered_lattice(domain: &Aabb, n: [usize; 3], jitter: f64, seed: u64) -> Vec<[f64; 3]> {
    let mut rng = SmallRng::seed_from_u64(seed);
    let ext = domain.extent();
    let h = [ext[0] / n[0] as f64, ext[1] / n[1] as f64, ext[2] / n[2] as f64];
    let mut pts = Vec::with_capacity(n[0] * n[1] * n[2]);
    for k in 0..n[2] {
        for j in 0..n[1] {
            for i in 0..n[0] {
                let idx = [i, j, k];
                let mut p = [0.0; 3];
                for d in 0..3 {
                    let u: f64 = rng.r#gen::<f64>() * 2.0 - 1.0;
                    p[d] = domain.min[d] + (idx[d] as f64 + 0.5 + jitter * u) * h[d];
                }
                pts.push(p);
            }
        }
    }
    pts
}

/// Split `points` over the blocks of a regular `dims` grid, returning the
/// particles and their global indices per gid.
pub fn split_regular(
    domain: &Aabb,
    dims: [usize; 3],
    points: &[[f64; 3]],
) -> (Vec<Vec<[f64; 3]>>, Vec<Vec<usize>>) {
    let nblocks = dims[0] * dims[1] * dims[2];
    let mut parts = vec![Vec::new(); nblocks];
    let mut ids = vec![Vec::new(); nblocks];
    let ext = domain.extent();
    for (g, p) in points.iter().enumerate() {
        let mut idx = [0usize; 3];
        for d in 0..3 {
            let t = ((p[d] - domain.min[d]) / ext[d] * dims[d] as f64).floor() as isize;
            idx[d] = t.clamp(0, dims[d] as isize - 1) as usize;
        }
        let gid = idx[0] + dims[0] * (idx[1] + dims[1] * idx[2]);
        parts[gid].push(*p);
        ids[gid].push(g);
    }
    (parts, ids)
}

/// Position of a stored tet vertex in the frame of its owner.
pub fn remote_position(
    v: &RemoteTetVertex,
    particles: &[Vec<[f64; 3]>],
    domain: &Aabb,
) -> [f64; 3] {
    transform_particle(particles[v.gid][v.nid], WrapDir::NONE, v.dir, domain).0
}

/// Sum of the volumes of all tets kept by `blocks`.
pub fn total_tet_volume(
    blocks: &[VoronoiBlock],
    particles: &[Vec<[f64; 3]>],
    domain: &Aabb,
) -> f64 {
    let mut vol = 0.0;
    for b in blocks {
        for t in &b.loc_tets {
            let [p0, p1, p2, p3] = t.map(|i| particles[b.gid][i]);
            vol += signed_volume(p0, p1, p2, p3).abs();
        }
        for t in &b.rem_tets {
            let [p0, p1, p2, p3] = t.map(|v| remote_position(&v, particles, domain));
            vol += signed_volume(p0, p1, p2, p3).abs();
        }
    }
    vol
}

/// Every kept tet as a sorted list of global particle ids.
pub fn global_tets(blocks: &[VoronoiBlock], ids: &[Vec<usize>]) -> Vec<[usize; 4]> {
    let mut out = Vec::new();
    for b in blocks {
        for t in &b.loc_tets {
            let mut g = t.map(|i| ids[b.gid][i]);
            g.sort_unstable();
            out.push(g);
        }
        for t in &b.rem_tets {
            let mut g = t.map(|v| ids[v.gid][v.nid]);
            g.sort_unstable();
            out.push(g);
        }
    }
    out
}

pub fn assert_close(got: f64, want: f64, rel: f64) {
    assert!(
        ((got - want) / want).abs() <= rel,
        "got {got}, want {want} (rel tol {rel})"
    );
}

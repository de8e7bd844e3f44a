//! Incremental Bowyer-Watson tetrahedralization and its Voronoi dual.
//!
//! Points are inserted in input order into a mesh seeded with one large
//! enclosing tetrahedron. For every insertion:
//! 1. walk to the tetrahedron containing the point;
//! 2. flood the cavity of tetrahedra whose circumsphere contains it;
//! 3. grow the cavity until every boundary face sees the point strictly;
//! 4. re-star the cavity from the new point.
//!
//! Tetrahedra touching the enclosing vertices are kept until the end so the
//! dual can tell bounded from unbounded cells: a site incident to any of
//! them gets [`INFINITE_VERTEX`] in its cell.

use crate::geometry::kernel::{INFINITE_VERTEX, RawFace, RawTessellation, TessKernel};
use crate::geometry::metrics::{circumcenter, dist2, orient3d};
use crate::tess_error::TessError;
use crate::topology::bounds::Aabb;
use hashbrown::{HashMap, HashSet};
use std::collections::BTreeMap;

const NO_TET: usize = usize::MAX;

/// Insphere slack, relative to the squared circumradius.
const INSPHERE_REL_TOL: f64 = 1e-12;
/// Orientation slack, relative to the cube of the input extent.
const ORIENT_REL_TOL: f64 = 1e-12;

/// Default kernel.
#[derive(Clone, Debug)]
pub struct BowyerWatson {
    /// Half-size of the enclosing tetrahedron in units of the input extent.
    pub super_scale: f64,
    /// Particles closer than `merge_tol * extent` to an inserted one are skipped.
    pub merge_tol: f64,
}

impl Default for BowyerWatson {
    fn default() -> Self {
        Self {
            super_scale: 100.0,
            merge_tol: 1e-10,
        }
    }
}

#[derive(Clone, Debug)]
struct Tet {
    v: [usize; 4],
    center: [f64; 3],
    r2: f64,
    alive: bool,
}

struct Mesh {
    pts: Vec<[f64; 3]>,
    /// Real particles occupy `pts[..n]`, the enclosing vertices `pts[n..n + 4]`.
    n: usize,
    tets: Vec<Tet>,
    /// Sorted face triple → the (up to two) tets sharing it.
    faces: HashMap<[usize; 3], [usize; 2]>,
    last: usize,
    vol_tol: f64,
    merge2: f64,
}

#[inline]
fn face_key(v: &[usize; 4], skip: usize) -> [usize; 3] {
    let mut k = [0usize; 3];
    let mut j = 0;
    for (i, &x) in v.iter().enumerate() {
        if i != skip {
            k[j] = x;
            j += 1;
        }
    }
    k.sort_unstable();
    k
}

impl Mesh {
    fn new(particles: &[[f64; 3]], kernel: &BowyerWatson) -> Result<Self, TessError> {
        if particles.iter().flatten().any(|c| !c.is_finite()) {
            return Err(TessError::DegenerateInput(
                "particle with non-finite coordinate".into(),
            ));
        }
        let bb = Aabb::of_points(particles.iter().copied()).ok_or(
            TessError::InsufficientParticles { count: 0 },
        )?;
        let ext = bb.extent();
        let mut len = ext[0].max(ext[1]).max(ext[2]);
        if len <= 0.0 {
            len = 1.0;
        }
        let c = [
            0.5 * (bb.min[0] + bb.max[0]),
            0.5 * (bb.min[1] + bb.max[1]),
            0.5 * (bb.min[2] + bb.max[2]),
        ];
        let s = kernel.super_scale * len;
        let mut pts = particles.to_vec();
        for sign in [[1.0, 1.0, 1.0], [1.0, -1.0, -1.0], [-1.0, 1.0, -1.0], [-1.0, -1.0, 1.0]] {
            pts.push([c[0] + s * sign[0], c[1] + s * sign[1], c[2] + s * sign[2]]);
        }
        let n = particles.len();
        let mut mesh = Self {
            pts,
            n,
            tets: Vec::new(),
            faces: HashMap::new(),
            last: 0,
            vol_tol: ORIENT_REL_TOL * len * len * len,
            merge2: (kernel.merge_tol * len).powi(2),
        };
        mesh.add_tet([n, n + 1, n + 2, n + 3])?;
        Ok(mesh)
    }

    #[inline]
    fn orient(&self, v: &[usize; 4]) -> f64 {
        orient3d(self.pts[v[0]], self.pts[v[1]], self.pts[v[2]], self.pts[v[3]])
    }

    /// Orientation of tet `t` with its `i`-th vertex replaced by `p`.
    #[inline]
    fn orient_with(&self, t: usize, i: usize, p: [f64; 3]) -> f64 {
        let v = self.tets[t].v;
        let mut q = [
            self.pts[v[0]],
            self.pts[v[1]],
            self.pts[v[2]],
            self.pts[v[3]],
        ];
        q[i] = p;
        orient3d(q[0], q[1], q[2], q[3])
    }

    fn add_tet(&mut self, mut v: [usize; 4]) -> Result<usize, TessError> {
        if self.orient(&v) < 0.0 {
            v.swap(0, 1);
        }
        let [a, b, c, d] = v.map(|i| self.pts[i]);
        let center = circumcenter(a, b, c, d).ok_or_else(|| {
            TessError::DegenerateInput(format!("flat tetrahedron {v:?}"))
        })?;
        let id = self.tets.len();
        self.tets.push(Tet {
            v,
            center,
            r2: dist2(center, a),
            alive: true,
        });
        for i in 0..4 {
            let slots = self.faces.entry(face_key(&v, i)).or_insert([NO_TET; 2]);
            if slots[0] == NO_TET {
                slots[0] = id;
            } else {
                debug_assert_eq!(slots[1], NO_TET, "face shared by three tets");
                slots[1] = id;
            }
        }
        Ok(id)
    }

    fn kill_tet(&mut self, t: usize) {
        self.tets[t].alive = false;
        let v = self.tets[t].v;
        for i in 0..4 {
            let key = face_key(&v, i);
            if let Some(slots) = self.faces.get_mut(&key) {
                if slots[0] == t {
                    slots[0] = slots[1];
                    slots[1] = NO_TET;
                } else if slots[1] == t {
                    slots[1] = NO_TET;
                }
                if slots[0] == NO_TET {
                    self.faces.remove(&key);
                }
            }
        }
    }

    /// Tet across face `i` (the face opposite `v[i]`) of `t`.
    #[inline]
    fn across(&self, t: usize, i: usize) -> Option<usize> {
        let slots = self.faces.get(&face_key(&self.tets[t].v, i))?;
        slots.iter().copied().find(|&s| s != NO_TET && s != t)
    }

    #[inline]
    fn in_sphere(&self, t: usize, p: [f64; 3]) -> bool {
        let tet = &self.tets[t];
        tet.r2 - dist2(tet.center, p) > INSPHERE_REL_TOL * tet.r2
    }

    fn locate(&self, p: [f64; 3]) -> Result<usize, TessError> {
        let mut t = self.last;
        if !self.tets[t].alive {
            t = self
                .tets
                .iter()
                .rposition(|x| x.alive)
                .ok_or_else(|| TessError::DegenerateInput("empty mesh".into()))?;
        }
        let max_steps = self.tets.len() + 16;
        'walk: for _ in 0..max_steps {
            for i in 0..4 {
                if self.orient_with(t, i, p) < -self.vol_tol {
                    match self.across(t, i) {
                        Some(next) => {
                            t = next;
                            continue 'walk;
                        }
                        None => break 'walk,
                    }
                }
            }
            return Ok(t);
        }
        // Walk cycled on a near-degenerate configuration; scan instead.
        let alive = || self.tets.iter().enumerate().filter(|(_, x)| x.alive);
        alive()
            .find(|(t, _)| (0..4).all(|i| self.orient_with(*t, i, p) >= -self.vol_tol))
            .or_else(|| alive().find(|(t, _)| self.in_sphere(*t, p)))
            .map(|(t, _)| t)
            .ok_or_else(|| {
                TessError::DegenerateInput(format!("cannot locate point {p:?}"))
            })
    }

    /// Insert particle `pi`. Returns `false` when it coincides with an
    /// already inserted particle and was skipped.
    fn insert(&mut self, pi: usize) -> Result<bool, TessError> {
        let p = self.pts[pi];
        let start = self.locate(p)?;
        if self.tets[start]
            .v
            .iter()
            .any(|&x| dist2(self.pts[x], p) <= self.merge2)
        {
            return Ok(false);
        }

        let mut cavity = vec![start];
        let mut in_cavity: HashSet<usize> = HashSet::new();
        in_cavity.insert(start);
        let mut stack = vec![start];
        while let Some(c) = stack.pop() {
            for i in 0..4 {
                if let Some(nb) = self.across(c, i) {
                    if !in_cavity.contains(&nb) && self.in_sphere(nb, p) {
                        in_cavity.insert(nb);
                        cavity.push(nb);
                        stack.push(nb);
                    }
                }
            }
        }

        let mut boundary = Vec::new();
        loop {
            boundary.clear();
            let mut grow = Vec::new();
            for &c in &cavity {
                for i in 0..4 {
                    let nb = self.across(c, i);
                    if nb.is_some_and(|x| in_cavity.contains(&x)) {
                        continue;
                    }
                    if self.orient_with(c, i, p) > self.vol_tol {
                        boundary.push((c, i));
                    } else {
                        match nb {
                            Some(x) => grow.push(x),
                            None => {
                                return Err(TessError::DegenerateInput(format!(
                                    "particle {pi} escapes the enclosing tetrahedron"
                                )));
                            }
                        }
                    }
                }
            }
            if grow.is_empty() {
                break;
            }
            for x in grow {
                if in_cavity.insert(x) {
                    cavity.push(x);
                }
            }
        }

        let new_tets: Vec<[usize; 4]> = boundary
            .iter()
            .map(|&(c, i)| {
                let mut v = self.tets[c].v;
                v[i] = pi;
                v
            })
            .collect();
        for &c in &cavity {
            self.kill_tet(c);
        }
        for v in new_tets {
            self.last = self.add_tet(v)?;
        }
        Ok(true)
    }

    #[inline]
    fn is_finite(&self, t: usize) -> bool {
        self.tets[t].v.iter().all(|&x| x < self.n)
    }

    /// Build the Voronoi dual of the first `num_orig` particles.
    fn into_tessellation(self, num_orig: usize) -> Result<RawTessellation, TessError> {
        let mut vid = vec![INFINITE_VERTEX; self.tets.len()];
        let mut verts = vec![[f64::INFINITY; 3]];
        let mut tets = Vec::new();
        for (t, tet) in self.tets.iter().enumerate() {
            if tet.alive && self.is_finite(t) {
                vid[t] = verts.len();
                verts.push(tet.center);
                tets.push(tet.v);
            }
        }
        if tets.is_empty() {
            return Err(TessError::DegenerateInput(
                "particles span no tetrahedron (coplanar input)".into(),
            ));
        }

        let mut cells: Vec<Vec<usize>> = vec![Vec::new(); num_orig];
        let mut edges: BTreeMap<(usize, usize), Vec<usize>> = BTreeMap::new();
        for (t, tet) in self.tets.iter().enumerate() {
            if !tet.alive {
                continue;
            }
            for &x in &tet.v {
                if x < num_orig {
                    cells[x].push(vid[t]);
                }
            }
            for i in 0..4 {
                for j in (i + 1)..4 {
                    let (a, b) = (tet.v[i].min(tet.v[j]), tet.v[i].max(tet.v[j]));
                    if b < self.n && a < num_orig {
                        edges.entry((a, b)).or_default().push(t);
                    }
                }
            }
        }
        for cell in &mut cells {
            cell.sort_unstable();
            cell.dedup();
        }

        let faces = edges
            .into_iter()
            .map(|((a, b), around)| {
                let ring = self.edge_ring(a, b, &around);
                let mut fv: Vec<usize> = Vec::with_capacity(ring.len());
                for t in ring {
                    let id = vid[t];
                    if id == INFINITE_VERTEX && fv.last() == Some(&INFINITE_VERTEX) {
                        continue;
                    }
                    fv.push(id);
                }
                if fv.len() > 1 && fv[0] == INFINITE_VERTEX && fv.last() == Some(&INFINITE_VERTEX)
                {
                    fv.pop();
                }
                RawFace {
                    cells: [a, b],
                    verts: fv,
                }
            })
            .collect();

        Ok(RawTessellation {
            verts,
            cells,
            faces,
            tets,
        })
    }

    /// Tets around edge `(a, b)` in cyclic order.
    fn edge_ring(&self, a: usize, b: usize, around: &[usize]) -> Vec<usize> {
        let others = |t: usize| -> [usize; 2] {
            let mut o = [NO_TET; 2];
            let mut j = 0;
            for &x in &self.tets[t].v {
                if x != a && x != b && j < 2 {
                    o[j] = x;
                    j += 1;
                }
            }
            o
        };
        let mut used = vec![false; around.len()];
        used[0] = true;
        let mut ring = vec![around[0]];
        let [first, mut cur] = others(around[0]);
        while cur != first {
            let next = (0..around.len()).find(|&k| !used[k] && others(around[k]).contains(&cur));
            let Some(k) = next else { break };
            used[k] = true;
            ring.push(around[k]);
            let o = others(around[k]);
            cur = if o[0] == cur { o[1] } else { o[0] };
        }
        ring
    }
}

impl TessKernel for BowyerWatson {
    fn tessellate(
        &self,
        particles: &[[f64; 3]],
        num_orig: usize,
    ) -> Result<RawTessellation, TessError> {
        if particles.len() < 4 {
            return Err(TessError::InsufficientParticles {
                count: particles.len(),
            });
        }
        let num_orig = num_orig.min(particles.len());
        let mut mesh = Mesh::new(particles, self)?;
        let mut skipped = 0usize;
        for pi in 0..particles.len() {
            if !mesh.insert(pi)? {
                skipped += 1;
            }
        }
        if skipped > 0 {
            log::debug!("skipped {skipped} coincident particles");
        }
        mesh.into_tessellation(num_orig)
    }
}

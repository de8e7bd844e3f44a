//! Face adjacency, areas and volumes of the final cells.

use crate::config::TessConfig;
use crate::data::output::CompleteCell;
use crate::geometry::kernel::RawFace;
use crate::geometry::metrics::{dist2, polygon_area, pyramid_volume};

/// Faces of each original cell in CSR form: the faces of cell `i` are
/// `faces[start[i]..start[i + 1]]`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CellFaces {
    pub start: Vec<usize>,
    pub faces: Vec<usize>,
}

impl CellFaces {
    #[inline]
    pub fn of(&self, cell: usize) -> &[usize] {
        &self.faces[self.start[cell]..self.start[cell + 1]]
    }

    pub fn num_cells(&self) -> usize {
        self.start.len().saturating_sub(1)
    }
}

/// Index every face under each original cell it bounds. Ghost sides are
/// ignored.
pub fn cell_faces(faces: &[RawFace], num_orig: usize) -> CellFaces {
    let mut counts = vec![0usize; num_orig];
    for face in faces {
        for &c in &face.cells {
            if c < num_orig {
                counts[c] += 1;
            }
        }
    }
    let mut start = Vec::with_capacity(num_orig + 1);
    start.push(0);
    for &n in &counts {
        let last = start[start.len() - 1];
        start.push(last + n);
    }

    let mut fill = start[..num_orig].to_vec();
    let mut out = vec![0usize; start[num_orig]];
    for (f, face) in faces.iter().enumerate() {
        for &c in &face.cells {
            if c < num_orig {
                out[fill[c]] = f;
                fill[c] += 1;
            }
        }
    }
    CellFaces { start, faces: out }
}

/// Area of every face; unbounded faces get `f64::INFINITY`.
pub fn face_areas(faces: &[RawFace], verts: &[[f64; 3]]) -> Vec<f64> {
    faces
        .iter()
        .map(|face| {
            if face.is_bounded() {
                let ring: Vec<[f64; 3]> = face.verts.iter().map(|&v| verts[v]).collect();
                polygon_area(&ring)
            } else {
                f64::INFINITY
            }
        })
        .collect()
}

/// `(volume, area)` of every original cell.
///
/// Each face is the base of a pyramid with its apex at the site; the height
/// is half the distance between the two sites the face separates. Cells
/// with an unbounded face report infinite volume and area.
pub fn cell_volumes(
    cell_faces: &CellFaces,
    faces: &[RawFace],
    areas: &[f64],
    sites: &[[f64; 3]],
) -> Vec<(f64, f64)> {
    (0..cell_faces.num_cells())
        .map(|i| {
            let mut vol = 0.0;
            let mut area = 0.0;
            for &f in cell_faces.of(i) {
                let a = areas[f];
                if !a.is_finite() {
                    return (f64::INFINITY, f64::INFINITY);
                }
                let [c0, c1] = faces[f].cells;
                let other = if c0 == i { c1 } else { c0 };
                let height = 0.5 * dist2(sites[i], sites[other]).sqrt();
                vol += pyramid_volume(a, height);
                area += a;
            }
            (vol, area)
        })
        .collect()
}

/// Complete cells whose volume passes the configured range.
pub fn filter_cells(
    flags: &[bool],
    vols: &[(f64, f64)],
    cell_faces: &CellFaces,
    config: &TessConfig,
) -> Vec<CompleteCell> {
    let mut kept = Vec::new();
    for (cell, (&complete, &(volume, area))) in flags.iter().zip(vols).enumerate() {
        if !complete {
            continue;
        }
        if volume == 0.0 {
            log::warn!("found cell with 0.0 volume");
        }
        if config.volume_in_range(volume) {
            kept.push(CompleteCell {
                cell,
                volume,
                area,
                faces: cell_faces.of(cell).to_vec(),
            });
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::kernel::INFINITE_VERTEX;

    const CORNERS: [[f64; 3]; 4] = [
        [1.0, 1.0, 1.0],
        [1.0, -1.0, -1.0],
        [-1.0, 1.0, -1.0],
        [-1.0, -1.0, 1.0],
    ];

    /// Site at the origin whose cell is the regular tetrahedron on
    /// `CORNERS`, cut out by four ghosts at `-2/3` of each corner.
    fn tet_cell() -> (Vec<[f64; 3]>, Vec<[f64; 3]>, Vec<RawFace>) {
        let mut sites = vec![[0.0; 3]];
        sites.extend(CORNERS.iter().map(|c| c.map(|x| -2.0 * x / 3.0)));
        let mut verts = vec![[f64::INFINITY; 3]];
        verts.extend(CORNERS);
        let faces = (1..=4)
            .map(|g| RawFace {
                cells: [0, g],
                verts: (1..=4).filter(|&v| v != g).collect(),
            })
            .collect();
        (sites, verts, faces)
    }

    #[test]
    fn regular_tetrahedron_cell() {
        let (sites, verts, faces) = tet_cell();
        let cf = cell_faces(&faces, 1);
        assert_eq!(cf.start, vec![0, 4]);
        let areas = face_areas(&faces, &verts);
        for a in &areas {
            assert!((a - 2.0 * 3f64.sqrt()).abs() < 1e-12);
        }
        let vols = cell_volumes(&cf, &faces, &areas, &sites);
        let expected = 8.0 / 3.0;
        assert!(((vols[0].0 - expected) / expected).abs() < 1e-5);
        assert!((vols[0].1 - 8.0 * 3f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn csr_counts_both_original_sides() {
        let faces = vec![
            RawFace { cells: [0, 1], verts: vec![1, 2, 3] },
            RawFace { cells: [1, 5], verts: vec![1, 2, 4] },
            RawFace { cells: [2, 0], verts: vec![2, 3, 4] },
        ];
        let cf = cell_faces(&faces, 3);
        assert_eq!(cf.start, vec![0, 2, 4, 5]);
        assert_eq!(cf.of(0), &[0, 2]);
        assert_eq!(cf.of(1), &[0, 1]);
        assert_eq!(cf.of(2), &[2]);
    }

    #[test]
    fn unbounded_face_makes_volume_infinite() {
        let (sites, verts, mut faces) = tet_cell();
        faces[0].verts.push(INFINITE_VERTEX);
        let cf = cell_faces(&faces, 1);
        let areas = face_areas(&faces, &verts);
        assert!(areas[0].is_infinite());
        assert!(cell_volumes(&cf, &faces, &areas, &sites)[0].0.is_infinite());
    }

    #[test]
    fn disabled_filter_keeps_every_complete_cell() {
        let cf = CellFaces { start: vec![0, 0, 0, 0], faces: vec![] };
        let flags = [true, false, true];
        let vols = [(0.5, 1.0), (2.0, 3.0), (4.0, 5.0)];
        let unfiltered = filter_cells(&flags, &vols, &cf, &TessConfig::default());
        assert_eq!(unfiltered.iter().map(|c| c.cell).collect::<Vec<_>>(), vec![0, 2]);

        let ranged = TessConfig::default().with_volume_range(1.0, 0.0);
        assert_eq!(filter_cells(&flags, &vols, &cf, &ranged).len(), 1);
        let capped = TessConfig::default().with_volume_range(0.0, 1.0);
        assert_eq!(filter_cells(&flags, &vols, &cf, &capped)[0].cell, 0);
    }
}

//! Summary statistics over finished blocks.
//!
//! Local summaries are combined with two pure functions: [`average`] merges
//! totals, weighted averages and ranges; [`histogram`] merges bin counts.
//! [`reduce_stats`] runs them across ranks: averages are gathered on rank 0
//! and the global range is broadcast so every rank bins its own cells on
//! the same edges before the histograms are gathered.

use crate::algs::communicator::{Communicator, ExchangeTags};
use crate::algs::completion::data_exchange::exchange_bytes;
use crate::config::TessConfig;
use crate::data::output::{Times, VoronoiBlock};
use crate::tess_error::TessError;
use itertools::{EitherOrBoth, Itertools};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub tot_tets: usize,
    pub tot_cells: usize,
    /// Faces counted once per complete cell, so shared faces count twice.
    pub tot_faces: usize,
    pub tot_verts: usize,
    pub avg_cell_verts: f64,
    pub avg_cell_faces: f64,
    pub avg_face_verts: f64,
    pub min_cell_vol: f64,
    pub max_cell_vol: f64,
    pub avg_cell_vol: f64,
    pub min_cell_dense: f64,
    pub max_cell_dense: f64,
    pub avg_cell_dense: f64,
    pub min_times: Times,
    pub max_times: Times,
    pub vol_hist: Vec<usize>,
    pub dense_hist: Vec<usize>,
}

impl Stats {
    fn empty(config: &TessConfig) -> Self {
        Self {
            tot_tets: 0,
            tot_cells: 0,
            tot_faces: 0,
            tot_verts: 0,
            avg_cell_verts: 0.0,
            avg_cell_faces: 0.0,
            avg_face_verts: 0.0,
            min_cell_vol: f64::INFINITY,
            max_cell_vol: f64::NEG_INFINITY,
            avg_cell_vol: 0.0,
            min_cell_dense: f64::INFINITY,
            max_cell_dense: f64::NEG_INFINITY,
            avg_cell_dense: 0.0,
            min_times: Times::splat(f64::INFINITY),
            max_times: Times::splat(f64::NEG_INFINITY),
            vol_hist: vec![0; config.num_vol_bins],
            dense_hist: vec![0; config.num_dense_bins],
        }
    }

    /// Summary of this rank's blocks, histograms left empty.
    pub fn collect(blocks: &[VoronoiBlock], config: &TessConfig) -> Self {
        let mut s = Self::empty(config);
        let mut cell_verts = 0usize;
        let mut face_verts = 0usize;
        let mut tot_vol = 0.0;
        let mut tot_dense = 0.0;

        for b in blocks {
            s.tot_tets += b.loc_tets.len() + b.rem_tets.len();
            s.tot_verts += b.verts.len().saturating_sub(1);
            s.min_times = s.min_times.zip_with(b.times, f64::min);
            s.max_times = s.max_times.zip_with(b.times, f64::max);

            for c in &b.complete_cells {
                s.tot_cells += 1;
                s.tot_faces += c.faces.len();
                face_verts += c.faces.iter().map(|&f| b.faces[f].verts.len()).sum::<usize>();
                cell_verts += c
                    .faces
                    .iter()
                    .flat_map(|&f| b.faces[f].verts.iter())
                    .unique()
                    .count();

                tot_vol += c.volume;
                s.min_cell_vol = s.min_cell_vol.min(c.volume);
                s.max_cell_vol = s.max_cell_vol.max(c.volume);
                if c.volume > 0.0 {
                    let dense = 1.0 / c.volume;
                    tot_dense += dense;
                    s.min_cell_dense = s.min_cell_dense.min(dense);
                    s.max_cell_dense = s.max_cell_dense.max(dense);
                }
            }
        }

        if s.tot_cells > 0 {
            let n = s.tot_cells as f64;
            s.avg_cell_verts = cell_verts as f64 / n;
            s.avg_cell_faces = s.tot_faces as f64 / n;
            s.avg_cell_vol = tot_vol / n;
            s.avg_cell_dense = tot_dense / n;
        }
        if s.tot_faces > 0 {
            s.avg_face_verts = face_verts as f64 / s.tot_faces as f64;
        }
        s
    }

    /// Count this rank's cells into the volume and density histograms,
    /// using the ranges already stored in `self`.
    pub fn bin_cells(&mut self, blocks: &[VoronoiBlock]) {
        let nv = self.vol_hist.len();
        let nd = self.dense_hist.len();
        for c in blocks.iter().flat_map(|b| b.complete_cells.iter()) {
            if nv > 0 {
                self.vol_hist[bin(c.volume, self.min_cell_vol, self.max_cell_vol, nv)] += 1;
            }
            if nd > 0 && c.volume > 0.0 {
                let dense = 1.0 / c.volume;
                self.dense_hist[bin(dense, self.min_cell_dense, self.max_cell_dense, nd)] += 1;
            }
        }
    }

    pub fn vol_bin_width(&self) -> f64 {
        (self.max_cell_vol - self.min_cell_vol) / self.vol_hist.len().max(1) as f64
    }

    pub fn dense_bin_width(&self) -> f64 {
        (self.max_cell_dense - self.min_cell_dense) / self.dense_hist.len().max(1) as f64
    }

    fn to_bytes(&self) -> Result<Vec<u8>, TessError> {
        Ok(bincode::serialize(self)?)
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, TessError> {
        Ok(bincode::deserialize(bytes)?)
    }
}

fn weighted(a: f64, wa: usize, b: f64, wb: usize) -> f64 {
    let total = wa + wb;
    if total == 0 {
        return a;
    }
    (a * wa as f64 + b * wb as f64) / total as f64
}

/// Merge two summaries: totals add, averages are weighted by cell count
/// (face vertices by face count), ranges widen. Histograms come from `b`.
pub fn average(a: &Stats, b: &Stats) -> Stats {
    Stats {
        tot_tets: a.tot_tets + b.tot_tets,
        tot_cells: a.tot_cells + b.tot_cells,
        tot_faces: a.tot_faces + b.tot_faces,
        tot_verts: a.tot_verts + b.tot_verts,
        avg_cell_verts: weighted(a.avg_cell_verts, a.tot_cells, b.avg_cell_verts, b.tot_cells),
        avg_cell_faces: weighted(a.avg_cell_faces, a.tot_cells, b.avg_cell_faces, b.tot_cells),
        avg_face_verts: weighted(a.avg_face_verts, a.tot_faces, b.avg_face_verts, b.tot_faces),
        min_cell_vol: a.min_cell_vol.min(b.min_cell_vol),
        max_cell_vol: a.max_cell_vol.max(b.max_cell_vol),
        avg_cell_vol: weighted(a.avg_cell_vol, a.tot_cells, b.avg_cell_vol, b.tot_cells),
        min_cell_dense: a.min_cell_dense.min(b.min_cell_dense),
        max_cell_dense: a.max_cell_dense.max(b.max_cell_dense),
        avg_cell_dense: weighted(a.avg_cell_dense, a.tot_cells, b.avg_cell_dense, b.tot_cells),
        min_times: a.min_times.zip_with(b.min_times, f64::min),
        max_times: a.max_times.zip_with(b.max_times, f64::max),
        vol_hist: b.vol_hist.clone(),
        dense_hist: b.dense_hist.clone(),
    }
}

/// Sum the bins of two summaries that share their ranges; everything else
/// comes from `a`.
pub fn histogram(a: &Stats, b: &Stats) -> Stats {
    let add = |x: &[usize], y: &[usize]| -> Vec<usize> {
        x.iter()
            .zip_longest(y)
            .map(|p| match p {
                EitherOrBoth::Both(l, r) => l + r,
                EitherOrBoth::Left(n) | EitherOrBoth::Right(n) => *n,
            })
            .collect()
    };
    Stats {
        vol_hist: add(&a.vol_hist, &b.vol_hist),
        dense_hist: add(&a.dense_hist, &b.dense_hist),
        ..a.clone()
    }
}

/// Bin index of `value` among `nbins` equal bins on `[min, max]`. The right
/// edge belongs to the last bin, as does everything when the range is empty.
pub fn bin(value: f64, min: f64, max: f64, nbins: usize) -> usize {
    let last = nbins.saturating_sub(1);
    if !(max > min) {
        return last;
    }
    let k = ((value - min) / ((max - min) / nbins as f64)).floor();
    if k.is_nan() || k < 0.0 {
        0
    } else {
        (k as usize).min(last)
    }
}

/// Global statistics on rank 0. Other ranks get the global averages and
/// ranges with their local histograms. Collective over `comm`.
pub fn reduce_stats<C>(
    local: &Stats,
    blocks: &[VoronoiBlock],
    comm: &C,
) -> Result<Stats, TessError>
where
    C: Communicator,
{
    let tags_avg = ExchangeTags::STATS;
    let tags_bcast = ExchangeTags::from_base(ExchangeTags::STATS.sizes.offset(2));
    let tags_hist = ExchangeTags::from_base(ExchangeTags::STATS.sizes.offset(4));

    let mut global = gather_fold(local, comm, tags_avg, average)?;
    global = broadcast(global, comm, tags_bcast)?;
    global.bin_cells(blocks);
    gather_fold(&global, comm, tags_hist, histogram)
}

fn gather_fold<C>(
    mine: &Stats,
    comm: &C,
    tags: ExchangeTags,
    combine: fn(&Stats, &Stats) -> Stats,
) -> Result<Stats, TessError>
where
    C: Communicator,
{
    if comm.size() <= 1 {
        return Ok(mine.clone());
    }
    let mut payloads = BTreeMap::new();
    let mut recv_from = BTreeSet::new();
    if comm.rank() == 0 {
        recv_from.extend(1..comm.size());
    } else {
        payloads.insert(0, mine.to_bytes()?);
    }
    let received = exchange_bytes(&payloads, &recv_from, comm, tags)?;
    let mut acc = mine.clone();
    for bytes in received.values() {
        acc = combine(&Stats::from_bytes(bytes)?, &acc);
    }
    Ok(acc)
}

fn broadcast<C>(stats: Stats, comm: &C, tags: ExchangeTags) -> Result<Stats, TessError>
where
    C: Communicator,
{
    if comm.size() <= 1 {
        return Ok(stats);
    }
    let mut payloads = BTreeMap::new();
    let mut recv_from = BTreeSet::new();
    if comm.rank() == 0 {
        let bytes = stats.to_bytes()?;
        for r in 1..comm.size() {
            payloads.insert(r, bytes.clone());
        }
    } else {
        recv_from.insert(0);
    }
    let mut received = exchange_bytes(&payloads, &recv_from, comm, tags)?;
    match received.remove(&0) {
        Some(bytes) => {
            let mut global = Stats::from_bytes(&bytes)?;
            global.vol_hist.iter_mut().for_each(|n| *n = 0);
            global.dense_hist.iter_mut().for_each(|n| *n = 0);
            Ok(global)
        }
        None => Ok(stats),
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "----------------- global stats ------------------")?;
        writeln!(
            f,
            "[min, max] local tessellation time = [{:.3}, {:.3}] s",
            self.min_times.local, self.max_times.local
        )?;
        writeln!(
            f,
            "[min, max] particle exchange time = [{:.3}, {:.3}] s",
            self.min_times.exchange, self.max_times.exchange
        )?;
        writeln!(
            f,
            "[min, max] cell time = [{:.3}, {:.3}] s",
            self.min_times.cells, self.max_times.cells
        )?;
        writeln!(
            f,
            "[min, max] cell volume / area time = [{:.3}, {:.3}] s",
            self.min_times.volumes, self.max_times.volumes
        )?;
        writeln!(f, "-----")?;
        writeln!(f, "total tets found = {}", self.tot_tets)?;
        writeln!(f, "total cells found = {}", self.tot_cells)?;
        writeln!(f, "total cell vertices found = {}", self.tot_verts)?;
        if self.tot_cells == 0 {
            return writeln!(f, "-------------------------------------------------");
        }
        writeln!(f, "average number of vertices per cell = {:.0}", self.avg_cell_verts)?;
        writeln!(f, "average number of faces per cell = {:.0}", self.avg_cell_faces)?;
        writeln!(f, "average number of vertices per face = {:.0}", self.avg_face_verts)?;
        writeln!(f, "-----")?;
        writeln!(
            f,
            "min cell volume = {:.3} max cell volume = {:.3} avg cell volume = {:.3} units^3",
            self.min_cell_vol, self.max_cell_vol, self.avg_cell_vol
        )?;
        writeln!(f, "number of cell volume histogram bins = {}", self.vol_hist.len())?;
        write_hist(f, "cell volume", self.min_cell_vol, self.vol_bin_width(), &self.vol_hist)?;
        writeln!(
            f,
            "min cell density = {:.3} max cell density = {:.3} avg cell density = {:.3} units^-3",
            self.min_cell_dense, self.max_cell_dense, self.avg_cell_dense
        )?;
        write_hist(f, "cell density", self.min_cell_dense, self.dense_bin_width(), &self.dense_hist)?;
        writeln!(f, "-------------------------------------------------")
    }
}

fn write_hist(
    f: &mut fmt::Formatter<'_>,
    what: &str,
    min: f64,
    width: f64,
    counts: &[usize],
) -> fmt::Result {
    writeln!(f, "-----")?;
    writeln!(f, "{what} histogram:")?;
    writeln!(f, "min value\tcount\t\tmax value")?;
    for (k, n) in counts.iter().enumerate() {
        let lo = min + k as f64 * width;
        writeln!(f, "{lo:.3}\t\t{n}\t\t{:.3}", lo + width)?;
    }
    writeln!(f, "-----")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::output::CompleteCell;
    use crate::geometry::kernel::RawFace;
    use crate::topology::bounds::Aabb;

    fn block_with_volumes(vols: &[f64]) -> VoronoiBlock {
        let faces = vec![
            RawFace { cells: [0, 1], verts: vec![1, 2, 3] },
            RawFace { cells: [0, 2], verts: vec![2, 3, 4, 5] },
        ];
        VoronoiBlock {
            gid: 0,
            bounds: Aabb::unit(),
            num_orig: vols.len(),
            verts: vec![[0.0; 3]; 6],
            cells: vec![],
            faces,
            cell_faces_start: vec![],
            cell_faces: vec![],
            face_areas: vec![],
            flags: vec![true; vols.len()],
            complete_cells: vols
                .iter()
                .enumerate()
                .map(|(cell, &volume)| CompleteCell {
                    cell,
                    volume,
                    area: 1.0,
                    faces: vec![0, 1],
                })
                .collect(),
            loc_tets: vec![[0, 1, 2, 3]],
            rem_tets: vec![],
            times: Times { total: 1.0, ..Times::default() },
        }
    }

    #[test]
    fn collect_counts_and_ranges() {
        let s = Stats::collect(&[block_with_volumes(&[1.0, 2.0, 4.0])], &TessConfig::default());
        assert_eq!(s.tot_cells, 3);
        assert_eq!(s.tot_faces, 6);
        assert_eq!(s.tot_tets, 1);
        assert_eq!(s.tot_verts, 5);
        assert_eq!(s.avg_cell_faces, 2.0);
        assert_eq!(s.avg_cell_verts, 5.0);
        assert_eq!(s.avg_face_verts, 3.5);
        assert_eq!(s.min_cell_vol, 1.0);
        assert_eq!(s.max_cell_vol, 4.0);
        assert!((s.avg_cell_vol - 7.0 / 3.0).abs() < 1e-12);
        assert_eq!(s.min_cell_dense, 0.25);
        assert_eq!(s.max_cell_dense, 1.0);
        assert_eq!(s.max_times.total, 1.0);
    }

    #[test]
    fn average_weights_by_cell_count() {
        let cfg = TessConfig::default();
        let a = Stats::collect(&[block_with_volumes(&[1.0])], &cfg);
        let b = Stats::collect(&[block_with_volumes(&[4.0, 4.0, 4.0])], &cfg);
        let m = average(&a, &b);
        assert_eq!(m.tot_cells, 4);
        assert_eq!(m.tot_faces, 8);
        assert!((m.avg_cell_vol - 13.0 / 4.0).abs() < 1e-12);
        assert_eq!(m.min_cell_vol, 1.0);
        assert_eq!(m.max_cell_vol, 4.0);
        // same as collecting both at once
        let both = Stats::collect(
            &[block_with_volumes(&[1.0]), block_with_volumes(&[4.0, 4.0, 4.0])],
            &cfg,
        );
        assert!((both.avg_cell_vol - m.avg_cell_vol).abs() < 1e-12);
    }

    #[test]
    fn averaging_with_nothing_is_identity() {
        let cfg = TessConfig::default();
        let a = Stats::collect(&[block_with_volumes(&[2.0])], &cfg);
        let none = Stats::collect(&[], &cfg);
        let m = average(&none, &a);
        assert_eq!(m.avg_cell_vol, 2.0);
        assert_eq!(m.min_cell_vol, 2.0);
        assert_eq!(m.min_times, a.min_times);
    }

    #[test]
    fn right_edge_goes_to_last_bin() {
        assert_eq!(bin(0.0, 0.0, 1.0, 4), 0);
        assert_eq!(bin(0.26, 0.0, 1.0, 4), 1);
        assert_eq!(bin(1.0, 0.0, 1.0, 4), 3);
        assert_eq!(bin(5.0, 5.0, 5.0, 4), 3);
    }

    #[test]
    fn histograms_add() {
        let cfg = TessConfig::default().with_bins(2, 2);
        let blocks = [block_with_volumes(&[1.0, 2.0, 4.0])];
        let mut s = Stats::collect(&blocks, &cfg);
        s.bin_cells(&blocks);
        assert_eq!(s.vol_hist, vec![2, 1]);
        assert_eq!(s.dense_hist, vec![2, 1]);
        let doubled = histogram(&s, &s);
        assert_eq!(doubled.vol_hist, vec![4, 2]);
        assert_eq!(doubled.tot_cells, s.tot_cells);
    }

    #[test]
    fn single_rank_reduction_bins_locally() {
        let cfg = TessConfig::default().with_bins(4, 4);
        let blocks = [block_with_volumes(&[1.0, 2.0, 4.0])];
        let s = Stats::collect(&blocks, &cfg);
        let global = reduce_stats(&s, &blocks, &crate::algs::communicator::NoComm).unwrap();
        assert_eq!(global.vol_hist.iter().sum::<usize>(), 3);
        let text = global.to_string();
        assert!(text.contains("total cells found = 3"));
    }
}

//! One full tessellation pass over the local blocks of a rank.
//!
//! ```text
//! kernel pass ─► plan sends ─► round 1 (particles) ─► append ghosts
//!   ─► kernel pass ─► classify ─► round 2 (echoes) ─► resolve tets
//!   ─► faces, areas, volumes, filter ─► VoronoiBlock
//! ```
//!
//! Both rounds are collective: every rank of `comm` must call [`Tessellator::run`]
//! with the same decomposition. The pass is single-shot; a cell left
//! incomplete after round 1 stays incomplete.

use crate::algs::classify::{classify, plan_sends};
use crate::algs::communicator::{Communicator, ExchangeTags};
use crate::algs::completion::block_completion::{exchange_completion, exchange_particles};
use crate::algs::faces::{cell_faces, cell_volumes, face_areas, filter_cells};
use crate::algs::ownership::resolve;
use crate::config::TessConfig;
use crate::data::block::Block;
use crate::data::output::{BlockSink, Times, VoronoiBlock};
use crate::geometry::delaunay::BowyerWatson;
use crate::geometry::kernel::{RawTessellation, TessKernel};
use crate::tess_error::TessError;
use crate::topology::decomposition::Decomposition;
use std::time::Instant;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Explicit tessellation context: settings, block layout and kernel.
#[derive(Clone, Debug)]
pub struct Tessellator<K: TessKernel = BowyerWatson> {
    config: TessConfig,
    decomposition: Decomposition,
    kernel: K,
}

impl Tessellator<BowyerWatson> {
    pub fn new(config: TessConfig, decomposition: Decomposition) -> Result<Self, TessError> {
        Self::with_kernel(config, decomposition, BowyerWatson::default())
    }
}

impl<K: TessKernel> Tessellator<K> {
    pub fn with_kernel(
        config: TessConfig,
        decomposition: Decomposition,
        kernel: K,
    ) -> Result<Self, TessError> {
        config.validate()?;
        if config.wrap != decomposition.wrap() || config.domain != *decomposition.domain() {
            return Err(TessError::InvalidConfig(format!(
                "config (domain {:?}, wrap {}) disagrees with decomposition (domain {:?}, wrap {})",
                config.domain,
                config.wrap,
                decomposition.domain(),
                decomposition.wrap()
            )));
        }
        Ok(Self {
            config,
            decomposition,
            kernel,
        })
    }

    pub fn config(&self) -> &TessConfig {
        &self.config
    }

    pub fn decomposition(&self) -> &Decomposition {
        &self.decomposition
    }

    /// Wrap per-lid particle lists into blocks carrying their gid and bounds.
    pub fn blocks_from_particles(
        &self,
        particles: Vec<Vec<[f64; 3]>>,
    ) -> Result<Vec<Block>, TessError> {
        if particles.len() != self.decomposition.num_local() {
            return Err(TessError::BlockCountMismatch {
                expected: self.decomposition.num_local(),
                found: particles.len(),
            });
        }
        particles
            .into_iter()
            .enumerate()
            .map(|(lid, pts)| {
                Ok(Block::new(
                    self.decomposition.gid_of(lid)?,
                    self.decomposition.block_bounds(lid)?,
                    pts,
                ))
            })
            .collect()
    }

    /// Tessellate `blocks` (one per local block, in lid order). Collective.
    pub fn run<C>(&self, blocks: Vec<Block>, comm: &C) -> Result<Vec<VoronoiBlock>, TessError>
    where
        C: Communicator,
    {
        let mut out = Vec::with_capacity(blocks.len());
        self.run_into(blocks, comm, &mut out)?;
        Ok(out)
    }

    /// Like [`run`](Self::run), handing each finished block to `sink`.
    pub fn run_into<C, S>(&self, mut blocks: Vec<Block>, comm: &C, sink: &mut S) -> Result<(), TessError>
    where
        C: Communicator,
        S: BlockSink,
    {
        let decomp = &self.decomposition;
        let t_start = Instant::now();

        for b in blocks.iter_mut() {
            b.clear_ghosts();
            b.sent.clear();
            b.flags.clear();
        }

        // first kernel pass on originals only
        let t = Instant::now();
        let first = self.tessellate_all(&blocks)?;
        for (lid, (b, raw)) in blocks.iter_mut().zip(&first).enumerate() {
            b.sent = plan_sends(raw, b, decomp, lid).map_err(|e| e.in_block(b.gid))?;
        }
        drop(first);
        let local = t.elapsed().as_secs_f64();

        let t = Instant::now();
        let received = exchange_particles(&mut blocks, decomp, comm, ExchangeTags::PARTICLES)?;
        let exchange = t.elapsed().as_secs_f64();
        log::debug!("rank {}: received {received} ghost particles", comm.rank());

        let t = Instant::now();
        let second = self.tessellate_all(&blocks)?;
        for (b, raw) in blocks.iter_mut().zip(&second) {
            let c = classify(raw, b, &self.config);
            log::debug!(
                "block {}: {} of {} cells complete",
                b.gid,
                c.num_complete(),
                b.num_orig
            );
            b.flags = c.flags;
        }
        let cells = t.elapsed().as_secs_f64();

        let t = Instant::now();
        let echoes = exchange_completion(&blocks, decomp, comm, ExchangeTags::COMPLETION)?;
        let echo = t.elapsed().as_secs_f64();

        for ((b, raw), echoes) in blocks.into_iter().zip(second).zip(echoes) {
            let t = Instant::now();
            let owned = resolve(&raw.tets, &b, &b.flags, &echoes).map_err(|e| e.in_block(b.gid))?;
            let tets = t.elapsed().as_secs_f64();

            let t = Instant::now();
            let cf = cell_faces(&raw.faces, b.num_orig);
            let areas = face_areas(&raw.faces, &raw.verts);
            let vols = cell_volumes(&cf, &raw.faces, &areas, &b.particles);
            let complete_cells = filter_cells(&b.flags, &vols, &cf, &self.config);
            let volumes = t.elapsed().as_secs_f64();

            let times = Times {
                local,
                exchange,
                cells,
                echo,
                tets,
                volumes,
                total: t_start.elapsed().as_secs_f64(),
            };
            sink.write_block(VoronoiBlock {
                gid: b.gid,
                bounds: b.bounds,
                num_orig: b.num_orig,
                verts: raw.verts,
                cells: raw.cells,
                faces: raw.faces,
                cell_faces_start: cf.start,
                cell_faces: cf.faces,
                face_areas: areas,
                flags: b.flags,
                complete_cells,
                loc_tets: owned.local,
                rem_tets: owned.remote,
                times,
            })?;
        }
        Ok(())
    }

    #[cfg(not(feature = "rayon"))]
    fn tessellate_all(&self, blocks: &[Block]) -> Result<Vec<RawTessellation>, TessError> {
        blocks
            .iter()
            .map(|b| {
                self.kernel
                    .tessellate(&b.particles, b.num_orig)
                    .map_err(|e| e.in_block(b.gid))
            })
            .collect()
    }

    #[cfg(feature = "rayon")]
    fn tessellate_all(&self, blocks: &[Block]) -> Result<Vec<RawTessellation>, TessError> {
        blocks
            .par_iter()
            .map(|b| {
                self.kernel
                    .tessellate(&b.particles, b.num_orig)
                    .map_err(|e| e.in_block(b.gid))
            })
            .collect()
    }
}

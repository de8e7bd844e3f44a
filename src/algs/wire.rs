//! Fixed, versioned, little-endian wire records for the exchange rounds.
//!
//! A message between two ranks is one [`WireHdr`] followed by `count`
//! frames; each frame is a [`WireRoute`] naming source and destination block
//! followed by one payload record of the kind announced in the header.

use bytemuck::{Pod, Zeroable};
use static_assertions::const_assert_eq;
use std::mem::size_of;

use crate::topology::periodic::WrapDir;

/// Bump when the layout or semantics change in incompatible ways.
pub const WIRE_VERSION: u16 = 1;

pub fn expect_exact_len(actual: usize, expected: usize) -> Result<(), String> {
    if actual == expected {
        Ok(())
    } else {
        Err(format!("expected {expected} bytes, got {actual}"))
    }
}

/// Narrow a gid, nid or frame count to its 32-bit wire field.
///
/// The record constructors below cast with `as`; every value reaching them
/// has been checked with this at the boundary it enters through
/// (decomposition gids, block sizes, frame counts).
pub fn wire_u32(value: usize, what: &str) -> Result<u32, String> {
    u32::try_from(value).map_err(|_| format!("{what} {value} does not fit a 32-bit wire field"))
}

/// Payload kinds carried in [`WireHdr::kind`].
pub mod kind {
    pub const PARTICLE: u16 = 1;
    pub const COMPLETION: u16 = 2;
}

/// Payload record types implement this to be framed by the exchange.
pub trait WireRecord: Pod {
    const KIND: u16;
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireHdr {
    pub version_le: u16,
    pub kind_le: u16,
    pub count_le: u32,
}

impl WireHdr {
    pub fn new(kind: u16, count: u32) -> Self {
        Self {
            version_le: WIRE_VERSION.to_le(),
            kind_le: kind.to_le(),
            count_le: count.to_le(),
        }
    }
    pub fn version(&self) -> u16 {
        u16::from_le(self.version_le)
    }
    pub fn kind(&self) -> u16 {
        u16::from_le(self.kind_le)
    }
    pub fn count(&self) -> usize {
        u32::from_le(self.count_le) as usize
    }
}

/// Byte length of the message that follows in the data stage.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireCount {
    pub n_le: u64,
}

impl WireCount {
    pub fn new(n: usize) -> Self {
        Self {
            n_le: (n as u64).to_le(),
        }
    }
    pub fn get(&self) -> usize {
        u64::from_le(self.n_le) as usize
    }
}

/// Source and destination block of one frame.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireRoute {
    pub src_gid_le: u32,
    pub dst_gid_le: u32,
}

impl WireRoute {
    pub fn new(src_gid: usize, dst_gid: usize) -> Self {
        Self {
            src_gid_le: (src_gid as u32).to_le(),
            dst_gid_le: (dst_gid as u32).to_le(),
        }
    }
    pub fn src_gid(&self) -> usize {
        u32::from_le(self.src_gid_le) as usize
    }
    pub fn dst_gid(&self) -> usize {
        u32::from_le(self.dst_gid_le) as usize
    }
}

/// Round 1 payload: a particle copy, already wrap-transformed.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireParticle {
    pub pos_le: [u64; 3],
    pub gid_le: u32,
    pub nid_le: u32,
    pub dir: u8,
    pub _pad: [u8; 7],
}

impl WireParticle {
    pub const SIZE: usize = 40;

    pub fn new(pos: [f64; 3], gid: usize, nid: usize, dir: WrapDir) -> Self {
        Self {
            pos_le: pos.map(|c| c.to_bits().to_le()),
            gid_le: (gid as u32).to_le(),
            nid_le: (nid as u32).to_le(),
            dir: dir.bits(),
            _pad: [0; 7],
        }
    }
    pub fn pos(&self) -> [f64; 3] {
        self.pos_le.map(|b| f64::from_bits(u64::from_le(b)))
    }
    pub fn gid(&self) -> usize {
        u32::from_le(self.gid_le) as usize
    }
    pub fn nid(&self) -> usize {
        u32::from_le(self.nid_le) as usize
    }
    pub fn dir(&self) -> WrapDir {
        WrapDir(self.dir)
    }
}

impl WireRecord for WireParticle {
    const KIND: u16 = kind::PARTICLE;
}

/// Round 2 payload: completeness of a particle's cell in its owner block.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireCompletion {
    pub gid_le: u32,
    pub nid_le: u32,
    pub complete_le: u32,
}

impl WireCompletion {
    pub fn new(gid: usize, nid: usize, complete: bool) -> Self {
        Self {
            gid_le: (gid as u32).to_le(),
            nid_le: (nid as u32).to_le(),
            complete_le: (complete as u32).to_le(),
        }
    }
    pub fn gid(&self) -> usize {
        u32::from_le(self.gid_le) as usize
    }
    pub fn nid(&self) -> usize {
        u32::from_le(self.nid_le) as usize
    }
    pub fn is_complete(&self) -> bool {
        u32::from_le(self.complete_le) != 0
    }
}

impl WireRecord for WireCompletion {
    const KIND: u16 = kind::COMPLETION;
}

// ===== Compile-time sanity checks =========================================

const_assert_eq!(size_of::<WireHdr>(), 8);
const_assert_eq!(size_of::<WireCount>(), 8);
const_assert_eq!(size_of::<WireRoute>(), 8);
const_assert_eq!(size_of::<WireParticle>(), WireParticle::SIZE);
const_assert_eq!(size_of::<WireCompletion>(), 12);

#[cfg(test)]
mod tests {
    use super::*;
    use bytemuck::{cast_slice, pod_read_unaligned};

    #[test]
    fn particle_survives_bytes() {
        let p = WireParticle::new([1.5, -2.25, 1e-300], 7, 12345, WrapDir::X0 | WrapDir::Z1);
        let bytes: Vec<u8> = cast_slice(&[p]).to_vec();
        let back: WireParticle = pod_read_unaligned(&bytes);
        assert_eq!(back.pos(), [1.5, -2.25, 1e-300]);
        assert_eq!(back.gid(), 7);
        assert_eq!(back.nid(), 12345);
        assert_eq!(back.dir(), WrapDir::X0 | WrapDir::Z1);
    }

    #[test]
    fn completion_flag_decodes() {
        let c = WireCompletion::new(3, 4, true);
        assert!(c.is_complete());
        assert!(!WireCompletion::new(3, 4, false).is_complete());
    }

    #[test]
    fn version_guard() {
        let hdr = WireHdr::new(kind::PARTICLE, 9);
        assert_eq!(hdr.version(), WIRE_VERSION);
        assert_eq!(hdr.kind(), kind::PARTICLE);
        assert_eq!(hdr.count(), 9);
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn oversized_ids_do_not_narrow() {
        assert_eq!(wire_u32(7, "gid"), Ok(7));
        assert_eq!(wire_u32(u32::MAX as usize, "nid"), Ok(u32::MAX));
        let err = wire_u32(u32::MAX as usize + 1, "nid").unwrap_err();
        assert!(err.contains("nid 4294967296"));
    }

    #[test]
    fn exact_len_reports_mismatch() {
        assert!(expect_exact_len(4, 4).is_ok());
        assert!(expect_exact_len(3, 4).unwrap_err().contains("expected 4"));
    }
}

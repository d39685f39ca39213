//! Sample cursor over a raw capture buffer
//!
//! The buffer handed to `decode` is a run of fixed-size sample units, one unit
//! per sample, each `unit_size` bytes wide. Channel `c` of a unit is bit
//! `c % 8` of byte `c / 8`, LSB-first, the same packing logic analyzers use on
//! the wire.
//!
//! A [`SampleCursor`] borrows the buffer for a single decode call. It resolves
//! each probe of the decoder through the instance's probe map, so a decoder
//! only ever asks for "probe 1 at sample N" and never sees channel numbers.

use super::probes::ProbeMapping;
use std::fmt;

/// Per-call view of a sample buffer through an instance's probe map
pub struct SampleCursor<'a> {
    mapping: &'a ProbeMapping,
    start_sample: u64,
    end_sample: u64,
    data: &'a [u8],
}

impl<'a> SampleCursor<'a> {
    pub(crate) fn new(mapping: &'a ProbeMapping, start_sample: u64, end_sample: u64, data: &'a [u8]) -> Self {
        Self {
            mapping,
            start_sample,
            end_sample,
            data,
        }
    }

    /// Absolute number of the first sample in the buffer
    pub fn start_sample(&self) -> u64 {
        self.start_sample
    }

    /// Absolute end sample number as given by the caller
    pub fn end_sample(&self) -> u64 {
        self.end_sample
    }

    /// Bytes per sample unit
    pub fn unit_size(&self) -> usize {
        self.mapping.unit_size()
    }

    /// Number of complete sample units in the buffer
    pub fn num_samples(&self) -> u64 {
        match self.unit_size() {
            0 => 0,
            size => (self.data.len() / size) as u64,
        }
    }

    /// Raw buffer
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// The sample at absolute position `samplenum`, if it lies in the buffer
    #[inline]
    pub fn sample(&self, samplenum: u64) -> Option<ProbeSample<'a>> {
        let local = samplenum.checked_sub(self.start_sample)?;
        if local >= self.num_samples() {
            return None;
        }
        let size = self.unit_size();
        let offset = local as usize * size;
        Some(ProbeSample {
            mapping: self.mapping,
            unit: &self.data[offset..offset + size],
        })
    }

    /// Iterate `(samplenum, sample)` over every complete unit in the buffer
    pub fn iter(&self) -> impl Iterator<Item = (u64, ProbeSample<'a>)> + '_ {
        let size = self.unit_size();
        let mapping = self.mapping;
        let start = self.start_sample;
        let units = if size == 0 { None } else { Some(self.data.chunks_exact(size)) };
        units
            .into_iter()
            .flatten()
            .enumerate()
            .map(move |(i, unit)| (start.saturating_add(i as u64), ProbeSample { mapping, unit }))
    }
}

impl fmt::Debug for SampleCursor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("SampleCursor")
            .field("start_sample", &self.start_sample)
            .field("end_sample", &self.end_sample)
            .field("unit_size", &self.unit_size())
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// One sample unit, read through the probe map
#[derive(Clone, Copy)]
pub struct ProbeSample<'a> {
    mapping: &'a ProbeMapping,
    unit: &'a [u8],
}

impl ProbeSample<'_> {
    /// Value of the probe at `order`.
    ///
    /// `None` if the probe is unmapped or its channel lies outside the unit.
    #[inline]
    pub fn probe(&self, order: usize) -> Option<bool> {
        let channel = self.mapping.channel(order)? as usize;
        let byte = self.unit.get(channel / 8)?;
        Some((byte >> (channel % 8)) & 1 == 1)
    }

    /// Values of every probe, in probe order
    pub fn probes(&self) -> Vec<Option<bool>> {
        (0..self.mapping.len()).map(|order| self.probe(order)).collect()
    }

    /// The raw unit bytes
    pub fn raw(&self) -> &[u8] {
        self.unit
    }
}

impl fmt::Debug for ProbeSample<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ProbeSample{:?}", self.probes())
    }
}

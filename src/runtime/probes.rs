//! Probe mapping
//!
//! A [`ProbeMapping`] tells an instance which raw channel feeds each of its
//! decoder's probes. Slot `i` belongs to the probe whose `order` is `i`.

use super::descriptor::DecoderDescriptor;
use super::errors::{Error, Result};
use super::variant::{ProbeMap, Variant};
use tracing::debug;

/// Per-instance probe map plus the derived byte width of one sample unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeMapping {
    slots: Vec<Option<u32>>,
    unit_size: usize,
}

/// Bytes needed to hold `mapped` one-bit channels
fn unit_size_for(mapped: usize) -> usize {
    mapped.div_ceil(8)
}

impl ProbeMapping {
    /// Identity mapping: slot i reads channel i
    pub fn identity(num_probes: usize) -> Result<Self> {
        let mut slots = Vec::new();
        slots.try_reserve_exact(num_probes)?;
        slots.extend((0..num_probes).map(|i| Some(i as u32)));
        Ok(Self {
            slots,
            unit_size: unit_size_for(num_probes),
        })
    }

    /// Channel index for the probe at `order`, or `None` if unmapped
    pub fn channel(&self, order: usize) -> Option<u32> {
        self.slots.get(order).copied().flatten()
    }

    pub fn slots(&self) -> &[Option<u32>] {
        &self.slots
    }

    /// Number of probe slots (mapped or not)
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of mapped slots
    pub fn mapped(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Bytes per sample unit, `ceil(mapped / 8)`
    pub fn unit_size(&self) -> usize {
        self.unit_size
    }

    /// Build a replacement mapping for `decoder` from `input`.
    ///
    /// Returns `Ok(None)` when `input` is empty: the current mapping stays as
    /// it is. Probes absent from `input` become unmapped. The caller swaps the
    /// result in; nothing is mutated here.
    pub fn from_input(decoder: &DecoderDescriptor, input: &ProbeMap) -> Result<Option<Self>> {
        if input.is_empty() {
            return Ok(None);
        }

        let num_probes = decoder.num_probes();
        if num_probes == 0 {
            return Err(Error::arg(format!(
                "protocol decoder '{}' has no probes to define",
                decoder.id()
            )));
        }

        let mut slots = Vec::new();
        slots.try_reserve_exact(num_probes)?;
        slots.resize(num_probes, None);

        for (probe_id, value) in input {
            let channel = match value {
                Variant::I32(v) => *v,
                _ => {
                    return Err(Error::arg(format!(
                        "no probe number was specified for '{}'",
                        probe_id
                    )));
                }
            };
            let channel = u32::try_from(channel).map_err(|_| {
                Error::arg(format!(
                    "probe '{}' mapped to negative channel {}",
                    probe_id, channel
                ))
            })?;
            let probe = decoder.find_probe(probe_id).ok_or_else(|| {
                Error::arg(format!(
                    "protocol decoder '{}' has no probe '{}'",
                    decoder.id(),
                    probe_id
                ))
            })?;

            debug!(
                "Setting probe mapping: {} (index {}) = channel {}",
                probe.id, probe.order, channel
            );
            slots[probe.order] = Some(channel);
        }

        let mapping = Self {
            unit_size: unit_size_for(slots.iter().filter(|s| s.is_some()).count()),
            slots,
        };

        let num_required = decoder.probes().len();
        for (i, slot) in mapping.slots.iter().enumerate() {
            debug!(
                " - index {} = channel {:?} ({})",
                i,
                slot,
                if i < num_required { "required" } else { "optional" }
            );
        }

        Ok(Some(mapping))
    }
}

//! Decoder instances
//!
//! A [`DecoderInstance`] binds a shared descriptor to one configured logic
//! object: its instance id, probe map, options and registered outputs.
//! Instances are created and owned by a session's graph.

use super::descriptor::DecoderDescriptor;
use super::errors::{Error, Result};
use super::logic::DecoderLogic;
use super::options::{OptionSet, coerce};
use super::output::{MetaSpec, OutputId, OutputInfo, OutputKind};
use super::probes::ProbeMapping;
use super::variant::{OptionMap, ProbeMap};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

static NEXT_LOGIC_HANDLE: AtomicU64 = AtomicU64::new(1);

/// Identity of the logic object behind an instance
///
/// Unique within the process for the lifetime of the program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LogicHandle(u64);

impl LogicHandle {
    fn next() -> Self {
        Self(NEXT_LOGIC_HANDLE.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// Lifecycle state of an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceState {
    /// Constructed and configured, `start` not yet called
    Created,
    /// `start` succeeded; the instance accepts samples
    Started,
}

/// A configured decoder bound to its logic object
pub struct DecoderInstance {
    descriptor: Arc<DecoderDescriptor>,
    id: String,
    probes: ProbeMapping,
    options: OptionSet,
    outputs: Vec<OutputInfo>,
    /// `None` while one of the logic's hooks is running
    logic: Option<Box<dyn DecoderLogic>>,
    logic_handle: LogicHandle,
    state: InstanceState,
}

impl DecoderInstance {
    /// Build an instance with identity probe map and default options.
    ///
    /// Construction of the logic object may fail; nothing is kept in that case.
    pub(crate) fn new(descriptor: Arc<DecoderDescriptor>, id: String) -> Result<Self> {
        let probes = ProbeMapping::identity(descriptor.num_probes())?;
        let logic = construct_logic(&descriptor)?;
        Ok(Self {
            descriptor,
            id,
            probes,
            options: OptionSet::default(),
            outputs: Vec::new(),
            logic: Some(logic),
            logic_handle: LogicHandle::next(),
            state: InstanceState::Created,
        })
    }

    pub fn descriptor(&self) -> &Arc<DecoderDescriptor> {
        &self.descriptor
    }

    pub fn decoder_id(&self) -> &str {
        self.descriptor.id()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn probes(&self) -> &ProbeMapping {
        &self.probes
    }

    /// Bytes per sample unit for this instance
    pub fn unit_size(&self) -> usize {
        self.probes.unit_size()
    }

    pub fn options(&self) -> &OptionSet {
        &self.options
    }

    pub fn outputs(&self) -> &[OutputInfo] {
        &self.outputs
    }

    pub fn output(&self, id: OutputId) -> Option<&OutputInfo> {
        self.outputs.get(id.as_usize())
    }

    pub fn logic_handle(&self) -> LogicHandle {
        self.logic_handle
    }

    pub fn state(&self) -> InstanceState {
        self.state
    }

    /// True while one of the instance's logic hooks is running
    pub fn is_busy(&self) -> bool {
        self.logic.is_none()
    }

    fn ensure_idle(&self) -> Result<()> {
        if self.is_busy() {
            return Err(Error::arg(format!("instance '{}' is busy", self.id)));
        }
        Ok(())
    }

    /// Replace the probe map from `input`; an empty input keeps the current one
    pub(crate) fn set_probes(&mut self, input: &ProbeMap) -> Result<()> {
        debug!(
            "set probes called for instance {} with list of {} probes",
            self.id,
            input.len()
        );
        self.ensure_idle()?;
        if let Some(mapping) = ProbeMapping::from_input(&self.descriptor, input)? {
            self.probes = mapping;
        }
        Ok(())
    }

    /// Re-coerce all options from `input`, consuming the keys that were used
    pub(crate) fn set_options(&mut self, input: &mut OptionMap) -> Result<()> {
        self.ensure_idle()?;
        self.options = coerce(self.descriptor.id(), self.descriptor.options(), input)?;
        Ok(())
    }

    pub(crate) fn take_logic(&mut self) -> Result<Box<dyn DecoderLogic>> {
        self.logic
            .take()
            .ok_or_else(|| Error::arg(format!("instance '{}' is busy", self.id)))
    }

    pub(crate) fn restore_logic(&mut self, logic: Box<dyn DecoderLogic>) {
        self.logic = Some(logic);
    }

    pub(crate) fn set_state(&mut self, state: InstanceState) {
        self.state = state;
    }

    pub(crate) fn clear_outputs(&mut self) {
        self.outputs.clear();
    }

    /// Register an output of `kind`; the descriptor must declare that kind
    pub(crate) fn register_output(
        &mut self,
        kind: OutputKind,
        proto_id: &str,
        meta: Option<MetaSpec>,
    ) -> Result<OutputId> {
        if !self.descriptor.output_kinds().contains(&kind) {
            return Err(Error::Plugin(format!(
                "decoder '{}' does not declare {} outputs",
                self.descriptor.id(),
                kind
            )));
        }
        self.outputs.try_reserve(1)?;
        let id = OutputId::new(self.outputs.len());
        debug!(
            "Instance {} creating new output type {} for {}",
            self.id, kind, proto_id
        );
        self.outputs.push(OutputInfo {
            id,
            kind,
            instance_id: self.id.clone(),
            proto_id: proto_id.to_string(),
            meta,
        });
        Ok(id)
    }
}

impl Drop for DecoderInstance {
    fn drop(&mut self) {
        debug!("Freeing instance {}", self.id);
    }
}

impl fmt::Debug for DecoderInstance {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("DecoderInstance")
            .field("id", &self.id)
            .field("decoder", &self.descriptor.id())
            .field("probes", &self.probes)
            .field("options", &self.options)
            .field("outputs", &self.outputs.len())
            .field("state", &self.state)
            .finish()
    }
}

fn construct_logic(descriptor: &DecoderDescriptor) -> Result<Box<dyn DecoderLogic>> {
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| descriptor.construct_logic()));
    match result {
        Ok(Ok(logic)) => Ok(logic),
        Ok(Err(e)) => Err(Error::Plugin(format!(
            "failed to create {} instance: {}",
            descriptor.id(),
            e
        ))),
        Err(panic) => Err(Error::Plugin(format!(
            "failed to create {} instance: {}",
            descriptor.id(),
            super::logic::panic_message(panic.as_ref())
        ))),
    }
}

//! Sessions
//!
//! A [`Session`] is the unit of isolation: one instance graph plus one output
//! callback registry. Instance ids are resolved within a session, and only
//! among its roots.

use super::descriptor::DecoderDescriptor;
use super::errors::{Error, Result};
use super::graph::{InstanceGraph, InstanceHandle};
use super::instance::{DecoderInstance, LogicHandle};
use super::output::{CallbackRegistry, OutputKind, ProtoData};
use super::variant::{OptionMap, ProbeMap, Variant};
use crossbeam_channel::Receiver as CrossbeamReceiver;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Option key that names the instance instead of configuring the decoder
pub const INSTANCE_ID_OPTION: &str = "id";

/// Identifier of a session within a runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u32);

impl SessionId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One decoding session: an instance forest and its output consumers
pub struct Session {
    id: SessionId,
    graph: InstanceGraph,
    callbacks: CallbackRegistry,
}

impl Session {
    /// Create an empty session
    pub fn new(id: SessionId) -> Self {
        debug!("Creating session {}", id);
        Self {
            id,
            graph: InstanceGraph::new(),
            callbacks: CallbackRegistry::new(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn graph(&self) -> &InstanceGraph {
        &self.graph
    }

    pub(crate) fn graph_mut(&mut self) -> &mut InstanceGraph {
        &mut self.graph
    }

    pub(crate) fn callbacks_mut(&mut self) -> &mut CallbackRegistry {
        &mut self.callbacks
    }

    pub fn instance(&self, handle: InstanceHandle) -> Option<&DecoderInstance> {
        self.graph.get(handle)
    }

    /// Root instances, in creation order
    pub fn roots(&self) -> &[InstanceHandle] {
        self.graph.roots()
    }

    /// Create an instance of `descriptor` and append it to the roots.
    ///
    /// A string `"id"` entry in `options` names the instance (default: the
    /// decoder id) and is consumed. Remaining keys go through option
    /// coercion; keys it used are removed as well. Root ids must be unique.
    /// On any error nothing is added and `options` is unchanged.
    pub fn create_instance(
        &mut self,
        descriptor: Arc<DecoderDescriptor>,
        options: Option<&mut OptionMap>,
    ) -> Result<InstanceHandle> {
        debug!("Creating new {} instance.", descriptor.id());

        let inst_id = match options.as_deref().and_then(|o| o.get(INSTANCE_ID_OPTION)) {
            Some(Variant::Str(id)) => id.clone(),
            Some(other) => {
                return Err(Error::arg(format!(
                    "instance id must be a string, got {}",
                    other.variant_type()
                )));
            }
            None => descriptor.id().to_string(),
        };

        if self.find_by_id(&inst_id).is_some() {
            return Err(Error::arg(format!(
                "instance id '{}' already exists in session {}",
                inst_id, self.id
            )));
        }

        let mut instance = DecoderInstance::new(descriptor, inst_id)?;

        if let Some(options) = options {
            let id_entry = options.remove(INSTANCE_ID_OPTION);
            if let Err(e) = instance.set_options(options) {
                if let Some(v) = id_entry {
                    options.insert(INSTANCE_ID_OPTION.to_string(), v);
                }
                return Err(e);
            }
        }

        let handle = self.graph.insert_root(instance)?;
        info!("Created instance {:?} in session {}", handle, self.id);
        Ok(handle)
    }

    /// Stack `to` on top of `from`: `from`'s output becomes `to`'s input
    pub fn stack(&mut self, from: InstanceHandle, to: InstanceHandle) -> Result<()> {
        debug!("Stacking {:?} on top of {:?}", to, from);
        self.graph.stack(from, to)
    }

    /// Find a root instance by id; stacked instances are not searched
    pub fn find_by_id(&self, inst_id: &str) -> Option<InstanceHandle> {
        self.graph.find_root_by_id(inst_id)
    }

    /// Find the instance owning `logic` in `subtree`, or anywhere in the session
    pub fn find_by_logic_handle(
        &self,
        subtree: Option<InstanceHandle>,
        logic: LogicHandle,
    ) -> Option<InstanceHandle> {
        self.graph.find_by_logic_handle(subtree, logic)
    }

    /// Replace the probe map of an instance
    pub fn set_probes(&mut self, handle: InstanceHandle, probes: &ProbeMap) -> Result<()> {
        self.graph.require_mut(handle)?.set_probes(probes)
    }

    /// Re-coerce the options of an instance
    pub fn set_options(&mut self, handle: InstanceHandle, options: &mut OptionMap) -> Result<()> {
        self.graph.require_mut(handle)?.set_options(options)
    }

    /// Register a consumer for every output of `kind` in this session
    pub fn add_output_callback<F>(&mut self, kind: OutputKind, callback: F)
    where
        F: FnMut(&ProtoData) + Send + 'static,
    {
        debug!("Registering new callback for output type {}", kind);
        self.callbacks.register(kind, Box::new(callback));
    }

    /// Receive every output of `kind` through a channel
    pub fn output_channel(&mut self, kind: OutputKind) -> CrossbeamReceiver<ProtoData> {
        self.callbacks.channel(kind)
    }

    /// Free one instance. Its stacked children are detached, not freed.
    pub fn free(&mut self, handle: InstanceHandle) {
        if self.graph.remove(handle).is_none() {
            warn!("free: stale instance handle {:?}", handle);
        }
    }

    /// Free `subtree` (or every instance of the session) children-first
    pub fn free_all(&mut self, subtree: Option<InstanceHandle>) {
        let freed = self.graph.remove_all(subtree);
        debug!("Freed {} instances in session {}", freed.len(), self.id);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.free_all(None);
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("instances", &self.graph.len())
            .field("roots", &self.graph.roots().len())
            .field("callbacks", &self.callbacks)
            .finish()
    }
}

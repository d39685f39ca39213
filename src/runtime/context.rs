//! Runtime context
//!
//! A [`Runtime`] owns the decoder registry and every live session. All
//! operations that span sessions go through it; there is no process-wide
//! session list.

use super::descriptor::DecoderDescriptor;
use super::errors::{Error, Result};
use super::graph::InstanceHandle;
use super::instance::LogicHandle;
use super::registry::DecoderRegistry;
use super::session::{Session, SessionId};
use super::variant::OptionMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Decoder registry plus live sessions
pub struct Runtime {
    registry: DecoderRegistry,
    sessions: Vec<Session>,
    next_session_id: u32,
}

impl Runtime {
    /// Create a runtime with no decoders and no sessions
    pub fn new() -> Self {
        Self {
            registry: DecoderRegistry::new(),
            sessions: Vec::new(),
            next_session_id: 1,
        }
    }

    /// Make a decoder type available to `create_instance`
    pub fn register_decoder(&mut self, descriptor: DecoderDescriptor) -> Result<Arc<DecoderDescriptor>> {
        self.registry.register(descriptor)
    }

    pub fn unregister_decoder(&mut self, id: &str) -> Result<Arc<DecoderDescriptor>> {
        self.registry.unregister(id)
    }

    pub fn decoder(&self, id: &str) -> Option<&Arc<DecoderDescriptor>> {
        self.registry.get(id)
    }

    pub fn decoders(&self) -> impl Iterator<Item = &Arc<DecoderDescriptor>> {
        self.registry.iter()
    }

    /// Open a new, empty session
    pub fn new_session(&mut self) -> Result<SessionId> {
        let id = SessionId::new(self.next_session_id);
        self.next_session_id = self
            .next_session_id
            .checked_add(1)
            .ok_or_else(|| Error::Bug("session ids exhausted".to_string()))?;
        self.sessions.try_reserve(1)?;
        self.sessions.push(Session::new(id));
        info!("Created new session {}", id);
        Ok(id)
    }

    pub fn session(&self, id: SessionId) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id() == id)
    }

    pub fn session_mut(&mut self, id: SessionId) -> Option<&mut Session> {
        self.sessions.iter_mut().find(|s| s.id() == id)
    }

    fn require_session(&mut self, id: SessionId) -> Result<&mut Session> {
        self.session_mut(id)
            .ok_or_else(|| Error::arg(format!("invalid session {}", id)))
    }

    /// Sessions in creation order
    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    /// Destroy a session and every instance in it
    pub fn destroy_session(&mut self, id: SessionId) -> Result<()> {
        let pos = self
            .sessions
            .iter()
            .position(|s| s.id() == id)
            .ok_or_else(|| Error::arg(format!("invalid session {}", id)))?;
        let mut session = self.sessions.remove(pos);
        session.free_all(None);
        info!("Destroyed session {}", id);
        Ok(())
    }

    /// Instantiate the registered decoder `decoder_id` in session `sid`
    pub fn create_instance(
        &mut self,
        sid: SessionId,
        decoder_id: &str,
        options: Option<&mut OptionMap>,
    ) -> Result<InstanceHandle> {
        let descriptor = self
            .registry
            .get(decoder_id)
            .cloned()
            .ok_or_else(|| Error::arg(format!("protocol decoder {} not found", decoder_id)))?;
        self.require_session(sid)?.create_instance(descriptor, options)
    }

    pub fn stack(&mut self, sid: SessionId, from: InstanceHandle, to: InstanceHandle) -> Result<()> {
        self.require_session(sid)?.stack(from, to)
    }

    pub fn find_by_id(&self, sid: SessionId, inst_id: &str) -> Option<InstanceHandle> {
        self.session(sid)?.find_by_id(inst_id)
    }

    /// Find the instance owning `logic`.
    ///
    /// With a subtree only that subtree is searched; otherwise every session,
    /// in creation order.
    pub fn find_by_logic_handle(
        &self,
        subtree: Option<(SessionId, InstanceHandle)>,
        logic: LogicHandle,
    ) -> Option<(SessionId, InstanceHandle)> {
        match subtree {
            Some((sid, root)) => {
                let session = self.session(sid)?;
                session.find_by_logic_handle(Some(root), logic).map(|h| (sid, h))
            }
            None => self.sessions.iter().find_map(|s| {
                s.find_by_logic_handle(None, logic).map(|h| (s.id(), h))
            }),
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        debug!("Destroying runtime with {} sessions", self.sessions.len());
        while let Some(session) = self.sessions.first().map(Session::id) {
            let _ = self.destroy_session(session);
        }
    }
}

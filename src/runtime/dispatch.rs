//! Dispatch core
//!
//! Drives the hooks of a session's logic objects. Every hook call checks the
//! logic out of its node, runs it with a [`Context`] bound to that instance,
//! and puts it back afterwards. Errors and panics raised by a hook surface as
//! `PluginError`.

use super::errors::{Error, ErrorKind, LogicError, LogicResult, Result};
use super::graph::InstanceHandle;
use super::instance::InstanceState;
use super::logic::{Context, DecoderLogic, MetadataKey, panic_message};
use super::output::{OutputId, Payload, ProtoData, StructuredValue};
use super::sample::SampleCursor;
use super::session::Session;
use super::variant::Variant;
use std::panic::{AssertUnwindSafe, catch_unwind};
use tracing::{debug, info, trace};

impl Session {
    /// Run one hook of `handle`'s logic
    fn invoke<F>(&mut self, handle: InstanceHandle, hook: F) -> Result<()>
    where
        F: FnOnce(&mut dyn DecoderLogic, &mut Context<'_>) -> LogicResult,
    {
        let instance = self.graph_mut().require_mut(handle)?;
        let inst_id = instance.id().to_string();
        let mut logic = instance.take_logic()?;

        let outcome = {
            let mut ctx = Context::new(self, handle);
            catch_unwind(AssertUnwindSafe(|| hook(logic.as_mut(), &mut ctx)))
        };

        match self.graph_mut().get_mut(handle) {
            Some(instance) => instance.restore_logic(logic),
            None => debug!("instance {} went away during a hook", inst_id),
        }

        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(LogicError::Core(e))) if e.kind() == ErrorKind::OutOfMemory => Err(e),
            Ok(Err(e)) => Err(Error::Plugin(format!(
                "Protocol decoder instance {}: {}",
                inst_id, e
            ))),
            Err(panic) => Err(Error::Plugin(format!(
                "Protocol decoder instance {} panicked: {}",
                inst_id,
                panic_message(panic.as_ref())
            ))),
        }
    }

    /// Start `handle` and then everything stacked on it, parents first.
    ///
    /// Stops at the first failure; instances after it are left unstarted.
    pub fn start_instance(&mut self, handle: InstanceHandle) -> Result<()> {
        for h in self.graph().preorder(&[handle]) {
            let instance = self.graph_mut().require_mut(h)?;
            if instance.is_busy() {
                return Err(Error::arg(format!("instance '{}' is busy", instance.id())));
            }
            info!("Calling start() on protocol decoder instance {}", instance.id());
            instance.clear_outputs();
            instance.set_state(InstanceState::Created);

            self.invoke(h, |logic, ctx| logic.start(ctx))?;
            self.graph_mut().require_mut(h)?.set_state(InstanceState::Started);
        }
        Ok(())
    }

    /// Start every root in creation order
    pub fn start(&mut self) -> Result<()> {
        debug!("Calling start() on all instances in session {}", self.id());
        let roots = self.roots().to_vec();
        for root in roots {
            self.start_instance(root)?;
        }
        Ok(())
    }

    /// Feed a raw sample buffer to one instance.
    ///
    /// Children are not visited; they receive data through `put`.
    pub fn decode(&mut self, handle: InstanceHandle, start_sample: u64, end_sample: u64, buf: &[u8]) -> Result<()> {
        if buf.is_empty() {
            return Err(Error::arg("empty sample buffer"));
        }
        let instance = self.graph().require(handle)?;
        if instance.state() != InstanceState::Started {
            return Err(Error::arg(format!("instance '{}' has not been started", instance.id())));
        }
        debug!(
            "Decoding: start sample {}, end sample {} ({} samples, {} bytes, unitsize = {}) on {}",
            start_sample,
            end_sample,
            end_sample.saturating_sub(start_sample),
            buf.len(),
            instance.unit_size(),
            instance.id()
        );
        let mapping = instance.probes().clone();

        self.invoke(handle, |logic, ctx| {
            let samples = SampleCursor::new(&mapping, start_sample, end_sample, buf);
            logic.decode(ctx, start_sample, end_sample, &samples)
        })
    }

    /// Feed a raw sample buffer to every root in creation order
    pub fn send(&mut self, start_sample: u64, end_sample: u64, buf: &[u8]) -> Result<()> {
        let roots = self.roots().to_vec();
        for root in roots {
            self.decode(root, start_sample, end_sample, buf)?;
        }
        Ok(())
    }

    /// Feed a structured value to an instance stacked on another one
    pub fn decode_stacked(
        &mut self,
        handle: InstanceHandle,
        start_sample: u64,
        end_sample: u64,
        value: &StructuredValue,
    ) -> Result<()> {
        let instance = self.graph().require(handle)?;
        if instance.state() != InstanceState::Started {
            return Err(Error::arg(format!("instance '{}' has not been started", instance.id())));
        }
        trace!("decode_stacked on {} for {}..{}", instance.id(), start_sample, end_sample);
        self.invoke(handle, |logic, ctx| {
            logic.decode_stacked(ctx, start_sample, end_sample, value)
        })
    }

    /// Forward capture metadata to every root
    pub fn set_metadata(&mut self, key: MetadataKey, value: Variant) -> Result<()> {
        if value.variant_type() != key.value_type() {
            return Err(Error::arg(format!(
                "metadata {:?} requires a {} value, got {}",
                key,
                key.value_type(),
                value.variant_type()
            )));
        }
        debug!("Setting metadata {:?} = {} in session {}", key, value, self.id());
        let roots = self.roots().to_vec();
        for root in roots {
            self.invoke(root, |logic, ctx| logic.metadata(ctx, key, &value))?;
        }
        Ok(())
    }

    /// Validate and deliver one piece of protocol data from `handle`
    pub(crate) fn put(
        &mut self,
        handle: InstanceHandle,
        start_sample: u64,
        end_sample: u64,
        output: OutputId,
        payload: Payload,
    ) -> Result<()> {
        let instance = self.graph().require(handle)?;
        let info = instance
            .output(output)
            .ok_or_else(|| {
                Error::Plugin(format!(
                    "instance '{}' has no output #{}",
                    instance.id(),
                    output.as_usize()
                ))
            })?
            .clone();

        if payload.kind() != info.kind {
            return Err(Error::Plugin(format!(
                "output '{}' of {} carries {} data, got {}",
                info.proto_id,
                info.instance_id,
                info.kind,
                payload.kind()
            )));
        }
        if end_sample < start_sample {
            return Err(Error::Plugin(format!(
                "invalid sample range {}..{} from {}",
                start_sample, end_sample, info.instance_id
            )));
        }

        let descriptor = instance.descriptor();
        match &payload {
            Payload::Annotation { class, texts } => {
                if *class >= descriptor.annotations().len() {
                    return Err(Error::Plugin(format!(
                        "annotation class {} out of range for {}",
                        class,
                        descriptor.id()
                    )));
                }
                if texts.is_empty() {
                    return Err(Error::Plugin(format!(
                        "annotation from {} has no text",
                        info.instance_id
                    )));
                }
            }
            Payload::Binary { class, .. } => {
                if *class >= descriptor.binary_classes().len() {
                    return Err(Error::Plugin(format!(
                        "binary class {} out of range for {}",
                        class,
                        descriptor.id()
                    )));
                }
            }
            Payload::Meta(value) => {
                let expected = info.meta.as_ref().map(|m| m.value_type);
                if expected != Some(value.variant_type()) {
                    return Err(Error::Plugin(format!(
                        "metadata output '{}' got a {} value",
                        info.proto_id,
                        value.variant_type()
                    )));
                }
            }
            Payload::Value(_) => {
                let graph = self.graph();
                if let Some(idle) = graph
                    .children(handle)
                    .iter()
                    .filter_map(|c| graph.get(*c))
                    .find(|c| c.state() != InstanceState::Started)
                {
                    return Err(Error::Plugin(format!(
                        "instance '{}' stacked on {} has not been started",
                        idle.id(),
                        info.instance_id
                    )));
                }
            }
        }

        let pdata = ProtoData {
            start_sample,
            end_sample,
            output: info,
            payload,
        };
        self.callbacks_mut().dispatch(&pdata);

        if let Payload::Value(value) = &pdata.payload {
            let children = self.graph().children(handle).to_vec();
            for child in children {
                self.decode_stacked(child, start_sample, end_sample, value)?;
            }
        }
        Ok(())
    }
}

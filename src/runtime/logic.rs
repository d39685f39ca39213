//! Decoder logic trait
//!
//! Defines the [`DecoderLogic`] trait that every decoder type implements.
//! The core never looks inside a logic object; it only drives its hooks:
//! - `start` once per run, before any samples
//! - `decode` for every raw sample buffer (root instances)
//! - `decode_stacked` for every structured value put by the instance below
//! - `metadata` when the session learns capture metadata
//!
//! Hooks receive a [`Context`] through which they register outputs and put
//! protocol data.

use super::errors::{LogicResult, Result};
use super::graph::InstanceHandle;
use super::instance::LogicHandle;
use super::options::OptionSet;
use super::output::{MetaSpec, OutputId, OutputKind, Payload, StructuredValue};
use super::sample::SampleCursor;
use super::session::Session;
use super::variant::{Variant, VariantType};
use std::any::Any;

/// Capture metadata keys a session can forward to its decoders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataKey {
    /// Sample rate in Hz, carried as [`Variant::U64`]
    Samplerate,
}

impl MetadataKey {
    /// Stable numeric key
    pub fn code(self) -> u32 {
        match self {
            MetadataKey::Samplerate => 10000,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            10000 => Some(MetadataKey::Samplerate),
            _ => None,
        }
    }

    /// Type a value for this key must have
    pub fn value_type(self) -> VariantType {
        match self {
            MetadataKey::Samplerate => VariantType::U64,
        }
    }
}

/// The algorithm behind a decoder type
pub trait DecoderLogic: Send {
    /// Prepare for a run: read options, register outputs
    fn start(&mut self, _ctx: &mut Context<'_>) -> LogicResult {
        Ok(())
    }

    /// Decode one raw sample buffer covering `start_sample..end_sample`
    fn decode(
        &mut self,
        ctx: &mut Context<'_>,
        start_sample: u64,
        end_sample: u64,
        samples: &SampleCursor<'_>,
    ) -> LogicResult;

    /// Consume a structured value put by the instance this one is stacked on
    fn decode_stacked(
        &mut self,
        _ctx: &mut Context<'_>,
        _start_sample: u64,
        _end_sample: u64,
        _value: &StructuredValue,
    ) -> LogicResult {
        Ok(())
    }

    /// Receive capture metadata
    fn metadata(&mut self, _ctx: &mut Context<'_>, _key: MetadataKey, _value: &Variant) -> LogicResult {
        Ok(())
    }
}

static NO_OPTIONS: OptionSet = OptionSet::EMPTY;

/// What a running hook can see and do
///
/// A context is bound to the instance whose hook is running.
pub struct Context<'s> {
    session: &'s mut Session,
    instance: InstanceHandle,
}

impl<'s> Context<'s> {
    pub(crate) fn new(session: &'s mut Session, instance: InstanceHandle) -> Self {
        Self { session, instance }
    }

    /// Handle of the running instance
    pub fn instance(&self) -> InstanceHandle {
        self.instance
    }

    /// Id of the running instance
    pub fn instance_id(&self) -> &str {
        self.session
            .instance(self.instance)
            .map(|i| i.id())
            .unwrap_or_default()
    }

    /// Logic handle of the running instance
    pub fn logic_handle(&self) -> Option<LogicHandle> {
        self.session.instance(self.instance).map(|i| i.logic_handle())
    }

    /// Options the instance was configured with
    pub fn options(&self) -> &OptionSet {
        self.session
            .instance(self.instance)
            .map(|i| i.options())
            .unwrap_or(&NO_OPTIONS)
    }

    /// Read-only view of the session, e.g. to look up other instances
    pub fn session(&self) -> &Session {
        self.session
    }

    /// Register an output of `kind` under protocol id `proto_id`
    pub fn register_output(&mut self, kind: OutputKind, proto_id: &str) -> Result<OutputId> {
        self.session
            .graph_mut()
            .require_mut(self.instance)?
            .register_output(kind, proto_id, None)
    }

    /// Register a metadata output whose values must have type `value_type`
    pub fn register_meta_output(
        &mut self,
        proto_id: &str,
        value_type: VariantType,
        name: &str,
        description: &str,
    ) -> Result<OutputId> {
        let meta = MetaSpec {
            value_type,
            name: name.to_string(),
            description: description.to_string(),
        };
        self.session
            .graph_mut()
            .require_mut(self.instance)?
            .register_output(OutputKind::Meta, proto_id, Some(meta))
    }

    /// Emit protocol data for `start_sample..end_sample` on `output`
    ///
    /// Callbacks run before this returns. Structured values are also fed to
    /// every instance stacked on this one.
    pub fn put(&mut self, start_sample: u64, end_sample: u64, output: OutputId, payload: Payload) -> Result<()> {
        self.session
            .put(self.instance, start_sample, end_sample, output, payload)
    }
}

/// Best-effort text of a caught panic
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

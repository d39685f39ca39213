//! Host runtime for stacked protocol decoder instances
//!
//! This library hosts pluggable logic-analyzer protocol decoders: it
//! instantiates decoder types inside sessions, configures their options and
//! probe-to-channel mapping, stacks instances on top of each other and drives
//! their lifecycle hooks over raw sample buffers.
//!
//! # Architecture
//!
//! - **DecoderDescriptor**: static description of a decoder type plus a factory
//!   for its [`DecoderLogic`]
//! - **Runtime**: decoder registry and the sessions created from it
//! - **Session**: a forest of decoder instances and the output callbacks fed by it
//! - **Context**: what a running hook can use to register outputs and put data
//!
//! # Example
//!
//! ```no_run
//! use sigdecode::{Context, DecoderDescriptor, DecoderLogic, LogicResult, Runtime, SampleCursor};
//!
//! struct Idle;
//!
//! impl DecoderLogic for Idle {
//!     fn decode(&mut self, _: &mut Context<'_>, _: u64, _: u64, _: &SampleCursor<'_>) -> LogicResult {
//!         Ok(())
//!     }
//! }
//!
//! let mut rt = Runtime::new();
//! rt.register_decoder(
//!     DecoderDescriptor::builder("idle", || Ok(Box::new(Idle) as Box<dyn DecoderLogic>))
//!         .probe("data", "DATA", "Data line")
//!         .build()?,
//! )?;
//! let sid = rt.new_session()?;
//! rt.create_instance(sid, "idle", None)?;
//! # Ok::<(), sigdecode::Error>(())
//! ```

pub mod runtime;

pub use runtime::{
    ClassSpec, Context, DecoderDescriptor, DecoderInstance, DecoderLogic, DecoderRegistry,
    DescriptorBuilder, Error, ErrorKind, InstanceHandle, InstanceState, LogicError, LogicHandle,
    LogicResult, MetaSpec, MetadataKey, OptionMap, OptionSet, OptionSpec, OptionValue, OutputId,
    OutputInfo, OutputKind, Payload, ProbeMap, ProbeMapping, ProbeSample, ProbeSpec, ProtoData,
    Result, Runtime, SampleCursor, Session, SessionId, StructuredValue, Variant, VariantType,
};

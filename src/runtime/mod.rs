//! Decoder instance runtime

pub mod context;
pub mod descriptor;
mod dispatch;
pub mod errors;
pub mod graph;
pub mod instance;
pub mod logic;
pub mod options;
pub mod output;
pub mod probes;
pub mod registry;
pub mod sample;
pub mod session;
pub mod variant;

#[cfg(test)]
pub(crate) mod testing;

pub use context::Runtime;
pub use descriptor::{ClassSpec, DecoderDescriptor, DescriptorBuilder, LogicFactory, OptionSpec, ProbeSpec};
pub use errors::{Error, ErrorKind, LogicError, LogicResult, Result};
pub use graph::{InstanceGraph, InstanceHandle};
pub use instance::{DecoderInstance, InstanceState, LogicHandle};
pub use logic::{Context, DecoderLogic, MetadataKey};
pub use options::{OptionSet, OptionValue};
pub use output::{MetaSpec, OutputId, OutputInfo, OutputKind, Payload, ProtoData, StructuredValue};
pub use probes::ProbeMapping;
pub use registry::DecoderRegistry;
pub use sample::{ProbeSample, SampleCursor};
pub use session::{Session, SessionId};
pub use variant::{OptionMap, ProbeMap, Variant, VariantType};

//! Decoder outputs and the per-session callback registry
//!
//! Decoders register outputs while starting, then `put` protocol data on them.
//! Each piece of [`ProtoData`] is handed to every callback registered for its
//! [`OutputKind`], in registration order.

use super::variant::{Variant, VariantType};
use crossbeam_channel::{Receiver as CrossbeamReceiver, unbounded};
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Kind of data an output carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputKind {
    /// Human-readable annotations
    Annotation,
    /// Structured values consumed by stacked decoders
    Value,
    /// Raw binary blobs
    Binary,
    /// Typed metadata values
    Meta,
}

impl OutputKind {
    pub const ALL: [OutputKind; 4] = [
        OutputKind::Annotation,
        OutputKind::Value,
        OutputKind::Binary,
        OutputKind::Meta,
    ];

    fn index(self) -> usize {
        match self {
            OutputKind::Annotation => 0,
            OutputKind::Value => 1,
            OutputKind::Binary => 2,
            OutputKind::Meta => 3,
        }
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            OutputKind::Annotation => "annotation",
            OutputKind::Value => "value",
            OutputKind::Binary => "binary",
            OutputKind::Meta => "meta",
        };
        f.write_str(name)
    }
}

/// Index of an output within its instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutputId(usize);

impl OutputId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn as_usize(&self) -> usize {
        self.0
    }
}

/// Declared metadata of a `Meta` output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaSpec {
    pub value_type: VariantType,
    pub name: String,
    pub description: String,
}

/// An output registered by an instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputInfo {
    pub id: OutputId,
    pub kind: OutputKind,
    /// Id of the owning instance
    pub instance_id: String,
    pub proto_id: String,
    /// Only set for `OutputKind::Meta`
    pub meta: Option<MetaSpec>,
}

/// A type-erased structured value passed between stacked decoders
#[derive(Clone)]
pub struct StructuredValue(Arc<dyn Any + Send + Sync>);

impl StructuredValue {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    /// Borrow the value as `T`, or `None` if it holds another type
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    pub fn is<T: Any>(&self) -> bool {
        self.0.is::<T>()
    }
}

impl fmt::Debug for StructuredValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "StructuredValue")
    }
}

/// Payload of one piece of protocol data
#[derive(Debug, Clone)]
pub enum Payload {
    Annotation {
        /// Index into the decoder's annotation classes
        class: usize,
        /// Text variants, longest first
        texts: Vec<String>,
    },
    Value(StructuredValue),
    Binary {
        /// Index into the decoder's binary classes
        class: usize,
        data: Arc<[u8]>,
    },
    Meta(Variant),
}

impl Payload {
    pub fn kind(&self) -> OutputKind {
        match self {
            Payload::Annotation { .. } => OutputKind::Annotation,
            Payload::Value(_) => OutputKind::Value,
            Payload::Binary { .. } => OutputKind::Binary,
            Payload::Meta(_) => OutputKind::Meta,
        }
    }
}

/// Protocol data emitted by an instance for a sample range
#[derive(Debug, Clone)]
pub struct ProtoData {
    pub start_sample: u64,
    pub end_sample: u64,
    pub output: OutputInfo,
    pub payload: Payload,
}

/// Consumer of protocol data
pub type OutputCallback = Box<dyn FnMut(&ProtoData) + Send>;

/// Output kind -> ordered callbacks
#[derive(Default)]
pub struct CallbackRegistry {
    callbacks: [Vec<OutputCallback>; 4],
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a callback for `kind`
    pub fn register(&mut self, kind: OutputKind, callback: OutputCallback) {
        self.callbacks[kind.index()].push(callback);
    }

    /// Register a callback that forwards every `kind` item into a channel
    pub fn channel(&mut self, kind: OutputKind) -> CrossbeamReceiver<ProtoData> {
        let (tx, rx) = unbounded();
        self.register(
            kind,
            Box::new(move |pdata| {
                // A dropped receiver only means nobody listens anymore
                let _ = tx.send(pdata.clone());
            }),
        );
        rx
    }

    /// Number of callbacks registered for `kind`
    pub fn count(&self, kind: OutputKind) -> usize {
        self.callbacks[kind.index()].len()
    }

    /// Invoke every callback for the data's kind, in registration order
    pub fn dispatch(&mut self, pdata: &ProtoData) {
        let callbacks = &mut self.callbacks[pdata.output.kind.index()];
        trace!(
            "dispatching {} output '{}' of {} to {} callbacks",
            pdata.output.kind,
            pdata.output.proto_id,
            pdata.output.instance_id,
            callbacks.len()
        );
        for cb in callbacks.iter_mut() {
            cb(pdata);
        }
    }
}

impl fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut map = f.debug_map();
        for kind in OutputKind::ALL {
            map.entry(&kind, &self.count(kind));
        }
        map.finish()
    }
}

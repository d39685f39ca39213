//! Test doubles for decoder logic

use super::descriptor::DecoderDescriptor;
use super::errors::{ErrorKind, LogicError, LogicResult};
use super::instance::DecoderInstance;
use super::logic::{Context, DecoderLogic, MetadataKey};
use super::output::{OutputId, OutputKind, Payload, StructuredValue};
use super::sample::SampleCursor;
use super::variant::Variant;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Logic that accepts everything and does nothing
pub(crate) struct NullLogic;

impl NullLogic {
    pub(crate) fn factory() -> impl Fn() -> LogicResult<Box<dyn DecoderLogic>> + Send + Sync + 'static {
        || Ok(Box::new(NullLogic) as Box<dyn DecoderLogic>)
    }
}

impl DecoderLogic for NullLogic {
    fn decode(&mut self, _ctx: &mut Context<'_>, _start: u64, _end: u64, _samples: &SampleCursor<'_>) -> LogicResult {
        Ok(())
    }
}

pub(crate) fn null_descriptor(id: &str) -> Arc<DecoderDescriptor> {
    Arc::new(DecoderDescriptor::builder(id, NullLogic::factory()).build().unwrap())
}

pub(crate) fn plain_instance(descriptor: &Arc<DecoderDescriptor>, id: &str) -> DecoderInstance {
    DecoderInstance::new(Arc::clone(descriptor), id.to_string()).unwrap()
}

pub(crate) fn uart_descriptor() -> Arc<DecoderDescriptor> {
    Arc::new(
        DecoderDescriptor::builder("uart", NullLogic::factory())
            .probe("rx", "RX", "Receive line")
            .optional_probe("tx", "TX", "Transmit line")
            .option("baudrate", "Baud rate", 115200i64)
            .option("parity", "Parity", "none")
            .output(OutputKind::Annotation)
            .build()
            .unwrap(),
    )
}

/// Counts how many logic objects were dropped
#[derive(Clone, Default)]
pub(crate) struct DropCounter(Arc<AtomicUsize>);

impl DropCounter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

struct CountedLogic(DropCounter);

impl DecoderLogic for CountedLogic {
    fn decode(&mut self, _ctx: &mut Context<'_>, _start: u64, _end: u64, _samples: &SampleCursor<'_>) -> LogicResult {
        Ok(())
    }
}

impl Drop for CountedLogic {
    fn drop(&mut self) {
        self.0.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Descriptor whose logic objects bump `drops` when released
pub(crate) fn counted_descriptor(id: &str, drops: &DropCounter) -> Arc<DecoderDescriptor> {
    let drops = drops.clone();
    Arc::new(
        DecoderDescriptor::builder(id, move || Ok(Box::new(CountedLogic(drops.clone())) as Box<dyn DecoderLogic>))
            .build()
            .unwrap(),
    )
}

/// A hook call seen by [`Recorder`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Event {
    Start {
        inst: String,
    },
    Decode {
        inst: String,
        start: u64,
        end: u64,
        levels: Vec<Option<bool>>,
    },
    Stacked {
        inst: String,
        value: u32,
    },
    Metadata {
        inst: String,
        samplerate: u64,
    },
}

/// Shared log of hook calls across logic objects
#[derive(Clone, Default)]
pub(crate) struct Recorder {
    events: Arc<Mutex<Vec<Event>>>,
    rejected: Arc<AtomicUsize>,
}

impl Recorder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }

    pub(crate) fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub(crate) fn starts(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Start { inst } => Some(inst),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn rejected_puts(&self) -> usize {
        self.rejected.load(Ordering::SeqCst)
    }
}

/// Configurable logic that records every hook call
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ScriptedLogic {
    pub fail_start: bool,
    pub panic_decode: bool,
    /// Emit one annotation per decode call
    pub annotate: bool,
    /// Emit the sample count as a structured value per decode call
    pub emit_value: bool,
    /// Attempt a series of invalid puts during decode
    pub bad_put: bool,
}

impl ScriptedLogic {
    /// Descriptor with one probe "data", one annotation class and value outputs
    pub(crate) fn descriptor(id: &str, recorder: &Recorder, script: ScriptedLogic) -> Arc<DecoderDescriptor> {
        let recorder = recorder.clone();
        Arc::new(
            DecoderDescriptor::builder(id, move || {
                Ok(Box::new(Scripted {
                    script,
                    recorder: recorder.clone(),
                    annotation: None,
                    value: None,
                }) as Box<dyn DecoderLogic>)
            })
            .probe("data", "DATA", "Data line")
            .annotation("level", "Line level")
            .output(OutputKind::Annotation)
            .output(OutputKind::Value)
            .build()
            .unwrap(),
        )
    }
}

struct Scripted {
    script: ScriptedLogic,
    recorder: Recorder,
    annotation: Option<OutputId>,
    value: Option<OutputId>,
}

impl Scripted {
    fn expect_rejected(&self, result: super::errors::Result<()>) {
        if let Err(e) = result
            && e.kind() == ErrorKind::PluginError
        {
            self.recorder.rejected.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl DecoderLogic for Scripted {
    fn start(&mut self, ctx: &mut Context<'_>) -> LogicResult {
        self.recorder.push(Event::Start {
            inst: ctx.instance_id().to_string(),
        });
        if self.script.fail_start {
            return Err(LogicError::msg("refusing to start"));
        }
        if self.script.annotate || self.script.bad_put {
            self.annotation = Some(ctx.register_output(OutputKind::Annotation, "scripted")?);
        }
        if self.script.emit_value {
            self.value = Some(ctx.register_output(OutputKind::Value, "scripted")?);
        }
        Ok(())
    }

    fn decode(&mut self, ctx: &mut Context<'_>, start: u64, end: u64, samples: &SampleCursor<'_>) -> LogicResult {
        let levels = samples.iter().map(|(_, s)| s.probe(0)).collect();
        self.recorder.push(Event::Decode {
            inst: ctx.instance_id().to_string(),
            start,
            end,
            levels,
        });
        if self.script.panic_decode {
            panic!("decoder state corrupted");
        }
        if let Some(out) = self.annotation
            && self.script.annotate
        {
            ctx.put(
                start,
                end,
                out,
                Payload::Annotation {
                    class: 0,
                    texts: vec!["Level".into(), "L".into()],
                },
            )?;
        }
        if let Some(out) = self.value {
            ctx.put(start, end, out, Payload::Value(StructuredValue::new(samples.num_samples() as u32)))?;
        }
        if let Some(out) = self.annotation
            && self.script.bad_put
        {
            let text = || vec!["x".to_string()];
            self.expect_rejected(ctx.put(start, end, out, Payload::Value(StructuredValue::new(0u32))));
            self.expect_rejected(ctx.put(end, start.saturating_sub(1), out, Payload::Annotation { class: 0, texts: text() }));
            self.expect_rejected(ctx.put(start, end, out, Payload::Annotation { class: 7, texts: text() }));
            self.expect_rejected(ctx.put(start, end, out, Payload::Annotation { class: 0, texts: Vec::new() }));
            return Err(LogicError::msg("every put was rejected"));
        }
        Ok(())
    }

    fn decode_stacked(&mut self, ctx: &mut Context<'_>, _start: u64, _end: u64, value: &StructuredValue) -> LogicResult {
        let value = value
            .downcast_ref::<u32>()
            .copied()
            .ok_or_else(|| LogicError::msg("expected a sample count"))?;
        self.recorder.push(Event::Stacked {
            inst: ctx.instance_id().to_string(),
            value,
        });
        Ok(())
    }

    fn metadata(&mut self, ctx: &mut Context<'_>, key: MetadataKey, value: &Variant) -> LogicResult {
        if key == MetadataKey::Samplerate
            && let Variant::U64(rate) = value
        {
            self.recorder.push(Event::Metadata {
                inst: ctx.instance_id().to_string(),
                samplerate: *rate,
            });
        }
        Ok(())
    }
}

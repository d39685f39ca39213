//! Example: two-level decoder stack over a raw capture
//!
//! Reads a raw capture (one byte per sample, bit N = channel N), decodes a
//! clocked serial line on it and stacks an ASCII decoder on top of the words.
//!
//! Usage:
//!   cargo run --release --example stack_decode -- \
//!       --file capture.bin \
//!       --clk 0 --data 1 --bits 8 \
//!       --samplerate 1000000

use clap::Parser;
use sigdecode::{
    Context, DecoderDescriptor, DecoderLogic, LogicError, LogicResult, MetadataKey, OptionMap,
    OutputId, OutputKind, Payload, ProbeMap, Runtime, SampleCursor, StructuredValue, Variant,
};
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to raw capture file
    #[arg(short, long)]
    file: String,

    /// Clock channel
    #[arg(long)]
    clk: i32,

    /// Data channel
    #[arg(long)]
    data: i32,

    /// Bits per word
    #[arg(long, default_value = "8")]
    bits: i64,

    /// Bit order of each word (msb-first or lsb-first)
    #[arg(long, default_value = "msb-first")]
    bitorder: String,

    /// Samplerate of the capture in Hz
    #[arg(long)]
    samplerate: Option<u64>,

    /// Samples fed per decode call
    #[arg(long, default_value = "4096")]
    chunk: usize,

    /// Number of annotations to print (0 = unlimited)
    #[arg(short, long, default_value = "100")]
    n: usize,
}

/// Word sampled on rising clock edges
#[derive(Debug, Clone, Copy)]
struct SerialWord {
    value: u32,
    bits: u32,
}

/// Samples `data` on every rising edge of `clk`
#[derive(Default)]
struct SerialLogic {
    bits: u32,
    msb_first: bool,
    prev_clk: Option<bool>,
    word: u32,
    collected: u32,
    word_start: u64,
    ann: Option<OutputId>,
    words: Option<OutputId>,
}

impl DecoderLogic for SerialLogic {
    fn start(&mut self, ctx: &mut Context<'_>) -> LogicResult {
        let bits = ctx.options().get_int("bits").unwrap_or(8);
        if !(1..=32).contains(&bits) {
            return Err(LogicError::msg(format!("invalid word size {}", bits)));
        }
        self.bits = bits as u32;
        self.msb_first = ctx.options().get_str("bitorder") != Some("lsb-first");
        self.ann = Some(ctx.register_output(OutputKind::Annotation, "serial")?);
        self.words = Some(ctx.register_output(OutputKind::Value, "serial")?);
        Ok(())
    }

    fn decode(&mut self, ctx: &mut Context<'_>, _start: u64, _end: u64, samples: &SampleCursor<'_>) -> LogicResult {
        let (Some(ann), Some(words)) = (self.ann, self.words) else {
            return Err(LogicError::msg("decode before start"));
        };

        for (samplenum, sample) in samples.iter() {
            let (Some(clk), Some(data)) = (sample.probe(0), sample.probe(1)) else {
                continue;
            };
            let rising = self.prev_clk == Some(false) && clk;
            self.prev_clk = Some(clk);
            if !rising {
                continue;
            }

            if self.collected == 0 {
                self.word_start = samplenum;
            }
            let bit = u32::from(data);
            if self.msb_first {
                self.word = (self.word << 1) | bit;
            } else {
                self.word |= bit << self.collected;
            }
            self.collected += 1;

            if self.collected == self.bits {
                let word = SerialWord {
                    value: self.word,
                    bits: self.bits,
                };
                let end = samplenum + 1;
                ctx.put(
                    self.word_start,
                    end,
                    ann,
                    Payload::Annotation {
                        class: 0,
                        texts: vec![format!("Data: 0x{:02X}", word.value), format!("{:02X}", word.value)],
                    },
                )?;
                ctx.put(self.word_start, end, words, Payload::Value(StructuredValue::new(word)))?;
                self.word = 0;
                self.collected = 0;
            }
        }
        Ok(())
    }

    fn metadata(&mut self, _ctx: &mut Context<'_>, key: MetadataKey, value: &Variant) -> LogicResult {
        if let (MetadataKey::Samplerate, Variant::U64(rate)) = (key, value) {
            debug!("serial: samplerate {} Hz", rate);
        }
        Ok(())
    }
}

/// Renders serial words as ASCII characters
#[derive(Default)]
struct AsciiLogic {
    ann: Option<OutputId>,
}

impl DecoderLogic for AsciiLogic {
    fn start(&mut self, ctx: &mut Context<'_>) -> LogicResult {
        self.ann = Some(ctx.register_output(OutputKind::Annotation, "ascii")?);
        Ok(())
    }

    fn decode(&mut self, _ctx: &mut Context<'_>, _start: u64, _end: u64, _samples: &SampleCursor<'_>) -> LogicResult {
        Err(LogicError::msg("ascii only decodes on top of a word decoder"))
    }

    fn decode_stacked(&mut self, ctx: &mut Context<'_>, start: u64, end: u64, value: &StructuredValue) -> LogicResult {
        let Some(word) = value.downcast_ref::<SerialWord>() else {
            return Ok(());
        };
        let Some(ann) = self.ann else {
            return Err(LogicError::msg("decode before start"));
        };
        let text = match u8::try_from(word.value) {
            Ok(b) if b.is_ascii_graphic() || b == b' ' => (b as char).to_string(),
            _ => format!("\\x{:0width$X}", word.value, width = word.bits.div_ceil(4) as usize),
        };
        ctx.put(start, end, ann, Payload::Annotation { class: 0, texts: vec![text] })?;
        Ok(())
    }
}

fn serial_descriptor() -> sigdecode::Result<DecoderDescriptor> {
    DecoderDescriptor::builder("serial", || Ok(Box::new(SerialLogic::default()) as Box<dyn DecoderLogic>))
        .with_name("Serial")
        .with_longname("Clocked serial line")
        .with_desc("Samples a data line on rising clock edges.")
        .probe("clk", "CLK", "Clock line")
        .probe("data", "DATA", "Data line")
        .option("bits", "Bits per word", 8i64)
        .option("bitorder", "Bit order", "msb-first")
        .annotation("data", "Data word")
        .output(OutputKind::Annotation)
        .output(OutputKind::Value)
        .build()
}

fn ascii_descriptor() -> sigdecode::Result<DecoderDescriptor> {
    DecoderDescriptor::builder("ascii", || Ok(Box::new(AsciiLogic::default()) as Box<dyn DecoderLogic>))
        .with_name("ASCII")
        .with_longname("ASCII characters")
        .with_desc("Shows serial words as ASCII characters.")
        .annotation("char", "Character")
        .output(OutputKind::Annotation)
        .build()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    info!("=== Stacked Decode Example ===");
    info!("File: {}", args.file);
    info!("Serial: CLK={}, DATA={}, {} bits {}", args.clk, args.data, args.bits, args.bitorder);

    let capture = std::fs::read(&args.file)?;
    info!("Loaded {} samples", capture.len());

    let mut rt = Runtime::new();
    rt.register_decoder(serial_descriptor()?)?;
    rt.register_decoder(ascii_descriptor()?)?;
    let sid = rt.new_session()?;

    let mut options = OptionMap::new();
    options.insert("id".into(), Variant::from("serial0"));
    options.insert("bits".into(), Variant::I64(args.bits));
    options.insert("bitorder".into(), Variant::from(args.bitorder.as_str()));
    let serial = rt.create_instance(sid, "serial", Some(&mut options))?;
    let ascii = rt.create_instance(sid, "ascii", None)?;
    rt.stack(sid, serial, ascii)?;

    let session = rt.session_mut(sid).ok_or("session vanished")?;

    let mut probes = ProbeMap::new();
    probes.insert("clk".into(), Variant::I32(args.clk));
    probes.insert("data".into(), Variant::I32(args.data));
    session.set_probes(serial, &probes)?;

    let annotations = session.output_channel(OutputKind::Annotation);

    session.start()?;
    if let Some(rate) = args.samplerate {
        session.set_metadata(MetadataKey::Samplerate, Variant::U64(rate))?;
    }

    let mut samplenum = 0u64;
    for chunk in capture.chunks(args.chunk.max(1)) {
        let end = samplenum + chunk.len() as u64;
        session.send(samplenum, end, chunk)?;
        samplenum = end;
    }

    let mut printed = 0;
    for pdata in annotations.try_iter() {
        if args.n > 0 && printed >= args.n {
            break;
        }
        if let Payload::Annotation { texts, .. } = &pdata.payload {
            let text = texts.first().map(String::as_str).unwrap_or_default();
            match args.samplerate {
                Some(rate) => info!(
                    "{:>10.6}s {:>8}: {}",
                    pdata.start_sample as f64 / rate as f64,
                    pdata.output.instance_id,
                    text
                ),
                None => info!(
                    "{:>10}-{:<10} {:>8}: {}",
                    pdata.start_sample, pdata.end_sample, pdata.output.instance_id, text
                ),
            }
            printed += 1;
        }
    }

    info!("Done!");

    Ok(())
}

//! End-to-end session flow through the public API

use sigdecode::{
    Context, DecoderDescriptor, DecoderLogic, ErrorKind, LogicError, LogicResult, OptionMap,
    OutputId, OutputKind, Payload, ProbeMap, Runtime, SampleCursor, StructuredValue, Variant,
};

/// Emits every level change on probe 0 as a structured value
#[derive(Default)]
struct EdgeLogic {
    prev: Option<bool>,
    edges: Option<OutputId>,
}

impl DecoderLogic for EdgeLogic {
    fn start(&mut self, ctx: &mut Context<'_>) -> LogicResult {
        self.prev = None;
        self.edges = Some(ctx.register_output(OutputKind::Value, "edge")?);
        Ok(())
    }

    fn decode(&mut self, ctx: &mut Context<'_>, _start: u64, _end: u64, samples: &SampleCursor<'_>) -> LogicResult {
        let out = self.edges.ok_or_else(|| LogicError::msg("not started"))?;
        for (n, sample) in samples.iter() {
            let Some(level) = sample.probe(0) else { continue };
            if self.prev.is_some_and(|p| p != level) {
                ctx.put(n, n + 1, out, Payload::Value(StructuredValue::new(level)))?;
            }
            self.prev = Some(level);
        }
        Ok(())
    }
}

/// Annotates edges received from below
#[derive(Default)]
struct LabelLogic {
    ann: Option<OutputId>,
}

impl DecoderLogic for LabelLogic {
    fn start(&mut self, ctx: &mut Context<'_>) -> LogicResult {
        self.ann = Some(ctx.register_output(OutputKind::Annotation, "label")?);
        Ok(())
    }

    fn decode(&mut self, _ctx: &mut Context<'_>, _start: u64, _end: u64, _samples: &SampleCursor<'_>) -> LogicResult {
        Err(LogicError::msg("label needs a decoder below it"))
    }

    fn decode_stacked(&mut self, ctx: &mut Context<'_>, start: u64, end: u64, value: &StructuredValue) -> LogicResult {
        let out = self.ann.ok_or_else(|| LogicError::msg("not started"))?;
        let text = match value.downcast_ref::<bool>() {
            Some(true) => "rise",
            Some(false) => "fall",
            None => return Err(LogicError::msg("unexpected value")),
        };
        ctx.put(start, end, out, Payload::Annotation { class: 0, texts: vec![text.to_string()] })?;
        Ok(())
    }
}

fn runtime() -> Runtime {
    let mut rt = Runtime::new();
    rt.register_decoder(
        DecoderDescriptor::builder("edge", || Ok(Box::new(EdgeLogic::default()) as Box<dyn DecoderLogic>))
            .probe("line", "LINE", "Observed line")
            .output(OutputKind::Value)
            .build()
            .unwrap(),
    )
    .unwrap();
    rt.register_decoder(
        DecoderDescriptor::builder("label", || Ok(Box::new(LabelLogic::default()) as Box<dyn DecoderLogic>))
            .annotation("edge", "Edge")
            .output(OutputKind::Annotation)
            .build()
            .unwrap(),
    )
    .unwrap();
    rt
}

fn texts(pdata: &sigdecode::ProtoData) -> &str {
    match &pdata.payload {
        Payload::Annotation { texts, .. } => &texts[0],
        _ => "",
    }
}

#[test]
fn test_stacked_decoders_produce_annotations() {
    let mut rt = runtime();
    let sid = rt.new_session().unwrap();
    let edge = rt.create_instance(sid, "edge", None).unwrap();
    let label = rt.create_instance(sid, "label", None).unwrap();
    rt.stack(sid, edge, label).unwrap();

    let session = rt.session_mut(sid).unwrap();
    let mut probes = ProbeMap::new();
    probes.insert("line".into(), Variant::I32(2));
    session.set_probes(edge, &probes).unwrap();
    let annotations = session.output_channel(OutputKind::Annotation);

    session.start().unwrap();
    // channel 2: low, low, high, high | high, low
    session.send(0, 4, &[0x00, 0x00, 0x04, 0x04]).unwrap();
    session.send(4, 6, &[0x04, 0x00]).unwrap();

    let got: Vec<(u64, String, String)> = annotations
        .try_iter()
        .map(|p| (p.start_sample, p.output.instance_id.clone(), texts(&p).to_string()))
        .collect();
    assert_eq!(
        got,
        vec![
            (2, "label".to_string(), "rise".to_string()),
            (5, "label".to_string(), "fall".to_string()),
        ]
    );
}

#[test]
fn test_stacked_instance_is_not_a_root() {
    let mut rt = runtime();
    let sid = rt.new_session().unwrap();
    let edge = rt.create_instance(sid, "edge", None).unwrap();
    let label = rt.create_instance(sid, "label", None).unwrap();
    rt.stack(sid, edge, label).unwrap();

    assert_eq!(rt.find_by_id(sid, "label"), None);
    let session = rt.session(sid).unwrap();
    let handle = session.instance(label).unwrap().logic_handle();
    assert_eq!(rt.find_by_logic_handle(Some((sid, edge)), handle), Some((sid, label)));
    assert_eq!(rt.find_by_logic_handle(None, handle), Some((sid, label)));
}

#[test]
fn test_errors_and_teardown() {
    let mut rt = runtime();
    let sid = rt.new_session().unwrap();

    let mut opts = OptionMap::new();
    opts.insert("threshold".into(), Variant::I64(3));
    let err = rt.create_instance(sid, "edge", Some(&mut opts)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert_eq!(err.code(), -3);

    let edge = rt.create_instance(sid, "edge", None).unwrap();
    let session = rt.session_mut(sid).unwrap();
    session.start().unwrap();
    assert_eq!(session.decode(edge, 0, 0, &[]).unwrap_err().kind(), ErrorKind::InvalidArgument);

    // a root that cannot decode raw samples fails as a decoder error
    rt.create_instance(sid, "label", None).unwrap();
    let session = rt.session_mut(sid).unwrap();
    session.start().unwrap();
    assert_eq!(session.send(0, 1, &[0]).unwrap_err().kind(), ErrorKind::PluginError);

    session.free_all(None);
    assert!(session.roots().is_empty());
    assert!(session.graph().is_empty());

    rt.destroy_session(sid).unwrap();
    assert!(rt.session(sid).is_none());
}

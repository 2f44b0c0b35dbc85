//! End-to-end decode scenarios with a stub codec.

use std::{cell::Cell, path::Path, rc::Rc};

use orpheus_tts::{
    classify::StopReason,
    source::{ChannelSource, ScriptedSource, END_OF_TURN_ID},
    tokenize::audio_token_id,
    Engine, Error, GenerationConfig, LineSource, QuantizePolicy, ReplayModel, SnacCodes, Voice,
};

/// Samples the stub codec returns for a 4-frame window (SNAC 24 kHz size).
const DECODED_LEN: usize = 8192;
const SEGMENT_LEN: usize = DECODED_LEN / 4;
const AMPLITUDE: f32 = 0.25;

/// Fixed-amplitude codec that counts its calls.
fn stub_codec(calls: Rc<Cell<usize>>) -> impl Fn(&SnacCodes) -> orpheus_tts::Result<Vec<f32>> {
    move |codes: &SnacCodes| {
        assert_eq!((codes.coarse.len(), codes.medium.len(), codes.fine.len()), (4, 8, 16));
        calls.set(calls.get() + 1);
        Ok(vec![AMPLITUDE; DECODED_LEN])
    }
}

fn engine_with(config: GenerationConfig) -> (Engine, Rc<Cell<usize>>) {
    let calls = Rc::new(Cell::new(0));
    (Engine::new(stub_codec(calls.clone()), config).unwrap(), calls)
}

/// Audio token ids encoding `indices`, positions counted from `start`.
fn encode(indices: &[u32], start: usize) -> Vec<u32> {
    indices.iter().enumerate().map(|(i, &idx)| audio_token_id(idx, start + i)).collect()
}

fn read_wav(path: &Path) -> (hound::WavSpec, Vec<i16>) {
    let mut reader = hound::WavReader::open(path).unwrap();
    let samples = reader.samples::<i16>().map(|s| s.unwrap()).collect();
    (reader.spec(), samples)
}

#[test]
fn scenario_a_no_audio_tokens_is_terminal() {
    let (engine, calls) = engine_with(GenerationConfig::default());
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.wav");

    // preamble terminators and plain text tokens only
    let model = ReplayModel::new(vec![128_259, 128_257, 128_260, 1_000, 2_000, END_OF_TURN_ID]);
    let err = engine.synthesize_to_file(&model, Voice::Tara, "Hello", &path).unwrap_err();

    assert!(matches!(err, Error::NoAudio));
    assert!(!path.exists());
    assert_eq!(calls.get(), 0);
}

#[test]
fn scenario_b_single_window() {
    let (engine, calls) = engine_with(GenerationConfig::default());
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("b.wav");

    let indices: Vec<u32> = (1..=28).map(|i| i * 100).collect();
    let mut ids = encode(&indices, 0);
    ids.push(END_OF_TURN_ID);

    let report = engine
        .synthesize_to_file(&ReplayModel::new(ids), Voice::Dan, "One window.", &path)
        .unwrap();

    assert_eq!(calls.get(), 1);
    assert_eq!(report.stats.stop_reason, StopReason::Terminator);
    assert_eq!(report.wav.segments, 1);
    assert_eq!(report.wav.samples, SEGMENT_LEN);

    let (spec, samples) = read_wav(&path);
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.sample_rate, 24_000);
    assert_eq!(spec.bits_per_sample, 16);
    assert_eq!(spec.sample_format, hound::SampleFormat::Int);
    let expected = (AMPLITUDE * 32767.0) as i16;
    assert_eq!(samples, vec![expected; SEGMENT_LEN]);
}

#[test]
fn scenario_c_token_cap_is_partial_success() {
    let config = GenerationConfig { max_tokens: 42, ..Default::default() };
    let (engine, calls) = engine_with(config);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("c.wav");

    // never terminates on its own
    let ids = encode(&vec![77; 500], 0);
    let report = engine
        .synthesize_to_file(&ReplayModel::new(ids), Voice::Zac, "Long text", &path)
        .unwrap();

    assert_eq!(report.stats.stop_reason, StopReason::TokenCap);
    assert_eq!(report.stats.audio_tokens, 42);
    // windows at 28, 35, 42
    assert_eq!(calls.get(), 3);
    assert_eq!(read_wav(&path).1.len(), 3 * SEGMENT_LEN);
}

#[test]
fn scenario_c_token_cap_after_preamble() {
    let config = GenerationConfig { max_tokens: 42, ..Default::default() };
    let (engine, calls) = engine_with(config);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("c2.wav");

    // the model always opens with control tokens; they must not eat the audio cap
    let mut ids = vec![128_259, 128_257, 128_260];
    ids.extend(encode(&vec![77; 500], 0));
    let report = engine
        .synthesize_to_file(&ReplayModel::new(ids), Voice::Zac, "Long text", &path)
        .unwrap();

    assert_eq!(report.stats.stop_reason, StopReason::TokenCap);
    assert_eq!(report.stats.audio_tokens, 42);
    assert_eq!(report.stats.windows, 3);
    assert_eq!(calls.get(), 3);
}

#[test]
fn line_stream_with_invalid_utf8_text_keeps_decoding() {
    let (engine, calls) = engine_with(GenerationConfig::default());

    let ids = encode(&[12; 28], 0);
    let mut input = Vec::new();
    for (i, id) in ids.iter().enumerate() {
        if i == 10 {
            // byte-fallback junk between audio tokens
            input.extend_from_slice(b"42 <custom_\xff\xfe>\n");
        }
        input.extend_from_slice(format!("{id}\n").as_bytes());
    }

    let decoded = engine
        .decode_stream(&mut LineSource::new(std::io::Cursor::new(input)))
        .unwrap();
    assert_eq!(decoded.stats.tokens_pulled, 29);
    assert_eq!(decoded.stats.audio_tokens, 28);
    assert_eq!(calls.get(), 1);
}

#[test]
fn scenario_d_out_of_range_window_is_dropped() {
    let (engine, calls) = engine_with(GenerationConfig::default());

    // 4096 sits in the fifth frame; it is part of the windows ending at 35,
    // 42, 49 and 56, and gone from the one ending at 63.
    let mut indices = vec![5u32; 63];
    indices[30] = 4096;
    let ids = encode(&indices, 0);

    let decoded = engine.decode_stream(&mut ScriptedSource::new(ids)).unwrap();
    assert_eq!(decoded.stats.windows, 6);
    assert_eq!(decoded.stats.dropped_windows, 4);
    assert_eq!(calls.get(), 2);
    assert_eq!(decoded.audio.sample_count(), 2 * SEGMENT_LEN);
}

#[test]
fn terminator_only_counts_after_audio() {
    let (engine, _) = engine_with(GenerationConfig::default());

    // leading terminator is preamble: all 28 tokens still decode
    let mut ids = vec![END_OF_TURN_ID];
    ids.extend(encode(&[9; 28], 0));
    let decoded = engine.decode_stream(&mut ScriptedSource::new(ids)).unwrap();
    assert_eq!(decoded.stats.audio_tokens, 28);

    // the same id after one audio token ends generation right there
    let mut ids = encode(&[9], 0);
    ids.push(END_OF_TURN_ID);
    ids.extend(encode(&[9; 27], 1));
    let mut source = ScriptedSource::new(ids);
    let err = engine.decode_stream(&mut source).unwrap_err();
    assert!(matches!(err, Error::NoAudio));
    assert_eq!(orpheus_tts::TokenSource::next_token(&mut source).unwrap(), Some(audio_token_id(9, 1)));
}

#[test]
fn wav_round_trip_matches_pcm() {
    let (engine, _) = engine_with(GenerationConfig::default());
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rt.wav");

    let decoded = engine.decode_stream(&mut ScriptedSource::new(encode(&[1; 35], 0))).unwrap();
    decoded.write_wav(&path).unwrap();

    let bytes: Vec<u8> = read_wav(&path).1.iter().flat_map(|s| s.to_le_bytes()).collect();
    assert_eq!(bytes, decoded.audio.pcm_bytes());
}

#[test]
fn wrap_policy_reproduces_overshoot() {
    let codec = |_: &SnacCodes| -> orpheus_tts::Result<Vec<f32>> { Ok(vec![1.5; DECODED_LEN]) };
    let config = GenerationConfig { quantize: QuantizePolicy::Wrap, ..Default::default() };
    let engine = Engine::new(codec, config).unwrap();
    let decoded = engine.decode_stream(&mut ScriptedSource::new(encode(&[1; 28], 0))).unwrap();
    assert!(decoded.audio.segments()[0].samples().all(|s| s == -16386));
}

#[test]
fn channel_source_streams_from_producer_thread() {
    let (tx, rx) = std::sync::mpsc::channel();
    let producer = std::thread::spawn(move || {
        tx.send(128_259).unwrap();
        for id in encode(&[300; 35], 0) {
            tx.send(id).unwrap();
        }
        tx.send(128_260).unwrap();
    });

    let (engine, calls) = engine_with(GenerationConfig::default());
    let decoded = engine.decode_stream(&mut ChannelSource::new(rx)).unwrap();
    producer.join().unwrap();

    assert_eq!(decoded.stats.stop_reason, StopReason::Terminator);
    assert_eq!(calls.get(), 2);
}

// Integration tests for the session multiplexer
//
// These run against a stub engine so each test controls exactly when
// finalize callbacks fire.

mod common;

use anyhow::Result;
use common::*;
use loqa_batch::{AudioChunk, EngineError, MuxError, SegmentResult, SessionState};
use std::sync::Arc;

fn chunk(samples: usize) -> AudioChunk {
    AudioChunk::new(vec![0i16; samples])
}

#[test]
fn test_end_to_end_hello_world() -> Result<()> {
    let (engine, mux) = stub_mux();

    for _ in 0..3 {
        mux.accept_audio(42, chunk(320))?;
    }
    mux.finish_session(42)?;

    assert_eq!(
        engine.pushes_for(42),
        vec![
            Push { id: 42, is_first: true, is_last: false, samples: 320 },
            Push { id: 42, is_first: false, is_last: false, samples: 320 },
            Push { id: 42, is_first: false, is_last: false, samples: 320 },
            Push { id: 42, is_first: false, is_last: true, samples: 0 },
        ]
    );

    assert!(engine.fire(42, segment(&[(HELLO, 0, 10), (WORLD, 10, 25)], 0.0)));

    let json: serde_json::Value = serde_json::from_str(&mux.front_result(42))?;
    assert_eq!(json["text"], "hello world");

    let words = json["result"].as_array().unwrap();
    assert_eq!(words.len(), 2);
    assert_eq!(words[0]["word"], "hello");
    assert_eq!(words[0]["start"], 0.0);
    assert_eq!(words[1]["word"], "world");
    assert!(words[1]["start"].as_f64().unwrap() > words[0]["start"].as_f64().unwrap());
    assert!((words[1]["end"].as_f64().unwrap() - 0.75).abs() < 1e-4);

    Ok(())
}

#[test]
fn test_first_chunk_registers_callback_once() -> Result<()> {
    let (engine, mux) = stub_mux();

    for _ in 0..10 {
        mux.accept_audio(7, chunk(160))?;
    }

    assert_eq!(engine.registrations(7), 1);
    let firsts = engine.pushes_for(7).iter().filter(|p| p.is_first).count();
    assert_eq!(firsts, 1);
    assert!(engine.pushes_for(7)[0].is_first);
    assert_eq!(mux.session_state(7), SessionState::Active);

    Ok(())
}

#[test]
fn test_results_follow_detection_order() -> Result<()> {
    let (engine, mux) = stub_mux();

    for _ in 0..3 {
        mux.accept_audio(1, chunk(1600))?;
    }
    mux.finish_session(1)?;

    // Fired from an engine-side thread after all audio was submitted.
    let firing = {
        let engine = Arc::clone(&engine);
        std::thread::spawn(move || {
            engine.fire(1, segment(&[(ONE, 0, 5)], 0.0));
            engine.fire(1, segment(&[(TWO, 0, 5)], 1.0));
            engine.fire(1, segment(&[(THREE, 0, 5)], 2.0));
        })
    };
    firing.join().unwrap();

    let mut texts = Vec::new();
    while let Some(t) = mux.poll_result(1) {
        texts.push(t.text);
        mux.consume_result(1);
    }
    assert_eq!(texts, vec!["one", "two", "three"]);

    Ok(())
}

#[test]
fn test_sessions_are_isolated() -> Result<()> {
    let (engine, mux) = stub_mux();

    for _ in 0..4 {
        mux.accept_audio(10, chunk(100))?;
        mux.accept_audio(20, chunk(200))?;
    }

    engine.fire(10, segment(&[(100 + 10, 0, 3)], 0.0));
    engine.fire(20, segment(&[(100 + 20, 0, 3)], 0.0));
    engine.fire(10, segment(&[(100 + 10, 0, 3)], 1.0));

    let a: Vec<_> = std::iter::from_fn(|| mux.consume_result(10)).collect();
    let b: Vec<_> = std::iter::from_fn(|| mux.consume_result(20)).collect();

    assert_eq!(a.len(), 2);
    assert!(a.iter().all(|t| t.text == "s10"));
    assert_eq!(b.len(), 1);
    assert_eq!(b[0].text, "s20");

    assert_eq!(engine.pushes_for(10).len(), 4);
    assert!(engine.pushes_for(20).iter().all(|p| p.samples == 200));

    Ok(())
}

#[test]
fn test_poll_is_idempotent_and_consume_empty_is_noop() -> Result<()> {
    let (engine, mux) = stub_mux();

    assert!(mux.consume_result(5).is_none());

    mux.accept_audio(5, chunk(10))?;
    assert!(mux.consume_result(5).is_none());

    engine.fire(5, segment(&[(HELLO, 0, 4)], 0.0));
    let first = mux.poll_result(5).unwrap();
    for _ in 0..5 {
        assert_eq!(mux.poll_result(5).unwrap(), first);
    }

    assert_eq!(mux.consume_result(5).unwrap(), first);
    assert!(mux.poll_result(5).is_none());
    assert!(mux.consume_result(5).is_none());

    Ok(())
}

#[test]
fn test_finish_rejects_audio_but_keeps_results() -> Result<()> {
    let (engine, mux) = stub_mux();

    mux.accept_audio(3, chunk(320))?;
    engine.fire(3, segment(&[(HELLO, 0, 4)], 0.0));
    mux.finish_session(3)?;

    assert_eq!(mux.session_state(3), SessionState::Finished);
    assert_eq!(
        mux.accept_audio(3, chunk(320)),
        Err(MuxError::InvalidSession(3))
    );

    // Results arriving from the flush still land in the queue.
    engine.fire(3, segment(&[(WORLD, 0, 4)], 0.5));

    assert_eq!(mux.consume_result(3).unwrap().text, "hello");
    assert_eq!(mux.consume_result(3).unwrap().text, "world");

    Ok(())
}

#[test]
fn test_empty_segment_is_distinct_from_not_ready() -> Result<()> {
    let (engine, mux) = stub_mux();

    mux.accept_audio(8, chunk(320))?;
    assert!(mux.poll_result(8).is_none());
    assert_eq!(mux.front_result(8), "");

    engine.fire(8, silence_segment(0.0));

    let transcript = mux.poll_result(8).expect("silence produces a transcript");
    assert_eq!(transcript.text, "");
    assert!(transcript.is_silence());
    assert_eq!(mux.front_result(8), r#"{"text":""}"#);

    Ok(())
}

#[test]
fn test_invalid_results_are_dropped() -> Result<()> {
    let (engine, mux) = stub_mux();
    mux.accept_audio(4, chunk(320))?;

    engine.fire(
        4,
        SegmentResult {
            lattice: None,
            time_offset: 0.0,
        },
    );

    let mut broken = linear_lattice(&[(HELLO, 0, 5)]);
    broken.finals.clear();
    engine.fire(
        4,
        SegmentResult {
            lattice: Some(broken),
            time_offset: 0.0,
        },
    );
    assert!(mux.poll_result(4).is_none());

    engine.fire(4, segment(&[(WORLD, 0, 5)], 0.0));
    assert_eq!(mux.consume_result(4).unwrap().text, "world");
    assert!(mux.poll_result(4).is_none());

    Ok(())
}

#[test]
fn test_finish_unknown_and_twice() -> Result<()> {
    let (engine, mux) = stub_mux();

    assert_eq!(mux.finish_session(99), Err(MuxError::UnknownSession(99)));

    mux.accept_audio(1, chunk(10))?;
    mux.finish_session(1)?;
    mux.finish_session(1)?;

    let lasts = engine.pushes_for(1).iter().filter(|p| p.is_last).count();
    assert_eq!(lasts, 1);

    Ok(())
}

#[test]
fn test_id_reusable_after_results_drained() -> Result<()> {
    let (engine, mux) = stub_mux();

    mux.accept_audio(6, chunk(10))?;
    mux.finish_session(6)?;
    engine.fire(6, segment(&[(HELLO, 0, 4)], 0.0));
    engine.close(6);

    assert!(!mux.is_complete(6));
    assert!(mux.accept_audio(6, chunk(10)).is_err());

    mux.consume_result(6);
    assert!(mux.is_complete(6));
    assert_eq!(mux.session_state(6), SessionState::NotStarted);

    mux.accept_audio(6, chunk(10))?;
    assert_eq!(engine.registrations(6), 2);
    let firsts = engine.pushes_for(6).iter().filter(|p| p.is_first).count();
    assert_eq!(firsts, 2);

    Ok(())
}

#[test]
fn test_wait_for_completion_releases_drained_sessions() -> Result<()> {
    let (engine, mux) = stub_mux();

    mux.accept_audio(1, chunk(10))?;
    mux.accept_audio(2, chunk(10))?;
    mux.accept_audio(3, chunk(10))?;
    mux.finish_session(1)?;
    mux.finish_session(2)?;
    engine.fire(2, segment(&[(HELLO, 0, 4)], 0.0));
    engine.close(1);
    engine.close(2);

    mux.wait_for_completion();

    assert_eq!(engine.waits(), 1);
    assert_eq!(mux.session_state(1), SessionState::NotStarted);
    // Undelivered results keep the session around.
    assert_eq!(mux.session_state(2), SessionState::Finished);
    assert_eq!(mux.poll_result(2).unwrap().text, "hello");
    assert_eq!(mux.session_state(3), SessionState::Active);
    assert_eq!(mux.active_sessions(), vec![3]);

    Ok(())
}

#[test]
fn test_pending_chunk_count_comes_from_engine() -> Result<()> {
    let (engine, mux) = stub_mux();

    assert_eq!(mux.pending_chunk_count(11), 0);
    engine.set_pending(11, 5);
    assert_eq!(mux.pending_chunk_count(11), 5);

    Ok(())
}

#[test]
fn test_accept_waveform_decodes_le_bytes() -> Result<()> {
    let (engine, mux) = stub_mux();

    let bytes: Vec<u8> = (0..320i16).flat_map(|s| s.to_le_bytes()).collect();
    mux.accept_waveform(12, &bytes)?;

    assert_eq!(engine.pushes_for(12)[0].samples, 320);
    Ok(())
}

#[test]
fn test_callback_races_consumer_without_loss() -> Result<()> {
    let (engine, mux) = stub_mux();
    mux.accept_audio(30, chunk(10))?;

    let words = [ONE, TWO, THREE];
    let producer = {
        let engine = Arc::clone(&engine);
        std::thread::spawn(move || {
            for i in 0..300 {
                engine.fire(30, segment(&[(words[i % 3], 0, 3)], i as f32));
            }
        })
    };

    let mut offsets = Vec::new();
    while offsets.len() < 300 {
        if let Some(t) = mux.consume_result(30) {
            offsets.push(t.result[0].start);
        } else {
            std::thread::yield_now();
        }
    }
    producer.join().unwrap();

    let expected: Vec<f32> = (0..300).map(|i| i as f32).collect();
    assert_eq!(offsets, expected);
    Ok(())
}

#[test]
fn test_session_stats() -> Result<()> {
    let (engine, mux) = stub_mux();

    assert!(mux.session_stats(50).is_none());

    mux.accept_audio(50, chunk(320))?;
    mux.accept_audio(50, chunk(160))?;
    engine.fire(50, segment(&[(HELLO, 0, 4)], 0.0));
    engine.fire(50, segment(&[(WORLD, 0, 4)], 1.0));
    mux.consume_result(50);
    engine.set_pending(50, 2);

    let stats = mux.session_stats(50).unwrap();
    assert_eq!(stats.state, SessionState::Active);
    assert_eq!(stats.chunks_accepted, 2);
    assert_eq!(stats.samples_accepted, 480);
    assert_eq!(stats.results_produced, 2);
    assert_eq!(stats.results_pending, 1);
    assert_eq!(stats.engine_pending_chunks, 2);

    let json = serde_json::to_value(&stats)?;
    assert_eq!(json["state"], "active");

    Ok(())
}

#[test]
fn test_failed_first_push_leaves_id_free() -> Result<()> {
    let (engine, mux) = stub_mux();

    engine.fail_pushes(EngineError::ShutDown);
    assert_eq!(
        mux.accept_audio(4, chunk(10)),
        Err(MuxError::Engine(EngineError::ShutDown))
    );
    assert_eq!(mux.session_state(4), SessionState::NotStarted);
    assert!(mux.session_stats(4).is_none());
    assert!(mux.poll_result(4).is_none());

    engine.recover();
    mux.accept_audio(4, chunk(10))?;
    let pushes = engine.pushes_for(4);
    assert_eq!(pushes.len(), 1);
    assert!(pushes[0].is_first);
    assert_eq!(mux.session_state(4), SessionState::Active);

    Ok(())
}

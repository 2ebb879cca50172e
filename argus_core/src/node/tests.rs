//! Protocol-level tests for the sink/source barrier.
//!
//! Processes are stood in for by threads; the shared region and futex
//! words behave identically either way.

use super::typed::{FrameShape, FrameSink, FrameSource, OwnedFrame, PositionSink, PositionSource};
use super::{Sink, Source};
use crate::error::ArgusError;
use crate::layout::NodeState;
use argus_types::{PixelFormat, Position};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn unique_address(prefix: &str) -> String {
    format!(
        "{}_{}_{}",
        prefix,
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    )
}

/// One sink, one source, one sample, then END.
#[test]
fn single_sample_handshake() {
    let addr = unique_address("proto_s1");
    let payload: Vec<u8> = (1..=64).collect();
    let expected = payload.clone();

    let source_attached = Arc::new(AtomicBool::new(false));
    let attached_flag = source_attached.clone();

    let reader_addr = addr.clone();
    let reader = std::thread::spawn(move || {
        let mut source = Source::new();
        source.touch(&reader_addr).expect("touch");
        let params = source.connect().expect("connect");
        assert_eq!(params.payload_bytes, 64);
        attached_flag.store(true, Ordering::Release);

        assert_eq!(source.wait().expect("wait"), NodeState::SourceWaiting);
        let got = source.clone_payload().expect("clone");
        source.post().expect("post");

        // The stream must then terminate.
        assert!(source.wait().expect("wait for end").is_end());
        got
    });

    let mut sink = Sink::new();
    sink.bind(&addr, 64).expect("bind");

    // Publish only after the source is counted, so it must observe the
    // sample.
    while !source_attached.load(Ordering::Acquire) {
        std::thread::sleep(Duration::from_millis(1));
    }
    assert!(!sink.wait().expect("writer wait").is_end());
    sink.retrieve().expect("retrieve").copy_from_slice(&payload);
    sink.post().expect("post");

    // Wait for the ack, then close the node.
    assert!(!sink.wait().expect("ack wait").is_end());
    drop(sink);

    assert_eq!(reader.join().unwrap(), expected);
}

/// A source attaching after sample k observes only indices >= k+1.
#[test]
fn late_attach_skips_published_samples() {
    let addr = unique_address("proto_s2");

    let mut sink = Sink::new();
    sink.bind(&addr, 8).expect("bind");

    // Five samples with nobody listening; each wait returns immediately.
    for i in 0u64..5 {
        assert!(!sink.wait().unwrap().is_end());
        sink.retrieve().unwrap().copy_from_slice(&i.to_le_bytes());
        sink.post().unwrap();
    }

    let mut source = Source::new();
    source.touch(&addr).expect("touch");
    source.connect().expect("connect");

    let writer = std::thread::spawn(move || {
        for i in 5u64..10 {
            assert!(!sink.wait().unwrap().is_end());
            sink.retrieve().unwrap().copy_from_slice(&i.to_le_bytes());
            sink.post().unwrap();
        }
        assert!(!sink.wait().unwrap().is_end());
        drop(sink);
    });

    let mut seen = Vec::new();
    loop {
        if source.wait().unwrap().is_end() {
            break;
        }
        let mut bytes = [0u8; 8];
        source.copy_to(&mut bytes).unwrap();
        seen.push(u64::from_le_bytes(bytes));
        source.post().unwrap();
    }
    writer.join().unwrap();

    assert_eq!(seen, vec![5, 6, 7, 8, 9]);
}

/// Fan-out to three sources; every source sees every sample in order.
#[test]
fn fan_out_delivers_everything_in_order() {
    let addr = unique_address("proto_s3");
    const SAMPLES: u64 = 1000;
    const READERS: usize = 3;

    let mut sink = Sink::new();
    sink.bind(&addr, 8).expect("bind");

    let ready = Arc::new(std::sync::atomic::AtomicU32::new(0));
    let readers: Vec<_> = (0..READERS)
        .map(|_| {
            let addr = addr.clone();
            let ready = ready.clone();
            std::thread::spawn(move || {
                let mut source = Source::new();
                source.touch(&addr).expect("touch");
                source.connect().expect("connect");
                ready.fetch_add(1, Ordering::AcqRel);

                let mut seen = Vec::new();
                loop {
                    if source.wait().unwrap().is_end() {
                        break;
                    }
                    let mut bytes = [0u8; 8];
                    source.copy_to(&mut bytes).unwrap();
                    seen.push(u64::from_le_bytes(bytes));
                    source.post().unwrap();
                }
                seen
            })
        })
        .collect();

    while ready.load(Ordering::Acquire) < READERS as u32 {
        std::thread::sleep(Duration::from_millis(1));
    }

    for i in 0..SAMPLES {
        assert!(!sink.wait().unwrap().is_end());
        sink.retrieve().unwrap().copy_from_slice(&i.to_le_bytes());
        sink.post().unwrap();
    }
    assert!(!sink.wait().unwrap().is_end());
    drop(sink);

    let expected: Vec<u64> = (0..SAMPLES).collect();
    for reader in readers {
        assert_eq!(reader.join().unwrap(), expected);
    }
}

/// After a source drops mid-cycle, the writer unblocks within a bounded
/// delay whether or not that source had posted.
#[test]
fn detach_mid_stream_unblocks_writer() {
    let addr = unique_address("proto_detach");

    let mut sink = Sink::new();
    sink.bind(&addr, 8).expect("bind");

    let mut source = Source::new();
    source.touch(&addr).expect("touch");
    source.connect().expect("connect");

    // Publish one sample; the source receives it but never posts.
    assert!(!sink.wait().unwrap().is_end());
    sink.retrieve().unwrap().fill(7);
    sink.post().unwrap();
    assert_eq!(source.wait().unwrap(), NodeState::SourceWaiting);

    // Writer is now stuck until the delinquent reader goes away.
    let writer = std::thread::spawn(move || {
        assert!(!sink.wait().unwrap().is_end());
        sink
    });
    std::thread::sleep(Duration::from_millis(30));
    drop(source);

    let sink = writer.join().unwrap();
    assert_eq!(sink.attached_sources(), 0);
}

#[test]
fn touch_gives_up_after_retry_budget() {
    let addr = unique_address("proto_touch_timeout");
    let mut source = Source::new().with_touch_retry(Duration::from_millis(50));
    let err = source.touch(&addr).unwrap_err();
    assert!(matches!(err, ArgusError::NotFound(_)));
}

#[test]
fn touch_retries_until_sink_appears() {
    let addr = unique_address("proto_touch_retry");

    let sink_addr = addr.clone();
    let writer = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(50));
        let mut sink = Sink::new();
        sink.bind(&sink_addr, 16).expect("bind");
        // Keep the node alive long enough for the source to connect.
        std::thread::sleep(Duration::from_millis(200));
        drop(sink);
    });

    let mut source = Source::new().with_touch_retry(Duration::from_secs(5));
    source.touch(&addr).expect("touch should retry until bind");
    source.connect().expect("connect");
    writer.join().unwrap();
}

#[test]
fn copy_to_rejects_short_destination() {
    let addr = unique_address("proto_short_copy");

    let mut sink = Sink::new();
    sink.bind(&addr, 32).unwrap();
    let mut source = Source::new();
    source.touch(&addr).unwrap();
    source.connect().unwrap();

    sink.wait().unwrap();
    sink.retrieve().unwrap().fill(1);
    sink.post().unwrap();

    source.wait().unwrap();
    let mut small = [0u8; 8];
    assert!(matches!(
        source.copy_to(&mut small),
        Err(ArgusError::PayloadTooLarge { .. })
    ));
    source.post().unwrap();
}

#[test]
fn typed_frame_round_trip() {
    let addr = unique_address("proto_frame");
    let shape = FrameShape::new(4, 6, PixelFormat::Bgr8, 1_000_000);

    let ready = Arc::new(AtomicBool::new(false));
    let ready_flag = ready.clone();
    let reader_addr = addr.clone();
    let reader = std::thread::spawn(move || {
        let mut source = FrameSource::new();
        source.touch(&reader_addr).expect("touch");
        let got_shape = source.connect().expect("connect");
        assert_eq!(got_shape.rows, 4);
        assert_eq!(got_shape.cols, 6);
        assert_eq!(got_shape.format, PixelFormat::Bgr8);
        ready_flag.store(true, Ordering::Release);

        let mut frame = OwnedFrame::sized_for(&got_shape);
        let mut indices = Vec::new();
        while !source.next_into(&mut frame).expect("next").is_end() {
            indices.push(frame.header.sample_index);
            assert_eq!(frame.pixels.len(), 4 * 6 * 3);
            assert!(frame
                .pixels
                .iter()
                .all(|&b| b == frame.header.sample_index as u8));
        }
        indices
    });

    let mut sink = FrameSink::new();
    sink.bind(&addr, shape).expect("bind");
    while !ready.load(Ordering::Acquire) {
        std::thread::sleep(Duration::from_millis(1));
    }

    let mut frame = OwnedFrame::sized_for(&shape);
    for i in 0..3u64 {
        frame.header.sample_index = i;
        frame.pixels.fill(i as u8);
        assert!(!sink.publish(&frame).expect("publish").is_end());
    }
    // Block until the reader acknowledged the final frame, then close.
    assert!(!sink.drain().expect("drain").is_end());
    drop(sink);

    assert_eq!(reader.join().unwrap(), vec![0, 1, 2]);
}

#[test]
fn typed_position_round_trip() {
    let addr = unique_address("proto_pos");

    let ready = Arc::new(AtomicBool::new(false));
    let ready_flag = ready.clone();
    let reader_addr = addr.clone();
    let reader = std::thread::spawn(move || {
        let mut source = PositionSource::new();
        source.touch(&reader_addr).expect("touch");
        source.connect().expect("connect");
        ready_flag.store(true, Ordering::Release);
        let mut got = Vec::new();
        while let Some(position) = source.next().expect("next") {
            got.push(position);
        }
        got
    });

    let mut sink = PositionSink::new();
    sink.bind(&addr, 33_000_000).expect("bind");
    while !ready.load(Ordering::Acquire) {
        std::thread::sleep(Duration::from_millis(1));
    }

    for i in 0..5u64 {
        let mut p = Position::at(i, i as f64, -(i as f64));
        p.set_region("lane");
        assert!(!sink.publish(&p).expect("publish").is_end());
    }
    assert!(!sink.drain().expect("drain").is_end());
    drop(sink);

    let got = reader.join().unwrap();
    assert_eq!(got.len(), 5);
    let last = got.last().unwrap();
    assert_eq!(last.sample_index, 4);
    assert_eq!(last.region(), Some("lane"));
    assert!(got
        .windows(2)
        .all(|w| w[1].sample_index == w[0].sample_index + 1));
}

#[test]
fn frame_sink_rejects_mismatched_pixels() {
    let addr = unique_address("proto_frame_bad");
    let shape = FrameShape::new(2, 2, PixelFormat::Mono8, 0);

    let mut sink = FrameSink::new();
    sink.bind(&addr, shape).unwrap();

    let mut frame = OwnedFrame::sized_for(&shape);
    frame.pixels.push(0); // now longer than the header promises
    assert!(sink.publish(&frame).is_err());
}

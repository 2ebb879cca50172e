//! End-to-end pipelines over the public facade: generator, bridge and
//! recorder components wired through real shared-memory nodes, each stage
//! on its own thread as it would be its own process.

use argus::prelude::*;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

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

fn scratch_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "argus_pipeline_{tag}_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// generator -> buffered bridge -> recorder, positions only. Every sample
/// survives the full path (BLOCK policy) and lands in the JSON artifact.
#[test]
fn position_pipeline_records_every_sample() {
    const SAMPLES: u64 = 40;
    let gen_addr = unique_address("pipe_gen");
    let buf_addr = unique_address("pipe_buf");
    let dir = scratch_dir("positions");

    // Wire the whole graph before any sample is published: each stage's
    // connect() blocks until its upstream node exists.
    let mut generator = TestPosition::new(
        &gen_addr,
        TestPositionConfig {
            samples_per_second: 0.0,
            ..TestPositionConfig::default()
        },
    )
    .with_sample_limit(SAMPLES);
    generator.connect().expect("generator connect");

    let mut bridge = PositionBuffer::new(
        &gen_addr,
        &buf_addr,
        BridgeConfig {
            capacity: 16,
            policy: OverflowPolicy::Block,
        },
    );
    bridge.connect().expect("bridge connect");

    let mut recorder: Recorder = Recorder::new(
        &[buf_addr.clone()],
        &[],
        RecorderConfig {
            save_path: dir.clone(),
            file_name: "run".into(),
            ..RecorderConfig::default()
        },
    )
    .expect("recorder");
    recorder.connect().expect("recorder connect");

    let running = Arc::new(AtomicBool::new(true));

    let generator_running = running.clone();
    let generator_thread = std::thread::spawn(move || {
        generator.run(&generator_running).expect("generator run");
        // Dropping the generator ends its node.
    });

    let bridge_running = running.clone();
    let bridge_thread = std::thread::spawn(move || {
        bridge.run(&bridge_running).expect("bridge run");
    });

    recorder.run_until_exit().expect("recorder run");
    assert_eq!(recorder.ticks_recorded(), SAMPLES);
    let position_path = recorder.position_path().unwrap().to_path_buf();
    drop(recorder);

    generator_thread.join().unwrap();
    bridge_thread.join().unwrap();

    let json: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&position_path).unwrap()).unwrap();
    let elements = json.as_array().unwrap();
    assert_eq!(elements.len(), SAMPLES as usize);
    for (i, element) in elements.iter().enumerate() {
        assert_eq!(element[0], i as u64);
        let records = element[1].as_array().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["valid"], true);
    }

    let _ = std::fs::remove_dir_all(&dir);
}

/// generator -> decorator -> recorder over frames, with a position stream
/// feeding the decorator. The recorded container holds one frame per tick
/// with the annotator's stamp applied.
#[test]
fn decorated_frame_pipeline_records_annotated_frames() {
    const SAMPLES: u64 = 20;
    let frame_addr = unique_address("pipe_frames");
    let pos_addr = unique_address("pipe_pos");
    let out_addr = unique_address("pipe_decorated");
    let dir = scratch_dir("frames");

    let mut frame_gen =
        TestFrame::new(&frame_addr, 4, 4, PixelFormat::Mono8, 0.0).with_sample_limit(SAMPLES);
    frame_gen.connect().expect("frame generator connect");

    let mut position_gen = TestPosition::new(
        &pos_addr,
        TestPositionConfig {
            samples_per_second: 0.0,
            ..TestPositionConfig::default()
        },
    )
    .with_sample_limit(SAMPLES);
    position_gen.connect().expect("position generator connect");

    let mut decorator = Decorator::new(
        &[pos_addr.clone()],
        &frame_addr,
        &out_addr,
        |frame: &mut OwnedFrame, _positions: &[(String, Position)]| {
            // Visible stamp in the corner, as a drawing kernel would leave.
            frame.pixels[0] = 0xFE;
        },
    );
    decorator.connect().expect("decorator connect");

    let mut recorder: Recorder = Recorder::new(
        &[],
        &[out_addr.clone()],
        RecorderConfig {
            save_path: dir.clone(),
            file_name: "decorated".into(),
            ..RecorderConfig::default()
        },
    )
    .expect("recorder");
    recorder.connect().expect("recorder connect");

    let running = Arc::new(AtomicBool::new(true));
    let threads: Vec<std::thread::JoinHandle<()>> = vec![
        {
            let r = running.clone();
            std::thread::spawn(move || frame_gen.run(&r).expect("frame generator run"))
        },
        {
            let r = running.clone();
            std::thread::spawn(move || position_gen.run(&r).expect("position generator run"))
        },
        {
            let r = running.clone();
            std::thread::spawn(move || decorator.run(&r).expect("decorator run"))
        },
    ];

    recorder.run_until_exit().expect("recorder run");
    let video_path = recorder.video_paths()[0].to_path_buf();
    drop(recorder);
    for t in threads {
        t.join().unwrap();
    }

    let indices = RawVideoWriter::read_index(&video_path).unwrap();
    let expected: Vec<u64> = (0..SAMPLES).collect();
    assert_eq!(indices, expected);

    let _ = std::fs::remove_dir_all(&dir);
}

/// The control surface toggles observed by a running recorder: `exit`
/// stops the loop even while upstream keeps producing.
#[test]
fn control_exit_stops_a_live_recorder() {
    let gen_addr = unique_address("pipe_ctl");
    let dir = scratch_dir("control");

    let mut generator = TestPosition::new(
        &gen_addr,
        TestPositionConfig {
            samples_per_second: 500.0,
            ..TestPositionConfig::default()
        },
    );
    generator.connect().expect("generator connect");

    let mut recorder: Recorder = Recorder::new(
        &[gen_addr.clone()],
        &[],
        RecorderConfig {
            save_path: dir.clone(),
            ..RecorderConfig::default()
        },
    )
    .expect("recorder");
    recorder.connect().expect("recorder connect");

    let controls = recorder.controls();
    let generator_running = Arc::new(AtomicBool::new(true));

    let gen_flag = generator_running.clone();
    let generator_thread = std::thread::spawn(move || {
        let _ = generator.run(&gen_flag);
    });

    // Feed the command stream from another thread, as a terminal would.
    let control_thread = {
        let controls = controls.clone();
        std::thread::spawn(move || {
            let mut input = std::io::Cursor::new("stop\nstart\nexit\n");
            let mut output = Vec::new();
            control_recorder(&mut input, &mut output, &controls, false).unwrap()
        })
    };

    recorder.run_until_exit().expect("recorder run");
    assert!(!controls.is_running());
    drop(recorder);

    assert_eq!(control_thread.join().unwrap(), 0);
    generator_running.store(false, Ordering::Release);
    generator_thread.join().unwrap();

    let _ = std::fs::remove_dir_all(&dir);
}

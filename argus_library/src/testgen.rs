//! Synthetic sources for exercising pipelines without cameras or
//! detectors: a random-walk position generator and a moving-gradient
//! frame generator, both paced by a sample clock.

use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use argus_core::{
    ArgusResult, Component, ComponentKind, Flow, FrameShape, FrameSink, OwnedFrame, PositionSink,
};
use argus_types::{PixelFormat, Position};

use crate::config::TestPositionConfig;

/// Paces publications to a fixed rate, sleeping off whatever time the
/// barrier cycle did not consume.
struct SampleClock {
    period: Duration,
    next_tick: Instant,
}

impl SampleClock {
    fn new(samples_per_second: f64) -> Self {
        let period = if samples_per_second > 0.0 {
            Duration::from_secs_f64(1.0 / samples_per_second)
        } else {
            Duration::ZERO
        };
        Self {
            period,
            next_tick: Instant::now(),
        }
    }

    fn period_ns(&self) -> u64 {
        self.period.as_nanos() as u64
    }

    fn tick(&mut self) {
        if self.period.is_zero() {
            return;
        }
        let now = Instant::now();
        if self.next_tick > now {
            std::thread::sleep(self.next_tick - now);
        }
        self.next_tick += self.period;
    }
}

/// Publishes a bounded random-walk position at a configured rate.
pub struct TestPosition {
    name: String,
    sink_address: String,
    config: TestPositionConfig,
    sink: PositionSink,
    clock: SampleClock,
    rng: StdRng,
    sample: u64,
    x: f64,
    y: f64,
    /// Stop after this many samples; `None` runs until the node ends.
    limit: Option<u64>,
}

impl TestPosition {
    pub fn new(sink_address: &str, config: TestPositionConfig) -> Self {
        let clock = SampleClock::new(config.samples_per_second);
        Self {
            name: format!("testpos[*->{sink_address}]"),
            sink_address: sink_address.to_string(),
            x: config.width / 2.0,
            y: config.height / 2.0,
            config,
            sink: PositionSink::new(),
            clock,
            rng: StdRng::from_entropy(),
            sample: 0,
            limit: None,
        }
    }

    /// Stop after `samples` publications (useful in tests and demos).
    pub fn with_sample_limit(mut self, samples: u64) -> Self {
        self.limit = Some(samples);
        self
    }

    fn step(&mut self) -> Position {
        let step = self.config.step;
        self.x = (self.x + self.rng.gen_range(-step..=step)).clamp(0.0, self.config.width);
        self.y = (self.y + self.rng.gen_range(-step..=step)).clamp(0.0, self.config.height);

        let mut position = Position::at(self.sample, self.x, self.y);
        position.set_velocity(
            self.rng.gen_range(-step..=step),
            self.rng.gen_range(-step..=step),
        );
        position
    }
}

impl Component for TestPosition {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::TestPosition
    }

    fn connect(&mut self) -> ArgusResult<()> {
        self.sink.bind(&self.sink_address, self.clock.period_ns())
    }

    fn process(&mut self) -> ArgusResult<Flow> {
        if let Some(limit) = self.limit {
            if self.sample >= limit {
                self.sink.drain()?;
                return Ok(Flow::End);
            }
        }
        self.clock.tick();
        let position = self.step();
        if self.sink.publish(&position)?.is_end() {
            return Ok(Flow::End);
        }
        self.sample += 1;
        Ok(Flow::Continue)
    }
}

/// Publishes a moving horizontal gradient so consumers can verify frame
/// indices visually and byte-wise.
pub struct TestFrame {
    name: String,
    sink_address: String,
    shape: FrameShape,
    sink: FrameSink,
    clock: SampleClock,
    frame: OwnedFrame,
    sample: u64,
    limit: Option<u64>,
}

impl TestFrame {
    pub fn new(
        sink_address: &str,
        rows: u32,
        cols: u32,
        format: PixelFormat,
        frames_per_second: f64,
    ) -> Self {
        let clock = SampleClock::new(frames_per_second);
        let shape = FrameShape::new(rows, cols, format, clock.period_ns());
        Self {
            name: format!("testframe[*->{sink_address}]"),
            sink_address: sink_address.to_string(),
            shape,
            sink: FrameSink::new(),
            clock,
            frame: OwnedFrame::default(),
            sample: 0,
            limit: None,
        }
    }

    pub fn with_sample_limit(mut self, samples: u64) -> Self {
        self.limit = Some(samples);
        self
    }

    fn render(&mut self) {
        self.frame.header.sample_index = self.sample;
        let cols = self.shape.cols as usize;
        let bpp = self.shape.format.bytes_per_pixel() as usize;
        let phase = self.sample as usize;
        for (i, byte) in self.frame.pixels.iter_mut().enumerate() {
            let col = (i / bpp) % cols.max(1);
            *byte = ((col + phase) % 256) as u8;
        }
    }
}

impl Component for TestFrame {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::FrameSource
    }

    fn connect(&mut self) -> ArgusResult<()> {
        self.sink.bind(&self.sink_address, self.shape)?;
        self.frame = OwnedFrame::sized_for(&self.shape);
        Ok(())
    }

    fn process(&mut self) -> ArgusResult<Flow> {
        if let Some(limit) = self.limit {
            if self.sample >= limit {
                self.sink.drain()?;
                return Ok(Flow::End);
            }
        }
        self.clock.tick();
        self.render();
        if self.sink.publish(&self.frame)?.is_end() {
            return Ok(Flow::End);
        }
        self.sample += 1;
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argus_core::PositionSource;
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

    #[test]
    fn positions_stay_in_bounds_and_count_up() {
        let addr = unique_address("testpos");
        let config = TestPositionConfig {
            samples_per_second: 0.0, // unpaced for the test
            width: 100.0,
            height: 50.0,
            ..TestPositionConfig::default()
        };
        let mut generator = TestPosition::new(&addr, config).with_sample_limit(25);
        generator.connect().expect("connect");

        let reader_addr = addr.clone();
        let ready = Arc::new(AtomicBool::new(false));
        let ready_flag = ready.clone();
        let reader = std::thread::spawn(move || {
            let mut source = PositionSource::new();
            source.touch(&reader_addr).expect("touch");
            source.connect().expect("connect");
            ready_flag.store(true, Ordering::Release);
            let mut got = Vec::new();
            while let Some(p) = source.next().expect("next") {
                got.push(p);
            }
            got
        });
        while !ready.load(Ordering::Acquire) {
            std::thread::sleep(std::time::Duration::from_millis(1));
        }

        let running = AtomicBool::new(true);
        generator.run(&running).expect("run");
        drop(generator); // ends the node

        let got = reader.join().unwrap();
        assert_eq!(got.len(), 25);
        for p in &got {
            assert!(p.position_valid());
            assert!((0.0..=100.0).contains(&p.x));
            assert!((0.0..=50.0).contains(&p.y));
            assert!(p.velocity_valid());
        }
        assert!(got
            .windows(2)
            .all(|w| w[1].sample_index == w[0].sample_index + 1));
    }

    #[test]
    fn frames_carry_a_moving_gradient() {
        let addr = unique_address("testframe");
        let mut generator =
            TestFrame::new(&addr, 2, 8, PixelFormat::Mono8, 0.0).with_sample_limit(3);
        generator.connect().expect("connect");

        let reader_addr = addr.clone();
        let ready = Arc::new(AtomicBool::new(false));
        let ready_flag = ready.clone();
        let reader = std::thread::spawn(move || {
            let mut source = argus_core::FrameSource::new();
            source.touch(&reader_addr).expect("touch");
            let shape = source.connect().expect("connect");
            ready_flag.store(true, Ordering::Release);
            let mut frame = OwnedFrame::sized_for(&shape);
            let mut frames = Vec::new();
            while !source.next_into(&mut frame).expect("next").is_end() {
                frames.push(frame.clone());
            }
            frames
        });
        while !ready.load(Ordering::Acquire) {
            std::thread::sleep(std::time::Duration::from_millis(1));
        }

        let running = AtomicBool::new(true);
        generator.run(&running).expect("run");
        drop(generator);

        let frames = reader.join().unwrap();
        assert_eq!(frames.len(), 3);
        // Row 0 of frame k starts at value k (gradient shifted by sample).
        for (k, frame) in frames.iter().enumerate() {
            assert_eq!(frame.header.sample_index, k as u64);
            assert_eq!(frame.pixels[0], k as u8);
            assert_eq!(frame.pixels[1], (k + 1) as u8);
        }
    }

}

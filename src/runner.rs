//! Background polling loop.
//!
//! `run` drives one camera stream until cancelled or until it fails.
//! `LoopHandle` owns the thread that supervises `run`, restarting it after
//! failures until stopped.

use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};

use crate::cancel::{cancel_pair, CancelHandle, CancelToken};
use crate::config::RunConfig;
use crate::frame::LatestFrame;
use crate::ingest::Camera;
use crate::pipeline::Pipeline;
use crate::trigger::TriggerFlag;

/// Pause between a failed run and the next attempt.
pub const RESTART_BACKOFF: Duration = Duration::from_millis(500);

/// Pull frames from `camera` at most `config.frequency_hz` times per second
/// and publish the debounced trigger after each one.
///
/// Returns `Ok(())` once `cancel` fires. Any error clears the trigger.
pub fn run(
    config: &RunConfig,
    camera: &dyn Camera,
    trigger: &TriggerFlag,
    cancel: &CancelToken,
    latest: &LatestFrame,
) -> Result<()> {
    let mut stream = camera
        .open_stream()
        .with_context(|| format!("cannot start background stream for camera {}", camera.name()))?;
    let mut pipeline = Pipeline::from_config(config);
    let period = config.period();
    log::info!(
        "prefilter loop started: camera={} hz={} threshold={} sources={:?}",
        camera.name(),
        config.frequency_hz,
        config.threshold,
        pipeline.source_names()
    );

    loop {
        let started = Instant::now();
        let frame = match stream.next_frame(cancel) {
            Ok(Some(frame)) => frame,
            Ok(None) => return Ok(()),
            Err(err) => {
                trigger.set(false);
                return Err(err);
            }
        };

        let cycle = pipeline.run_cycle(&frame);
        if let Ok(outcome) = &cycle {
            trigger.set(outcome.active);
            latest.store(&frame);
        }
        stream.release(frame);
        if let Err(err) = cycle {
            trigger.set(false);
            return Err(err);
        }

        if cancel.wait(period.saturating_sub(started.elapsed())) {
            return Ok(());
        }
    }
}

/// Run until cancelled, restarting after every failure.
fn supervise(config: RunConfig, trigger: TriggerFlag, cancel: CancelToken, latest: LatestFrame) {
    loop {
        match run(&config, config.camera.as_ref(), &trigger, &cancel, &latest) {
            Ok(()) => break,
            Err(err) => {
                log::error!("background camera stream exited with error: {err:#}");
                if cancel.wait(RESTART_BACKOFF) {
                    break;
                }
            }
        }
    }
    log::info!("prefilter loop for camera {} stopped", config.camera_name);
}

/// Handle to a supervised polling loop thread.
pub struct LoopHandle {
    cancel: CancelHandle,
    token: CancelToken,
    join: Option<JoinHandle<()>>,
}

impl LoopHandle {
    pub fn spawn(config: RunConfig, trigger: TriggerFlag, latest: LatestFrame) -> Result<Self> {
        let (cancel, token) = cancel_pair();
        let thread_token = token.clone();
        let join = std::thread::Builder::new()
            .name(format!("prefilter-{}", config.camera_name))
            .spawn(move || supervise(config, trigger, thread_token, latest))
            .context("failed to spawn prefilter loop thread")?;
        Ok(Self {
            cancel,
            token,
            join: Some(join),
        })
    }

    /// Token that observes this loop's cancellation.
    pub fn token(&self) -> CancelToken {
        self.token.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.join.as_ref().map_or(true, |join| join.is_finished())
    }

    /// Cancel the loop and wait for its thread to exit.
    pub fn stop(mut self) -> Result<()> {
        self.cancel.cancel();
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("prefilter loop thread panicked"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PrefilterAttributes, Resources};
    use crate::error::PrefilterError;
    use crate::ingest::{ChannelCamera, FrameStream};
    use image::{Rgb, RgbImage};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn sea(width: u32, height: u32, water: u8) -> RgbImage {
        RgbImage::from_fn(width, height, |_, y| {
            if y < height / 3 {
                Rgb([215, 220, 230])
            } else {
                Rgb([water / 2, water, water])
            }
        })
    }

    fn run_config(camera: Arc<dyn Camera>, hz: f64) -> RunConfig {
        let mut resources = Resources::new();
        resources.cameras.register(camera);
        let mut attrs = PrefilterAttributes::for_camera("bow");
        attrs.max_frequency_hz = hz;
        RunConfig::build(&attrs, &resources).unwrap()
    }

    #[test]
    fn closed_stream_clears_trigger_and_releases_frames() {
        let (camera, tx) = ChannelCamera::new("bow", 8);
        let camera = Arc::new(camera);
        let config = run_config(camera.clone(), 1000.0);
        tx.send(sea(240, 120, 60)).unwrap();
        tx.send(sea(240, 120, 60)).unwrap();
        drop(tx);

        let trigger = TriggerFlag::new();
        trigger.set(true);
        let latest = LatestFrame::new();
        let (_handle, token) = cancel_pair();
        let err = run(&config, camera.as_ref(), &trigger, &token, &latest).unwrap_err();

        assert_eq!(
            PrefilterError::classify(&err).map(|e| e.code()),
            Some("STREAM")
        );
        assert!(!trigger.is_active());
        assert_eq!(camera.released_frames(), 2);
        assert!(latest.get().is_some());
        assert_eq!(camera.active_streams(), 0);
    }

    #[test]
    fn cancellation_returns_cleanly() {
        let (camera, _tx) = ChannelCamera::new("bow", 1);
        let camera = Arc::new(camera);
        let config = run_config(camera.clone(), 10.0);
        let trigger = TriggerFlag::new();
        let latest = LatestFrame::new();
        let (mut handle, token) = cancel_pair();
        let worker = {
            let camera = camera.clone();
            std::thread::spawn(move || run(&config, camera.as_ref(), &trigger, &token, &latest))
        };
        std::thread::sleep(Duration::from_millis(20));
        handle.cancel();
        assert!(worker.join().unwrap().is_ok());
    }

    #[test]
    fn cycles_never_outpace_configured_frequency() {
        let frames = 5u32;
        let hz = 20.0;
        let (camera, tx) = ChannelCamera::new("bow", frames as usize);
        let camera = Arc::new(camera);
        let config = run_config(camera.clone(), hz);
        for _ in 0..frames {
            tx.send(sea(240, 120, 60)).unwrap();
        }
        drop(tx);

        let (_handle, token) = cancel_pair();
        let started = Instant::now();
        let result = run(
            &config,
            camera.as_ref(),
            &TriggerFlag::new(),
            &token,
            &LatestFrame::new(),
        );
        let elapsed = started.elapsed();

        assert!(result.is_err(), "closed channel ends the run");
        assert_eq!(camera.released_frames(), u64::from(frames));
        let minimum = Duration::from_secs_f64(f64::from(frames - 1) / hz);
        assert!(elapsed >= minimum, "{:?} < {:?}", elapsed, minimum);
    }

    #[test]
    fn cancel_interrupts_the_inter_cycle_sleep() {
        let (camera, tx) = ChannelCamera::new("bow", 1);
        let camera = Arc::new(camera);
        let config = run_config(camera.clone(), 0.5);
        tx.send(sea(240, 120, 60)).unwrap();

        let (mut handle, token) = cancel_pair();
        let worker = {
            let camera = camera.clone();
            std::thread::spawn(move || {
                run(
                    &config,
                    camera.as_ref(),
                    &TriggerFlag::new(),
                    &token,
                    &LatestFrame::new(),
                )
            })
        };

        let deadline = Instant::now() + Duration::from_secs(5);
        while camera.released_frames() == 0 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(2));
        }
        assert_eq!(camera.released_frames(), 1);
        std::thread::sleep(Duration::from_millis(20));

        let cancelled_at = Instant::now();
        handle.cancel();
        assert!(worker.join().unwrap().is_ok());
        assert!(cancelled_at.elapsed() < Duration::from_millis(500));
        drop(tx);
    }

    struct Unreachable {
        opens: Arc<AtomicUsize>,
    }

    impl Camera for Unreachable {
        fn name(&self) -> &str {
            "bow"
        }

        fn open_stream(&self) -> Result<Box<dyn FrameStream>> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            Err(anyhow!("camera offline"))
        }
    }

    #[test]
    fn supervisor_restarts_failed_runs_until_stopped() {
        let opens = Arc::new(AtomicUsize::new(0));
        let camera = Arc::new(Unreachable {
            opens: opens.clone(),
        });
        let config = run_config(camera, 10.0);
        let handle = LoopHandle::spawn(config, TriggerFlag::new(), LatestFrame::new()).unwrap();
        std::thread::sleep(RESTART_BACKOFF * 2 + Duration::from_millis(300));
        assert!(opens.load(Ordering::SeqCst) >= 2);
        assert!(!handle.is_finished());
        let token = handle.token();
        handle.stop().unwrap();
        assert!(token.is_cancelled());
    }

    #[test]
    fn stopping_a_loop_closes_its_stream() {
        let (camera, tx) = ChannelCamera::new("bow", 4);
        let camera = Arc::new(camera);
        let config = run_config(camera.clone(), 50.0);
        let handle = LoopHandle::spawn(config, TriggerFlag::new(), LatestFrame::new()).unwrap();
        tx.send(sea(240, 120, 60)).unwrap();
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(camera.active_streams(), 1);
        handle.stop().unwrap();
        assert_eq!(camera.active_streams(), 0);
    }
}

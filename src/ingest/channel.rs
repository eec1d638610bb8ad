//! Channel-fed camera.
//!
//! The embedding application pushes decoded images into a crossbeam channel;
//! each open stream pulls from it. Dropping every sender ends the stream with
//! a `Stream` error.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use crossbeam_channel::{select, Receiver, Sender};
use image::RgbImage;

use super::{Camera, FrameStream};
use crate::cancel::CancelToken;
use crate::error::stream;
use crate::frame::Frame;

pub struct ChannelCamera {
    name: String,
    frames: Receiver<RgbImage>,
    counters: Arc<StreamCounters>,
}

#[derive(Debug, Default)]
struct StreamCounters {
    open: AtomicUsize,
    released: AtomicU64,
}

impl ChannelCamera {
    /// Camera plus the sender that feeds it. `capacity` bounds queued frames.
    pub fn new(name: impl Into<String>, capacity: usize) -> (Self, Sender<RgbImage>) {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        let camera = Self {
            name: name.into(),
            frames: rx,
            counters: Arc::new(StreamCounters::default()),
        };
        (camera, tx)
    }

    /// Streams opened and not yet dropped.
    pub fn active_streams(&self) -> usize {
        self.counters.open.load(Ordering::SeqCst)
    }

    /// Frames handed back through `release` across all streams.
    pub fn released_frames(&self) -> u64 {
        self.counters.released.load(Ordering::SeqCst)
    }
}

impl Camera for ChannelCamera {
    fn name(&self) -> &str {
        &self.name
    }

    fn open_stream(&self) -> Result<Box<dyn FrameStream>> {
        self.counters.open.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ChannelStream {
            camera: self.name.clone(),
            frames: self.frames.clone(),
            counters: Arc::clone(&self.counters),
            sequence: 0,
        }))
    }
}

struct ChannelStream {
    camera: String,
    frames: Receiver<RgbImage>,
    counters: Arc<StreamCounters>,
    sequence: u64,
}

impl FrameStream for ChannelStream {
    fn next_frame(&mut self, cancel: &CancelToken) -> Result<Option<Frame>> {
        if cancel.is_cancelled() {
            return Ok(None);
        }
        select! {
            recv(self.frames) -> msg => match msg {
                Ok(image) => {
                    self.sequence += 1;
                    Ok(Some(Frame::new(image, self.sequence)))
                }
                Err(_) => Err(stream(format!("camera {}: frame channel closed", self.camera))),
            },
            recv(cancel.receiver()) -> _ => Ok(None),
        }
    }

    fn release(&mut self, frame: Frame) {
        self.counters.released.fetch_add(1, Ordering::SeqCst);
        drop(frame);
    }
}

impl Drop for ChannelStream {
    fn drop(&mut self) {
        self.counters.open.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::cancel_pair;
    use crate::error::PrefilterError;
    use std::time::Duration;

    #[test]
    fn frames_arrive_in_order_with_sequence_numbers() {
        let (camera, tx) = ChannelCamera::new("bow", 4);
        tx.send(RgbImage::new(2, 2)).unwrap();
        tx.send(RgbImage::new(3, 3)).unwrap();
        let (_handle, token) = cancel_pair();
        let mut stream = camera.open_stream().unwrap();
        let first = stream.next_frame(&token).unwrap().unwrap();
        let second = stream.next_frame(&token).unwrap().unwrap();
        assert_eq!((first.sequence(), first.width()), (1, 2));
        assert_eq!((second.sequence(), second.width()), (2, 3));
        stream.release(first);
        assert_eq!(camera.released_frames(), 1);
    }

    #[test]
    fn closed_channel_is_a_stream_error() {
        let (camera, tx) = ChannelCamera::new("bow", 1);
        drop(tx);
        let (_handle, token) = cancel_pair();
        let err = camera.open_stream().unwrap().next_frame(&token).unwrap_err();
        assert_eq!(
            PrefilterError::classify(&err).map(|e| e.code()),
            Some("STREAM")
        );
    }

    #[test]
    fn cancel_wakes_a_blocked_read() {
        let (camera, _tx) = ChannelCamera::new("bow", 1);
        let (mut handle, token) = cancel_pair();
        let mut stream = camera.open_stream().unwrap();
        let reader = std::thread::spawn(move || stream.next_frame(&token).map(|f| f.is_none()));
        std::thread::sleep(Duration::from_millis(20));
        handle.cancel();
        assert!(reader.join().unwrap().unwrap());
    }

    #[test]
    fn active_stream_count_tracks_drops() {
        let (camera, _tx) = ChannelCamera::new("bow", 1);
        let a = camera.open_stream().unwrap();
        let b = camera.open_stream().unwrap();
        assert_eq!(camera.active_streams(), 2);
        drop(a);
        drop(b);
        assert_eq!(camera.active_streams(), 0);
    }
}

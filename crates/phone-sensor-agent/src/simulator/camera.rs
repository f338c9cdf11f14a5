// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Synthetic camera
//!
//! Follows the capture configuration cell. Every configuration change
//! withdraws the current capture callback and offers a new one after the
//! negotiation delay. After each capture the callback is offered again.

use crate::capability::{CapabilityRegistry, CaptureCallback, RegisterOutcome};
use crate::protocol::{CaptureConfiguration, ImageEncoding};
use crate::reactive::{ReactiveCell, SubscriptionId};
use crate::session::{DeviceState, PhotoSubmitter};
use image::codecs::jpeg::JpegEncoder;
use image::{ImageResult, Rgb, RgbImage};
use parking_lot::Mutex;
use std::io::Cursor;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

enum CameraEvent {
    Reconfigured,
    Captured,
}

/// Handle to a running synthetic camera; stops it on drop
pub struct SyntheticCamera {
    task: JoinHandle<()>,
    subscription: SubscriptionId,
    config_cell: ReactiveCell<CaptureConfiguration>,
    capability: CapabilityRegistry,
    captures: Arc<AtomicU64>,
}

impl SyntheticCamera {
    /// Start negotiating with the current configuration
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(state: &DeviceState, negotiation_delay: Duration) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let current = Arc::new(Mutex::new(state.capture_config.read()));
        let generation = Arc::new(AtomicU64::new(0));

        let subscription = {
            let current = Arc::clone(&current);
            let generation = Arc::clone(&generation);
            let capability = state.capability.clone();
            let events = events_tx.clone();
            state.capture_config.subscribe(move |config| {
                let mut latest = current.lock();
                if *latest == *config {
                    return;
                }
                *latest = *config;
                generation.fetch_add(1, Ordering::SeqCst);
                // grabs issued from now on must wait for the renegotiated stream
                capability.withdraw();
                let _ = events.send(CameraEvent::Reconfigured);
            })
        };

        let captures = Arc::new(AtomicU64::new(0));
        let pipeline = Pipeline {
            capability: state.capability.clone(),
            submitter: state.photo_submitter(),
            current,
            generation,
            captures: Arc::clone(&captures),
            events: events_tx,
        };
        let task = tokio::spawn(pipeline.run(events_rx, negotiation_delay));

        Self {
            task,
            subscription,
            config_cell: state.capture_config.clone(),
            capability: state.capability.clone(),
            captures,
        }
    }

    /// Photos taken so far
    pub fn captures(&self) -> u64 {
        self.captures.load(Ordering::SeqCst)
    }
}

impl Drop for SyntheticCamera {
    fn drop(&mut self) {
        self.config_cell.unsubscribe(self.subscription);
        self.task.abort();
        self.capability.withdraw();
    }
}

struct Pipeline {
    capability: CapabilityRegistry,
    submitter: PhotoSubmitter,
    current: Arc<Mutex<CaptureConfiguration>>,
    generation: Arc<AtomicU64>,
    captures: Arc<AtomicU64>,
    events: mpsc::UnboundedSender<CameraEvent>,
}

impl Pipeline {
    async fn run(self, mut events: mpsc::UnboundedReceiver<CameraEvent>, delay: Duration) {
        let mut ready_generation: Option<u64> = None;

        loop {
            if ready_generation.is_none() {
                let generation = self.generation.load(Ordering::SeqCst);
                tokio::select! {
                    biased;
                    event = events.recv() => match event {
                        Some(CameraEvent::Reconfigured) => continue,
                        Some(CameraEvent::Captured) => {}
                        None => break,
                    },
                    _ = tokio::time::sleep(delay) => {
                        if generation == self.generation.load(Ordering::SeqCst) {
                            info!("[SIM-CAMERA] Stream ready: {:?}", *self.current.lock());
                            ready_generation = Some(generation);
                            self.offer();
                        }
                    }
                }
            } else {
                match events.recv().await {
                    Some(CameraEvent::Reconfigured) => {
                        debug!("[SIM-CAMERA] Configuration changed; renegotiating");
                        ready_generation = None;
                    }
                    Some(CameraEvent::Captured) => {
                        if ready_generation == Some(self.generation.load(Ordering::SeqCst)) {
                            self.offer();
                        }
                    }
                    None => break,
                }
            }
        }
    }

    fn offer(&self) {
        if let RegisterOutcome::Served(remaining) = self.capability.register(self.callback()) {
            debug!("[SIM-CAMERA] Served a waiting grab; {} still pending", remaining);
        }
    }

    fn callback(&self) -> CaptureCallback {
        let submitter = self.submitter.clone();
        let current = Arc::clone(&self.current);
        let captures = Arc::clone(&self.captures);
        let events = self.events.clone();

        Arc::new(move || {
            let config = *current.lock();
            let index = captures.fetch_add(1, Ordering::SeqCst);
            match render_test_pattern(&config, index) {
                Ok(image) => {
                    if let Err(e) = submitter.submit(image) {
                        warn!("[SIM-CAMERA] Photo not sent: {}", e);
                    }
                }
                Err(e) => warn!("[SIM-CAMERA] Encoding failed: {}", e),
            }
            let _ = events.send(CameraEvent::Captured);
        })
    }
}

/// Gradient test image at the configured resolution and encoding
///
/// `index` shifts the blue channel so consecutive captures differ.
pub fn render_test_pattern(config: &CaptureConfiguration, index: u64) -> ImageResult<Vec<u8>> {
    let (width, height) = config.resolution;
    let blue = (index.wrapping_mul(37) % 256) as u8;
    let image = RgbImage::from_fn(width, height, |x, y| {
        let red = (x as u64 * 255 / u64::from(width.max(1))) as u8;
        let green = (y as u64 * 255 / u64::from(height.max(1))) as u8;
        Rgb([red, green, blue])
    });

    let mut out = Cursor::new(Vec::new());
    match config.encoding {
        ImageEncoding::Jpeg => {
            JpegEncoder::new_with_quality(&mut out, config.quality.clamp(1, 100))
                .encode_image(&image)?;
        }
        other => image.write_to(&mut out, other.image_format())?,
    }
    Ok(out.into_inner())
}

//! CPAL-based audio output backend.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};
use pr_engine::Frame;
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::traits::{AudioError, AudioOutput};

/// Default queue length between the render thread and the device callback.
const DEFAULT_BUFFER_MS: u32 = 100;

/// Stereo output on the default CPAL device, fed through a frame ring buffer.
pub struct CpalOutput {
    device: Device,
    config: StreamConfig,
    stream: Option<Stream>,
    producer: HeapProd<Frame>,
    running: Arc<AtomicBool>,
    /// Device frames that found the queue empty
    underruns: Arc<AtomicU64>,
}

impl CpalOutput {
    /// Open the default device with a 100 ms queue.
    pub fn new() -> Result<(Self, HeapCons<Frame>), AudioError> {
        Self::with_buffer_ms(DEFAULT_BUFFER_MS)
    }

    /// Open the default device with a queue holding `buffer_ms` of audio.
    ///
    /// The returned consumer must be handed to [`CpalOutput::build_stream`].
    pub fn with_buffer_ms(buffer_ms: u32) -> Result<(Self, HeapCons<Frame>), AudioError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(AudioError::NoDevice)?;

        let config = device
            .default_output_config()
            .map_err(|e| AudioError::DeviceInit(e.to_string()))?;

        let mut config: StreamConfig = config.into();
        // The callback assumes interleaved stereo.
        config.channels = 2;

        let capacity = (config.sample_rate.0 as usize * buffer_ms.max(1) as usize / 1000).max(64);
        let (producer, consumer) = HeapRb::<Frame>::new(capacity).split();

        log::info!(
            "audio device {:?} at {} Hz, {} frame queue",
            device.name().unwrap_or_else(|_| "<unnamed>".into()),
            config.sample_rate.0,
            capacity
        );

        let output = Self {
            device,
            config,
            stream: None,
            producer,
            running: Arc::new(AtomicBool::new(false)),
            underruns: Arc::new(AtomicU64::new(0)),
        };

        Ok((output, consumer))
    }

    /// Build and start the device stream, draining `consumer`.
    pub fn build_stream(&mut self, mut consumer: HeapCons<Frame>) -> Result<(), AudioError> {
        let running = self.running.clone();
        let underruns = self.underruns.clone();
        let channels = self.config.channels as usize;

        let stream = self
            .device
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    if !running.load(Ordering::Relaxed) {
                        data.fill(0.0);
                        return;
                    }

                    let mut starved = 0;
                    for chunk in data.chunks_mut(channels) {
                        let frame = consumer.try_pop().unwrap_or_else(|| {
                            starved += 1;
                            Frame::silence()
                        });
                        for (i, sample) in chunk.iter_mut().enumerate() {
                            *sample = match i {
                                0 => frame.left_f32(),
                                1 => frame.right_f32(),
                                _ => 0.0,
                            };
                        }
                    }
                    if starved > 0 {
                        underruns.fetch_add(starved, Ordering::Relaxed);
                    }
                },
                |err| log::error!("audio stream error: {}", err),
                None,
            )
            .map_err(|e| AudioError::StreamCreate(e.to_string()))?;

        stream.play().map_err(|e| AudioError::Playback(e.to_string()))?;
        self.stream = Some(stream);

        Ok(())
    }

    /// Device frames rendered as silence because the queue ran dry.
    pub fn underruns(&self) -> u64 {
        self.underruns.load(Ordering::Relaxed)
    }
}

impl AudioOutput for CpalOutput {
    fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    fn write(&mut self, frames: &[Frame]) -> usize {
        self.producer.push_slice(frames)
    }

    fn start(&mut self) -> Result<(), AudioError> {
        self.running.store(true, Ordering::Relaxed);
        if let Some(ref stream) = self.stream {
            stream.play().map_err(|e| AudioError::Playback(e.to_string()))?;
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        self.running.store(false, Ordering::Relaxed);
        if let Some(ref stream) = self.stream {
            stream.pause().map_err(|e| AudioError::Playback(e.to_string()))?;
        }
        let underruns = self.underruns();
        if underruns > 0 {
            log::warn!("audio queue ran dry for {} frames", underruns);
        }
        Ok(())
    }
}

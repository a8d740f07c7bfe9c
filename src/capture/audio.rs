//! Audio capture through cpal
//!
//! System audio uses WASAPI loopback: an input stream built on the default
//! output device. The microphone is the default input device. Both deliver
//! 16-bit little-endian PCM regardless of the device sample format.

use super::traits::{AudioCallback, AudioFormat, AudioSource, CaptureError};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, StreamConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Which device a [`CpalAudioSource`] captures from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioEndpoint {
    /// Whatever the default output device is playing
    Loopback,
    /// Default input device
    Microphone,
}

fn endpoint_device(endpoint: AudioEndpoint) -> Option<Device> {
    let host = cpal::default_host();
    match endpoint {
        AudioEndpoint::Loopback => host.default_output_device(),
        AudioEndpoint::Microphone => host.default_input_device(),
    }
}

/// Pick the stream config for an endpoint
fn negotiate(
    device: &Device,
    endpoint: AudioEndpoint,
    preferred_rate: u32,
) -> Result<(StreamConfig, SampleFormat), CaptureError> {
    match endpoint {
        // Loopback must match the shared-mode mix format
        AudioEndpoint::Loopback => {
            let config = device
                .default_output_config()
                .map_err(|e| CaptureError::Stream(format!("Failed to get output config: {}", e)))?;
            Ok((config.config(), config.sample_format()))
        }
        AudioEndpoint::Microphone => {
            let rate = cpal::SampleRate(preferred_rate);
            let preferred = device.supported_input_configs().ok().and_then(|mut configs| {
                configs.find(|c| {
                    c.channels() == 1 && c.min_sample_rate() <= rate && rate <= c.max_sample_rate()
                })
            });
            let config = match preferred {
                Some(range) => range.with_sample_rate(rate),
                None => device.default_input_config().map_err(|e| {
                    CaptureError::Stream(format!("Failed to get input config: {}", e))
                })?,
            };
            Ok((config.config(), config.sample_format()))
        }
    }
}

fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    on_data: AudioCallback,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: SizedSample,
    i16: FromSample<T>,
{
    device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            let mut bytes = Vec::with_capacity(data.len() * 2);
            for &sample in data {
                bytes.extend_from_slice(&i16::from_sample(sample).to_le_bytes());
            }
            on_data(&bytes);
        },
        |err| tracing::error!("Audio stream error: {}", err),
        None,
    )
}

/// cpal-backed audio source
pub struct CpalAudioSource {
    endpoint: AudioEndpoint,
    name: String,
    negotiated: Option<(StreamConfig, SampleFormat)>,
    is_running: Arc<AtomicBool>,
    stream_handle: Option<JoinHandle<()>>,
}

impl CpalAudioSource {
    /// Resolve the endpoint's default device. A missing device yields an
    /// unavailable source rather than an error.
    pub fn new(endpoint: AudioEndpoint, preferred_rate: u32) -> Self {
        let resolved = endpoint_device(endpoint).map(|device| {
            let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
            (name, negotiate(&device, endpoint, preferred_rate))
        });

        let (name, negotiated) = match resolved {
            Some((name, Ok(negotiated))) => {
                tracing::info!(
                    "{:?} audio device: {} ({}Hz, {}ch, {:?})",
                    endpoint,
                    name,
                    negotiated.0.sample_rate.0,
                    negotiated.0.channels,
                    negotiated.1
                );
                (name, Some(negotiated))
            }
            Some((name, Err(e))) => {
                tracing::warn!("{:?} audio device {} unusable: {}", endpoint, name, e);
                (name, None)
            }
            None => {
                tracing::warn!("No default device found for {:?} audio capture", endpoint);
                ("none".to_string(), None)
            }
        };

        Self {
            endpoint,
            name,
            negotiated,
            is_running: Arc::new(AtomicBool::new(false)),
            stream_handle: None,
        }
    }
}

impl AudioSource for CpalAudioSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        self.negotiated.is_some()
    }

    fn format(&self) -> AudioFormat {
        match &self.negotiated {
            Some((config, _)) => AudioFormat::pcm16(config.sample_rate.0, config.channels),
            None => AudioFormat::pcm16(44100, 2),
        }
    }

    fn start(&mut self, on_data: AudioCallback) -> Result<(), CaptureError> {
        if self.is_running.load(Ordering::SeqCst) {
            return Ok(());
        }
        let (config, sample_format) = self.negotiated.clone().ok_or_else(|| {
            CaptureError::DeviceNotFound(format!("{:?} audio device", self.endpoint))
        })?;

        let endpoint = self.endpoint;
        let is_running = self.is_running.clone();
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<(), String>>(1);

        is_running.store(true, Ordering::SeqCst);

        // cpal streams are not Send, so the stream lives and dies on this thread
        let handle = std::thread::spawn(move || {
            let stream = (|| -> Result<cpal::Stream, String> {
                let device = endpoint_device(endpoint)
                    .ok_or_else(|| "default device disappeared".to_string())?;
                let stream = match sample_format {
                    SampleFormat::F32 => build_stream::<f32>(&device, &config, on_data),
                    SampleFormat::I16 => build_stream::<i16>(&device, &config, on_data),
                    SampleFormat::U16 => build_stream::<u16>(&device, &config, on_data),
                    SampleFormat::I32 => build_stream::<i32>(&device, &config, on_data),
                    other => return Err(format!("unsupported sample format {:?}", other)),
                }
                .map_err(|e| format!("failed to build stream: {}", e))?;
                stream
                    .play()
                    .map_err(|e| format!("failed to start stream: {}", e))?;
                Ok(stream)
            })();

            let stream = match stream {
                Ok(stream) => {
                    let _ = ready_tx.send(Ok(()));
                    stream
                }
                Err(e) => {
                    is_running.store(false, Ordering::SeqCst);
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };

            while is_running.load(Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(50));
            }

            drop(stream);
            tracing::debug!("{:?} audio stream closed", endpoint);
        });

        match ready_rx.recv_timeout(Duration::from_secs(3)) {
            Ok(Ok(())) => {
                self.stream_handle = Some(handle);
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(CaptureError::Stream(e))
            }
            Err(_) => {
                self.is_running.store(false, Ordering::SeqCst);
                self.stream_handle = Some(handle);
                Err(CaptureError::Stream(format!(
                    "{:?} audio stream did not start in time",
                    endpoint
                )))
            }
        }
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        self.is_running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.stream_handle.take() {
            handle
                .join()
                .map_err(|_| CaptureError::Stream("audio capture thread panicked".to_string()))?;
        }
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }
}

impl Drop for CpalAudioSource {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

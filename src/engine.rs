use crate::config::SonoraWorldDesc;
use crate::error::{Result, SonoraError};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SizedSample};
use crossbeam_channel::{Receiver, Sender, bounded};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

/// Callback that fills an interleaved f32 buffer for one render block.
///
/// Receives the buffer, the output sample rate and the channel count, and
/// returns the number of frames actually produced.
pub type AudioFillCallback = dyn Fn(&mut [f32], u32, u16) -> usize + Send + Sync;

/// Owns the output device stream and drives the fill callback.
///
/// The cpal stream handle is not `Send`, so `start` moves stream creation
/// onto a dedicated thread that holds the stream alive until `stop`; the
/// engine itself stays `Send` and can sit behind the FFI global.
pub struct SonoraEngine {
    desc: SonoraWorldDesc,
    is_running: Arc<AtomicBool>,
    frames_processed: Arc<AtomicUsize>,
    fill_callback: Option<Arc<AudioFillCallback>>,
    audio_thread: Option<AudioThread>,
}

struct AudioThread {
    stop_tx: Sender<()>,
    join: JoinHandle<()>,
}

impl SonoraEngine {
    pub fn new(desc: SonoraWorldDesc) -> Result<Self> {
        if desc.sample_rate == 0 || desc.channels == 0 || desc.block_size == 0 {
            return Err(SonoraError::Configuration(
                "Sample rate, channels and block size must be non-zero".into(),
            ));
        }
        Ok(Self {
            desc,
            is_running: Arc::new(AtomicBool::new(false)),
            frames_processed: Arc::new(AtomicUsize::new(0)),
            fill_callback: None,
            audio_thread: None,
        })
    }

    /// Set the callback that renders each output block.
    pub fn set_fill_callback<F>(&mut self, callback: F)
    where
        F: Fn(&mut [f32], u32, u16) -> usize + Send + Sync + 'static,
    {
        self.fill_callback = Some(Arc::new(callback));
    }

    /// Open the default output device and start rendering. Idempotent while
    /// running.
    pub fn start(&mut self) -> Result<()> {
        if self.is_running.load(Ordering::Relaxed) {
            return Ok(());
        }

        let fill_callback = self
            .fill_callback
            .clone()
            .ok_or_else(|| SonoraError::Engine("No fill callback set".into()))?;

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let (ready_tx, ready_rx) = bounded::<Result<()>>(1);

        let desc = self.desc.clone();
        let is_running = self.is_running.clone();
        let frames_processed = self.frames_processed.clone();

        let join = std::thread::Builder::new()
            .name("sonora-audio".into())
            .spawn(move || {
                run_audio_thread(
                    desc,
                    fill_callback,
                    is_running,
                    frames_processed,
                    stop_rx,
                    ready_tx,
                );
            })
            .map_err(|e| SonoraError::Engine(format!("Failed to spawn audio thread: {}", e)))?;

        let started = ready_rx
            .recv_timeout(Duration::from_secs(5))
            .map_err(|_| SonoraError::AudioDevice("Audio thread did not start".into()));

        match started {
            Ok(Ok(())) => {
                self.audio_thread = Some(AudioThread { stop_tx, join });
                self.is_running.store(true, Ordering::Relaxed);
                Ok(())
            }
            Ok(Err(e)) | Err(e) => {
                let _ = stop_tx.send(());
                let _ = join.join();
                Err(e)
            }
        }
    }

    /// Stop rendering and close the stream.
    pub fn stop(&mut self) -> Result<()> {
        if let Some(thread) = self.audio_thread.take() {
            self.is_running.store(false, Ordering::Relaxed);
            let _ = thread.stop_tx.send(());
            thread
                .join
                .join()
                .map_err(|_| SonoraError::Engine("Audio thread panicked".into()))?;
        }
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Relaxed)
    }

    /// Output frames rendered since start.
    pub fn frames_processed(&self) -> usize {
        self.frames_processed.load(Ordering::Relaxed)
    }

    pub fn desc(&self) -> &SonoraWorldDesc {
        &self.desc
    }
}

impl Drop for SonoraEngine {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// Body of the audio thread: build the stream, report readiness, then hold
/// the stream alive until the stop signal.
fn run_audio_thread(
    desc: SonoraWorldDesc,
    fill_callback: Arc<AudioFillCallback>,
    is_running: Arc<AtomicBool>,
    frames_processed: Arc<AtomicUsize>,
    stop_rx: Receiver<()>,
    ready_tx: Sender<Result<()>>,
) {
    let stream = match build_output_stream(&desc, fill_callback, is_running, frames_processed) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready_tx.send(Err(SonoraError::AudioDevice(format!(
            "Failed to start stream: {}",
            e
        ))));
        return;
    }

    let _ = ready_tx.send(Ok(()));
    let _ = stop_rx.recv();
    drop(stream);
}

fn build_output_stream(
    desc: &SonoraWorldDesc,
    fill_callback: Arc<AudioFillCallback>,
    is_running: Arc<AtomicBool>,
    frames_processed: Arc<AtomicUsize>,
) -> Result<cpal::Stream> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| SonoraError::AudioDevice("No default output device available".into()))?;

    let config = cpal::StreamConfig {
        channels: desc.channels,
        sample_rate: cpal::SampleRate(desc.sample_rate),
        buffer_size: cpal::BufferSize::Fixed(desc.block_size as u32),
    };

    let default_config = device.default_output_config().map_err(|e| {
        SonoraError::AudioDevice(format!("Failed to get default config: {}", e))
    })?;

    match default_config.sample_format() {
        cpal::SampleFormat::F32 => build_stream::<f32>(
            &device,
            &config,
            fill_callback,
            is_running,
            frames_processed,
            desc.sample_rate,
            desc.channels,
        ),
        cpal::SampleFormat::I16 => build_stream::<i16>(
            &device,
            &config,
            fill_callback,
            is_running,
            frames_processed,
            desc.sample_rate,
            desc.channels,
        ),
        cpal::SampleFormat::U16 => build_stream::<u16>(
            &device,
            &config,
            fill_callback,
            is_running,
            frames_processed,
            desc.sample_rate,
            desc.channels,
        ),
        other => Err(SonoraError::AudioFormat(format!(
            "Unsupported sample format {:?}",
            other
        ))),
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    fill_callback: Arc<AudioFillCallback>,
    is_running: Arc<AtomicBool>,
    frames_processed: Arc<AtomicUsize>,
    sample_rate: u32,
    channels: u16,
) -> Result<cpal::Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let stream = device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                if !is_running.load(Ordering::Relaxed) {
                    for sample in data.iter_mut() {
                        *sample = T::from_sample(0.0f32);
                    }
                    return;
                }

                let mut temp_buffer = vec![0.0f32; data.len()];
                let frames_filled = fill_callback(&mut temp_buffer, sample_rate, channels);

                for (sample, &value) in data.iter_mut().zip(temp_buffer.iter()) {
                    *sample = T::from_sample(value);
                }

                frames_processed.fetch_add(frames_filled, Ordering::Relaxed);
            },
            move |err| {
                log::error!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| SonoraError::AudioDevice(format!("Failed to build stream: {}", e)))?;

    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_creation_needs_no_device() {
        let engine = SonoraEngine::new(SonoraWorldDesc::default()).unwrap();
        assert!(!engine.is_running());
        assert_eq!(engine.frames_processed(), 0);
    }

    #[test]
    fn zero_config_is_rejected() {
        let desc = SonoraWorldDesc::default().sample_rate(0);
        assert!(SonoraEngine::new(desc).is_err());
    }

    #[test]
    fn start_without_callback_fails() {
        let mut engine = SonoraEngine::new(SonoraWorldDesc::default()).unwrap();
        assert!(engine.start().is_err());
    }

    #[test]
    fn stop_when_never_started_is_ok() {
        let mut engine = SonoraEngine::new(SonoraWorldDesc::default()).unwrap();
        assert!(engine.stop().is_ok());
    }
}

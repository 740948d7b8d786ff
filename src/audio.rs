//! Audio playback behind a small trait, with a rodio implementation.

use std::io::Cursor;
use std::sync::Arc;

use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};

use crate::assets::audio::AudioAsset;
use crate::error::{AudioError, InitError};

/// A single playable track.
pub trait AudioOutput {
    /// Starts from the beginning, or resumes when paused.
    fn play(&mut self) -> Result<(), AudioError>;
    fn pause(&mut self);
    /// Stops and rewinds.
    fn stop(&mut self);
    /// Length in seconds, None when it could not be determined
    fn duration(&self) -> Option<f32>;
}

pub trait AudioBackend {
    fn create_output(
        &self,
        asset: &AudioAsset,
        volume: f32,
    ) -> Result<Box<dyn AudioOutput>, AudioError>;
}

fn decode(bytes: &Arc<[u8]>) -> Result<Decoder<Cursor<Arc<[u8]>>>, AudioError> {
    Decoder::new(Cursor::new(Arc::clone(bytes))).map_err(|e| AudioError::Decode(e.to_string()))
}

/// Length of a source by decoding all of it.
fn counted_duration<S>(source: S) -> Option<f32>
where
    S: Source,
    S::Item: rodio::Sample,
{
    let samples_per_second = source.channels() as f32 * source.sample_rate() as f32;
    if samples_per_second <= 0.0 {
        return None;
    }
    Some(source.count() as f32 / samples_per_second)
}

/// Plays through the default output device.
pub struct RodioBackend {
    /// Audio output stream (must be kept alive)
    _stream: OutputStream,
    handle: OutputStreamHandle,
}

impl RodioBackend {
    pub fn new() -> Result<Self, InitError> {
        let (stream, handle) =
            OutputStream::try_default().map_err(|e| InitError::AudioDevice(e.to_string()))?;
        log::info!("Opened default audio output");

        Ok(Self {
            _stream: stream,
            handle,
        })
    }
}

impl AudioBackend for RodioBackend {
    fn create_output(
        &self,
        asset: &AudioAsset,
        volume: f32,
    ) -> Result<Box<dyn AudioOutput>, AudioError> {
        // Decode once up front so broken files fail at bind time
        let decoder = decode(&asset.bytes)?;
        let duration = match decoder.total_duration() {
            Some(duration) => Some(duration.as_secs_f32()),
            // MP3 reports no total, so count the samples instead
            None => counted_duration(decoder),
        };
        log::info!(
            "Bound audio {} ({})",
            asset.name,
            duration.map_or_else(|| "unknown length".to_string(), |d| format!("{:.1}s", d))
        );

        Ok(Box::new(RodioTrack {
            handle: self.handle.clone(),
            bytes: Arc::clone(&asset.bytes),
            sink: None,
            volume,
            duration,
        }))
    }
}

pub struct RodioTrack {
    handle: OutputStreamHandle,
    bytes: Arc<[u8]>,
    /// Present between play and stop
    sink: Option<Sink>,
    volume: f32,
    duration: Option<f32>,
}

impl AudioOutput for RodioTrack {
    fn play(&mut self) -> Result<(), AudioError> {
        if let Some(sink) = &self.sink {
            sink.play();
            return Ok(());
        }

        let sink = Sink::try_new(&self.handle)
            .map_err(|e| AudioError::Sink(format!("Failed to create sink: {}", e)))?;
        sink.set_volume(self.volume);
        sink.append(decode(&self.bytes)?);
        self.sink = Some(sink);

        Ok(())
    }

    fn pause(&mut self) {
        if let Some(sink) = &self.sink {
            sink.pause();
        }
    }

    fn stop(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
    }

    fn duration(&self) -> Option<f32> {
        self.duration
    }
}

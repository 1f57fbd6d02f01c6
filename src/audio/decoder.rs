//! Compressed audio payload decoding
//!
//! Uses symphonia for format-agnostic decoding (MP3, FLAC, OGG, WAV, ...)
//! of downloaded payloads to mono f32 PCM. The catalog gives no
//! content-type guarantee, so probing works from the bytes alone and any
//! failure is reported to the caller as an ordinary error.

use std::io::Cursor;

use anyhow::{anyhow, Context, Result};
use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::conv::FromSample;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::Sample;

/// Decoded audio payload
#[derive(Debug)]
pub struct DecodedAudio {
    /// Mono samples, range [-1.0, 1.0]
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Original channel count
    pub channels: usize,
}

/// Decode an in-memory compressed payload to mono f32 PCM
pub fn decode_bytes(data: Vec<u8>) -> Result<DecodedAudio> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(data)), Default::default());

    let probed = symphonia::default::get_probe()
        .format(
            &Hint::new(),
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .context("Failed to probe audio payload")?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .context("No audio track found in payload")?;

    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .context("Sample rate unknown")?;
    let channels = track.codec_params.channels.context("Channels unknown")?;
    let channel_count = channels.count();

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context("Failed to create decoder for payload")?;

    let mut samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(anyhow!("Error reading packet: {}", e)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = decoder.decode(&packet).context("Failed to decode packet")?;
        samples.extend(convert_to_mono_f32(&decoded));
    }

    tracing::debug!(
        total_samples = samples.len(),
        sample_rate = sample_rate,
        channels = channel_count,
        "Audio payload decoded"
    );

    Ok(DecodedAudio {
        samples,
        sample_rate,
        channels: channel_count,
    })
}

/// Average all channels to mono f32
fn convert_to_mono_f32(decoded: &AudioBufferRef) -> Vec<f32> {
    match decoded {
        AudioBufferRef::U8(buf) => mix_to_mono(buf.as_ref()),
        AudioBufferRef::U16(buf) => mix_to_mono(buf.as_ref()),
        AudioBufferRef::U24(buf) => mix_to_mono(buf.as_ref()),
        AudioBufferRef::U32(buf) => mix_to_mono(buf.as_ref()),
        AudioBufferRef::S8(buf) => mix_to_mono(buf.as_ref()),
        AudioBufferRef::S16(buf) => mix_to_mono(buf.as_ref()),
        AudioBufferRef::S24(buf) => mix_to_mono(buf.as_ref()),
        AudioBufferRef::S32(buf) => mix_to_mono(buf.as_ref()),
        AudioBufferRef::F32(buf) => mix_to_mono(buf.as_ref()),
        AudioBufferRef::F64(buf) => mix_to_mono(buf.as_ref()),
    }
}

fn mix_to_mono<S>(buf: &AudioBuffer<S>) -> Vec<f32>
where
    S: Sample,
    f32: FromSample<S>,
{
    let num_channels = buf.spec().channels.count();
    let num_frames = buf.frames();
    let mut mono = Vec::with_capacity(num_frames);

    for frame_idx in 0..num_frames {
        let mut sum = 0.0f32;
        for ch in 0..num_channels {
            sum += f32::from_sample(buf.chan(ch)[frame_idx]);
        }
        mono.push(sum / num_channels as f32);
    }

    mono
}

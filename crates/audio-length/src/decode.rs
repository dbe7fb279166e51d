//! Duration measurement by full decode.
//!
//! Every packet of the selected track is decoded so the frame count does not
//! depend on container metadata, which is often missing or wrong for
//! streamed formats.

use crate::error::DecodeError;
use bytes::Bytes;
use std::io::Cursor;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, Track};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// Result of decoding one audio resource
#[derive(Debug, Clone, PartialEq)]
pub struct AudioMeasurement {
    /// Decoded frames (samples per channel)
    pub frames: u64,
    /// Native rate reported by the decoder, no resampling applied
    pub sample_rate: u32,
    pub channels: usize,
    pub duration_secs: f64,
}

/// Decode `bytes` completely and measure the duration of its audio track.
///
/// `extension` is only a hint for the container probe; content sniffing
/// still decides the format.
pub fn measure_duration(
    bytes: Bytes,
    extension: Option<&str>,
) -> Result<AudioMeasurement, DecodeError> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = extension {
        hint.with_extension(extension);
    }

    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format = probed.format;

    let track = select_track(format.default_track(), format.tracks())
        .ok_or(DecodeError::NoAudioTrack)?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate;
    let mut channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(0);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())?;

    let mut frames: u64 = 0;
    let mut skipped: usize = 0;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = decoded.spec();
                sample_rate = Some(spec.rate);
                channels = spec.channels.count();
                frames += decoded.frames() as u64;
            }
            Err(SymphoniaError::DecodeError(msg)) => {
                warn!(packet_ts = packet.ts(), "Skipping corrupt packet: {}", msg);
                skipped += 1;
            }
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }

    if frames == 0 && skipped > 0 {
        return Err(DecodeError::Decode(format!(
            "none of {} packets could be decoded",
            skipped
        )));
    }

    let sample_rate = match sample_rate {
        Some(rate) if rate > 0 => rate,
        _ => return Err(DecodeError::UnknownSampleRate),
    };

    let duration_secs = frames as f64 / f64::from(sample_rate);

    debug!(
        frames,
        sample_rate,
        channels,
        skipped,
        duration_secs = format!("{:.3}", duration_secs),
        "Audio decoding complete"
    );

    Ok(AudioMeasurement {
        frames,
        sample_rate,
        channels,
        duration_secs,
    })
}

/// Run [`measure_duration`] on the blocking pool
pub async fn measure_duration_blocking(
    bytes: Bytes,
    extension: Option<String>,
) -> Result<AudioMeasurement, DecodeError> {
    tokio::task::spawn_blocking(move || measure_duration(bytes, extension.as_deref()))
        .await
        .map_err(|e| DecodeError::DecoderPanic(e.to_string()))?
}

fn select_track<'a>(default: Option<&'a Track>, tracks: &'a [Track]) -> Option<&'a Track> {
    default
        .filter(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .or_else(|| tracks.iter().find(|t| t.codec_params.codec != CODEC_TYPE_NULL))
}

/// Lower-cased file extension of the last path segment of `url`, if any
pub fn extension_hint(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next()?;
    let segment = path.rsplit('/').next()?;
    let (stem, extension) = segment.rsplit_once('.')?;
    if stem.is_empty() || extension.is_empty() {
        return None;
    }
    Some(extension.to_ascii_lowercase())
}

//! Speech synthesis for meditation scripts: provider PCM in, WAV in the
//! media bucket out.

use anyhow::Context;
use bytes::Bytes;
use tracing::info;
use uuid::Uuid;

use crate::ai::AiError;
use crate::state::AppState;
use crate::storage::meditation_audio_key;

use super::repo;

#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("speech synthesis failed: {0}")]
    Synthesis(#[from] AiError),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Synthesize one meditation's script and persist the result. Returns the
/// bucket key recorded on the meditation.
pub async fn synthesize_meditation_audio(
    state: &AppState,
    meditation_id: Uuid,
    script: &str,
) -> Result<String, AudioError> {
    let audio = state.ai.synthesize_speech(script).await?;

    // The provider answers raw little-endian PCM16; wrap it so browsers can
    // play the object directly.
    let sample_rate = pcm_sample_rate(&audio.mime_type).unwrap_or(24_000);
    let wav = wrap_wav_pcm16(&audio.data, sample_rate, 1);

    let key = meditation_audio_key(meditation_id);
    state
        .storage
        .put_object(&key, Bytes::from(wav), "audio/wav")
        .await
        .context("store meditation audio")?;
    repo::set_meditation_audio(&state.db, meditation_id, &key)
        .await
        .context("record audio key")?;

    info!(meditation_id = %meditation_id, key = %key, "meditation audio synthesized");
    Ok(key)
}

/// Rate parameter of mime types like `audio/L16;rate=24000`.
pub fn pcm_sample_rate(mime_type: &str) -> Option<u32> {
    mime_type
        .split(';')
        .map(str::trim)
        .find_map(|p| p.strip_prefix("rate="))
        .and_then(|r| r.parse().ok())
}

/// Minimal RIFF/WAVE header around raw PCM16 samples.
pub fn wrap_wav_pcm16(pcm: &[u8], sample_rate: u32, channels: u16) -> Vec<u8> {
    let byte_rate = sample_rate * channels as u32 * 2;
    let block_align = channels * 2;
    let data_len = pcm.len() as u32;

    let mut wav = Vec::with_capacity(44 + pcm.len());
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_len).to_le_bytes());
    wav.extend_from_slice(b"WAVE");
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes()); // PCM chunk size
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM format
    wav.extend_from_slice(&channels.to_le_bytes());
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    wav.extend_from_slice(&byte_rate.to_le_bytes());
    wav.extend_from_slice(&block_align.to_le_bytes());
    wav.extend_from_slice(&16u16.to_le_bytes()); // bits per sample
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_len.to_le_bytes());
    wav.extend_from_slice(pcm);
    wav
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_rate_parses_from_mime_params() {
        assert_eq!(pcm_sample_rate("audio/L16;rate=24000"), Some(24_000));
        assert_eq!(pcm_sample_rate("audio/L16; rate=16000"), Some(16_000));
        assert_eq!(pcm_sample_rate("audio/wav"), None);
    }

    #[test]
    fn wav_header_is_well_formed() {
        let pcm = [0u8; 8];
        let wav = wrap_wav_pcm16(&pcm, 24_000, 1);
        assert_eq!(wav.len(), 44 + 8);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(u32::from_le_bytes(wav[40..44].try_into().unwrap()), 8);
        // byte rate = rate * channels * 2
        assert_eq!(
            u32::from_le_bytes(wav[28..32].try_into().unwrap()),
            24_000 * 2
        );
    }
}

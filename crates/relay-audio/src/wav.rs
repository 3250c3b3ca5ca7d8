//! Wraps linear-PCM samples in a RIFF/WAVE container for STT upload.

use std::io::Cursor;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WavError {
    #[error("failed to encode WAV: {0}")]
    Encode(#[from] hound::Error),
}

/// Encode 16-bit signed PCM, 8 kHz, mono into a WAV byte buffer (standard
/// 44-byte RIFF header followed by the raw sample data).
pub fn pcm_to_wav(samples: &[i16]) -> Result<Vec<u8>, WavError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 8_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for &sample in samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wav_has_standard_44_byte_header() {
        let samples = vec![0i16; 160];
        let wav = pcm_to_wav(&samples).unwrap();
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        // 44-byte header + 2 bytes per sample.
        assert_eq!(wav.len(), 44 + samples.len() * 2);
    }

    #[test]
    fn wav_roundtrips_sample_values() {
        let samples: Vec<i16> = (0..160).map(|i| i * 10).collect();
        let wav = pcm_to_wav(&samples).unwrap();
        let mut reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
        let decoded: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(decoded, samples);
    }

    #[test]
    fn empty_buffer_still_produces_valid_wav() {
        let wav = pcm_to_wav(&[]).unwrap();
        assert_eq!(wav.len(), 44);
    }
}

//! PCM helpers for feeding decoded Opus audio to a speech model.

use crate::errors::CleanChatError;

/// Normalize signed 16-bit PCM to `[-1.0, 1.0)`.
pub fn pcm_to_f32(pcm: &[i16]) -> Vec<f32> {
    pcm.iter().map(|&s| s as f32 / 32768.0).collect()
}

/// Little-endian byte stream to 16-bit samples. A trailing odd byte is dropped.
pub fn pcm_from_le_bytes(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// Box-filter decimation from `from_rate` to `to_rate` (e.g. 48 kHz → 16 kHz).
///
/// The ratio must be a whole number. Incomplete trailing groups are dropped.
pub fn downsample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>, CleanChatError> {
    if to_rate == 0 || from_rate < to_rate || from_rate % to_rate != 0 {
        return Err(CleanChatError::ConfigurationInvalid {
            reason: format!("cannot downsample {from_rate} Hz to {to_rate} Hz"),
        });
    }
    let ratio = (from_rate / to_rate) as usize;
    if ratio == 1 {
        return Ok(samples.to_vec());
    }
    Ok(samples
        .chunks_exact(ratio)
        .map(|group| group.iter().sum::<f32>() / ratio as f32)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pcm_normalization_bounds() {
        let out = pcm_to_f32(&[0, i16::MIN, i16::MAX, 16384]);
        assert_eq!(out[0], 0.0);
        assert_eq!(out[1], -1.0);
        assert!(out[2] < 1.0 && out[2] > 0.999);
        assert_eq!(out[3], 0.5);
    }

    #[test]
    fn le_bytes_ignore_trailing_byte() {
        assert_eq!(pcm_from_le_bytes(&[0x01, 0x00, 0xff, 0xff, 0x7f]), vec![1, -1]);
    }

    #[test]
    fn downsample_averages_groups() {
        let input = [0.0, 0.3, 0.6, 1.0, 1.0, 1.0, 0.5];
        let out = downsample(&input, 48_000, 16_000).unwrap();
        assert_eq!(out.len(), 2);
        assert!((out[0] - 0.3).abs() < 1e-6);
        assert!((out[1] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn downsample_rejects_non_integer_ratio() {
        assert!(downsample(&[0.0; 10], 44_100, 16_000).is_err());
        assert!(downsample(&[0.0; 10], 16_000, 48_000).is_err());
        assert_eq!(downsample(&[0.25; 3], 16_000, 16_000).unwrap(), vec![0.25; 3]);
    }
}

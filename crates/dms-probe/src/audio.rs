//! Audio profile classification, shared by the video cascade (for the
//! AVC/MP4/TS audio suffix) and standalone audio file probing.

use dms_core::AudioProfile;

use crate::containers::{AudioCodec, ProbedAudio, ProbedContainer};

/// AAC object-type byte is the top 5 bits of the first extradata byte.
const AAC_OBJECT_TYPE_LC: u8 = 2;
const AAC_OBJECT_TYPE_LC_ER: u8 = 17;

pub fn classify(audio: &ProbedAudio) -> AudioProfile {
    let Some(codec) = audio.codec else {
        return AudioProfile::Unknown;
    };
    match codec {
        AudioCodec::Mp3 => AudioProfile::Mp3,
        AudioCodec::Ac3 => AudioProfile::Ac3,
        AudioCodec::Mp2 => AudioProfile::Mp2,
        AudioCodec::Pcm => AudioProfile::Pcm,
        AudioCodec::Amr => AudioProfile::Amr,
        AudioCodec::WmaV1V2 => classify_wma(audio, false),
        AudioCodec::WmaPro => classify_wma(audio, true),
        AudioCodec::Aac => classify_aac(audio),
        AudioCodec::Other => AudioProfile::Unknown,
    }
}

fn classify_wma(audio: &ProbedAudio, is_pro: bool) -> AudioProfile {
    if is_pro {
        return AudioProfile::WmaPro;
    }
    match audio.bitrate_bps {
        Some(bps) if bps <= 193_000 => AudioProfile::WmaBase,
        Some(bps) if bps <= 385_000 => AudioProfile::WmaFull,
        _ => AudioProfile::Unknown,
    }
}

fn classify_aac(audio: &ProbedAudio) -> AudioProfile {
    let object_type = audio.extradata.first().map(|b| b >> 3).unwrap_or(0);
    if object_type != AAC_OBJECT_TYPE_LC && object_type != AAC_OBJECT_TYPE_LC_ER {
        return AudioProfile::Unknown;
    }
    let sample_rate_ok = audio
        .sample_rate_hz
        .map(|r| (8000..=48000).contains(&r))
        .unwrap_or(false);
    if !sample_rate_ok {
        return AudioProfile::Unknown;
    }
    let channels = audio.channels.unwrap_or(0);
    let bps = audio.bitrate_bps.unwrap_or(0);
    if channels <= 2 && bps <= 576_000 {
        AudioProfile::Aac
    } else if channels <= 6 && bps <= 1_440_000 {
        AudioProfile::AacMult5
    } else {
        AudioProfile::Unknown
    }
}

/// The MIME type and, where applicable, a standalone audio DLNA profile
/// for a file whose container carries no video stream.
pub fn mime_and_profile(
    container: &ProbedContainer,
    profile: AudioProfile,
    audio: &ProbedAudio,
) -> (String, Option<String>) {
    let mime = match container.name {
        "mp4" => "audio/mp4",
        "asf" => "audio/x-ms-wma",
        "audio" => match audio.codec {
            Some(AudioCodec::Mp3) => "audio/mpeg",
            _ => "audio/x-wav",
        },
        _ => "audio/mpeg",
    }
    .to_string();

    let dlna = match profile {
        AudioProfile::Mp3 => Some("MP3".to_string()),
        AudioProfile::Aac => Some("AAC_ISO".to_string()),
        AudioProfile::AacMult5 => Some("AAC_ISO_320".to_string()),
        AudioProfile::WmaBase => Some("WMABASE".to_string()),
        AudioProfile::WmaFull => Some("WMAFULL".to_string()),
        AudioProfile::WmaPro => Some("WMAPRO".to_string()),
        _ => None,
    };

    (mime, dlna)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aac(channels: i32, bps: i64, object_type: u8, sample_rate: i32) -> ProbedAudio {
        ProbedAudio {
            codec: Some(AudioCodec::Aac),
            channels: Some(channels),
            sample_rate_hz: Some(sample_rate),
            bitrate_bps: Some(bps),
            extradata: vec![object_type << 3],
        }
    }

    #[test]
    fn stereo_low_bitrate_aac_is_aac() {
        assert_eq!(classify(&aac(2, 500_000, 2, 44100)), AudioProfile::Aac);
    }

    #[test]
    fn multichannel_aac_is_aac_mult5() {
        assert_eq!(classify(&aac(6, 1_000_000, 2, 48000)), AudioProfile::AacMult5);
    }

    #[test]
    fn he_aac_object_type_is_unknown() {
        assert_eq!(classify(&aac(2, 128_000, 5, 44100)), AudioProfile::Unknown);
    }

    #[test]
    fn wma_bitrate_tiers() {
        let low = ProbedAudio {
            codec: Some(AudioCodec::WmaV1V2),
            bitrate_bps: Some(128_000),
            ..ProbedAudio::default()
        };
        assert_eq!(classify(&low), AudioProfile::WmaBase);
        let high = ProbedAudio {
            codec: Some(AudioCodec::WmaV1V2),
            bitrate_bps: Some(320_000),
            ..ProbedAudio::default()
        };
        assert_eq!(classify(&high), AudioProfile::WmaFull);
    }
}

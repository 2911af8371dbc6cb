//! The DIDL `Filter` argument: a comma-separated list of tokens that narrows
//! which optional attributes/elements the renderer emits, represented as a
//! 32-bit bitmap so that checking "should I emit X" is a single AND.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FilterMask(u32);

impl FilterMask {
    pub const RES: u32 = 1 << 0;
    pub const SIZE: u32 = 1 << 1;
    pub const DURATION: u32 = 1 << 2;
    pub const BITRATE: u32 = 1 << 3;
    pub const RESOLUTION: u32 = 1 << 4;
    pub const NR_AUDIO_CHANNELS: u32 = 1 << 5;
    pub const SAMPLE_FREQUENCY: u32 = 1 << 6;
    pub const DC_DATE: u32 = 1 << 7;
    pub const DC_CREATOR: u32 = 1 << 8;
    pub const DC_DESCRIPTION: u32 = 1 << 9;
    pub const UPNP_GENRE: u32 = 1 << 10;
    pub const UPNP_ARTIST: u32 = 1 << 11;
    pub const UPNP_ALBUM: u32 = 1 << 12;
    pub const UPNP_ORIGINAL_TRACK_NUMBER: u32 = 1 << 13;
    pub const UPNP_SEARCH_CLASS: u32 = 1 << 14;
    pub const UPNP_STORAGE_USED: u32 = 1 << 15;
    pub const REF_ID: u32 = 1 << 16;
    pub const DLNA_NAMESPACE: u32 = 1 << 17;
    pub const SEC_CAPTION_INFO_EX: u32 = 1 << 18;

    /// All standard (non-vendor) fields: everything except the Samsung
    /// `sec:CaptionInfoEx` vendor extension.
    const ALL_STANDARD: u32 = !0 & !Self::SEC_CAPTION_INFO_EX;

    pub fn all_standard() -> Self {
        FilterMask(Self::ALL_STANDARD)
    }

    pub fn has(&self, bit: u32) -> bool {
        self.0 & bit != 0
    }

    /// Parse a UPnP `Filter` string. `*`, empty, or missing means "all
    /// standard fields".
    pub fn parse(filter: &str) -> Self {
        let filter = filter.trim();
        if filter.is_empty() || filter == "*" {
            return Self::all_standard();
        }

        let mut mask = 0u32;
        for token in filter.split(',').map(str::trim) {
            mask |= match token {
                "res" => Self::RES,
                "res@size" | "@size" => Self::SIZE,
                "res@duration" | "@duration" => Self::DURATION,
                "res@bitrate" | "@bitrate" => Self::BITRATE,
                "res@resolution" | "@resolution" => Self::RESOLUTION,
                "res@nrAudioChannels" | "@nrAudioChannels" => Self::NR_AUDIO_CHANNELS,
                "res@sampleFrequency" | "@sampleFrequency" => Self::SAMPLE_FREQUENCY,
                "dc:date" => Self::DC_DATE,
                "dc:creator" => Self::DC_CREATOR,
                "dc:description" => Self::DC_DESCRIPTION,
                "upnp:genre" => Self::UPNP_GENRE,
                "upnp:artist" => Self::UPNP_ARTIST,
                "upnp:album" => Self::UPNP_ALBUM,
                "upnp:originalTrackNumber" => Self::UPNP_ORIGINAL_TRACK_NUMBER,
                "upnp:searchClass" => Self::UPNP_SEARCH_CLASS,
                "upnp:storageUsed" => Self::UPNP_STORAGE_USED,
                "@refID" => Self::REF_ID,
                "dlna" => Self::DLNA_NAMESPACE,
                "sec:CaptionInfoEx" => Self::SEC_CAPTION_INFO_EX,
                _ => 0,
            };
        }
        FilterMask(mask)
    }
}

impl Default for FilterMask {
    fn default() -> Self {
        Self::all_standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn star_means_all_standard() {
        let f = FilterMask::parse("*");
        assert!(f.has(FilterMask::RES));
        assert!(!f.has(FilterMask::SEC_CAPTION_INFO_EX));
    }

    #[test]
    fn empty_means_all_standard() {
        assert_eq!(FilterMask::parse(""), FilterMask::all_standard());
    }

    #[test]
    fn explicit_tokens_are_narrow() {
        let f = FilterMask::parse("res,dc:title,upnp:genre");
        assert!(f.has(FilterMask::RES));
        assert!(f.has(FilterMask::UPNP_GENRE));
        assert!(!f.has(FilterMask::UPNP_ARTIST));
    }

    #[test]
    fn vendor_extension_must_be_requested_explicitly() {
        let f = FilterMask::parse("sec:CaptionInfoEx");
        assert!(f.has(FilterMask::SEC_CAPTION_INFO_EX));
        assert!(!f.has(FilterMask::RES));
    }
}

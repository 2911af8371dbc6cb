//! DIDL-Lite rendering into a chunked, growable buffer.
//!
//! Output is entity-escaped once: a client reading the SOAP response
//! de-escapes once to get DIDL-Lite XML, and a second time (on the text
//! nodes within) to get display text. We never double-escape here.

use dms_core::{Detail, FilterMask, Object};

const CHUNK_SIZE: usize = 64 * 1024;
const LOW_WATERMARK: usize = 8 * 1024;

#[derive(Debug, thiserror::Error)]
#[error("DIDL response exceeded its capacity cap")]
pub struct BufferFull;

/// A response buffer that grows in fixed chunks and refuses to split a
/// partially-written element across a truncation boundary: callers append
/// whole elements via [`XmlBuf::element`], never raw fragments, so
/// truncation on cap overflow still leaves well-formed XML up to the last
/// complete element.
pub struct XmlBuf {
    data: String,
    cap: Option<usize>,
    truncated: bool,
}

impl XmlBuf {
    pub fn new() -> Self {
        XmlBuf {
            data: String::with_capacity(CHUNK_SIZE),
            cap: None,
            truncated: false,
        }
    }

    pub fn with_cap(cap: usize) -> Self {
        XmlBuf {
            data: String::with_capacity(CHUNK_SIZE.min(cap)),
            cap: Some(cap),
            truncated: false,
        }
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub fn into_string(self) -> String {
        self.data
    }

    pub fn as_str(&self) -> &str {
        &self.data
    }

    /// Append `fragment` as one atomic element. If it would exceed the cap,
    /// the buffer is marked truncated and the fragment is dropped, leaving
    /// prior output intact and well-formed.
    fn element(&mut self, fragment: &str) {
        if self.truncated {
            return;
        }
        if let Some(cap) = self.cap {
            if self.data.len() + fragment.len() > cap {
                self.truncated = true;
                tracing::warn!(cap, "DIDL response truncated at capacity");
                return;
            }
        }
        if self.data.capacity() - self.data.len() < LOW_WATERMARK {
            self.data.reserve(CHUNK_SIZE);
        }
        self.data.push_str(fragment);
    }
}

impl Default for XmlBuf {
    fn default() -> Self {
        Self::new()
    }
}

/// Escape the five XML-significant characters. Applied once to any text
/// that becomes element content or attribute value.
pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

fn extension_for_mime(mime: &str) -> &'static str {
    match mime {
        "video/x-msvideo" => "avi",
        "video/mpeg" => "mpg",
        "video/mp4" => "mp4",
        "video/x-ms-wmv" => "wmv",
        "video/x-matroska" => "mkv",
        "video/x-flv" => "flv",
        "video/quicktime" => "mov",
        "video/3gpp" => "3gp",
        "audio/mpeg" => "mp3",
        "audio/mp4" => "m4a",
        "audio/x-ms-wma" => "wma",
        "image/jpeg" => "jpg",
        "image/png" => "png",
        _ => "dat",
    }
}

pub fn media_url(base: &str, detail_id: i64, mime: &str) -> String {
    format!("{base}/MediaItems/{detail_id}.{}", extension_for_mime(mime))
}

/// Append the DIDL-Lite fragment for one `(Object, Detail?)` pair.
pub fn render_object(buf: &mut XmlBuf, base_url: &str, object: &Object, detail: Option<&Detail>, filter: FilterMask) {
    if object.is_container() {
        render_container(buf, object);
    } else {
        render_item(buf, base_url, object, detail, filter);
    }
}

fn render_container(buf: &mut XmlBuf, object: &Object) {
    let name = escape(&object.name);
    let id = escape(&object.object_id);
    let parent = escape(&object.parent_id);
    buf.element(&format!(
        "<container id=\"{id}\" parentID=\"{parent}\" restricted=\"1\" searchable=\"1\">\
<dc:title>{name}</dc:title><upnp:class>object.{class}</upnp:class></container>",
        class = escape(&object.class)
    ));
}

fn render_item(
    buf: &mut XmlBuf,
    base_url: &str,
    object: &Object,
    detail: Option<&Detail>,
    filter: FilterMask,
) {
    let id = escape(&object.object_id);
    let parent = escape(&object.parent_id);
    let title = detail
        .map(|d| d.title.as_str())
        .unwrap_or(&object.name);
    let title = escape(title);
    let class = escape(&object.class);

    let ref_attr = if filter.has(FilterMask::REF_ID) {
        object
            .ref_id
            .as_ref()
            .map(|r| format!(" refID=\"{}\"", escape(r)))
            .unwrap_or_default()
    } else {
        String::new()
    };

    let mut body = format!(
        "<item id=\"{id}\" parentID=\"{parent}\" restricted=\"1\"{ref_attr}><dc:title>{title}</dc:title>"
    );

    if let Some(detail) = detail {
        if filter.has(FilterMask::DC_CREATOR) {
            if let Some(v) = &detail.creator {
                body.push_str(&format!("<dc:creator>{}</dc:creator>", escape(v)));
            }
        }
        if filter.has(FilterMask::DC_DATE) {
            if let Some(v) = &detail.date {
                body.push_str(&format!("<dc:date>{}</dc:date>", escape(v)));
            }
        }
        if filter.has(FilterMask::DC_DESCRIPTION) {
            if let Some(v) = &detail.comment {
                body.push_str(&format!("<dc:description>{}</dc:description>", escape(v)));
            }
        }
        if filter.has(FilterMask::UPNP_GENRE) {
            if let Some(v) = &detail.genre {
                body.push_str(&format!("<upnp:genre>{}</upnp:genre>", escape(v)));
            }
        }
        if filter.has(FilterMask::UPNP_ARTIST) {
            if let Some(v) = &detail.artist {
                body.push_str(&format!("<upnp:artist>{}</upnp:artist>", escape(v)));
            }
        }
        if filter.has(FilterMask::UPNP_ALBUM) {
            if let Some(v) = &detail.album {
                body.push_str(&format!("<upnp:album>{}</upnp:album>", escape(v)));
            }
        }

        body.push_str(&format!("<upnp:class>object.{class}</upnp:class>"));

        if filter.has(FilterMask::RES) {
            if let Some(mime) = &detail.mime {
                let url = media_url(base_url, detail.id, mime);
                let mut res_attrs = String::new();
                if filter.has(FilterMask::SIZE) {
                    res_attrs.push_str(&format!(" size=\"{}\"", detail.size));
                }
                if filter.has(FilterMask::DURATION) {
                    if let Some(ms) = detail.duration_ms {
                        res_attrs.push_str(&format!(" duration=\"{}\"", format_duration(ms)));
                    }
                }
                if filter.has(FilterMask::BITRATE) {
                    if let Some(bps) = detail.bitrate_bps {
                        res_attrs.push_str(&format!(" bitrate=\"{bps}\""));
                    }
                }
                if filter.has(FilterMask::RESOLUTION) {
                    if let Some(res) = &detail.resolution {
                        res_attrs.push_str(&format!(" resolution=\"{}\"", escape(res)));
                    }
                }
                if filter.has(FilterMask::NR_AUDIO_CHANNELS) {
                    if let Some(ch) = detail.channels {
                        res_attrs.push_str(&format!(" nrAudioChannels=\"{ch}\""));
                    }
                }
                if filter.has(FilterMask::SAMPLE_FREQUENCY) {
                    if let Some(sr) = detail.sample_rate_hz {
                        res_attrs.push_str(&format!(" sampleFrequency=\"{sr}\""));
                    }
                }
                let protocol_info = protocol_info(mime, detail.dlna_profile.as_deref());
                body.push_str(&format!(
                    "<res protocolInfo=\"{protocol_info}\"{res_attrs}>{}</res>",
                    escape(&url)
                ));
            }
        }
    } else {
        body.push_str(&format!("<upnp:class>object.{class}</upnp:class>"));
    }

    body.push_str("</item>");
    buf.element(&body);
}

fn format_duration(ms: i64) -> String {
    let total_secs = ms / 1000;
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    let frac = ms % 1000;
    format!("{hours}:{minutes:02}:{seconds:02}.{frac:03}")
}

fn protocol_info(mime: &str, profile: Option<&str>) -> String {
    match profile {
        Some(p) => format!("http-get:*:{mime}:DLNA.ORG_PN={p}"),
        None => format!("http-get:*:{mime}:*"),
    }
}

/// Wrap one or more rendered fragments in the DIDL-Lite envelope.
pub fn wrap_didl(body: &str, include_dlna_namespace: bool) -> String {
    let dlna_ns = if include_dlna_namespace {
        " xmlns:dlna=\"urn:schemas-dlna-org:metadata-1-0/\""
    } else {
        ""
    };
    format!(
        "<DIDL-Lite xmlns=\"urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/\" \
xmlns:dc=\"http://purl.org/dc/elements/1.1/\" \
xmlns:upnp=\"urn:schemas-upnp-org:metadata-1-0/upnp/\"{dlna_ns}>{body}</DIDL-Lite>"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_all_five_entities() {
        assert_eq!(escape("<a&b>\"'"), "&lt;a&amp;b&gt;&quot;&apos;");
    }

    #[test]
    fn buffer_truncates_without_splitting_an_element() {
        let mut buf = XmlBuf::with_cap(10);
        buf.element("<item/>");
        buf.element("<item-that-does-not-fit/>");
        assert!(buf.is_truncated());
        assert_eq!(buf.as_str(), "<item/>");
    }

    #[test]
    fn container_renders_minimal_fields() {
        let mut buf = XmlBuf::new();
        let object = Object {
            object_id: "1$0".to_string(),
            parent_id: "1".to_string(),
            ref_id: None,
            class: "container.storageFolder".to_string(),
            name: "Movies".to_string(),
            detail_id: None,
        };
        render_container(&mut buf, &object);
        assert!(buf.as_str().contains("<dc:title>Movies</dc:title>"));
        assert!(buf.as_str().contains("object.container.storageFolder"));
    }

    #[test]
    fn item_emits_res_with_requested_attributes_only() {
        let object = Object {
            object_id: "1$0$A".to_string(),
            parent_id: "1$0".to_string(),
            ref_id: None,
            class: "item.videoItem".to_string(),
            name: "clip".to_string(),
            detail_id: Some(1),
        };
        let detail = Detail {
            id: 1,
            title: "clip".to_string(),
            mime: Some("video/mp4".to_string()),
            size: 123,
            duration_ms: Some(90_500),
            ..Detail::default()
        };
        let mut buf = XmlBuf::new();
        let filter = FilterMask::parse("res,res@size");
        render_item(&mut buf, "http://host:8200", &object, Some(&detail), filter);
        assert!(buf.as_str().contains("size=\"123\""));
        assert!(!buf.as_str().contains("duration="));
        assert!(buf.as_str().contains("/MediaItems/1.mp4"));
    }
}

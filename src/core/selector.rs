use crate::models::media::FormatRecord;

/// Markers matched (case-insensitively) against the `language` field when
/// hunting for a Portuguese audio track.
pub const PORTUGUESE_MARKERS: &[&str] = &["pt", "br", "portuguese"];

/// Last-resort format expression when even the generic fallback fails.
pub const BEST_EXPR: &str = "best";

/// Tunables for the format picker.
///
/// `min_height` defaults to `None`: any height up to `max_height`
/// qualifies. Passing `Some(720)` restricts the video pick to HD streams,
/// which some callers prefer.
#[derive(Debug, Clone)]
pub struct SelectionPolicy {
    pub max_height: u32,
    pub min_height: Option<u32>,
    pub language_markers: Vec<String>,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self {
            max_height: 1080,
            min_height: None,
            language_markers: PORTUGUESE_MARKERS.iter().map(|m| m.to_string()).collect(),
        }
    }
}

impl SelectionPolicy {
    /// Replaces the marker set with a single user-chosen language tag.
    pub fn with_language(mut self, language: &str) -> Self {
        self.language_markers = vec![language.trim().to_lowercase()];
        self
    }
}

/// A matched video-only + audio-only pair, borrowed from the format list.
#[derive(Debug)]
pub struct Selection<'a> {
    pub video: &'a FormatRecord,
    pub audio: &'a FormatRecord,
}

impl Selection<'_> {
    pub fn format_expr(&self) -> String {
        format!("{}+{}", self.video.format_id, self.audio.format_id)
    }
}

/// Generic expression used when no specific pair could be selected.
pub fn fallback_expr(max_height: u32) -> String {
    format!(
        "bestvideo[height<={h}]+bestaudio/best[height<={h}]",
        h = max_height
    )
}

pub fn is_video_only(f: &FormatRecord) -> bool {
    f.acodec.as_deref() == Some("none") && f.has_video()
}

pub fn is_audio_only(f: &FormatRecord) -> bool {
    f.vcodec.as_deref() == Some("none") && f.has_audio()
}

fn bitrate(f: &FormatRecord) -> f64 {
    f.abr.unwrap_or(0.0)
}

fn matches_language(f: &FormatRecord, markers: &[String]) -> bool {
    let Some(language) = f.language.as_deref() else {
        return false;
    };
    let language = language.to_lowercase();
    markers.iter().any(|m| language.contains(m.as_str()))
}

/// Best video-only format within the policy's height bounds: greater
/// height wins, and among equal heights a vcodec containing "av01" wins.
pub fn pick_video<'a>(
    formats: &'a [FormatRecord],
    policy: &SelectionPolicy,
) -> Option<&'a FormatRecord> {
    let floor = policy.min_height.unwrap_or(0);
    let candidates: Vec<&FormatRecord> = formats
        .iter()
        .filter(|f| is_video_only(f))
        .filter(|f| {
            f.height
                .map(|h| h >= floor && h <= policy.max_height)
                .unwrap_or(false)
        })
        .collect();

    let best_height = candidates.iter().filter_map(|f| f.height).max()?;
    let at_best = || candidates.iter().filter(|f| f.height == Some(best_height));

    at_best()
        .find(|f| {
            f.vcodec
                .as_deref()
                .map(|v| v.contains("av01"))
                .unwrap_or(false)
        })
        .or_else(|| at_best().next())
        .copied()
}

/// Best audio-only format: prefers tracks whose language matches a policy
/// marker, ranked by descending bitrate (missing bitrate counts as 0).
/// Without any marker match, the overall best-bitrate track is returned.
pub fn pick_audio<'a>(
    formats: &'a [FormatRecord],
    policy: &SelectionPolicy,
) -> Option<&'a FormatRecord> {
    let audios: Vec<&FormatRecord> = formats.iter().filter(|f| is_audio_only(f)).collect();

    let tagged: Vec<&FormatRecord> = audios
        .iter()
        .copied()
        .filter(|f| matches_language(f, &policy.language_markers))
        .collect();

    let pool = if tagged.is_empty() { &audios } else { &tagged };

    let mut best: Option<&FormatRecord> = None;
    for f in pool.iter().copied() {
        match best {
            Some(b) if bitrate(f) <= bitrate(b) => {}
            _ => best = Some(f),
        }
    }
    best
}

/// Pairs the video and audio picks. `None` means the caller should fall
/// back to a generic format expression, not that the operation failed.
pub fn select<'a>(
    formats: &'a [FormatRecord],
    policy: &SelectionPolicy,
) -> Option<Selection<'a>> {
    let video = pick_video(formats, policy)?;
    let audio = pick_audio(formats, policy)?;
    Some(Selection { video, audio })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video(id: &str, vcodec: &str, height: u32) -> FormatRecord {
        FormatRecord {
            format_id: id.to_string(),
            ext: "mp4".to_string(),
            vcodec: Some(vcodec.to_string()),
            acodec: Some("none".to_string()),
            height: Some(height),
            resolution: Some(format!("{}x{}", height * 16 / 9, height)),
            abr: None,
            language: None,
            format_note: None,
        }
    }

    fn audio(id: &str, language: Option<&str>, abr: Option<f64>) -> FormatRecord {
        FormatRecord {
            format_id: id.to_string(),
            ext: "m4a".to_string(),
            vcodec: Some("none".to_string()),
            acodec: Some("mp4a.40.2".to_string()),
            height: None,
            resolution: None,
            abr,
            language: language.map(|l| l.to_string()),
            format_note: None,
        }
    }

    #[test]
    fn video_prefers_higher_height_within_bound() {
        let formats = vec![video("v1", "avc1", 720), video("v2", "vp9", 1080)];
        let picked = pick_video(&formats, &SelectionPolicy::default()).unwrap();
        assert_eq!(picked.format_id, "v2");
    }

    #[test]
    fn video_above_max_height_is_excluded() {
        let formats = vec![video("v1", "vp9", 2160), video("v2", "avc1", 1080)];
        let picked = pick_video(&formats, &SelectionPolicy::default()).unwrap();
        assert_eq!(picked.format_id, "v2");
    }

    #[test]
    fn video_tie_break_prefers_av01() {
        let formats = vec![video("v1", "avc1.64002a", 1080), video("v2", "av01.0.08M.08", 1080)];
        let picked = pick_video(&formats, &SelectionPolicy::default()).unwrap();
        assert_eq!(picked.format_id, "v2");
    }

    #[test]
    fn video_without_height_is_skipped() {
        let mut no_height = video("v1", "avc1", 0);
        no_height.height = None;
        assert!(pick_video(&[no_height], &SelectionPolicy::default()).is_none());
    }

    #[test]
    fn video_min_height_bound_excludes_sd() {
        let formats = vec![video("v1", "avc1", 480), video("v2", "avc1", 720)];
        let policy = SelectionPolicy {
            min_height: Some(720),
            ..SelectionPolicy::default()
        };
        let picked = pick_video(&formats, &policy).unwrap();
        assert_eq!(picked.format_id, "v2");

        let only_sd = vec![video("v1", "avc1", 480)];
        assert!(pick_video(&only_sd, &policy).is_none());
    }

    #[test]
    fn video_bounds_are_inclusive() {
        let policy = SelectionPolicy {
            min_height: Some(720),
            ..SelectionPolicy::default()
        };
        let formats = vec![video("v1", "avc1", 720)];
        assert!(pick_video(&formats, &policy).is_some());
        let formats = vec![video("v1", "avc1", 1080)];
        assert!(pick_video(&formats, &policy).is_some());
    }

    #[test]
    fn video_ignores_muxed_and_audio_formats() {
        let mut muxed = video("v1", "avc1", 1080);
        muxed.acodec = Some("mp4a.40.2".to_string());
        let formats = vec![muxed, audio("a1", Some("pt-BR"), Some(128.0))];
        assert!(pick_video(&formats, &SelectionPolicy::default()).is_none());
    }

    #[test]
    fn audio_portuguese_marker_beats_higher_bitrate() {
        let formats = vec![
            audio("a1", Some("en"), Some(128.0)),
            audio("a2", Some("pt-BR"), Some(64.0)),
        ];
        let picked = pick_audio(&formats, &SelectionPolicy::default()).unwrap();
        assert_eq!(picked.format_id, "a2");
    }

    #[test]
    fn audio_ranks_by_bitrate_within_marker_set() {
        let formats = vec![
            audio("a1", Some("pt"), Some(48.0)),
            audio("a2", Some("pt-BR"), Some(128.0)),
            audio("a3", Some("en-US"), Some(160.0)),
        ];
        let picked = pick_audio(&formats, &SelectionPolicy::default()).unwrap();
        assert_eq!(picked.format_id, "a2");
    }

    #[test]
    fn audio_falls_back_to_best_bitrate_without_marker() {
        let formats = vec![
            audio("a1", Some("en"), Some(64.0)),
            audio("a2", Some("ja"), Some(128.0)),
            audio("a3", None, Some(96.0)),
        ];
        let picked = pick_audio(&formats, &SelectionPolicy::default()).unwrap();
        assert_eq!(picked.format_id, "a2");
    }

    #[test]
    fn audio_missing_bitrate_ranks_as_zero() {
        let formats = vec![
            audio("a1", Some("pt"), None),
            audio("a2", Some("pt-BR"), Some(48.0)),
        ];
        let picked = pick_audio(&formats, &SelectionPolicy::default()).unwrap();
        assert_eq!(picked.format_id, "a2");
    }

    #[test]
    fn audio_marker_match_is_case_insensitive() {
        let formats = vec![audio("a1", Some("PT-BR"), Some(48.0))];
        let picked = pick_audio(&formats, &SelectionPolicy::default()).unwrap();
        assert_eq!(picked.format_id, "a1");
    }

    #[test]
    fn audio_custom_language_marker() {
        let formats = vec![
            audio("a1", Some("pt-BR"), Some(128.0)),
            audio("a2", Some("es-419"), Some(64.0)),
        ];
        let policy = SelectionPolicy::default().with_language("es");
        let picked = pick_audio(&formats, &policy).unwrap();
        assert_eq!(picked.format_id, "a2");
    }

    #[test]
    fn selection_requires_both_streams() {
        let policy = SelectionPolicy::default();

        let only_video = vec![video("v1", "avc1", 1080)];
        assert!(select(&only_video, &policy).is_none());

        let only_audio = vec![audio("a1", Some("pt"), Some(128.0))];
        assert!(select(&only_audio, &policy).is_none());

        assert!(select(&[], &policy).is_none());

        let both = vec![video("v1", "avc1", 1080), audio("a1", Some("pt"), Some(128.0))];
        let sel = select(&both, &policy).unwrap();
        assert_eq!(sel.format_expr(), "v1+a1");
    }

    #[test]
    fn fallback_expr_carries_max_height() {
        assert_eq!(
            fallback_expr(1080),
            "bestvideo[height<=1080]+bestaudio/best[height<=1080]"
        );
        assert_eq!(
            fallback_expr(720),
            "bestvideo[height<=720]+bestaudio/best[height<=720]"
        );
    }
}

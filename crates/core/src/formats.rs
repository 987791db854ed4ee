// crates/core/src/formats.rs
//! Reduce the worker's raw format list to a short, user-facing menu.

use serde::Deserialize;
use std::collections::HashSet;

use crate::types::FormatOption;

/// Upper bound on the options returned, including the synthetic "best".
pub const MAX_FORMAT_OPTIONS: usize = 10;

/// One entry of the worker's `formats` array. Only the fields we use.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawFormat {
    pub format_id: Option<String>,
    pub height: Option<u32>,
    pub ext: Option<String>,
    pub filesize: Option<f64>,
    pub filesize_approx: Option<f64>,
    pub acodec: Option<String>,
    pub vcodec: Option<String>,
}

/// Build the format menu.
///
/// Entries without a height or extension are dropped, duplicates of the same
/// `{height}p-{ext}` are collapsed (first wins), the rest are sorted tallest
/// first and a synthetic "best" option is put in front.
pub fn simplify_formats(raw: &[RawFormat]) -> Vec<FormatOption> {
    let mut seen = HashSet::new();
    let mut options: Vec<(u32, FormatOption)> = Vec::new();

    for f in raw {
        let (Some(height), Some(ext)) = (f.height, f.ext.as_deref()) else {
            continue;
        };
        if !seen.insert(format!("{height}p-{ext}")) {
            continue;
        }
        options.push((
            height,
            FormatOption {
                format_id: f.format_id.clone().unwrap_or_default(),
                quality_label: format!("{height}p"),
                extension: ext.to_string(),
                approx_size_bytes: f.filesize.or(f.filesize_approx).map(|s| s as u64),
                has_audio: f.acodec.as_deref() != Some("none"),
                has_video: f.vcodec.as_deref() != Some("none"),
            },
        ));
    }

    // Stable sort keeps the worker's order within one height.
    options.sort_by(|a, b| b.0.cmp(&a.0));

    std::iter::once(best_option())
        .chain(options.into_iter().map(|(_, o)| o))
        .take(MAX_FORMAT_OPTIONS)
        .collect()
}

fn best_option() -> FormatOption {
    FormatOption {
        format_id: "best".to_string(),
        quality_label: "Best Quality".to_string(),
        extension: "mp4".to_string(),
        approx_size_bytes: None,
        has_audio: true,
        has_video: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn raw(id: &str, height: Option<u32>, ext: Option<&str>) -> RawFormat {
        RawFormat {
            format_id: Some(id.to_string()),
            height,
            ext: ext.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_best_always_first() {
        let out = simplify_formats(&[]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].format_id, "best");
        assert_eq!(out[0].quality_label, "Best Quality");
    }

    #[test]
    fn test_filters_dedupes_and_sorts() {
        let input = vec![
            raw("140", None, Some("m4a")),
            raw("18", Some(360), Some("mp4")),
            raw("137", Some(1080), Some("mp4")),
            raw("136", Some(720), Some("mp4")),
            raw("398", Some(720), Some("mp4")),
            raw("247", Some(720), Some("webm")),
            raw("x", Some(480), None),
        ];
        let ids: Vec<String> = simplify_formats(&input).into_iter().map(|f| f.format_id).collect();
        assert_eq!(ids, vec!["best", "137", "136", "247", "18"]);
    }

    #[test]
    fn test_codec_flags_and_size() {
        let input = vec![RawFormat {
            format_id: Some("137".into()),
            height: Some(1080),
            ext: Some("mp4".into()),
            filesize: None,
            filesize_approx: Some(1234.0),
            acodec: Some("none".into()),
            vcodec: Some("avc1".into()),
        }];
        let out = simplify_formats(&input);
        assert_eq!(out[1].approx_size_bytes, Some(1234));
        assert!(!out[1].has_audio);
        assert!(out[1].has_video);
    }

    #[test]
    fn test_capped_at_max() {
        let input: Vec<RawFormat> = (1..=30)
            .map(|h| raw(&h.to_string(), Some(h * 10), Some("mp4")))
            .collect();
        let out = simplify_formats(&input);
        assert_eq!(out.len(), MAX_FORMAT_OPTIONS);
        assert_eq!(out[1].quality_label, "300p");
    }
}

// crates/core/src/platform.rs
//! URL → platform name heuristic, used when the worker does not report an
//! extractor.

/// Guess the hosting platform from a URL.
pub fn detect_platform(url: &str) -> &'static str {
    if url.contains("youtube.com") || url.contains("youtu.be") {
        "YouTube"
    } else if url.contains("tiktok.com") {
        "TikTok"
    } else {
        "Unknown"
    }
}

//! Script detection used to route prompts.

/// CJK share above which page text is treated as Chinese.
pub const CJK_THRESHOLD: f64 = 0.3;

/// Prompt language chosen for a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    /// English marketing copy.
    English,
    /// Simplified Chinese marketing copy.
    Chinese,
}

/// Return true for Han ideographs, including the extension and compatibility blocks.
pub fn is_cjk(ch: char) -> bool {
    matches!(
        ch as u32,
        0x4E00..=0x9FFF
            | 0x3400..=0x4DBF
            | 0x20000..=0x2A6DF
            | 0x2A700..=0x2EBEF
            | 0xF900..=0xFAFF
            | 0x2F800..=0x2FA1F
    )
}

/// Share of non-whitespace characters that are CJK ideographs. Empty text yields `0.0`.
pub fn cjk_ratio(text: &str) -> f64 {
    let (cjk, total) = text
        .chars()
        .filter(|ch| !ch.is_whitespace())
        .fold((0usize, 0usize), |(cjk, total), ch| {
            (cjk + usize::from(is_cjk(ch)), total + 1)
        });
    if total == 0 {
        0.0
    } else {
        cjk as f64 / total as f64
    }
}

/// Chinese when the CJK ratio is strictly above [`CJK_THRESHOLD`], English otherwise.
pub fn detect_language(text: &str) -> Language {
    if cjk_ratio(text) > CJK_THRESHOLD {
        Language::Chinese
    } else {
        Language::English
    }
}

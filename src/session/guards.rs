//! Input checks run before anything is sent to the grader

use once_cell::sync::Lazy;
use regex::Regex;

static LATIN_LETTER: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z]").unwrap());

// Arabic, Arabic Supplement and Arabic Presentation Forms (covers Persian)
static ARABIC_SCRIPT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\u{0600}-\u{06FF}\u{0750}-\u{077F}\u{FB50}-\u{FDFF}\u{FE70}-\u{FEFF}]").unwrap()
});

/// True when the text is written in English letters only
pub fn is_english(text: &str) -> bool {
    LATIN_LETTER.is_match(text) && !ARABIC_SCRIPT.is_match(text)
}

/// Similarity of two strings in [0,1], `2 * matches / total_len`, where
/// matches is the longest common subsequence of the lowercased characters.
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.trim().to_lowercase().chars().collect();
    let b: Vec<char> = b.trim().to_lowercase().chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }

    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for ca in &a {
        for (j, cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                curr[j].max(prev[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    2.0 * prev[b.len()] as f64 / total as f64
}

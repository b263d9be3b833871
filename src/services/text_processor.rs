// Text Processing Service
// Word windows for oracle scoring plus the sentence statistics used by stylometry

use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

use crate::models::Chunk;

/// Added to the mean sentence length so single-word documents never divide by zero.
const BURSTINESS_EPSILON: f64 = 1e-6;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChunkError {
    #[error("window size must be positive")]
    EmptyWindow,
    #[error("overlap ({overlap}) must be smaller than window size ({window_size})")]
    OverlapTooLarge { window_size: usize, overlap: usize },
}

fn space_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\u{3000}\u{00A0}]").expect("space regex"))
}

fn horizontal_ws_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[ \t\x0C\x0B]+").expect("whitespace regex"))
}

fn sentence_end_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[.!?]+").expect("sentence regex"))
}

/// Normalize punctuation and whitespace of extracted document text
pub fn normalize_punctuation(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let mut s = text
        .replace(['\u{201c}', '\u{201d}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace('\u{2014}', "-");

    // Ideographic and non-breaking spaces
    s = space_re().replace_all(&s, " ").to_string();

    s = s.replace("\r\n", "\n").replace('\r', "\n");
    s = horizontal_ws_re().replace_all(&s, " ").to_string();

    s.lines()
        .map(|ln| ln.trim())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Whitespace-delimited words of `text`
pub fn split_words(text: &str) -> Vec<&str> {
    text.split_whitespace().collect()
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Split text into overlapping word windows.
///
/// Documents of at most `window_size` words come back as a single chunk holding
/// the trimmed text verbatim. Longer documents are cut into windows of
/// `window_size` words, each starting `window_size - overlap` words after the
/// previous one; the last window is truncated at the final word.
pub fn chunk_words(text: &str, window_size: usize, overlap: usize) -> Result<Vec<Chunk>, ChunkError> {
    if window_size == 0 {
        return Err(ChunkError::EmptyWindow);
    }
    if overlap >= window_size {
        return Err(ChunkError::OverlapTooLarge { window_size, overlap });
    }

    let words = split_words(text);
    let n = words.len();
    if n == 0 {
        return Ok(Vec::new());
    }

    if n <= window_size {
        return Ok(vec![Chunk {
            index: 0,
            text: text.trim().to_string(),
            start: 0,
            end: n,
        }]);
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;
    loop {
        let end = (start + window_size).min(n);
        chunks.push(Chunk {
            index: chunks.len(),
            text: words[start..end].join(" "),
            start,
            end,
        });
        if end == n {
            break;
        }
        start = end - overlap;
    }

    Ok(chunks)
}

/// Sentences split on terminal punctuation (`.`, `!`, `?`), blank pieces dropped
pub fn split_terminal_sentences(text: &str) -> Vec<&str> {
    sentence_end_re()
        .split(text)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Coefficient of variation of sentence word counts.
///
/// Returns 0.0 when the text holds no sentence.
pub fn compute_burstiness(text: &str) -> f64 {
    let lengths: Vec<f64> = split_terminal_sentences(text)
        .iter()
        .map(|s| word_count(s) as f64)
        .collect();
    if lengths.is_empty() {
        return 0.0;
    }

    let mean = lengths.iter().sum::<f64>() / lengths.len() as f64;
    std_dev(&lengths, mean) / (mean + BURSTINESS_EPSILON)
}

fn std_dev(values: &[f64], mean: f64) -> f64 {
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered_words(n: usize) -> String {
        (0..n).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn test_normalize_punctuation() {
        let input = "Hello\u{201c}World\u{201d}";
        let output = normalize_punctuation(input);
        assert_eq!(output, "Hello\"World\"");
    }

    #[test]
    fn test_normalize_collapses_whitespace() {
        let input = "  first\u{00A0}line \t here\r\nsecond\u{2014}line  ";
        assert_eq!(normalize_punctuation(input), "first line here\nsecond-line");
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        let text = "  A short note,\n written quickly.  ";
        let chunks = chunk_words(text, 300, 60).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "A short note,\n written quickly.");
        assert_eq!((chunks[0].start, chunks[0].end), (0, 5));
    }

    #[test]
    fn test_exact_window_is_single_chunk() {
        let chunks = chunk_words(&numbered_words(300), 300, 60).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].end, 300);
    }

    #[test]
    fn test_empty_text_has_no_chunks() {
        assert!(chunk_words("   \n\t ", 300, 60).unwrap().is_empty());
    }

    #[test]
    fn test_long_text_windows_overlap() {
        let text = numbered_words(1000);
        let chunks = chunk_words(&text, 300, 60).unwrap();

        let bounds: Vec<(usize, usize)> = chunks.iter().map(|c| (c.start, c.end)).collect();
        assert_eq!(bounds, vec![(0, 300), (240, 540), (480, 780), (720, 1000)]);
        for pair in chunks.windows(2) {
            assert_eq!(pair[0].end - pair[1].start, 60);
        }
        assert_eq!(chunks.last().unwrap().end, 1000);
        assert!(chunks.last().unwrap().text.ends_with("w999"));
        assert!(chunks.iter().all(|c| c.word_count() > 0));
    }

    #[test]
    fn test_chunks_reconstruct_word_sequence() {
        let text = numbered_words(777);
        let chunks = chunk_words(&text, 128, 17).unwrap();

        let mut rebuilt: Vec<String> = Vec::new();
        let mut covered = 0usize;
        for chunk in &chunks {
            let words: Vec<&str> = chunk.text.split_whitespace().collect();
            let skip = covered - chunk.start;
            rebuilt.extend(words[skip..].iter().map(|w| w.to_string()));
            covered = chunk.end;
        }
        let original: Vec<String> = split_words(&text).iter().map(|w| w.to_string()).collect();
        assert_eq!(rebuilt, original);
    }

    #[test]
    fn test_chunking_is_deterministic() {
        let text = numbered_words(650);
        assert_eq!(chunk_words(&text, 200, 50).unwrap(), chunk_words(&text, 200, 50).unwrap());
    }

    #[test]
    fn test_invalid_window_rejected() {
        assert_eq!(chunk_words("a b", 0, 0), Err(ChunkError::EmptyWindow));
        assert_eq!(
            chunk_words("a b", 10, 10),
            Err(ChunkError::OverlapTooLarge { window_size: 10, overlap: 10 })
        );
    }

    #[test]
    fn test_split_terminal_sentences() {
        let sentences = split_terminal_sentences("One two. Three four five!! Six? ... ");
        assert_eq!(sentences, vec!["One two", "Three four five", "Six"]);
    }

    #[test]
    fn test_burstiness_uniform_sentences_is_zero() {
        let b = compute_burstiness("One two three. Four five six. Seven eight nine.");
        assert!(b.abs() < 1e-9);
    }

    #[test]
    fn test_burstiness_varied_sentences() {
        // lengths 1 and 3: mean 2, population std 1
        let b = compute_burstiness("Short. Much longer sentence.");
        assert!((b - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_burstiness_without_sentences() {
        assert_eq!(compute_burstiness("?!..."), 0.0);
        assert_eq!(compute_burstiness(""), 0.0);
    }
}

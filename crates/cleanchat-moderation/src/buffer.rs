//! Rolling transcript buffer.
//!
//! Holds the trailing words of a user's speech so the classifier sees some
//! context, plus a cadence counter that throttles LLM explanations.

/// Return the last `n` whitespace-separated words of `s`.
///
/// When `s` has at most `n` words it is returned unchanged, spacing
/// included; otherwise the kept words are joined with single spaces.
pub fn keep_last_words(s: &str, n: usize) -> String {
    let words: Vec<&str> = s.split_whitespace().collect();
    if words.len() <= n {
        return s.to_owned();
    }
    words[words.len() - n..].join(" ")
}

#[derive(Debug, Clone)]
pub struct TranscriptBuffer {
    text: String,
    counter: u32,
    window_words: usize,
    interval: u32,
}

impl TranscriptBuffer {
    pub fn new(window_words: usize, interval: u32) -> Self {
        Self {
            text: String::new(),
            counter: 0,
            window_words,
            interval,
        }
    }

    /// Append a fragment verbatim and advance the cadence counter.
    pub fn append(&mut self, fragment: &str) {
        self.text.push_str(fragment);

        if self.counter >= self.interval {
            self.counter = 0;
        }
        self.counter += 1;

        self.text = keep_last_words(&self.text, self.window_words);
    }

    /// True once `interval` fragments were appended since the last reset.
    pub fn analysis_due(&self) -> bool {
        self.counter >= self.interval
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn clear(&mut self) {
        self.text.clear();
    }
}

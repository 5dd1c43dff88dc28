//! Best-effort decoding of machine reports.
//!
//! Reports come from different controllers and editors, so the encoding is
//! guessed per file. Decoding never fails: a weak guess falls back to UTF-8
//! and bytes that cannot be decoded are dropped.

use encoding_rs::{Encoding, UTF_8};

/// Guesses below this confidence are replaced by UTF-8.
pub const MIN_CONFIDENCE: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncodingGuess {
    pub encoding: &'static Encoding,
    /// 0.0 (no idea) to 1.0 (certain).
    pub confidence: f32,
}

/// Capability that guesses the encoding of a byte buffer.
pub trait EncodingDetector: Send + Sync {
    fn guess_encoding(&self, bytes: &[u8]) -> EncodingGuess;
}

/// BOM sniffing and UTF-8 validation, then statistical detection of legacy
/// code pages.
///
/// The region is a country-code hint: controllers in Poland write
/// windows-1250, where the same bytes in windows-1252 would read as symbols.
#[derive(Debug, Clone, Default)]
pub struct HeuristicDetector {
    region: Option<String>,
}

impl HeuristicDetector {
    /// A detector without a region hint.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_region(region: Option<&str>) -> Self {
        Self {
            region: region
                .filter(|r| !r.is_empty())
                .map(str::to_ascii_lowercase),
        }
    }

    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }
}

impl EncodingDetector for HeuristicDetector {
    fn guess_encoding(&self, bytes: &[u8]) -> EncodingGuess {
        let guess = |encoding, confidence| EncodingGuess {
            encoding,
            confidence,
        };

        if let Some((encoding, _)) = Encoding::for_bom(bytes) {
            return guess(encoding, 1.0);
        }
        if bytes.is_empty() {
            return guess(UTF_8, 0.0);
        }
        if std::str::from_utf8(bytes).is_ok() {
            return if bytes.is_ascii() {
                guess(UTF_8, 0.9)
            } else {
                guess(UTF_8, 0.99)
            };
        }

        let mut detector = chardetng::EncodingDetector::new();
        detector.feed(bytes, true);
        let encoding = detector.guess(self.region.as_deref().map(str::as_bytes), false);

        // Binary noise is not worth a code-page guess.
        let control = bytes
            .iter()
            .filter(|&&b| b < 0x20 && !matches!(b, b'\n' | b'\r' | b'\t'))
            .count();
        if control * 10 < bytes.len() {
            guess(encoding, 0.6)
        } else {
            guess(encoding, 0.2)
        }
    }
}

/// Decodes `bytes` with `encoding`, dropping anything undecodable. A BOM
/// matching `encoding` is removed.
pub fn decode_with(bytes: &[u8], encoding: &'static Encoding) -> String {
    let (text, had_errors) = encoding.decode_with_bom_removal(bytes);
    if had_errors {
        text.chars()
            .filter(|&c| c != char::REPLACEMENT_CHARACTER)
            .collect()
    } else {
        text.into_owned()
    }
}

/// Decodes report bytes using `detector`, falling back to UTF-8 when the
/// guess is weak. Always returns text.
pub fn decode_report(bytes: &[u8], detector: &dyn EncodingDetector) -> (String, EncodingGuess) {
    let mut guess = detector.guess_encoding(bytes);
    if guess.confidence < MIN_CONFIDENCE {
        log::debug!(
            "Weak encoding guess {} ({:.2}), using {}",
            guess.encoding.name(),
            guess.confidence,
            UTF_8.name()
        );
        guess.encoding = UTF_8;
    }
    (decode_with(bytes, guess.encoding), guess)
}

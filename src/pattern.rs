use fancy_regex::Regex;
use rand::Rng;
use regex_syntax::hir::{Class, ClassUnicode, ClassUnicodeRange, Hir, HirKind};

const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Extra repetitions allowed past the minimum of an open-ended quantifier.
const OPEN_REPEAT: u32 = 8;
const MATCH_ATTEMPTS: usize = 32;
const AVOID_ATTEMPTS_PER_LENGTH: usize = 16;
const LOOKAROUND_OPENERS: [&str; 4] = ["(?=", "(?!", "(?<=", "(?<!"];

/// Random alphanumeric filler of exactly `len` characters.
pub fn alphanumeric<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    (0..len)
        .map(|_| CHARSET[rng.random_range(0..CHARSET.len())] as char)
        .collect()
}

/// A compiled pattern that can produce strings matching it or avoiding it.
///
/// Candidates are drawn from the pattern with its look-around groups removed
/// and then checked against the full pattern, look-around included.
#[derive(Debug, Clone)]
pub struct Pattern {
    regex: Regex,
    hir: Hir,
}

impl Pattern {
    pub fn new(pattern: &str) -> Result<Self, String> {
        let regex = Regex::new(pattern).map_err(|e| e.to_string())?;
        let hir = regex_syntax::parse(&strip_lookaround(pattern)).map_err(|e| e.to_string())?;
        Ok(Self { regex, hir })
    }

    /// A pattern matching `text` literally.
    pub fn literal(text: &str) -> Result<Self, String> {
        Self::new(&regex::escape(text))
    }

    /// False also when the backtracking engine gives up on `text`.
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text).unwrap_or(false)
    }

    /// A string the pattern matches, or `None` if sampling kept failing.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<String> {
        for _ in 0..MATCH_ATTEMPTS {
            let mut out = String::new();
            if !emit(&self.hir, rng, &mut out) {
                return None;
            }
            if self.is_match(&out) {
                return Some(out);
            }
        }
        None
    }

    /// An alphanumeric string of at most `max_len` characters that the
    /// pattern matches nowhere. Shorter strings are tried as longer ones keep
    /// matching; `None` only when even the empty string matches.
    pub fn sample_avoiding<R: Rng + ?Sized>(&self, rng: &mut R, max_len: usize) -> Option<String> {
        let mut len = max_len;
        loop {
            for _ in 0..AVOID_ATTEMPTS_PER_LENGTH {
                let candidate = alphanumeric(rng, len);
                if let Ok(false) = self.regex.is_match(&candidate) {
                    return Some(candidate);
                }
                if len == 0 {
                    return None;
                }
            }
            len /= 2;
        }
    }
}

/// `pattern` without its look-ahead and look-behind groups.
fn strip_lookaround(pattern: &str) -> String {
    let bytes = pattern.as_bytes();
    let mut out = String::with_capacity(pattern.len());
    let mut at = 0;
    while at < bytes.len() {
        let rest = &pattern[at..];
        if LOOKAROUND_OPENERS.iter().any(|opener| rest.starts_with(opener)) {
            at += group_len(&bytes[at..]);
            continue;
        }
        let len = match bytes[at] {
            b'\\' => 1 + rest[1..].chars().next().map_or(0, char::len_utf8),
            b'[' => class_len(&bytes[at..]),
            _ => rest.chars().next().map_or(1, char::len_utf8),
        };
        out.push_str(&rest[..len]);
        at += len;
    }
    out
}

/// Byte length of the bracketed class starting at `bytes[0]`, nested classes included.
fn class_len(bytes: &[u8]) -> usize {
    let mut depth = 0usize;
    let mut at = 0;
    while at < bytes.len() {
        match bytes[at] {
            b'\\' => at += 1,
            b'[' => {
                depth += 1;
                // a `]` right after the opener (or its negation) is a literal
                at += 1;
                if bytes.get(at) == Some(&b'^') {
                    at += 1;
                }
                if bytes.get(at) == Some(&b']') {
                    at += 1;
                }
                continue;
            }
            b']' => {
                depth -= 1;
                if depth == 0 {
                    return at + 1;
                }
            }
            _ => {}
        }
        at += 1;
    }
    bytes.len()
}

/// Byte length of the parenthesised group starting at `bytes[0]`.
fn group_len(bytes: &[u8]) -> usize {
    let mut depth = 0usize;
    let mut at = 0;
    while at < bytes.len() {
        match bytes[at] {
            b'\\' => at += 1,
            b'[' => {
                at += class_len(&bytes[at..]);
                continue;
            }
            b'(' => depth += 1,
            b')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return at + 1;
                }
            }
            _ => {}
        }
        at += 1;
    }
    bytes.len()
}

/// Append one random expansion of `hir` to `out`. False if some class is empty.
fn emit<R: Rng + ?Sized>(hir: &Hir, rng: &mut R, out: &mut String) -> bool {
    match hir.kind() {
        HirKind::Empty | HirKind::Look(_) => true,
        HirKind::Literal(literal) => {
            out.push_str(&String::from_utf8_lossy(&literal.0));
            true
        }
        HirKind::Class(Class::Unicode(class)) => match pick_unicode(class, rng) {
            Some(c) => {
                out.push(c);
                true
            }
            None => false,
        },
        HirKind::Class(Class::Bytes(class)) => {
            let ascii: Vec<u8> = class
                .ranges()
                .iter()
                .flat_map(|range| range.start()..=range.end())
                .filter(u8::is_ascii)
                .collect();
            if ascii.is_empty() {
                return false;
            }
            out.push(ascii[rng.random_range(0..ascii.len())] as char);
            true
        }
        HirKind::Repetition(repetition) => {
            let max = repetition.max.unwrap_or(repetition.min + OPEN_REPEAT);
            let count = rng.random_range(repetition.min..=max.max(repetition.min));
            (0..count).all(|_| emit(&repetition.sub, rng, out))
        }
        HirKind::Capture(capture) => emit(&capture.sub, rng, out),
        HirKind::Concat(parts) => parts.iter().all(|part| emit(part, rng, out)),
        HirKind::Alternation(branches) => {
            let branch = &branches[rng.random_range(0..branches.len())];
            emit(branch, rng, out)
        }
    }
}

/// Pick a character from `class`, preferring printable ASCII members.
fn pick_unicode<R: Rng + ?Sized>(class: &ClassUnicode, rng: &mut R) -> Option<char> {
    let mut printable = class.clone();
    printable.intersect(&ClassUnicode::new([ClassUnicodeRange::new(' ', '~')]));
    let class = if printable.ranges().is_empty() { class } else { &printable };

    let total: u32 = class
        .ranges()
        .iter()
        .map(|range| range.end() as u32 - range.start() as u32 + 1)
        .sum();
    if total == 0 {
        return None;
    }
    let mut offset = rng.random_range(0..total);
    for range in class.ranges() {
        let width = range.end() as u32 - range.start() as u32 + 1;
        if offset < width {
            return Some(char::from_u32(range.start() as u32 + offset).unwrap_or(range.start()));
        }
        offset -= width;
    }
    None
}

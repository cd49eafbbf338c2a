// SPDX-License-Identifier: GPL-3.0-only

//! ISBN checksum validation
//!
//! Pure functions only — no camera or streaming state. Safe to call from any
//! thread, including blocking analysis tasks.
//!
//! Two identifier shapes are accepted:
//! - ISBN-10: weighted sum Σ (i+1)·dᵢ over all ten positions, where a
//!   terminal `X` counts as 10; valid iff the sum is divisible by 11.
//! - ISBN-13: must carry the `978`/`979` bookland prefix; alternating 1/3
//!   weights over the first twelve digits produce the check digit.
//!
//! A payload that decodes cleanly but fits neither shape is rejected, never
//! guessed at.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier kind determined during validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IsbnKind {
    /// Ten-digit identifier, mod-11 checksum
    Isbn10,
    /// Thirteen-digit identifier, mod-10 checksum with 978/979 prefix
    Isbn13,
}

impl fmt::Display for IsbnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IsbnKind::Isbn10 => write!(f, "ISBN-10"),
            IsbnKind::Isbn13 => write!(f, "ISBN-13"),
        }
    }
}

/// A successfully validated identifier
///
/// Created only by [`validate`]; never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedIsbn {
    /// Digits only (plus a possible terminal `X` for ISBN-10)
    pub normalized: String,
    /// Human-formatted rendering with fixed dash grouping
    pub display: String,
    /// Which checksum rule matched
    pub kind: IsbnKind,
}

/// Rejection reasons from [`validate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    /// Cleaned payload was neither 10 nor 13 characters
    BadLength(usize),
    /// `X` appeared anywhere other than the final position of a 10-digit code
    BadCharacter,
    /// 13-digit payload without a 978/979 prefix
    BadPrefix,
    /// Digits are well-formed but the checksum does not hold
    ChecksumMismatch,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::BadLength(len) => write!(f, "bad length: {} significant chars", len),
            ValidationError::BadCharacter => write!(f, "check symbol X in illegal position"),
            ValidationError::BadPrefix => write!(f, "missing 978/979 prefix"),
            ValidationError::ChecksumMismatch => write!(f, "checksum mismatch"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validate a raw decoded payload as an ISBN-10 or ISBN-13.
///
/// Strips everything except decimal digits and the terminal check symbol
/// `X`/`x`, dispatches on the cleaned length, and verifies the matching
/// checksum rule.
pub fn validate(raw: &str) -> Result<ValidatedIsbn, ValidationError> {
    let cleaned: String = raw
        .chars()
        .filter_map(|c| match c {
            '0'..='9' => Some(c),
            'X' | 'x' => Some('X'),
            _ => None,
        })
        .collect();

    // X is the mod-11 value "10" and only legal as the last of ten chars
    if let Some(pos) = cleaned.find('X')
        && (cleaned.len() != 10 || pos != 9)
    {
        return Err(ValidationError::BadCharacter);
    }

    match cleaned.len() {
        10 => validate_isbn10(&cleaned),
        13 => validate_isbn13(&cleaned),
        other => Err(ValidationError::BadLength(other)),
    }
}

fn validate_isbn10(digits: &str) -> Result<ValidatedIsbn, ValidationError> {
    let sum: u32 = digits
        .bytes()
        .enumerate()
        .map(|(i, b)| {
            let value = if b == b'X' { 10 } else { u32::from(b - b'0') };
            (i as u32 + 1) * value
        })
        .sum();

    if sum % 11 != 0 {
        return Err(ValidationError::ChecksumMismatch);
    }

    Ok(ValidatedIsbn {
        normalized: digits.to_string(),
        display: dash_format(digits, &[1, 4, 4, 1]),
        kind: IsbnKind::Isbn10,
    })
}

fn validate_isbn13(digits: &str) -> Result<ValidatedIsbn, ValidationError> {
    if !digits.starts_with("978") && !digits.starts_with("979") {
        return Err(ValidationError::BadPrefix);
    }

    let values: Vec<u32> = digits.bytes().map(|b| u32::from(b - b'0')).collect();
    let sum: u32 = values[..12]
        .iter()
        .enumerate()
        .map(|(i, d)| d * if i % 2 == 0 { 1 } else { 3 })
        .sum();
    let check = (10 - sum % 10) % 10;

    if check != values[12] {
        return Err(ValidationError::ChecksumMismatch);
    }

    Ok(ValidatedIsbn {
        normalized: digits.to_string(),
        display: dash_format(digits, &[3, 1, 4, 4, 1]),
        kind: IsbnKind::Isbn13,
    })
}

/// Insert dashes between fixed-width groups (groups must cover the string)
fn dash_format(digits: &str, groups: &[usize]) -> String {
    let mut out = String::with_capacity(digits.len() + groups.len());
    let mut rest = digits;
    for (i, &width) in groups.iter().enumerate() {
        if i > 0 {
            out.push('-');
        }
        let (head, tail) = rest.split_at(width);
        out.push_str(head);
        rest = tail;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_known_isbn13() {
        let v = validate("9780141036144").expect("valid ISBN-13");
        assert_eq!(v.kind, IsbnKind::Isbn13);
        assert_eq!(v.normalized, "9780141036144");
        assert_eq!(v.display, "978-0-1410-3614-4");
    }

    #[test]
    fn accepts_known_isbn10() {
        let v = validate("0141036141").expect("valid ISBN-10");
        assert_eq!(v.kind, IsbnKind::Isbn10);
        assert_eq!(v.display, "0-1410-3614-1");
    }

    #[test]
    fn accepts_isbn10_with_check_symbol() {
        let v = validate("097522980X").expect("X check symbol is worth 10");
        assert_eq!(v.kind, IsbnKind::Isbn10);
        assert_eq!(v.normalized, "097522980X");
    }

    #[test]
    fn rejects_corrupted_check_digit() {
        assert_eq!(
            validate("9780141036145"),
            Err(ValidationError::ChecksumMismatch)
        );
    }

    #[test]
    fn rejects_bad_lengths() {
        assert_eq!(validate(""), Err(ValidationError::BadLength(0)));
        assert_eq!(validate("12345"), Err(ValidationError::BadLength(5)));
        assert_eq!(
            validate("97801410361440"),
            Err(ValidationError::BadLength(14))
        );
    }

    #[test]
    fn rejects_13_digit_code_without_bookland_prefix() {
        // Valid EAN-13 checksum, but not a book identifier
        assert_eq!(validate("4006381333931"), Err(ValidationError::BadPrefix));
    }

    #[test]
    fn rejects_misplaced_check_symbol() {
        assert_eq!(validate("0X41036141"), Err(ValidationError::BadCharacter));
        assert_eq!(validate("978014103614X"), Err(ValidationError::BadCharacter));
    }

    #[test]
    fn strips_formatting_noise() {
        let v = validate("978-0-14-103614-4").expect("dashes are stripped");
        assert_eq!(v.normalized, "9780141036144");
        let v = validate(" 0 141 03614 1 ").expect("spaces are stripped");
        assert_eq!(v.kind, IsbnKind::Isbn10);
    }

    /// Deterministic pseudo-random digits for the generated corpus
    fn lcg_digits(seed: &mut u64, count: usize) -> Vec<u32> {
        (0..count)
            .map(|_| {
                *seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                ((*seed >> 33) % 10) as u32
            })
            .collect()
    }

    fn isbn13_with_valid_check(body: &[u32]) -> String {
        let sum: u32 = body
            .iter()
            .enumerate()
            .map(|(i, d)| d * if i % 2 == 0 { 1 } else { 3 })
            .sum();
        let check = (10 - sum % 10) % 10;
        let mut s: String = body.iter().map(|d| char::from(b'0' + *d as u8)).collect();
        s.push(char::from(b'0' + check as u8));
        s
    }

    #[test]
    fn generated_isbn13_corpus_round_trips() {
        let mut seed = 0x5eed;
        for _ in 0..200 {
            let mut body = vec![9, 7, if seed % 2 == 0 { 8 } else { 9 }];
            body.extend(lcg_digits(&mut seed, 9));
            let code = isbn13_with_valid_check(&body);
            let v = validate(&code).expect("generated checksum must hold");
            assert_eq!(v.kind, IsbnKind::Isbn13);
            assert_eq!(v.normalized, code);
        }
    }

    #[test]
    fn single_digit_corruption_is_always_caught() {
        let mut seed = 0xb00c;
        for _ in 0..50 {
            let mut body = vec![9, 7, 8];
            body.extend(lcg_digits(&mut seed, 9));
            let code = isbn13_with_valid_check(&body);
            for pos in 0..13 {
                let mut bytes = code.clone().into_bytes();
                bytes[pos] = b'0' + ((bytes[pos] - b'0' + 1) % 10);
                let corrupted = String::from_utf8(bytes).unwrap();
                assert!(
                    validate(&corrupted).is_err(),
                    "corruption at {} of {} slipped through",
                    pos,
                    code
                );
            }
        }
    }

    #[test]
    fn generated_isbn10_corpus_round_trips() {
        let mut seed = 0x1541;
        for _ in 0..200 {
            let body = lcg_digits(&mut seed, 9);
            let sum: u32 = body.iter().enumerate().map(|(i, d)| (i as u32 + 1) * d).sum();
            let check = sum % 11;
            let mut s: String = body.iter().map(|d| char::from(b'0' + *d as u8)).collect();
            if check == 10 {
                s.push('X');
            } else {
                s.push(char::from(b'0' + check as u8));
            }
            let v = validate(&s).expect("generated ISBN-10 checksum must hold");
            assert_eq!(v.kind, IsbnKind::Isbn10);
        }
    }
}

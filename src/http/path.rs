//! Percent-decoding and dot-segment normalization for request paths and
//! `application/x-www-form-urlencoded` query fragments.
//!
//! This is the one piece of wire handling the teacher codebase explicitly opted out
//! of (its zero-copy `Url` type documents "no decoder support... due to zero-copy &
//! zero-alloc"). Once path/query storage is owned instead of borrowed from the
//! connection's reused read buffer, decoding becomes a straightforward allocation.

/// Decodes `%HH` escapes in `src` into their raw byte. A malformed escape (missing or
/// non-hex digits) is passed through literally — the `%` and the one or two
/// characters that follow are copied as-is, matching the wire parser's tolerance for
/// garbage percent sequences rather than failing the whole request over them.
pub(crate) fn percent_decode(src: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(src.len());
    let mut i = 0;
    while i < src.len() {
        if src[i] == b'%' {
            let hex = src.get(i + 1..i + 3).and_then(|pair| {
                let hi = hex_digit(pair[0])?;
                let lo = hex_digit(pair[1])?;
                Some(hi * 16 + lo)
            });
            match hex {
                Some(byte) => {
                    out.push(byte);
                    i += 3;
                }
                None => {
                    out.push(src[i]);
                    i += 1;
                }
            }
        } else {
            out.push(src[i]);
            i += 1;
        }
    }
    out
}

/// Like [`percent_decode`], but first replaces `+` with a literal space — the
/// `application/x-www-form-urlencoded` convention used by query strings.
pub(crate) fn percent_decode_form(src: &[u8]) -> Vec<u8> {
    let swapped: Vec<u8> = src.iter().map(|&b| if b == b'+' { b' ' } else { b }).collect();
    percent_decode(&swapped)
}

fn hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Splits `decoded` on `/`, drops empty and `.` segments, and pops the stack on `..`.
/// Returns `Err(())` if a `..` would pop an already-empty stack (the path would
/// escape its root). The result is always either `/` or `/`-prefixed, `/`-joined
/// segments — it can never contain an empty, `.`, or `..` segment.
pub(crate) fn normalize(decoded: &[u8]) -> Result<String, ()> {
    let text = String::from_utf8_lossy(decoded);
    let mut stack: Vec<&str> = Vec::new();

    for segment in text.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                if stack.pop().is_none() {
                    return Err(());
                }
            }
            other => stack.push(other),
        }
    }

    if stack.is_empty() {
        Ok("/".to_string())
    } else {
        Ok(format!("/{}", stack.join("/")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_valid_escapes() {
        assert_eq!(percent_decode(b"hello%20world"), b"hello world");
        assert_eq!(percent_decode(b"%2Fa%2Fb"), b"/a/b");
    }

    #[test]
    fn passes_through_malformed_escapes_literally() {
        assert_eq!(percent_decode(b"100%"), b"100%");
        assert_eq!(percent_decode(b"100%2"), b"100%2");
        assert_eq!(percent_decode(b"100%zz"), b"100%zz");
    }

    #[test]
    fn form_decode_turns_plus_into_space() {
        assert_eq!(percent_decode_form(b"a+b+c"), b"a b c");
        assert_eq!(percent_decode_form(b"a%2Bb"), b"a+b");
    }

    #[rustfmt::skip]
    const NORMALIZE_CASES: &[(&[u8], Result<&str, ()>)] = &[
        (b"/a/b/c", Ok("/a/b/c")),
        (b"/a//b", Ok("/a/b")),
        (b"/a/./b", Ok("/a/b")),
        (b"/a/b/../c", Ok("/a/c")),
        (b"/", Ok("/")),
        (b"", Ok("/")),
        (b"/..", Err(())),
        (b"/a/../../b", Err(())),
    ];

    #[test]
    fn normalize_cases() {
        for &(input, expected) in NORMALIZE_CASES {
            assert_eq!(normalize(input).as_deref(), expected, "input={:?}", std::str::from_utf8(input));
        }
    }

    #[test]
    fn idempotent() {
        let once = normalize(b"/a/b/../c/./d").unwrap();
        let twice = normalize(once.as_bytes()).unwrap();
        assert_eq!(once, twice);
    }
}

//! DBGp response framing: `<length>\0<xml body>\0`
//!
//! Rewriting a path changes the body length, so the length literal of every
//! frame touched by a substitution has to follow. Only the fixed-position
//! prefix is ever rewritten; a number that happens to appear in the body is
//! left alone.

use crate::substitution::Substitutions;
use tracing::debug;

/// Longest length literal accepted as a frame header
const MAX_LENGTH_DIGITS: usize = 20;

/// Apply `substitutions` to every frame of a debugger chunk and reconcile
/// the declared lengths
///
/// Callers hold back partial frames with [`complete_frames_len`] so that a
/// frame is always rewritten whole. A chunk that still starts in the middle
/// of a body has its leading segment substituted as is; frames that follow
/// it are reconciled normally.
pub fn rewrite_frames(chunk: &[u8], substitutions: &Substitutions) -> Vec<u8> {
    let mut out = Vec::with_capacity(chunk.len() + 16);
    let mut rest = chunk;

    while !rest.is_empty() {
        let Some((declared, header_len)) = parse_header(rest) else {
            let (segment, terminated) = split_body(rest);
            out.extend_from_slice(&substitutions.apply(segment));
            if !terminated {
                break;
            }
            out.push(0);
            rest = &rest[segment.len() + 1..];
            continue;
        };

        let region = &rest[header_len..];
        let (body, terminated) = split_body(region);
        let rewritten = substitutions.apply(body);

        // A truncated body continues in the next read: carry the declared
        // length forward by the size change of the visible part only.
        let length = if terminated || body.len() >= declared {
            rewritten.len()
        } else {
            declared - body.len() + rewritten.len()
        };

        if length == declared {
            out.extend_from_slice(&rest[..header_len]);
        } else {
            debug!("Frame length {} >>> {}", declared, length);
            out.extend_from_slice(length.to_string().as_bytes());
            out.push(0);
        }
        out.extend_from_slice(&rewritten);

        if !terminated {
            break;
        }
        out.push(0);
        rest = &region[body.len() + 1..];
    }

    out
}

/// Byte length of the complete frames at the start of `bytes`
///
/// A frame is complete once the NUL ending its body has arrived. A segment
/// that is not a frame counts up to its own NUL; a run of digits that may
/// still become a header counts as incomplete.
pub fn complete_frames_len(bytes: &[u8]) -> usize {
    let mut done = 0;
    let mut rest = bytes;

    while !rest.is_empty() {
        let body_start = match parse_header(rest) {
            Some((_, header_len)) => header_len,
            None if is_header_prefix(rest) => break,
            None => 0,
        };
        let (body, terminated) = split_body(&rest[body_start..]);
        if !terminated {
            break;
        }
        let used = body_start + body.len() + 1;
        done += used;
        rest = &rest[used..];
    }

    done
}

fn is_header_prefix(bytes: &[u8]) -> bool {
    bytes.len() <= MAX_LENGTH_DIGITS && bytes.iter().all(u8::is_ascii_digit)
}

/// Declared length and header size (digits plus NUL) of a frame starting at
/// the beginning of `bytes`
pub fn parse_header(bytes: &[u8]) -> Option<(usize, usize)> {
    let digits = bytes.iter().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 || digits > MAX_LENGTH_DIGITS || bytes.get(digits) != Some(&0) {
        return None;
    }
    let declared = std::str::from_utf8(&bytes[..digits]).ok()?.parse().ok()?;
    Some((declared, digits + 1))
}

/// Body up to the next NUL, and whether that NUL was present
fn split_body(bytes: &[u8]) -> (&[u8], bool) {
    match bytes.iter().position(|b| *b == 0) {
        Some(end) => (&bytes[..end], true),
        None => (bytes, false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subs(from: &str, to: &str) -> Substitutions {
        let mut subs = Substitutions::new();
        subs.insert(from, to);
        subs
    }

    fn frame(body: &str) -> Vec<u8> {
        let mut out = format!("{}\0{}", body.len(), body).into_bytes();
        out.push(0);
        out
    }

    #[test]
    fn test_parse_header() {
        assert_eq!(parse_header(b"51\0<xml/>"), Some((51, 3)));
        assert_eq!(parse_header(b"<xml/>"), None);
        assert_eq!(parse_header(b"51<xml/>"), None);
        assert_eq!(parse_header(b"\0<xml/>"), None);
    }

    #[test]
    fn test_length_follows_body() {
        let out = rewrite_frames(&frame("<r f=\"/a.php\"/>"), &subs("/a.php", "/longer/a.php"));
        assert_eq!(out, frame("<r f=\"/longer/a.php\"/>"));
    }

    #[test]
    fn test_wrong_declared_length_is_recomputed() {
        let out = rewrite_frames(b"5\0<xml>/a.php</xml>", &subs("/a.php", "/bb.php"));
        assert_eq!(out, b"18\0<xml>/bb.php</xml>".to_vec());
    }

    #[test]
    fn test_unchanged_frame_keeps_its_header() {
        let chunk = b"007\0<init/>\0";
        assert_eq!(rewrite_frames(chunk, &Substitutions::new()), chunk.to_vec());
    }

    #[test]
    fn test_length_literal_inside_body_is_untouched() {
        // body length is 20 and "20" also appears in the body
        let body = "<r n=\"20\">/a.php</r>";
        assert_eq!(body.len(), 20);
        let out = rewrite_frames(&frame(body), &subs("/a.php", "/abc.php"));
        assert_eq!(out, frame("<r n=\"20\">/abc.php</r>"));
    }

    #[test]
    fn test_every_frame_in_chunk() {
        let mut chunk = frame("<a>/a.php</a>");
        chunk.extend(frame("<b>/a.php /a.php</b>"));
        let out = rewrite_frames(&chunk, &subs("/a.php", "/x/a.php"));

        let mut expected = frame("<a>/x/a.php</a>");
        expected.extend(frame("<b>/x/a.php /x/a.php</b>"));
        assert_eq!(out, expected);
    }

    #[test]
    fn test_truncated_body_carries_delta() {
        // 100 bytes declared, only part of the body has arrived
        let out = rewrite_frames(b"100\0<r>/a.php", &subs("/a.php", "/xyz/a.php"));
        assert_eq!(out, b"104\0<r>/xyz/a.php".to_vec());
    }

    #[test]
    fn test_complete_frames_len_whole_frames() {
        let mut chunk = frame("<a/>");
        chunk.extend(frame("<b/>"));
        assert_eq!(complete_frames_len(&chunk), chunk.len());
        assert_eq!(complete_frames_len(b""), 0);
    }

    #[test]
    fn test_complete_frames_len_split_inside_body() {
        let first = frame("<a/>");
        let mut chunk = first.clone();
        chunk.extend(b"11\0<response");
        assert_eq!(complete_frames_len(&chunk), first.len());
        assert_eq!(complete_frames_len(b"100\0<r>/a.php"), 0);
    }

    #[test]
    fn test_complete_frames_len_split_inside_header() {
        assert_eq!(complete_frames_len(b"1"), 0);
        assert_eq!(complete_frames_len(b"133"), 0);
        assert_eq!(complete_frames_len(b"133\0"), 0);

        let mut chunk = frame("<a/>");
        chunk.extend(b"13");
        assert_eq!(complete_frames_len(&chunk), chunk.len() - 2);
    }

    #[test]
    fn test_complete_frames_len_counts_stray_segment() {
        let mut chunk = b"tail</r>\0".to_vec();
        chunk.extend(frame("<n/>"));
        assert_eq!(complete_frames_len(&chunk), chunk.len());
        assert_eq!(complete_frames_len(b"tail</r>"), 0);
    }

    #[test]
    fn test_reassembled_split_frame_keeps_exact_length() {
        let body = "<stack filename=\"file:///c/Bar.php\"/>";
        let wire = frame(body);
        let subs = subs("/c/Bar.php", "/proj/Packages/Acme/Classes/Bar.php");
        let expected = frame("<stack filename=\"file:///proj/Packages/Acme/Classes/Bar.php\"/>");

        for split in [1, 2, 3, 8, wire.len() - 1] {
            let (head, tail) = wire.split_at(split);
            assert_eq!(complete_frames_len(head), 0, "split at {}", split);
            let mut joined = head.to_vec();
            joined.extend_from_slice(tail);
            assert_eq!(complete_frames_len(&joined), wire.len());
            assert_eq!(rewrite_frames(&joined, &subs), expected, "split at {}", split);
        }
    }
}

use std::io::Write;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::ClipboardError;

pub const MAX_PAYLOAD: usize = 100 * 1024;

const SCREEN_CHUNK: usize = 76;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Passthrough {
    Direct,
    Tmux,
    Screen,
}

impl Passthrough {
    pub fn detect(term: Option<&str>, tmux: Option<&str>, sty: Option<&str>) -> Self {
        let term = term.unwrap_or_default().to_ascii_lowercase();
        if tmux.is_some_and(|value| !value.is_empty()) || term.starts_with("tmux") {
            Self::Tmux
        } else if sty.is_some_and(|value| !value.is_empty()) || term.starts_with("screen") {
            Self::Screen
        } else {
            Self::Direct
        }
    }

    pub fn from_env() -> Self {
        let term = std::env::var("TERM").ok();
        let tmux = std::env::var("TMUX").ok();
        let sty = std::env::var("STY").ok();
        Self::detect(term.as_deref(), tmux.as_deref(), sty.as_deref())
    }
}

pub fn osc52_sequence(text: &str, passthrough: Passthrough) -> Result<String, ClipboardError> {
    let encoded = STANDARD.encode(text);
    if encoded.len() > MAX_PAYLOAD {
        return Err(ClipboardError::PayloadTooLarge(encoded.len()));
    }

    let sequence = match passthrough {
        Passthrough::Direct => format!("\x1b]52;c;{encoded}\x07"),
        Passthrough::Tmux => {
            let inner = format!("\x1b]52;c;{encoded}\x07");
            format!("\x1bPtmux;{}\x1b\\", inner.replace('\x1b', "\x1b\x1b"))
        }
        Passthrough::Screen => {
            // screen caps DCS strings, so the payload goes out in chunks.
            let mut out = String::from("\x1bP\x1b]52;c;");
            for (index, chunk) in encoded.as_bytes().chunks(SCREEN_CHUNK).enumerate() {
                if index > 0 {
                    out.push_str("\x1b\\\x1bP");
                }
                out.push_str(&String::from_utf8_lossy(chunk));
            }
            out.push_str("\x07\x1b\\");
            out
        }
    };
    Ok(sequence)
}

pub fn copy_to_clipboard<W: Write>(
    out: &mut W,
    text: &str,
    passthrough: Passthrough,
) -> Result<usize, ClipboardError> {
    let sequence = osc52_sequence(text, passthrough)?;
    out.write_all(sequence.as_bytes())?;
    out.flush()?;
    Ok(text.chars().count())
}

#[cfg(test)]
mod tests {
    use super::{MAX_PAYLOAD, Passthrough, copy_to_clipboard, osc52_sequence};
    use crate::error::ClipboardError;

    #[test]
    fn direct_sequence_is_plain_osc52() {
        assert_eq!(
            osc52_sequence("hello", Passthrough::Direct).expect("small payload"),
            "\x1b]52;c;aGVsbG8=\x07"
        );
    }

    #[test]
    fn tmux_doubles_inner_escapes() {
        assert_eq!(
            osc52_sequence("hello", Passthrough::Tmux).expect("small payload"),
            "\x1bPtmux;\x1b\x1b]52;c;aGVsbG8=\x07\x1b\\"
        );
    }

    #[test]
    fn screen_wraps_in_dcs_chunks() {
        let text = "x".repeat(120);
        let sequence = osc52_sequence(&text, Passthrough::Screen).expect("small payload");
        assert!(sequence.starts_with("\x1bP\x1b]52;c;"));
        assert!(sequence.ends_with("\x07\x1b\\"));
        assert_eq!(sequence.matches("\x1b\\\x1bP").count(), 2);
    }

    #[test]
    fn oversized_payload_is_refused() {
        let text = "a".repeat(MAX_PAYLOAD);
        assert!(matches!(
            osc52_sequence(&text, Passthrough::Direct),
            Err(ClipboardError::PayloadTooLarge(_))
        ));
    }

    #[test]
    fn detection_prefers_tmux() {
        assert_eq!(
            Passthrough::detect(Some("screen-256color"), Some("/tmp/tmux-1000/default"), None),
            Passthrough::Tmux
        );
        assert_eq!(
            Passthrough::detect(Some("tmux-256color"), None, None),
            Passthrough::Tmux
        );
        assert_eq!(
            Passthrough::detect(Some("xterm"), None, Some("1234.pts-0")),
            Passthrough::Screen
        );
        assert_eq!(
            Passthrough::detect(Some("xterm-256color"), Some(""), None),
            Passthrough::Direct
        );
        assert_eq!(Passthrough::detect(None, None, None), Passthrough::Direct);
    }

    #[test]
    fn copy_writes_sequence_and_counts_characters() {
        let mut out = Vec::new();
        let copied = copy_to_clipboard(&mut out, "héllo", Passthrough::Direct).expect("copy");
        assert_eq!(copied, 5);
        assert!(out.starts_with(b"\x1b]52;c;"));
    }
}

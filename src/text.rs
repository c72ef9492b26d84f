use unicode_segmentation::UnicodeSegmentation;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const TAB_STOP: usize = 8;

fn is_ansi_final_byte(ch: char) -> bool {
    ('@'..='~').contains(&ch)
}

fn is_cursor_movement_final(ch: char) -> bool {
    matches!(ch, 'A'..='K' | 'S' | 'T' | 'f')
}

pub fn char_width(ch: char) -> usize {
    ch.width().unwrap_or(0)
}

fn grapheme_width(grapheme: &str) -> usize {
    grapheme.width()
}

pub fn display_width(text: &str) -> usize {
    text.graphemes(true).map(grapheme_width).sum()
}

/// Drops cursor-movement escapes and keeps only the text after the last
/// mid-line carriage return. Trailing carriage returns are terminators.
pub fn clean_log_line(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.char_indices().peekable();

    while let Some((start, ch)) = chars.next() {
        if ch == '\u{1b}' && raw[start + 1..].starts_with('[') {
            let body_start = start + 2;
            let mut end = body_start;
            let mut final_char = None;
            for (idx, c) in raw[body_start..].char_indices() {
                if c.is_ascii_digit() || c == ';' {
                    continue;
                }
                end = body_start + idx;
                final_char = Some(c);
                break;
            }

            if let Some(fc) = final_char
                && is_cursor_movement_final(fc)
            {
                while let Some(&(idx, _)) = chars.peek() {
                    if idx > end {
                        break;
                    }
                    chars.next();
                }
                continue;
            }
        }
        out.push(ch);
    }

    let trimmed = out.trim_end_matches('\r');
    match trimmed.rfind('\r') {
        Some(idx) => trimmed[idx + 1..].to_owned(),
        None => trimmed.to_owned(),
    }
}

fn sanitize_visual(line: &str) -> String {
    let plain = strip_ansi(line);
    let mut out = String::with_capacity(plain.len());
    let mut column = 0usize;

    for ch in plain.chars() {
        if ch == '\t' {
            let pad = TAB_STOP - (column % TAB_STOP);
            out.extend(std::iter::repeat_n(' ', pad));
            column += pad;
        } else if ch.is_control() {
            continue;
        } else {
            out.push(ch);
            column += char_width(ch);
        }
    }

    out
}

pub fn wrap_line(line: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![line.to_owned()];
    }

    let line = sanitize_visual(line);
    if line.is_empty() {
        return vec![String::new()];
    }
    if display_width(&line) <= width {
        return vec![line];
    }

    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_width = 0usize;

    for token in split_tokens(&line) {
        let token_width = display_width(token);
        let is_space = token.starts_with(' ');

        if current_width + token_width <= width {
            current.push_str(token);
            current_width += token_width;
            continue;
        }

        if is_space {
            // Whitespace at a break point is dropped.
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
                current_width = 0;
            }
            continue;
        }

        if !current.is_empty() {
            lines.push(trim_trailing_spaces(std::mem::take(&mut current)));
            current_width = 0;
        }

        if token_width <= width {
            current.push_str(token);
            current_width = token_width;
            continue;
        }

        for grapheme in token.graphemes(true) {
            let w = grapheme_width(grapheme);
            if current_width + w > width && !current.is_empty() {
                lines.push(std::mem::take(&mut current));
                current_width = 0;
            }
            current.push_str(grapheme);
            current_width += w;
        }
    }

    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }

    lines
}

fn trim_trailing_spaces(mut line: String) -> String {
    let len = line.trim_end_matches(' ').len();
    line.truncate(len);
    line
}

fn split_tokens(line: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = 0usize;
    let mut in_space = None;

    for (idx, ch) in line.char_indices() {
        let space = ch == ' ';
        match in_space {
            Some(prev) if prev != space => {
                tokens.push(&line[start..idx]);
                start = idx;
            }
            _ => {}
        }
        in_space = Some(space);
    }

    if start < line.len() {
        tokens.push(&line[start..]);
    }

    tokens
}

pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

pub fn char_slice(text: &str, start: usize, end: usize) -> &str {
    let len = char_len(text);
    let end = end.min(len);
    let start = start.min(end);
    let byte_at = |n: usize| {
        text.char_indices()
            .nth(n)
            .map(|(idx, _)| idx)
            .unwrap_or(text.len())
    };
    &text[byte_at(start)..byte_at(end)]
}

/// Maps a screen column to the char index where the cluster under it starts.
pub fn char_index_at_column(text: &str, column: usize) -> usize {
    let mut used = 0usize;
    let mut index = 0usize;
    for grapheme in text.graphemes(true) {
        let w = grapheme_width(grapheme);
        if column < used + w.max(1) {
            return index;
        }
        used += w;
        index += char_len(grapheme);
    }
    index
}

pub fn clip_to_width(text: &str, width: usize) -> String {
    if width == 0 {
        return String::new();
    }

    let mut out = String::new();
    let mut used = 0usize;
    for grapheme in text.graphemes(true) {
        let w = grapheme_width(grapheme);
        if used + w > width {
            break;
        }
        out.push_str(grapheme);
        used += w;
    }
    out
}

pub fn clip_ansi_to_visible_width(text: &str, width: usize) -> String {
    if width == 0 {
        return String::new();
    }

    let mut out = String::new();
    let mut visible = 0usize;
    let mut chars = text.chars().peekable();
    let mut saw_ansi = false;
    let mut clipped = false;

    while let Some(ch) = chars.next() {
        if ch == '\u{1b}' {
            saw_ansi = true;
            out.push(ch);

            if let Some(next) = chars.next() {
                out.push(next);
                if next == '[' {
                    for seq_char in chars.by_ref() {
                        out.push(seq_char);
                        if is_ansi_final_byte(seq_char) {
                            break;
                        }
                    }
                }
            }
            continue;
        }

        let w = char_width(ch);
        if visible + w > width {
            clipped = true;
            break;
        }

        out.push(ch);
        visible += w;
    }

    if clipped && saw_ansi {
        out.push_str("\u{1b}[0m");
    }

    out
}

pub fn strip_ansi(text: &str) -> String {
    let mut out = String::new();
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '\u{1b}' {
            if let Some(next) = chars.next()
                && next == '['
            {
                for seq_char in chars.by_ref() {
                    if is_ansi_final_byte(seq_char) {
                        break;
                    }
                }
            }
            continue;
        }

        out.push(ch);
    }

    out
}

pub fn clip_with_ellipsis(text: &str, width: usize) -> String {
    if width == 0 {
        return String::new();
    }

    if display_width(text) <= width {
        return text.to_owned();
    }

    if width <= 3 {
        return ".".repeat(width);
    }

    let mut out = clip_to_width(text, width - 3);
    out.push_str("...");
    out
}

pub fn truncate_front(text: &str, width: usize) -> String {
    if display_width(text) <= width {
        return text.to_owned();
    }
    if width == 0 {
        return String::new();
    }

    let mut kept = Vec::new();
    let mut used = 1usize;
    for grapheme in text.graphemes(true).rev() {
        let w = grapheme_width(grapheme);
        if used + w > width {
            break;
        }
        kept.push(grapheme);
        used += w;
    }
    kept.reverse();

    let mut out = String::from("…");
    out.extend(kept);
    out
}

#[cfg(test)]
mod tests {
    use super::{
        char_index_at_column, char_slice, clean_log_line, clip_ansi_to_visible_width,
        clip_to_width, clip_with_ellipsis, display_width, strip_ansi, truncate_front, wrap_line,
    };
    use proptest::prelude::*;

    #[test]
    fn carriage_return_keeps_last_overwrite() {
        assert_eq!(clean_log_line("progress 50%\rprogress 100%"), "progress 100%");
        assert_eq!(clean_log_line("a\rb\rc"), "c");
    }

    #[test]
    fn trailing_carriage_return_is_a_terminator() {
        assert_eq!(clean_log_line("done\r"), "done");
        assert_eq!(clean_log_line("done\r\r"), "done");
        assert_eq!(clean_log_line("step 1\rstep 2\r"), "step 2");
    }

    #[test]
    fn cursor_movement_sequences_are_removed() {
        assert_eq!(clean_log_line("\u{1b}[2Kloading\u{1b}[1A"), "loading");
        assert_eq!(clean_log_line("\u{1b}[10;4Hxy"), "xy");
        assert_eq!(clean_log_line("\u{1b}[12;1fz"), "z");
    }

    #[test]
    fn colour_sequences_survive_cleaning() {
        let line = "\u{1b}[31mERROR\u{1b}[0m boom";
        assert_eq!(clean_log_line(line), line);
    }

    #[test]
    fn short_line_is_one_visual_line() {
        assert_eq!(wrap_line("hello world", 20), vec!["hello world"]);
    }

    #[test]
    fn empty_line_wraps_to_single_empty_visual_line() {
        assert_eq!(wrap_line("", 10), vec![String::new()]);
    }

    #[test]
    fn zero_width_returns_line_unmodified() {
        assert_eq!(wrap_line("a\tb", 0), vec!["a\tb"]);
    }

    #[test]
    fn wraps_at_word_boundaries() {
        assert_eq!(
            wrap_line("the quick brown fox jumps", 10),
            vec!["the quick", "brown fox", "jumps"]
        );
    }

    #[test]
    fn long_words_are_broken_at_the_column_limit() {
        assert_eq!(wrap_line("abcdefghijkl", 5), vec!["abcde", "fghij", "kl"]);
    }

    #[test]
    fn tabs_expand_to_tab_stops() {
        assert_eq!(wrap_line("a\tb", 20), vec!["a       b"]);
    }

    #[test]
    fn wrapping_strips_escape_sequences() {
        assert_eq!(wrap_line("\u{1b}[32mok\u{1b}[0m", 10), vec!["ok"]);
    }

    #[test]
    fn char_slice_clamps() {
        assert_eq!(char_slice("héllo", 1, 3), "él");
        assert_eq!(char_slice("abc", 2, 10), "c");
        assert_eq!(char_slice("abc", 5, 10), "");
    }

    #[test]
    fn columns_map_through_wide_characters() {
        assert_eq!(char_index_at_column("ab", 1), 1);
        assert_eq!(char_index_at_column("ab", 9), 2);
        assert_eq!(char_index_at_column("日本", 1), 0);
        assert_eq!(char_index_at_column("日本", 2), 1);
    }

    #[test]
    fn long_words_never_split_a_cluster() {
        let family = "\u{1f468}\u{200d}\u{1f469}\u{200d}\u{1f467}";
        let line = format!("ab{family}cd");
        let lines = wrap_line(&line, 3);
        assert!(lines.len() > 1);
        assert!(lines.iter().any(|part| part.contains(family)));
        assert_eq!(lines.concat(), line);

        let accented = wrap_line("e\u{301}e\u{301}e\u{301}", 2);
        assert_eq!(accented, vec!["e\u{301}e\u{301}", "e\u{301}"]);
    }

    #[test]
    fn columns_map_to_cluster_starts() {
        assert_eq!(char_index_at_column("e\u{301}x", 0), 0);
        assert_eq!(char_index_at_column("e\u{301}x", 1), 2);
        assert_eq!(char_index_at_column("e\u{301}x", 5), 3);
        assert_eq!(clip_to_width("e\u{301}xy", 1), "e\u{301}");
        assert_eq!(display_width("e\u{301}x"), 2);
    }

    #[test]
    fn clip_limits_display_width() {
        assert_eq!(clip_to_width("abcdef", 0), "");
        assert_eq!(clip_to_width("abcdef", 3), "abc");
        assert_eq!(clip_to_width("日本語", 5), "日本");
    }

    #[test]
    fn ansi_clip_uses_visible_width() {
        let text = "\u{1b}[2m2026-02-06\u{1b}[0m INFO module message";
        let clipped = clip_ansi_to_visible_width(text, 10);
        assert_eq!(strip_ansi(&clipped), "2026-02-06");
    }

    #[test]
    fn ansi_clip_resets_if_cut_mid_styled_content() {
        let text = "\u{1b}[31mERROR something happened\u{1b}[0m";
        let clipped = clip_ansi_to_visible_width(text, 5);
        assert!(clipped.ends_with("\u{1b}[0m"));
    }

    #[test]
    fn clip_with_ellipsis_marks_truncation() {
        assert_eq!(clip_with_ellipsis("abcdef", 6), "abcdef");
        assert_eq!(clip_with_ellipsis("abcdef", 5), "ab...");
        assert_eq!(clip_with_ellipsis("abcdef", 3), "...");
    }

    #[test]
    fn truncate_front_keeps_file_name() {
        assert_eq!(truncate_front("/scratch/job/123.out", 100), "/scratch/job/123.out");
        assert_eq!(truncate_front("/scratch/job/123.out", 8), "…123.out");
        assert_eq!(display_width(&truncate_front("/scratch/job/123.out", 8)), 8);
    }

    proptest! {
        #[test]
        fn wrapped_lines_fit_the_width(line in "[ a-zA-Z0-9]{0,120}", width in 1usize..40) {
            for visual in wrap_line(&line, width) {
                prop_assert!(display_width(&visual) <= width);
            }
        }

        #[test]
        fn wrapping_keeps_every_non_space_character(line in "[ a-z]{0,80}", width in 1usize..20) {
            let original: String = line.chars().filter(|c| *c != ' ').collect();
            let wrapped: String = wrap_line(&line, width)
                .concat()
                .chars()
                .filter(|c| *c != ' ')
                .collect();
            prop_assert_eq!(original, wrapped);
        }
    }
}

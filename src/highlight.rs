use crate::search::match_ranges;
use crate::theme::{self, Theme};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Mark {
    matched: bool,
    selected: bool,
}

fn category(mark: Mark) -> Option<&'static str> {
    match (mark.matched, mark.selected) {
        (false, false) => None,
        (true, false) => Some(theme::SEARCH_MATCH),
        (false, true) => Some(theme::SELECTION),
        (true, true) => Some(theme::SELECTION_MATCH),
    }
}

fn push_run(out: &mut String, run: &str, mark: Mark, theme: &Theme) {
    if run.is_empty() {
        return;
    }
    match category(mark) {
        Some(name) => out.push_str(&theme.style(name).apply(run).to_string()),
        None => out.push_str(run),
    }
}

fn shout(ch: char) -> char {
    let mut upper = ch.to_uppercase();
    match (upper.next(), upper.next()) {
        (Some(single), None) => single,
        _ => ch,
    }
}

/// Matches inside the selected `[start, end)` range stay upper-cased but take
/// the selection colours.
pub fn decorate_line(
    line: &str,
    needle: &[char],
    selected: Option<(usize, usize)>,
    theme: &Theme,
) -> String {
    let matches = match_ranges(line, needle);
    if matches.is_empty() && selected.is_none() {
        return line.to_owned();
    }

    let mut out = String::with_capacity(line.len() + 32);
    let mut run = String::new();
    let mut run_mark = Mark {
        matched: false,
        selected: false,
    };
    let mut ranges = matches.iter().peekable();

    for (index, ch) in line.chars().enumerate() {
        while ranges.peek().is_some_and(|(_, end)| *end <= index) {
            ranges.next();
        }
        let matched = ranges
            .peek()
            .is_some_and(|(start, end)| (*start..*end).contains(&index));
        let is_selected = selected.is_some_and(|(start, end)| (start..end).contains(&index));
        let mark = Mark {
            matched,
            selected: is_selected,
        };

        if mark != run_mark {
            push_run(&mut out, &run, run_mark, theme);
            run.clear();
            run_mark = mark;
        }
        run.push(if matched { shout(ch) } else { ch });
    }
    push_run(&mut out, &run, run_mark, theme);

    out
}

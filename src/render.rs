use std::io::{self, Write};

use crossterm::cursor::MoveTo;
use crossterm::queue;
use crossterm::style::{Print, PrintStyledContent};
use crossterm::terminal::{BeginSynchronizedUpdate, Clear, ClearType, EndSynchronizedUpdate};

use crate::layout::{PaneGeometry, Rect};
use crate::pane::{Pane, PaneId};
use crate::text::{
    clip_ansi_to_visible_width, clip_to_width, clip_with_ellipsis, display_width, truncate_front,
};
use crate::theme::{self, Theme};
use crate::view::LogView;

const MIN_HEADER_WIDTH: usize = 20;
const MIN_PATH_WIDTH: usize = 3;
const SEARCH_PROMPT: &str = "/ Search: ";
const SEARCH_PLACEHOLDER: &str = "(type to search)";
const SEARCH_CURSOR: &str = "▍";
const SEARCH_HINT: &str = "Enter to jump, Esc to cancel";
const NO_PATH: &str = "(no file)";

const SHORT_HELP: &str = "q quit  / search  tab pane  y copy mode  v pager  ? help";
const FULL_HELP: [&str; 3] = [
    "q/esc quit  p pause  f follow  c clear  b/G bottom  t/g top  o/e/l stdout/stderr/both",
    "tab pane  s stack  x borders  m mouse  / search  n/N next/prev  v pager",
    "y copy mode  ctrl+y copy selection  Y copy pane  k/j pgup/pgdn ctrl+u/d scroll  ? close",
];

fn cell(value: usize) -> u16 {
    u16::try_from(value).unwrap_or(u16::MAX)
}

fn scroll_label(pane: &Pane) -> String {
    if pane.at_top() {
        "Top".to_owned()
    } else if pane.at_bottom() {
        "Bot".to_owned()
    } else {
        format!("{:.0}%", pane.scroll_percent() * 100.0)
    }
}

pub fn pane_header(view: &LogView, id: PaneId, width: usize) -> String {
    let pane = view.pane(id);
    let width = width.max(MIN_HEADER_WIDTH);
    let prefix = if view.is_active(id) { "> " } else { "  " };

    let mut flags = String::new();
    if view.paused() {
        flags.push_str(" [PAUSED]");
    } else if view.following() {
        flags.push_str(" [FOLLOW]");
    }
    if view.mouse_enabled() {
        flags.push_str(" [MOUSE]");
    }
    if view.has_selection_in(id) {
        flags.push_str(" [SEL]");
    }

    let scroll = format!(" ({})", scroll_label(pane));
    let fixed = display_width(prefix)
        + display_width(id.label())
        + 1
        + display_width(&scroll)
        + display_width(&flags);

    let path = if pane.path.is_empty() {
        NO_PATH
    } else {
        pane.path.as_str()
    };
    let budget = width.saturating_sub(fixed);
    let path = if budget < MIN_PATH_WIDTH {
        String::new()
    } else {
        truncate_front(path, budget)
    };

    format!("{prefix}{} {path}{scroll}{flags}", id.label())
}

fn footer_lines(view: &LogView) -> Vec<String> {
    let hints: Vec<&str> = if view.show_help() {
        FULL_HELP.to_vec()
    } else {
        vec![SHORT_HELP]
    };

    let mut lead = String::new();
    if let Some(job) = view.job_id() {
        lead.push_str(&format!("job {job}  "));
    }
    if let Some(status) = view.status() {
        lead.push_str(status);
        lead.push_str("  ");
    }

    hints
        .into_iter()
        .enumerate()
        .map(|(row, hint)| {
            if row == 0 {
                format!("{lead}{hint}")
            } else {
                hint.to_owned()
            }
        })
        .collect()
}

fn draw_box<W: Write>(out: &mut W, rect: Rect, active: bool, theme: &Theme) -> io::Result<()> {
    if rect.width < 2 || rect.height < 2 {
        return Ok(());
    }
    let style = theme.style(if active {
        theme::BORDER_ACTIVE
    } else {
        theme::BORDER_INACTIVE
    });
    let horiz = "─".repeat(rect.width - 2);
    let (left, right) = (cell(rect.x), cell(rect.x + rect.width - 1));
    let (top, bottom) = (rect.y, rect.y + rect.height - 1);

    queue!(
        out,
        MoveTo(left, cell(top)),
        PrintStyledContent(style.apply(format!("╭{horiz}╮")))
    )?;
    for y in top + 1..bottom {
        queue!(
            out,
            MoveTo(left, cell(y)),
            PrintStyledContent(style.apply("│")),
            MoveTo(right, cell(y)),
            PrintStyledContent(style.apply("│"))
        )?;
    }
    queue!(
        out,
        MoveTo(left, cell(bottom)),
        PrintStyledContent(style.apply(format!("╰{horiz}╯")))
    )?;
    Ok(())
}

fn draw_pane<W: Write>(
    out: &mut W,
    view: &LogView,
    id: PaneId,
    geom: PaneGeometry,
    chrome: bool,
) -> io::Result<()> {
    let theme = view.theme();
    let active = view.is_active(id);

    if chrome {
        let header = clip_to_width(&pane_header(view, id, geom.outer.width), geom.outer.width);
        let style = theme.style(if active { theme::TITLE } else { theme::TITLE_DIM });
        queue!(
            out,
            MoveTo(cell(geom.outer.x), cell(geom.outer.y)),
            PrintStyledContent(style.apply(header))
        )?;

        if view.borders() {
            let frame = Rect {
                y: geom.outer.y + 1,
                height: geom.outer.height.saturating_sub(1),
                ..geom.outer
            };
            draw_box(out, frame, active, theme)?;
        }
    }

    let content = geom.content;
    for (row, line) in view.pane(id).visible_rows().take(content.height).enumerate() {
        queue!(
            out,
            MoveTo(cell(content.x), cell(content.y + row)),
            Print(clip_ansi_to_visible_width(line, content.width))
        )?;
    }
    Ok(())
}

pub fn draw<W: Write>(out: &mut W, view: &LogView) -> io::Result<()> {
    let (width, height) = view.size();
    queue!(out, BeginSynchronizedUpdate, MoveTo(0, 0), Clear(ClearType::All))?;

    if width == 0 || height == 0 {
        queue!(out, EndSynchronizedUpdate)?;
        return out.flush();
    }

    let theme = view.theme();
    if view.searching() {
        let query = if view.search_input().is_empty() {
            SEARCH_PLACEHOLDER
        } else {
            view.search_input()
        };
        let prompt = clip_to_width(&format!("{SEARCH_PROMPT}{query} {SEARCH_CURSOR}"), width);
        queue!(
            out,
            MoveTo(0, 0),
            PrintStyledContent(theme.style(theme::OVERLAY).apply(prompt)),
            MoveTo(0, 1),
            PrintStyledContent(theme.style(theme::HINT).apply(clip_to_width(SEARCH_HINT, width)))
        )?;
    }

    let chrome = !view.in_copy_mode();
    let layout = view.layout();
    for id in PaneId::ALL {
        if layout.is_visible(id) {
            draw_pane(out, view, id, layout.geometry(id), chrome)?;
        }
    }

    if chrome {
        let lines = footer_lines(view);
        let first_row = height.saturating_sub(lines.len());
        for (offset, line) in lines.iter().enumerate() {
            let style = if offset == 0 && view.status().is_some() {
                theme.style(theme::STATUS)
            } else {
                theme.style(theme::HINT)
            };
            queue!(
                out,
                MoveTo(0, cell(first_row + offset)),
                PrintStyledContent(style.apply(clip_with_ellipsis(line, width)))
            )?;
        }
    }

    queue!(out, EndSynchronizedUpdate)?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::{draw, footer_lines, pane_header};
    use crate::config::Options;
    use crate::error::FollowError;
    use crate::follower::FollowStart;
    use crate::pane::PaneId;
    use crate::runtime::Message;
    use crate::text::strip_ansi;
    use crate::theme::Theme;
    use crate::view::LogView;
    use crossterm::event::{Event, KeyCode, KeyEvent, KeyModifiers};

    fn view(path: &str) -> LogView {
        LogView::new(
            &Options {
                stdout_path: path.to_owned(),
                ..Options::default()
            },
            (80, 24),
            Theme::dark(),
        )
    }

    fn load(view: &mut LogView, count: usize) {
        view.update(Message::FollowStarted {
            pane: PaneId::Stdout,
            start: FollowStart {
                initial_lines: (0..count).map(|i| format!("line-{i:02}")).collect(),
                follow: Err(FollowError::NoPath),
            },
        });
    }

    fn press(view: &mut LogView, code: KeyCode) {
        view.update(Message::Input(Event::Key(KeyEvent::new(
            code,
            KeyModifiers::NONE,
        ))));
    }

    #[test]
    fn header_shows_position_and_flags() {
        let mut view = view("/scratch/jobs/4242/slurm.out");
        load(&mut view, 100);
        assert_eq!(
            pane_header(&view, PaneId::Stdout, 80),
            "> STDOUT /scratch/jobs/4242/slurm.out (Bot) [FOLLOW]"
        );
        assert_eq!(
            pane_header(&view, PaneId::Stderr, 80),
            "  STDERR (no file) (Top) [FOLLOW]"
        );

        press(&mut view, KeyCode::Char('p'));
        press(&mut view, KeyCode::Char('t'));
        assert_eq!(
            pane_header(&view, PaneId::Stdout, 80),
            "> STDOUT /scratch/jobs/4242/slurm.out (Top) [PAUSED]"
        );
    }

    #[test]
    fn header_reports_percent_in_the_middle() {
        let mut view = view("a.out");
        load(&mut view, 100);
        press(&mut view, KeyCode::Char('t'));
        for _ in 0..40 {
            press(&mut view, KeyCode::Char('j'));
        }
        assert_eq!(pane_header(&view, PaneId::Stdout, 80), "> STDOUT a.out (50%)");
    }

    #[test]
    fn long_paths_are_cut_from_the_front() {
        let view = view("/very/long/directory/structure/for/jobs/slurm-4242.out");
        let header = pane_header(&view, PaneId::Stdout, 40);
        assert!(header.starts_with("> STDOUT …"));
        assert!(header.contains("slurm-4242.out (Top)"));
        assert_eq!(header.chars().count(), 40);
    }

    #[test]
    fn narrow_headers_drop_the_path() {
        let view = view("/logs/a.out");
        assert_eq!(pane_header(&view, PaneId::Stdout, 5), "> STDOUT  (Top) [FOLLOW]");
    }

    #[test]
    fn footer_carries_job_and_status() {
        let mut view = LogView::new(
            &Options {
                job_id: Some("77".to_owned()),
                ..Options::default()
            },
            (80, 24),
            Theme::dark(),
        );
        press(&mut view, KeyCode::Char('v'));
        let lines = footer_lines(&view);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("job 77  No log file for this pane  q quit"));

        press(&mut view, KeyCode::Char('?'));
        assert_eq!(footer_lines(&view).len(), 3);
    }

    #[test]
    fn frame_contains_overlay_headers_and_rows() {
        let mut view = view("a.out");
        load(&mut view, 5);
        press(&mut view, KeyCode::Char('/'));
        press(&mut view, KeyCode::Char('x'));

        let mut out = Vec::new();
        draw(&mut out, &view).expect("draw into memory");
        let frame = strip_ansi(&String::from_utf8_lossy(&out));
        assert!(frame.contains("/ Search: x ▍"));
        assert!(frame.contains("Enter to jump, Esc to cancel"));
        assert!(frame.contains("> STDOUT a.out"));
        assert!(frame.contains("line-04"));
        assert!(frame.contains("╭"));
    }
}

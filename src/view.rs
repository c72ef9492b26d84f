use crossterm::event::{
    Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};

use crate::config::Options;
use crate::error::FollowError;
use crate::follower::{FollowSlot, FollowStart, LineReader};
use crate::layout::{Layout, LayoutInput, ViewMode};
use crate::pane::{Decor, Pane, PaneId};
use crate::runtime::{Cmd, Effect, Message, Task};
use crate::search::{self, fold_query};
use crate::selection::{HitMode, Selection, hit_test};
use crate::text::char_len;
use crate::theme::Theme;

pub const SEARCH_LIMIT: usize = 156;
pub const WHEEL_ROWS: usize = 3;
const DEFAULT_SIZE: (usize, usize) = (80, 24);
const HELP_FOOTER_ROWS: usize = 3;

pub const EOF_DIAGNOSTIC: &str = "EOF (tail exited)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SavedView {
    mode: ViewMode,
    stacked: bool,
    borders: bool,
    mouse: bool,
    active: PaneId,
}

#[derive(Debug)]
pub struct LogView {
    job_id: Option<String>,
    panes: [Pane; 2],
    mode: ViewMode,
    active: PaneId,
    stacked: bool,
    borders: bool,
    mouse: bool,
    following: bool,
    paused: bool,
    show_help: bool,
    copy_saved: Option<SavedView>,
    searching: bool,
    search_input: String,
    last_search: String,
    needle: Vec<char>,
    selection: Option<Selection>,
    width: usize,
    height: usize,
    layout: Layout,
    theme: Theme,
    status: Option<String>,
    quitting: bool,
}

impl LogView {
    pub fn new(options: &Options, size: (usize, usize), theme: Theme) -> Self {
        let mut view = Self {
            job_id: options.job_id.clone(),
            panes: [
                Pane::new(PaneId::Stdout, options.stdout_path.clone(), options.capacity),
                Pane::new(PaneId::Stderr, options.stderr_path.clone(), options.capacity),
            ],
            mode: options.mode,
            active: match options.mode {
                ViewMode::Stderr => PaneId::Stderr,
                ViewMode::Both | ViewMode::Stdout => PaneId::Stdout,
            },
            stacked: options.stacked,
            borders: true,
            mouse: options.mouse,
            following: true,
            paused: false,
            show_help: false,
            copy_saved: None,
            searching: false,
            search_input: String::new(),
            last_search: String::new(),
            needle: Vec::new(),
            selection: None,
            width: 0,
            height: 0,
            layout: Layout::compute(&LayoutInput {
                width: DEFAULT_SIZE.0,
                height: DEFAULT_SIZE.1,
                mode: options.mode,
                stacked: options.stacked,
                chrome: true,
                search_overlay: false,
                footer_rows: 1,
            }),
            theme,
            status: None,
            quitting: false,
        };
        view.resize(size.0, size.1);
        view
    }

    pub fn init(&mut self) -> Vec<Cmd> {
        PaneId::ALL
            .into_iter()
            .map(|id| {
                let pane = &mut self.panes[id.index()];
                pane.follow = FollowSlot::Starting;
                Cmd::from(Task::StartFollow {
                    pane: id,
                    path: pane.path.clone(),
                    capacity: pane.capacity(),
                })
            })
            .collect()
    }

    pub fn update(&mut self, message: Message) -> Vec<Cmd> {
        match message {
            Message::Input(Event::Key(key)) if key.kind != KeyEventKind::Release => {
                self.handle_key(key)
            }
            Message::Input(Event::Mouse(mouse)) => self.handle_mouse(mouse),
            Message::Input(Event::Resize(width, height)) => {
                self.resize(usize::from(width), usize::from(height));
                Vec::new()
            }
            Message::Input(_) => Vec::new(),
            Message::FollowStarted { pane, start } => self.on_follow_started(pane, start),
            Message::LineRead {
                pane,
                reader,
                result,
            } => self.on_line_read(pane, reader, result),
            Message::Released { pane } => {
                tracing::debug!(pane = pane.name(), "follow resources released");
                Vec::new()
            }
        }
    }

    pub fn should_quit(&self) -> bool {
        self.quitting
    }

    pub fn pane(&self, id: PaneId) -> &Pane {
        &self.panes[id.index()]
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn job_id(&self) -> Option<&str> {
        self.job_id.as_deref()
    }

    pub fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn following(&self) -> bool {
        self.following
    }

    pub fn paused(&self) -> bool {
        self.paused
    }

    pub fn mouse_enabled(&self) -> bool {
        self.mouse
    }

    pub fn borders(&self) -> bool {
        self.borders
    }

    pub fn in_copy_mode(&self) -> bool {
        self.copy_saved.is_some()
    }

    pub fn searching(&self) -> bool {
        self.searching
    }

    pub fn search_input(&self) -> &str {
        &self.search_input
    }

    pub fn show_help(&self) -> bool {
        self.show_help
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = Some(status.into());
    }

    pub fn has_selection_in(&self, pane: PaneId) -> bool {
        self.selection.is_some_and(|sel| sel.pane == pane)
    }

    pub fn focused(&self) -> PaneId {
        match self.mode {
            ViewMode::Stdout => PaneId::Stdout,
            ViewMode::Stderr => PaneId::Stderr,
            ViewMode::Both => self.active,
        }
    }

    pub fn is_active(&self, pane: PaneId) -> bool {
        self.mode != ViewMode::Both || pane == self.active
    }

    fn stick(&self) -> bool {
        self.following && !self.paused
    }

    fn active_term(&self) -> &str {
        let typed = self.search_input.trim();
        if self.searching && !typed.is_empty() {
            typed
        } else {
            &self.last_search
        }
    }

    fn refresh(&mut self, id: PaneId) {
        let decor = Decor {
            needle: &self.needle,
            selection: self.selection.as_ref(),
            theme: &self.theme,
        };
        self.panes[id.index()].rebuild(&decor);
    }

    /// Rebuilds the render cache of any pane left stale by eviction. Called
    /// once per drained batch of messages, before drawing.
    pub fn flush_render_cache(&mut self) {
        let decor = Decor {
            needle: &self.needle,
            selection: self.selection.as_ref(),
            theme: &self.theme,
        };
        for pane in &mut self.panes {
            pane.flush_cache(&decor);
        }
    }

    fn refresh_decor(&mut self) {
        let needle = fold_query(self.active_term());
        if needle != self.needle {
            self.needle = needle;
            for id in PaneId::ALL {
                self.refresh(id);
            }
        }
    }

    fn clear_selection(&mut self) {
        if let Some(previous) = self.selection.take() {
            self.refresh(previous.pane);
        }
    }

    fn layout_input(&self) -> LayoutInput {
        LayoutInput {
            width: self.width,
            height: self.height,
            mode: self.mode,
            stacked: self.stacked,
            chrome: self.copy_saved.is_none(),
            search_overlay: self.searching,
            footer_rows: if self.show_help { HELP_FOOTER_ROWS } else { 1 },
        }
    }

    fn relayout(&mut self) {
        self.layout = Layout::compute(&self.layout_input());

        if let Some(sel) = self.selection {
            let width = self.layout.geometry(sel.pane).content.width;
            if width != self.panes[sel.pane.index()].viewport().width {
                self.clear_selection();
            }
        }

        for id in PaneId::ALL {
            let content = self.layout.geometry(id).content;
            let decor = Decor {
                needle: &self.needle,
                selection: self.selection.as_ref(),
                theme: &self.theme,
            };
            self.panes[id.index()].resize(content.width, content.height, &decor);
        }
    }

    /// Zero sizes (seen transiently from some terminals) reuse the last known
    /// size. A real change drops the selection.
    pub fn resize(&mut self, width: usize, height: usize) {
        let fallback = |value: usize, last: usize, default: usize| match (value, last) {
            (0, 0) => default,
            (0, last) => last,
            (value, _) => value,
        };
        let width = fallback(width, self.width, DEFAULT_SIZE.0);
        let height = fallback(height, self.height, DEFAULT_SIZE.1);

        if (width, height) != (self.width, self.height) {
            self.clear_selection();
        }
        self.width = width;
        self.height = height;
        self.relayout();
    }

    fn append_line(&mut self, id: PaneId, raw: &str) {
        let stick = self.stick();
        self.panes[id.index()].append(raw, &self.needle, &self.theme, &mut self.selection, stick);
    }

    fn on_follow_started(&mut self, id: PaneId, start: FollowStart) -> Vec<Cmd> {
        let FollowStart {
            initial_lines,
            follow,
        } = start;

        if self.has_selection_in(id) {
            self.selection = None;
        }
        let stick = self.stick();
        let decor = Decor {
            needle: &self.needle,
            selection: self.selection.as_ref(),
            theme: &self.theme,
        };
        self.panes[id.index()].replace_lines(initial_lines, &decor, stick);

        match follow {
            Ok((process, reader)) => {
                let slot = &mut self.panes[id.index()].follow;
                if matches!(slot, FollowSlot::Starting) {
                    *slot = FollowSlot::Live(process);
                    vec![
                        Task::ReadLine {
                            pane: id,
                            reader: Some(reader),
                        }
                        .into(),
                    ]
                } else {
                    tracing::debug!(pane = id.name(), "follow started after teardown");
                    vec![
                        Task::Release {
                            pane: id,
                            process: Some(process),
                            reader: Some(reader),
                        }
                        .into(),
                    ]
                }
            }
            Err(err) => {
                self.panes[id.index()].follow = FollowSlot::Closed;
                if !matches!(err, FollowError::NoPath) {
                    self.append_line(id, &format!("Error starting tail: {err}"));
                }
                Vec::new()
            }
        }
    }

    fn on_line_read(
        &mut self,
        id: PaneId,
        reader: Option<LineReader>,
        result: Result<String, FollowError>,
    ) -> Vec<Cmd> {
        if !self.panes[id.index()].follow.is_live() {
            // Torn down while the read was in flight; dropping the reader
            // closes the pipe.
            tracing::debug!(pane = id.name(), "discarding read after teardown");
            return Vec::new();
        }

        match result {
            Ok(line) => {
                self.append_line(id, &line);
                vec![Task::ReadLine { pane: id, reader }.into()]
            }
            Err(err) => {
                let diagnostic = if err.is_eof() {
                    tracing::debug!(pane = id.name(), "follow stream ended");
                    EOF_DIAGNOSTIC.to_owned()
                } else {
                    tracing::warn!(pane = id.name(), %err, "follow stream failed");
                    format!("Error reading: {err}")
                };
                self.append_line(id, &diagnostic);
                let process = self.panes[id.index()].follow.detach();
                vec![
                    Task::Release {
                        pane: id,
                        process,
                        reader,
                    }
                    .into(),
                ]
            }
        }
    }

    /// Detaches both follow processes and hands them to cleanup tasks. Safe to
    /// call any number of times; each process is released once.
    pub fn teardown(&mut self) -> Vec<Cmd> {
        PaneId::ALL
            .into_iter()
            .filter_map(|id| {
                self.panes[id.index()].follow.detach().map(|process| {
                    Cmd::from(Task::Release {
                        pane: id,
                        process: Some(process),
                        reader: None,
                    })
                })
            })
            .collect()
    }

    fn quit(&mut self) -> Vec<Cmd> {
        self.quitting = true;
        let mut cmds = self.teardown();
        cmds.push(Effect::Quit.into());
        cmds
    }

    fn handle_key(&mut self, key: KeyEvent) -> Vec<Cmd> {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        if ctrl && key.code == KeyCode::Char('c') {
            return self.quit();
        }

        self.status = None;
        if self.searching {
            self.handle_search_key(key, ctrl);
            return Vec::new();
        }

        let page = self.pane(self.focused()).viewport().height.max(1);
        let mut cmds = Vec::new();

        match key.code {
            KeyCode::Char('y') if ctrl => cmds.extend(self.copy_selection()),
            KeyCode::Char('u') if ctrl => self.scroll_up((page / 2).max(1)),
            KeyCode::Char('d') if ctrl => self.scroll_down((page / 2).max(1)),
            _ if ctrl => {}
            KeyCode::Char('q') | KeyCode::Esc => return self.quit(),
            KeyCode::Char('p') => self.paused = !self.paused,
            KeyCode::Char('f') => {
                self.following = !self.following;
                if self.following {
                    for pane in &mut self.panes {
                        pane.goto_bottom();
                    }
                }
            }
            KeyCode::Char('c') => {
                self.selection = None;
                for pane in &mut self.panes {
                    pane.clear();
                }
            }
            KeyCode::Char('b') | KeyCode::Char('G') | KeyCode::End => {
                self.following = true;
                let id = self.focused();
                self.panes[id.index()].goto_bottom();
            }
            KeyCode::Char('t') | KeyCode::Char('g') | KeyCode::Home => {
                self.following = false;
                let id = self.focused();
                self.panes[id.index()].goto_top();
            }
            KeyCode::Char('y') => cmds.extend(self.toggle_copy_mode()),
            KeyCode::Char('o') => cmds.extend(self.show_single(PaneId::Stdout)),
            KeyCode::Char('e') => cmds.extend(self.show_single(PaneId::Stderr)),
            KeyCode::Char('l') => {
                if self.copy_saved.is_some() {
                    cmds.extend(self.exit_copy_mode());
                }
                self.mode = ViewMode::Both;
                self.relayout();
            }
            KeyCode::Tab => {
                if self.mode == ViewMode::Both {
                    self.active = self.active.other();
                    self.clear_selection();
                }
            }
            KeyCode::Char('s') => {
                if !(self.copy_saved.is_some() && self.mode != ViewMode::Both) {
                    self.stacked = !self.stacked;
                    self.relayout();
                }
            }
            KeyCode::Char('x') => {
                if self.copy_saved.is_none() {
                    self.borders = !self.borders;
                }
            }
            KeyCode::Char('m') => {
                self.mouse = !self.mouse;
                cmds.push(Effect::MouseCapture(self.mouse).into());
            }
            KeyCode::Char('/') => {
                self.searching = true;
                self.search_input.clear();
                self.relayout();
            }
            KeyCode::Char('n') => {
                let query = self.last_search.clone();
                self.find(&query, true);
            }
            KeyCode::Char('N') => {
                let query = self.last_search.clone();
                self.find(&query, false);
            }
            KeyCode::Char('Y') => cmds.extend(self.copy_pane()),
            KeyCode::Char('v') => cmds.extend(self.open_pager()),
            KeyCode::Char('?') => {
                self.show_help = !self.show_help;
                self.relayout();
            }
            KeyCode::Up | KeyCode::Char('k') => self.scroll_up(1),
            KeyCode::Down | KeyCode::Char('j') => self.scroll_down(1),
            KeyCode::PageUp => self.scroll_up(page),
            KeyCode::PageDown => self.scroll_down(page),
            _ => {}
        }

        cmds
    }

    fn handle_search_key(&mut self, key: KeyEvent, ctrl: bool) {
        match key.code {
            KeyCode::Enter => {
                self.searching = false;
                self.last_search = self.search_input.trim().to_owned();
                let query = self.last_search.clone();
                self.find(&query, true);
                self.refresh_decor();
                self.relayout();
            }
            KeyCode::Esc => {
                self.searching = false;
                self.refresh_decor();
                self.relayout();
            }
            KeyCode::Backspace => {
                self.search_input.pop();
                self.refresh_decor();
            }
            KeyCode::Char('u') if ctrl => {
                self.search_input.clear();
                self.refresh_decor();
            }
            KeyCode::Char(ch) if !ctrl => {
                if char_len(&self.search_input) < SEARCH_LIMIT {
                    self.search_input.push(ch);
                    self.refresh_decor();
                }
            }
            _ => {}
        }
    }

    fn find(&mut self, query: &str, forward: bool) {
        let id = self.focused();
        let pane = &mut self.panes[id.index()];
        let hit = {
            let lines = pane.visual_lines();
            search::find_line(&lines, query, pane.viewport().y_offset, forward)
        };
        if let Some(line) = hit {
            self.following = false;
            pane.jump_to(line);
        }
    }

    fn scroll_up(&mut self, rows: usize) {
        self.following = false;
        let id = self.focused();
        self.panes[id.index()].scroll_up(rows);
    }

    fn scroll_down(&mut self, rows: usize) {
        let id = self.focused();
        self.panes[id.index()].scroll_down(rows);
    }

    fn show_single(&mut self, id: PaneId) -> Vec<Cmd> {
        self.mode = ViewMode::single(id);
        let mut cmds = Vec::new();
        if self.mouse {
            // Plain terminal selection works better without mouse reporting.
            self.mouse = false;
            cmds.push(Effect::MouseCapture(false).into());
        }
        self.relayout();
        cmds
    }

    fn toggle_copy_mode(&mut self) -> Vec<Cmd> {
        if self.copy_saved.is_some() {
            self.exit_copy_mode()
        } else {
            self.enter_copy_mode()
        }
    }

    fn enter_copy_mode(&mut self) -> Vec<Cmd> {
        self.clear_selection();
        self.following = false;
        self.copy_saved = Some(SavedView {
            mode: self.mode,
            stacked: self.stacked,
            borders: self.borders,
            mouse: self.mouse,
            active: self.active,
        });

        if self.mode == ViewMode::Both {
            self.mode = ViewMode::single(self.active);
        }
        self.borders = false;
        self.relayout();

        if self.mouse {
            self.mouse = false;
            vec![Effect::MouseCapture(false).into()]
        } else {
            Vec::new()
        }
    }

    fn exit_copy_mode(&mut self) -> Vec<Cmd> {
        let Some(saved) = self.copy_saved.take() else {
            return Vec::new();
        };
        self.mode = saved.mode;
        self.stacked = saved.stacked;
        self.borders = saved.borders;
        self.active = saved.active;
        self.relayout();

        if saved.mouse {
            self.mouse = true;
            vec![Effect::MouseCapture(true).into()]
        } else {
            Vec::new()
        }
    }

    fn copy_selection(&mut self) -> Vec<Cmd> {
        let Some(selection) = self.selection.filter(|sel| !sel.is_empty()) else {
            self.set_status("Nothing selected");
            return Vec::new();
        };
        let text = selection.extract(&self.panes[selection.pane.index()].visual_lines());
        if text.is_empty() {
            return Vec::new();
        }
        vec![Effect::Clipboard(text).into()]
    }

    fn copy_pane(&mut self) -> Vec<Cmd> {
        let pane = self.pane(self.focused());
        if pane.is_empty() {
            return Vec::new();
        }
        let text = pane.raw_lines().collect::<Vec<_>>().join("\n");
        vec![Effect::Clipboard(text).into()]
    }

    fn open_pager(&mut self) -> Vec<Cmd> {
        let path = self.pane(self.focused()).path.clone();
        if path.is_empty() {
            self.set_status("No log file for this pane");
            return Vec::new();
        }
        vec![Effect::Pager(path).into()]
    }

    fn handle_mouse(&mut self, event: MouseEvent) -> Vec<Cmd> {
        if !self.mouse {
            return Vec::new();
        }

        let (x, y) = (usize::from(event.column), usize::from(event.row));
        let under = self.layout.pane_at(x, y);
        if let Some(id) = under {
            self.active = id;
        }

        match event.kind {
            MouseEventKind::ScrollUp | MouseEventKind::ScrollDown => {
                let target = under.unwrap_or(self.focused());
                let pane = &mut self.panes[target.index()];
                if event.kind == MouseEventKind::ScrollUp {
                    self.following = false;
                    pane.scroll_up(WHEEL_ROWS);
                } else {
                    pane.scroll_down(WHEEL_ROWS);
                }
                self.extend_selection(x, y);
            }
            MouseEventKind::Down(MouseButton::Left) => {
                if let Some(id) = under {
                    self.begin_selection(id, x, y);
                }
            }
            MouseEventKind::Drag(MouseButton::Left) => self.extend_selection(x, y),
            MouseEventKind::Up(MouseButton::Left) => {
                self.extend_selection(x, y);
                if let Some(sel) = self.selection.as_mut()
                    && sel.dragging
                {
                    sel.dragging = false;
                    let id = sel.pane;
                    self.refresh(id);
                }
            }
            _ => {}
        }
        Vec::new()
    }

    fn begin_selection(&mut self, id: PaneId, x: usize, y: usize) {
        let pane = &self.panes[id.index()];
        let point = {
            let lines = pane.visual_lines();
            hit_test(
                &self.layout.geometry(id),
                x,
                y,
                pane.viewport().y_offset,
                &lines,
                HitMode::Strict,
            )
        };
        let Some(point) = point else {
            return;
        };

        self.following = false;
        if let Some(previous) = self.selection.replace(Selection::begin(id, point))
            && previous.pane != id
        {
            self.refresh(previous.pane);
        }
        self.refresh(id);
    }

    fn extend_selection(&mut self, x: usize, y: usize) {
        let Some(mut current) = self.selection.filter(|sel| sel.dragging) else {
            return;
        };
        let pane = &self.panes[current.pane.index()];
        let point = {
            let lines = pane.visual_lines();
            hit_test(
                &self.layout.geometry(current.pane),
                x,
                y,
                pane.viewport().y_offset,
                &lines,
                HitMode::Clamp,
            )
        };

        if let Some(point) = point
            && point != current.cursor
        {
            current.cursor = point;
            self.selection = Some(current);
            self.refresh(current.pane);
        }
    }
}

use std::collections::VecDeque;

use crate::follower::FollowSlot;
use crate::highlight::decorate_line;
use crate::selection::Selection;
use crate::text::{clean_log_line, wrap_line};
use crate::theme::Theme;

pub const DEFAULT_CAPACITY: usize = 5_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaneId {
    Stdout,
    Stderr,
}

impl PaneId {
    pub const ALL: [PaneId; 2] = [PaneId::Stdout, PaneId::Stderr];

    pub fn index(self) -> usize {
        match self {
            Self::Stdout => 0,
            Self::Stderr => 1,
        }
    }

    pub fn other(self) -> Self {
        match self {
            Self::Stdout => Self::Stderr,
            Self::Stderr => Self::Stdout,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Stdout => "STDOUT",
            Self::Stderr => "STDERR",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Decor<'a> {
    pub needle: &'a [char],
    pub selection: Option<&'a Selection>,
    pub theme: &'a Theme,
}

#[derive(Debug, Default)]
struct RenderCache {
    text: String,
    line_starts: Vec<usize>,
}

impl RenderCache {
    fn clear(&mut self) {
        self.text.clear();
        self.line_starts.clear();
    }

    fn push_line(&mut self, decorated: &str) {
        if !self.line_starts.is_empty() {
            self.text.push('\n');
        }
        self.line_starts.push(self.text.len());
        self.text.push_str(decorated);
    }

    fn len(&self) -> usize {
        self.line_starts.len()
    }

    fn line(&self, index: usize) -> Option<&str> {
        let start = *self.line_starts.get(index)?;
        let end = self
            .line_starts
            .get(index + 1)
            .map(|next| next - 1)
            .unwrap_or(self.text.len());
        self.text.get(start..end)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Viewport {
    pub width: usize,
    pub height: usize,
    pub y_offset: usize,
}

#[derive(Debug)]
pub struct Pane {
    id: PaneId,
    pub path: String,
    capacity: usize,
    lines: VecDeque<String>,
    wrapped: VecDeque<Vec<String>>,
    visual_len: usize,
    cache: RenderCache,
    stale: bool,
    viewport: Viewport,
    pub follow: FollowSlot,
}

impl Pane {
    pub fn new(id: PaneId, path: impl Into<String>, capacity: usize) -> Self {
        Self {
            id,
            path: path.into(),
            capacity: capacity.max(1),
            lines: VecDeque::new(),
            wrapped: VecDeque::new(),
            visual_len: 0,
            cache: RenderCache::default(),
            stale: false,
            viewport: Viewport::default(),
            follow: FollowSlot::default(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn raw_lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    pub fn visual_lines(&self) -> Vec<&str> {
        self.wrapped
            .iter()
            .flat_map(|block| block.iter().map(String::as_str))
            .collect()
    }

    pub fn visible_rows(&self) -> impl Iterator<Item = &str> {
        let start = self.viewport.y_offset;
        let end = (start + self.viewport.height).min(self.cache.len());
        (start..end).filter_map(|index| self.cache.line(index))
    }

    /// Appends one raw line from the follow process.
    ///
    /// An append that evicts leaves the render cache stale until
    /// [`Pane::flush_cache`]; offsets and the selection are shifted at once.
    pub fn append(
        &mut self,
        raw: &str,
        needle: &[char],
        theme: &Theme,
        selection: &mut Option<Selection>,
        stick: bool,
    ) {
        let was_at_bottom = self.at_bottom();
        let clean = clean_log_line(raw);

        let block = wrap_line(&clean, self.viewport.width);
        let added = block.len();
        self.lines.push_back(clean);
        self.wrapped.push_back(block);
        self.visual_len += added;

        let mut removed = 0usize;
        while self.lines.len() > self.capacity {
            self.lines.pop_front();
            if let Some(old) = self.wrapped.pop_front() {
                removed += old.len();
            }
        }
        self.visual_len -= removed;

        if removed > 0
            && let Some(current) = selection.as_mut()
            && current.pane == self.id
            && !current.shift_after_eviction(removed)
        {
            *selection = None;
        }

        let decor = Decor {
            needle,
            selection: selection.as_ref(),
            theme,
        };
        if removed > 0 || self.stale {
            self.stale = true;
        } else {
            let first = self.visual_len - added;
            self.render_block(self.wrapped.len() - 1, first, &decor);
        }

        if stick && was_at_bottom {
            self.goto_bottom();
        } else if removed > 0 && self.viewport.y_offset > 0 {
            self.viewport.y_offset = self.viewport.y_offset.saturating_sub(removed);
        }
    }

    pub fn replace_lines<I>(&mut self, raw: I, decor: &Decor, stick: bool)
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.lines = raw
            .into_iter()
            .map(|line| clean_log_line(line.as_ref()))
            .collect();
        let overflow = self.lines.len().saturating_sub(self.capacity);
        self.lines.drain(..overflow);

        self.rewrap_all();
        self.rebuild(decor);
        if stick {
            self.goto_bottom();
        } else {
            self.clamp_offset();
        }
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.wrapped.clear();
        self.visual_len = 0;
        self.cache.clear();
        self.stale = false;
        self.viewport.y_offset = 0;
    }

    pub fn resize(&mut self, width: usize, height: usize, decor: &Decor) {
        self.viewport.height = height;
        if width != self.viewport.width {
            self.viewport.width = width;
            self.rewrap_all();
            self.rebuild(decor);
        }
        self.clamp_offset();
    }

    pub fn flush_cache(&mut self, decor: &Decor) {
        if self.stale {
            self.rebuild(decor);
        }
    }

    pub fn rebuild(&mut self, decor: &Decor) {
        self.stale = false;
        self.cache.clear();
        let mut first = 0usize;
        for block_index in 0..self.wrapped.len() {
            self.render_block(block_index, first, decor);
            first += self.wrapped[block_index].len();
        }
    }

    fn rewrap_all(&mut self) {
        let width = self.viewport.width;
        self.wrapped = self.lines.iter().map(|line| wrap_line(line, width)).collect();
        self.visual_len = self.wrapped.iter().map(Vec::len).sum();
    }

    fn render_block(&mut self, block_index: usize, first_visual: usize, decor: &Decor) {
        let Some(block) = self.wrapped.get(block_index) else {
            return;
        };
        for (offset, line) in block.iter().enumerate() {
            let selected = decor
                .selection
                .and_then(|sel| sel.bounds_for_line(self.id, first_visual + offset, line));
            let decorated = decorate_line(line, decor.needle, selected, decor.theme);
            self.cache.push_line(&decorated);
        }
    }

    pub fn max_offset(&self) -> usize {
        self.visual_len.saturating_sub(self.viewport.height)
    }

    pub fn at_bottom(&self) -> bool {
        self.viewport.y_offset >= self.max_offset()
    }

    pub fn at_top(&self) -> bool {
        self.viewport.y_offset == 0
    }

    pub fn goto_bottom(&mut self) {
        self.viewport.y_offset = self.max_offset();
    }

    pub fn goto_top(&mut self) {
        self.viewport.y_offset = 0;
    }

    pub fn scroll_up(&mut self, rows: usize) {
        self.viewport.y_offset = self.viewport.y_offset.saturating_sub(rows);
    }

    /// Scrolling never moves past the last full screen, but an offset already
    /// beyond it (after a search jump) is left alone.
    pub fn scroll_down(&mut self, rows: usize) {
        let limit = self.max_offset().max(self.viewport.y_offset);
        self.viewport.y_offset = (self.viewport.y_offset + rows).min(limit);
    }

    pub fn jump_to(&mut self, line: usize) {
        self.viewport.y_offset = line.min(self.visual_len.saturating_sub(1));
    }

    /// Only an offset past the last line is pulled back; one between the last
    /// full screen and the last line stays put.
    fn clamp_offset(&mut self) {
        if self.viewport.y_offset > self.visual_len.saturating_sub(1) {
            self.goto_bottom();
        }
    }

    pub fn scroll_percent(&self) -> f64 {
        if self.viewport.height >= self.visual_len {
            return 1.0;
        }
        let percent = self.viewport.y_offset as f64 / self.max_offset() as f64;
        percent.clamp(0.0, 1.0)
    }
}

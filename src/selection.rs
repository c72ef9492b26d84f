use crate::layout::PaneGeometry;
use crate::pane::PaneId;
use crate::text::{char_index_at_column, char_len, char_slice};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct SelectionPoint {
    pub line: usize,
    pub col: usize,
}

impl SelectionPoint {
    pub fn new(line: usize, col: usize) -> Self {
        Self { line, col }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub pane: PaneId,
    pub anchor: SelectionPoint,
    pub cursor: SelectionPoint,
    pub dragging: bool,
}

impl Selection {
    pub fn begin(pane: PaneId, point: SelectionPoint) -> Self {
        Self {
            pane,
            anchor: point,
            cursor: point,
            dragging: true,
        }
    }

    pub fn normalized(&self) -> (SelectionPoint, SelectionPoint) {
        if self.cursor < self.anchor {
            (self.cursor, self.anchor)
        } else {
            (self.anchor, self.cursor)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.anchor == self.cursor && !self.dragging
    }

    pub fn bounds_for_line(&self, pane: PaneId, index: usize, line: &str) -> Option<(usize, usize)> {
        if pane != self.pane {
            return None;
        }
        let (start, end) = self.normalized();
        if index < start.line || index > end.line {
            return None;
        }

        let len = char_len(line);
        let from = if index == start.line { start.col } else { 0 }.min(len);
        let to = if index == end.line { end.col } else { len }.min(len);
        let (from, to) = if to < from { (to, from) } else { (from, to) };
        (to > from).then_some((from, to))
    }

    /// Returns false when every selected line was evicted.
    pub fn shift_after_eviction(&mut self, removed: usize) -> bool {
        if removed == 0 {
            return true;
        }
        if self.anchor.line < removed && self.cursor.line < removed {
            return false;
        }
        self.anchor.line = self.anchor.line.saturating_sub(removed);
        self.cursor.line = self.cursor.line.saturating_sub(removed);
        true
    }

    pub fn extract(&self, lines: &[&str]) -> String {
        let Some(last_index) = lines.len().checked_sub(1) else {
            return String::new();
        };
        let (start, end) = self.normalized();
        let end_line = end.line.min(last_index);
        if start.line > end_line {
            return String::new();
        }

        let mut out = String::new();
        for index in start.line..=end_line {
            let line = lines[index];
            let len = char_len(line);
            let from = if index == start.line { start.col } else { 0 }.min(len);
            let to = if index == end.line { end.col } else { len }.min(len);
            let (from, to) = if to < from { (to, from) } else { (from, to) };

            out.push_str(char_slice(line, from, to));
            if index < end_line {
                out.push('\n');
            }
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitMode {
    Strict,
    Clamp,
}

pub fn hit_test(
    geom: &PaneGeometry,
    x: usize,
    y: usize,
    y_offset: usize,
    lines: &[&str],
    mode: HitMode,
) -> Option<SelectionPoint> {
    let content = geom.content;
    if content.width == 0 || content.height == 0 || !geom.outer.contains(x, y) {
        return None;
    }

    let (local_x, local_y) = match mode {
        HitMode::Strict => {
            if !content.contains(x, y) {
                return None;
            }
            (x - content.x, y - content.y)
        }
        HitMode::Clamp => (
            x.saturating_sub(content.x).min(content.width),
            y.saturating_sub(content.y).min(content.height - 1),
        ),
    };

    let Some(last_index) = lines.len().checked_sub(1) else {
        return Some(SelectionPoint::default());
    };
    let line = (y_offset + local_y).min(last_index);
    let col = char_index_at_column(lines[line], local_x);
    Some(SelectionPoint::new(line, col))
}

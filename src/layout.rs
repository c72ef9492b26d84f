use crate::pane::PaneId;

pub const HEADER_ROWS: usize = 1;
pub const BORDER: usize = 1;
pub const SEARCH_OVERLAY_ROWS: usize = 2;
pub const MIN_CONTENT_WIDTH: usize = 10;
pub const MIN_CONTENT_HEIGHT: usize = 3;

const CHROME_ROWS: usize = HEADER_ROWS + 2 * BORDER;
const CHROME_COLS: usize = 2 * BORDER;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    Both,
    Stdout,
    Stderr,
}

impl ViewMode {
    pub fn single(pane: PaneId) -> Self {
        match pane {
            PaneId::Stdout => Self::Stdout,
            PaneId::Stderr => Self::Stderr,
        }
    }

    pub fn shows(self, pane: PaneId) -> bool {
        match self {
            Self::Both => true,
            Self::Stdout => pane == PaneId::Stdout,
            Self::Stderr => pane == PaneId::Stderr,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl Rect {
    pub fn contains(&self, x: usize, y: usize) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PaneGeometry {
    pub outer: Rect,
    pub content: Rect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutInput {
    pub width: usize,
    pub height: usize,
    pub mode: ViewMode,
    pub stacked: bool,
    /// False in copy mode: no header, no border, no footer.
    pub chrome: bool,
    pub search_overlay: bool,
    pub footer_rows: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    geometry: [PaneGeometry; 2],
    visible: [bool; 2],
}

fn framed(x: usize, y: usize, content_width: usize, content_height: usize) -> PaneGeometry {
    PaneGeometry {
        outer: Rect {
            x,
            y,
            width: content_width + CHROME_COLS,
            height: content_height + CHROME_ROWS,
        },
        content: Rect {
            x: x + BORDER,
            y: y + HEADER_ROWS + BORDER,
            width: content_width,
            height: content_height,
        },
    }
}

impl Layout {
    pub fn compute(input: &LayoutInput) -> Self {
        let top = if input.search_overlay {
            SEARCH_OVERLAY_ROWS
        } else {
            0
        };
        let visible = [
            input.mode.shows(PaneId::Stdout),
            input.mode.shows(PaneId::Stderr),
        ];

        if !input.chrome && input.mode != ViewMode::Both {
            let content = Rect {
                x: 0,
                y: top,
                width: input.width.max(MIN_CONTENT_WIDTH),
                height: input.height.saturating_sub(top).max(MIN_CONTENT_HEIGHT),
            };
            let bare = PaneGeometry {
                outer: content,
                content,
            };
            return Self {
                geometry: [bare, bare],
                visible,
            };
        }

        let avail_height = input
            .height
            .saturating_sub(top)
            .saturating_sub(input.footer_rows);
        let single = framed(
            0,
            top,
            input.width.saturating_sub(CHROME_COLS).max(MIN_CONTENT_WIDTH),
            avail_height
                .saturating_sub(CHROME_ROWS)
                .max(MIN_CONTENT_HEIGHT),
        );

        let geometry = match input.mode {
            ViewMode::Stdout | ViewMode::Stderr => [single, single],
            ViewMode::Both if input.stacked => {
                let width = input.width.saturating_sub(CHROME_COLS).max(MIN_CONTENT_WIDTH);
                let total = avail_height
                    .saturating_sub(2 * CHROME_ROWS)
                    .max(2 * MIN_CONTENT_HEIGHT);
                let first = total / 2;
                let second = total - first;
                let upper = framed(0, top, width, first);
                let lower = framed(0, top + upper.outer.height, width, second);
                [upper, lower]
            }
            ViewMode::Both => {
                let total = input
                    .width
                    .saturating_sub(2 * CHROME_COLS)
                    .max(2 * MIN_CONTENT_WIDTH);
                let left_width = total / 2;
                let right_width = total - left_width;
                let height = single.content.height;
                let left = framed(0, top, left_width, height);
                let right = framed(left.outer.width, top, right_width, height);
                [left, right]
            }
        };

        tracing::trace!(?input, ?geometry, "layout recomputed");
        Self { geometry, visible }
    }

    pub fn geometry(&self, pane: PaneId) -> PaneGeometry {
        self.geometry[pane.index()]
    }

    pub fn is_visible(&self, pane: PaneId) -> bool {
        self.visible[pane.index()]
    }

    pub fn pane_at(&self, x: usize, y: usize) -> Option<PaneId> {
        PaneId::ALL
            .into_iter()
            .find(|pane| self.is_visible(*pane) && self.geometry(*pane).outer.contains(x, y))
    }
}

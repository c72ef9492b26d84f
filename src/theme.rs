use std::collections::HashMap;

use crossterm::style::{Attribute, Color, ContentStyle};

pub const BORDER_ACTIVE: &str = "border.active";
pub const BORDER_INACTIVE: &str = "border.inactive";
pub const TITLE: &str = "title";
pub const TITLE_DIM: &str = "title.dim";
pub const SEARCH_MATCH: &str = "search.match";
pub const SELECTION: &str = "selection";
pub const SELECTION_MATCH: &str = "selection.match";
pub const OVERLAY: &str = "overlay";
pub const HINT: &str = "hint";
pub const STATUS: &str = "status";

#[derive(Debug, Clone)]
pub struct Theme {
    styles: HashMap<&'static str, ContentStyle>,
}

fn style(foreground: Option<Color>, background: Option<Color>, bold: bool) -> ContentStyle {
    let mut style = ContentStyle::new();
    style.foreground_color = foreground;
    style.background_color = background;
    if bold {
        style.attributes.set(Attribute::Bold);
    }
    style
}

impl Theme {
    pub fn dark() -> Self {
        let styles = HashMap::from([
            (BORDER_ACTIVE, style(Some(Color::White), None, false)),
            (BORDER_INACTIVE, style(Some(Color::DarkGrey), None, false)),
            (TITLE, style(Some(Color::White), None, true)),
            (TITLE_DIM, style(Some(Color::DarkGrey), None, false)),
            (SEARCH_MATCH, style(Some(Color::Black), Some(Color::Yellow), true)),
            (SELECTION, style(Some(Color::White), Some(Color::DarkBlue), false)),
            (
                SELECTION_MATCH,
                style(Some(Color::Yellow), Some(Color::DarkBlue), true),
            ),
            (OVERLAY, style(Some(Color::Cyan), None, true)),
            (HINT, style(Some(Color::DarkGrey), None, false)),
            (STATUS, style(Some(Color::DarkCyan), None, false)),
        ]);
        Self { styles }
    }

    pub fn style(&self, category: &str) -> ContentStyle {
        self.styles.get(category).copied().unwrap_or_default()
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::dark()
    }
}

//! Layout primitives built on top of `StyledText`.
//!
//! Layout is a pure function from (widget tree, terminal size) to a 2-D
//! array of styled cells; the actual terminal diffing against the
//! previous frame is delegated to `ratatui`'s `Buffer`, which already
//! implements exactly the diff-render contract spec'd for this layer —
//! these widgets only need to lower `StyledText` into `ratatui::text`
//! and implement `ratatui::widgets::Widget`.

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color as RColor, Modifier, Style as RStyle};
use ratatui::text::{Line, Span};
use ratatui::widgets::Widget;

use crate::styled_text::{Color, Style, StyledText};

pub fn to_ratatui_style(style: Style) -> RStyle {
    let mut rs = RStyle::default();
    if !matches!(style.fg, Color::Default) {
        rs = rs.fg(to_ratatui_color(style.fg));
    }
    if !matches!(style.bg, Color::Default) {
        rs = rs.bg(to_ratatui_color(style.bg));
    }
    let mut modifiers = Modifier::empty();
    if style.bold {
        modifiers |= Modifier::BOLD;
    }
    if style.italic {
        modifiers |= Modifier::ITALIC;
    }
    if style.underline {
        modifiers |= Modifier::UNDERLINED;
    }
    if style.faint {
        modifiers |= Modifier::DIM;
    }
    if style.reverse {
        modifiers |= Modifier::REVERSED;
    }
    rs.add_modifier(modifiers)
}

fn to_ratatui_color(color: Color) -> RColor {
    match color {
        Color::Default => RColor::Reset,
        Color::Rgb(r, g, b) => RColor::Rgb(r, g, b),
    }
}

pub fn to_ratatui_line(text: &StyledText) -> Line<'static> {
    let spans: Vec<Span<'static>> = text.runs().iter().map(|r| Span::styled(r.text.clone(), to_ratatui_style(r.style))).collect();
    Line::from(spans)
}

/// Fixed-size text widget, clipped to its rectangle.
pub struct Text {
    pub content: StyledText,
}

impl Widget for Text {
    fn render(self, area: Rect, buf: &mut Buffer) {
        for (dy, line) in self.content.lines().iter().enumerate() {
            if dy as u16 >= area.height {
                break;
            }
            let clipped = line.truncate(area.width as usize, "");
            buf.set_line(area.x, area.y + dy as u16, &to_ratatui_line(&clipped), area.width);
        }
    }
}

#[derive(Clone, Copy)]
pub enum Size {
    Fixed(u16),
    Weighted(u32),
}

/// Left-to-right composition with per-child fixed or weighted sizing.
pub struct RowLayout<W> {
    pub children: Vec<(Size, W)>,
}

impl<W: Widget> Widget for RowLayout<W> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let widths = split_sizes(area.width, self.children.iter().map(|(s, _)| *s).collect());
        let mut x = area.x;
        for ((_, child), w) in self.children.into_iter().zip(widths) {
            let rect = Rect { x, y: area.y, width: w, height: area.height };
            child.render(rect, buf);
            x += w;
        }
    }
}

/// Top-to-bottom composition with per-child fixed or weighted sizing.
pub struct ColumnLayout<W> {
    pub children: Vec<(Size, W)>,
}

impl<W: Widget> Widget for ColumnLayout<W> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let heights = split_sizes(area.height, self.children.iter().map(|(s, _)| *s).collect());
        let mut y = area.y;
        for ((_, child), h) in self.children.into_iter().zip(heights) {
            let rect = Rect { x: area.x, y, width: area.width, height: h };
            child.render(rect, buf);
            y += h;
        }
    }
}

fn split_sizes(total: u16, sizes: Vec<Size>) -> Vec<u16> {
    let fixed_total: u16 = sizes.iter().filter_map(|s| if let Size::Fixed(n) = s { Some(*n) } else { None }).sum();
    let weight_total: u32 = sizes.iter().filter_map(|s| if let Size::Weighted(w) = s { Some(*w) } else { None }).sum();
    let remaining = total.saturating_sub(fixed_total);
    sizes
        .into_iter()
        .map(|s| match s {
            Size::Fixed(n) => n.min(total),
            Size::Weighted(w) => {
                if weight_total == 0 {
                    0
                } else {
                    ((remaining as u32 * w) / weight_total) as u16
                }
            }
        })
        .collect()
}

/// A scrollable viewport onto a (usually larger) child of `content_size`.
pub struct Portal {
    pub offset: (u16, u16),
    pub content_size: (u16, u16),
    pub lines: Vec<StyledText>,
}

impl Portal {
    pub fn new(lines: Vec<StyledText>, content_width: u16) -> Self {
        let content_size = (content_width, lines.len() as u16);
        Self { offset: (0, 0), content_size, lines }
    }

    /// Scroll by a relative (dx, dy), clamped so the viewport never
    /// scrolls past the child bounds.
    pub fn scroll_by(&mut self, dx: i32, dy: i32, viewport: (u16, u16)) {
        let max_x = self.content_size.0.saturating_sub(viewport.0);
        let max_y = self.content_size.1.saturating_sub(viewport.1);
        self.offset.0 = clamp_scroll(self.offset.0, dx, max_x);
        self.offset.1 = clamp_scroll(self.offset.1, dy, max_y);
    }

    pub fn scroll_page(&mut self, pages: i32, viewport_height: u16) {
        self.scroll_by(0, pages * viewport_height as i32, (0, viewport_height));
    }

    pub fn scroll_home(&mut self) {
        self.offset = (0, 0);
    }

    pub fn scroll_end(&mut self, viewport: (u16, u16)) {
        self.offset.0 = self.content_size.0.saturating_sub(viewport.0);
        self.offset.1 = self.content_size.1.saturating_sub(viewport.1);
    }
}

fn clamp_scroll(current: u16, delta: i32, max: u16) -> u16 {
    let next = current as i32 + delta;
    next.clamp(0, max as i32) as u16
}

impl Widget for &Portal {
    fn render(self, area: Rect, buf: &mut Buffer) {
        for dy in 0..area.height {
            let line_idx = self.offset.1 as usize + dy as usize;
            let Some(line) = self.lines.get(line_idx) else { break };
            let sliced = line.slice(self.offset.0 as usize, self.offset.0 as usize + area.width as usize);
            buf.set_line(area.x, area.y + dy, &to_ratatui_line(&sliced), area.width);
        }
    }
}

/// A single cell's display content plus its hit-test rectangle.
pub struct TableCell {
    pub content: StyledText,
    pub rect: Rect,
}

/// The summary grid. Emits per-(row,col) cell rectangles for mouse hit-testing.
pub struct Table {
    pub rows: Vec<Vec<StyledText>>,
    pub column_widths: Vec<u16>,
    pub gutter: u16,
}

impl Table {
    /// Compute each cell's screen rectangle without rendering, so the
    /// Presenter can hit-test mouse coordinates against it.
    pub fn cell_rects(&self, area: Rect) -> Vec<Vec<Rect>> {
        let mut out = Vec::with_capacity(self.rows.len());
        for (row_idx, row) in self.rows.iter().enumerate() {
            let y = area.y + row_idx as u16;
            if y >= area.y + area.height {
                break;
            }
            let mut x = area.x;
            let mut cells = Vec::with_capacity(row.len());
            for col_idx in 0..row.len() {
                let w = *self.column_widths.get(col_idx).unwrap_or(&8);
                cells.push(Rect { x, y, width: w, height: 1 });
                x += w + self.gutter;
            }
            out.push(cells);
        }
        out
    }
}

impl Widget for &Table {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let rects = self.cell_rects(area);
        for (row, cells) in self.rows.iter().zip(rects.iter()) {
            for (cell, rect) in row.iter().zip(cells.iter()) {
                let clipped = cell.truncate(rect.width as usize, "\u{2026}");
                buf.set_line(rect.x, rect.y, &to_ratatui_line(&clipped), rect.width);
            }
        }
    }
}

/// Shows child panes in landscape or portrait orientation with a
/// resizable focused pane.
pub struct View<W> {
    pub landscape: bool,
    pub primary: W,
    pub secondary: W,
    pub primary_weight: u32,
    pub secondary_weight: u32,
}

impl<W: Widget> Widget for View<W> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let sizes = vec![Size::Weighted(self.primary_weight), Size::Weighted(self.secondary_weight)];
        if self.landscape {
            RowLayout { children: vec![(sizes[0], self.primary), (sizes[1], self.secondary)] }.render(area, buf);
        } else {
            ColumnLayout { children: vec![(sizes[0], self.primary), (sizes[1], self.secondary)] }.render(area, buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_sizes_respects_fixed_and_weighted() {
        let sizes = split_sizes(20, vec![Size::Fixed(5), Size::Weighted(1), Size::Weighted(1)]);
        assert_eq!(sizes[0], 5);
        assert_eq!(sizes[1] + sizes[2], 15);
    }

    #[test]
    fn portal_scroll_clamps_to_bounds() {
        let lines: Vec<StyledText> = (0..10).map(|i| StyledText::plain(format!("line {i}"))).collect();
        let mut portal = Portal::new(lines, 20);
        portal.scroll_by(0, 100, (20, 5));
        assert_eq!(portal.offset.1, 5); // content_size.1 (10) - viewport height (5)
        portal.scroll_by(0, -100, (20, 5));
        assert_eq!(portal.offset.1, 0);
    }

    #[test]
    fn portal_scroll_home_and_end() {
        let lines: Vec<StyledText> = (0..10).map(|i| StyledText::plain(format!("line {i}"))).collect();
        let mut portal = Portal::new(lines, 20);
        portal.scroll_end((20, 4));
        assert_eq!(portal.offset.1, 6);
        portal.scroll_home();
        assert_eq!(portal.offset, (0, 0));
    }

    #[test]
    fn table_cell_rects_apply_gutter() {
        let table = Table {
            rows: vec![vec![StyledText::plain("a"), StyledText::plain("b")]],
            column_widths: vec![4, 4],
            gutter: 1,
        };
        let rects = table.cell_rects(Rect { x: 0, y: 0, width: 20, height: 5 });
        assert_eq!(rects[0][0].x, 0);
        assert_eq!(rects[0][1].x, 5);
    }
}

//! Owns the summary table and result pane, and the scroll/hit-test state
//! that survives between frames. Rendering is otherwise a pure function
//! of `(Model, ToolRegistry, focused body)` onto a `ratatui::Frame`.

use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::widgets::Widget;

use monitor_core::model::{Model, Orientation, Pane};
use monitor_core::path::RepoPath;
use monitor_core::status::Status;
use monitor_core::styled_text::{Color, Style, StyledText};
use monitor_core::widgets::{Portal, Table, Text, View};
use monitor_tools::ToolRegistry;

const PATH_COLUMN_WIDTH: u16 = 32;
const TOOL_COLUMN_WIDTH: u16 = 10;
const GUTTER: u16 = 1;
const MIN_WIDTH: u16 = 10;
const MIN_HEIGHT: u16 = 20;
const LOG_PANE_HEIGHT: u16 = 6;

pub struct Presenter {
    portal: Portal,
    focused_key: Option<(RepoPath, String)>,
    table_scroll: usize,
    summary_area: Rect,
    result_area: Rect,
    visible_rows: Vec<usize>,
    columns: Vec<String>,
}

impl Presenter {
    pub fn new() -> Self {
        Self {
            portal: Portal::new(Vec::new(), 0),
            focused_key: None,
            table_scroll: 0,
            summary_area: Rect::default(),
            result_area: Rect::default(),
            visible_rows: Vec::new(),
            columns: Vec::new(),
        }
    }

    /// Rebuild the result portal when the cursor has moved to a
    /// different (path, tool), or when a body just arrived for the
    /// still-focused cell.
    pub fn sync_focus(&mut self, key: Option<(RepoPath, String)>, body: Option<&StyledText>) {
        if key == self.focused_key && !self.portal.lines.is_empty() {
            return;
        }
        self.focused_key = key;
        let lines = body.map(|b| b.lines()).unwrap_or_default();
        let width = lines.iter().map(|l| l.width()).max().unwrap_or(0) as u16;
        self.portal = Portal::new(lines, width);
    }

    pub fn scroll_result(&mut self, dx: i32, dy: i32) {
        let viewport = (self.result_area.width, self.result_area.height);
        self.portal.scroll_by(dx, dy, viewport);
    }

    pub fn page_result(&mut self, pages: i32) {
        self.portal.scroll_page(pages, self.result_area.height);
    }

    /// Translate a mouse click into (model row index, entry column
    /// index) against the geometry captured by the last `render` call.
    pub fn hit_test_summary(&self, x: u16, y: u16) -> Option<(usize, usize)> {
        let area = self.summary_area;
        if x < area.x || x >= area.x + area.width || y < area.y || y >= area.y + area.height {
            return None;
        }
        let data_row = y.checked_sub(area.y + 1)? as usize; // row 0 is the header
        let model_row = *self.visible_rows.get(data_row)?;

        let mut cx = area.x;
        for (col_idx, width) in std::iter::once(PATH_COLUMN_WIDTH).chain(self.columns.iter().map(|_| TOOL_COLUMN_WIDTH)).enumerate() {
            if x >= cx && x < cx + width {
                return if col_idx == 0 { None } else { Some((model_row, col_idx - 1)) };
            }
            cx += width + GUTTER;
        }
        None
    }

    pub fn render(&mut self, frame: &mut Frame, model: &Model, _registry: &ToolRegistry) {
        let area = frame.area();
        if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
            frame.render_widget(Text { content: StyledText::plain("terminal too small — resize to continue") }, area);
            return;
        }

        if model.help_visible {
            self.render_help(frame, area);
            return;
        }

        let (main_area, log_area) = if model.log_visible && area.height > LOG_PANE_HEIGHT + 4 {
            (Rect { height: area.height - LOG_PANE_HEIGHT, ..area }, Rect { y: area.y + area.height - LOG_PANE_HEIGHT, height: LOG_PANE_HEIGHT, ..area })
        } else {
            (area, Rect { height: 0, ..area })
        };

        self.columns = column_order(model);
        let order = visible_order(model);
        let cursor_pos_in_order = order.iter().position(|&i| i == model.cursor.0).unwrap_or(0);
        let viewport_rows = main_area.height.saturating_sub(1) as usize;
        if cursor_pos_in_order < self.table_scroll {
            self.table_scroll = cursor_pos_in_order;
        } else if viewport_rows > 0 && cursor_pos_in_order >= self.table_scroll + viewport_rows {
            self.table_scroll = cursor_pos_in_order + 1 - viewport_rows;
        }
        let end = (self.table_scroll + viewport_rows.max(1)).min(order.len());
        self.visible_rows = order.get(self.table_scroll..end).map(|s| s.to_vec()).unwrap_or_default();

        if model.fullscreen && model.focus_pane == Pane::Result {
            self.summary_area = Rect { height: 0, ..main_area };
            self.result_area = main_area;
            frame.render_widget(&self.portal, main_area);
        } else {
            let table = self.build_table(model);
            let landscape = model.orientation == Orientation::Landscape;
            let (summary_rect, result_rect) = split_weighted(main_area, landscape, 3, 2);
            self.summary_area = summary_rect;
            self.result_area = result_rect;
            let view = View { landscape, primary: TableWidget(table), secondary: PortalWidget(&self.portal), primary_weight: 3, secondary_weight: 2 };
            view.render(main_area, frame.buffer_mut());
        }

        if log_area.height > 0 {
            let log_text = Text { content: StyledText::plain("log pane (tail of the active tracing-appender file)") };
            frame.render_widget(log_text, log_area);
        }

        if model.paused {
            let banner = Text { content: StyledText::run(" PAUSED ", Style::new().fg(Color::Rgb(0, 0, 0)).bg(Color::Rgb(220, 180, 0))) };
            let rect = Rect { x: area.x, y: area.y, width: 8.min(area.width), height: 1 };
            frame.render_widget(banner, rect);
        }
    }

    fn render_help(&self, frame: &mut Frame, area: Rect) {
        let lines = [
            "h  toggle this help",
            "q  quit",
            "o / t  toggle orientation",
            "l  toggle log pane",
            "e  open in $EDITOR",
            "n / N  next issue / next issue for this tool",
            "s  toggle sort order",
            "r  refresh the focused entry",
            "R  refresh every entry for this tool",
            "f  toggle fullscreen result pane",
            "x  open externally",
            "tab  toggle focus between summary and result panes",
            "arrows, page up/down  move cursor / scroll result",
        ];
        frame.render_widget(Text { content: StyledText::plain(lines.join("\n")) }, area);
    }

    fn build_table(&self, model: &Model) -> Table {
        let mut rows = Vec::with_capacity(self.visible_rows.len() + 1);
        let mut header = vec![StyledText::run("path", Style::new().bold())];
        header.extend(self.columns.iter().map(|name| StyledText::run(name.clone(), Style::new().bold())));
        rows.push(header);

        for &row_idx in &self.visible_rows {
            let row = &model.rows[row_idx];
            let mut cells = vec![StyledText::plain(row.path.as_str())];
            for tool in &self.columns {
                let cell = match row.entries.iter().position(|e| &e.descriptor_name == tool) {
                    Some(col_idx) => {
                        let entry = &row.entries[col_idx];
                        let is_cursor = model.focus_pane == Pane::Summary && model.cursor == (row_idx, col_idx);
                        let mut style = Style::new().fg(status_color(entry.status));
                        if is_cursor {
                            style.reverse = true;
                        }
                        StyledText::run(status_label(entry.status), style)
                    }
                    None => StyledText::plain("·"),
                };
                cells.push(cell);
            }
            rows.push(cells);
        }

        let column_widths = std::iter::once(PATH_COLUMN_WIDTH).chain(self.columns.iter().map(|_| TOOL_COLUMN_WIDTH)).collect();
        Table { rows, column_widths, gutter: GUTTER }
    }
}

impl Default for Presenter {
    fn default() -> Self {
        Self::new()
    }
}

/// Every distinct tool name appearing anywhere in the model, in
/// first-seen order (stable across renders since rows don't reorder
/// their own entries).
fn column_order(model: &Model) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for row in &model.rows {
        for entry in &row.entries {
            if seen.insert(entry.descriptor_name.clone()) {
                out.push(entry.descriptor_name.clone());
            }
        }
    }
    out
}

fn visible_order(model: &Model) -> Vec<usize> {
    model.sorted_row_indices()
}

fn status_label(status: Status) -> &'static str {
    match status {
        Status::Pending => "PEND",
        Status::Running => "RUN",
        Status::Ok => "OK",
        Status::Problem => "PROB",
        Status::NotApplicable => "N/A",
        Status::TimedOut => "TIME",
        Status::Error => "ERR",
        Status::Paused => "PAUSE",
    }
}

fn status_color(status: Status) -> Color {
    match status {
        Status::Pending => Color::Rgb(120, 120, 120),
        Status::Running => Color::Rgb(0, 200, 200),
        Status::Ok => Color::Rgb(0, 200, 0),
        Status::Problem => Color::Rgb(220, 180, 0),
        Status::NotApplicable => Color::Rgb(90, 90, 90),
        Status::TimedOut => Color::Rgb(200, 0, 200),
        Status::Error => Color::Rgb(220, 0, 0),
        Status::Paused => Color::Rgb(80, 80, 220),
    }
}

/// `Table`/`Portal` implement `Widget` on a borrow, not on the owned
/// value; `View<W>` renders `W` by value, so these carry the borrow (or
/// the owned table) through that boundary without an extra clone.
struct TableWidget(Table);
impl Widget for TableWidget {
    fn render(self, area: Rect, buf: &mut ratatui::buffer::Buffer) {
        (&self.0).render(area, buf);
    }
}

struct PortalWidget<'a>(&'a Portal);
impl Widget for PortalWidget<'_> {
    fn render(self, area: Rect, buf: &mut ratatui::buffer::Buffer) {
        self.0.render(area, buf);
    }
}

fn split_weighted(area: Rect, landscape: bool, primary_weight: u32, secondary_weight: u32) -> (Rect, Rect) {
    let total = primary_weight + secondary_weight;
    if landscape {
        let primary_w = (area.width as u32 * primary_weight / total) as u16;
        let primary = Rect { width: primary_w, ..area };
        let secondary = Rect { x: area.x + primary_w, width: area.width - primary_w, ..area };
        (primary, secondary)
    } else {
        let primary_h = (area.height as u32 * primary_weight / total) as u16;
        let primary = Rect { height: primary_h, ..area };
        let secondary = Rect { y: area.y + primary_h, height: area.height - primary_h, ..area };
        (primary, secondary)
    }
}

//! Immutable runs of (codepoint, style).
//!
//! `StyledText` is a sequence of `StyledRun`s, each a `String` sharing
//! one `Style`. All operations (`concat`, `slice`, `pad_*`, `truncate`,
//! `lines`) produce new values; nothing is mutated in place, so a
//! `StyledText` can be freely cloned and compared by value in tests.

use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

/// 24-bit RGB color, plus a "default" sentinel meaning "inherit the
/// terminal's configured foreground/background".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum Color {
    #[default]
    Default,
    Rgb(u8, u8, u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct Style {
    pub fg: Color,
    pub bg: Color,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub faint: bool,
    pub reverse: bool,
}

impl Style {
    pub const fn new() -> Self {
        Self { fg: Color::Default, bg: Color::Default, bold: false, italic: false, underline: false, faint: false, reverse: false }
    }

    pub fn fg(mut self, color: Color) -> Self {
        self.fg = color;
        self
    }

    pub fn bg(mut self, color: Color) -> Self {
        self.bg = color;
        self
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }
}

/// One run of text sharing a single style.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StyledRun {
    pub text: String,
    pub style: Style,
}

/// An immutable sequence of styled runs.
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct StyledText {
    runs: Vec<StyledRun>,
}

impl StyledText {
    pub fn new() -> Self {
        Self { runs: Vec::new() }
    }

    pub fn run(text: impl Into<String>, style: Style) -> Self {
        let text = text.into();
        if text.is_empty() {
            Self::new()
        } else {
            Self { runs: vec![StyledRun { text, style }] }
        }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self::run(text, Style::new())
    }

    pub fn runs(&self) -> &[StyledRun] {
        &self.runs
    }

    /// Concatenate two values into a new one. O(n) in the total run count.
    pub fn concat(&self, other: &StyledText) -> StyledText {
        let mut runs = self.runs.clone();
        runs.extend(other.runs.iter().cloned());
        StyledText { runs }
    }

    /// Display-cell width of the whole value (tabs expand to the next
    /// multiple of 8; see `expand_tabs`).
    pub fn width(&self) -> usize {
        self.runs.iter().map(|r| UnicodeWidthStr::width(expand_tabs(&r.text, 0).as_str())).sum()
    }

    /// Slice by display-cell column range `[i, j)`. Splits runs as needed;
    /// a cut that lands inside a wide grapheme drops that grapheme
    /// entirely rather than rendering a half cell.
    pub fn slice(&self, i: usize, j: usize) -> StyledText {
        if j <= i {
            return StyledText::new();
        }
        let mut out = Vec::new();
        let mut col = 0usize;
        for run in &self.runs {
            let mut piece = String::new();
            for grapheme in run.text.graphemes(true) {
                let w = UnicodeWidthStr::width(grapheme).max(1);
                let start = col;
                let end = col + w;
                col = end;
                if end <= i || start >= j {
                    continue;
                }
                piece.push_str(grapheme);
            }
            if !piece.is_empty() {
                out.push(StyledRun { text: piece, style: run.style });
            }
        }
        StyledText { runs: out }
    }

    pub fn pad_right(&self, width: usize) -> StyledText {
        let w = self.width();
        if w >= width {
            return self.clone();
        }
        let mut out = self.runs.clone();
        out.push(StyledRun { text: " ".repeat(width - w), style: Style::new() });
        StyledText { runs: out }
    }

    pub fn pad_left(&self, width: usize) -> StyledText {
        let w = self.width();
        if w >= width {
            return self.clone();
        }
        let mut out = vec![StyledRun { text: " ".repeat(width - w), style: Style::new() }];
        out.extend(self.runs.iter().cloned());
        StyledText { runs: out }
    }

    /// Truncate to `width` display cells, appending `ellipsis` (width-counted)
    /// when truncation actually removed content. Idempotent: truncating an
    /// already-truncated value to the same width is a no-op.
    pub fn truncate(&self, width: usize, ellipsis: &str) -> StyledText {
        if self.width() <= width {
            return self.clone();
        }
        let ellipsis_width = UnicodeWidthStr::width(ellipsis);
        if ellipsis_width >= width {
            return self.slice(0, width);
        }
        let body = self.slice(0, width - ellipsis_width);
        body.concat(&StyledText::plain(ellipsis))
    }

    /// Split at LF; CRLF is collapsed to a single break.
    pub fn lines(&self) -> Vec<StyledText> {
        let mut lines = vec![Vec::new()];
        for run in &self.runs {
            let mut buf = String::new();
            for ch in run.text.chars() {
                match ch {
                    '\n' => {
                        if buf.ends_with('\r') {
                            buf.pop();
                        }
                        if !buf.is_empty() {
                            lines.last_mut().unwrap().push(StyledRun { text: std::mem::take(&mut buf), style: run.style });
                        }
                        lines.push(Vec::new());
                    }
                    _ => buf.push(ch),
                }
            }
            if !buf.is_empty() {
                lines.last_mut().unwrap().push(StyledRun { text: buf, style: run.style });
            }
        }
        lines.into_iter().map(|runs| StyledText { runs }).collect()
    }

    /// Parse raw tool output (which may embed ANSI/SGR escapes and other
    /// control characters) into styled runs. Recognized SGR codes:
    /// 0 reset, 1 bold, 2 faint, 3 italic, 4 underline, 7 reverse,
    /// 22 bold/faint off, 23 italic off, 24 underline off, 27 reverse off,
    /// 30-37/90-97 standard/bright foreground, 39 default foreground,
    /// 40-47/100-107 standard/bright background, 49 default background,
    /// 38;2;r;g;b / 48;2;r;g;b truecolor. Unrecognized escapes and other
    /// control characters are replaced with a printable `·`.
    pub fn from_ansi(raw: &str) -> StyledText {
        let mut out = Vec::new();
        let mut style = Style::new();
        let mut buf = String::new();
        let mut chars = raw.chars().peekable();

        macro_rules! flush {
            () => {
                if !buf.is_empty() {
                    out.push(StyledRun { text: std::mem::take(&mut buf), style });
                }
            };
        }

        while let Some(ch) = chars.next() {
            if ch == '\u{1b}' && chars.peek() == Some(&'[') {
                chars.next();
                let mut code = String::new();
                let mut terminated = false;
                for c in chars.by_ref() {
                    if c == 'm' {
                        terminated = true;
                        break;
                    }
                    code.push(c);
                }
                if terminated {
                    flush!();
                    apply_sgr(&mut style, &code);
                }
                continue;
            }
            if ch == '\n' || ch == '\t' || ch == '\r' {
                buf.push(ch);
                continue;
            }
            if ch.is_control() {
                buf.push('\u{b7}');
                continue;
            }
            buf.push(ch);
        }
        flush!();
        StyledText { runs: out }
    }
}

fn apply_sgr(style: &mut Style, code: &str) {
    let parts: Vec<i64> = code.split(';').filter_map(|p| if p.is_empty() { Some(0) } else { p.parse().ok() }).collect();
    let parts = if parts.is_empty() { vec![0] } else { parts };
    let mut i = 0;
    while i < parts.len() {
        match parts[i] {
            0 => *style = Style::new(),
            1 => style.bold = true,
            2 => style.faint = true,
            3 => style.italic = true,
            4 => style.underline = true,
            7 => style.reverse = true,
            22 => {
                style.bold = false;
                style.faint = false;
            }
            23 => style.italic = false,
            24 => style.underline = false,
            27 => style.reverse = false,
            39 => style.fg = Color::Default,
            49 => style.bg = Color::Default,
            30..=37 => style.fg = standard_color(parts[i] - 30),
            90..=97 => style.fg = bright_color(parts[i] - 90),
            40..=47 => style.bg = standard_color(parts[i] - 40),
            100..=107 => style.bg = bright_color(parts[i] - 100),
            38 | 48 => {
                if parts.get(i + 1) == Some(&2) {
                    if let (Some(&r), Some(&g), Some(&b)) = (parts.get(i + 2), parts.get(i + 3), parts.get(i + 4)) {
                        let color = Color::Rgb(r as u8, g as u8, b as u8);
                        if parts[i] == 38 {
                            style.fg = color;
                        } else {
                            style.bg = color;
                        }
                    }
                    i += 4;
                }
            }
            _ => {}
        }
        i += 1;
    }
}

fn standard_color(n: i64) -> Color {
    const PALETTE: [(u8, u8, u8); 8] =
        [(0, 0, 0), (205, 49, 49), (13, 188, 121), (229, 229, 16), (36, 114, 200), (188, 63, 188), (17, 168, 205), (229, 229, 229)];
    let (r, g, b) = PALETTE[(n as usize).min(7)];
    Color::Rgb(r, g, b)
}

fn bright_color(n: i64) -> Color {
    const PALETTE: [(u8, u8, u8); 8] =
        [(102, 102, 102), (241, 76, 76), (35, 209, 139), (245, 245, 67), (59, 142, 234), (214, 112, 214), (41, 184, 219), (255, 255, 255)];
    let (r, g, b) = PALETTE[(n as usize).min(7)];
    Color::Rgb(r, g, b)
}

/// Expand tabs to the next multiple of 8, tracking column across runs
/// via the `start_col` the caller already consumed.
pub fn expand_tabs(text: &str, start_col: usize) -> String {
    let mut out = String::with_capacity(text.len());
    let mut col = start_col;
    for ch in text.chars() {
        if ch == '\t' {
            let next_stop = (col / 8 + 1) * 8;
            out.push_str(&" ".repeat(next_stop - col));
            col = next_stop;
        } else {
            out.push(ch);
            col += UnicodeWidthStr::width(ch.to_string().as_str()).max(1);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concat_preserves_runs() {
        let a = StyledText::plain("ab");
        let b = StyledText::run("cd", Style::new().bold());
        let both = a.concat(&b);
        assert_eq!(both.width(), 4);
        assert_eq!(both.runs().len(), 2);
    }

    #[test]
    fn slice_splits_run_boundary() {
        let t = StyledText::plain("hello world");
        assert_eq!(t.slice(0, 5).runs()[0].text, "hello");
        assert_eq!(t.slice(6, 11).runs()[0].text, "world");
    }

    #[test]
    fn pad_left_and_right() {
        let t = StyledText::plain("ab");
        assert_eq!(t.pad_right(5).width(), 5);
        assert_eq!(t.pad_left(5).width(), 5);
    }

    #[test]
    fn truncate_appends_ellipsis_only_when_needed() {
        let t = StyledText::plain("hello world");
        let truncated = t.truncate(7, "...");
        assert_eq!(truncated.width(), 7);
        let short = StyledText::plain("hi");
        assert_eq!(short.truncate(7, "...").width(), 2);
    }

    #[test]
    fn truncate_is_idempotent() {
        let t = StyledText::plain("the quick brown fox");
        let once = t.truncate(10, "...");
        let twice = once.truncate(10, "...");
        assert_eq!(once, twice);
    }

    #[test]
    fn lines_splits_lf_and_collapses_crlf() {
        let t = StyledText::plain("a\r\nb\nc");
        let lines = t.lines();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].runs()[0].text, "a");
        assert_eq!(lines[1].runs()[0].text, "b");
        assert_eq!(lines[2].runs()[0].text, "c");
    }

    #[test]
    fn tabs_expand_to_next_multiple_of_eight() {
        assert_eq!(expand_tabs("a\tb", 0).len(), 9); // "a" + 7 spaces + "b"
        assert_eq!(expand_tabs("\t", 3).len(), 5);
    }

    #[test]
    fn sgr_bold_red_parses() {
        let t = StyledText::from_ansi("\u{1b}[1;31merror\u{1b}[0m: boom");
        let runs = t.runs();
        assert_eq!(runs[0].text, "error");
        assert!(runs[0].style.bold);
        assert_eq!(runs[0].style.fg, standard_color(1));
        assert_eq!(runs[1].text, ": boom");
        assert_eq!(runs[1].style, Style::new());
    }

    #[test]
    fn sgr_truecolor_parses() {
        let t = StyledText::from_ansi("\u{1b}[38;2;10;20;30mhi");
        assert_eq!(t.runs()[0].style.fg, Color::Rgb(10, 20, 30));
    }

    #[test]
    fn control_chars_are_normalized() {
        let t = StyledText::from_ansi("a\u{7}b");
        assert_eq!(t.runs()[0].text, "a\u{b7}b");
    }

    proptest::proptest! {
        #[test]
        fn prop_truncate_idempotent(s in "[a-zA-Z0-9 ]{0,40}", w in 0usize..30) {
            let t = StyledText::plain(s);
            let once = t.truncate(w, "...");
            let twice = once.truncate(w, "...");
            prop_assert_eq!(once, twice);
        }
    }
}

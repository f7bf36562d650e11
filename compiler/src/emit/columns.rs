/// Text buffer that knows its current column, for aligned generated code.
#[derive(Debug, Default)]
pub struct ColumnWriter {
    buf: String,
    col: usize,
}

impl ColumnWriter {
    pub fn new() -> Self {
        ColumnWriter::default()
    }

    /// Appends text within the current line.
    pub fn print(&mut self, text: &str) {
        self.buf.push_str(text);
        self.col += text.chars().count();
    }

    /// Pads with spaces up to column `col`; does nothing when already past it.
    pub fn tab_to(&mut self, col: usize) {
        if col > self.col {
            self.buf.extend(std::iter::repeat(' ').take(col - self.col));
            self.col = col;
        }
    }

    pub fn newline(&mut self) {
        self.buf.push('\n');
        self.col = 0;
    }

    /// Appends a whole line.
    pub fn line(&mut self, text: &str) {
        self.print(text);
        self.newline();
    }

    pub fn blank(&mut self) {
        self.newline();
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }

    pub fn into_string(self) -> String {
        self.buf
    }
}

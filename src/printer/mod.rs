use std::io;

use quick_xml::escape::{escape, partial_escape};

pub mod datasources;
pub mod includes;
pub mod indent;
pub mod presentation;
pub mod readme;
pub mod targets;
pub mod theme;

pub use indent::{indent, IndentOptions, TokenizeError};

pub const PROLOG: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// Line-oriented writer for the plain-text outputs.
pub struct Printer<W> {
    writer: W,
    indentation: String,
    indent: usize,
}

impl<W> Printer<W> {
    pub fn with_indentation(writer: W, indentation: &str) -> Self {
        Self {
            writer,
            indentation: indentation.to_owned(),
            indent: 0,
        }
    }

    pub fn indent(&mut self) {
        self.indent += 1;
    }

    pub fn dedent(&mut self) {
        debug_assert!(self.indent > 0, "dedent below zero");
        self.indent = self.indent.saturating_sub(1);
    }
}

impl<W> Printer<W>
where
    W: io::Write,
{
    /// Writes `line` at the current indentation. Empty lines are not indented.
    pub fn write_line(&mut self, line: &str) -> io::Result<()> {
        if !line.is_empty() {
            self.begin_line()?;
            self.write(line)?;
        }
        writeln!(self.writer)
    }

    pub fn begin_line(&mut self) -> io::Result<()> {
        for _ in 0..self.indent {
            self.writer.write_all(self.indentation.as_bytes())?;
        }
        Ok(())
    }

    pub fn write(&mut self, s: &str) -> io::Result<()> {
        self.writer.write_all(s.as_bytes())
    }

    pub fn write_fmt(&mut self, args: std::fmt::Arguments) -> io::Result<()> {
        self.begin_line()?;
        self.writer.write_fmt(args)
    }
}

/// Builds markup without any whitespace; [`Doc::finish`] indents it.
pub struct Doc {
    buffer: String,
    open: Vec<String>,
}

impl Doc {
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            open: Vec::new(),
        }
    }

    /// A document starting with the UTF-8 prolog.
    pub fn with_prolog() -> Self {
        let mut doc = Self::new();
        doc.asis(PROLOG);
        doc
    }

    pub fn open(&mut self, name: &str, attrs: &[(&str, &str)]) {
        self.buffer.push('<');
        self.buffer.push_str(name);
        self.write_attrs(attrs);
        self.buffer.push('>');
        self.open.push(name.to_owned());
    }

    /// Closes the innermost open tag.
    pub fn close(&mut self) {
        if let Some(name) = self.open.pop() {
            self.buffer.push_str("</");
            self.buffer.push_str(&name);
            self.buffer.push('>');
        }
    }

    /// Opens `name`, runs `body` inside it and closes it again.
    pub fn tag<T>(
        &mut self,
        name: &str,
        attrs: &[(&str, &str)],
        body: impl FnOnce(&mut Self) -> T,
    ) -> T {
        let depth = self.open.len();
        self.open(name, attrs);
        let result = body(self);
        while self.open.len() > depth {
            self.close();
        }
        result
    }

    /// Self-closing tag.
    pub fn stag(&mut self, name: &str, attrs: &[(&str, &str)]) {
        self.buffer.push('<');
        self.buffer.push_str(name);
        self.write_attrs(attrs);
        self.buffer.push_str(" />");
    }

    /// `<name>text</name>` with `text` escaped.
    pub fn line(&mut self, name: &str, text: &str) {
        self.tag(name, &[], |doc| doc.text(text));
    }

    pub fn text(&mut self, text: &str) {
        self.buffer.push_str(&partial_escape(text));
    }

    /// Inserts `markup` unescaped.
    pub fn asis(&mut self, markup: &str) {
        self.buffer.push_str(markup);
    }

    fn write_attrs(&mut self, attrs: &[(&str, &str)]) {
        for (key, value) in attrs {
            self.buffer.push(' ');
            self.buffer.push_str(key);
            self.buffer.push_str("=\"");
            self.buffer.push_str(&escape(*value));
            self.buffer.push('"');
        }
    }

    /// The raw markup, closing whatever is still open.
    pub fn into_markup(mut self) -> String {
        while !self.open.is_empty() {
            self.close();
        }
        self.buffer
    }

    /// Closes everything and indents with the default options.
    pub fn finish(self) -> Result<String, TokenizeError> {
        let mut indented = indent(&self.into_markup(), &IndentOptions::default())?;
        indented.push('\n');
        Ok(indented)
    }
}

impl Default for Doc {
    fn default() -> Self {
        Self::new()
    }
}

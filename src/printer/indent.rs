//! Re-indents generated markup by matching open and close tags.
//!
//! Elements that directly contain non-blank text are written on one line
//! (unless [`IndentOptions::indent_text`] is set), so `<name>x</name>` never
//! turns into three lines.

use std::borrow::Cow;

use ahash::AHashSet;
use quick_xml::{errors::IllFormedError, events::Event, Reader};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenizeError {
    #[error("Malformed markup at byte {position}: {message}")]
    Malformed { position: usize, message: String },
    #[error("Closing tag </{found}> at byte {position} does not match <{expected}>")]
    Mismatched {
        expected: String,
        found: String,
        position: usize,
    },
    #[error("Closing tag </{0}> without an opening tag")]
    UnexpectedClose(String),
    #[error("Tag <{0}> is never closed")]
    Unclosed(String),
}

#[derive(Debug, Clone)]
pub struct IndentOptions {
    pub indentation: String,
    pub newline: String,
    pub indent_text: bool,
    pub blank_is_text: bool,
}

impl Default for IndentOptions {
    fn default() -> Self {
        Self {
            indentation: "  ".to_owned(),
            newline: "\n".to_owned(),
            indent_text: false,
            blank_is_text: false,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Token {
    /// Character data with entity references kept as written.
    Text(String),
    Open(String),
    Close(String),
    /// Empty elements, declarations, comments, CDATA and doctypes.
    Other(String),
}

struct Tokens {
    tokens: Vec<Token>,
    /// Indices of open tags that directly contain text.
    text_parents: AHashSet<usize>,
}

fn lossy(bytes: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(bytes)
}

fn xml_error(error: quick_xml::Error, position: usize) -> TokenizeError {
    match error {
        quick_xml::Error::IllFormed(IllFormedError::MismatchedEndTag { expected, found }) => {
            TokenizeError::Mismatched {
                expected,
                found,
                position,
            }
        }
        quick_xml::Error::IllFormed(IllFormedError::UnmatchedEndTag(name)) => {
            TokenizeError::UnexpectedClose(name)
        }
        quick_xml::Error::IllFormed(IllFormedError::MissingEndTag(name)) => {
            TokenizeError::Unclosed(name)
        }
        other => TokenizeError::Malformed {
            position,
            message: other.to_string(),
        },
    }
}

/// Reads `markup` into layout tokens. Every tag has to be matched.
fn tokenize(markup: &str, blank_is_text: bool) -> Result<Tokens, TokenizeError> {
    let mut reader = Reader::from_str(markup);
    reader.config_mut().trim_text(false);
    reader.config_mut().check_end_names = true;

    let mut tokens: Vec<Token> = Vec::new();
    let mut open: Vec<(usize, String)> = Vec::new();
    let mut text_parents = AHashSet::default();
    loop {
        let event = reader
            .read_event()
            .map_err(|e| xml_error(e, reader.error_position() as usize))?;
        let token = match event {
            Event::Start(e) => {
                open.push((tokens.len(), lossy(e.name().as_ref()).into_owned()));
                Token::Open(format!("<{}>", lossy(&e)))
            }
            Event::End(e) => {
                let found = lossy(e.name().as_ref()).into_owned();
                match open.pop() {
                    Some((_, expected)) if expected == found => {}
                    Some((_, expected)) => {
                        return Err(TokenizeError::Mismatched {
                            expected,
                            found,
                            position: reader.buffer_position() as usize,
                        })
                    }
                    None => return Err(TokenizeError::UnexpectedClose(found)),
                }
                Token::Close(format!("</{found}>"))
            }
            Event::Empty(e) => Token::Other(format!("<{}/>", lossy(&e))),
            Event::Text(e) => Token::Text(lossy(&e).into_owned()),
            Event::GeneralRef(e) => Token::Text(format!("&{};", lossy(&e))),
            Event::CData(e) => Token::Other(format!("<![CDATA[{}]]>", lossy(&e))),
            Event::Comment(e) => Token::Other(format!("<!--{}-->", lossy(&e))),
            Event::Decl(e) => Token::Other(format!("<?{}?>", lossy(&e))),
            Event::PI(e) => Token::Other(format!("<?{}?>", lossy(&e))),
            Event::DocType(e) => Token::Other(format!("<!DOCTYPE {}>", lossy(&e).trim_start())),
            Event::Eof => break,
        };

        if let Token::Text(text) = &token {
            if blank_is_text || !text.trim().is_empty() {
                if let Some((parent, _)) = open.last() {
                    text_parents.insert(*parent);
                }
            }
            // references split text into several events
            if let Some(Token::Text(previous)) = tokens.last_mut() {
                previous.push_str(text);
                continue;
            }
        }
        tokens.push(token);
    }

    match open.pop() {
        Some((_, name)) => Err(TokenizeError::Unclosed(name)),
        None => Ok(Tokens {
            tokens,
            text_parents,
        }),
    }
}

/// Re-indents `markup`. Blank text between tags is dropped unless
/// `blank_is_text` is set. No trailing newline is added.
pub fn indent(markup: &str, options: &IndentOptions) -> Result<String, TokenizeError> {
    let Tokens {
        tokens,
        text_parents,
    } = tokenize(markup, options.blank_is_text)?;

    let mut out = String::with_capacity(markup.len() * 2);
    let mut level = 0usize;
    // > 0 while inside an element that is kept on one line
    let mut same_line = 0usize;
    let mut just_opened = false;
    let mut tag_appeared = false;

    let new_line = |out: &mut String, level: usize, tag_appeared: bool| {
        if tag_appeared {
            out.push_str(&options.newline);
        }
        for _ in 0..level {
            out.push_str(&options.indentation);
        }
    };

    for (i, token) in tokens.iter().enumerate() {
        match token {
            Token::Text(text) => {
                if options.blank_is_text || !text.trim().is_empty() {
                    if same_line == 0 {
                        new_line(&mut out, level, tag_appeared);
                    }
                    out.push_str(text);
                    just_opened = false;
                }
            }
            Token::Open(raw) => {
                just_opened = true;
                if same_line > 0 {
                    same_line += 1;
                } else {
                    new_line(&mut out, level, tag_appeared);
                }
                if !options.indent_text && text_parents.contains(&i) && same_line == 0 {
                    same_line = 1;
                }
                out.push_str(raw);
                level += 1;
                tag_appeared = true;
            }
            Token::Close(raw) => {
                level -= 1;
                tag_appeared = true;
                if same_line > 0 {
                    same_line -= 1;
                } else if !just_opened {
                    new_line(&mut out, level, tag_appeared);
                }
                out.push_str(raw);
                just_opened = false;
            }
            Token::Other(raw) => {
                if same_line == 0 {
                    new_line(&mut out, level, tag_appeared);
                }
                out.push_str(raw);
                just_opened = false;
                tag_appeared = true;
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indent_default(markup: &str) -> Result<String, TokenizeError> {
        indent(markup, &IndentOptions::default())
    }

    #[test]
    fn nested_elements() {
        assert_eq!(
            indent_default(r#"<?xml version="1.0"?><a><b><c>x</c></b><d /></a>"#).unwrap(),
            "<?xml version=\"1.0\"?>\n<a>\n  <b>\n    <c>x</c>\n  </b>\n  <d />\n</a>"
        );
    }

    #[test]
    fn empty_element_stays_on_one_line() {
        assert_eq!(
            indent_default(r#"<a><param name="copyright-text"></param></a>"#).unwrap(),
            "<a>\n  <param name=\"copyright-text\"></param>\n</a>"
        );
    }

    #[test]
    fn mixed_content_is_left_alone() {
        assert_eq!(
            indent_default("<a><p><b>bold</b> text</p></a>").unwrap(),
            "<a>\n  <p><b>bold</b> text</p>\n</a>"
        );
    }

    #[test]
    fn blank_text_is_dropped() {
        assert_eq!(
            indent_default("<a>\n   <b>x</b>\n</a>").unwrap(),
            "<a>\n  <b>x</b>\n</a>"
        );
    }

    #[test]
    fn indent_text_option() {
        let options = IndentOptions {
            indent_text: true,
            ..Default::default()
        };
        assert_eq!(indent("<a>x</a>", &options).unwrap(), "<a>\n  x\n</a>");
    }

    #[test]
    fn quoted_angle_brackets_in_attributes() {
        assert_eq!(
            indent_default(r#"<a title="1 > 0"><b /></a>"#).unwrap(),
            "<a title=\"1 > 0\">\n  <b />\n</a>"
        );
    }

    #[test]
    fn is_idempotent() {
        let once = indent_default("<a><b><c>x</c></b></a>").unwrap();
        assert_eq!(indent_default(&once).unwrap(), once);
    }

    #[test]
    fn entity_references_stay_inline() {
        assert_eq!(
            indent_default("<a><b>R&amp;D &#60;1&gt;</b></a>").unwrap(),
            "<a>\n  <b>R&amp;D &#60;1&gt;</b>\n</a>"
        );
    }

    #[test]
    fn doctype_with_internal_subset() {
        assert_eq!(
            indent_default(r#"<!DOCTYPE a [<!ENTITY e "x">]><a><b>x</b><!-- c --></a>"#).unwrap(),
            "<!DOCTYPE a [<!ENTITY e \"x\">]>\n<a>\n  <b>x</b>\n  <!-- c -->\n</a>"
        );
    }

    #[test]
    fn malformed_markup() {
        assert!(matches!(
            indent_default("<a><b></a>"),
            Err(TokenizeError::Mismatched { ref expected, ref found, .. })
                if expected == "b" && found == "a"
        ));
        assert_eq!(
            indent_default("</a>"),
            Err(TokenizeError::UnexpectedClose("a".to_owned()))
        );
        assert_eq!(
            indent_default("<a><b></b>"),
            Err(TokenizeError::Unclosed("a".to_owned()))
        );
        assert!(matches!(
            indent_default("<a><b"),
            Err(TokenizeError::Malformed { .. })
        ));
    }
}

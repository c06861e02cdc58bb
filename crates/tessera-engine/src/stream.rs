// SPDX-License-Identifier: Apache-2.0 OR MIT
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, ErrorKind};
use crate::safestring::SafeString;

/// Escaping policy applied by an [`OutputStream`].
pub trait Escape: fmt::Debug + Send + Sync {
    fn escape(&self, input: &str) -> String;
}

/// HTML escaping of `&`, `<`, `>` and `'`.
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlEscaper;

impl Escape for HtmlEscaper {
    fn escape(&self, input: &str) -> String {
        let mut out = String::with_capacity(input.len());
        for c in input.chars() {
            match c {
                '&' => out.push_str("&amp;"),
                '<' => out.push_str("&lt;"),
                '>' => out.push_str("&gt;"),
                '\'' => out.push_str("&#39;"),
                _ => out.push(c),
            }
        }
        out
    }
}

/// Escaper that passes text through unchanged, for non-HTML output.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoEscaper;

impl Escape for NoEscaper {
    fn escape(&self, input: &str) -> String {
        input.to_string()
    }
}

/// Render target pairing a text sink with an escaping policy.
///
/// A stream without a sink discards everything written to it; tags use it to
/// evaluate expressions for their value only.
pub struct OutputStream<'a> {
    sink: Option<&'a mut dyn fmt::Write>,
    escaper: Arc<dyn Escape>,
}

impl fmt::Debug for OutputStream<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputStream")
            .field("null", &self.sink.is_none())
            .field("escaper", &self.escaper)
            .finish()
    }
}

impl<'a> OutputStream<'a> {
    pub fn new(sink: &'a mut dyn fmt::Write) -> Self {
        Self::with_escaper(sink, Arc::new(HtmlEscaper))
    }

    pub fn with_escaper(sink: &'a mut dyn fmt::Write, escaper: Arc<dyn Escape>) -> Self {
        Self {
            sink: Some(sink),
            escaper,
        }
    }

    pub fn null() -> OutputStream<'static> {
        OutputStream {
            sink: None,
            escaper: Arc::new(HtmlEscaper),
        }
    }

    pub fn escaper(&self) -> Arc<dyn Escape> {
        Arc::clone(&self.escaper)
    }

    pub fn escape(&self, input: &str) -> String {
        self.escaper.escape(input)
    }

    /// Escapes `input` unless it is already safe.
    pub fn conditional_escape(&self, input: &SafeString) -> String {
        if input.is_safe() {
            input.as_str().to_string()
        } else {
            self.escape(input.as_str())
        }
    }

    /// A stream writing to `sink` with this stream's escaping policy.
    pub fn clone_into<'b>(&self, sink: &'b mut dyn fmt::Write) -> OutputStream<'b> {
        OutputStream::with_escaper(sink, self.escaper())
    }

    /// A sinkless stream with this stream's escaping policy.
    pub fn to_null(&self) -> OutputStream<'static> {
        OutputStream {
            sink: None,
            escaper: self.escaper(),
        }
    }

    /// Writes `text` verbatim.
    pub fn write_str(&mut self, text: &str) -> Result<(), Error> {
        match self.sink.as_mut() {
            Some(sink) => sink.write_str(text).map_err(|err| {
                Error::render_with_source(ErrorKind::TagSyntax, "failed to write output", err)
            }),
            None => Ok(()),
        }
    }

    /// Writes `text`, escaping it first when escaping was deferred to output time.
    pub fn write_safe(&mut self, text: &SafeString) -> Result<(), Error> {
        if self.sink.is_none() {
            return Ok(());
        }
        if text.needs_escape() {
            let escaped = self.escape(text.as_str());
            self.write_str(&escaped)
        } else {
            self.write_str(text.as_str())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_escaping_leaves_double_quotes() {
        assert_eq!(
            HtmlEscaper.escape(r#"<a href="x">Tom & Jerry's</a>"#),
            r#"&lt;a href="x"&gt;Tom &amp; Jerry&#39;s&lt;/a&gt;"#
        );
    }

    #[test]
    fn deferred_escaping_happens_on_write() {
        let mut out = String::new();
        {
            let mut stream = OutputStream::new(&mut out);
            stream
                .write_safe(&SafeString::new("<i>").mark_for_escaping())
                .unwrap();
            stream.write_safe(&SafeString::new("<b>")).unwrap();
        }
        assert_eq!(out, "&lt;i&gt;<b>");
    }

    #[test]
    fn null_stream_discards() {
        let mut stream = OutputStream::null();
        stream.write_str("ignored").unwrap();
        assert_eq!(stream.conditional_escape(&SafeString::safe("<")), "<");
        assert_eq!(stream.conditional_escape(&SafeString::new("<")), "&lt;");
    }
}

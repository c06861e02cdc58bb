// SPDX-License-Identifier: Apache-2.0 OR MIT
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub content: String,
    /// Source line of the first character of the token, counted from 1
    /// (one more than the newlines before it) to match editor line numbers.
    pub line: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Text,
    Variable,
    Block,
    Comment,
}

impl Token {
    fn new(kind: TokenKind, content: &str, line: usize) -> Self {
        Self {
            kind,
            content: content.to_string(),
            line,
        }
    }
}

/// Splits template source into text, variable, block and comment tokens.
///
/// With `smart_trim` enabled, a tag, comment or variable that is the only
/// non-whitespace content on its line swallows the newline before it and the
/// indentation leading up to it.
pub fn tokenize(source: &str, smart_trim: bool) -> Vec<Token> {
    let tokens = Lexer::new(source, smart_trim).run();
    trace!(tokens = tokens.len(), smart_trim, "tokenized template source");
    tokens
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Text,
    BeginSyntax,
    MaybeValue,
    Tag,
    Comment,
    Value,
    EndTag,
    EndComment,
    EndValue,
    PostSyntaxWhitespace,
}

struct Lexer<'a> {
    source: &'a str,
    smart_trim: bool,
    state: State,
    tokens: Vec<Token>,
    processed: usize,
    start: Option<usize>,
    pending: Option<(usize, usize)>,
    line_start: usize,
    counted_upto: usize,
    newlines: usize,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str, smart_trim: bool) -> Self {
        Self {
            source,
            smart_trim,
            state: State::Text,
            tokens: Vec::new(),
            processed: 0,
            start: None,
            pending: None,
            line_start: 0,
            counted_upto: 0,
            newlines: 0,
        }
    }

    fn run(mut self) -> Vec<Token> {
        for (idx, ch) in self.source.char_indices() {
            self.process(idx, ch);
            if ch == '\n' {
                self.line_start = idx + 1;
            }
        }
        self.finish();
        self.tokens
    }

    fn process(&mut self, idx: usize, ch: char) {
        match self.state {
            State::Text => {
                if ch == '{' {
                    self.start = Some(idx);
                    self.state = State::BeginSyntax;
                }
            }
            State::BeginSyntax => match ch {
                '%' => self.state = State::Tag,
                '#' => self.state = State::Comment,
                '{' => self.state = State::MaybeValue,
                _ => self.churn(),
            },
            // `{{` seen: a following `%`, `#` or `{` restarts the syntax one brace later.
            State::MaybeValue => match ch {
                '{' => self.start = Some(idx - 1),
                '%' => {
                    self.start = Some(idx - 1);
                    self.state = State::Tag;
                }
                '#' => {
                    self.start = Some(idx - 1);
                    self.state = State::Comment;
                }
                _ => {
                    self.state = State::Value;
                    self.process(idx, ch);
                }
            },
            State::Tag => self.body(ch, '%', State::EndTag),
            State::Comment => self.body(ch, '#', State::EndComment),
            State::Value => self.body(ch, '}', State::EndValue),
            State::EndTag => self.end(idx, ch, State::Tag),
            State::EndComment => self.end(idx, ch, State::Comment),
            State::EndValue => self.end(idx, ch, State::Value),
            State::PostSyntaxWhitespace => match ch {
                ' ' | '\t' => {}
                '\n' => {
                    self.finish_pending(true);
                    self.state = State::Text;
                }
                _ => {
                    self.finish_pending(false);
                    self.state = State::Text;
                    self.process(idx, ch);
                }
            },
        }
    }

    fn body(&mut self, ch: char, closing: char, end_state: State) {
        if ch == '\n' {
            self.churn();
        } else if ch == closing {
            self.state = end_state;
        }
    }

    fn end(&mut self, idx: usize, ch: char, body_state: State) {
        match ch {
            '\n' => self.churn(),
            '}' => self.close(idx + 1),
            _ => self.state = body_state,
        }
    }

    /// Back to plain text; the pending syntax start is forgotten.
    fn churn(&mut self) {
        self.start = None;
        self.state = State::Text;
    }

    fn close(&mut self, end: usize) {
        let Some(start) = self.start.take() else {
            self.state = State::Text;
            return;
        };
        if self.smart_trim && self.alone_on_line(start) {
            self.pending = Some((start, end));
            self.state = State::PostSyntaxWhitespace;
        } else {
            self.finalize(start, end, false);
            self.state = State::Text;
        }
    }

    fn alone_on_line(&self, start: usize) -> bool {
        self.source[self.line_start..start]
            .chars()
            .all(|c| c == ' ' || c == '\t')
    }

    fn finish_pending(&mut self, trim: bool) {
        if let Some((start, end)) = self.pending.take() {
            self.finalize(start, end, trim);
        }
    }

    fn finalize(&mut self, start: usize, end: usize, trim: bool) {
        let text_end = if trim {
            let newline = self.line_start.saturating_sub(1);
            newline.max(self.processed)
        } else {
            start
        };
        self.push_text(text_end);

        let syntax = &self.source[start..end];
        let kind = match syntax.as_bytes().get(1) {
            Some(b'{') => TokenKind::Variable,
            Some(b'%') => TokenKind::Block,
            _ => TokenKind::Comment,
        };
        let content = syntax[2..syntax.len() - 2].trim();
        let line = self.line_of(start);
        self.tokens.push(Token::new(kind, content, line));
        self.processed = end;
    }

    fn push_text(&mut self, upto: usize) {
        let line = self.line_of(self.processed);
        let text = &self.source[self.processed..upto];
        self.tokens.push(Token::new(TokenKind::Text, text, line));
        self.processed = upto;
    }

    fn finish(&mut self) {
        if self.state == State::PostSyntaxWhitespace {
            self.finish_pending(true);
            // Trailing blanks after a trimmed syntax element at end of input are dropped.
            self.processed = self.source.len();
        }
        self.push_text(self.source.len());
    }

    fn line_of(&mut self, pos: usize) -> usize {
        if pos < self.counted_upto {
            self.counted_upto = 0;
            self.newlines = 0;
        }
        self.newlines += self.source[self.counted_upto..pos].matches('\n').count();
        self.counted_upto = pos;
        self.newlines + 1
    }
}

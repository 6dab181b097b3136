//! CTE decoder: tokenizes text and feeds events through the rules engine.
//!
//! Input may arrive in any number of slices. Each item (a token, a bracket, a
//! comment, a run of markup content or a whole typed array) is parsed
//! atomically: an item cut short by the end of the buffered text is rolled
//! back and retried when more input arrives, so slice boundaries never change
//! the event sequence. Parsing is iterative with an explicit container stack,
//! so nesting depth is bounded only by [`Limits::max_container_depth`] and
//! never by the call stack.

use tracing::debug;

use super::number::{parse_array_float, parse_array_int, parse_number};
use super::{ELEMENT_TYPES, NAMED_VALUES, is_identifier, parse_uuid};
use crate::error::Error;
use crate::event::{ArrayType, ElementType, Event, EventSink, MarkerId};
use crate::limits::Limits;
use crate::rules::Rules;
use crate::util::datetime::{TimeValue, parse_date, parse_time, parse_timestamp};
use crate::util::utf8::Utf8Validator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Top,
    List,
    Map,
    Metadata,
    MarkupAttributes,
    MarkupContent,
}

impl Kind {
    fn is_keyed(self) -> bool {
        matches!(self, Kind::Map | Kind::Metadata | Kind::MarkupAttributes)
    }
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    kind: Kind,
    objects: u64,
}

/// Incremental CTE decoder feeding a validated event stream into `S`.
#[derive(Debug)]
pub struct CteDecoder<S> {
    state: State<S>,
    /// Input not yet consumed by a complete item.
    buffer: Vec<u8>,
    utf8: Utf8Validator,
    /// Line (1-based) and column (characters already on that line) of the
    /// first buffered byte.
    line: usize,
    column: usize,
    /// Bytes consumed before the start of `buffer`.
    offset: u64,
}

/// Parser state kept across `feed` calls.
#[derive(Debug)]
struct State<S> {
    rules: Rules<S>,
    frames: Vec<Frame>,
    /// A key was just completed; `=` must come next.
    awaiting_equals: bool,
    header_done: bool,
    /// Events of the item being parsed, forwarded once it is complete.
    pending: Vec<Event>,
}

impl<S: EventSink> CteDecoder<S> {
    pub fn new(sink: S, limits: Limits) -> Self {
        Self {
            state: State {
                rules: Rules::new(sink, limits),
                frames: vec![Frame {
                    kind: Kind::Top,
                    objects: 0,
                }],
                awaiting_equals: false,
                header_done: false,
                pending: Vec::new(),
            },
            buffer: Vec::new(),
            utf8: Utf8Validator::new(),
            line: 1,
            column: 0,
            offset: 0,
        }
    }

    /// Decodes as many complete items as the buffered input holds.
    pub fn feed(&mut self, data: &[u8]) -> Result<(), Error> {
        self.utf8.feed_all(data)?;
        self.buffer.extend_from_slice(data);
        self.parse(false)
    }

    /// Ends the input, failing if a document is incomplete.
    pub fn finish(mut self) -> Result<S, Error> {
        self.utf8.finish()?;
        self.parse(true)?;
        if self.state.rules.needs_more() {
            return Err(Error::UnexpectedEof { context: "document" });
        }
        self.state.rules.event(Event::EndDocument)?;
        debug!(bytes = self.offset, "CTE document decoded");
        Ok(self.state.rules.into_inner())
    }

    /// Decodes a complete document, returning the sink.
    pub fn decode(mut self, input: &[u8]) -> Result<S, Error> {
        self.feed(input)?;
        self.finish()
    }

    fn parse(&mut self, at_end: bool) -> Result<(), Error> {
        let text = complete_prefix(&self.buffer)?;
        let mut parser = Parser {
            text,
            bytes: text.as_bytes(),
            pos: 0,
            line: self.line,
            column: self.column,
            at_end,
            starved: false,
            state: &mut self.state,
        };
        let result = parser.run();
        let consumed = parser.pos;
        (self.line, self.column) = advance(self.line, self.column, &text.as_bytes()[..consumed]);
        self.offset += consumed as u64;
        self.buffer.drain(..consumed);
        result
    }
}

/// The longest prefix of `bytes` ending on a character boundary. Bytes are
/// validated as they arrive, so only a trailing partial character is cut.
fn complete_prefix(bytes: &[u8]) -> Result<&str, Error> {
    let valid = match std::str::from_utf8(bytes) {
        Ok(text) => return Ok(text),
        Err(e) => e.valid_up_to(),
    };
    std::str::from_utf8(&bytes[..valid]).map_err(|e| Error::InvalidUtf8 {
        offset: e.valid_up_to(),
    })
}

/// Line and column reached after `text`, starting from `line` and `column`.
fn advance(line: usize, column: usize, text: &[u8]) -> (usize, usize) {
    let chars = |bytes: &[u8]| bytes.iter().filter(|&&b| b & 0xC0 != 0x80).count();
    match text.iter().rposition(|&b| b == b'\n') {
        Some(last) => (
            line + text.iter().filter(|&&b| b == b'\n').count(),
            chars(&text[last + 1..]),
        ),
        None => (line, column + chars(text)),
    }
}

struct Parser<'a, 'd, S> {
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
    line: usize,
    column: usize,
    /// No input follows the buffered text.
    at_end: bool,
    /// The current item ran into the end of the buffered text.
    starved: bool,
    state: &'d mut State<S>,
}

/// Where to resume when an item is cut short.
struct Checkpoint {
    pos: usize,
    awaiting_equals: bool,
    depth: usize,
    /// The two innermost frames; a single item never touches the others.
    innermost: [Option<Frame>; 2],
}

/// Bytes that end an unquoted token.
fn is_delimiter(b: u8) -> bool {
    is_separator(b)
        || matches!(b, b'[' | b']' | b'{' | b'}' | b'(' | b')' | b'<' | b'>' | b'=' | b'|' | b'"')
}

/// Whitespace, and the comma, which may separate items like whitespace.
fn is_separator(b: u8) -> bool {
    b.is_ascii_whitespace() || b == b','
}

impl<'a, S: EventSink> Parser<'a, '_, S> {
    /// Parses items until the buffered text runs out.
    fn run(&mut self) -> Result<(), Error> {
        loop {
            let checkpoint = self.checkpoint();
            match self.step() {
                Ok(true) => self.flush()?,
                Ok(false) => return Ok(()),
                Err(_) if self.starved => {
                    self.restore(checkpoint);
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Parses one item; returns false once the text is exhausted.
    fn step(&mut self) -> Result<bool, Error> {
        if !self.state.header_done {
            self.header()?;
            self.state.header_done = true;
            return Ok(true);
        }
        if self.kind() == Kind::MarkupContent {
            self.markup_content()?;
            return Ok(true);
        }
        self.skip_separators();
        if self.is_eof() {
            return Ok(false);
        }
        if self.state.awaiting_equals {
            match (self.peek(), self.peek_at(1)) {
                (Some(b'='), _) => {
                    self.pos += 1;
                    self.state.awaiting_equals = false;
                    return Ok(true);
                }
                // Comments may sit between a key and its '='
                (Some(b'/'), Some(b'*' | b'/')) => {}
                (Some(b'/'), None) => return Err(self.unexpected_end(self.pos, "expected '=' after key")),
                // Closing early is reported by the rules engine
                (Some(b'}' | b')' | b'>'), _) => {}
                _ => return Err(self.error("expected '=' after key")),
            }
        }
        self.structural()?;
        Ok(true)
    }

    fn checkpoint(&self) -> Checkpoint {
        let frames = &self.state.frames;
        let depth = frames.len();
        Checkpoint {
            pos: self.pos,
            awaiting_equals: self.state.awaiting_equals,
            depth,
            innermost: [
                depth.checked_sub(2).and_then(|i| frames.get(i)).copied(),
                frames.last().copied(),
            ],
        }
    }

    fn restore(&mut self, checkpoint: Checkpoint) {
        self.pos = checkpoint.pos;
        self.starved = false;
        self.state.awaiting_equals = checkpoint.awaiting_equals;
        self.state.pending.clear();
        let frames = &mut self.state.frames;
        frames.truncate(checkpoint.depth.saturating_sub(2));
        frames.extend(checkpoint.innermost.into_iter().flatten());
    }

    /// Forwards the events of a completed item to the rules engine.
    fn flush(&mut self) -> Result<(), Error> {
        let state = &mut *self.state;
        for event in state.pending.drain(..) {
            state.rules.event(event)?;
        }
        Ok(())
    }

    // =========================================================================
    // Input helpers
    // =========================================================================

    fn is_eof(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn starts_with(&self, prefix: &str) -> bool {
        self.bytes[self.pos..].starts_with(prefix.as_bytes())
    }

    fn next_char(&mut self) -> Option<char> {
        let c = self.text.get(self.pos..)?.chars().next()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_separators(&mut self) {
        while self.peek().is_some_and(is_separator) {
            self.pos += 1;
        }
    }

    /// Reads up to the next delimiter or comment opener.
    fn read_token(&mut self) -> Result<&'a str, Error> {
        let start = self.pos;
        loop {
            match (self.peek(), self.peek_at(1)) {
                (None, _) | (Some(b'/'), None) if !self.at_end => return Err(self.starve()),
                (None, _) => break,
                (Some(b'/'), Some(b'*' | b'/')) => break,
                (Some(b), _) if is_delimiter(b) => break,
                _ => self.pos += 1,
            }
        }
        Ok(&self.text[start..self.pos])
    }

    /// Marks the current item as cut short by the end of the buffered text.
    fn starve(&mut self) -> Error {
        self.starved = true;
        Error::UnexpectedEof { context: "text" }
    }

    /// The text ended inside an item: wait for more input, or fail with
    /// `message` at `pos` if there is none.
    fn unexpected_end(&mut self, pos: usize, message: &str) -> Error {
        if self.at_end {
            self.error_at(pos, message)
        } else {
            self.starve()
        }
    }

    /// Builds a lexical error at the current position.
    fn error(&self, message: impl Into<String>) -> Error {
        let consumed = &self.bytes[..self.pos.min(self.bytes.len())];
        let (line, column) = advance(self.line, self.column, consumed);
        Error::Lexical {
            line,
            column: column + 1,
            message: message.into(),
        }
    }

    fn error_at(&mut self, pos: usize, message: impl Into<String>) -> Error {
        self.pos = pos;
        self.error(message)
    }

    // =========================================================================
    // Structure
    // =========================================================================

    fn kind(&self) -> Kind {
        self.state.frames.last().map_or(Kind::Top, |f| f.kind)
    }

    fn emit(&mut self, event: Event) {
        self.state.pending.push(event);
    }

    /// Emits a value and counts it as an object of the current container.
    fn value(&mut self, event: Event) -> Result<(), Error> {
        self.emit(event);
        self.completed();
        Ok(())
    }

    fn completed(&mut self) {
        if let Some(frame) = self.state.frames.last_mut() {
            frame.objects += 1;
            if frame.kind.is_keyed() && frame.objects % 2 == 1 {
                self.state.awaiting_equals = true;
            }
        }
    }

    fn open(&mut self, event: Event, kind: Kind) -> Result<(), Error> {
        self.pos += 1;
        self.emit(event);
        self.state.frames.push(Frame { kind, objects: 0 });
        Ok(())
    }

    fn close(&mut self, kind: Kind) -> Result<(), Error> {
        if self.kind() != kind {
            return Err(self.error(format!("unexpected '{}'", char::from(self.bytes[self.pos]))));
        }
        self.pos += 1;
        self.emit(Event::End);
        self.state.awaiting_equals = false;
        self.state.frames.pop();
        if kind != Kind::Metadata {
            self.completed();
        }
        Ok(())
    }

    fn header(&mut self) -> Result<(), Error> {
        match self.peek() {
            Some(b'c' | b'C') => self.pos += 1,
            None => return Err(self.unexpected_end(0, "missing 'c' version header")),
            Some(_) => return Err(self.error("missing 'c' version header")),
        }
        let start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.is_eof() && !self.at_end {
            return Err(self.starve());
        }
        let version: u64 = self.text[start..self.pos]
            .parse()
            .map_err(|_| self.error("invalid version number"))?;
        if self.peek().is_some_and(|b| !b.is_ascii_whitespace()) {
            return Err(self.error("version header must be followed by whitespace"));
        }
        self.emit(Event::BeginDocument);
        self.emit(Event::Version(version));
        Ok(())
    }

    fn structural(&mut self) -> Result<(), Error> {
        let Some(b) = self.peek() else {
            return Ok(());
        };
        match b {
            b'/' if self.peek_at(1) == Some(b'*') => self.block_comment(),
            b'/' if self.peek_at(1) == Some(b'/') => self.line_comment(),
            b'[' => self.open(Event::ListBegin, Kind::List),
            b'{' => self.open(Event::MapBegin, Kind::Map),
            b'(' => self.open(Event::MetadataBegin, Kind::Metadata),
            b'<' => self.begin_markup(),
            b']' => self.close(Kind::List),
            b'}' => self.close(Kind::Map),
            b')' => self.close(Kind::Metadata),
            b'>' => self.end_markup_attributes(),
            b'|' => {
                let starts_content = self
                    .state.frames
                    .last()
                    .is_some_and(|f| f.kind == Kind::MarkupAttributes && f.objects % 2 == 0);
                if starts_content {
                    self.pos += 1;
                    self.emit(Event::End);
                    if let Some(frame) = self.state.frames.last_mut() {
                        frame.kind = Kind::MarkupContent;
                        frame.objects = 0;
                    }
                    Ok(())
                } else {
                    self.typed_array()
                }
            }
            b'"' => {
                let s = self.quoted()?;
                self.value(Event::String(s))
            }
            b'&' => self.marker(),
            b'#' => {
                self.pos += 1;
                let id = self.marker_id()?;
                self.value(Event::Reference(id))
            }
            b'@' => self.named_value(),
            b'-' if self.peek_at(1) == Some(b'@') => self.named_value(),
            b'0'..=b'9' | b'-' | b'+' => self.numeric(),
            b'u' | b't' | b'b' | b'c' if self.peek_at(1) == Some(b'"') => self.prefixed_literal(b),
            _ => self.identifier(),
        }
    }

    // =========================================================================
    // Comments
    // =========================================================================

    fn block_comment(&mut self) -> Result<(), Error> {
        let opened_at = self.pos;
        self.pos += 2;
        self.emit(Event::CommentBegin);
        let mut depth = 1usize;
        let mut start = self.pos;
        while depth > 0 {
            if self.is_eof() {
                return Err(self.unexpected_end(opened_at, "unterminated comment"));
            }
            if self.starts_with("/*") {
                self.comment_text(start);
                self.emit(Event::CommentBegin);
                depth += 1;
                self.pos += 2;
                start = self.pos;
            } else if self.starts_with("*/") {
                self.comment_text(start);
                self.emit(Event::End);
                depth -= 1;
                self.pos += 2;
                start = self.pos;
            } else {
                self.pos += 1;
            }
        }
        Ok(())
    }

    /// Emits the comment text between `start` and the current position.
    fn comment_text(&mut self, start: usize) {
        if start < self.pos {
            let text = self.text[start..self.pos].to_string();
            self.emit(Event::CommentText(text));
        }
    }

    fn line_comment(&mut self) -> Result<(), Error> {
        self.pos += 2;
        let start = self.pos;
        while self.peek().is_some_and(|b| b != b'\n') {
            self.pos += 1;
        }
        if self.is_eof() && !self.at_end {
            return Err(self.starve());
        }
        let text = self.text[start..self.pos].trim_end_matches('\r');
        self.emit(Event::CommentBegin);
        if !text.is_empty() {
            self.emit(Event::CommentText(text.to_string()));
        }
        self.emit(Event::End);
        Ok(())
    }

    // =========================================================================
    // Markup
    // =========================================================================

    fn begin_markup(&mut self) -> Result<(), Error> {
        self.pos += 1;
        self.emit(Event::MarkupBegin);
        let name = match self.peek() {
            Some(b'"') => self.quoted()?,
            _ => {
                let start = self.pos;
                let token = self.read_token()?;
                if !is_identifier(token) {
                    return Err(self.error_at(start, "expected a markup name"));
                }
                token.to_string()
            }
        };
        self.emit(Event::String(name));
        self.state.frames.push(Frame {
            kind: Kind::MarkupAttributes,
            objects: 0,
        });
        Ok(())
    }

    fn end_markup_attributes(&mut self) -> Result<(), Error> {
        if self.kind() != Kind::MarkupAttributes {
            return Err(self.error("unexpected '>'"));
        }
        self.pos += 1;
        self.emit(Event::End);
        self.emit(Event::End);
        self.state.awaiting_equals = false;
        self.state.frames.pop();
        self.completed();
        Ok(())
    }

    /// Reads content text up to the next child markup, comment or `>`.
    fn markup_content(&mut self) -> Result<(), Error> {
        let mut text = String::new();
        loop {
            match self.peek() {
                None => return Err(self.unexpected_end(self.pos, "unterminated markup content")),
                Some(b'<' | b'>') => break,
                Some(b'/') if self.peek_at(1) == Some(b'*') => break,
                Some(b'/') if self.peek_at(1).is_none() && !self.at_end => return Err(self.starve()),
                Some(b'\\') => self.escape(&mut text)?,
                Some(_) => {
                    if let Some(c) = self.next_char() {
                        text.push(c);
                    }
                }
            }
        }
        if !text.is_empty() {
            self.value(Event::String(text))?;
        }
        match self.peek() {
            Some(b'<') => self.begin_markup(),
            Some(b'>') => {
                self.pos += 1;
                self.emit(Event::End);
                self.state.frames.pop();
                self.completed();
                Ok(())
            }
            _ => self.block_comment(),
        }
    }

    // =========================================================================
    // Strings
    // =========================================================================

    fn quoted(&mut self) -> Result<String, Error> {
        let opened_at = self.pos;
        self.pos += 1;
        let mut out = String::new();
        loop {
            match self.peek() {
                None => return Err(self.unexpected_end(opened_at, "unterminated string")),
                Some(b'"') => {
                    self.pos += 1;
                    return Ok(out);
                }
                Some(b'\\') => self.escape(&mut out)?,
                Some(_) => {
                    if let Some(c) = self.next_char() {
                        out.push(c);
                    }
                }
            }
        }
    }

    /// Decodes one escape sequence starting at the backslash.
    fn escape(&mut self, out: &mut String) -> Result<(), Error> {
        let escape_at = self.pos;
        self.pos += 1;
        let Some(c) = self.next_char() else {
            return Err(self.unexpected_end(escape_at, "unterminated escape sequence"));
        };
        match c {
            '\\' | '"' | '/' | '<' | '>' | '|' | '*' => out.push(c),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            '0' => out.push('\0'),
            'u' => {
                match self.peek() {
                    Some(b'{') => self.pos += 1,
                    None => return Err(self.unexpected_end(escape_at, "expected '{' after \\u")),
                    Some(_) => return Err(self.error_at(escape_at, "expected '{' after \\u")),
                }
                let start = self.pos;
                while self.peek().is_some_and(|b| b.is_ascii_hexdigit()) {
                    self.pos += 1;
                }
                if self.is_eof() {
                    return Err(self.unexpected_end(escape_at, "invalid unicode escape"));
                }
                let digits = &self.text[start..self.pos];
                let code = if (1..=6).contains(&digits.len()) && self.peek() == Some(b'}') {
                    u32::from_str_radix(digits, 16).ok().and_then(char::from_u32)
                } else {
                    None
                };
                let Some(c) = code else {
                    return Err(self.error_at(escape_at, "invalid unicode escape"));
                };
                self.pos += 1;
                out.push(c);
            }
            '.' => self.verbatim(escape_at, out)?,
            other => return Err(self.error_at(escape_at, format!("invalid escape '\\{}'", other))),
        }
        Ok(())
    }

    /// `\.SENTINEL<whitespace>text SENTINEL`: text is copied as is.
    fn verbatim(&mut self, escape_at: usize, out: &mut String) -> Result<(), Error> {
        let start = self.pos;
        while self.peek().is_some_and(|b| !b.is_ascii_whitespace()) {
            self.pos += 1;
        }
        let sentinel = &self.text[start..self.pos];
        if sentinel.is_empty() && !self.is_eof() {
            return Err(self.error_at(escape_at, "empty verbatim sentinel"));
        }
        match (self.peek(), self.peek_at(1)) {
            (Some(b'\r'), Some(b'\n')) => self.pos += 2,
            (Some(b'\r'), None) if !self.at_end => return Err(self.starve()),
            (Some(_), _) => self.pos += 1,
            (None, _) => return Err(self.unexpected_end(escape_at, "unterminated verbatim sequence")),
        }
        let Some(len) = self.text[self.pos..].find(sentinel) else {
            return Err(self.unexpected_end(escape_at, "unterminated verbatim sequence"));
        };
        out.push_str(&self.text[self.pos..self.pos + len]);
        self.pos += len + sentinel.len();
        Ok(())
    }

    fn prefixed_literal(&mut self, prefix: u8) -> Result<(), Error> {
        self.pos += 1;
        let event = match prefix {
            b'u' => Event::ResourceId(self.quoted()?),
            b't' => Event::CustomText(self.quoted()?),
            b'b' => Event::Bytes(self.hex_literal()?),
            _ => Event::CustomBinary(self.hex_literal()?),
        };
        self.value(event)
    }

    /// Reads `"hex"`; whitespace between digit pairs is ignored.
    fn hex_literal(&mut self) -> Result<Vec<u8>, Error> {
        let opened_at = self.pos;
        self.pos += 1;
        let mut data = Vec::new();
        let mut high: Option<u8> = None;
        loop {
            let Some(b) = self.peek() else {
                return Err(self.unexpected_end(opened_at, "unterminated binary literal"));
            };
            if b == b'"' {
                break;
            }
            if !b.is_ascii_whitespace() {
                let Some(nibble) = char::from(b).to_digit(16) else {
                    return Err(self.error("invalid hex digit"));
                };
                match high.take() {
                    Some(h) => data.push((h << 4) | nibble as u8),
                    None => high = Some(nibble as u8),
                }
            }
            self.pos += 1;
        }
        if high.is_some() {
            return Err(self.error("odd number of hex digits"));
        }
        self.pos += 1;
        Ok(data)
    }

    fn identifier(&mut self) -> Result<(), Error> {
        let start = self.pos;
        let token = self.read_token()?;
        if let Some(uid) = parse_uuid(token) {
            return self.value(Event::Uid(uid));
        }
        if token.is_empty() {
            let c = self.text[start..].chars().next().unwrap_or('?');
            return Err(self.error_at(start, format!("unexpected character '{}'", c)));
        }
        if !is_identifier(token) {
            return Err(self.error_at(start, format!("invalid unquoted string '{}'", token)));
        }
        self.value(Event::String(token.to_string()))
    }

    // =========================================================================
    // Markers and named values
    // =========================================================================

    fn marker_id(&mut self) -> Result<MarkerId, Error> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.') || !b.is_ascii())
        {
            self.pos += 1;
        }
        if self.is_eof() && !self.at_end {
            return Err(self.starve());
        }
        let text = &self.text[start..self.pos];
        if text.is_empty() {
            return Err(self.error("expected a marker id"));
        }
        Ok(MarkerId::from_text(text))
    }

    fn marker(&mut self) -> Result<(), Error> {
        self.pos += 1;
        let id = self.marker_id()?;
        self.emit(Event::Marker(id));
        Ok(())
    }

    fn named_value(&mut self) -> Result<(), Error> {
        let start = self.pos;
        let token = self.read_token()?;
        if token == "-@inf" {
            return self.value(Event::Float(f64::NEG_INFINITY));
        }
        let event = token
            .strip_prefix('@')
            .and_then(|name| NAMED_VALUES.get(name))
            .cloned();
        match event {
            Some(event) => self.value(event),
            None => Err(self.error_at(start, format!("unknown named value '{}'", token))),
        }
    }

    // =========================================================================
    // Numbers, UUIDs and times
    // =========================================================================

    fn numeric(&mut self) -> Result<(), Error> {
        let start = self.pos;
        let token = self.read_token()?;
        if let Some(uid) = parse_uuid(token) {
            return self.value(Event::Uid(uid));
        }
        let unsigned = token.strip_prefix('-').unwrap_or(token);
        let digits = unsigned.bytes().take_while(u8::is_ascii_digit).count();
        let event = match unsigned.as_bytes().get(digits) {
            Some(b':') if digits > 0 && unsigned.len() == token.len() => parse_time(token)
                .map(|time| Event::Time(TimeValue::Time(time)))
                .map_err(|e| e.message),
            Some(b'-') if digits > 0 && !token.starts_with('+') => {
                if token.contains('/') {
                    parse_timestamp(token)
                        .map(|(date, time)| Event::Time(TimeValue::Timestamp(date, time)))
                        .map_err(|e| e.message)
                } else {
                    parse_date(token)
                        .map(|date| Event::Time(TimeValue::Date(date)))
                        .map_err(|e| e.message)
                }
            }
            _ => parse_number(token).ok_or_else(|| format!("invalid number '{}'", token)),
        };
        match event {
            Ok(event) => self.value(event),
            Err(message) => Err(self.error_at(start, message)),
        }
    }

    // =========================================================================
    // Typed arrays
    // =========================================================================

    fn typed_array(&mut self) -> Result<(), Error> {
        let opened_at = self.pos;
        self.pos += 1;
        let name = self.read_token()?;
        let Some(&(element, radix)) = ELEMENT_TYPES.get(name) else {
            return Err(self.error_at(opened_at, format!("unknown array type '{}'", name)));
        };
        let mut data = Vec::new();
        let mut count = 0u64;
        loop {
            self.skip_separators();
            match self.peek() {
                None => return Err(self.unexpected_end(opened_at, "unterminated typed array")),
                Some(b'|') => {
                    self.pos += 1;
                    break;
                }
                Some(_) => {
                    let start = self.pos;
                    let token = self.read_token()?;
                    if token.is_empty() {
                        return Err(self.error("unexpected character in typed array"));
                    }
                    if !push_element(&mut data, element, radix, count, token) {
                        return Err(self.error_at(start, format!("invalid {} element '{}'", element.name(), token)));
                    }
                    count += 1;
                }
            }
        }
        let event = Event::from_array(ArrayType::Typed(element), count, data)?;
        self.value(event)
    }
}

/// Appends one typed-array element; returns false if it is out of range.
fn push_element(data: &mut Vec<u8>, element: ElementType, radix: u32, index: u64, token: &str) -> bool {
    let int = |min: i128, max: i128| parse_array_int(token, radix).filter(|v| (min..=max).contains(v));
    match element {
        ElementType::Bit => {
            let Some(bit) = int(0, 1) else {
                return false;
            };
            if index % 8 == 0 {
                data.push(0);
            }
            if let Some(last) = data.last_mut() {
                *last |= (bit as u8) << (index % 8);
            }
        }
        ElementType::U8 => match int(0, u8::MAX.into()) {
            Some(v) => data.push(v as u8),
            None => return false,
        },
        ElementType::I8 => match int(i8::MIN.into(), i8::MAX.into()) {
            Some(v) => data.extend_from_slice(&(v as i8).to_le_bytes()),
            None => return false,
        },
        ElementType::U16 => match int(0, u16::MAX.into()) {
            Some(v) => data.extend_from_slice(&(v as u16).to_le_bytes()),
            None => return false,
        },
        ElementType::I16 => match int(i16::MIN.into(), i16::MAX.into()) {
            Some(v) => data.extend_from_slice(&(v as i16).to_le_bytes()),
            None => return false,
        },
        ElementType::U32 => match int(0, u32::MAX.into()) {
            Some(v) => data.extend_from_slice(&(v as u32).to_le_bytes()),
            None => return false,
        },
        ElementType::I32 => match int(i32::MIN.into(), i32::MAX.into()) {
            Some(v) => data.extend_from_slice(&(v as i32).to_le_bytes()),
            None => return false,
        },
        ElementType::U64 => match int(0, u64::MAX.into()) {
            Some(v) => data.extend_from_slice(&(v as u64).to_le_bytes()),
            None => return false,
        },
        ElementType::I64 => match int(i64::MIN.into(), i64::MAX.into()) {
            Some(v) => data.extend_from_slice(&(v as i64).to_le_bytes()),
            None => return false,
        },
        ElementType::F16 => match parse_array_float(token) {
            // bfloat16 keeps the upper half of the f32 bits
            Some(v) => data.extend_from_slice(&(((v as f32).to_bits() >> 16) as u16).to_le_bytes()),
            None => return false,
        },
        ElementType::F32 => match parse_array_float(token) {
            Some(v) => data.extend_from_slice(&(v as f32).to_le_bytes()),
            None => return false,
        },
        ElementType::F64 => match parse_array_float(token) {
            Some(v) => data.extend_from_slice(&v.to_le_bytes()),
            None => return false,
        },
        ElementType::Uid => match parse_uuid(token) {
            Some(uid) => data.extend_from_slice(&uid),
            None => return false,
        },
    }
    true
}

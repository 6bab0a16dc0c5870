use std::fmt;
use std::io;

/// Top-level error type for the crate.
#[derive(Debug)]
pub enum SynapseqError {
    Parse(ParseError),
    Format(FormatError),
    Render(RenderError),
    Io(io::Error),
}

/// A parse or validation error, contextualized with the source line.
///
/// `line` is 1-based; `text` is the offending line verbatim. Errors raised
/// during end-of-file validation carry the last line seen.
#[derive(Debug)]
pub struct ParseError {
    pub line: usize,
    pub text: String,
    pub kind: ParseErrorKind,
}

/// What went wrong on a line. The compiler is fail-fast: none of these are
/// ever retried, the caller decides whether to abort or report.
#[derive(Debug)]
pub enum ParseErrorKind {
    /// Unexpected token, wrong arity, malformed number.
    Lexical(String),
    /// Out-of-range value or unknown keyword combination.
    Semantic(String),
    /// Section-ordering, preset-count, or template-misuse violations.
    Structural(String),
    /// Illegal transition between adjacent periods.
    Adjacency(String),
}

impl ParseErrorKind {
    /// Attach line context, producing a full [`ParseError`].
    pub fn at(self, line: usize, text: &str) -> ParseError {
        ParseError {
            line,
            text: text.to_string(),
            kind: self,
        }
    }
}

/// WAV container / embedded-metadata errors.
#[derive(Debug)]
pub enum FormatError {
    /// The file carries no ICMT metadata chunk at all.
    NoMetadata,
    /// The ICMT payload is present but a required field is missing.
    MissingField(&'static str),
    /// A RIFF chunk is malformed or truncated.
    MalformedChunk(String),
    /// The CONTENT payload is not valid base64.
    InvalidContent(String),
}

/// Renderer construction or streaming failure. Fatal to that render.
#[derive(Debug)]
pub enum RenderError {
    InvalidOptions(String),
    Background(String),
    /// The consumer side of a render rejected a buffer or went away.
    Consumer(String),
}

impl fmt::Display for SynapseqError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SynapseqError::Parse(e) => write!(f, "{e}"),
            SynapseqError::Format(e) => write!(f, "{e}"),
            SynapseqError::Render(e) => write!(f, "{e}"),
            SynapseqError::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Errors from structured input have no line context (line 0).
        if self.line == 0 {
            write!(f, "{}", self.kind)
        } else if self.text.is_empty() {
            write!(f, "line {}: {}", self.line, self.kind)
        } else {
            write!(f, "line {}: {}: {}", self.line, self.kind, self.text)
        }
    }
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseErrorKind::Lexical(msg)
            | ParseErrorKind::Semantic(msg)
            | ParseErrorKind::Structural(msg)
            | ParseErrorKind::Adjacency(msg) => write!(f, "{msg}"),
        }
    }
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatError::NoMetadata => write!(f, "no ICMT metadata found in WAV"),
            FormatError::MissingField(field) => {
                write!(f, "invalid metadata: missing field {field}")
            }
            FormatError::MalformedChunk(msg) => write!(f, "malformed RIFF chunk: {msg}"),
            FormatError::InvalidContent(msg) => write!(f, "invalid metadata content: {msg}"),
        }
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::InvalidOptions(msg) => write!(f, "invalid renderer options: {msg}"),
            RenderError::Background(msg) => write!(f, "background audio: {msg}"),
            RenderError::Consumer(msg) => write!(f, "audio consumer: {msg}"),
        }
    }
}

impl std::error::Error for SynapseqError {}
impl std::error::Error for ParseError {}
impl std::error::Error for FormatError {}
impl std::error::Error for RenderError {}

impl From<ParseError> for SynapseqError {
    fn from(e: ParseError) -> Self {
        SynapseqError::Parse(e)
    }
}

impl From<FormatError> for SynapseqError {
    fn from(e: FormatError) -> Self {
        SynapseqError::Format(e)
    }
}

impl From<RenderError> for SynapseqError {
    fn from(e: RenderError) -> Self {
        SynapseqError::Render(e)
    }
}

impl From<io::Error> for SynapseqError {
    fn from(e: io::Error) -> Self {
        SynapseqError::Io(e)
    }
}

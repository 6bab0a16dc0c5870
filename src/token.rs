use crate::error::ParseErrorKind;

/// Cursor over the whitespace-delimited tokens of a single input line.
///
/// Supports one token of lookahead via [`peek`](LineCursor::peek) and
/// backtracking via [`rewind`](LineCursor::rewind), which the track grammar
/// uses to probe for an optional leading `waveform <shape>` prefix.
pub struct LineCursor<'a> {
    /// The raw line, kept for error messages.
    pub raw: &'a str,
    tokens: Vec<&'a str>,
    idx: usize,
}

impl<'a> LineCursor<'a> {
    pub fn new(line: &'a str) -> Self {
        LineCursor {
            raw: line,
            tokens: line.split_whitespace().collect(),
            idx: 0,
        }
    }

    /// Number of tokens on the line.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Next token without advancing.
    pub fn peek(&self) -> Option<&'a str> {
        self.tokens.get(self.idx).copied()
    }

    /// Next token, advancing the cursor.
    pub fn next(&mut self) -> Option<&'a str> {
        let tok = self.tokens.get(self.idx).copied();
        if tok.is_some() {
            self.idx += 1;
        }
        tok
    }

    /// Move the cursor back by `n` tokens, saturating at the start.
    pub fn rewind(&mut self, n: usize) {
        self.idx = self.idx.saturating_sub(n);
    }

    /// All tokens from the current position to the end of the line, joined
    /// with single spaces. Advances to the end.
    pub fn rest(&mut self) -> String {
        let joined = self.tokens[self.idx..].join(" ");
        self.idx = self.tokens.len();
        joined
    }

    /// Consume the next token, requiring it to be one of `wants`.
    pub fn expect_one_of(&mut self, wants: &[&str]) -> Result<&'a str, ParseErrorKind> {
        match self.next() {
            None => Err(ParseErrorKind::Lexical(format!(
                "expected one of {wants:?}, got end of line"
            ))),
            Some(tok) if wants.contains(&tok) => Ok(tok),
            Some(tok) => Err(ParseErrorKind::Lexical(format!(
                "expected one of {wants:?}, got {tok:?}"
            ))),
        }
    }

    /// Consume the next token as a float. Strict: the whole token must
    /// parse, and NaN, infinities, and scientific notation are rejected.
    pub fn next_f64_strict(&mut self) -> Result<f64, ParseErrorKind> {
        let tok = self.next().ok_or_else(|| {
            ParseErrorKind::Lexical("expected number, got end of line".to_string())
        })?;

        let value: f64 = tok
            .parse()
            .map_err(|_| ParseErrorKind::Lexical(format!("invalid number: {tok:?}")))?;

        if value.is_nan() || value.is_infinite() {
            return Err(ParseErrorKind::Lexical(format!(
                "invalid number (NaN or Inf): {tok:?}"
            )));
        }
        if tok.contains(['e', 'E']) {
            return Err(ParseErrorKind::Lexical(format!(
                "scientific notation not allowed: {tok:?}"
            )));
        }

        Ok(value)
    }

    /// Consume the next token as an integer.
    pub fn next_int_strict(&mut self) -> Result<i64, ParseErrorKind> {
        let tok = self.next().ok_or_else(|| {
            ParseErrorKind::Lexical("expected integer, got end of line".to_string())
        })?;
        tok.parse()
            .map_err(|_| ParseErrorKind::Lexical(format!("invalid integer: {tok:?}")))
    }

    /// Error if any token remains after a complete grammar match.
    pub fn expect_end(&mut self) -> Result<(), ParseErrorKind> {
        match self.peek() {
            None => Ok(()),
            Some(tok) => Err(ParseErrorKind::Lexical(format!(
                "unexpected token after definition: {tok:?}"
            ))),
        }
    }
}

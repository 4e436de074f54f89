//! Splitting of an (already expanded) command line into word tokens.
//!
//! Tokenization is purely structural: spaces separate words, double quotes group
//! them and a backslash protects the next character. Backslash sequences are kept
//! verbatim in the tokens; turning `\n` into a newline is a separate pass,
//! [`resolve_escapes`], that only content-producing commands apply.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexingState {
    /// Between words.
    Start,
    ReadingWord,
    ReadingDoubleQuote,
}

struct LexingFSM {
    input: Vec<char>,
    pos: usize,
    state: LexingState,
    buffer: String,
}

impl LexingFSM {
    fn new(line: &str) -> Self {
        LexingFSM {
            input: line.chars().collect(),
            pos: 0,
            state: LexingState::Start,
            buffer: String::new(),
        }
    }

    /// Runs the machine over the whole input in a single left-to-right scan.
    ///
    /// Never fails: an unterminated quote simply ends with the line and a lone
    /// trailing backslash stays in the token as a literal.
    fn make_tokens(&mut self) -> Vec<String> {
        let mut out = Vec::new();

        while let Some(ch) = self.read_char() {
            match self.state {
                LexingState::Start => self.handle_start(ch),
                LexingState::ReadingWord => self.handle_word(ch, &mut out),
                LexingState::ReadingDoubleQuote => self.handle_double_quote(ch),
            }
        }

        self.finalize_word(&mut out);
        out
    }

    fn read_char(&mut self) -> Option<char> {
        let ch = self.input.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn handle_start(&mut self, ch: char) {
        match ch {
            ' ' => {}
            '"' => self.state = LexingState::ReadingDoubleQuote,
            '\\' => {
                self.push_escape();
                self.state = LexingState::ReadingWord;
            }
            c => {
                self.buffer.push(c);
                self.state = LexingState::ReadingWord;
            }
        }
    }

    fn handle_word(&mut self, ch: char, out: &mut Vec<String>) {
        match ch {
            ' ' => {
                self.finalize_word(out);
                self.state = LexingState::Start;
            }
            '"' => self.state = LexingState::ReadingDoubleQuote,
            '\\' => self.push_escape(),
            c => self.buffer.push(c),
        }
    }

    fn handle_double_quote(&mut self, ch: char) {
        match ch {
            '"' => self.state = LexingState::ReadingWord,
            '\\' => self.push_escape(),
            c => self.buffer.push(c),
        }
    }

    /// Keeps the backslash and the character it protects, whatever that is.
    fn push_escape(&mut self) {
        self.buffer.push('\\');
        if let Some(next) = self.read_char() {
            self.buffer.push(next);
        }
    }

    fn finalize_word(&mut self, out: &mut Vec<String>) {
        if !self.buffer.is_empty() {
            out.push(std::mem::take(&mut self.buffer));
        }
    }
}

/// Split `line` into tokens.
///
/// Consecutive spaces never produce empty tokens, and a quoted region contributes
/// to exactly one token no matter how many spaces it holds. Blank input gives an
/// empty vector.
pub fn split_into_tokens(line: &str) -> Vec<String> {
    LexingFSM::new(line).make_tokens()
}

/// Interpret backslash sequences for literal output.
///
/// `\n`, `\t` and `\r` become the control characters; any other escaped character
/// stands for itself (so `\"` is a quote and `\\` a backslash). A trailing lone
/// backslash is kept.
pub fn resolve_escapes(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            output.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => output.push('\n'),
            Some('t') => output.push('\t'),
            Some('r') => output.push('\r'),
            Some(other) => output.push(other),
            None => output.push('\\'),
        }
    }
    output
}

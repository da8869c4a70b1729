//
// Lexer that breaks a HOCON document into a flat stream of tokens for the grammar/tree-builder
// stage to shape further:
//
// - QuotedString: a '"..."' string, escapes left untouched for the parser to unescape
// - TripleQuotedString: a '"""..."""' string, no escape processing
// - Substitution: a "${path}" or "${?path}" placeholder
// - Number: any integer or decimal literal from the grammar
// - Comment: a "#" or "//" line comment
// - OpenCurly / CloseCurly / OpenBracket / CloseBracket / OpenParen / CloseParen
// - Equals / Colon / PlusEquals / Comma
// - Unquoted: any other run of characters, including keywords, booleans, null and bare numbers
//   that don't stand alone (e.g. "128m")
//

#[macro_use]
extern crate lazy_static;

use std::str;

use regex::Regex;

const TAB: u8 = 9;
const NEWLINE: u8 = 10;
const CARRIAGE_RETURN: u8 = 13;
const SPACE: u8 = 32;
const DOUBLE_QUOTE: u8 = 34;
const BACKSLASH: u8 = 92;
const DOLLAR: u8 = 36;
const COMMA: u8 = 44;
const COLON: u8 = 58;
const EQUALS: u8 = 61;
const PLUS: u8 = 43;
const HASH: u8 = 35;
const SLASH: u8 = 47;
const OPEN_CURLY: u8 = 123;
const CLOSE_CURLY: u8 = 125;
const OPEN_BRACKET: u8 = 91;
const CLOSE_BRACKET: u8 = 93;
const OPEN_PAREN: u8 = 40;
const CLOSE_PAREN: u8 = 41;

lazy_static! {
    static ref NUMBER_PATTERN: Regex =
        Regex::new(r"^[+-]?(\d+(\.\d+)?|\.\d+)([eE][+-]?\d+)?$").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TokenType {
    QuotedString,
    TripleQuotedString,
    Substitution,
    Number,
    Comment,
    OpenCurly,
    CloseCurly,
    OpenBracket,
    CloseBracket,
    OpenParen,
    CloseParen,
    Equals,
    Colon,
    PlusEquals,
    Comma,
    WhiteSpace,
    LineBreak,
    Unquoted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    pub token_type: TokenType,
    pub span: (usize, usize),
    pub text: &'a str,
}

impl Token<'_> {
    pub fn is_whitespace(&self) -> bool {
        matches!(self.token_type, TokenType::WhiteSpace)
    }

    pub fn is_line_break(&self) -> bool {
        matches!(self.token_type, TokenType::LineBreak)
    }

    pub fn is_trivia(&self) -> bool {
        matches!(
            self.token_type,
            TokenType::WhiteSpace | TokenType::LineBreak | TokenType::Comment
        )
    }
}

pub trait DebugTokenExt {
    fn human_readable_string(&self) -> String;
}

impl DebugTokenExt for Token<'_> {
    fn human_readable_string(&self) -> String {
        format!(
            "{:<20} {:<15} {:?}\n",
            format!("{:?}", self.token_type),
            format!("{} -> {}", self.span.0, self.span.1),
            self.text,
        )
    }
}

impl DebugTokenExt for Vec<Token<'_>> {
    fn human_readable_string(&self) -> String {
        let mut output = String::new();

        for token in self {
            output.push_str(&token.human_readable_string());
        }

        output
    }
}

/// 1-based cursor position in a text file
pub struct TextPosition {
    pub line: usize,
    pub col: usize,
}

impl TextPosition {
    pub fn from_buffer_index(buffer: &[u8], index: usize) -> Self {
        let mut line = 1;
        let mut col = 1;

        for (i, c) in buffer.iter().enumerate() {
            if i == index {
                break;
            }

            if *c == NEWLINE {
                line += 1;
                col = 1;
            } else {
                col += 1;
            }
        }

        Self { line, col }
    }
}

impl core::fmt::Display for TextPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {} col {}", self.line, self.col)
    }
}

#[derive(Debug)]
pub struct LexerError {
    pub message: String,
    pub position: usize,
}

impl std::fmt::Display for LexerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for LexerError {}

pub struct ScanIterator<'a> {
    buffer: &'a [u8],
    cursor: usize,
}

impl<'a> Iterator for ScanIterator<'a> {
    type Item = Result<Token<'a>, LexerError>;

    fn next(&mut self) -> Option<Self::Item> {
        match next_token(self.buffer, self.cursor) {
            Ok(Some((next_cursor, token))) => {
                self.cursor = next_cursor;
                Some(Ok(token))
            }
            Ok(None) => None,
            Err(error) => {
                // Advance past the end so further calls stop producing tokens
                self.cursor = self.buffer.len();
                Some(Err(error))
            }
        }
    }
}

pub fn scan(buffer: &[u8]) -> ScanIterator {
    ScanIterator { buffer, cursor: 0 }
}

/// Reads the next token from the buffer, returns None on EOF
fn next_token(buffer: &[u8], cursor: usize) -> Result<Option<(usize, Token)>, LexerError> {
    let char = match buffer.get(cursor) {
        Some(char) => char,
        None => return Ok(None),
    };

    macro_rules! get_str {
        ($length:expr) => {
            str::from_utf8(buffer.get(cursor..cursor + $length).unwrap())
                .map_err(|err| LexerError {
                    message: format!("{}", err),
                    position: cursor,
                })?
        };
    }

    macro_rules! read_token {
        ($token_type:expr, $length:expr) => {{
            let token = Token {
                token_type: $token_type,
                span: (cursor, cursor + $length - 1),
                text: get_str!($length),
            };

            Ok(Some((cursor + $length, token)))
        }};
    }

    if *char == OPEN_CURLY {
        read_token!(TokenType::OpenCurly, 1)
    } else if *char == CLOSE_CURLY {
        read_token!(TokenType::CloseCurly, 1)
    } else if *char == OPEN_BRACKET {
        read_token!(TokenType::OpenBracket, 1)
    } else if *char == CLOSE_BRACKET {
        read_token!(TokenType::CloseBracket, 1)
    } else if *char == OPEN_PAREN {
        read_token!(TokenType::OpenParen, 1)
    } else if *char == CLOSE_PAREN {
        read_token!(TokenType::CloseParen, 1)
    } else if *char == COMMA {
        read_token!(TokenType::Comma, 1)
    } else if *char == COLON {
        read_token!(TokenType::Colon, 1)
    } else if *char == PLUS && buffer.get(cursor + 1) == Some(&EQUALS) {
        read_token!(TokenType::PlusEquals, 2)
    } else if *char == EQUALS {
        read_token!(TokenType::Equals, 1)
    } else if let Some(len) = scan_whitespace(buffer, cursor) {
        read_token!(TokenType::WhiteSpace, len)
    } else if let Some(len) = scan_line_break(buffer, cursor) {
        read_token!(TokenType::LineBreak, len)
    } else if let Some(len) = scan_comment(buffer, cursor) {
        read_token!(TokenType::Comment, len)
    } else if let Some(len) = scan_triple_quoted_string(buffer, cursor)? {
        read_token!(TokenType::TripleQuotedString, len)
    } else if let Some(len) = scan_quoted_string(buffer, cursor)? {
        read_token!(TokenType::QuotedString, len)
    } else if let Some(len) = scan_substitution(buffer, cursor)? {
        read_token!(TokenType::Substitution, len)
    } else if let Some(len) = scan_unquoted(buffer, cursor) {
        let str = get_str!(len);

        if NUMBER_PATTERN.is_match(str) {
            read_token!(TokenType::Number, len)
        } else {
            read_token!(TokenType::Unquoted, len)
        }
    } else {
        Err(LexerError {
            message: format!("Unexpected character at position {}: {:?}", cursor, *char as char),
            position: cursor,
        })
    }
}

/// Checks if there is a "${...}" / "${?...}" substitution placeholder at the current position
fn scan_substitution(buffer: &[u8], cursor: usize) -> Result<Option<usize>, LexerError> {
    if !(buffer.get(cursor) == Some(&DOLLAR) && buffer.get(cursor + 1) == Some(&OPEN_CURLY)) {
        return Ok(None);
    }

    let mut i = cursor + 2;

    loop {
        match buffer.get(i) {
            Some(&CLOSE_CURLY) => break,
            Some(_) => i += 1,
            None => {
                return Err(LexerError {
                    message: format!(
                        "Unexpected end of input, substitution started at {} was never closed",
                        TextPosition::from_buffer_index(buffer, cursor),
                    ),
                    position: cursor,
                })
            }
        }
    }

    let mut end = i + 1; // Past the closing brace

    while buffer.get(end).map_or(false, |c| [SPACE, TAB].contains(c)) {
        end += 1;
    }

    Ok(Some(end - cursor))
}

/// Checks if there is a triple-quoted string at the current position
///
/// Implements the "longest body that still leaves a terminating triple-quote" rule: scans for
/// the first run of 3+ quotes after the opening, then picks the split that consumes every quote
/// except the final three into the string body, matching pyparsing's observed `""".*?"*"""`
/// behavior for inputs like `""""a"""` (body `"a`).
fn scan_triple_quoted_string(
    buffer: &[u8],
    cursor: usize,
) -> Result<Option<usize>, LexerError> {
    if !(buffer.get(cursor) == Some(&DOUBLE_QUOTE)
        && buffer.get(cursor + 1) == Some(&DOUBLE_QUOTE)
        && buffer.get(cursor + 2) == Some(&DOUBLE_QUOTE))
    {
        return Ok(None);
    }

    let start = cursor + 3;
    let mut i = start;

    loop {
        match buffer.get(i) {
            Some(&DOUBLE_QUOTE) => {
                // Found at least one closing quote; extend to the full run of quotes
                let run_start = i;
                let mut run_end = i;

                while buffer.get(run_end) == Some(&DOUBLE_QUOTE) {
                    run_end += 1;
                }

                let run_len = run_end - run_start;

                if run_len >= 3 {
                    // Absorb every quote but the final three into the body
                    let terminator_start = run_end - 3;
                    return Ok(Some(terminator_start + 3 - cursor));
                }

                i = run_end;
            }
            Some(_) => i += 1,
            None => {
                return Err(LexerError {
                    message: format!(
                        "Unexpected end of input, triple-quoted string started at {} was never \
                         terminated",
                        TextPosition::from_buffer_index(buffer, cursor),
                    ),
                    position: cursor,
                })
            }
        }
    }
}

/// Checks if there is a single-quoted (`"..."`) string at the current position
fn scan_quoted_string(buffer: &[u8], cursor: usize) -> Result<Option<usize>, LexerError> {
    if buffer.get(cursor) != Some(&DOUBLE_QUOTE) {
        return Ok(None);
    }

    let mut prev_was_backslash = false;
    let mut i = cursor + 1;

    loop {
        match buffer.get(i) {
            Some(&DOUBLE_QUOTE) if !prev_was_backslash => {
                let mut end = i + 1;

                while buffer.get(end).map_or(false, |c| [SPACE, TAB].contains(c)) {
                    end += 1;
                }

                return Ok(Some(end - cursor));
            }
            Some(&c) => {
                prev_was_backslash = c == BACKSLASH && !prev_was_backslash;
                i += 1;
            }
            None => {
                return Err(LexerError {
                    message: format!(
                        "Unexpected end of input, string started at {} was never terminated",
                        TextPosition::from_buffer_index(buffer, cursor),
                    ),
                    position: cursor,
                })
            }
        }
    }
}

/// Checks if there is a single-line comment ("#" or "//" to end-of-line) at the current position
fn scan_comment(buffer: &[u8], cursor: usize) -> Option<usize> {
    let is_hash = buffer.get(cursor) == Some(&HASH);
    let is_double_slash =
        buffer.get(cursor) == Some(&SLASH) && buffer.get(cursor + 1) == Some(&SLASH);

    if !(is_hash || is_double_slash) {
        return None;
    }

    let mut length = if is_hash { 1 } else { 2 };

    for i in cursor + length.. {
        if scan_line_break(buffer, i).is_some() || i == buffer.len() {
            break;
        }

        length += 1;
    }

    Some(length)
}

/// Checks if there is whitespace (spaces/tabs only) at the current position
fn scan_whitespace(buffer: &[u8], cursor: usize) -> Option<usize> {
    let mut i = cursor;

    while buffer.get(i).map_or(false, |c| [SPACE, TAB].contains(c)) {
        i += 1;
    }

    if i > cursor {
        Some(i - cursor)
    } else {
        None
    }
}

/// Checks if there is a line break at this position
fn scan_line_break(buffer: &[u8], cursor: usize) -> Option<usize> {
    match (buffer.get(cursor), buffer.get(cursor + 1)) {
        (Some(&CARRIAGE_RETURN), Some(&NEWLINE)) => Some(2),
        (Some(&NEWLINE), _) => Some(1),
        (Some(&CARRIAGE_RETURN), _) => Some(1),
        _ => None,
    }
}

/// Returns true if this character should delimit an unquoted token
fn is_delimiter(c: &u8) -> bool {
    [
        SPACE,
        TAB,
        CARRIAGE_RETURN,
        NEWLINE,
        DOLLAR,
        DOUBLE_QUOTE,
        OPEN_CURLY,
        CLOSE_CURLY,
        OPEN_BRACKET,
        CLOSE_BRACKET,
        OPEN_PAREN,
        CLOSE_PAREN,
        COLON,
        EQUALS,
        COMMA,
        PLUS,
        HASH,
    ]
    .contains(c)
}

fn scan_unquoted(buffer: &[u8], cursor: usize) -> Option<usize> {
    let mut i = cursor;

    while let Some(char) = buffer.get(i) {
        // "//" delimits an unquoted run even though neither "/" alone does
        if *char == SLASH && buffer.get(i + 1) == Some(&SLASH) {
            break;
        }

        if is_delimiter(char) {
            break;
        }

        i += 1;
    }

    if i > cursor {
        Some(i - cursor)
    } else {
        None
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn dedent(text: &str) -> String {
        let mut text = textwrap::dedent(text).trim().to_string();
        text.push('\n');
        text
    }

    fn tokens_of(buffer: &[u8]) -> Vec<Token> {
        scan(buffer).map(|t| t.expect("lexer error")).collect()
    }

    #[test]
    fn smoke_test() {
        let buffer: Vec<u8> = dedent(
            r#"
            # A comment
            a { b = 1, c: "two", d = ${a.b} }
            "#,
        )
        .bytes()
        .collect();

        let tokens = tokens_of(&buffer);

        assert_eq!(
            dedent(
                r#"
                Comment              0 -> 11        "# A comment"
                LineBreak            12 -> 12        "\n"
                Unquoted             13 -> 13        "a"
                WhiteSpace           14 -> 14        " "
                OpenCurly            15 -> 15        "{"
                WhiteSpace           16 -> 16        " "
                Unquoted             17 -> 17        "b"
                WhiteSpace           18 -> 18        " "
                Equals               19 -> 19        "="
                WhiteSpace           20 -> 20        " "
                Number               21 -> 21        "1"
                Comma                22 -> 22        ","
                WhiteSpace           23 -> 23        " "
                Unquoted             24 -> 24        "c"
                Colon                25 -> 25        ":"
                WhiteSpace           26 -> 26        " "
                QuotedString         27 -> 32        "\"two\" "
                Comma                33 -> 33        ","
                WhiteSpace           34 -> 34        " "
                Unquoted             35 -> 35        "d"
                WhiteSpace           36 -> 36        " "
                Equals               37 -> 37        "="
                WhiteSpace           38 -> 38        " "
                Substitution         39 -> 46        "${a.b} "
                CloseCurly           47 -> 47        "}"
                LineBreak            48 -> 48        "\n"
                "#
            ),
            tokens.human_readable_string(),
        );
    }

    #[test]
    fn test_number_boundary() {
        let buffer: Vec<u8> = b"128m".to_vec();
        let tokens = tokens_of(&buffer);

        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].token_type, TokenType::Unquoted);
        assert_eq!(tokens[0].text, "128m");
    }

    #[test]
    fn test_plain_number() {
        let buffer: Vec<u8> = b"-12.5".to_vec();
        let tokens = tokens_of(&buffer);

        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].token_type, TokenType::Number);
    }

    #[test]
    fn test_triple_quoted_string() {
        let buffer: Vec<u8> = br#""""hello "world""""#.to_vec();
        let tokens = tokens_of(&buffer);

        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].token_type, TokenType::TripleQuotedString);
        assert_eq!(tokens[0].text, r#""""hello "world""""#);
    }

    #[test]
    fn test_optional_substitution() {
        let buffer: Vec<u8> = b"${?foo.bar}".to_vec();
        let tokens = tokens_of(&buffer);

        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].token_type, TokenType::Substitution);
        assert_eq!(tokens[0].text, "${?foo.bar}");
    }

    #[test]
    fn test_unterminated_string_is_an_error() {
        let buffer: Vec<u8> = b"\"unterminated".to_vec();
        let mut iter = scan(&buffer);

        assert!(iter.next().unwrap().is_err());
    }
}

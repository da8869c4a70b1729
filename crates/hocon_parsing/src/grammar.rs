use hocon_lexing::{scan, LexerError, Token, TokenType, TextPosition};
use hocon_tree::{ConcatRun, ConcatToken, ConfigError, ConfigTree, SourcePos, Substitution, Value};

use crate::include::{warn_skipped_optional, IncludeDirective, IncludeKind, PackageResolver, ResourceLoader};

const MAX_INCLUDE_DEPTH: usize = 32;

pub struct IncludeContext<'a> {
    pub loader: &'a dyn ResourceLoader,
    pub packages: Option<&'a dyn PackageResolver>,
    pub depth: usize,
}

pub fn parse_document(text: &str, includes: Option<&IncludeContext>) -> Result<ConfigTree, ConfigError> {
    let tokens = tokenize(text)?;
    let mut parser = Parser { tokens, pos: 0, includes };

    parser.skip_trivia_and_separators();

    let explicit_braces = matches!(parser.peek().map(|t| t.token_type), Some(TokenType::OpenCurly));

    if explicit_braces {
        parser.advance();
    }

    let tree = parser.parse_object_body(&[], explicit_braces)?;

    parser.skip_trivia_and_separators();

    if parser.peek().is_some() {
        return Err(parser.syntax_error("unexpected trailing content"));
    }

    Ok(tree)
}

fn tokenize(text: &str) -> Result<Vec<Token>, ConfigError> {
    let buffer = text.as_bytes();

    scan(buffer)
        .collect::<Result<Vec<Token>, LexerError>>()
        .map_err(|err| to_config_error(buffer, err))
}

fn to_config_error(buffer: &[u8], err: LexerError) -> ConfigError {
    let pos = TextPosition::from_buffer_index(buffer, err.position);

    ConfigError::Syntax {
        message: err.message,
        pos: Some(SourcePos { line: pos.line, col: pos.col }),
    }
}

struct Parser<'a> {
    tokens: Vec<Token<'a>>,
    pos: usize,
    includes: Option<&'a IncludeContext<'a>>,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token<'a>> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token<'a>> {
        self.tokens.get(self.pos + offset)
    }

    fn advance(&mut self) -> Option<Token<'a>> {
        let token = self.tokens.get(self.pos).cloned();

        if token.is_some() {
            self.pos += 1;
        }

        token
    }

    fn source_pos(&self) -> Option<SourcePos> {
        // The lexer only hands us byte spans, not precomputed line/col; since most errors occur
        // right at a token boundary, approximating with the raw span start is good enough and
        // avoids re-scanning the whole buffer on every error path.
        self.peek().map(|t| SourcePos { line: 0, col: t.span.0 })
    }

    fn syntax_error(&self, message: &str) -> ConfigError {
        ConfigError::Syntax {
            message: message.to_string(),
            pos: self.source_pos(),
        }
    }

    /// Skips whitespace, comments, line breaks, and commas — the full set of token-separator
    /// trivia between statements.
    fn skip_trivia_and_separators(&mut self) {
        while let Some(tok) = self.peek() {
            match tok.token_type {
                TokenType::WhiteSpace
                | TokenType::LineBreak
                | TokenType::Comment
                | TokenType::Comma => {
                    self.advance();
                }
                _ => break,
            }
        }
    }

    /// Skips whitespace and comments only, stopping at a line break (used within a single
    /// statement, where a line break ends the statement).
    fn skip_inline_trivia(&mut self) {
        while let Some(tok) = self.peek() {
            match tok.token_type {
                TokenType::WhiteSpace | TokenType::Comment => {
                    self.advance();
                }
                _ => break,
            }
        }
    }

    fn parse_object_body(
        &mut self,
        prefix: &[String],
        explicit_braces: bool,
    ) -> Result<ConfigTree, ConfigError> {
        let mut tree = if prefix.is_empty() {
            ConfigTree::root()
        } else {
            ConfigTree::new()
        };

        loop {
            self.skip_trivia_and_separators();

            match self.peek() {
                None => {
                    if explicit_braces {
                        return Err(self.syntax_error("unexpected end of input, unclosed '{'"));
                    }

                    break;
                }
                Some(tok) if tok.token_type == TokenType::CloseCurly => {
                    if !explicit_braces {
                        return Err(self.syntax_error("unexpected '}'"));
                    }

                    self.advance();
                    break;
                }
                Some(tok) if tok.token_type == TokenType::Unquoted && tok.text == "include" => {
                    self.parse_include_statement(&mut tree)?;
                }
                _ => {
                    self.parse_field(prefix, &mut tree)?;
                }
            }
        }

        Ok(tree)
    }

    fn parse_field(&mut self, prefix: &[String], tree: &mut ConfigTree) -> Result<(), ConfigError> {
        let key_path = self.parse_key_path()?;
        self.skip_inline_trivia();

        let mut full_path = prefix.to_vec();
        full_path.extend(key_path.iter().cloned());

        let append = match self.peek().map(|t| t.token_type) {
            Some(TokenType::OpenCurly) => false,
            Some(TokenType::Equals) | Some(TokenType::Colon) => {
                self.advance();
                false
            }
            Some(TokenType::PlusEquals) => {
                self.advance();
                true
            }
            _ => {
                return Err(self.syntax_error("expected '=', ':', '+=' or '{' after key"));
            }
        };

        self.skip_inline_trivia();

        let mut value = self.parse_value(&full_path)?;

        if append {
            value = wrap_append_sugar(full_path.clone(), value);
        }

        tree.put_path(&key_path, value);

        Ok(())
    }

    fn parse_key_path(&mut self) -> Result<Vec<String>, ConfigError> {
        let mut raw = String::new();

        loop {
            match self.peek().map(|t| t.token_type) {
                Some(TokenType::Unquoted) | Some(TokenType::QuotedString) | Some(TokenType::Number) => {
                    let tok = self.advance().unwrap();
                    raw.push_str(tok.text);
                }
                _ => break,
            }
        }

        let trimmed = raw.trim_end();

        if trimmed.is_empty() {
            return Err(self.syntax_error("expected a key"));
        }

        Ok(hocon_tree::parse_key(trimmed))
    }

    /// Parses a (possibly concatenated) value. `path` identifies where this value will live in
    /// the root tree, used to tag any `Deferred` run produced so the resolver can find it later.
    fn parse_value(&mut self, path: &[String]) -> Result<Value, ConfigError> {
        let mut pieces: Vec<ConcatToken> = Vec::new();

        loop {
            match self.peek().map(|t| t.token_type) {
                None
                | Some(TokenType::LineBreak)
                | Some(TokenType::Comma)
                | Some(TokenType::CloseCurly)
                | Some(TokenType::CloseBracket) => break,
                Some(TokenType::Comment) => {
                    self.advance();
                }
                Some(TokenType::WhiteSpace) => {
                    let tok = self.advance().unwrap();

                    let ends_value = matches!(
                        self.peek().map(|t| t.token_type),
                        None | Some(TokenType::LineBreak)
                            | Some(TokenType::Comma)
                            | Some(TokenType::CloseCurly)
                            | Some(TokenType::CloseBracket)
                            | Some(TokenType::Comment)
                    );

                    if !pieces.is_empty() && !ends_value {
                        pieces.push(ConcatToken::Literal(Value::String(tok.text.to_string())));
                    }
                }
                Some(TokenType::OpenCurly) => {
                    self.advance();
                    let tree = self.parse_object_body(path, true)?;
                    pieces.push(ConcatToken::Literal(Value::Tree(tree)));
                }
                Some(TokenType::OpenBracket) => {
                    self.advance();
                    let list = self.parse_array()?;
                    pieces.push(ConcatToken::Literal(Value::List(list)));
                }
                Some(TokenType::Substitution) => {
                    let tok = self.advance().unwrap();
                    pieces.push(ConcatToken::Substitution(parse_substitution_token(tok)));
                }
                Some(TokenType::Number) => {
                    let tok = self.advance().unwrap();
                    pieces.push(ConcatToken::Literal(parse_number(tok.text)));
                }
                Some(TokenType::QuotedString) => {
                    let tok = self.advance().unwrap();
                    pieces.push(ConcatToken::Literal(Value::String(unescape_quoted(tok.text))));
                }
                Some(TokenType::TripleQuotedString) => {
                    let tok = self.advance().unwrap();
                    pieces.push(ConcatToken::Literal(Value::String(strip_triple_quotes(tok.text))));
                }
                Some(TokenType::Unquoted) => {
                    let tok = self.advance().unwrap();
                    pieces.push(ConcatToken::Literal(unquoted_literal(tok.text)));
                }
                Some(_) => {
                    // Any remaining punctuation (parens, stray '=' etc.) appearing in value
                    // position is treated as literal text rather than a hard error, matching
                    // HOCON's permissive unquoted-string grammar.
                    let tok = self.advance().unwrap();
                    pieces.push(ConcatToken::Literal(Value::String(tok.text.to_string())));
                }
            }
        }

        if pieces.is_empty() {
            return Ok(Value::Null);
        }

        if pieces.len() == 1 {
            return Ok(match pieces.into_iter().next().unwrap() {
                ConcatToken::Literal(value) => value,
                sub @ ConcatToken::Substitution(_) => Value::Deferred(ConcatRun {
                    tokens: vec![sub],
                    path: path.to_vec(),
                    overridden: None,
                }),
            });
        }

        Ok(Value::Deferred(ConcatRun {
            tokens: pieces,
            path: path.to_vec(),
            overridden: None,
        }))
    }

    fn parse_array(&mut self) -> Result<Vec<Value>, ConfigError> {
        let mut items = Vec::new();

        loop {
            self.skip_trivia_and_separators();

            match self.peek() {
                None => return Err(self.syntax_error("unexpected end of input, unclosed '['")),
                Some(tok) if tok.token_type == TokenType::CloseBracket => {
                    self.advance();
                    break;
                }
                _ => {
                    let value = self.parse_value(&[])?;
                    items.push(value);
                }
            }
        }

        Ok(items)
    }

    fn parse_include_statement(&mut self, tree: &mut ConfigTree) -> Result<(), ConfigError> {
        self.advance(); // "include"
        self.skip_inline_trivia();

        let mut required = false;

        if let Some(tok) = self.peek() {
            if tok.token_type == TokenType::Unquoted && tok.text == "required" {
                self.advance();
                self.skip_inline_trivia();
                required = true;

                if !matches!(self.peek().map(|t| t.token_type), Some(TokenType::OpenParen)) {
                    return Err(self.syntax_error("expected '(' after 'required'"));
                }

                self.advance();
                self.skip_inline_trivia();
            }
        }

        let kind = self.parse_include_kind(required)?;
        self.skip_inline_trivia();

        if required {
            if !matches!(self.peek().map(|t| t.token_type), Some(TokenType::CloseParen)) {
                return Err(self.syntax_error("expected ')' to close 'required(...)'"));
            }

            self.advance();
        }

        let directive = IncludeDirective { kind, required };

        match self.resolve_include(&directive) {
            Ok(Some(included)) => {
                for (key, value) in included.iter() {
                    tree.put_path(&[key.to_string()], value.clone());
                }
            }
            Ok(None) => {}
            Err(err) => return Err(err),
        }

        Ok(())
    }

    fn parse_include_kind(&mut self, required: bool) -> Result<IncludeKind, ConfigError> {
        let _ = required;

        if let Some(tok) = self.peek() {
            if tok.token_type == TokenType::Unquoted
                && matches!(tok.text, "file" | "url" | "package")
            {
                let keyword = tok.text.to_string();
                self.advance();
                self.skip_inline_trivia();

                if !matches!(self.peek().map(|t| t.token_type), Some(TokenType::OpenParen)) {
                    return Err(self.syntax_error("expected '(' after include source keyword"));
                }

                self.advance();
                self.skip_inline_trivia();

                let target = self.parse_include_target()?;
                self.skip_inline_trivia();

                if !matches!(self.peek().map(|t| t.token_type), Some(TokenType::CloseParen)) {
                    return Err(self.syntax_error("expected ')' to close include(...)"));
                }

                self.advance();

                return Ok(match keyword.as_str() {
                    "file" => IncludeKind::File(target),
                    "url" => IncludeKind::Url(target),
                    "package" => IncludeKind::Package(target),
                    _ => unreachable!(),
                });
            }
        }

        // Bare `include "path"` form, heuristically file unless it looks like a URL.
        let target = self.parse_include_target()?;

        if target.contains("://") {
            Ok(IncludeKind::Url(target))
        } else {
            Ok(IncludeKind::File(target))
        }
    }

    fn parse_include_target(&mut self) -> Result<String, ConfigError> {
        match self.peek().map(|t| t.token_type) {
            Some(TokenType::QuotedString) => {
                let tok = self.advance().unwrap();
                Ok(unescape_quoted(tok.text))
            }
            _ => Err(self.syntax_error("expected a quoted string naming the include target")),
        }
    }

    fn resolve_include(&self, directive: &IncludeDirective) -> Result<Option<ConfigTree>, ConfigError> {
        let Some(ctx) = self.includes else {
            return if directive.required {
                Err(ConfigError::Include {
                    message: "no include resolver configured".to_string(),
                    pos: None,
                })
            } else {
                Ok(None)
            };
        };

        if ctx.depth >= MAX_INCLUDE_DEPTH {
            return Err(ConfigError::Include {
                message: "include depth limit exceeded, possible include cycle".to_string(),
                pos: None,
            });
        }

        let loaded = self.load_include(ctx, &directive.kind);

        match loaded {
            Ok(text) => {
                let child_ctx = IncludeContext {
                    loader: ctx.loader,
                    packages: ctx.packages,
                    depth: ctx.depth + 1,
                };

                parse_document(&text, Some(&child_ctx)).map(Some)
            }
            Err(err) => {
                if directive.required {
                    Err(err)
                } else {
                    warn_skipped_optional(&directive.kind, &err);
                    Ok(None)
                }
            }
        }
    }

    fn load_include(&self, ctx: &IncludeContext, kind: &IncludeKind) -> Result<String, ConfigError> {
        match kind {
            IncludeKind::File(path) => ctx.loader.load_file(path),
            IncludeKind::Url(url) => {
                crate::include::validate_url(url)?;
                ctx.loader.load_url(url)
            }
            IncludeKind::Package(package) => {
                let Some(resolver) = ctx.packages else {
                    return Err(ConfigError::Include {
                        message: format!("no package resolver configured for '{}'", package),
                        pos: None,
                    });
                };

                for dir in resolver.resolve(package) {
                    let candidate = dir.join("PATH");

                    if let Ok(text) = std::fs::read_to_string(&candidate) {
                        return Ok(text);
                    }
                }

                Err(ConfigError::Include {
                    message: format!("could not find 'PATH' in any directory for package '{}'", package),
                    pos: None,
                })
            }
        }
    }
}

/// Builds the `+=` desugared value: `key += v` always means `key = ${?key} [v]`, wrapping
/// whatever was parsed on the right in a single-element list literal regardless of its own type
/// — matching pyhocon's `ConfigValues` sugar construction in `ConcatenatedValueParser`.
fn wrap_append_sugar(path: Vec<String>, value: Value) -> Value {
    let self_ref = ConcatToken::Substitution(Substitution {
        path: path.clone(),
        optional: true,
        trailing_ws: String::new(),
        pos: None,
    });

    let appended = ConcatToken::Literal(Value::List(vec![value]));

    Value::Deferred(ConcatRun {
        tokens: vec![self_ref, appended],
        path,
        overridden: None,
    })
}

fn parse_substitution_token(tok: Token) -> Substitution {
    let inner = tok.text.trim_end();
    let trailing_ws = tok.text[inner.len()..].to_string();

    let body = &inner[2..inner.len() - 1]; // strip "${" and "}"
    let (optional, path_str) = match body.strip_prefix('?') {
        Some(rest) => (true, rest),
        None => (false, body),
    };

    Substitution {
        path: hocon_tree::parse_key(path_str),
        optional,
        trailing_ws,
        pos: None,
    }
}

fn parse_number(text: &str) -> Value {
    if let Ok(n) = text.parse::<i64>() {
        Value::Int(n)
    } else {
        Value::Real(text.parse::<f64>().unwrap_or(0.0))
    }
}

fn unquoted_literal(text: &str) -> Value {
    match text {
        "true" | "yes" | "on" => Value::Bool(true),
        "false" | "no" | "off" => Value::Bool(false),
        "null" => Value::Null,
        other => Value::String(other.to_string()),
    }
}

/// Unescapes a quoted-string token's text, which still carries its surrounding quotes and any
/// trailing whitespace the lexer absorbed into the token.
fn unescape_quoted(text: &str) -> String {
    let trimmed = text.trim_end();
    let body = &trimmed[1..trimmed.len() - 1];

    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }

        match chars.next() {
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some('/') => out.push('/'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('=') => out.push('='),
            Some('#') => out.push('#'),
            Some('!') => out.push('!'),
            Some('u') => {
                let hex: String = (0..4).filter_map(|_| chars.next()).collect();

                if let Ok(code) = u32::from_str_radix(&hex, 16) {
                    if let Some(c) = char::from_u32(code) {
                        out.push(c);
                    }
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }

    out
}

fn strip_triple_quotes(text: &str) -> String {
    let trimmed = text.trim_end();
    trimmed[3..trimmed.len() - 3].to_string()
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(text: &str) -> ConfigTree {
        parse_document(text, None).expect("parse error")
    }

    fn dedent(text: &str) -> String {
        let mut text = textwrap::dedent(text).trim().to_string();
        text.push('\n');
        text
    }

    #[test]
    fn test_simple_object() {
        let tree = parse("a = 1\nb = \"two\"\n");

        assert_eq!(tree.get_path(&["a".to_string()]).unwrap(), &Value::Int(1));
        assert_eq!(
            tree.get_path(&["b".to_string()]).unwrap(),
            &Value::String("two".to_string())
        );
    }

    #[test]
    fn test_implicit_root_braces() {
        let tree = parse("a { b = 1 }\n");

        assert_eq!(
            tree.get_path(&["a".to_string(), "b".to_string()]).unwrap(),
            &Value::Int(1)
        );
    }

    #[test]
    fn test_explicit_root_braces() {
        let tree = parse("{ a = 1 }");
        assert_eq!(tree.get_path(&["a".to_string()]).unwrap(), &Value::Int(1));
    }

    #[test]
    fn test_dotted_key() {
        let tree = parse("a.b.c = 1\n");

        assert_eq!(
            tree.get_path(&["a".to_string(), "b".to_string(), "c".to_string()]).unwrap(),
            &Value::Int(1)
        );
    }

    #[test]
    fn test_object_shorthand_without_equals() {
        let tree = parse("a { b = 1 }\n");
        assert!(tree.get_path(&["a".to_string()]).is_ok());
    }

    #[test]
    fn test_array_value() {
        let tree = parse("a = [1, 2, 3]\n");

        assert_eq!(
            tree.get_path(&["a".to_string()]).unwrap(),
            &Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
        );
    }

    #[test]
    fn test_string_concatenation_produces_deferred_run() {
        let tree = parse("a = foo bar\n");

        match tree.get_path(&["a".to_string()]).unwrap() {
            Value::Deferred(run) => assert!(!run.has_substitution()),
            other => panic!("expected a deferred concatenation run, got {:?}", other),
        }
    }

    #[test]
    fn test_substitution_value() {
        let tree = parse("a = ${b}\nb = 1\n");

        match tree.get_path(&["a".to_string()]).unwrap() {
            Value::Deferred(_) => {}
            other => panic!("expected substitution to produce a deferred value, got {:?}", other),
        }
    }

    #[test]
    fn test_plus_equals_sugar() {
        let tree = parse("a = [1]\na += 2\n");

        match tree.get_path(&["a".to_string()]).unwrap() {
            Value::Deferred(run) => {
                assert_eq!(run.tokens.len(), 2);
                assert!(run.has_substitution());
            }
            other => panic!("expected a deferred run from += sugar, got {:?}", other),
        }
    }

    #[test]
    fn test_triple_quoted_string_no_escapes() {
        let tree = parse(r#"a = """foo\nbar"""
"#);

        assert_eq!(
            tree.get_path(&["a".to_string()]).unwrap(),
            &Value::String(r"foo\nbar".to_string())
        );
    }

    #[test]
    fn test_comment_is_ignored() {
        let tree = parse("a = 1 # a comment\nb = 2\n");

        assert_eq!(tree.get_path(&["a".to_string()]).unwrap(), &Value::Int(1));
        assert_eq!(tree.get_path(&["b".to_string()]).unwrap(), &Value::Int(2));
    }

    #[test]
    fn test_unterminated_object_is_an_error() {
        assert!(parse_document("a { b = 1", None).is_err());
    }

    #[test]
    fn test_nested_object_with_comments_and_overrides() {
        let tree = parse(&dedent(
            r#"
            # top-level service config
            service {
              name = "gateway"
              port = 8080
              retries = 3
            }

            // the ops team bumped retries for the payments cluster
            service.retries = 5
            "#,
        ));

        assert_eq!(
            tree.get_path(&["service".to_string(), "name".to_string()]).unwrap(),
            &Value::String("gateway".to_string())
        );
        assert_eq!(
            tree.get_path(&["service".to_string(), "retries".to_string()]).unwrap(),
            &Value::Int(5)
        );
    }
}

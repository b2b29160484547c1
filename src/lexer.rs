// File: src/lexer.rs
//
// Hand-rolled tokenizer for Mica source text.

use crate::errors::MicaError;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Identifier(String),
    Number(f64),
    Str(String),
    Operator(String),
    Punct(char),
    Keyword(String),
    Eof,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub column: usize,
}

const KEYWORDS: &[&str] =
    &["var", "func", "return", "if", "else", "while", "for", "true", "false", "nil"];

pub fn tokenize(source: &str) -> Result<Vec<Token>, MicaError> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();
    let mut line = 1;
    let mut col = 1;

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\r' => {
                chars.next();
                col += 1;
            }
            '\n' => {
                chars.next();
                line += 1;
                col = 1;
            }
            '"' => {
                let start_col = col;
                chars.next(); // skip opening quote
                col += 1;
                let mut s = String::new();
                let mut closed = false;
                while let Some(&ch) = chars.peek() {
                    chars.next();
                    col += 1;
                    match ch {
                        '"' => {
                            closed = true;
                            break;
                        }
                        '\\' => {
                            if let Some(&esc) = chars.peek() {
                                chars.next();
                                col += 1;
                                match esc {
                                    'n' => s.push('\n'),
                                    't' => s.push('\t'),
                                    '\\' => s.push('\\'),
                                    '"' => s.push('"'),
                                    _ => s.push(esc),
                                }
                            }
                        }
                        '\n' => {
                            s.push(ch);
                            line += 1;
                            col = 1;
                        }
                        _ => s.push(ch),
                    }
                }
                if !closed {
                    return Err(MicaError::parse("unterminated string literal", line, start_col));
                }
                tokens.push(Token { kind: TokenKind::Str(s), line, column: start_col });
            }
            '0'..='9' => {
                let start_col = col;
                let mut num = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_ascii_digit() || ch == '.' {
                        num.push(ch);
                        chars.next();
                        col += 1;
                    } else {
                        break;
                    }
                }
                let parsed = num
                    .parse()
                    .map_err(|_| MicaError::parse(format!("invalid number '{}'", num), line, start_col))?;
                tokens.push(Token { kind: TokenKind::Number(parsed), line, column: start_col });
            }
            'a'..='z' | 'A'..='Z' | '_' => {
                let start_col = col;
                let mut ident = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_alphanumeric() || ch == '_' {
                        ident.push(ch);
                        chars.next();
                        col += 1;
                    } else {
                        break;
                    }
                }
                let kind = if KEYWORDS.contains(&ident.as_str()) {
                    TokenKind::Keyword(ident)
                } else {
                    TokenKind::Identifier(ident)
                };
                tokens.push(Token { kind, line, column: start_col });
            }
            '/' => {
                let start_col = col;
                chars.next();
                col += 1;
                if chars.peek() == Some(&'/') {
                    // line comment
                    for ch in chars.by_ref() {
                        if ch == '\n' {
                            line += 1;
                            col = 1;
                            break;
                        }
                    }
                } else {
                    tokens.push(Token {
                        kind: TokenKind::Operator("/".into()),
                        line,
                        column: start_col,
                    });
                }
            }
            '=' | '!' | '<' | '>' => {
                let start_col = col;
                let first = c;
                chars.next();
                col += 1;
                let op = if chars.peek() == Some(&'=') {
                    chars.next();
                    col += 1;
                    format!("{}=", first)
                } else {
                    first.to_string()
                };
                tokens.push(Token { kind: TokenKind::Operator(op), line, column: start_col });
            }
            '&' | '|' => {
                let start_col = col;
                chars.next();
                col += 1;
                if chars.peek() == Some(&c) {
                    chars.next();
                    col += 1;
                    let op = if c == '&' { "&&" } else { "||" };
                    tokens.push(Token {
                        kind: TokenKind::Operator(op.into()),
                        line,
                        column: start_col,
                    });
                } else {
                    return Err(MicaError::parse(
                        format!("unexpected character '{}'", c),
                        line,
                        start_col,
                    ));
                }
            }
            '+' | '-' | '*' => {
                chars.next();
                tokens.push(Token {
                    kind: TokenKind::Operator(c.to_string()),
                    line,
                    column: col,
                });
                col += 1;
            }
            '(' | ')' | '{' | '}' | '[' | ']' | ',' | ';' => {
                chars.next();
                tokens.push(Token { kind: TokenKind::Punct(c), line, column: col });
                col += 1;
            }
            _ => {
                return Err(MicaError::parse(format!("unexpected character '{}'", c), line, col));
            }
        }
    }

    tokens.push(Token { kind: TokenKind::Eof, line, column: col });

    Ok(tokens)
}

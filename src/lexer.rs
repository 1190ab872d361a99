use logos::Logos;

use crate::error::ScanError;

/// The closed token vocabulary. `else` and `var` are reserved but never
/// consumed by the parser; `pass`/`potato` and `nil`/`null` are alternate
/// spellings of the same keyword.
#[derive(Clone, Debug, PartialEq, Logos)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"//[^\n]*")]
pub enum TokenKind {
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token(";")]
    Semicolon,
    #[token(":")]
    Colon,
    #[token("$")]
    Dollar,

    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("->")]
    Arrow,
    #[token("++")]
    PlusPlus,
    #[token("--")]
    MinusMinus,
    #[token("!")]
    Bang,
    #[token("!=")]
    BangEqual,
    #[token("=")]
    Equal,
    #[token("==")]
    EqualEqual,
    #[token(">")]
    Greater,
    #[token(">=")]
    GreaterEqual,
    #[token("<")]
    Less,
    #[token("<=")]
    LessEqual,

    #[token("and")]
    And,
    #[token("or")]
    Or,
    #[token("var")]
    Var,
    #[token("while")]
    While,
    #[token("func")]
    Func,
    #[token("for")]
    For,
    #[token("foreach")]
    Foreach,
    #[token("if")]
    If,
    #[token("nil")]
    #[token("null")]
    Nil,
    #[token("return")]
    Return,
    #[token("else")]
    Else,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("pass")]
    #[token("potato")]
    Pass,
    #[token("global")]
    Global,
    #[token("new")]
    New,

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Identifier(String),
    // No escape decoding; a string runs to the next '"' and may span lines.
    #[regex(r#""[^"]*""#, |lex| {
        let s = lex.slice();
        s[1..s.len() - 1].to_string()
    })]
    Str(String),
    // No sign, no exponent. Unary minus is handled by the parser.
    #[regex(r"[0-9]+(\.[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    Number(f64),

    Eof,
}

/// A token with its exact source substring and the line it starts on.
/// Decoded literal values live in the `TokenKind` payloads.
#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub line: usize,
}

fn newlines_in(text: &str) -> usize {
    text.bytes().filter(|b| *b == b'\n').count()
}

/// Scans the whole source, failing on the first unrecognized character or
/// unterminated string. Always terminates the sequence with an EOF token.
pub fn tokenize(source: &str) -> Result<Vec<Token>, ScanError> {
    let mut lexer = TokenKind::lexer(source);
    let mut tokens: Vec<Token> = Vec::new();
    let mut line = 1usize;
    let mut counted = 0usize;

    while let Some(result) = lexer.next() {
        let span = lexer.span();
        // Logos skips whitespace and comments, so newlines are counted over
        // the raw gap between the previous token and this one.
        line += newlines_in(&source[counted..span.start]);
        match result {
            Ok(kind) => tokens.push(Token {
                kind,
                lexeme: lexer.slice().to_string(),
                line,
            }),
            Err(()) => {
                let rest = &source[span.start..];
                let message = if rest.starts_with('"') {
                    "Unterminated string at EOF".to_string()
                } else {
                    format!("Unexpected character '{}'", &source[span.start..span.end])
                };
                return Err(ScanError { line, message });
            }
        }
        // Strings may contain newlines of their own.
        line += newlines_in(&source[span.start..span.end]);
        counted = span.end;
    }

    line += newlines_in(&source[counted..]);
    tokens.push(Token {
        kind: TokenKind::Eof,
        lexeme: String::new(),
        line,
    });

    Ok(tokens)
}

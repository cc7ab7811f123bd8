//! Tokenizer for dependency expressions, built on logos.

use logos::Logos;

use crate::error::ParseError;

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) enum LexError {
    #[default]
    Unexpected,
    IntOutOfRange,
    Unterminated,
}

impl LexError {
    fn message(&self, slice: &str) -> String {
        match self {
            LexError::Unexpected => format!("unexpected character `{slice}`"),
            LexError::IntOutOfRange => format!("integer `{slice}` is out of range"),
            LexError::Unterminated => "unterminated string literal".to_string(),
        }
    }
}

fn unterminated(_: &mut logos::Lexer<TokenKind>) -> Result<String, LexError> {
    Err(LexError::Unterminated)
}

fn unquote(slice: &str) -> String {
    slice[1..slice.len() - 1].to_string()
}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(error = LexError)]
pub(crate) enum TokenKind {
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),
    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().map_err(|_| LexError::IntOutOfRange))]
    Int(i64),
    #[regex(r"[0-9]+\.[0-9]+", |lex| lex.slice().parse::<f64>().ok())]
    #[regex(r"\.[0-9]+", |lex| lex.slice().parse::<f64>().ok())]
    Float(f64),
    /// Single or double quoted, no escapes.
    #[regex(r"'[^']*'", |lex| unquote(lex.slice()))]
    #[regex(r#""[^"]*""#, |lex| unquote(lex.slice()))]
    #[regex(r"'[^']*", unterminated)]
    #[regex(r#""[^"]*"#, unterminated)]
    Str(String),
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("!")]
    #[token("not")]
    Not,
    #[token("&&")]
    #[token("and")]
    And,
    #[token("||")]
    #[token("or")]
    Or,
    #[token("xor")]
    Xor,
    #[token("==")]
    EqEq,
    #[token("!=")]
    Ne,
    #[token(">")]
    Gt,
    #[token(">=")]
    Ge,
    #[token("<")]
    Lt,
    #[token("<=")]
    Le,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("**")]
    StarStar,
    #[token("&")]
    Amp,
    #[token("|")]
    Pipe,
    #[token("^")]
    Caret,
    #[token("<<")]
    Shl,
    #[token(">>")]
    Shr,
    /// Single `=`, only valid in the set-membership shorthand.
    #[token("=")]
    Assign,
    #[token(",")]
    Comma,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    /// Appended by [`tokenize`], never produced by the lexer itself.
    Eof,
}

impl TokenKind {
    /// Short description used in parse errors.
    pub(crate) fn describe(&self) -> String {
        match self {
            TokenKind::Ident(name) => format!("identifier `{name}`"),
            TokenKind::Int(i) => format!("number `{i}`"),
            TokenKind::Float(f) => format!("number `{f}`"),
            TokenKind::Str(s) => format!("string '{s}'"),
            TokenKind::True => "`true`".into(),
            TokenKind::False => "`false`".into(),
            TokenKind::Not => "`!`".into(),
            TokenKind::And => "`&&`".into(),
            TokenKind::Or => "`||`".into(),
            TokenKind::Xor => "`xor`".into(),
            TokenKind::EqEq => "`==`".into(),
            TokenKind::Ne => "`!=`".into(),
            TokenKind::Gt => "`>`".into(),
            TokenKind::Ge => "`>=`".into(),
            TokenKind::Lt => "`<`".into(),
            TokenKind::Le => "`<=`".into(),
            TokenKind::Plus => "`+`".into(),
            TokenKind::Minus => "`-`".into(),
            TokenKind::Star => "`*`".into(),
            TokenKind::Slash => "`/`".into(),
            TokenKind::Percent => "`%`".into(),
            TokenKind::StarStar => "`**`".into(),
            TokenKind::Amp => "`&`".into(),
            TokenKind::Pipe => "`|`".into(),
            TokenKind::Caret => "`^`".into(),
            TokenKind::Shl => "`<<`".into(),
            TokenKind::Shr => "`>>`".into(),
            TokenKind::Assign => "`=`".into(),
            TokenKind::Comma => "`,`".into(),
            TokenKind::LParen => "`(`".into(),
            TokenKind::RParen => "`)`".into(),
            TokenKind::Eof => "end of expression".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    /// Byte offset of the first character.
    pub pos: usize,
}

/// Split `text` into tokens. The result always ends with [`TokenKind::Eof`].
pub(crate) fn tokenize(text: &str) -> Result<Vec<Token>, ParseError> {
    let mut lexer = TokenKind::lexer(text);
    let mut tokens = Vec::new();

    while let Some(result) = lexer.next() {
        let pos = lexer.span().start;
        match result {
            Ok(kind) => tokens.push(Token { kind, pos }),
            Err(err) => return Err(ParseError::new(pos, err.message(lexer.slice()))),
        }
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        pos: text.len(),
    });
    Ok(tokens)
}

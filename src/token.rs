//! Lexer: source text -> token stream.
//!
//! External collaborator to the core pipeline (see the lexer component in
//! the top-level docs). A hand-written, single-pass scanner; no lookahead
//! beyond a single extra character for multi-character operators.

use crate::error::{Diagnostic, SourceSpan};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntSuffix {
    None,
    Unsigned,
    Long,
    UnsignedLong,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // literals
    IntConstant { value: u64, suffix: IntSuffix },
    FloatConstant { value: f64 },
    CharConstant { value: i8 },
    StringLiteral { value: String },
    Identifier(String),

    // keywords
    KwInt,
    KwLong,
    KwUnsigned,
    KwSigned,
    KwDouble,
    KwVoid,
    KwChar,
    KwReturn,
    KwIf,
    KwElse,
    KwWhile,
    KwDo,
    KwFor,
    KwBreak,
    KwContinue,
    KwSwitch,
    KwCase,
    KwDefault,
    KwGoto,
    KwStatic,
    KwExtern,

    // punctuation
    LParen,
    RParen,
    LBrace,
    RBrace,
    Semicolon,
    Comma,
    Colon,
    Question,

    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Tilde,
    Bang,
    Amp,
    Pipe,
    Caret,
    Shl,
    Shr,
    AmpAmp,
    PipePipe,

    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PercentAssign,
    AmpAssign,
    PipeAssign,
    CaretAssign,
    ShlAssign,
    ShrAssign,

    PlusPlus,
    MinusMinus,

    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,

    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: SourceSpan,
}

pub struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
    line: usize,
    col: usize,
    diagnostics: Vec<Diagnostic>,
}

fn keyword(ident: &str) -> Option<TokenKind> {
    use TokenKind::*;
    Some(match ident {
        "int" => KwInt,
        "long" => KwLong,
        "unsigned" => KwUnsigned,
        "signed" => KwSigned,
        "double" => KwDouble,
        "void" => KwVoid,
        "char" => KwChar,
        "return" => KwReturn,
        "if" => KwIf,
        "else" => KwElse,
        "while" => KwWhile,
        "do" => KwDo,
        "for" => KwFor,
        "break" => KwBreak,
        "continue" => KwContinue,
        "switch" => KwSwitch,
        "case" => KwCase,
        "default" => KwDefault,
        "goto" => KwGoto,
        "static" => KwStatic,
        "extern" => KwExtern,
        _ => return None,
    })
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Lexer {
            src: src.as_bytes(),
            pos: 0,
            line: 1,
            col: 1,
            diagnostics: Vec::new(),
        }
    }

    /// Tokenize the whole input, collecting lexical diagnostics along the way.
    pub fn tokenize(mut self) -> (Vec<Token>, Vec<Diagnostic>) {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia();
            let span = self.span();
            let Some(c) = self.peek() else {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    span,
                });
                break;
            };
            let kind = if c.is_ascii_digit() || (c == b'.' && self.peek_at(1).is_some_and(|d| d.is_ascii_digit())) {
                self.lex_number()
            } else if c.is_ascii_alphabetic() || c == b'_' {
                self.lex_identifier()
            } else if c == b'"' {
                self.lex_string()
            } else if c == b'\'' {
                self.lex_char()
            } else {
                self.lex_punct()
            };
            if let Some(kind) = kind {
                tokens.push(Token { kind, span });
            }
        }
        (tokens, self.diagnostics)
    }

    fn span(&self) -> SourceSpan {
        SourceSpan::new(self.line, self.col)
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.src.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.pos += 1;
        if c == b'\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_ascii_whitespace() => {
                    self.bump();
                }
                Some(b'/') if self.peek_at(1) == Some(b'/') => {
                    while !matches!(self.peek(), None | Some(b'\n')) {
                        self.bump();
                    }
                }
                Some(b'/') if self.peek_at(1) == Some(b'*') => {
                    self.bump();
                    self.bump();
                    loop {
                        match self.peek() {
                            None => break,
                            Some(b'*') if self.peek_at(1) == Some(b'/') => {
                                self.bump();
                                self.bump();
                                break;
                            }
                            _ => {
                                self.bump();
                            }
                        }
                    }
                }
                _ => break,
            }
        }
    }

    fn lex_identifier(&mut self) -> Option<TokenKind> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == b'_')
        {
            self.bump();
        }
        let text = std::str::from_utf8(&self.src[start..self.pos]).unwrap();
        Some(keyword(text).unwrap_or_else(|| TokenKind::Identifier(text.to_string())))
    }

    fn lex_number(&mut self) -> Option<TokenKind> {
        let start = self.pos;
        if self.peek() == Some(b'0') && matches!(self.peek_at(1), Some(b'x') | Some(b'X')) {
            return self.lex_hex_number();
        }
        let mut is_float = false;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
        }
        if self.peek() == Some(b'.') {
            is_float = true;
            self.bump();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
            }
        }
        if matches!(self.peek(), Some(b'e') | Some(b'E')) {
            let save = self.pos;
            self.bump();
            if matches!(self.peek(), Some(b'+') | Some(b'-')) {
                self.bump();
            }
            if !self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.diagnostics.push(Diagnostic::lexical(format!(
                    "{}: exponent has no digits",
                    self.span()
                )));
                self.pos = save;
            } else {
                is_float = true;
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.bump();
                }
            }
        }
        let text = std::str::from_utf8(&self.src[start..self.pos]).unwrap();
        if is_float {
            // a float literal must not be followed by an identifier/suffix char
            if self.peek().is_some_and(|c| c.is_ascii_alphabetic() || c == b'_') {
                self.diagnostics
                    .push(Diagnostic::lexical("bad numeric suffix on floating constant"));
            }
            return Some(TokenKind::FloatConstant {
                value: text.parse().unwrap_or(0.0),
            });
        }

        let mut has_u = false;
        let mut has_l = false;
        loop {
            match self.peek() {
                Some(b'u') | Some(b'U') if !has_u => {
                    has_u = true;
                    self.bump();
                }
                Some(b'l') | Some(b'L') if !has_l => {
                    has_l = true;
                    self.bump();
                }
                Some(c) if c.is_ascii_alphabetic() || c == b'_' => {
                    self.diagnostics
                        .push(Diagnostic::lexical(format!("bad numeric suffix near {}", self.span())));
                    self.bump();
                }
                _ => break,
            }
        }
        let suffix = match (has_u, has_l) {
            (false, false) => IntSuffix::None,
            (true, false) => IntSuffix::Unsigned,
            (false, true) => IntSuffix::Long,
            (true, true) => IntSuffix::UnsignedLong,
        };
        let value = text.parse::<u64>().unwrap_or(0);
        Some(TokenKind::IntConstant { value, suffix })
    }

    fn lex_hex_number(&mut self) -> Option<TokenKind> {
        self.bump(); // '0'
        self.bump(); // 'x'/'X'
        let digits_start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
            self.bump();
        }
        if self.pos == digits_start {
            self.diagnostics
                .push(Diagnostic::lexical(format!("{}: bad hex constant", self.span())));
        }
        let digits = std::str::from_utf8(&self.src[digits_start..self.pos]).unwrap();

        let mut has_u = false;
        let mut has_l = false;
        loop {
            match self.peek() {
                Some(b'u') | Some(b'U') if !has_u => {
                    has_u = true;
                    self.bump();
                }
                Some(b'l') | Some(b'L') if !has_l => {
                    has_l = true;
                    self.bump();
                }
                Some(c) if c.is_ascii_alphabetic() || c == b'_' => {
                    self.diagnostics
                        .push(Diagnostic::lexical(format!("bad numeric suffix near {}", self.span())));
                    self.bump();
                }
                _ => break,
            }
        }
        let suffix = match (has_u, has_l) {
            (false, false) => IntSuffix::None,
            (true, false) => IntSuffix::Unsigned,
            (false, true) => IntSuffix::Long,
            (true, true) => IntSuffix::UnsignedLong,
        };
        let value = u64::from_str_radix(digits, 16).unwrap_or(0);
        Some(TokenKind::IntConstant { value, suffix })
    }

    fn lex_escape(&mut self) -> Option<u8> {
        self.bump(); // consume backslash
        let c = self.bump()?;
        Some(match c {
            b'n' => b'\n',
            b't' => b'\t',
            b'\\' => b'\\',
            b'"' => b'"',
            b'\'' => b'\'',
            b'0' => 0,
            b'r' => b'\r',
            other => {
                self.diagnostics
                    .push(Diagnostic::lexical(format!("bad escape sequence '\\{}'", other as char)));
                other
            }
        })
    }

    fn lex_string(&mut self) -> Option<TokenKind> {
        self.bump(); // opening quote
        let mut bytes = Vec::new();
        loop {
            match self.peek() {
                None | Some(b'\n') => {
                    self.diagnostics
                        .push(Diagnostic::lexical("unterminated string literal"));
                    break;
                }
                Some(b'"') => {
                    self.bump();
                    break;
                }
                Some(b'\\') => {
                    if let Some(b) = self.lex_escape() {
                        bytes.push(b);
                    }
                }
                _ => bytes.push(self.bump().unwrap()),
            }
        }
        Some(TokenKind::StringLiteral {
            value: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }

    fn lex_char(&mut self) -> Option<TokenKind> {
        self.bump(); // opening quote
        let value = match self.peek() {
            None => {
                self.diagnostics
                    .push(Diagnostic::lexical("unterminated character literal"));
                0
            }
            Some(b'\\') => self.lex_escape().unwrap_or(0) as i8,
            Some(_) => self.bump().unwrap() as i8,
        };
        if self.peek() == Some(b'\'') {
            self.bump();
        } else {
            self.diagnostics
                .push(Diagnostic::lexical("unterminated character literal"));
        }
        Some(TokenKind::CharConstant { value })
    }

    fn lex_punct(&mut self) -> Option<TokenKind> {
        use TokenKind::*;
        let c = self.bump().unwrap();
        let two = |this: &mut Self, expect: u8, yes: TokenKind, no: TokenKind| {
            if this.peek() == Some(expect) {
                this.bump();
                yes
            } else {
                no
            }
        };
        Some(match c {
            b'(' => LParen,
            b')' => RParen,
            b'{' => LBrace,
            b'}' => RBrace,
            b';' => Semicolon,
            b',' => Comma,
            b':' => Colon,
            b'?' => Question,
            b'~' => Tilde,
            b'+' => match self.peek() {
                Some(b'+') => {
                    self.bump();
                    PlusPlus
                }
                Some(b'=') => {
                    self.bump();
                    PlusAssign
                }
                _ => Plus,
            },
            b'-' => match self.peek() {
                Some(b'-') => {
                    self.bump();
                    MinusMinus
                }
                Some(b'=') => {
                    self.bump();
                    MinusAssign
                }
                _ => Minus,
            },
            b'*' => two(self, b'=', StarAssign, Star),
            b'/' => two(self, b'=', SlashAssign, Slash),
            b'%' => two(self, b'=', PercentAssign, Percent),
            b'^' => two(self, b'=', CaretAssign, Caret),
            b'!' => two(self, b'=', NotEq, Bang),
            b'=' => two(self, b'=', Eq, Assign),
            b'&' => match self.peek() {
                Some(b'&') => {
                    self.bump();
                    AmpAmp
                }
                Some(b'=') => {
                    self.bump();
                    AmpAssign
                }
                _ => Amp,
            },
            b'|' => match self.peek() {
                Some(b'|') => {
                    self.bump();
                    PipePipe
                }
                Some(b'=') => {
                    self.bump();
                    PipeAssign
                }
                _ => Pipe,
            },
            b'<' => match self.peek() {
                Some(b'<') => {
                    self.bump();
                    two(self, b'=', ShlAssign, Shl)
                }
                Some(b'=') => {
                    self.bump();
                    LtEq
                }
                _ => Lt,
            },
            b'>' => match self.peek() {
                Some(b'>') => {
                    self.bump();
                    two(self, b'=', ShrAssign, Shr)
                }
                Some(b'=') => {
                    self.bump();
                    GtEq
                }
                _ => Gt,
            },
            other => {
                self.diagnostics
                    .push(Diagnostic::lexical(format!("unexpected character '{}'", other as char)));
                return None;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        let (toks, diags) = Lexer::new(src).tokenize();
        assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
        toks.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lexes_keywords_and_identifiers() {
        let kinds = kinds("int main foo_bar");
        assert_eq!(
            kinds,
            vec![
                TokenKind::KwInt,
                TokenKind::Identifier("main".into()),
                TokenKind::Identifier("foo_bar".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_int_suffixes() {
        let kinds = kinds("0xdoesnotexist".replace("0xdoesnotexist", "123 123u 123l 123ul").as_str());
        assert_eq!(
            kinds,
            vec![
                TokenKind::IntConstant { value: 123, suffix: IntSuffix::None },
                TokenKind::IntConstant { value: 123, suffix: IntSuffix::Unsigned },
                TokenKind::IntConstant { value: 123, suffix: IntSuffix::Long },
                TokenKind::IntConstant { value: 123, suffix: IntSuffix::UnsignedLong },
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_compound_operators() {
        let kinds = kinds("<<= >>= == != <= >= && ||");
        assert_eq!(
            kinds,
            vec![
                TokenKind::ShlAssign,
                TokenKind::ShrAssign,
                TokenKind::Eq,
                TokenKind::NotEq,
                TokenKind::LtEq,
                TokenKind::GtEq,
                TokenKind::AmpAmp,
                TokenKind::PipePipe,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn float_literal() {
        let kinds = kinds("1.5 2. 3e10 .5");
        assert_eq!(
            kinds,
            vec![
                TokenKind::FloatConstant { value: 1.5 },
                TokenKind::FloatConstant { value: 2.0 },
                TokenKind::FloatConstant { value: 3e10 },
                TokenKind::FloatConstant { value: 0.5 },
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn exponent_missing_digits_is_an_error() {
        let (_, diags) = Lexer::new("1e").tokenize();
        assert!(!diags.is_empty());
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let (_, diags) = Lexer::new("\"abc").tokenize();
        assert!(!diags.is_empty());
    }

    #[test]
    fn skips_comments() {
        let kinds = kinds("int /* block */ x; // line\n int y;");
        assert_eq!(
            kinds,
            vec![
                TokenKind::KwInt,
                TokenKind::Identifier("x".into()),
                TokenKind::Semicolon,
                TokenKind::KwInt,
                TokenKind::Identifier("y".into()),
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }
}

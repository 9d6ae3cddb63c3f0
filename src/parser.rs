//! Recursive-descent parser with Pratt-style expression precedence.
//!
//! Errors are accumulated into `self.diagnostics`; `synchronize` skips to the
//! next `;` or `}` so the parser can keep surfacing more diagnostics instead
//! of stopping at the first one.

use crate::ast::*;
use crate::error::{Diagnostic, SourceSpan};
use crate::token::{IntSuffix, Token, TokenKind};
use crate::types::Type;

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    diagnostics: Vec<Diagnostic>,
}

type PResult<T> = Result<T, ()>;

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens,
            pos: 0,
            diagnostics: Vec::new(),
        }
    }

    pub fn parse(mut self) -> (Program, Vec<Diagnostic>) {
        let mut declarations = Vec::new();
        while !self.at_eof() {
            match self.parse_declaration() {
                Ok(decl) => declarations.push(decl),
                Err(()) => self.synchronize_top_level(),
            }
        }
        (Program { declarations }, self.diagnostics)
    }

    // ----------------------------------------------------------------- //
    // token stream helpers
    // ----------------------------------------------------------------- //

    fn at_eof(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn peek_at(&self, n: usize) -> &Token {
        let idx = (self.pos + n).min(self.tokens.len() - 1);
        &self.tokens[idx]
    }

    fn span(&self) -> SourceSpan {
        self.peek().span
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if !self.at_eof() {
            self.pos += 1;
        }
        tok
    }

    fn error(&mut self, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::syntactic(self.span(), message));
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> PResult<Token> {
        if std::mem::discriminant(self.peek_kind()) == std::mem::discriminant(kind) {
            Ok(self.advance())
        } else {
            self.error(format!("expected {what}, got {:?}", self.peek_kind()));
            Err(())
        }
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if std::mem::discriminant(self.peek_kind()) == std::mem::discriminant(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_ident(&mut self) -> PResult<String> {
        match self.peek_kind().clone() {
            TokenKind::Identifier(name) => {
                self.advance();
                Ok(name)
            }
            _ => {
                self.error("expected an identifier");
                Err(())
            }
        }
    }

    fn synchronize_top_level(&mut self) {
        loop {
            match self.peek_kind() {
                TokenKind::Eof => break,
                TokenKind::Semicolon => {
                    self.advance();
                    break;
                }
                TokenKind::RBrace => {
                    self.advance();
                    break;
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn synchronize_stmt(&mut self) {
        loop {
            match self.peek_kind() {
                TokenKind::Eof | TokenKind::RBrace => break,
                TokenKind::Semicolon => {
                    self.advance();
                    break;
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    // ----------------------------------------------------------------- //
    // declarations
    // ----------------------------------------------------------------- //

    fn is_specifier(kind: &TokenKind) -> bool {
        matches!(
            kind,
            TokenKind::KwInt
                | TokenKind::KwLong
                | TokenKind::KwUnsigned
                | TokenKind::KwSigned
                | TokenKind::KwDouble
                | TokenKind::KwVoid
                | TokenKind::KwChar
                | TokenKind::KwStatic
                | TokenKind::KwExtern
        )
    }

    pub fn looks_like_declaration(&self) -> bool {
        Self::is_specifier(self.peek_kind())
    }

    /// Consume a specifier sequence, returning (base type, storage class).
    fn parse_specifiers(&mut self) -> PResult<(Type, StorageClass)> {
        let mut has_int = false;
        let mut has_long = false;
        let mut has_unsigned = false;
        let mut has_signed = false;
        let mut has_double = false;
        let mut storage: Option<StorageClass> = None;
        let mut count = 0;

        loop {
            match self.peek_kind() {
                TokenKind::KwInt => {
                    has_int = true;
                    self.advance();
                }
                TokenKind::KwLong => {
                    has_long = true;
                    self.advance();
                }
                TokenKind::KwUnsigned => {
                    has_unsigned = true;
                    self.advance();
                }
                TokenKind::KwSigned => {
                    has_signed = true;
                    self.advance();
                }
                TokenKind::KwDouble => {
                    has_double = true;
                    self.advance();
                }
                TokenKind::KwStatic => {
                    if storage.is_some() {
                        self.error("multiple storage-class specifiers");
                        return Err(());
                    }
                    storage = Some(StorageClass::Static);
                    self.advance();
                }
                TokenKind::KwExtern => {
                    if storage.is_some() {
                        self.error("multiple storage-class specifiers");
                        return Err(());
                    }
                    storage = Some(StorageClass::Extern);
                    self.advance();
                }
                _ => break,
            }
            count += 1;
        }

        if count == 0 {
            self.error("expected a declaration specifier");
            return Err(());
        }

        if has_unsigned && has_signed {
            self.error("declaration cannot be both signed and unsigned");
            return Err(());
        }
        if has_double && (has_int || has_long || has_unsigned || has_signed) {
            self.error("double cannot be combined with another type specifier");
            return Err(());
        }

        let ty = if has_double {
            Type::Double
        } else if has_long && has_unsigned {
            Type::ULong
        } else if has_long {
            Type::Long
        } else if has_unsigned {
            Type::UInt
        } else {
            Type::Int
        };

        Ok((ty, storage.unwrap_or(StorageClass::None)))
    }

    fn parse_declaration(&mut self) -> PResult<Declaration> {
        let span = self.span();
        let (base_ty, storage) = self.parse_specifiers()?;
        let name = self.expect_ident()?;

        if self.eat(&TokenKind::LParen) {
            self.parse_function_decl_tail(name, base_ty, storage, span)
                .map(Declaration::Function)
        } else {
            self.parse_variable_decl_tail(name, base_ty, storage, span)
                .map(Declaration::Variable)
        }
    }

    fn parse_param_list(&mut self) -> PResult<(Vec<Type>, Vec<String>)> {
        let mut types = Vec::new();
        let mut names = Vec::new();
        if self.eat(&TokenKind::KwVoid) {
            self.expect(&TokenKind::RParen, "')'")?;
            return Ok((types, names));
        }
        if !matches!(self.peek_kind(), TokenKind::RParen) {
            loop {
                let (ty, storage) = self.parse_specifiers()?;
                if storage != StorageClass::None {
                    self.error("parameters cannot have a storage-class specifier");
                    return Err(());
                }
                let name = self.expect_ident()?;
                types.push(ty);
                names.push(name);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen, "')'")?;
        Ok((types, names))
    }

    fn parse_function_decl_tail(
        &mut self,
        name: String,
        ret_type: Type,
        storage: StorageClass,
        span: SourceSpan,
    ) -> PResult<FunctionDecl> {
        let (param_types, params) = self.parse_param_list()?;
        let body = if self.eat(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_block()?)
        };
        Ok(FunctionDecl {
            name,
            ret_type,
            param_types,
            params,
            body,
            storage,
            span,
        })
    }

    fn parse_variable_decl_tail(
        &mut self,
        name: String,
        ty: Type,
        storage: StorageClass,
        span: SourceSpan,
    ) -> PResult<VariableDecl> {
        let init = if self.eat(&TokenKind::Assign) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        self.expect(&TokenKind::Semicolon, "';'")?;
        Ok(VariableDecl {
            name,
            ty,
            init,
            storage,
            span,
        })
    }

    // ----------------------------------------------------------------- //
    // blocks & statements
    // ----------------------------------------------------------------- //

    fn parse_block(&mut self) -> PResult<Block> {
        self.expect(&TokenKind::LBrace, "'{'")?;
        let mut items = Vec::new();
        while !matches!(self.peek_kind(), TokenKind::RBrace | TokenKind::Eof) {
            match self.parse_block_item() {
                Ok(item) => items.push(item),
                Err(()) => self.synchronize_stmt(),
            }
        }
        self.expect(&TokenKind::RBrace, "'}'")?;
        Ok(items)
    }

    fn parse_block_item(&mut self) -> PResult<BlockItem> {
        if self.looks_like_declaration() {
            self.parse_declaration().map(BlockItem::Declaration)
        } else {
            self.parse_statement().map(BlockItem::Statement)
        }
    }

    fn is_label_start(&self) -> bool {
        matches!(
            (self.peek_kind(), &self.peek_at(1).kind),
            (TokenKind::Identifier(_), TokenKind::Colon)
        )
    }

    fn parse_statement(&mut self) -> PResult<Statement> {
        match self.peek_kind() {
            TokenKind::KwReturn => {
                self.advance();
                let expr = if matches!(self.peek_kind(), TokenKind::Semicolon) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.expect(&TokenKind::Semicolon, "';'")?;
                Ok(Statement::Return(expr))
            }
            TokenKind::Semicolon => {
                self.advance();
                Ok(Statement::Null)
            }
            TokenKind::LBrace => Ok(Statement::Compound(self.parse_block()?)),
            TokenKind::KwIf => self.parse_if(),
            TokenKind::KwWhile => self.parse_while(),
            TokenKind::KwDo => self.parse_do_while(),
            TokenKind::KwFor => self.parse_for(),
            TokenKind::KwBreak => {
                self.advance();
                self.expect(&TokenKind::Semicolon, "';'")?;
                Ok(Statement::Break(String::new()))
            }
            TokenKind::KwContinue => {
                self.advance();
                self.expect(&TokenKind::Semicolon, "';'")?;
                Ok(Statement::Continue(String::new()))
            }
            TokenKind::KwSwitch => self.parse_switch(),
            TokenKind::KwCase => {
                self.advance();
                let value = self.parse_expr()?;
                self.expect(&TokenKind::Colon, "':'")?;
                let body = Box::new(self.parse_statement()?);
                Ok(Statement::Case {
                    value,
                    body,
                    label: String::new(),
                })
            }
            TokenKind::KwDefault => {
                self.advance();
                self.expect(&TokenKind::Colon, "':'")?;
                let body = Box::new(self.parse_statement()?);
                Ok(Statement::Default {
                    body,
                    label: String::new(),
                })
            }
            TokenKind::KwGoto => {
                self.advance();
                let name = self.expect_ident()?;
                self.expect(&TokenKind::Semicolon, "';'")?;
                Ok(Statement::Goto(name))
            }
            _ if self.is_label_start() => {
                let name = self.expect_ident()?;
                self.expect(&TokenKind::Colon, "':'")?;
                let body = Box::new(self.parse_statement()?);
                Ok(Statement::Labeled { name, body })
            }
            _ => {
                let expr = self.parse_expr()?;
                self.expect(&TokenKind::Semicolon, "';'")?;
                Ok(Statement::Expr(expr))
            }
        }
    }

    fn parse_if(&mut self) -> PResult<Statement> {
        self.advance();
        self.expect(&TokenKind::LParen, "'('")?;
        let cond = self.parse_expr()?;
        self.expect(&TokenKind::RParen, "')'")?;
        let then_branch = Box::new(self.parse_statement()?);
        let else_branch = if self.eat(&TokenKind::KwElse) {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Ok(Statement::If {
            cond,
            then_branch,
            else_branch,
        })
    }

    fn parse_while(&mut self) -> PResult<Statement> {
        self.advance();
        self.expect(&TokenKind::LParen, "'('")?;
        let cond = self.parse_expr()?;
        self.expect(&TokenKind::RParen, "')'")?;
        let body = Box::new(self.parse_statement()?);
        Ok(Statement::While {
            cond,
            body,
            label: String::new(),
        })
    }

    fn parse_do_while(&mut self) -> PResult<Statement> {
        self.advance();
        let body = Box::new(self.parse_statement()?);
        self.expect(&TokenKind::KwWhile, "'while'")?;
        self.expect(&TokenKind::LParen, "'('")?;
        let cond = self.parse_expr()?;
        self.expect(&TokenKind::RParen, "')'")?;
        self.expect(&TokenKind::Semicolon, "';'")?;
        Ok(Statement::DoWhile {
            body,
            cond,
            label: String::new(),
        })
    }

    fn parse_for(&mut self) -> PResult<Statement> {
        self.advance();
        self.expect(&TokenKind::LParen, "'('")?;
        let init = if self.looks_like_declaration() {
            let decl = self.parse_declaration()?;
            match decl {
                Declaration::Variable(v) => ForInit::Decl(Box::new(Declaration::Variable(v))),
                Declaration::Function(_) => {
                    self.error("a function cannot be declared in a for-init");
                    return Err(());
                }
            }
        } else if self.eat(&TokenKind::Semicolon) {
            ForInit::Expr(None)
        } else {
            let e = self.parse_expr()?;
            self.expect(&TokenKind::Semicolon, "';'")?;
            ForInit::Expr(Some(e))
        };
        let cond = if matches!(self.peek_kind(), TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(&TokenKind::Semicolon, "';'")?;
        let post = if matches!(self.peek_kind(), TokenKind::RParen) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(&TokenKind::RParen, "')'")?;
        let body = Box::new(self.parse_statement()?);
        Ok(Statement::For {
            init,
            cond,
            post,
            body,
            label: String::new(),
        })
    }

    fn parse_switch(&mut self) -> PResult<Statement> {
        self.advance();
        self.expect(&TokenKind::LParen, "'('")?;
        let expr = self.parse_expr()?;
        self.expect(&TokenKind::RParen, "')'")?;
        let body = Box::new(self.parse_statement()?);
        Ok(Statement::Switch {
            expr,
            body,
            cases: Vec::new(),
            has_default: false,
            label: String::new(),
        })
    }

    // ----------------------------------------------------------------- //
    // expressions (Pratt)
    // ----------------------------------------------------------------- //

    fn parse_expr(&mut self) -> PResult<Expr> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> PResult<Expr> {
        let lhs = self.parse_conditional()?;
        let op = match self.peek_kind() {
            TokenKind::Assign => AssignOp::Assign,
            TokenKind::PlusAssign => AssignOp::Add,
            TokenKind::MinusAssign => AssignOp::Subtract,
            TokenKind::StarAssign => AssignOp::Multiply,
            TokenKind::SlashAssign => AssignOp::Divide,
            TokenKind::PercentAssign => AssignOp::Remainder,
            TokenKind::AmpAssign => AssignOp::BitAnd,
            TokenKind::PipeAssign => AssignOp::BitOr,
            TokenKind::CaretAssign => AssignOp::BitXor,
            TokenKind::ShlAssign => AssignOp::ShiftLeft,
            TokenKind::ShrAssign => AssignOp::ShiftRight,
            _ => return Ok(lhs),
        };
        let span = self.span();
        self.advance();
        let rhs = self.parse_assignment()?; // right-associative
        Ok(Expr::new(
            ExprKind::Assignment(op, Box::new(lhs), Box::new(rhs)),
            span,
        ))
    }

    fn parse_conditional(&mut self) -> PResult<Expr> {
        let cond = self.parse_logical_or()?;
        if matches!(self.peek_kind(), TokenKind::Question) {
            let span = self.span();
            self.advance();
            let then_expr = self.parse_expr()?;
            self.expect(&TokenKind::Colon, "':'")?;
            let else_expr = self.parse_conditional()?; // right-associative
            Ok(Expr::new(
                ExprKind::Conditional(Box::new(cond), Box::new(then_expr), Box::new(else_expr)),
                span,
            ))
        } else {
            Ok(cond)
        }
    }

    fn parse_binary_level(
        &mut self,
        next: fn(&mut Self) -> PResult<Expr>,
        ops: &[(TokenKind, BinaryOp)],
    ) -> PResult<Expr> {
        let mut lhs = next(self)?;
        loop {
            let found = ops
                .iter()
                .find(|(k, _)| std::mem::discriminant(k) == std::mem::discriminant(self.peek_kind()));
            let Some((_, op)) = found else { break };
            let op = *op;
            let span = self.span();
            self.advance();
            let rhs = next(self)?;
            lhs = Expr::new(ExprKind::Binary(op, Box::new(lhs), Box::new(rhs)), span);
        }
        Ok(lhs)
    }

    fn parse_logical_or(&mut self) -> PResult<Expr> {
        self.parse_binary_level(Self::parse_logical_and, &[(TokenKind::PipePipe, BinaryOp::Or)])
    }

    fn parse_logical_and(&mut self) -> PResult<Expr> {
        self.parse_binary_level(Self::parse_bit_or, &[(TokenKind::AmpAmp, BinaryOp::And)])
    }

    fn parse_bit_or(&mut self) -> PResult<Expr> {
        self.parse_binary_level(Self::parse_bit_xor, &[(TokenKind::Pipe, BinaryOp::BitOr)])
    }

    fn parse_bit_xor(&mut self) -> PResult<Expr> {
        self.parse_binary_level(Self::parse_bit_and, &[(TokenKind::Caret, BinaryOp::BitXor)])
    }

    fn parse_bit_and(&mut self) -> PResult<Expr> {
        self.parse_binary_level(Self::parse_equality, &[(TokenKind::Amp, BinaryOp::BitAnd)])
    }

    fn parse_equality(&mut self) -> PResult<Expr> {
        self.parse_binary_level(
            Self::parse_relational,
            &[
                (TokenKind::Eq, BinaryOp::Equal),
                (TokenKind::NotEq, BinaryOp::NotEqual),
            ],
        )
    }

    fn parse_relational(&mut self) -> PResult<Expr> {
        self.parse_binary_level(
            Self::parse_shift,
            &[
                (TokenKind::Lt, BinaryOp::Less),
                (TokenKind::LtEq, BinaryOp::LessEqual),
                (TokenKind::Gt, BinaryOp::Greater),
                (TokenKind::GtEq, BinaryOp::GreaterEqual),
            ],
        )
    }

    fn parse_shift(&mut self) -> PResult<Expr> {
        self.parse_binary_level(
            Self::parse_additive,
            &[
                (TokenKind::Shl, BinaryOp::ShiftLeft),
                (TokenKind::Shr, BinaryOp::ShiftRight),
            ],
        )
    }

    fn parse_additive(&mut self) -> PResult<Expr> {
        self.parse_binary_level(
            Self::parse_multiplicative,
            &[
                (TokenKind::Plus, BinaryOp::Add),
                (TokenKind::Minus, BinaryOp::Subtract),
            ],
        )
    }

    fn parse_multiplicative(&mut self) -> PResult<Expr> {
        self.parse_binary_level(
            Self::parse_unary,
            &[
                (TokenKind::Star, BinaryOp::Multiply),
                (TokenKind::Slash, BinaryOp::Divide),
                (TokenKind::Percent, BinaryOp::Remainder),
            ],
        )
    }

    /// A cast `(type) expr` is distinguished from a parenthesized expression
    /// by whether the tokens after `(` form a specifier sequence.
    fn looks_like_cast(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::LParen) && Self::is_specifier(&self.peek_at(1).kind)
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        let span = self.span();
        match self.peek_kind() {
            TokenKind::Minus => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(Expr::new(ExprKind::Unary(UnaryOp::Negate, Box::new(operand)), span))
            }
            TokenKind::Tilde => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(Expr::new(ExprKind::Unary(UnaryOp::Complement, Box::new(operand)), span))
            }
            TokenKind::Bang => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(Expr::new(ExprKind::Unary(UnaryOp::Not, Box::new(operand)), span))
            }
            TokenKind::PlusPlus => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(Expr::new(
                    ExprKind::Unary(UnaryOp::PreIncrement, Box::new(operand)),
                    span,
                ))
            }
            TokenKind::MinusMinus => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(Expr::new(
                    ExprKind::Unary(UnaryOp::PreDecrement, Box::new(operand)),
                    span,
                ))
            }
            _ if self.looks_like_cast() => {
                self.advance(); // '('
                let (ty, storage) = self.parse_specifiers()?;
                if storage != StorageClass::None {
                    self.error("a cast cannot carry a storage-class specifier");
                    return Err(());
                }
                self.expect(&TokenKind::RParen, "')'")?;
                let inner = self.parse_unary()?;
                Ok(Expr::new(ExprKind::Cast(ty, Box::new(inner)), span))
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> PResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek_kind() {
                TokenKind::PlusPlus => {
                    let span = self.span();
                    self.advance();
                    expr = Expr::new(ExprKind::Unary(UnaryOp::PostIncrement, Box::new(expr)), span);
                }
                TokenKind::MinusMinus => {
                    let span = self.span();
                    self.advance();
                    expr = Expr::new(ExprKind::Unary(UnaryOp::PostDecrement, Box::new(expr)), span);
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let span = self.span();
        match self.peek_kind().clone() {
            TokenKind::IntConstant { value, suffix } => {
                self.advance();
                Ok(Expr::new(ExprKind::Constant(int_constant(value, suffix)), span))
            }
            TokenKind::FloatConstant { value } => {
                self.advance();
                Ok(Expr::new(ExprKind::Constant(Constant::Double(value)), span))
            }
            TokenKind::Identifier(name) => {
                self.advance();
                if self.eat(&TokenKind::LParen) {
                    let mut args = Vec::new();
                    if !matches!(self.peek_kind(), TokenKind::RParen) {
                        loop {
                            args.push(self.parse_expr()?);
                            if !self.eat(&TokenKind::Comma) {
                                break;
                            }
                        }
                    }
                    self.expect(&TokenKind::RParen, "')'")?;
                    Ok(Expr::new(ExprKind::FunctionCall(name, args), span))
                } else {
                    Ok(Expr::new(ExprKind::Variable(name), span))
                }
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(&TokenKind::RParen, "')'")?;
                Ok(inner)
            }
            other => {
                self.error(format!("unexpected token {other:?}"));
                Err(())
            }
        }
    }
}

/// Resolve an integer literal's type from its lexical suffix, following the
/// width-widening rule: a plain literal that doesn't fit in `int` becomes
/// `long`; `u`/`l` suffixes force unsigned/long.
fn int_constant(value: u64, suffix: IntSuffix) -> Constant {
    match suffix {
        IntSuffix::None => {
            if value <= i32::MAX as u64 {
                Constant::Int(value as i32)
            } else if value <= i64::MAX as u64 {
                Constant::Long(value as i64)
            } else {
                Constant::ULong(value)
            }
        }
        IntSuffix::Unsigned => {
            if value <= u32::MAX as u64 {
                Constant::UInt(value as u32)
            } else {
                Constant::ULong(value)
            }
        }
        IntSuffix::Long => {
            if value <= i64::MAX as u64 {
                Constant::Long(value as i64)
            } else {
                Constant::ULong(value)
            }
        }
        IntSuffix::UnsignedLong => Constant::ULong(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Lexer;

    fn parse_ok(src: &str) -> Program {
        let (tokens, lex_diags) = Lexer::new(src).tokenize();
        assert!(lex_diags.is_empty(), "{lex_diags:?}");
        let (program, diags) = Parser::new(tokens).parse();
        assert!(diags.is_empty(), "{diags:?}");
        program
    }

    #[test]
    fn parses_simple_function() {
        let program = parse_ok("int main(void) { return 2 + 3 * 4; }");
        assert_eq!(program.declarations.len(), 1);
        match &program.declarations[0] {
            Declaration::Function(f) => {
                assert_eq!(f.name, "main");
                assert_eq!(f.body.as_ref().unwrap().len(), 1);
            }
            _ => panic!("expected a function"),
        }
    }

    #[test]
    fn distinguishes_cast_from_parenthesized_expr() {
        let program = parse_ok("int main(void) { int x = (int)(1.5); return (x); }");
        let Declaration::Function(f) = &program.declarations[0] else {
            panic!()
        };
        let body = f.body.as_ref().unwrap();
        match &body[0] {
            BlockItem::Declaration(Declaration::Variable(v)) => {
                assert!(matches!(v.init.as_ref().unwrap().kind, ExprKind::Cast(..)));
            }
            _ => panic!("expected a variable declaration"),
        }
    }

    #[test]
    fn assignment_and_conditional_are_right_associative() {
        let program = parse_ok("int main(void) { int a; int b; int c; a = b = c; return a ? b ? 1 : 2 : 3; }");
        let Declaration::Function(f) = &program.declarations[0] else {
            panic!()
        };
        let body = f.body.as_ref().unwrap();
        let BlockItem::Statement(Statement::Expr(e)) = &body[3] else {
            panic!()
        };
        match &e.kind {
            ExprKind::Assignment(AssignOp::Assign, _, rhs) => {
                assert!(matches!(rhs.kind, ExprKind::Assignment(..)));
            }
            _ => panic!("expected nested assignment"),
        }
    }

    #[test]
    fn rejects_conflicting_specifiers() {
        let (tokens, _) = Lexer::new("unsigned signed int x;").tokenize();
        let (_, diags) = Parser::new(tokens).parse();
        assert!(!diags.is_empty());
    }

    #[test]
    fn function_prototype_has_no_body() {
        let program = parse_ok("int f(int a, int b);");
        let Declaration::Function(f) = &program.declarations[0] else {
            panic!()
        };
        assert!(f.body.is_none());
        assert_eq!(f.params, vec!["a", "b"]);
    }

    #[test]
    fn for_loop_with_declaration_init() {
        let program = parse_ok("int main(void) { int s = 0; for (int i = 0; i < 10; i = i + 1) s = s + i; return s; }");
        let Declaration::Function(f) = &program.declarations[0] else {
            panic!()
        };
        let body = f.body.as_ref().unwrap();
        assert!(matches!(
            body[1],
            BlockItem::Statement(Statement::For { init: ForInit::Decl(_), .. })
        ));
    }
}

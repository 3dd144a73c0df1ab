//! Recursive-descent parser with a four-token lookahead window.
//!
//! The lookahead is what lets the parser disambiguate `IDENT :` (a variable
//! declaration) from a bare expression statement, and `( IDENT :` / `( )`
//! followed by `->` (a function literal) from a parenthesized expression,
//! without backtracking.

use crate::{
    ast::{BinaryOp, Literal, LogicalOp, Node, NodeList, Param, UnaryOp},
    lexer::Lexer,
    token::{Token, TokenKind},
    types::Type,
};

/// A single accumulated parse failure.
#[derive(Debug, Clone)]
pub struct ParseError {
    pub line: i32,
    pub message: String,
}

/// Parse errors are capped at this many; synchronization stops adding new
/// ones past the cap to avoid runaway cascades on badly malformed input.
const MAX_ERRORS: usize = 256;

pub struct Parser<'src> {
    lexer: Lexer<'src>,
    previous: Token<'src>,
    current: Token<'src>,
    next: Token<'src>,
    next_next: Token<'src>,
    errors: Vec<ParseError>,
}

impl<'src> Parser<'src> {
    #[must_use]
    pub fn new(source: &'src str) -> Self {
        let mut lexer = Lexer::new(source);
        let current = lexer.next_token();
        let next = lexer.next_token();
        let next_next = lexer.next_token();
        Self {
            lexer,
            previous: current,
            current,
            next,
            next_next,
            errors: Vec::new(),
        }
    }

    /// Parses the whole program, returning the top-level statement list and
    /// any accumulated errors (parsing always produces *a* tree, even on
    /// error, so the caller decides whether to proceed based on `errors`).
    pub fn parse_program(mut self) -> (NodeList, Vec<ParseError>) {
        let mut program = NodeList::new();
        while self.current.kind != TokenKind::Eof {
            match self.declaration() {
                Ok(node) => program.push(node),
                Err(()) => self.synchronize(),
            }
        }
        self.errors.sort_by_key(|e| e.line);
        (program, self.errors)
    }

    // --- token stream plumbing -------------------------------------------------

    fn advance(&mut self) {
        self.previous = self.current;
        self.current = self.next;
        self.next = self.next_next;
        self.next_next = self.lexer.next_token();
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current.kind == kind
    }

    fn match_kind(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> Result<Token<'src>, ()> {
        if self.check(kind) {
            let tok = self.current;
            self.advance();
            Ok(tok)
        } else {
            Err(self.error(message))
        }
    }

    fn error(&mut self, message: &str) {
        if self.errors.len() < MAX_ERRORS {
            self.errors.push(ParseError {
                line: self.current.line,
                message: message.to_owned(),
            });
        }
    }

    fn synchronize(&mut self) {
        while self.current.kind != TokenKind::Eof {
            match self.current.kind {
                TokenKind::If
                | TokenKind::While
                | TokenKind::For
                | TokenKind::Foreach
                | TokenKind::LeftBrace
                | TokenKind::RightBrace
                | TokenKind::Return => return,
                TokenKind::Identifier if self.next.kind == TokenKind::Colon || self.next.kind == TokenKind::LeftParen => {
                    return;
                }
                _ => self.advance(),
            }
        }
    }

    // --- declarations / statements ----------------------------------------------

    fn declaration(&mut self) -> Result<Node, ()> {
        if self.check(TokenKind::Identifier) && self.next.kind == TokenKind::Colon {
            return self.var_or_fun_decl();
        }
        self.statement()
    }

    fn var_or_fun_decl(&mut self) -> Result<Node, ()> {
        let line = self.current.line;
        let name = self.current.lexeme.to_owned();
        self.advance(); // identifier
        self.advance(); // ':'
        if self.check(TokenKind::Struct) {
            return self.struct_decl(line, name);
        }
        if self.check(TokenKind::Enum) {
            return self.enum_decl(line, name);
        }
        let declared_type = self.parse_type()?;
        self.consume(TokenKind::Equal, "Expect '=' after declared type.")?;
        if let Type::Fun { .. } = &declared_type {
            if self.check(TokenKind::LeftParen) || self.check(TokenKind::Arrow) {
                return self.fun_literal_decl(line, name, declared_type);
            }
        }
        let init = self.expression()?;
        Ok(Node::DeclVar {
            line,
            name,
            declared_type,
            init: Box::new(init),
        })
    }

    fn fun_literal_decl(&mut self, line: i32, name: String, declared_type: Type) -> Result<Node, ()> {
        let Type::Fun { params: param_types, returns } = declared_type else {
            unreachable!("caller only enters for Fun types")
        };
        self.consume(TokenKind::LeftParen, "Expect '(' to begin function literal.")?;
        let mut params = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                let pname = self
                    .consume(TokenKind::Identifier, "Expect parameter name.")?
                    .lexeme
                    .to_owned();
                self.consume(TokenKind::Colon, "Expect ':' after parameter name.")?;
                let pty = self.parse_type()?;
                params.push(Param { name: pname, ty: pty });
                if !self.match_kind(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "Expect ')' after parameters.")?;
        self.consume(TokenKind::Arrow, "Expect '->' after parameter list.")?;
        let return_type = self.parse_type()?;
        self.consume(TokenKind::LeftBrace, "Expect '{' to begin function body.")?;
        let body = self.block_body()?;
        let _ = param_types;
        let _ = returns;
        Ok(Node::DeclFun {
            line,
            name,
            params,
            return_type,
            body,
        })
    }

    fn struct_decl(&mut self, line: i32, name: String) -> Result<Node, ()> {
        self.advance(); // 'struct'
        let super_name = if self.match_kind(TokenKind::Less) {
            Some(self.consume(TokenKind::Identifier, "Expect superclass name after '<'.")?.lexeme.to_owned())
        } else {
            None
        };
        self.consume(TokenKind::LeftBrace, "Expect '{' to begin struct body.")?;
        let mut props = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
            let pname = self
                .consume(TokenKind::Identifier, "Expect property name.")?
                .lexeme
                .to_owned();
            self.consume(TokenKind::Colon, "Expect ':' after property name.")?;
            let pty = self.parse_type()?;
            self.consume(TokenKind::Equal, "Expect '=' after property type.")?;
            let init = self.expression()?;
            props.push((pname, pty, init));
        }
        self.consume(TokenKind::RightBrace, "Expect '}' after struct body.")?;
        Ok(Node::DeclStruct {
            line,
            name,
            super_name,
            props,
        })
    }

    fn enum_decl(&mut self, line: i32, name: String) -> Result<Node, ()> {
        self.advance(); // 'enum'
        self.consume(TokenKind::LeftBrace, "Expect '{' to begin enum body.")?;
        let mut variants = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
            variants.push(
                self.consume(TokenKind::Identifier, "Expect enum variant name.")?
                    .lexeme
                    .to_owned(),
            );
            if !self.match_kind(TokenKind::Comma) {
                break;
            }
        }
        self.consume(TokenKind::RightBrace, "Expect '}' after enum body.")?;
        Ok(Node::DeclEnum { line, name, variants })
    }

    fn statement(&mut self) -> Result<Node, ()> {
        match self.current.kind {
            TokenKind::LeftBrace => self.block(),
            TokenKind::If => self.if_statement(),
            TokenKind::While => self.while_statement(),
            TokenKind::For => self.for_statement(),
            TokenKind::Foreach => self.foreach_statement(),
            _ => self.expr_statement(),
        }
    }

    fn block_body(&mut self) -> Result<NodeList, ()> {
        let mut body = NodeList::new();
        while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
            match self.declaration() {
                Ok(node) => body.push(node),
                Err(()) => self.synchronize(),
            }
        }
        self.consume(TokenKind::RightBrace, "Expect '}' after block.")?;
        Ok(body)
    }

    fn block(&mut self) -> Result<Node, ()> {
        let line = self.current.line;
        self.advance(); // '{'
        let body = self.block_body()?;
        Ok(Node::Block { line, body })
    }

    fn if_statement(&mut self) -> Result<Node, ()> {
        let line = self.current.line;
        self.advance(); // 'if'
        let cond = self.expression()?;
        self.consume(TokenKind::LeftBrace, "Expect '{' after if condition.")?;
        let then_branch = self.block()?;
        let else_branch = if self.match_kind(TokenKind::Else) {
            if self.check(TokenKind::If) {
                self.if_statement()?
            } else {
                self.consume(TokenKind::LeftBrace, "Expect '{' after else.")?;
                self.block()?
            }
        } else {
            Node::Nil { line }
        };
        Ok(Node::IfElse {
            line,
            cond: Box::new(cond),
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
        })
    }

    fn while_statement(&mut self) -> Result<Node, ()> {
        let line = self.current.line;
        self.advance(); // 'while'
        let cond = self.expression()?;
        self.consume(TokenKind::LeftBrace, "Expect '{' after while condition.")?;
        let body = self.block()?;
        Ok(Node::While {
            line,
            cond: Box::new(cond),
            body: Box::new(body),
        })
    }

    fn for_statement(&mut self) -> Result<Node, ()> {
        let line = self.current.line;
        self.advance(); // 'for'
        let init = self.var_or_fun_decl()?;
        self.consume(TokenKind::Comma, "Expect ',' after for-loop initializer.")?;
        let cond = self.expression()?;
        self.consume(TokenKind::Comma, "Expect ',' after for-loop condition.")?;
        let update = self.assignment()?;
        self.consume(TokenKind::LeftBrace, "Expect '{' after for-loop clauses.")?;
        let body = self.block()?;
        Ok(Node::For {
            line,
            init: Box::new(init),
            cond: Box::new(cond),
            update: Box::new(update),
            body: Box::new(body),
        })
    }

    /// Desugars `foreach e : T in xs { body }` into the equivalent indexed
    /// `for` loop described in `SPEC_FULL.md` §4.2, using a synthetic index
    /// variable at line `-1`.
    fn foreach_statement(&mut self) -> Result<Node, ()> {
        let line = self.current.line;
        self.advance(); // 'foreach'
        let elem_name = self.consume(TokenKind::Identifier, "Expect loop variable name.")?.lexeme.to_owned();
        self.consume(TokenKind::Colon, "Expect ':' after loop variable name.")?;
        let elem_type = self.parse_type()?;
        self.consume(TokenKind::In, "Expect 'in' after loop variable type.")?;
        let iterable = self.expression()?;
        self.consume(TokenKind::LeftBrace, "Expect '{' after foreach clause.")?;
        let user_body = self.block_body()?;

        let idx_name = "_idx_".to_owned();
        let init = Node::DeclVar {
            line: -1,
            name: idx_name.clone(),
            declared_type: Type::Int,
            init: Box::new(Node::Literal {
                line: -1,
                value: Literal::Int(0),
            }),
        };
        let cond = Node::Binary {
            line: -1,
            op: BinaryOp::Less,
            left: Box::new(Node::GetVar { line: -1, name: idx_name.clone() }),
            right: Box::new(Node::GetProp {
                line: -1,
                object: Box::new(iterable.clone()),
                name: "size".to_owned(),
            }),
        };
        let update = Node::SetVar {
            line: -1,
            name: idx_name.clone(),
            value: Box::new(Node::Binary {
                line: -1,
                op: BinaryOp::Add,
                left: Box::new(Node::GetVar { line: -1, name: idx_name.clone() }),
                right: Box::new(Node::Literal {
                    line: -1,
                    value: Literal::Int(1),
                }),
            }),
        };
        let mut body = NodeList::new();
        body.push(Node::DeclVar {
            line,
            name: elem_name,
            declared_type: elem_type,
            init: Box::new(Node::GetElement {
                line,
                object: Box::new(iterable),
                index: Box::new(Node::GetVar { line: -1, name: idx_name }),
            }),
        });
        body.nodes.extend(user_body.nodes);

        Ok(Node::For {
            line,
            init: Box::new(init),
            cond: Box::new(cond),
            update: Box::new(update),
            body: Box::new(Node::Block { line, body }),
        })
    }

    fn expr_statement(&mut self) -> Result<Node, ()> {
        if self.match_kind(TokenKind::Return) {
            let line = self.previous.line;
            let value = if self.check(TokenKind::RightBrace) {
                Node::Nil { line }
            } else {
                self.expression()?
            };
            return Ok(Node::Return {
                line,
                value: Box::new(value),
            });
        }
        let line = self.current.line;
        let expr = self.expression()?;
        Ok(Node::ExprStmt {
            line,
            expr: Box::new(expr),
        })
    }

    // --- expressions (precedence climbing) --------------------------------------

    fn expression(&mut self) -> Result<Node, ()> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<Node, ()> {
        let line = self.current.line;
        let target = self.or()?;
        if self.match_kind(TokenKind::Equal) {
            let value = self.expression()?;
            return match target {
                Node::GetVar { name, .. } => Ok(Node::SetVar {
                    line,
                    name,
                    value: Box::new(value),
                }),
                Node::GetProp { object, name, .. } => Ok(Node::SetProp {
                    line,
                    object,
                    name,
                    value: Box::new(value),
                }),
                Node::GetElement { object, index, .. } => Ok(Node::SetElement {
                    line,
                    object,
                    index,
                    value: Box::new(value),
                }),
                _ => Err(self.error("Invalid assignment target.")),
            };
        }
        Ok(target)
    }

    fn or(&mut self) -> Result<Node, ()> {
        let mut expr = self.and()?;
        while self.match_kind(TokenKind::Or) {
            let line = self.previous.line;
            let right = self.and()?;
            expr = Node::Logical {
                line,
                op: LogicalOp::Or,
                left: Box::new(expr),
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn and(&mut self) -> Result<Node, ()> {
        let mut expr = self.equality()?;
        while self.match_kind(TokenKind::And) {
            let line = self.previous.line;
            let right = self.equality()?;
            expr = Node::Logical {
                line,
                op: LogicalOp::And,
                left: Box::new(expr),
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn equality(&mut self) -> Result<Node, ()> {
        let mut expr = self.relation()?;
        loop {
            let op = match self.current.kind {
                TokenKind::EqualEqual => BinaryOp::Equal,
                TokenKind::BangEqual => BinaryOp::NotEqual,
                TokenKind::In => BinaryOp::In,
                _ => break,
            };
            let line = self.current.line;
            self.advance();
            let right = self.relation()?;
            expr = Node::Binary {
                line,
                op,
                left: Box::new(expr),
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn relation(&mut self) -> Result<Node, ()> {
        let mut expr = self.term()?;
        loop {
            let op = match self.current.kind {
                TokenKind::Less => BinaryOp::Less,
                TokenKind::LessEqual => BinaryOp::LessEqual,
                TokenKind::Greater => BinaryOp::Greater,
                TokenKind::GreaterEqual => BinaryOp::GreaterEqual,
                _ => break,
            };
            let line = self.current.line;
            self.advance();
            let right = self.term()?;
            expr = Node::Binary {
                line,
                op,
                left: Box::new(expr),
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn term(&mut self) -> Result<Node, ()> {
        let mut expr = self.factor()?;
        loop {
            let op = match self.current.kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Subtract,
                _ => break,
            };
            let line = self.current.line;
            self.advance();
            let right = self.factor()?;
            expr = Node::Binary {
                line,
                op,
                left: Box::new(expr),
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn factor(&mut self) -> Result<Node, ()> {
        let mut expr = self.unary()?;
        loop {
            let op = match self.current.kind {
                TokenKind::Star => BinaryOp::Multiply,
                TokenKind::Slash => BinaryOp::Divide,
                TokenKind::Percent => BinaryOp::Mod,
                _ => break,
            };
            let line = self.current.line;
            self.advance();
            let right = self.unary()?;
            expr = Node::Binary {
                line,
                op,
                left: Box::new(expr),
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn unary(&mut self) -> Result<Node, ()> {
        let op = match self.current.kind {
            TokenKind::Minus => Some(UnaryOp::Negate),
            TokenKind::Bang => Some(UnaryOp::Not),
            _ => None,
        };
        if let Some(op) = op {
            let line = self.current.line;
            self.advance();
            let operand = self.unary()?;
            return Ok(Node::Unary {
                line,
                op,
                operand: Box::new(operand),
            });
        }
        self.call()
    }

    fn call(&mut self) -> Result<Node, ()> {
        let mut expr = self.primary()?;
        loop {
            let line = self.current.line;
            if self.match_kind(TokenKind::Dot) {
                let name = self.consume(TokenKind::Identifier, "Expect property name after '.'.")?.lexeme.to_owned();
                expr = Node::GetProp {
                    line,
                    object: Box::new(expr),
                    name,
                };
            } else if self.match_kind(TokenKind::LeftParen) {
                let mut args = Vec::new();
                if !self.check(TokenKind::RightParen) {
                    loop {
                        args.push(self.expression()?);
                        if !self.match_kind(TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.consume(TokenKind::RightParen, "Expect ')' after arguments.")?;
                expr = Node::Call {
                    line,
                    callee: Box::new(expr),
                    args,
                    type_args: Vec::new(),
                };
            } else if self.match_kind(TokenKind::LeftBracket) {
                let index = self.expression()?;
                self.consume(TokenKind::RightBracket, "Expect ']' after index.")?;
                expr = Node::GetElement {
                    line,
                    object: Box::new(expr),
                    index: Box::new(index),
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Node, ()> {
        let line = self.current.line;
        match self.current.kind {
            TokenKind::Int => {
                let text = self.current.lexeme;
                self.advance();
                let value = text.parse::<i32>().map_err(|_| self.error("Invalid integer literal."))?;
                Ok(Node::Literal { line, value: Literal::Int(value) })
            }
            TokenKind::Float => {
                let text = self.current.lexeme;
                self.advance();
                let value = text.parse::<f64>().map_err(|_| self.error("Invalid float literal."))?;
                Ok(Node::Literal {
                    line,
                    value: Literal::Float(value),
                })
            }
            TokenKind::String => {
                let text = &self.current.lexeme[1..self.current.lexeme.len() - 1];
                let value = text.to_owned();
                self.advance();
                Ok(Node::Literal {
                    line,
                    value: Literal::String(value),
                })
            }
            TokenKind::True => {
                self.advance();
                Ok(Node::Literal { line, value: Literal::Bool(true) })
            }
            TokenKind::False => {
                self.advance();
                Ok(Node::Literal {
                    line,
                    value: Literal::Bool(false),
                })
            }
            TokenKind::Nil => {
                self.advance();
                Ok(Node::Nil { line })
            }
            TokenKind::LeftParen => {
                // Disambiguate a parenthesized expression from a function
                // literal: `(` immediately followed by `)` or by
                // `IDENT :` means a parameter list.
                let looks_like_params = self.next.kind == TokenKind::RightParen
                    || (self.next.kind == TokenKind::Identifier && self.next_next.kind == TokenKind::Colon);
                if looks_like_params {
                    return self.fun_literal_value(line);
                }
                self.advance();
                let expr = self.expression()?;
                self.consume(TokenKind::RightParen, "Expect ')' after expression.")?;
                Ok(expr)
            }
            TokenKind::List => self.container_literal(line, true),
            TokenKind::Map => self.container_literal(line, false),
            TokenKind::Identifier => {
                let name = self.current.lexeme.to_owned();
                self.advance();
                Ok(Node::GetVar { line, name })
            }
            TokenKind::IntKw | TokenKind::FloatKw | TokenKind::Bool | TokenKind::Byte | TokenKind::StringKw => {
                // `int(x)`-style cast: parse the keyword as a type then
                // require a parenthesized operand.
                let target = self.parse_type()?;
                self.consume(TokenKind::LeftParen, "Expect '(' after cast target type.")?;
                let expr = self.expression()?;
                self.consume(TokenKind::RightParen, "Expect ')' after cast expression.")?;
                Ok(Node::Cast {
                    line,
                    target,
                    expr: Box::new(expr),
                })
            }
            _ => Err(self.error("Expect expression.")),
        }
    }

    fn fun_literal_value(&mut self, line: i32) -> Result<Node, ()> {
        self.advance(); // '('
        let mut params = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                let pname = self.consume(TokenKind::Identifier, "Expect parameter name.")?.lexeme.to_owned();
                self.consume(TokenKind::Colon, "Expect ':' after parameter name.")?;
                let pty = self.parse_type()?;
                params.push(Param { name: pname, ty: pty });
                if !self.match_kind(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "Expect ')' after parameters.")?;
        self.consume(TokenKind::Arrow, "Expect '->' after parameter list.")?;
        let return_type = self.parse_type()?;
        self.consume(TokenKind::LeftBrace, "Expect '{' to begin function body.")?;
        let body = self.block_body()?;
        Ok(Node::DeclFun {
            line,
            name: String::new(),
            params,
            return_type,
            body,
        })
    }

    fn container_literal(&mut self, line: i32, is_list: bool) -> Result<Node, ()> {
        let name = if is_list { "List" } else { "Map" };
        self.advance(); // 'List' | 'Map'
        self.consume(TokenKind::Less, "Expect '<' after container type name.")?;
        let elem = self.parse_type()?;
        self.consume(TokenKind::Greater, "Expect '>' after container element type.")?;
        self.consume(TokenKind::LeftParen, "Expect '(' to construct container.")?;
        self.consume(TokenKind::RightParen, "Expect ')' to construct container.")?;
        Ok(Node::Call {
            line,
            callee: Box::new(Node::GetVar {
                line,
                name: name.to_owned(),
            }),
            args: Vec::new(),
            type_args: vec![elem],
        })
    }

    // --- type syntax -------------------------------------------------------------

    fn parse_type(&mut self) -> Result<Type, ()> {
        match self.current.kind {
            TokenKind::IntKw => {
                self.advance();
                Ok(Type::Int)
            }
            TokenKind::FloatKw => {
                self.advance();
                Ok(Type::Float)
            }
            TokenKind::Bool => {
                self.advance();
                Ok(Type::Bool)
            }
            TokenKind::Byte => {
                self.advance();
                Ok(Type::Byte)
            }
            TokenKind::StringKw => {
                self.advance();
                Ok(Type::String)
            }
            TokenKind::Nil => {
                self.advance();
                Ok(Type::Nil)
            }
            TokenKind::File => {
                self.advance();
                Ok(Type::File)
            }
            TokenKind::ColonEqual => {
                self.advance();
                Ok(Type::Infer)
            }
            TokenKind::Struct => {
                self.advance();
                let super_name = if self.match_kind(TokenKind::Less) {
                    Some(self.consume(TokenKind::Identifier, "Expect superclass name after '<'.")?.lexeme.to_owned())
                } else {
                    None
                };
                Ok(Type::Struct {
                    name: String::new(),
                    super_name,
                    props: Vec::new(),
                })
            }
            TokenKind::Enum => {
                self.advance();
                Ok(Type::Enum {
                    name: String::new(),
                    variants: Vec::new(),
                })
            }
            TokenKind::List => {
                self.advance();
                self.consume(TokenKind::Less, "Expect '<' after 'List'.")?;
                let elem = self.parse_type()?;
                self.consume(TokenKind::Greater, "Expect '>' after List element type.")?;
                Ok(Type::List(Box::new(elem)))
            }
            TokenKind::Map => {
                self.advance();
                self.consume(TokenKind::Less, "Expect '<' after 'Map'.")?;
                let value = self.parse_type()?;
                self.consume(TokenKind::Greater, "Expect '>' after Map value type.")?;
                Ok(Type::Map(Box::new(value)))
            }
            TokenKind::LeftParen => {
                self.advance();
                let mut params = Vec::new();
                if !self.check(TokenKind::RightParen) {
                    loop {
                        params.push(self.parse_type()?);
                        if !self.match_kind(TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.consume(TokenKind::RightParen, "Expect ')' after parameter type list.")?;
                self.consume(TokenKind::Arrow, "Expect '->' after parameter type list.")?;
                let returns = self.parse_type()?;
                Ok(Type::Fun {
                    params,
                    returns: Box::new(returns),
                })
            }
            TokenKind::Identifier => {
                let name = self.current.lexeme.to_owned();
                self.advance();
                Ok(Type::Identifier(name))
            }
            _ => Err(self.error("Expect type.")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> (NodeList, Vec<ParseError>) {
        Parser::new(src).parse_program()
    }

    #[test]
    fn simple_var_decl() {
        let (program, errors) = parse("x : int = 1 + 2 * 3 - 4");
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(program.nodes.len(), 1);
        assert!(matches!(program.nodes[0], Node::DeclVar { .. }));
    }

    #[test]
    fn if_else() {
        let (_program, errors) = parse("if true { x : int = 1 } else { x : int = 2 }");
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn foreach_desugars_to_for() {
        let (program, errors) = parse("foreach v : int in xs { print(v) }");
        assert!(errors.is_empty(), "{errors:?}");
        assert!(matches!(program.nodes[0], Node::For { .. }));
    }

    #[test]
    fn type_mismatch_is_a_compiler_concern_not_a_parse_error() {
        let (_program, errors) = parse("x : int = \"hello\"");
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn unterminated_block_reports_one_error() {
        let (_program, errors) = parse("x : int = 1 {");
        assert!(!errors.is_empty());
    }
}

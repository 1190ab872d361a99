use std::rc::Rc;

use crate::ast::{BinaryOp, Literal, Node};
use crate::error::ParseError;
use crate::lexer::{Token, TokenKind};

/// Recursive-descent, precedence-climbing parser. Fails on the first
/// structural violation; there is no recovery or resynchronization.
pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, position: 0 }
    }

    /// Parses the whole token sequence into the top-level container, which
    /// catches stray return signals but pushes no frame of its own.
    pub fn parse(&mut self) -> Result<Node, ParseError> {
        let mut statements = Vec::new();
        while self.not_eof() {
            statements.push(self.parse_declaration()?);
        }

        Ok(Node::FuncContainer {
            body: Box::new(Node::Block(statements)),
            top_level: true,
        })
    }

    fn not_eof(&self) -> bool {
        !matches!(self.at().kind, TokenKind::Eof)
    }

    fn at(&self) -> &Token {
        &self.tokens[self.position]
    }

    fn eat(&mut self) -> Token {
        let token = self.tokens[self.position].clone();
        if self.not_eof() {
            self.position += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.at().kind == *kind
    }

    fn eat_if(&mut self, kind: TokenKind) -> bool {
        if self.check(&kind) {
            self.eat();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, message: &str) -> Result<Token, ParseError> {
        if self.check(&kind) {
            Ok(self.eat())
        } else {
            Err(self.error(message))
        }
    }

    fn expect_identifier(&mut self, message: &str) -> Result<String, ParseError> {
        match self.at().kind.clone() {
            TokenKind::Identifier(name) => {
                self.eat();
                Ok(name)
            }
            _ => Err(self.error(message)),
        }
    }

    fn error(&self, message: &str) -> ParseError {
        ParseError {
            line: self.at().line,
            message: message.to_string(),
        }
    }

    fn parse_declaration(&mut self) -> Result<Node, ParseError> {
        if self.eat_if(TokenKind::Func) {
            return self.parse_func_def();
        }
        self.parse_statement(true)
    }

    fn parse_func_def(&mut self) -> Result<Node, ParseError> {
        let name = self.expect_identifier("Expected function name after 'func' keyword")?;
        self.expect(TokenKind::LParen, "Expected '(' after function name")?;
        let params = self.parse_param_list()?;

        if !self.eat_if(TokenKind::LBrace) {
            return Err(self.error("Expected '{' after function declaration"));
        }
        let body = self.parse_block()?;

        Ok(Node::FuncDef {
            name,
            params,
            body: Rc::new(body),
        })
    }

    fn parse_param_list(&mut self) -> Result<Vec<String>, ParseError> {
        let mut params = Vec::new();

        if !self.check(&TokenKind::RParen) {
            loop {
                params.push(
                    self.expect_identifier("Expected identifier in function parameter definition")?,
                );
                if !self.eat_if(TokenKind::Comma) {
                    break;
                }
            }
        }

        self.expect(
            TokenKind::RParen,
            "Expected ')' after function parameter definition",
        )?;
        Ok(params)
    }

    /// `ctx_container` decides whether a bare `{ ... }` gets its own scope
    /// frame. Control-flow bodies pass false so loops iterate without
    /// pushing a frame per iteration.
    fn parse_statement(&mut self, ctx_container: bool) -> Result<Node, ParseError> {
        if self.eat_if(TokenKind::If) {
            return self.parse_if();
        }
        if self.eat_if(TokenKind::While) {
            return self.parse_while();
        }
        if self.eat_if(TokenKind::Global) {
            return self.parse_global();
        }
        if self.eat_if(TokenKind::Return) {
            return self.parse_return();
        }
        if self.eat_if(TokenKind::Pass) {
            return self.parse_pass();
        }
        if self.eat_if(TokenKind::For) {
            return self.parse_for();
        }
        if self.eat_if(TokenKind::Foreach) {
            return self.parse_foreach();
        }
        if self.eat_if(TokenKind::LBrace) {
            let block = self.parse_block()?;
            if ctx_container {
                return Ok(Node::ScopeContainer(Box::new(block)));
            }
            return Ok(block);
        }

        self.parse_expr_statement()
    }

    fn parse_if(&mut self) -> Result<Node, ParseError> {
        self.expect(TokenKind::LParen, "Expected '(' after if")?;
        if self.eat_if(TokenKind::RParen) || !self.not_eof() {
            return Err(self.error("Expected expression for the if statement"));
        }
        let cond = self.parse_expression()?;
        self.expect(TokenKind::RParen, "Expected ')' after if expression")?;
        let body = self.parse_statement(false)?;

        Ok(Node::If {
            cond: Box::new(cond),
            body: Box::new(body),
        })
    }

    fn parse_while(&mut self) -> Result<Node, ParseError> {
        self.expect(TokenKind::LParen, "Expected '(' after while")?;
        if self.eat_if(TokenKind::RParen) || !self.not_eof() {
            return Err(self.error("Expected expression for the while statement"));
        }
        let cond = self.parse_expression()?;
        self.expect(TokenKind::RParen, "Expected ')' after while expression")?;
        let body = self.parse_statement(false)?;

        Ok(Node::While {
            cond: Box::new(cond),
            body: Box::new(body),
        })
    }

    fn parse_global(&mut self) -> Result<Node, ParseError> {
        let name = self.expect_identifier("Expected variable name after 'global'")?;
        self.expect(
            TokenKind::Semicolon,
            "Expected ';' after global declaration statement",
        )?;
        Ok(Node::GlobalDecl(name))
    }

    fn parse_return(&mut self) -> Result<Node, ParseError> {
        let expr = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(Box::new(self.parse_expression()?))
        };
        self.expect(TokenKind::Semicolon, "Expected ';' after return value")?;
        Ok(Node::Return(expr))
    }

    fn parse_pass(&mut self) -> Result<Node, ParseError> {
        let name = self.expect_identifier("Expected variable name after 'pass'")?;
        self.expect(TokenKind::LBrace, "Expected '{' for the pass statement")?;
        let block = self.parse_block()?;
        self.expect(TokenKind::Semicolon, "Expected ';' after pass statement")?;

        Ok(Node::Pass {
            name,
            body: Box::new(Node::FuncContainer {
                body: Box::new(block),
                top_level: false,
            }),
        })
    }

    fn parse_for(&mut self) -> Result<Node, ParseError> {
        self.expect(TokenKind::LParen, "Expected '(' after for")?;
        if self.eat_if(TokenKind::RParen) || !self.not_eof() {
            return Err(self.error("Expected expression for the for statement"));
        }

        let var = self.expect_identifier("Expected variable name in for loop")?;
        self.expect(TokenKind::Comma, "Expected ',' after variable name in for loop")?;
        let start = self.parse_expression()?;
        self.expect(TokenKind::Comma, "Expected ',' after starting value in for loop")?;
        let end = self.parse_expression()?;
        self.expect(TokenKind::RParen, "Expected ')' after end value in for loop")?;
        let body = self.parse_statement(false)?;

        Ok(Node::For {
            var,
            start: Box::new(start),
            end: Box::new(end),
            body: Box::new(body),
        })
    }

    fn parse_foreach(&mut self) -> Result<Node, ParseError> {
        self.expect(TokenKind::LParen, "Expected '(' after foreach")?;
        if self.eat_if(TokenKind::RParen) || !self.not_eof() {
            return Err(self.error("Expected expression for the foreach statement"));
        }

        let var = self.expect_identifier("Expected variable name in foreach loop")?;
        self.expect(
            TokenKind::Colon,
            "Expected ':' after variable name in foreach loop",
        )?;
        let array = self.parse_expression()?;
        self.expect(TokenKind::RParen, "Expected ')' after value in foreach loop")?;
        let body = self.parse_statement(false)?;

        Ok(Node::Foreach {
            var,
            array: Box::new(array),
            body: Box::new(body),
        })
    }

    fn parse_block(&mut self) -> Result<Node, ParseError> {
        let mut statements = Vec::new();

        while !self.check(&TokenKind::RBrace) && self.not_eof() {
            statements.push(self.parse_declaration()?);
        }

        self.expect(
            TokenKind::RBrace,
            "Expected '}' at the end of a scope block.",
        )?;
        Ok(Node::Block(statements))
    }

    fn parse_expr_statement(&mut self) -> Result<Node, ParseError> {
        let expr = self.parse_expression()?;
        self.expect(
            TokenKind::Semicolon,
            "Expected ';' after expression statement",
        )?;
        Ok(expr)
    }

    fn parse_expression(&mut self) -> Result<Node, ParseError> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Result<Node, ParseError> {
        let left = self.parse_or()?;

        if self.eat_if(TokenKind::Equal) {
            let right = self.parse_assignment()?;

            return Ok(match left {
                Node::Variable { name, global } => Node::Assign {
                    name,
                    global,
                    value: Box::new(right),
                },
                Node::TableGet { value, name } => Node::TableSet {
                    target: value,
                    name,
                    value: Box::new(right),
                },
                Node::TableGetExpr { value, key } => Node::TableSetExpr {
                    target: value,
                    key,
                    value: Box::new(right),
                },
                // Any other left-hand side silently discards the assignment
                // and stands as a plain expression.
                other => other,
            });
        }

        Ok(left)
    }

    fn parse_or(&mut self) -> Result<Node, ParseError> {
        let mut left = self.parse_and()?;

        while self.eat_if(TokenKind::Or) {
            let right = self.parse_and()?;
            left = Node::Binary {
                left: Box::new(left),
                right: Box::new(right),
                op: BinaryOp::Or,
            };
        }

        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Node, ParseError> {
        let mut left = self.parse_equality()?;

        while self.eat_if(TokenKind::And) {
            let right = self.parse_equality()?;
            left = Node::Binary {
                left: Box::new(left),
                right: Box::new(right),
                op: BinaryOp::And,
            };
        }

        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Node, ParseError> {
        let mut left = self.parse_comparison()?;

        loop {
            let op = if self.eat_if(TokenKind::EqualEqual) {
                BinaryOp::EqualEqual
            } else if self.eat_if(TokenKind::BangEqual) {
                BinaryOp::BangEqual
            } else {
                break;
            };
            let right = self.parse_comparison()?;
            left = Node::Binary {
                left: Box::new(left),
                right: Box::new(right),
                op,
            };
        }

        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Node, ParseError> {
        let mut left = self.parse_term()?;

        loop {
            let op = if self.eat_if(TokenKind::Greater) {
                BinaryOp::Greater
            } else if self.eat_if(TokenKind::GreaterEqual) {
                BinaryOp::GreaterEqual
            } else if self.eat_if(TokenKind::Less) {
                BinaryOp::Less
            } else if self.eat_if(TokenKind::LessEqual) {
                BinaryOp::LessEqual
            } else {
                break;
            };
            let right = self.parse_term()?;
            left = Node::Binary {
                left: Box::new(left),
                right: Box::new(right),
                op,
            };
        }

        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Node, ParseError> {
        let mut left = self.parse_factor()?;

        loop {
            let op = if self.eat_if(TokenKind::Plus) {
                BinaryOp::Plus
            } else if self.eat_if(TokenKind::Minus) {
                BinaryOp::Minus
            } else {
                break;
            };
            let right = self.parse_factor()?;
            left = Node::Binary {
                left: Box::new(left),
                right: Box::new(right),
                op,
            };
        }

        Ok(left)
    }

    fn parse_factor(&mut self) -> Result<Node, ParseError> {
        let mut left = self.parse_get_and_call()?;

        loop {
            let op = if self.eat_if(TokenKind::Star) {
                BinaryOp::Star
            } else if self.eat_if(TokenKind::Slash) {
                BinaryOp::Slash
            } else {
                break;
            };
            let right = self.parse_get_and_call()?;
            left = Node::Binary {
                left: Box::new(left),
                right: Box::new(right),
                op,
            };
        }

        Ok(left)
    }

    /// The postfix chain: calls, fixed-name members (`.` and `->`), and
    /// computed indexing, applied left to right any number of times.
    fn parse_get_and_call(&mut self) -> Result<Node, ParseError> {
        let mut left = self.parse_primary()?;

        loop {
            if self.eat_if(TokenKind::LParen) {
                left = self.finish_call(left)?;
            } else if self.eat_if(TokenKind::Dot) {
                let name = self.expect_identifier("Expected property name after '.'")?;
                left = Node::TableGet {
                    value: Box::new(left),
                    name,
                };
            } else if self.eat_if(TokenKind::Arrow) {
                let name = self.expect_identifier("Expected function name after '->'")?;
                left = Node::TableGet {
                    value: Box::new(left),
                    name,
                };
            } else if self.eat_if(TokenKind::LBracket) {
                if self.eat_if(TokenKind::RBracket) {
                    return Err(self.error("Expected expression inside indexing"));
                }
                let key = self.parse_expression()?;
                self.expect(
                    TokenKind::RBracket,
                    "Expected ']' after indexing expression",
                )?;
                left = Node::TableGetExpr {
                    value: Box::new(left),
                    key: Box::new(key),
                };
            } else {
                break;
            }
        }

        Ok(left)
    }

    fn finish_call(&mut self, callee: Node) -> Result<Node, ParseError> {
        let mut args = Vec::new();

        if !self.check(&TokenKind::RParen) {
            loop {
                args.push(self.parse_expression()?);
                if !self.eat_if(TokenKind::Comma) {
                    break;
                }
            }
        }

        self.expect(TokenKind::RParen, "Expected ')' after function arguments")?;
        Ok(Node::Call {
            callee: Box::new(callee),
            args,
        })
    }

    fn parse_primary(&mut self) -> Result<Node, ParseError> {
        let token = self.eat();

        match token.kind {
            TokenKind::True => Ok(Node::Literal(Literal::Bool(true))),
            TokenKind::False => Ok(Node::Literal(Literal::Bool(false))),
            TokenKind::Nil => Ok(Node::Literal(Literal::Null)),
            TokenKind::Number(n) => Ok(Node::Literal(Literal::Number(n))),
            TokenKind::Str(s) => Ok(Node::Literal(Literal::Str(s))),
            TokenKind::Identifier(name) => {
                if self.eat_if(TokenKind::PlusPlus) {
                    return Ok(Node::IncDec {
                        name,
                        dec: false,
                        prefix: false,
                    });
                }
                if self.eat_if(TokenKind::MinusMinus) {
                    return Ok(Node::IncDec {
                        name,
                        dec: true,
                        prefix: false,
                    });
                }
                Ok(Node::Variable {
                    name,
                    global: false,
                })
            }
            TokenKind::Dollar => {
                let name = self.expect_identifier("Expected variable after '$'")?;
                Ok(Node::Variable { name, global: true })
            }
            TokenKind::PlusPlus => {
                let name = self.expect_identifier("Expected variable name after '++'")?;
                Ok(Node::IncDec {
                    name,
                    dec: false,
                    prefix: true,
                })
            }
            TokenKind::MinusMinus => {
                let name = self.expect_identifier("Expected variable name after '--'")?;
                Ok(Node::IncDec {
                    name,
                    dec: true,
                    prefix: true,
                })
            }
            TokenKind::LParen => {
                let expr = self.parse_expression()?;
                self.expect(TokenKind::RParen, "Expected ')' after expression.")?;
                Ok(expr)
            }
            TokenKind::LBrace => self.parse_table_pairs(),
            TokenKind::Func => {
                self.expect(TokenKind::LParen, "Expected '(' after function value keyword")?;
                let params = self.parse_param_list()?;
                if !self.eat_if(TokenKind::LBrace) {
                    return Err(self.error("Expected '{' after function declaration"));
                }
                let body = self.parse_block()?;
                Ok(Node::FuncLiteral {
                    params,
                    body: Rc::new(body),
                })
            }
            TokenKind::LBracket => self.parse_array(),
            TokenKind::Bang => Ok(Node::Not(Box::new(self.parse_expression()?))),
            TokenKind::Minus => Ok(Node::Negate(Box::new(self.parse_primary()?))),
            TokenKind::New => Ok(Node::Copy(Box::new(self.parse_primary()?))),
            _ => Err(ParseError {
                line: token.line,
                message: "Expected expression".to_string(),
            }),
        }
    }

    fn parse_table_pairs(&mut self) -> Result<Node, ParseError> {
        let mut pairs = Vec::new();

        if !self.check(&TokenKind::RBrace) {
            loop {
                let key = self.parse_expression()?;
                self.expect(TokenKind::Colon, "Expected ':' after table key")?;
                let value = self.parse_expression()?;
                pairs.push((key, value));
                if !self.eat_if(TokenKind::Comma) {
                    break;
                }
            }
        }

        self.expect(TokenKind::RBrace, "Expected '}' after table values")?;
        Ok(Node::TableLiteral(pairs))
    }

    fn parse_array(&mut self) -> Result<Node, ParseError> {
        let mut elements = Vec::new();

        if !self.check(&TokenKind::RBracket) {
            loop {
                elements.push(self.parse_expression()?);
                if !self.eat_if(TokenKind::Comma) {
                    break;
                }
            }
        }

        self.expect(TokenKind::RBracket, "Expected ']' after array values")?;
        Ok(Node::ArrayLiteral(elements))
    }
}

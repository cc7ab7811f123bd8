//! Recursive descent parser.
//!
//! Precedence, lowest to highest:
//!
//! | level | operators                  | associativity |
//! |-------|----------------------------|---------------|
//! | 1     | `\|\|` `or` `xor`          | left          |
//! | 2     | `&&` `and`                 | left          |
//! | 3     | `!` `not` (prefix)         | -             |
//! | 4     | `==` `!=` `>` `>=` `<` `<=`| none          |
//! | 5     | `\|`                       | left          |
//! | 6     | `^`                        | left          |
//! | 7     | `&`                        | left          |
//! | 8     | `<<` `>>`                  | left          |
//! | 9     | `+` `-`                    | left          |
//! | 10    | `*` `/` `%`                | left          |
//! | 11    | `**`                       | right         |
//! | 12    | `-` (prefix)               | -             |

use super::{
    BinaryOp, Expr, Literal, UnaryOp,
    lexer::{Token, TokenKind, tokenize},
};
use crate::error::ParseError;

pub(crate) fn parse(text: &str) -> Result<Expr, ParseError> {
    let tokens = tokenize(text)?;
    let mut parser = Parser { tokens, pos: 0 };

    if parser.peek() == &TokenKind::Eof {
        return Err(ParseError::new(0, "empty expression"));
    }
    if let Some(expr) = parser.shorthand()? {
        return Ok(expr);
    }

    let expr = parser.or_expr()?;
    parser.finish()?;
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos].kind
    }

    fn peek_at(&self, offset: usize) -> &TokenKind {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[idx].kind
    }

    fn position(&self) -> usize {
        self.tokens[self.pos].pos
    }

    fn advance(&mut self) -> TokenKind {
        let kind = self.tokens[self.pos].kind.clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        kind
    }

    fn unexpected(&self) -> ParseError {
        let message = match self.peek() {
            TokenKind::Eof => "unexpected end of expression".to_string(),
            TokenKind::RParen => "unbalanced parentheses: unexpected `)`".to_string(),
            other => format!("unexpected {}", other.describe()),
        };
        ParseError::new(self.position(), message)
    }

    /// Every token must have been consumed.
    fn finish(&self) -> Result<(), ParseError> {
        match self.peek() {
            TokenKind::Eof => Ok(()),
            TokenKind::Assign => Err(ParseError::new(
                self.position(),
                "`NAME=value,...` needs a bare identifier before `=` and must be the whole expression",
            )),
            TokenKind::RParen => Err(self.unexpected()),
            other => Err(ParseError::new(
                self.position(),
                format!("trailing {} after complete expression", other.describe()),
            )),
        }
    }

    /// `!NAME` and `NAME=v1,v2,...`
    fn shorthand(&mut self) -> Result<Option<Expr>, ParseError> {
        if self.peek() == &TokenKind::Not
            && self.peek_at(2) == &TokenKind::Eof
            && let Some(name) = self.ident_at(1)
        {
            self.pos += 2;
            return Ok(Some(Expr::Negation(name)));
        }

        if self.peek_at(1) == &TokenKind::Assign
            && let Some(name) = self.ident_at(0)
        {
            self.pos += 2;
            let mut values = vec![self.set_value()?];
            while self.peek() == &TokenKind::Comma {
                self.advance();
                values.push(self.set_value()?);
            }
            self.finish()?;
            return Ok(Some(Expr::SetMembership { name, values }));
        }

        Ok(None)
    }

    fn ident_at(&self, offset: usize) -> Option<String> {
        match self.peek_at(offset) {
            TokenKind::Ident(name) => Some(name.clone()),
            _ => None,
        }
    }

    fn set_value(&mut self) -> Result<Literal, ParseError> {
        let negative = if self.peek() == &TokenKind::Minus {
            self.advance();
            true
        } else {
            false
        };
        let literal = match (self.peek().clone(), negative) {
            (TokenKind::Int(i), _) => Literal::Int(if negative { -i } else { i }),
            (TokenKind::Float(f), _) => Literal::Float(if negative { -f } else { f }),
            (TokenKind::Str(s), false) => Literal::Str(s),
            (TokenKind::Ident(word), false) => Literal::Str(word),
            (TokenKind::True, false) => Literal::Bool(true),
            (TokenKind::False, false) => Literal::Bool(false),
            (TokenKind::Eof, _) | (TokenKind::Comma, _) => {
                return Err(ParseError::new(self.position(), "missing value in `NAME=` list"));
            }
            _ => return Err(self.unexpected()),
        };
        self.advance();
        Ok(literal)
    }

    fn or_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.and_expr()?;
        loop {
            let op = match self.peek() {
                TokenKind::Or => BinaryOp::Or,
                TokenKind::Xor => BinaryOp::Xor,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.and_expr()?;
            left = Expr::binary(op, left, right);
        }
    }

    fn and_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.not_expr()?;
        while self.peek() == &TokenKind::And {
            self.advance();
            let right = self.not_expr()?;
            left = Expr::binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    fn not_expr(&mut self) -> Result<Expr, ParseError> {
        if self.peek() == &TokenKind::Not {
            self.advance();
            let operand = self.not_expr()?;
            return Ok(Expr::unary(UnaryOp::Not, operand));
        }
        self.rel_expr()
    }

    fn rel_expr(&mut self) -> Result<Expr, ParseError> {
        let left = self.bitor_expr()?;
        let op = match self.peek() {
            TokenKind::EqEq => BinaryOp::Eq,
            TokenKind::Ne => BinaryOp::Ne,
            TokenKind::Gt => BinaryOp::Gt,
            TokenKind::Ge => BinaryOp::Ge,
            TokenKind::Lt => BinaryOp::Lt,
            TokenKind::Le => BinaryOp::Le,
            _ => return Ok(left),
        };
        self.advance();
        let right = self.bitor_expr()?;
        Ok(Expr::binary(op, left, right))
    }

    /// One left-associative level: `next (op next)*`.
    fn left_assoc(
        &mut self,
        next: fn(&mut Self) -> Result<Expr, ParseError>,
        op_for: fn(&TokenKind) -> Option<BinaryOp>,
    ) -> Result<Expr, ParseError> {
        let mut left = next(self)?;
        while let Some(op) = op_for(self.peek()) {
            self.advance();
            let right = next(self)?;
            left = Expr::binary(op, left, right);
        }
        Ok(left)
    }

    fn bitor_expr(&mut self) -> Result<Expr, ParseError> {
        self.left_assoc(Self::bitxor_expr, |t| {
            (t == &TokenKind::Pipe).then_some(BinaryOp::BitOr)
        })
    }

    fn bitxor_expr(&mut self) -> Result<Expr, ParseError> {
        self.left_assoc(Self::bitand_expr, |t| {
            (t == &TokenKind::Caret).then_some(BinaryOp::BitXor)
        })
    }

    fn bitand_expr(&mut self) -> Result<Expr, ParseError> {
        self.left_assoc(Self::shift_expr, |t| {
            (t == &TokenKind::Amp).then_some(BinaryOp::BitAnd)
        })
    }

    fn shift_expr(&mut self) -> Result<Expr, ParseError> {
        self.left_assoc(Self::add_expr, |t| match t {
            TokenKind::Shl => Some(BinaryOp::Shl),
            TokenKind::Shr => Some(BinaryOp::Shr),
            _ => None,
        })
    }

    fn add_expr(&mut self) -> Result<Expr, ParseError> {
        self.left_assoc(Self::mul_expr, |t| match t {
            TokenKind::Plus => Some(BinaryOp::Add),
            TokenKind::Minus => Some(BinaryOp::Sub),
            _ => None,
        })
    }

    fn mul_expr(&mut self) -> Result<Expr, ParseError> {
        self.left_assoc(Self::pow_expr, |t| match t {
            TokenKind::Star => Some(BinaryOp::Mul),
            TokenKind::Slash => Some(BinaryOp::Div),
            TokenKind::Percent => Some(BinaryOp::Rem),
            _ => None,
        })
    }

    fn pow_expr(&mut self) -> Result<Expr, ParseError> {
        let base = self.unary()?;
        if self.peek() == &TokenKind::StarStar {
            self.advance();
            let exponent = self.pow_expr()?;
            return Ok(Expr::binary(BinaryOp::Pow, base, exponent));
        }
        Ok(base)
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        if self.peek() == &TokenKind::Minus {
            self.advance();
            let operand = self.unary()?;
            return Ok(Expr::unary(UnaryOp::Neg, operand));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        let expr = match self.peek().clone() {
            TokenKind::Ident(name) => Expr::Var(name),
            TokenKind::Int(i) => Expr::Literal(Literal::Int(i)),
            TokenKind::Float(f) => Expr::Literal(Literal::Float(f)),
            TokenKind::Str(s) => Expr::Literal(Literal::Str(s)),
            TokenKind::True => Expr::Literal(Literal::Bool(true)),
            TokenKind::False => Expr::Literal(Literal::Bool(false)),
            TokenKind::LParen => {
                let open = self.position();
                self.advance();
                let inner = self.or_expr()?;
                if self.peek() != &TokenKind::RParen {
                    if self.peek() == &TokenKind::Eof {
                        return Err(ParseError::new(
                            open,
                            "unbalanced parentheses: missing `)`",
                        ));
                    }
                    return Err(self.unexpected());
                }
                inner
            }
            _ => return Err(self.unexpected()),
        };
        self.advance();
        Ok(expr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> Expr {
        Expr::Var(name.into())
    }

    fn int(i: i64) -> Expr {
        Expr::Literal(Literal::Int(i))
    }

    #[test]
    fn test_arithmetic_precedence() {
        assert_eq!(
            parse("1+2*3==7").unwrap(),
            Expr::binary(
                BinaryOp::Eq,
                Expr::binary(
                    BinaryOp::Add,
                    int(1),
                    Expr::binary(BinaryOp::Mul, int(2), int(3))
                ),
                int(7)
            )
        );
    }

    #[test]
    fn test_pow_is_right_associative() {
        assert_eq!(
            parse("2**3**2").unwrap(),
            Expr::binary(
                BinaryOp::Pow,
                int(2),
                Expr::binary(BinaryOp::Pow, int(3), int(2))
            )
        );
        assert_eq!(
            parse("8-2-1").unwrap(),
            Expr::binary(
                BinaryOp::Sub,
                Expr::binary(BinaryOp::Sub, int(8), int(2)),
                int(1)
            )
        );
    }

    #[test]
    fn test_bitwise_levels() {
        // `|` < `^` < `&` < shifts < additive
        assert_eq!(
            parse("1 | 2 ^ 3 & 4 << 5 + 6").unwrap(),
            Expr::binary(
                BinaryOp::BitOr,
                int(1),
                Expr::binary(
                    BinaryOp::BitXor,
                    int(2),
                    Expr::binary(
                        BinaryOp::BitAnd,
                        int(3),
                        Expr::binary(
                            BinaryOp::Shl,
                            int(4),
                            Expr::binary(BinaryOp::Add, int(5), int(6))
                        )
                    )
                )
            )
        );
    }

    #[test]
    fn test_not_binds_looser_than_relational() {
        assert_eq!(
            parse("!A == B").unwrap(),
            Expr::unary(
                UnaryOp::Not,
                Expr::binary(BinaryOp::Eq, var("A"), var("B"))
            )
        );
    }

    #[test]
    fn test_logical_levels() {
        // or/xor share the lowest level and are left-associative
        assert_eq!(
            parse("A || B && C xor D").unwrap(),
            Expr::binary(
                BinaryOp::Xor,
                Expr::binary(
                    BinaryOp::Or,
                    var("A"),
                    Expr::binary(BinaryOp::And, var("B"), var("C"))
                ),
                var("D")
            )
        );
        assert_eq!(
            parse("not A and B or C").unwrap(),
            parse("!A && B || C").unwrap()
        );
        assert_eq!(
            parse("!!!A").unwrap(),
            Expr::unary(
                UnaryOp::Not,
                Expr::unary(UnaryOp::Not, Expr::unary(UnaryOp::Not, var("A")))
            )
        );
    }

    #[test]
    fn test_unary_minus_binds_tightest() {
        assert_eq!(
            parse("-2**2").unwrap(),
            Expr::binary(
                BinaryOp::Pow,
                Expr::unary(UnaryOp::Neg, int(2)),
                int(2)
            )
        );
    }

    #[test]
    fn test_shorthand_forms() {
        assert_eq!(parse("!DEBUG").unwrap(), Expr::Negation("DEBUG".into()));
        assert_eq!(
            parse("ARCH=x86_64,aarch64").unwrap(),
            Expr::SetMembership {
                name: "ARCH".into(),
                values: vec![
                    Literal::Str("x86_64".into()),
                    Literal::Str("aarch64".into())
                ],
            }
        );
        assert_eq!(
            parse("LEVEL = 1, -2, 'three', true").unwrap(),
            Expr::SetMembership {
                name: "LEVEL".into(),
                values: vec![
                    Literal::Int(1),
                    Literal::Int(-2),
                    Literal::Str("three".into()),
                    Literal::Bool(true),
                ],
            }
        );
        // `!` over anything but a bare identifier uses the general grammar
        assert_eq!(
            parse("!(A)").unwrap(),
            Expr::unary(UnaryOp::Not, var("A"))
        );
    }

    #[test]
    fn test_parse_errors() {
        let cases = [
            ("", 0),
            ("(A && B", 0),
            ("A && B)", 6),
            ("A B", 2),
            ("A == B == C", 7),
            ("(A)=1", 3),
            ("A && B=1", 6),
            ("1=2", 1),
            ("A=", 2),
            ("A=1,", 4),
            ("A ==", 4),
            ("A == !B", 5),
        ];
        for (text, position) in cases {
            let err = parse(text).unwrap_err();
            assert_eq!(err.position, position, "{text:?}: {err}");
        }
        assert!(parse("(A").unwrap_err().message.contains("unbalanced"));
        assert!(parse("A)").unwrap_err().message.contains("unbalanced"));
        assert!(parse("(A)=1").unwrap_err().message.contains("bare identifier"));
    }
}

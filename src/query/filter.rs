//! Filter expression algebra
//!
//! Immutable expression trees rendered to `$filter` syntax. Boolean combinators
//! always parenthesize their operands, so the output never depends on the
//! server's operator precedence.
//!
//! ```
//! use sap_odata::F;
//!
//! let filter = F::eq("Status", "O") & F::gt("TotalPrice", 1000);
//! assert_eq!(filter.to_string(), "(Status eq 'O') and (TotalPrice gt 1000)");
//! ```

use super::literal::Literal;
use crate::metadata::ODataVersion;
use std::fmt;
use std::ops::{BitAnd, BitOr, Not};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CompareOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompareOp::Eq => "eq",
            CompareOp::Ne => "ne",
            CompareOp::Gt => "gt",
            CompareOp::Ge => "ge",
            CompareOp::Lt => "lt",
            CompareOp::Le => "le",
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Argument of a filter function call
#[derive(Debug, Clone, PartialEq)]
pub enum FunctionArg {
    Field(String),
    Literal(Literal),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    Comparison {
        field: String,
        op: CompareOp,
        value: Literal,
    },
    And(Box<FilterExpr>, Box<FilterExpr>),
    Or(Box<FilterExpr>, Box<FilterExpr>),
    Not(Box<FilterExpr>),
    Function {
        name: String,
        args: Vec<FunctionArg>,
    },
}

impl FilterExpr {
    #[must_use]
    pub fn and(self, other: FilterExpr) -> FilterExpr {
        FilterExpr::And(Box::new(self), Box::new(other))
    }

    #[must_use]
    pub fn or(self, other: FilterExpr) -> FilterExpr {
        FilterExpr::Or(Box::new(self), Box::new(other))
    }

    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> FilterExpr {
        !self
    }

    /// Render as `$filter` text for the given protocol version.
    ///
    /// Total over the algebra: every constructible tree renders.
    pub fn serialize(&self, version: ODataVersion) -> String {
        let mut out = String::new();
        self.write(&mut out, version);
        out
    }

    fn write(&self, out: &mut String, version: ODataVersion) {
        match self {
            FilterExpr::Comparison { field, op, value } => {
                out.push_str(field);
                out.push(' ');
                out.push_str(op.as_str());
                out.push(' ');
                out.push_str(&value.render(version));
            }
            FilterExpr::And(left, right) => Self::write_binary(out, left, "and", right, version),
            FilterExpr::Or(left, right) => Self::write_binary(out, left, "or", right, version),
            FilterExpr::Not(inner) => {
                out.push_str("not (");
                inner.write(out, version);
                out.push(')');
            }
            FilterExpr::Function { name, args } => {
                // V2 spells contains as substringof(value, field)
                let (name, args): (&str, Vec<&FunctionArg>) =
                    if version == ODataVersion::V2 && name == "contains" {
                        ("substringof", args.iter().rev().collect())
                    } else {
                        (name.as_str(), args.iter().collect())
                    };
                out.push_str(name);
                out.push('(');
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    match arg {
                        FunctionArg::Field(field) => out.push_str(field),
                        FunctionArg::Literal(value) => out.push_str(&value.render(version)),
                    }
                }
                out.push(')');
            }
        }
    }

    fn write_binary(
        out: &mut String,
        left: &FilterExpr,
        keyword: &str,
        right: &FilterExpr,
        version: ODataVersion,
    ) {
        out.push('(');
        left.write(out, version);
        out.push_str(") ");
        out.push_str(keyword);
        out.push_str(" (");
        right.write(out, version);
        out.push(')');
    }
}

impl fmt::Display for FilterExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize(ODataVersion::V4))
    }
}

impl BitAnd for FilterExpr {
    type Output = FilterExpr;

    fn bitand(self, rhs: FilterExpr) -> FilterExpr {
        self.and(rhs)
    }
}

impl BitOr for FilterExpr {
    type Output = FilterExpr;

    fn bitor(self, rhs: FilterExpr) -> FilterExpr {
        self.or(rhs)
    }
}

impl Not for FilterExpr {
    type Output = FilterExpr;

    fn not(self) -> FilterExpr {
        FilterExpr::Not(Box::new(self))
    }
}

/// Filter factory.
///
/// Values go through [`Literal`], so comparing a field against another
/// expression does not compile.
pub struct F;

impl F {
    fn compare(field: impl Into<String>, op: CompareOp, value: impl Into<Literal>) -> FilterExpr {
        FilterExpr::Comparison {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Literal>) -> FilterExpr {
        Self::compare(field, CompareOp::Eq, value)
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Literal>) -> FilterExpr {
        Self::compare(field, CompareOp::Ne, value)
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Literal>) -> FilterExpr {
        Self::compare(field, CompareOp::Gt, value)
    }

    pub fn ge(field: impl Into<String>, value: impl Into<Literal>) -> FilterExpr {
        Self::compare(field, CompareOp::Ge, value)
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Literal>) -> FilterExpr {
        Self::compare(field, CompareOp::Lt, value)
    }

    pub fn le(field: impl Into<String>, value: impl Into<Literal>) -> FilterExpr {
        Self::compare(field, CompareOp::Le, value)
    }

    pub fn is_null(field: impl Into<String>) -> FilterExpr {
        Self::compare(field, CompareOp::Eq, Literal::Null)
    }

    pub fn not_null(field: impl Into<String>) -> FilterExpr {
        Self::compare(field, CompareOp::Ne, Literal::Null)
    }

    fn string_function(name: &str, field: impl Into<String>, value: &str) -> FilterExpr {
        FilterExpr::Function {
            name: name.to_string(),
            args: vec![
                FunctionArg::Field(field.into()),
                FunctionArg::Literal(Literal::String(value.to_string())),
            ],
        }
    }

    /// `contains(Field,'value')`; `substringof('value',Field)` on V2
    pub fn contains(field: impl Into<String>, value: &str) -> FilterExpr {
        Self::string_function("contains", field, value)
    }

    pub fn startswith(field: impl Into<String>, value: &str) -> FilterExpr {
        Self::string_function("startswith", field, value)
    }

    pub fn endswith(field: impl Into<String>, value: &str) -> FilterExpr {
        Self::string_function("endswith", field, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_and_of_comparisons() {
        let expr = F::eq("Status", "O") & F::gt("TotalPrice", 1000);
        assert_eq!(expr.to_string(), "(Status eq 'O') and (TotalPrice gt 1000)");
    }

    #[test]
    fn test_nesting_is_always_parenthesized() {
        let expr = (F::eq("A", 1) | F::eq("B", 2)) & !F::eq("C", "x");
        assert_eq!(
            expr.to_string(),
            "((A eq 1) or (B eq 2)) and (not (C eq 'x'))"
        );

        let left = F::eq("A", 1).and(F::eq("B", 2)).and(F::eq("C", 3));
        assert_eq!(left.to_string(), "((A eq 1) and (B eq 2)) and (C eq 3)");
        let right = F::eq("A", 1).and(F::eq("B", 2).and(F::eq("C", 3)));
        assert_eq!(right.to_string(), "(A eq 1) and ((B eq 2) and (C eq 3))");
    }

    #[test]
    fn test_combinators_do_not_mutate_operands() {
        let base = F::eq("A", 1);
        let combined = base.clone().or(F::eq("B", 2));
        assert_eq!(base.to_string(), "A eq 1");
        assert_ne!(base, combined);
    }

    #[test]
    fn test_string_functions_per_version() {
        let expr = F::contains("Name", "O'Neil");
        assert_eq!(expr.serialize(ODataVersion::V4), "contains(Name,'O''Neil')");
        assert_eq!(expr.serialize(ODataVersion::V2), "substringof('O''Neil',Name)");
        assert_eq!(
            F::startswith("Name", "Sm").serialize(ODataVersion::V2),
            "startswith(Name,'Sm')"
        );
        assert_eq!(F::endswith("Name", "th").to_string(), "endswith(Name,'th')");
    }

    #[test]
    fn test_null_checks() {
        assert_eq!(F::is_null("Memo").to_string(), "Memo eq null");
        assert_eq!(F::not_null("Memo").to_string(), "Memo ne null");
    }

    #[test]
    fn test_typed_literals_in_v2() {
        let expr = F::ge("BeginDate", Literal::datetime("2024-01-01T00:00:00"))
            & F::eq("TravelUUID", Literal::guid("00000000-0000-0000-0000-000000000001"));
        assert_eq!(
            expr.serialize(ODataVersion::V2),
            "(BeginDate ge datetime'2024-01-01T00:00:00') and \
             (TravelUUID eq guid'00000000-0000-0000-0000-000000000001')"
        );
    }

    // Minimal reader for the fully parenthesized output, used to check that
    // serialization preserves the tree shape.
    mod reparse {
        use super::super::*;

        pub fn parse(input: &str) -> FilterExpr {
            let mut p = Reader { s: input, pos: 0 };
            let expr = p.expr();
            assert_eq!(p.pos, input.len(), "trailing input in {input}");
            expr
        }

        struct Reader<'a> {
            s: &'a str,
            pos: usize,
        }

        impl Reader<'_> {
            fn rest(&self) -> &str {
                &self.s[self.pos..]
            }

            fn eat(&mut self, token: &str) -> bool {
                if self.rest().starts_with(token) {
                    self.pos += token.len();
                    true
                } else {
                    false
                }
            }

            fn word(&mut self) -> String {
                let len = self
                    .rest()
                    .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '.' || c == '-'))
                    .unwrap_or(self.rest().len());
                let word = self.rest()[..len].to_string();
                self.pos += len;
                word
            }

            fn group(&mut self) -> FilterExpr {
                assert!(self.eat("("));
                let inner = self.expr();
                assert!(self.eat(")"));
                inner
            }

            fn expr(&mut self) -> FilterExpr {
                if self.eat("not ") {
                    return !self.group();
                }
                if self.rest().starts_with('(') {
                    let left = self.group();
                    if self.eat(" and ") {
                        return left.and(self.group());
                    }
                    assert!(self.eat(" or "));
                    return left.or(self.group());
                }
                let head = self.word();
                if self.eat("(") {
                    let mut args = Vec::new();
                    loop {
                        args.push(if self.rest().starts_with('\'') {
                            FunctionArg::Literal(self.literal())
                        } else {
                            FunctionArg::Field(self.word())
                        });
                        if self.eat(")") {
                            break;
                        }
                        assert!(self.eat(","));
                    }
                    return FilterExpr::Function { name: head, args };
                }
                assert!(self.eat(" "));
                let op = match self.word().as_str() {
                    "eq" => CompareOp::Eq,
                    "ne" => CompareOp::Ne,
                    "gt" => CompareOp::Gt,
                    "ge" => CompareOp::Ge,
                    "lt" => CompareOp::Lt,
                    "le" => CompareOp::Le,
                    other => panic!("unknown operator {other}"),
                };
                assert!(self.eat(" "));
                FilterExpr::Comparison {
                    field: head,
                    op,
                    value: self.literal(),
                }
            }

            fn literal(&mut self) -> Literal {
                if self.eat("'") {
                    let mut value = String::new();
                    loop {
                        let c = self.rest().chars().next().expect("unterminated string");
                        self.pos += c.len_utf8();
                        if c == '\'' {
                            if self.eat("'") {
                                value.push('\'');
                            } else {
                                return Literal::String(value);
                            }
                        } else {
                            value.push(c);
                        }
                    }
                }
                match self.word().as_str() {
                    "null" => Literal::Null,
                    "true" => Literal::Bool(true),
                    "false" => Literal::Bool(false),
                    n if n.contains('.') => Literal::Decimal(n.parse().unwrap()),
                    n => Literal::Int(n.parse().unwrap()),
                }
            }
        }
    }

    #[test]
    fn test_serialization_round_trips_tree_shape() {
        let trees = vec![
            F::eq("Status", "O") & F::gt("TotalPrice", 1000),
            F::eq("A", 1).or(F::eq("B", "it's")).and(F::ne("C", true)),
            !(F::lt("Price", 2.5) | !F::is_null("Memo")),
            F::eq("A", 1).and(F::eq("B", 2).or(F::eq("C", 3).and(F::le("D", -4)))),
            F::contains("Name", "x)y") & F::startswith("Code", "(a"),
        ];
        for tree in trees {
            let text = tree.to_string();
            assert_eq!(reparse::parse(&text), tree, "{text}");
        }
    }
}

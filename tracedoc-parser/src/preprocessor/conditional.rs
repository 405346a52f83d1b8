use crate::model::AttributeCatalog;

/// A parsed conditional directive line.
#[derive(Debug)]
pub(crate) enum Conditional {
    Ifdef(Ifdef),
    Ifndef(Ifndef),
    Ifeval(Ifeval),
}

/// How multiple attribute names in one directive combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// `,` — any name set.
    Or,
    /// `+` — every name set.
    And,
}

#[derive(Debug)]
pub(crate) struct Ifdef {
    attributes: Vec<String>,
    operation: Option<Operation>,
    content: Option<String>,
}

#[derive(Debug)]
pub(crate) struct Ifndef {
    attributes: Vec<String>,
    operation: Option<Operation>,
    content: Option<String>,
}

#[derive(Debug)]
pub(crate) struct Ifeval {
    left: String,
    operator: Operator,
    right: String,
}

#[derive(Debug, Clone, PartialEq, PartialOrd)]
enum EvalValue {
    String(String),
    Number(f64),
    Boolean(bool),
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Operator {
    Equal,
    NotEqual,
    LessThan,
    GreaterThan,
    LessThanOrEqual,
    GreaterThanOrEqual,
}

#[derive(Debug)]
pub(crate) struct Endif {
    pub(crate) attribute: Option<String>,
}

peg::parser! {
    grammar conditional_parser() for str {
        pub(crate) rule conditional() -> Conditional
            = ifdef() / ifndef() / ifeval()

        pub(crate) rule endif() -> Endif
            = "endif::" attribute:name()? "[]" {
                Endif { attribute }
            }

        rule ifdef() -> Conditional
            = "ifdef::" a:attributes() "[" content:content()? "]" {
                Conditional::Ifdef(Ifdef {
                    attributes: a.0,
                    operation: a.1,
                    content,
                })
            }

        rule ifndef() -> Conditional
            = "ifndef::" a:attributes() "[" content:content()? "]" {
                Conditional::Ifndef(Ifndef {
                    attributes: a.0,
                    operation: a.1,
                    content,
                })
            }

        rule ifeval() -> Conditional
            = "ifeval::[" left:eval_value() operator:operator() right:eval_value() "]" {
                Conditional::Ifeval(Ifeval {
                    left,
                    operator,
                    right,
                })
            }

        rule attributes() -> (Vec<String>, Option<Operation>)
            = n1:name() op:operation() rest:(name() ++ operation()) {
                let mut names = vec![n1];
                names.extend(rest);
                (names, Some(op))
            }
            / n1:name() { (vec![n1], None) }

        rule operation() -> Operation
            = "+" { Operation::And }
            / "," { Operation::Or }

        rule eval_value() -> String
            = v:$((!operator() ![']'] [_])+) {
                v.trim().to_string()
            }

        rule operator() -> Operator
            = "==" { Operator::Equal }
            / "!=" { Operator::NotEqual }
            / "<=" { Operator::LessThanOrEqual }
            / ">=" { Operator::GreaterThanOrEqual }
            / "<" { Operator::LessThan }
            / ">" { Operator::GreaterThan }

        rule name() -> String
            = n:$((!['[' | ',' | '+'] [_])+) {
                n.to_string()
            }

        rule content() -> String
            = c:$((!"]" [_])+) {
                c.to_string()
            }
    }
}

/// Evaluate a conditional's name operands against the catalog: the first
/// name, optionally combined with further names under `,` (any set) or `+`
/// (all set). "Set" means present with a non-null value.
#[must_use]
pub fn evaluate_if(
    catalog: &AttributeCatalog,
    first: &str,
    rest: Option<(Operation, &[String])>,
) -> bool {
    match rest {
        None => catalog.is_set(first),
        Some((operation, names)) => {
            let mut all = std::iter::once(first).chain(names.iter().map(String::as_str));
            match operation {
                Operation::Or => all.any(|name| catalog.is_set(name)),
                Operation::And => all.all(|name| catalog.is_set(name)),
            }
        }
    }
}

impl Conditional {
    /// The directive's branch verdict.
    pub(crate) fn is_true(&self, catalog: &AttributeCatalog) -> bool {
        match self {
            Conditional::Ifdef(ifdef) => Self::names_verdict(
                &ifdef.attributes,
                ifdef.operation,
                catalog,
                false,
            ),
            Conditional::Ifndef(ifndef) => Self::names_verdict(
                &ifndef.attributes,
                ifndef.operation,
                catalog,
                true,
            ),
            Conditional::Ifeval(ifeval) => ifeval.evaluate(catalog),
        }
    }

    fn names_verdict(
        attributes: &[String],
        operation: Option<Operation>,
        catalog: &AttributeCatalog,
        negate: bool,
    ) -> bool {
        let Some((first, rest)) = attributes.split_first() else {
            tracing::warn!("conditional directive without attribute names");
            return negate;
        };
        let result = evaluate_if(catalog, first, operation.map(|op| (op, rest)));
        if negate { !result } else { result }
    }

    /// The single-line payload, for `ifdef::name[payload]` forms.
    pub(crate) fn payload(&self) -> Option<&str> {
        match self {
            Conditional::Ifdef(ifdef) => ifdef.content.as_deref(),
            Conditional::Ifndef(ifndef) => ifndef.content.as_deref(),
            Conditional::Ifeval(_) => None,
        }
    }

    /// Whether this directive opens a multi-line enclosure.
    pub(crate) fn is_enclosure(&self) -> bool {
        self.payload().is_none_or(str::is_empty)
    }

    pub(crate) fn names(&self) -> &[String] {
        match self {
            Conditional::Ifdef(ifdef) => &ifdef.attributes,
            Conditional::Ifndef(ifndef) => &ifndef.attributes,
            Conditional::Ifeval(_) => &[],
        }
    }
}

impl Endif {
    /// Whether this endif names the same attribute its opener did. A
    /// mismatch is recovered (the enclosure still closes), but worth
    /// flagging to the author.
    pub(crate) fn matches(&self, opening_names: &[String]) -> bool {
        match &self.attribute {
            Some(attribute) => opening_names.contains(attribute),
            None => true,
        }
    }
}

impl Ifeval {
    fn evaluate(&self, catalog: &AttributeCatalog) -> bool {
        let left = EvalValue::coerce(&self.left, catalog);
        let right = EvalValue::coerce(&self.right, catalog);

        match (&left, &right) {
            (EvalValue::Number(_), EvalValue::Number(_))
            | (EvalValue::Boolean(_), EvalValue::Boolean(_))
            | (EvalValue::String(_), EvalValue::String(_)) => {}
            (
                EvalValue::String(_) | EvalValue::Number(_) | EvalValue::Boolean(_),
                EvalValue::String(_) | EvalValue::Number(_) | EvalValue::Boolean(_),
            ) => {
                tracing::warn!(
                    ?left,
                    ?right,
                    "ifeval compares values of different types; treating as false"
                );
                return false;
            }
        }

        match self.operator {
            Operator::Equal => left == right,
            Operator::NotEqual => left != right,
            Operator::LessThan => left < right,
            Operator::GreaterThan => left > right,
            Operator::LessThanOrEqual => left <= right,
            Operator::GreaterThanOrEqual => left >= right,
        }
    }
}

impl EvalValue {
    /// Resolve attribute references in the operand, then read it as a bool,
    /// a number, or an arithmetic expression; anything else compares as a
    /// string.
    fn coerce(operand: &str, catalog: &AttributeCatalog) -> Self {
        let s = catalog.substitute(operand);
        s.parse::<bool>()
            .map(EvalValue::Boolean)
            .or_else(|_| s.parse::<f64>().map(EvalValue::Number))
            .or_else(|_| evalexpr::eval_float(&s).map(EvalValue::Number))
            .or_else(|_| {
                evalexpr::eval_int(&s).map(|v| {
                    #[allow(clippy::cast_precision_loss)]
                    let value = v as f64;
                    EvalValue::Number(value)
                })
            })
            .unwrap_or_else(|_| EvalValue::String(Self::strip_quotes(&s)))
    }

    fn strip_quotes(s: &str) -> String {
        if s.len() >= 2 && s.starts_with('\'') && s.ends_with('\'') {
            s[1..s.len() - 1].to_string()
        } else {
            s.to_string()
        }
    }
}

/// Parse a conditional directive line (`ifdef::`, `ifndef::`, `ifeval::`).
pub(crate) fn parse_line(line: &str) -> Option<Conditional> {
    match conditional_parser::conditional(line) {
        Ok(conditional) => Some(conditional),
        Err(error) => {
            tracing::warn!(?error, line, "failed to parse conditional directive");
            None
        }
    }
}

/// Parse an `endif::[]` line.
pub(crate) fn parse_endif(line: &str) -> Option<Endif> {
    match conditional_parser::endif(line) {
        Ok(endif) => Some(endif),
        Err(error) => {
            tracing::warn!(?error, line, "failed to parse endif directive");
            None
        }
    }
}

//! Reader for policy programs and query goals.
//!
//! The syntax is the usual clause notation:
//!
//! ```text
//! % line comment
//! rule(deny_hadoop).
//! has_target(deny_hadoop, hadoop).
//! allowed(S) :- rule(R), has_target(R, S), \+ blocked(S).
//! ```
//!
//! Besides plain terms the reader knows the operators the solver
//! implements: `;` and `,` (conjunction), prefix `\+`, and the comparison
//! operators `= \= == \== < > =< >= =:= =\=`. Lists use `[a, b | T]`.

use indexmap::IndexMap;
use nom::{
    branch::alt,
    bytes::complete::{is_not, tag, take_until, take_while},
    character::complete::{anychar, char, digit1, multispace1, one_of, satisfy},
    combinator::{cut, map, opt, recognize, value},
    error::{context, VerboseError, VerboseErrorKind},
    multi::{many0_count, separated_list1},
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};
use std::fmt;

use crate::solve::Goal;
use crate::store::Clause;
use crate::term::{Number, Term, VarId, CONS, NIL};

type PResult<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

/// A syntax error with its location in the source text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// 1-based line of the error
    pub line: usize,
    /// 1-based character column of the error
    pub column: usize,
    /// Text of the clause (or goal) being read
    pub clause: String,
    /// What went wrong
    pub message: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "line {}, column {}: {} in `{}`",
            self.line, self.column, self.message, self.clause
        )
    }
}

impl std::error::Error for ParseError {}

impl ParseError {
    fn at(source: &str, clause_start: usize, offset: usize, message: impl Into<String>) -> Self {
        let before = &source[..offset];
        let line = before.matches('\n').count() + 1;
        let line_start = before.rfind('\n').map_or(0, |i| i + 1);
        Self {
            line,
            column: source[line_start..offset].chars().count() + 1,
            clause: clause_text(&source[clause_start..]),
            message: message.into(),
        }
    }

    fn from_nom(source: &str, clause_start: usize, err: &VerboseError<&str>) -> Self {
        let offset = err
            .errors
            .first()
            .map_or(clause_start, |(rest, _)| source.len() - rest.len());
        let expected = err
            .errors
            .iter()
            .find_map(|(_, kind)| match kind {
                VerboseErrorKind::Context(what) => Some((*what).to_string()),
                _ => None,
            })
            .or_else(|| {
                err.errors.iter().find_map(|(_, kind)| match kind {
                    VerboseErrorKind::Char(c) => Some(format!("'{c}'")),
                    _ => None,
                })
            })
            .unwrap_or_else(|| "a term".to_string());
        let message = if offset >= source.len() {
            format!("unexpected end of input, expected {expected}")
        } else {
            format!("expected {expected}")
        };
        Self::at(source, clause_start, offset, message)
    }
}

/// The clause starting at `text`, up to its terminating `.`
fn clause_text(text: &str) -> String {
    let bytes = text.as_bytes();
    let end = text
        .char_indices()
        .find(|&(i, c)| {
            c == '.' && bytes.get(i + 1).map_or(true, |next| next.is_ascii_whitespace())
        })
        .map_or(text.len(), |(i, _)| i + 1);
    text[..end].trim().to_string()
}

/// Parsed term before variables are numbered
#[derive(Debug, Clone)]
enum Ast {
    Atom(String),
    Number(Number),
    Var(String),
    Compound(String, Vec<Ast>),
}

fn ws(input: &str) -> PResult<'_, ()> {
    value(
        (),
        many0_count(alt((
            value((), multispace1),
            value((), pair(char('%'), opt(is_not("\n")))),
            value((), tuple((tag("/*"), take_until("*/"), tag("*/")))),
        ))),
    )(input)
}

fn sym<'a>(token: &'static str) -> impl FnMut(&'a str) -> PResult<'a, &'a str> {
    preceded(ws, tag(token))
}

fn ident_tail(input: &str) -> PResult<'_, &str> {
    take_while(|c: char| c.is_ascii_alphanumeric() || c == '_')(input)
}

fn variable(input: &str) -> PResult<'_, Ast> {
    map(
        recognize(pair(
            satisfy(|c| c.is_ascii_uppercase() || c == '_'),
            ident_tail,
        )),
        |name: &str| Ast::Var(name.to_string()),
    )(input)
}

fn name(input: &str) -> PResult<'_, String> {
    map(
        recognize(pair(satisfy(|c| c.is_ascii_lowercase()), ident_tail)),
        String::from,
    )(input)
}

/// `'quoted atom'` or `"string"`, with `\` escapes and doubled quotes
fn quoted(quote: char, input: &str) -> PResult<'_, String> {
    let (mut rest, _) = char(quote)(input)?;
    let mut text = String::new();
    loop {
        let (after, c) = context("a closing quote", cut(anychar))(rest)?;
        if c == quote {
            if let Some(doubled) = after.strip_prefix(quote) {
                text.push(quote);
                rest = doubled;
                continue;
            }
            return Ok((after, text));
        }
        if c == '\\' {
            let (after, escaped) = context("an escape sequence", cut(anychar))(after)?;
            text.push(match escaped {
                'n' => '\n',
                't' => '\t',
                other => other,
            });
            rest = after;
        } else {
            text.push(c);
            rest = after;
        }
    }
}

fn single_quoted(input: &str) -> PResult<'_, String> {
    quoted('\'', input)
}

fn double_quoted(input: &str) -> PResult<'_, String> {
    quoted('"', input)
}

fn number(input: &str) -> PResult<'_, Ast> {
    let (rest, text) = recognize(tuple((
        opt(char('-')),
        digit1,
        opt(pair(char('.'), digit1)),
        opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
    )))(input)?;
    let parsed = if text.contains(['.', 'e', 'E']) {
        text.parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(Number::Float)
    } else {
        text.parse::<i64>().ok().map(Number::Int)
    };
    match parsed {
        Some(n) => Ok((rest, Ast::Number(n))),
        None => Err(nom::Err::Failure(VerboseError {
            errors: vec![(input, VerboseErrorKind::Context("a number in range"))],
        })),
    }
}

fn list(input: &str) -> PResult<'_, Ast> {
    let (input, _) = char('[')(input)?;
    if let Ok((rest, _)) = sym("]")(input) {
        return Ok((rest, Ast::Atom(NIL.to_string())));
    }
    let (input, items) = separated_list1(sym(","), argument)(input)?;
    let (input, tail) = opt(preceded(sym("|"), cut(argument)))(input)?;
    let (input, _) = context("a closing bracket", cut(sym("]")))(input)?;
    let list = items
        .into_iter()
        .rev()
        .fold(tail.unwrap_or_else(|| Ast::Atom(NIL.to_string())), |acc, item| {
            Ast::Compound(CONS.to_string(), vec![item, acc])
        });
    Ok((input, list))
}

fn atom_or_compound(input: &str) -> PResult<'_, Ast> {
    let (input, functor) = alt((name, single_quoted, double_quoted))(input)?;
    let (input, args) = opt(preceded(
        char('('),
        cut(terminated(
            separated_list1(sym(","), argument),
            context("a closing parenthesis", sym(")")),
        )),
    ))(input)?;
    Ok((
        input,
        match args {
            Some(args) => Ast::Compound(functor, args),
            None => Ast::Atom(functor),
        },
    ))
}

fn primary(input: &str) -> PResult<'_, Ast> {
    preceded(
        ws,
        alt((
            number,
            variable,
            list,
            delimited(
                char('('),
                expr1100,
                context("a closing parenthesis", cut(sym(")"))),
            ),
            map(char('!'), |_| Ast::Atom("!".to_string())),
            atom_or_compound,
        )),
    )(input)
}

fn comparison_op(input: &str) -> PResult<'_, &str> {
    alt((
        tag("=:="),
        tag("=\\="),
        tag("\\=="),
        tag("=<"),
        tag(">="),
        tag("=="),
        tag("\\="),
        tag("="),
        tag("<"),
        tag(">"),
    ))(input)
}

fn expr700(input: &str) -> PResult<'_, Ast> {
    let (input, left) = primary(input)?;
    let (input, op) = opt(preceded(ws, comparison_op))(input)?;
    match op {
        None => Ok((input, left)),
        Some(op) => {
            let (input, right) = context("a right operand", cut(primary))(input)?;
            Ok((input, Ast::Compound(op.to_string(), vec![left, right])))
        }
    }
}

fn expr900(input: &str) -> PResult<'_, Ast> {
    if let Ok((rest, _)) = sym("\\+")(input) {
        let (rest, goal) = context("a negated goal", cut(expr900))(rest)?;
        return Ok((rest, Ast::Compound("\\+".to_string(), vec![goal])));
    }
    expr700(input)
}

/// Compound arguments and list items: anything below `,`
fn argument(input: &str) -> PResult<'_, Ast> {
    expr900(input)
}

fn expr1000(input: &str) -> PResult<'_, Ast> {
    let (input, left) = expr900(input)?;
    let (input, right) = opt(preceded(sym(","), cut(expr1000)))(input)?;
    Ok((
        input,
        match right {
            Some(right) => Ast::Compound(",".to_string(), vec![left, right]),
            None => left,
        },
    ))
}

fn expr1100(input: &str) -> PResult<'_, Ast> {
    let (input, left) = expr1000(input)?;
    let (input, right) = opt(preceded(sym(";"), cut(expr1100)))(input)?;
    Ok((
        input,
        match right {
            Some(right) => Ast::Compound(";".to_string(), vec![left, right]),
            None => left,
        },
    ))
}

fn clause(input: &str) -> PResult<'_, (Ast, Option<Ast>)> {
    let (input, head) = expr900(input)?;
    let (input, body) = opt(preceded(sym(":-"), cut(expr1100)))(input)?;
    let (input, _) = context("a clause terminator '.'", cut(sym(".")))(input)?;
    Ok((input, (head, body)))
}

/// Numbers the variables of one clause or goal. Named variables share an
/// id within the scope, every `_` is distinct.
#[derive(Debug, Default)]
struct Scope {
    named: IndexMap<String, VarId>,
    next: VarId,
}

impl Scope {
    fn term(&mut self, ast: Ast) -> Term {
        match ast {
            Ast::Atom(name) => Term::atom(name),
            Ast::Number(n) => Term::Number(n),
            Ast::Var(name) if name == "_" => {
                let id = self.next;
                self.next += 1;
                Term::named_var(id, name)
            }
            Ast::Var(name) => {
                let next = &mut self.next;
                let id = *self.named.entry(name.clone()).or_insert_with(|| {
                    let id = *next;
                    *next += 1;
                    id
                });
                Term::named_var(id, name)
            }
            Ast::Compound(functor, args) => Term::compound(
                functor,
                args.into_iter().map(|arg| self.term(arg)).collect(),
            ),
        }
    }

    /// Converts a body expression, splitting top-level conjunctions
    fn conjunction(&mut self, ast: Ast, out: &mut Vec<Term>) {
        match ast {
            Ast::Compound(functor, args) if functor == "," && args.len() == 2 => {
                for arg in args {
                    self.conjunction(arg, out);
                }
            }
            other => out.push(self.term(other)),
        }
    }
}

fn check_goals(goals: &[Term]) -> Result<(), &'static str> {
    if goals.iter().any(|goal| matches!(goal, Term::Number(_))) {
        Err("a number is not a callable goal")
    } else {
        Ok(())
    }
}

fn build_clause(head: Ast, body: Option<Ast>) -> Result<Clause, &'static str> {
    let mut scope = Scope::default();
    let head = scope.term(head);
    if !head.is_callable() {
        return Err("clause head must be an atom or compound term");
    }
    let mut goals = Vec::new();
    if let Some(body) = body {
        scope.conjunction(body, &mut goals);
    }
    check_goals(&goals)?;
    Ok(Clause::new(head, goals, scope.next))
}

/// Reads a policy program: a sequence of clauses, each ending with `.`
///
/// # Errors
///
/// Returns the location and text of the first malformed clause.
pub fn parse_program(source: &str) -> Result<Vec<Clause>, ParseError> {
    let mut clauses = Vec::new();
    let mut rest = source;
    loop {
        let (start_of_clause, ()) = ws(rest).unwrap_or((rest, ()));
        if start_of_clause.is_empty() {
            return Ok(clauses);
        }
        let start = source.len() - start_of_clause.len();
        match clause(start_of_clause) {
            Ok((after, (head, body))) => {
                let clause =
                    build_clause(head, body).map_err(|msg| ParseError::at(source, start, start, msg))?;
                clauses.push(clause);
                rest = after;
            }
            Err(nom::Err::Error(e) | nom::Err::Failure(e)) => {
                return Err(ParseError::from_nom(source, start, &e));
            }
            Err(nom::Err::Incomplete(_)) => {
                return Err(ParseError::at(source, start, source.len(), "incomplete input"));
            }
        }
    }
}

/// Reads a query goal such as `rule(X), has_target(X, S).` The final `.`
/// is optional.
///
/// # Errors
///
/// Returns a [`ParseError`] when the text is not a well-formed goal.
pub fn parse_goal(source: &str) -> Result<Goal, ParseError> {
    let (body_start, ()) = ws(source).unwrap_or((source, ()));
    let start = source.len() - body_start.len();
    if body_start.is_empty() {
        return Err(ParseError::at(source, start, start, "empty goal"));
    }
    let (rest, ast) = match terminated(expr1100, opt(sym(".")))(body_start) {
        Ok(parsed) => parsed,
        Err(nom::Err::Error(e) | nom::Err::Failure(e)) => {
            return Err(ParseError::from_nom(source, start, &e));
        }
        Err(nom::Err::Incomplete(_)) => {
            return Err(ParseError::at(source, start, source.len(), "incomplete input"));
        }
    };
    let (rest, ()) = ws(rest).unwrap_or((rest, ()));
    if !rest.is_empty() {
        let offset = source.len() - rest.len();
        return Err(ParseError::at(source, start, offset, "unexpected text after goal"));
    }

    let mut scope = Scope::default();
    let mut goals = Vec::new();
    scope.conjunction(ast, &mut goals);
    check_goals(&goals).map_err(|msg| ParseError::at(source, start, start, msg))?;
    Ok(Goal::from_dense(goals, scope.next))
}

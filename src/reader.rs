//! Source text to [`Value`] trees.
//!
//! Reading happens in two passes. A nom tokenizer splits the input into tokens, skipping
//! whitespace, commas and `;` line comments. A recursive-descent reader then walks the
//! token stream, building lists, vectors and maps, expanding the reader macros
//! (`'x`, `` `x ``, `~x`, `~@x`, `@x`) and classifying atoms.
//!
//! Only the first complete form is read; anything after it is ignored.

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_till, take_while, take_while1},
    character::complete::{char, digit1, one_of, satisfy},
    combinator::{all_consuming, opt, recognize, value},
    multi::many0,
    sequence::pair,
};

use crate::ast::{Keyword, NumberType, Symbol, Value, sym};
use crate::{Error, MAX_PARSE_DEPTH, ReadError, ReadErrorKind};

/// Characters that form a token on their own
const SINGLE_CHAR_TOKENS: &str = "[]{}()'`~^@";

/// Characters that end a bare token
const DELIMITERS: &str = "[]{}()'\"`,;";

#[derive(Debug, Clone, Copy, PartialEq)]
struct Token<'a> {
    text: &'a str,
    /// Byte offset of the token in the source
    offset: usize,
}

/// Whitespace, commas and line comments
fn skip_ignored(input: &str) -> IResult<&str, ()> {
    value(
        (),
        many0(alt((
            value((), take_while1(|c: char| c.is_whitespace() || c == ',')),
            value((), pair(char(';'), take_till(|c: char| c == '\n'))),
        ))),
    )
    .parse(input)
}

/// A double-quoted string up to the next unescaped quote.
/// An unterminated string runs to the end of input and is rejected by the reader.
fn string_token(input: &str) -> IResult<&str, &str> {
    let (body, _) = char('"').parse(input)?;
    let mut escaped = false;
    for (i, c) in body.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '"' => {
                let end = 1 + i + 1;
                return Ok((&input[end..], &input[..end]));
            }
            _ => {}
        }
    }
    Ok(("", input))
}

fn bare_token(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| !c.is_whitespace() && !DELIMITERS.contains(c)).parse(input)
}

fn token(input: &str) -> IResult<&str, &str> {
    alt((
        tag("~@"),
        recognize(one_of(SINGLE_CHAR_TOKENS)),
        string_token,
        bare_token,
    ))
    .parse(input)
}

fn tokenize(input: &str) -> Result<Vec<Token<'_>>, ReadError> {
    let mut tokens = Vec::new();
    let mut remaining = input;

    loop {
        (remaining, _) = skip_ignored(remaining).map_err(|_| {
            ReadError::from_message(ReadErrorKind::UnexpectedToken, "Failed to skip whitespace")
        })?;
        if remaining.is_empty() {
            return Ok(tokens);
        }

        let offset = input.len() - remaining.len();
        let (rest, text) = token(remaining).map_err(|_| {
            ReadError::with_context(
                ReadErrorKind::UnexpectedToken,
                format!("Unrecognized input at position {offset}"),
                input,
                offset,
                None,
            )
        })?;
        tokens.push(Token { text, offset });
        remaining = rest;
    }
}

fn is_integer(text: &str) -> bool {
    let result: IResult<&str, &str> =
        all_consuming(recognize(pair(opt(char('-')), digit1))).parse(text);
    result.is_ok()
}

fn is_float(text: &str) -> bool {
    let result: IResult<&str, &str> =
        all_consuming(recognize((opt(char('-')), digit1, char('.'), digit1))).parse(text);
    result.is_ok()
}

fn is_identifier(text: &str) -> bool {
    let result: IResult<&str, &str> = all_consuming(recognize(pair(
        satisfy(|c| c.is_ascii_alphabetic() || c == '_' || c == '&'),
        take_while(|c: char| c.is_ascii_alphanumeric() || "-_!*".contains(c)),
    )))
    .parse(text);
    result.is_ok()
}

struct Reader<'a> {
    input: &'a str,
    tokens: Vec<Token<'a>>,
    position: usize,
}

impl<'a> Reader<'a> {
    fn peek(&self) -> Option<Token<'a>> {
        self.tokens.get(self.position).copied()
    }

    fn next(&mut self) -> Option<Token<'a>> {
        let token = self.peek()?;
        self.position += 1;
        Some(token)
    }

    fn error(&self, kind: ReadErrorKind, message: String, token: Token<'a>) -> Error {
        ReadError::with_context(
            kind,
            message,
            self.input,
            token.offset,
            Some(token.text.to_owned()),
        )
        .into()
    }

    fn read_form(&mut self, depth: usize) -> Result<Value, Error> {
        let Some(token) = self.next() else {
            return Err(ReadError::from_message(
                ReadErrorKind::Incomplete,
                "Unexpected end of input",
            )
            .into());
        };
        if depth >= MAX_PARSE_DEPTH {
            return Err(self.error(
                ReadErrorKind::TooDeeplyNested,
                format!("Expression too deeply nested (max depth: {MAX_PARSE_DEPTH})"),
                token,
            ));
        }

        match token.text {
            "(" => Ok(Value::list(self.read_sequence(token, ")", depth)?)),
            "[" => Ok(Value::vector(self.read_sequence(token, "]", depth)?)),
            "{" => Value::map_from_pairs(&self.read_sequence(token, "}", depth)?),
            ")" | "]" | "}" => Err(self.error(
                ReadErrorKind::Mismatch,
                format!("Unexpected '{}'", token.text),
                token,
            )),
            "'" => self.read_macro("quote", depth),
            "`" => self.read_macro("quasiquote", depth),
            "~" => self.read_macro("unquote", depth),
            "~@" => self.read_macro("splice-unquote", depth),
            "@" => self.read_macro("deref", depth),
            "^" => Err(self.error(
                ReadErrorKind::Unsupported,
                "Metadata is not supported".into(),
                token,
            )),
            _ => self.read_atom(token),
        }
    }

    fn read_sequence(
        &mut self,
        open: Token<'a>,
        close: &str,
        depth: usize,
    ) -> Result<Vec<Value>, Error> {
        let mut items = Vec::new();
        loop {
            match self.peek() {
                None => {
                    return Err(self.error(
                        ReadErrorKind::Incomplete,
                        format!("Unexpected end of input, expected '{close}'"),
                        open,
                    ));
                }
                Some(token) if token.text == close => {
                    self.position += 1;
                    return Ok(items);
                }
                Some(token) if matches!(token.text, ")" | "]" | "}") => {
                    return Err(self.error(
                        ReadErrorKind::Mismatch,
                        format!("Expected '{close}', got '{}'", token.text),
                        token,
                    ));
                }
                Some(_) => items.push(self.read_form(depth + 1)?),
            }
        }
    }

    /// `'x` and friends: `(name x)`
    fn read_macro(&mut self, name: &str, depth: usize) -> Result<Value, Error> {
        let form = self.read_form(depth + 1)?;
        Ok(Value::list(vec![sym(name), form]))
    }

    fn read_atom(&self, token: Token<'a>) -> Result<Value, Error> {
        let text = token.text;
        match text {
            "true" => return Ok(Value::Bool(true)),
            "false" => return Ok(Value::Bool(false)),
            "nil" => return Ok(Value::Nil),
            "undefined" => return Ok(Value::Undefined),
            _ => {}
        }

        if let Some(symbol) = Symbol::lookup(text) {
            return Ok(Value::Symbol(symbol));
        }
        if let Some(name) = text.strip_prefix(':')
            && !name.is_empty()
        {
            return Ok(Value::Keyword(Keyword::get_or_create(name)));
        }
        if is_integer(text) {
            return text.parse::<NumberType>().map(Value::from).map_err(|_| {
                self.error(
                    ReadErrorKind::ImplementationLimit,
                    format!("Integer literal out of range: {text}"),
                    token,
                )
            });
        }
        if is_float(text) {
            return text.parse::<f64>().map(Value::from).map_err(|_| {
                self.error(
                    ReadErrorKind::ImplementationLimit,
                    format!("Float literal out of range: {text}"),
                    token,
                )
            });
        }
        if text.starts_with('"') {
            return self.read_string(token);
        }
        if is_identifier(text) {
            return Ok(Value::Symbol(Symbol::get_or_create(text)));
        }

        Err(self.error(
            ReadErrorKind::UnexpectedToken,
            format!("Unexpected token '{text}'"),
            token,
        ))
    }

    fn read_string(&self, token: Token<'a>) -> Result<Value, Error> {
        let text = token.text;
        let unterminated = || {
            self.error(
                ReadErrorKind::Incomplete,
                "Unexpected end of input inside a string".into(),
                token,
            )
        };

        let mut chars = text[1..].chars();
        let mut resolved = String::with_capacity(text.len());
        loop {
            match chars.next() {
                Some('"') => return Ok(Value::from(resolved)),
                Some('\\') => match chars.next() {
                    Some('\\') => resolved.push('\\'),
                    Some('"') => resolved.push('"'),
                    Some('n') => resolved.push('\n'),
                    Some('t') => resolved.push('\t'),
                    Some('r') => resolved.push('\r'),
                    Some(other) => {
                        return Err(self.error(
                            ReadErrorKind::UnexpectedToken,
                            format!("Unknown escape sequence '\\{other}'"),
                            token,
                        ));
                    }
                    None => return Err(unterminated()),
                },
                Some(c) => resolved.push(c),
                None => return Err(unterminated()),
            }
        }
    }
}

/// Read one form from `input`.
///
/// Returns `Ok(None)` when the input contains no tokens, i.e. it is empty or holds only
/// whitespace and comments.
pub fn read_str(input: &str) -> Result<Option<Value>, Error> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Ok(None);
    }
    let mut reader = Reader {
        input,
        tokens,
        position: 0,
    };
    reader.read_form(0).map(Some)
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::{kw, nil, val, vector};
    use crate::printer::pr_str;

    /// Test result variants for reader tests
    #[derive(Debug)]
    enum ReadTestResult {
        Success(Value),             // Reading should succeed with this value
        Nothing,                    // Input holds no form
        ReadFailure(ReadErrorKind), // Should fail with a ReadError of this kind
        SpecificError(&'static str), // Should fail with an error whose text contains this
    }
    use ReadTestResult::*;

    fn success<T: Into<Value>>(value: T) -> ReadTestResult {
        Success(value.into())
    }

    fn run_read_tests(test_cases: Vec<(&str, ReadTestResult)>) {
        for (i, (input, expected)) in test_cases.iter().enumerate() {
            let test_id = format!("Read test #{} ({input:?})", i + 1);
            let result = read_str(input);

            match (result, expected) {
                (Ok(Some(actual)), Success(expected_val)) => {
                    assert_eq!(actual, *expected_val, "{test_id}: value mismatch");

                    // printing readably and reading again gives the same value
                    let printed = pr_str(&actual, true);
                    let reread = read_str(&printed)
                        .unwrap_or_else(|e| panic!("{test_id}: re-read of '{printed}' failed: {e}"))
                        .unwrap();
                    assert_eq!(reread, actual, "{test_id}: round-trip mismatch via '{printed}'");
                }
                (Ok(None), Nothing) => {}
                (Err(Error::ReadError(e)), ReadFailure(kind)) => {
                    assert_eq!(e.kind, *kind, "{test_id}: wrong read error kind: {e:?}");
                }
                (Err(e), SpecificError(text)) => {
                    let message = format!("{e}");
                    assert!(
                        message.contains(text),
                        "{test_id}: error '{message}' should contain '{text}'"
                    );
                }
                (result, expected) => {
                    panic!("{test_id}: expected {expected:?}, got {result:?}");
                }
            }
        }
    }

    #[test]
    fn test_atoms() {
        run_read_tests(vec![
            ("42", success(42)),
            ("-17", success(-17)),
            ("0", success(0)),
            ("3.25", success(3.25)),
            ("-0.5", success(-0.5)),
            ("\"hello\"", success("hello")),
            ("\"\"", success("")),
            ("\"a\\nb\\t\\\"q\\\" \\\\\"", success("a\nb\t\"q\" \\")),
            ("true", success(true)),
            ("false", success(false)),
            ("nil", Success(nil())),
            ("undefined", Success(Value::Undefined)),
            (":key", Success(kw("key"))),
            ("abc", Success(sym("abc"))),
            ("swap!", Success(sym("swap!"))),
            ("&", Success(sym("&"))),
            ("_private-name*", Success(sym("_private-name*"))),
            // operator names are interned ahead of time
            ("+", Success(sym("+"))),
            ("<=", Success(sym("<="))),
            ("empty?", Success(sym("empty?"))),
        ]);
    }

    #[test]
    fn test_collections() {
        run_read_tests(vec![
            ("()", success(Vec::<Value>::new())),
            ("(1 2 3)", success([1, 2, 3])),
            ("( 1 , 2 ,3 )", success([1, 2, 3])),
            ("[1 \"two\" :three]", Success(vector([val(1), val("two"), kw("three")]))),
            (
                "(+ 1 (* 2 3))",
                success(vec![sym("+"), val(1), val(vec![sym("*"), val(2), val(3)])]),
            ),
            (
                "{:a 1 \"b\" [2]}",
                Success(
                    Value::map_from_pairs(&[kw("a"), val(1), val("b"), vector([2])]).unwrap(),
                ),
            ),
            ("{}", Success(Value::map_from_pairs(&[]).unwrap())),
        ]);
    }

    #[test]
    fn test_reader_macros() {
        run_read_tests(vec![
            ("'x", success(vec![sym("quote"), sym("x")])),
            ("`(a ~b ~@c)", success(vec![
                sym("quasiquote"),
                val(vec![
                    sym("a"),
                    val(vec![sym("unquote"), sym("b")]),
                    val(vec![sym("splice-unquote"), sym("c")]),
                ]),
            ])),
            ("@counter", success(vec![sym("deref"), sym("counter")])),
            ("'(1 2)", success(vec![sym("quote"), val([1, 2])])),
            ("^{:a 1} x", ReadFailure(ReadErrorKind::Unsupported)),
        ]);
    }

    #[test]
    fn test_comments_and_blank_input() {
        run_read_tests(vec![
            ("", Nothing),
            ("   \n\t ", Nothing),
            ("; just a comment", Nothing),
            (",,,", Nothing),
            ("; comment\n42", success(42)),
            ("(1 ; inline\n 2)", success([1, 2])),
            // only the first form is read
            ("1 2 3", success(1)),
        ]);
    }

    #[test]
    fn test_errors() {
        run_read_tests(vec![
            ("(1 2", ReadFailure(ReadErrorKind::Incomplete)),
            ("[1 (2]", ReadFailure(ReadErrorKind::Mismatch)),
            (")", ReadFailure(ReadErrorKind::Mismatch)),
            ("'", ReadFailure(ReadErrorKind::Incomplete)),
            ("\"unterminated", ReadFailure(ReadErrorKind::Incomplete)),
            ("\"ends with escape\\\"", ReadFailure(ReadErrorKind::Incomplete)),
            ("\"bad \\q escape\"", ReadFailure(ReadErrorKind::UnexpectedToken)),
            ("1abc", ReadFailure(ReadErrorKind::UnexpectedToken)),
            ("#t", ReadFailure(ReadErrorKind::UnexpectedToken)),
            ("1.", ReadFailure(ReadErrorKind::UnexpectedToken)),
            (
                "99999999999999999999",
                ReadFailure(ReadErrorKind::ImplementationLimit),
            ),
            ("{:a 1 :b}", SpecificError("UnexpectedLength")),
            ("{1 2}", SpecificError("UnexpectedTokenType")),
        ]);
    }

    #[test]
    fn test_odd_map_is_unexpected_length() {
        assert_eq!(
            read_str("{:a 1 :b}").unwrap_err(),
            Error::UnexpectedLength { got: 3, base: 2 }
        );
    }

    #[test]
    fn test_nesting_limit() {
        let within = format!("{}{}", "(".repeat(100), ")".repeat(100));
        assert!(read_str(&within).is_ok());

        let too_deep = format!(
            "{}{}",
            "(".repeat(MAX_PARSE_DEPTH + 1),
            ")".repeat(MAX_PARSE_DEPTH + 1)
        );
        match read_str(&too_deep) {
            Err(Error::ReadError(e)) => assert_eq!(e.kind, ReadErrorKind::TooDeeplyNested),
            other => panic!("expected nesting error, got {other:?}"),
        }
    }

    #[test]
    fn test_error_context() {
        let Err(Error::ReadError(e)) = read_str("(list 1 2 ]") else {
            panic!("expected a read error");
        };
        assert_eq!(e.found.as_deref(), Some("]"));
        assert!(e.context.unwrap().contains("(list 1 2 ]"));
    }

    #[test]
    fn test_symbols_are_canonical() {
        let a = read_str("same-name").unwrap().unwrap();
        let b = read_str("same-name").unwrap().unwrap();
        match (a, b) {
            (Value::Symbol(a), Value::Symbol(b)) => assert!(std::ptr::eq(a.name(), b.name())),
            other => panic!("expected symbols, got {other:?}"),
        }
    }
}

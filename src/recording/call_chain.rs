//! Small expression grammar for the call chains found in recorded scripts,
//! step decorators and page-object locator assignments.
//!
//! Only the shapes those sources use are supported: identifiers, string and
//! number literals, lists, attribute access, calls with positional and
//! keyword arguments, and subscripts (parsed, then discarded).

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("column {column}: {message}")]
pub struct ChainError {
    pub column: usize,
    pub message: String,
}

impl ChainError {
    fn at(column: usize, message: impl Into<String>) -> Self {
        Self {
            column,
            message: message.into(),
        }
    }
}

// ============================================================================
// Lexer
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    Str(String),
    Number(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Eq,
    Dot,
    Colon,
    Arrow,
    Op(char),
}

fn tokenize(text: &str) -> Result<Vec<(Tok, usize)>, ChainError> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let col = i + 1;

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if c == '#' {
            break;
        }

        // String prefixes (r"", u"", f"", b"", rb"") are folded into the literal
        if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            let is_prefix = word.len() <= 2
                && word.chars().all(|p| matches!(p.to_ascii_lowercase(), 'r' | 'u' | 'b' | 'f'));
            if is_prefix && i < chars.len() && (chars[i] == '"' || chars[i] == '\'') {
                let raw = word.to_ascii_lowercase().contains('r');
                let (s, next) = read_string(&chars, i, raw)?;
                tokens.push((Tok::Str(s), col));
                i = next;
            } else {
                tokens.push((Tok::Ident(word), col));
            }
            continue;
        }

        if c == '"' || c == '\'' {
            let (s, next) = read_string(&chars, i, false)?;
            tokens.push((Tok::Str(s), col));
            i = next;
            continue;
        }

        if c.is_ascii_digit() || (c == '-' && chars.get(i + 1).is_some_and(|d| d.is_ascii_digit())) {
            let start = i;
            i += 1;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '.' || chars[i] == '_') {
                i += 1;
            }
            tokens.push((Tok::Number(chars[start..i].iter().collect()), col));
            continue;
        }

        let tok = match c {
            '(' => Tok::LParen,
            ')' => Tok::RParen,
            '[' => Tok::LBracket,
            ']' => Tok::RBracket,
            ',' => Tok::Comma,
            '.' => Tok::Dot,
            ':' => Tok::Colon,
            '-' if chars.get(i + 1) == Some(&'>') => {
                i += 1;
                Tok::Arrow
            }
            '=' if chars.get(i + 1) == Some(&'=') => {
                i += 1;
                Tok::Op('=')
            }
            '=' => Tok::Eq,
            other => Tok::Op(other),
        };
        tokens.push((tok, col));
        i += 1;
    }

    Ok(tokens)
}

fn read_string(chars: &[char], start: usize, raw: bool) -> Result<(String, usize), ChainError> {
    let quote = chars[start];
    let mut s = String::new();
    let mut i = start + 1;

    while i < chars.len() {
        let c = chars[i];
        if c == '\\' && i + 1 < chars.len() {
            let next = chars[i + 1];
            if raw {
                s.push('\\');
                s.push(next);
            } else {
                match next {
                    'n' => s.push('\n'),
                    't' => s.push('\t'),
                    '\\' | '"' | '\'' => s.push(next),
                    other => {
                        s.push('\\');
                        s.push(other);
                    }
                }
            }
            i += 2;
            continue;
        }
        if c == quote {
            return Ok((s, i + 1));
        }
        s.push(c);
        i += 1;
    }

    Err(ChainError::at(start + 1, "unterminated string literal"))
}

// ============================================================================
// Expression tree
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Str(String),
    Number(String),
    List(Vec<Expr>),
    Chain(Chain),
}

/// `a.b(x).c` as an ordered list of segments. The first segment is the root
/// identifier, which may itself be called (`expect(...)`).
#[derive(Debug, Clone, PartialEq)]
pub struct Chain {
    pub segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub name: String,
    /// `None` for plain attribute access, `Some` for a call.
    pub args: Option<Vec<Arg>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Arg {
    pub keyword: Option<String>,
    pub value: Expr,
}

/// `target = value`, or a bare expression when `target` is `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub target: Option<Chain>,
    pub value: Expr,
}

impl Expr {
    /// Literal text carried by the expression. `re.compile("x")` yields `x`,
    /// a list yields its first element.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Expr::Str(s) | Expr::Number(s) => Some(s.clone()),
            Expr::List(items) => items.first().and_then(Expr::as_text),
            Expr::Chain(chain) => {
                let last = chain.segments.last()?;
                if last.name == "compile" && chain.segments.len() >= 2 {
                    last.positional(0).and_then(Expr::as_text)
                } else if chain.segments.len() == 1 && last.args.is_none() {
                    // bare identifier such as True / False / a variable
                    Some(last.name.clone())
                } else {
                    None
                }
            }
        }
    }

    pub fn as_chain(&self) -> Option<&Chain> {
        match self {
            Expr::Chain(c) => Some(c),
            _ => None,
        }
    }
}

impl Chain {
    pub fn root(&self) -> &str {
        &self.segments[0].name
    }

    pub fn last(&self) -> &Segment {
        &self.segments[self.segments.len() - 1]
    }

    /// Dotted path of segment names, e.g. `page.get_by_role.click`.
    pub fn path(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.name.as_str())
            .collect::<Vec<_>>()
            .join(".")
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl Segment {
    pub fn is_call(&self) -> bool {
        self.args.is_some()
    }

    pub fn positional(&self, index: usize) -> Option<&Expr> {
        self.args
            .as_ref()?
            .iter()
            .filter(|a| a.keyword.is_none())
            .nth(index)
            .map(|a| &a.value)
    }

    pub fn keyword(&self, name: &str) -> Option<&Expr> {
        self.args
            .as_ref()?
            .iter()
            .find(|a| a.keyword.as_deref() == Some(name))
            .map(|a| &a.value)
    }

    pub fn positional_text(&self, index: usize) -> Option<String> {
        self.positional(index).and_then(Expr::as_text)
    }

    pub fn keyword_text(&self, name: &str) -> Option<String> {
        self.keyword(name).and_then(Expr::as_text)
    }
}

// ============================================================================
// Parser
// ============================================================================

/// Deepest bracket nesting accepted in one expression.
pub const MAX_NESTING: usize = 64;

struct Cursor {
    tokens: Vec<(Tok, usize)>,
    pos: usize,
    end_col: usize,
    depth: usize,
}

impl Cursor {
    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn col(&self) -> usize {
        self.tokens.get(self.pos).map(|(_, c)| *c).unwrap_or(self.end_col)
    }

    fn bump(&mut self) -> Option<Tok> {
        let tok = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        self.pos += 1;
        tok
    }

    fn expect(&mut self, want: Tok, what: &str) -> Result<(), ChainError> {
        let col = self.col();
        match self.bump() {
            Some(t) if t == want => Ok(()),
            Some(t) => Err(ChainError::at(col, format!("expected {}, found {:?}", what, t))),
            None => Err(ChainError::at(col, format!("expected {}, found end of input", what))),
        }
    }

    fn expr(&mut self) -> Result<Expr, ChainError> {
        if self.depth >= MAX_NESTING {
            return Err(ChainError::at(
                self.col(),
                format!("expression nested deeper than {} levels", MAX_NESTING),
            ));
        }
        self.depth += 1;
        let parsed = self.nested_expr();
        self.depth -= 1;
        parsed
    }

    fn nested_expr(&mut self) -> Result<Expr, ChainError> {
        let col = self.col();
        let primary = match self.bump() {
            Some(Tok::Str(s)) => {
                // implicit concatenation: "a" "b"
                let mut s = s;
                while let Some(Tok::Str(next)) = self.peek() {
                    s.push_str(next);
                    self.pos += 1;
                }
                Expr::Str(s)
            }
            Some(Tok::Number(n)) => Expr::Number(n),
            Some(Tok::LBracket) => {
                let mut items = Vec::new();
                while self.peek() != Some(&Tok::RBracket) {
                    items.push(self.expr()?);
                    if self.peek() == Some(&Tok::Comma) {
                        self.pos += 1;
                    } else {
                        break;
                    }
                }
                self.expect(Tok::RBracket, "']'")?;
                Expr::List(items)
            }
            Some(Tok::LParen) => {
                let inner = self.expr()?;
                self.expect(Tok::RParen, "')'")?;
                inner
            }
            Some(Tok::Ident(name)) => {
                let mut segments = vec![Segment { name, args: None }];
                self.postfix(&mut segments)?;
                return Ok(Expr::Chain(Chain { segments }));
            }
            Some(t) => return Err(ChainError::at(col, format!("unexpected {:?}", t))),
            None => return Err(ChainError::at(col, "unexpected end of input")),
        };

        // literals can be followed by attribute calls too ("x".join(...)), keep the literal
        if self.peek() == Some(&Tok::Dot) {
            let mut segments = vec![Segment {
                name: "<literal>".into(),
                args: None,
            }];
            self.postfix(&mut segments)?;
        }
        Ok(primary)
    }

    fn postfix(&mut self, segments: &mut Vec<Segment>) -> Result<(), ChainError> {
        loop {
            match self.peek() {
                Some(Tok::Dot) => {
                    self.pos += 1;
                    let col = self.col();
                    match self.bump() {
                        Some(Tok::Ident(name)) => segments.push(Segment { name, args: None }),
                        _ => return Err(ChainError::at(col, "expected attribute name after '.'")),
                    }
                }
                Some(Tok::LParen) => {
                    self.pos += 1;
                    let args = self.args()?;
                    let last = segments.len() - 1;
                    if segments[last].args.is_some() {
                        // calling a call result, e.g. f()(), recorded as an anonymous segment
                        segments.push(Segment {
                            name: "<call>".into(),
                            args: Some(args),
                        });
                    } else {
                        segments[last].args = Some(args);
                    }
                }
                Some(Tok::LBracket) => {
                    self.pos += 1;
                    self.expr()?;
                    self.expect(Tok::RBracket, "']'")?;
                }
                _ => return Ok(()),
            }
        }
    }

    fn args(&mut self) -> Result<Vec<Arg>, ChainError> {
        let mut args = Vec::new();
        loop {
            if self.peek() == Some(&Tok::RParen) {
                self.pos += 1;
                return Ok(args);
            }

            let keyword = match (self.tokens.get(self.pos), self.tokens.get(self.pos + 1)) {
                (Some((Tok::Ident(k), _)), Some((Tok::Eq, _))) => Some(k.clone()),
                _ => None,
            };
            if keyword.is_some() {
                self.pos += 2;
            }

            let value = self.expr()?;
            // annotations in signatures (`name: str`) and defaults are skipped by callers;
            // here we only need to tolerate them
            if self.peek() == Some(&Tok::Colon) {
                self.pos += 1;
                self.expr()?;
                if self.peek() == Some(&Tok::Eq) {
                    self.pos += 1;
                    self.expr()?;
                }
            }
            args.push(Arg { keyword, value });

            let col = self.col();
            match self.bump() {
                Some(Tok::Comma) => continue,
                Some(Tok::RParen) => return Ok(args),
                Some(t) => return Err(ChainError::at(col, format!("expected ',' or ')', found {:?}", t))),
                None => return Err(ChainError::at(col, "unclosed '('")),
            }
        }
    }
}

fn cursor(text: &str) -> Result<Cursor, ChainError> {
    Ok(Cursor {
        tokens: tokenize(text)?,
        pos: 0,
        end_col: text.chars().count() + 1,
        depth: 0,
    })
}

/// Parse a single expression; the whole input must be consumed.
pub fn parse_expression(text: &str) -> Result<Expr, ChainError> {
    let mut c = cursor(text)?;
    let expr = c.expr()?;
    if let Some(t) = c.peek().cloned() {
        return Err(ChainError::at(c.col(), format!("unexpected trailing {:?}", t)));
    }
    Ok(expr)
}

/// Parse `target = value` or a bare expression.
pub fn parse_statement(text: &str) -> Result<Statement, ChainError> {
    let mut c = cursor(text)?;
    let first = c.expr()?;

    if c.peek() == Some(&Tok::Eq) {
        c.pos += 1;
        let target = match first {
            Expr::Chain(chain) => chain,
            _ => return Err(ChainError::at(1, "assignment target must be a name")),
        };
        let value = c.expr()?;
        if let Some(t) = c.peek().cloned() {
            return Err(ChainError::at(c.col(), format!("unexpected trailing {:?}", t)));
        }
        return Ok(Statement {
            target: Some(target),
            value,
        });
    }

    if let Some(t) = c.peek().cloned() {
        return Err(ChainError::at(c.col(), format!("unexpected trailing {:?}", t)));
    }
    Ok(Statement {
        target: None,
        value: first,
    })
}

/// Parameter names of a `def` signature, excluding `self`/`cls`, annotations,
/// defaults and `*args`/`**kwargs` markers.
pub fn signature_parameters(params: &str) -> Result<Vec<String>, ChainError> {
    let tokens = tokenize(params)?;
    let mut names = Vec::new();
    let mut depth = 0usize;
    let mut expecting_name = true;

    for (tok, _) in tokens {
        match tok {
            Tok::LParen | Tok::LBracket => depth += 1,
            Tok::RParen | Tok::RBracket => depth = depth.saturating_sub(1),
            Tok::Comma if depth == 0 => expecting_name = true,
            Tok::Op('*') if depth == 0 => {}
            Tok::Ident(name) if depth == 0 && expecting_name => {
                if name != "self" && name != "cls" {
                    names.push(name);
                }
                expecting_name = false;
            }
            _ => {
                if depth == 0 {
                    expecting_name = false;
                }
            }
        }
    }

    Ok(names)
}

//! Recursive-descent parser for filter expressions.

use super::{Filter, FilterSyntaxError, KindSet, Selector, TagClause};

pub(super) fn parse(expression: &str) -> Result<Filter, FilterSyntaxError> {
    let mut parser = Parser {
        input: expression,
        pos: 0,
    };
    let mut selectors = vec![parser.selector()?];
    loop {
        parser.skip_whitespace();
        match parser.peek() {
            None => break,
            Some(',') => {
                parser.bump();
                selectors.push(parser.selector()?);
            }
            Some(_) => return Err(parser.error("`[`, `,` or end of query")),
        }
    }
    Ok(Filter { selectors })
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<char> {
        self.input.get(self.pos..).and_then(|rest| rest.chars().next())
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn error(&self, expected: &'static str) -> FilterSyntaxError {
        FilterSyntaxError {
            expression: self.input.to_owned(),
            position: self.pos,
            expected,
        }
    }

    fn expect(&mut self, wanted: char, expected: &'static str) -> Result<(), FilterSyntaxError> {
        if self.peek() == Some(wanted) {
            self.bump();
            Ok(())
        } else {
            Err(self.error(expected))
        }
    }

    fn selector(&mut self) -> Result<Selector, FilterSyntaxError> {
        self.skip_whitespace();
        let kinds = self.kinds()?;
        let mut clauses = Vec::new();
        loop {
            self.skip_whitespace();
            if self.peek() != Some('[') {
                break;
            }
            self.bump();
            clauses.push(self.clause()?);
        }
        Ok(Selector { kinds, clauses })
    }

    fn kinds(&mut self) -> Result<KindSet, FilterSyntaxError> {
        if self.peek() == Some('*') {
            self.bump();
            return Ok(KindSet::ALL);
        }
        let mut kinds = KindSet::default();
        let mut seen = false;
        while let Some(letter) = self.peek() {
            match letter {
                'n' => kinds.nodes = true,
                'w' => kinds.ways = true,
                'a' => kinds.areas = true,
                'r' => kinds.relations = true,
                _ => break,
            }
            seen = true;
            self.bump();
        }
        if seen {
            Ok(kinds)
        } else {
            Err(self.error("feature types (`n`, `w`, `a`, `r` or `*`)"))
        }
    }

    // Called after the opening bracket.
    fn clause(&mut self) -> Result<TagClause, FilterSyntaxError> {
        self.skip_whitespace();
        let negated = self.peek() == Some('!');
        if negated {
            self.bump();
            self.skip_whitespace();
        }
        let key = self.atom("tag key")?;
        self.skip_whitespace();
        if negated {
            self.expect(']', "`]`")?;
            return Ok(TagClause::Absent(key));
        }
        match self.peek() {
            Some(']') => {
                self.bump();
                Ok(TagClause::Present(key))
            }
            Some('=') => {
                self.bump();
                let values = self.values()?;
                Ok(TagClause::OneOf { key, values })
            }
            Some('!') => {
                self.bump();
                self.expect('=', "`=` after `!`")?;
                let values = self.values()?;
                Ok(TagClause::NoneOf { key, values })
            }
            _ => Err(self.error("`=`, `!=` or `]`")),
        }
    }

    // Consumes the closing bracket.
    fn values(&mut self) -> Result<Vec<String>, FilterSyntaxError> {
        let mut values = Vec::new();
        loop {
            self.skip_whitespace();
            values.push(self.atom("tag value")?);
            self.skip_whitespace();
            match self.bump() {
                Some(',') => {}
                Some(']') => return Ok(values),
                Some(ch) => {
                    self.pos -= ch.len_utf8();
                    return Err(self.error("`,` or `]`"));
                }
                None => return Err(self.error("`,` or `]`")),
            }
        }
    }

    fn atom(&mut self, expected: &'static str) -> Result<String, FilterSyntaxError> {
        match self.peek() {
            Some(quote @ ('\'' | '"')) => {
                self.bump();
                self.quoted(quote)
            }
            _ => self.bare(expected),
        }
    }

    fn quoted(&mut self, quote: char) -> Result<String, FilterSyntaxError> {
        let mut text = String::new();
        loop {
            match self.bump() {
                Some('\\') => match self.bump() {
                    Some(escaped) => text.push(escaped),
                    None => return Err(self.error("closing quote")),
                },
                Some(ch) if ch == quote => return Ok(text),
                Some(ch) => text.push(ch),
                None => return Err(self.error("closing quote")),
            }
        }
    }

    fn bare(&mut self, expected: &'static str) -> Result<String, FilterSyntaxError> {
        let start = self.pos;
        while self.peek().is_some_and(is_bare_char) {
            self.bump();
        }
        match self.input.get(start..self.pos) {
            Some(text) if !text.is_empty() => Ok(text.to_owned()),
            _ => Err(self.error(expected)),
        }
    }
}

fn is_bare_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '_' | ':' | '.' | '-')
}

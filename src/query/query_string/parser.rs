//! Recursive descent parser for query strings
//!
//! Parses against a [`SearchSchema`]: each leaf is built for the kind of the
//! field it targets, and clauses that analyze to nothing are dropped rather
//! than turned into match-all.
//!
//! # Grammar
//!
//! ```text
//! query       := or_expr
//! or_expr     := and_expr (OR and_expr)*
//! and_expr    := unary (AND? unary)*
//! unary       := (NOT | '-' | '+')? primary
//! primary     := field_query | grouped | range | phrase | term
//! field_query := TERM COLON (grouped | range | phrase | term)
//! range       := ('[' | '{') value TO value (']' | '}')
//! value       := TERM | QUOTED | '*'
//! grouped     := '(' or_expr ')'
//! ```
//!
//! Every primary may be followed by `^boost`.

use super::lexer::{Lexer, Token};
use crate::error::{QueryError, SearchSyncError};
use crate::query::ast::QueryNode;
use crate::query::nodes::{BoolQuery, PhraseQuery, PrefixQuery, RangeQuery, TermQuery, WildcardQuery};
use crate::query::types::{Combinator, RangeBounds};
use crate::schema::values::{date_period, parse_bool, parse_number};
use crate::schema::{FieldKind, SearchSchema};
use crate::tokenizer::Tokenizer;
use crate::Result;

type Clause = Option<Box<dyn QueryNode>>;

/// Default boost for a bare `^`
const DEFAULT_CARET_BOOST: f32 = 2.0;

#[derive(Clone, Copy, PartialEq)]
enum Occur {
    Default,
    Required,
    Prohibited,
}

/// Parser expanding unqualified terms over several schema fields
pub struct MultiFieldParser<'a> {
    lexer: Lexer,
    current_token: Token,
    schema: &'a SearchSchema,
    analyzer: &'a Tokenizer,
    /// Fields searched by unqualified terms
    fields: Vec<String>,
    combinator: Combinator,
    /// Field set by an enclosing `field:( ... )` group
    scope: Option<String>,
}

impl<'a> MultiFieldParser<'a> {
    pub fn new(input: &str, schema: &'a SearchSchema, analyzer: &'a Tokenizer) -> Result<Self> {
        let mut lexer = Lexer::new(input);
        let current_token = lexer.next_token()?;

        Ok(Self {
            lexer,
            current_token,
            schema,
            analyzer,
            fields: schema.default_query_fields(),
            combinator: Combinator::default(),
            scope: None,
        })
    }

    /// Fields for unqualified terms; every name must be a schema field
    pub fn with_fields(mut self, fields: Vec<String>) -> Result<Self> {
        for field in &fields {
            self.check_field(field)?;
        }
        self.fields = fields;
        Ok(self)
    }

    pub fn with_combinator(mut self, combinator: Combinator) -> Self {
        self.combinator = combinator;
        self
    }

    /// Parse the query string. `None` means every clause was dropped and the
    /// query matches nothing.
    pub fn parse(&mut self) -> Result<Clause> {
        if self.current_token == Token::Eof {
            return Ok(None);
        }

        let query = self.parse_or_expr()?;

        if self.current_token != Token::Eof {
            return Err(SearchSyncError::parse(format!(
                "unexpected token after query: {:?}",
                self.current_token
            )));
        }

        Ok(query)
    }

    /// Parse: or_expr := and_expr (OR and_expr)*
    fn parse_or_expr(&mut self) -> Result<Clause> {
        let mut clauses = vec![self.parse_and_expr()?];

        while self.current_token == Token::Or {
            self.advance()?;
            clauses.push(self.parse_and_expr()?);
        }

        Ok(combine(clauses.into_iter().flatten().collect(), Combinator::Or))
    }

    /// Parse: and_expr := unary (AND? unary)*
    ///
    /// Adjacent clauses form a group joined by the combinator; explicit AND
    /// starts a new group and all groups must match. `+` clauses are always
    /// required and `-`/NOT clauses always excluded.
    fn parse_and_expr(&mut self) -> Result<Clause> {
        let mut groups: Vec<Vec<Box<dyn QueryNode>>> = vec![Vec::new()];
        let mut required = Vec::new();
        let mut prohibited = Vec::new();

        let mut place = |occur: Occur, clause: Clause, groups: &mut Vec<Vec<_>>| {
            let Some(node) = clause else {
                return;
            };
            match occur {
                Occur::Default => {
                    if let Some(group) = groups.last_mut() {
                        group.push(node);
                    }
                }
                Occur::Required => required.push(node),
                Occur::Prohibited => prohibited.push(node),
            }
        };

        let (occur, clause) = self.parse_unary()?;
        place(occur, clause, &mut groups);

        loop {
            if self.current_token == Token::And {
                self.advance()?;
                groups.push(Vec::new());
            } else if !self.is_start_of_primary() {
                break;
            }
            let (occur, clause) = self.parse_unary()?;
            place(occur, clause, &mut groups);
        }

        let grouped: Vec<Box<dyn QueryNode>> = groups
            .into_iter()
            .filter_map(|group| combine(group, self.combinator))
            .collect();

        if prohibited.is_empty() && required.is_empty() && grouped.len() <= 1 {
            return Ok(grouped.into_iter().next());
        }

        let mut query = BoolQuery::new();
        // With OR as combinator, plain clauses next to required ones only
        // contribute to the score
        let optional = self.combinator == Combinator::Or && !required.is_empty();
        for node in grouped {
            query = if optional {
                query.should_boxed(node)
            } else {
                query.must_boxed(node)
            };
        }
        for node in required {
            query = query.must_boxed(node);
        }
        for node in prohibited {
            query = query.must_not_boxed(node);
        }
        Ok(Some(Box::new(query)))
    }

    /// Parse: unary := (NOT | '-' | '+')? primary
    fn parse_unary(&mut self) -> Result<(Occur, Clause)> {
        let occur = match self.current_token {
            Token::Not | Token::Minus => Occur::Prohibited,
            Token::Plus => Occur::Required,
            _ => Occur::Default,
        };
        if occur != Occur::Default {
            self.advance()?;
        }
        Ok((occur, self.parse_primary()?))
    }

    /// Parse: primary := field_query | grouped | range | phrase | term
    fn parse_primary(&mut self) -> Result<Clause> {
        let clause = match &self.current_token {
            Token::LeftParen => {
                self.advance()?;
                let expr = self.parse_or_expr()?;
                self.expect(Token::RightParen)?;
                expr
            }
            Token::Term(term) => {
                let term = term.clone();
                self.advance()?;

                if self.current_token == Token::Colon {
                    self.advance()?;
                    return self.parse_field_value(&term);
                }
                self.expand(|parser, field| parser.term_leaf(field, &term))?
            }
            // Outside a range, TO is an ordinary word
            Token::To => {
                self.advance()?;
                self.expand(|parser, field| parser.term_leaf(field, "TO"))?
            }
            Token::QuotedString(text) => {
                let text = text.clone();
                self.advance()?;
                self.expand(|parser, field| Ok(parser.phrase_leaf(field, &text)))?
            }
            Token::LeftBracket | Token::LeftBrace => {
                let range = self.parse_range()?;
                self.expand(|parser, field| Ok(parser.range_leaf(field, &range)))?
            }
            Token::Asterisk => {
                return Err(SearchSyncError::parse("a bare '*' is not a valid query"));
            }
            _ => {
                return Err(SearchSyncError::parse(format!(
                    "unexpected token: {:?}",
                    self.current_token
                )))
            }
        };
        self.parse_boost(clause)
    }

    /// Parse field value after `field:`
    fn parse_field_value(&mut self, field: &str) -> Result<Clause> {
        self.check_field(field)?;

        let clause = match &self.current_token {
            Token::LeftParen => {
                self.advance()?;
                let outer = self.scope.replace(field.to_string());
                let inner = self.parse_or_expr();
                self.scope = outer;
                let inner = inner?;
                self.expect(Token::RightParen)?;
                inner
            }
            Token::LeftBracket | Token::LeftBrace => {
                let range = self.parse_range()?;
                self.range_leaf(field, &range)
            }
            Token::QuotedString(text) => {
                let text = text.clone();
                self.advance()?;
                self.phrase_leaf(field, &text)
            }
            Token::Term(term) => {
                let term = term.clone();
                self.advance()?;
                self.term_leaf(field, &term)?
            }
            Token::Asterisk => {
                return Err(SearchSyncError::parse(format!(
                    "'{field}:*' would match every document"
                )));
            }
            _ => {
                return Err(SearchSyncError::parse(format!(
                    "expected value after field '{}:', got {:?}",
                    field, self.current_token
                )))
            }
        };
        self.parse_boost(clause)
    }

    /// Parse an optional `^boost` after a primary
    fn parse_boost(&mut self, clause: Clause) -> Result<Clause> {
        let Token::Caret(boost) = self.current_token else {
            return Ok(clause);
        };
        self.advance()?;
        let boost = boost.unwrap_or(DEFAULT_CARET_BOOST);
        Ok(clause.map(|node| {
            Box::new(BoolQuery::new().must_boxed(node).with_boost(boost)) as Box<dyn QueryNode>
        }))
    }

    /// Parse range: `[low TO high]` or `{low TO high}`, mixed brackets allowed
    fn parse_range(&mut self) -> Result<RawRange> {
        let include_lower = self.current_token == Token::LeftBracket;
        self.advance()?;

        let lower = self.parse_range_value()?;
        self.expect(Token::To)?;
        let upper = self.parse_range_value()?;

        let include_upper = match self.current_token {
            Token::RightBracket => true,
            Token::RightBrace => false,
            _ => {
                return Err(SearchSyncError::parse(
                    "expected ']' or '}' at end of range",
                ))
            }
        };
        self.advance()?;

        Ok(RawRange {
            lower,
            upper,
            include_lower,
            include_upper,
        })
    }

    /// Parse a single range bound; `*` is open
    fn parse_range_value(&mut self) -> Result<Option<String>> {
        let value = match &self.current_token {
            Token::Asterisk => None,
            Token::Term(s) | Token::QuotedString(s) => Some(s.clone()),
            _ => {
                return Err(SearchSyncError::parse(format!(
                    "expected range value, got: {:?}",
                    self.current_token
                )))
            }
        };
        self.advance()?;
        Ok(value)
    }

    /// Build one leaf per query field in scope and join them as a disjunction
    fn expand<F>(&self, build: F) -> Result<Clause>
    where
        F: Fn(&Self, &str) -> Result<Clause>,
    {
        let mut clauses = Vec::new();
        match &self.scope {
            Some(field) => clauses.extend(build(self, field)?),
            None => {
                for field in &self.fields {
                    clauses.extend(build(self, field)?);
                }
            }
        }
        Ok(combine(clauses, Combinator::Or))
    }

    fn term_leaf(&self, field: &str, raw: &str) -> Result<Clause> {
        let Some(kind) = self.schema.kind(field) else {
            return Ok(None);
        };

        let has_wildcard = raw.contains(['*', '?']);
        if has_wildcard && raw.chars().all(|c| c == '*') {
            return Err(SearchSyncError::parse("a bare '*' is not a valid query"));
        }

        let clause: Clause = match kind {
            FieldKind::Text if has_wildcard => {
                Some(pattern_leaf(field, &self.analyzer.normalize_pattern(raw)))
            }
            FieldKind::Text => {
                let terms: Vec<Box<dyn QueryNode>> = self
                    .analyzer
                    .tokenize(raw)
                    .into_iter()
                    .map(|term| Box::new(TermQuery::new(field, term)) as Box<dyn QueryNode>)
                    .collect();
                combine(terms, self.combinator)
            }
            FieldKind::Identifier if has_wildcard => Some(pattern_leaf(field, raw)),
            FieldKind::Identifier => Some(Box::new(TermQuery::new(field, raw))),
            _ if has_wildcard => None,
            FieldKind::Boolean => parse_bool(raw)
                .map(|b| Box::new(TermQuery::new(field, b.to_string())) as Box<dyn QueryNode>),
            FieldKind::Numeric { .. } => parse_number(raw).map(|value| {
                Box::new(RangeQuery::new(field, RangeBounds::exact(value))) as Box<dyn QueryNode>
            }),
            FieldKind::DateTime { .. } => date_period(raw).map(|(start, end)| {
                Box::new(RangeQuery::new(
                    field,
                    RangeBounds::half_open(start as f64, end as f64),
                )) as Box<dyn QueryNode>
            }),
        };
        Ok(clause)
    }

    fn phrase_leaf(&self, field: &str, text: &str) -> Clause {
        match self.schema.kind(field)? {
            FieldKind::Text => {
                let mut positioned = self.analyzer.tokenize_with_positions_ordered(text);
                match positioned.len() {
                    0 => None,
                    1 => positioned
                        .pop()
                        .map(|(term, _)| Box::new(TermQuery::new(field, term)) as Box<dyn QueryNode>),
                    _ => Some(Box::new(PhraseQuery::new(field, positioned))),
                }
            }
            FieldKind::Identifier => Some(Box::new(TermQuery::new(field, text))),
            // Quoting lets structured values carry spaces, as in full date-times
            _ => self.term_leaf(field, text).ok().flatten(),
        }
    }

    /// Ranges only apply to Numeric and DateTime fields; an unparsable bound
    /// drops the clause
    fn range_leaf(&self, field: &str, range: &RawRange) -> Clause {
        let bounds = match self.schema.kind(field)? {
            FieldKind::Numeric { .. } => range.numeric_bounds()?,
            FieldKind::DateTime { .. } => range.datetime_bounds()?,
            _ => return None,
        };
        Some(Box::new(RangeQuery::new(field, bounds)))
    }

    fn check_field(&self, field: &str) -> Result<()> {
        if self.schema.has_field(field) {
            Ok(())
        } else {
            Err(QueryError::UnknownField {
                record_type: self.schema.record_type.clone(),
                field: field.to_string(),
            }
            .into())
        }
    }

    fn is_start_of_primary(&self) -> bool {
        matches!(
            self.current_token,
            Token::Term(_)
                | Token::QuotedString(_)
                | Token::LeftParen
                | Token::LeftBracket
                | Token::LeftBrace
                | Token::Plus
                | Token::Minus
                | Token::Not
                | Token::To
                | Token::Asterisk
        )
    }

    fn advance(&mut self) -> Result<()> {
        self.current_token = self.lexer.next_token()?;
        Ok(())
    }

    /// Expect a specific token and advance
    fn expect(&mut self, expected: Token) -> Result<()> {
        if std::mem::discriminant(&self.current_token) == std::mem::discriminant(&expected) {
            self.advance()
        } else {
            Err(SearchSyncError::parse(format!(
                "expected {:?}, got {:?} at position {}",
                expected,
                self.current_token,
                self.lexer.position()
            )))
        }
    }
}

/// Range bounds as written, before they are read for a field kind
struct RawRange {
    lower: Option<String>,
    upper: Option<String>,
    include_lower: bool,
    include_upper: bool,
}

impl RawRange {
    fn numeric_bounds(&self) -> Option<RangeBounds> {
        let lower = match &self.lower {
            Some(raw) => Some(parse_number(raw)?),
            None => None,
        };
        let upper = match &self.upper {
            Some(raw) => Some(parse_number(raw)?),
            None => None,
        };
        Some(RangeBounds {
            lower,
            upper,
            include_lower: self.include_lower,
            include_upper: self.include_upper,
        })
    }

    /// Each bound covers its whole period: `[2023 TO 2024]` runs from the
    /// start of 2023 to the end of 2024, `{2023 TO 2024}` from the end of
    /// 2023 to the start of 2024
    fn datetime_bounds(&self) -> Option<RangeBounds> {
        let mut bounds = RangeBounds::default();
        if let Some(raw) = &self.lower {
            let (start, end) = date_period(raw)?;
            bounds.lower = Some((if self.include_lower { start } else { end }) as f64);
            bounds.include_lower = true;
        }
        if let Some(raw) = &self.upper {
            let (start, end) = date_period(raw)?;
            bounds.upper = Some((if self.include_upper { end } else { start }) as f64);
            bounds.include_upper = false;
        }
        Some(bounds)
    }
}

/// Prefix query for `abc*`, wildcard query for anything else
fn pattern_leaf(field: &str, pattern: &str) -> Box<dyn QueryNode> {
    match pattern.strip_suffix('*') {
        Some(prefix) if !prefix.is_empty() && !prefix.contains(['*', '?']) => {
            Box::new(PrefixQuery::new(field, prefix))
        }
        _ => Box::new(WildcardQuery::new(field, pattern)),
    }
}

fn combine(mut clauses: Vec<Box<dyn QueryNode>>, combinator: Combinator) -> Clause {
    match clauses.len() {
        0 => None,
        1 => clauses.pop(),
        _ => {
            let query = clauses
                .into_iter()
                .fold(BoolQuery::new(), |query, clause| match combinator {
                    Combinator::And => query.must_boxed(clause),
                    Combinator::Or => query.should_boxed(clause),
                });
            Some(Box::new(query))
        }
    }
}

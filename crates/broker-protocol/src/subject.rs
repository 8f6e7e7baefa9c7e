//! Dotted hierarchical subject names and their tokens.
//!
//! A subject is validated once at the wire boundary (`Subject::parse`) and
//! carried around as owned, already-tokenized data from then on — nothing
//! downstream re-parses or re-validates it.

use std::fmt;

/// One `.`-separated segment of a subject.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Token {
    /// A non-empty literal free of `.`, ' ', '\t', '\r', '\n'.
    Literal(Box<str>),
    /// `*` — matches exactly one token.
    Star,
    /// `>` — matches one or more trailing tokens; only valid as the last token.
    GreaterThan,
}

impl Token {
    fn parse(raw: &str) -> Result<Token, SubjectError> {
        if raw.is_empty() {
            return Err(SubjectError::EmptyToken);
        }
        if raw == "*" {
            return Ok(Token::Star);
        }
        if raw == ">" {
            return Ok(Token::GreaterThan);
        }
        if raw
            .bytes()
            .any(|b| matches!(b, b'.' | b' ' | b'\t' | b'\r' | b'\n'))
        {
            return Err(SubjectError::InvalidCharacter);
        }
        Ok(Token::Literal(raw.into()))
    }

    pub fn as_literal(&self) -> Option<&str> {
        match self {
            Token::Literal(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Literal(s) => f.write_str(s),
            Token::Star => f.write_str("*"),
            Token::GreaterThan => f.write_str(">"),
        }
    }
}

#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum SubjectError {
    #[error("subject is empty")]
    Empty,
    #[error("subject token is empty")]
    EmptyToken,
    #[error("subject token contains a forbidden character")]
    InvalidCharacter,
    #[error("'>' wildcard is only valid as the last token")]
    MisplacedFullWildcard,
    #[error("publish subject must not contain wildcards")]
    WildcardInPublish,
}

/// A validated, tokenized subject.
///
/// `Subject::parse` accepts wildcards (for subscriptions);
/// `Subject::parse_literal` additionally rejects `*`/`>` (for publishes).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subject {
    tokens: Box<[Token]>,
}

impl Subject {
    /// Parses a subscribe-side subject: wildcards allowed, `>` only last.
    pub fn parse(raw: &str) -> Result<Subject, SubjectError> {
        if raw.is_empty() {
            return Err(SubjectError::Empty);
        }
        let mut tokens = Vec::new();
        for (idx, part) in raw.split('.').enumerate() {
            let _ = idx;
            tokens.push(Token::parse(part)?);
        }
        for (idx, tok) in tokens.iter().enumerate() {
            if matches!(tok, Token::GreaterThan) && idx != tokens.len() - 1 {
                return Err(SubjectError::MisplacedFullWildcard);
            }
        }
        Ok(Subject {
            tokens: tokens.into_boxed_slice(),
        })
    }

    /// Parses a publish-side subject: must be fully literal.
    pub fn parse_literal(raw: &str) -> Result<Subject, SubjectError> {
        let subject = Subject::parse(raw)?;
        if subject.has_wildcard() {
            return Err(SubjectError::WildcardInPublish);
        }
        Ok(subject)
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn has_wildcard(&self) -> bool {
        self.tokens
            .iter()
            .any(|t| matches!(t, Token::Star | Token::GreaterThan))
    }

    /// The raw bytes of a fully-literal subject, used as the cache key and
    /// as the `MSG` frame's subject field. Panics if the subject carries a
    /// wildcard token — callers must only call this on publish subjects.
    pub fn literal_bytes(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }

    /// Whether every concrete subject `self` could ever match is also
    /// matched by `other`. Used for permission checks, where a subscribe
    /// subject can itself carry wildcards (`SUB reports.* 1`) and a
    /// Sublist's own `match_subject` (built for literal publish subjects)
    /// can't answer that question.
    ///
    /// Token-by-token: a `>` in `other` swallows everything remaining in
    /// `self`, but needs at least one token there to swallow; a `*` in
    /// `other` accepts a `Literal` or `*` in `self` at that position but
    /// not a `>` (which could stand for more than one token); a `Literal`
    /// in `other` requires the same literal in `self`.
    pub fn is_subset_of(&self, other: &Subject) -> bool {
        let mut sub = self.tokens.iter();
        let mut sup = other.tokens.iter();
        loop {
            match (sub.next(), sup.next()) {
                (Some(_), Some(Token::GreaterThan)) => return true,
                (None, Some(Token::GreaterThan)) => return false,
                (Some(Token::GreaterThan), _) => return false,
                (Some(Token::Literal(s)), Some(Token::Literal(o))) => {
                    if s != o {
                        return false;
                    }
                }
                (Some(_), Some(Token::Star)) => {}
                (Some(Token::Star), Some(Token::Literal(_))) => return false,
                (None, None) => return true,
                (None, Some(_)) | (Some(_), None) => return false,
            }
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, tok) in self.tokens.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{tok}")?;
        }
        Ok(())
    }
}

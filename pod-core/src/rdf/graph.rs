// pod-core/src/rdf/graph.rs
use percent_encoding::percent_encode_byte;
use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fmt;

use super::vocab::{rdf, xsd};

/// An RDF literal. Plain literals are stored with the `xsd:string` datatype.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Literal {
    pub value: String,
    pub datatype: String,
    pub language: Option<String>,
}

/// A node of a graph: IRI, blank node or literal
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Term {
    Iri(String),
    Blank(String),
    Literal(Literal),
}

impl Term {
    pub fn iri(iri: impl Into<String>) -> Self {
        Term::Iri(iri.into())
    }

    pub fn blank(label: impl Into<String>) -> Self {
        Term::Blank(label.into())
    }

    /// A blank node with a label that cannot collide with labels already in a graph
    pub fn fresh_blank() -> Self {
        Term::Blank(format!("b{}", uuid::Uuid::new_v4().simple()))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Term::Literal(Literal {
            value: value.into(),
            datatype: xsd::STRING.to_string(),
            language: None,
        })
    }

    pub fn typed(value: impl Into<String>, datatype: impl Into<String>) -> Self {
        Term::Literal(Literal {
            value: value.into(),
            datatype: datatype.into(),
            language: None,
        })
    }

    pub fn lang_string(value: impl Into<String>, language: impl Into<String>) -> Self {
        Term::Literal(Literal {
            value: value.into(),
            datatype: rdf::LANG_STRING.to_string(),
            language: Some(language.into()),
        })
    }

    pub fn as_iri(&self) -> Option<&str> {
        match self {
            Term::Iri(iri) => Some(iri),
            _ => None,
        }
    }

    /// Lexical value of a literal
    pub fn as_literal(&self) -> Option<&str> {
        match self {
            Term::Literal(lit) => Some(&lit.value),
            _ => None,
        }
    }

    pub fn is_iri(&self, iri: &str) -> bool {
        matches!(self, Term::Iri(own) if own == iri)
    }
}

impl fmt::Display for Term {
    /// N-Triples form, which is also valid inside SPARQL Update data blocks
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Iri(iri) => write!(f, "<{}>", escape_iri(iri)),
            Term::Blank(label) => write!(f, "_:{}", label),
            Term::Literal(lit) => {
                write!(f, "\"{}\"", escape_literal(&lit.value))?;
                if let Some(lang) = &lit.language {
                    write!(f, "@{}", lang)
                } else {
                    write!(f, "^^<{}>", escape_iri(&lit.datatype))
                }
            }
        }
    }
}

/// Percent-encode the characters an IRI reference may not contain, so a
/// stored IRI always writes out as a single term
fn escape_iri(iri: &str) -> Cow<'_, str> {
    let forbidden = |c: char| {
        c <= ' ' || matches!(c, '<' | '>' | '"' | '{' | '}' | '|' | '^' | '`' | '\\' | '\u{7f}')
    };
    if !iri.contains(forbidden) {
        return Cow::Borrowed(iri);
    }

    let mut escaped = String::with_capacity(iri.len() + 8);
    for c in iri.chars() {
        if forbidden(c) {
            escaped.push_str(percent_encode_byte(c as u8));
        } else {
            escaped.push(c);
        }
    }
    Cow::Owned(escaped)
}

fn escape_literal(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Triple {
    pub subject: Term,
    pub predicate: Term,
    pub object: Term,
}

impl Triple {
    pub fn new(subject: Term, predicate: &str, object: Term) -> Self {
        Self {
            subject,
            predicate: Term::iri(predicate),
            object,
        }
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} .", self.subject, self.predicate, self.object)
    }
}

/// An in-memory set of triples, the local view of one pod document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Graph {
    triples: BTreeSet<Triple>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    pub fn insert(&mut self, triple: Triple) -> bool {
        self.triples.insert(triple)
    }

    pub fn remove(&mut self, triple: &Triple) -> bool {
        self.triples.remove(triple)
    }

    pub fn contains(&self, triple: &Triple) -> bool {
        self.triples.contains(triple)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Triple> {
        self.triples.iter()
    }

    /// First object of `subject predicate ?o`
    pub fn value(&self, subject: &Term, predicate: &str) -> Option<&Term> {
        self.objects(subject, predicate).next()
    }

    pub fn objects<'a, 'b>(
        &'a self,
        subject: &'b Term,
        predicate: &'b str,
    ) -> impl Iterator<Item = &'a Term> + 'b
    where
        'a: 'b,
    {
        self.triples
            .iter()
            .filter(move |t| &t.subject == subject && t.predicate.is_iri(predicate))
            .map(|t| &t.object)
    }

    /// First subject of `?s predicate object`
    pub fn subject_of(&self, predicate: &str, object: &Term) -> Option<&Term> {
        self.subjects(predicate, object).next()
    }

    pub fn subjects<'a, 'b>(
        &'a self,
        predicate: &'b str,
        object: &'b Term,
    ) -> impl Iterator<Item = &'a Term> + 'b
    where
        'a: 'b,
    {
        self.triples
            .iter()
            .filter(move |t| &t.object == object && t.predicate.is_iri(predicate))
            .map(|t| &t.subject)
    }

    /// Serialize as N-Triples, one statement per line
    pub fn to_ntriples(&self) -> String {
        self.triples
            .iter()
            .map(|t| format!("{}\n", t))
            .collect()
    }
}

impl FromIterator<Triple> for Graph {
    fn from_iter<I: IntoIterator<Item = Triple>>(iter: I) -> Self {
        Self {
            triples: iter.into_iter().collect(),
        }
    }
}

impl Extend<Triple> for Graph {
    fn extend<I: IntoIterator<Item = Triple>>(&mut self, iter: I) {
        self.triples.extend(iter)
    }
}

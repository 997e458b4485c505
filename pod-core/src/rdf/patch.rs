// pod-core/src/rdf/patch.rs
use std::collections::HashMap;
use std::fmt;

use super::graph::{Graph, Term, Triple};

/// A position in a triple pattern: either a concrete term or a `?variable`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternTerm {
    Term(Term),
    Var(String),
}

impl PatternTerm {
    pub fn var(name: impl Into<String>) -> Self {
        PatternTerm::Var(name.into())
    }
}

impl From<Term> for PatternTerm {
    fn from(term: Term) -> Self {
        PatternTerm::Term(term)
    }
}

impl fmt::Display for PatternTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternTerm::Term(term) => write!(f, "{}", term),
            PatternTerm::Var(name) => write!(f, "?{}", name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriplePattern {
    pub subject: PatternTerm,
    pub predicate: PatternTerm,
    pub object: PatternTerm,
}

impl TriplePattern {
    pub fn new(
        subject: impl Into<PatternTerm>,
        predicate: &str,
        object: impl Into<PatternTerm>,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: PatternTerm::Term(Term::iri(predicate)),
            object: object.into(),
        }
    }

    fn instantiate(&self, bindings: &Bindings) -> Option<Triple> {
        Some(Triple {
            subject: resolve(&self.subject, bindings)?,
            predicate: resolve(&self.predicate, bindings)?,
            object: resolve(&self.object, bindings)?,
        })
    }
}

impl From<Triple> for TriplePattern {
    fn from(triple: Triple) -> Self {
        Self {
            subject: PatternTerm::Term(triple.subject),
            predicate: PatternTerm::Term(triple.predicate),
            object: PatternTerm::Term(triple.object),
        }
    }
}

impl fmt::Display for TriplePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} .", self.subject, self.predicate, self.object)
    }
}

type Bindings = HashMap<String, Term>;

fn resolve(pattern: &PatternTerm, bindings: &Bindings) -> Option<Term> {
    match pattern {
        PatternTerm::Term(term) => Some(term.clone()),
        PatternTerm::Var(name) => bindings.get(name).cloned(),
    }
}

fn unify(pattern: &PatternTerm, term: &Term, bindings: &mut Bindings) -> bool {
    match pattern {
        PatternTerm::Term(expected) => expected == term,
        PatternTerm::Var(name) => match bindings.get(name) {
            Some(bound) => bound == term,
            None => {
                bindings.insert(name.clone(), term.clone());
                true
            }
        },
    }
}

/// An incremental update of one pod document.
///
/// Without conditions the patch is plain data (`DELETE DATA` / `INSERT DATA`).
/// With conditions it becomes `DELETE {..} INSERT {..} WHERE {..}`: the templates
/// are instantiated once per solution of the `WHERE` patterns, and a patch whose
/// conditions match nothing changes nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Patch {
    pub delete: Vec<TriplePattern>,
    pub insert: Vec<TriplePattern>,
    pub conditions: Vec<TriplePattern>,
}

impl Patch {
    pub fn insert_data(triples: impl IntoIterator<Item = Triple>) -> Self {
        Self {
            insert: triples.into_iter().map(TriplePattern::from).collect(),
            ..Self::default()
        }
    }

    /// Remove `delete` and add `insert` in a single request
    pub fn replace_data(
        delete: impl IntoIterator<Item = Triple>,
        insert: impl IntoIterator<Item = Triple>,
    ) -> Self {
        Self {
            delete: delete.into_iter().map(TriplePattern::from).collect(),
            insert: insert.into_iter().map(TriplePattern::from).collect(),
            conditions: Vec::new(),
        }
    }

    pub fn conditional(
        delete: Vec<TriplePattern>,
        insert: Vec<TriplePattern>,
        conditions: Vec<TriplePattern>,
    ) -> Self {
        Self {
            delete,
            insert,
            conditions,
        }
    }

    pub fn is_conditional(&self) -> bool {
        !self.conditions.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.delete.is_empty() && self.insert.is_empty()
    }

    /// Render as a SPARQL Update request body
    pub fn to_sparql(&self) -> String {
        if self.is_conditional() {
            let mut sparql = String::new();
            if !self.delete.is_empty() {
                sparql.push_str(&block("DELETE", &self.delete));
                sparql.push('\n');
            }
            if !self.insert.is_empty() {
                sparql.push_str(&block("INSERT", &self.insert));
                sparql.push('\n');
            }
            sparql.push_str(&block("WHERE", &self.conditions));
            sparql
        } else {
            let mut parts = Vec::new();
            if !self.delete.is_empty() {
                parts.push(block("DELETE DATA", &self.delete));
            }
            if !self.insert.is_empty() {
                parts.push(block("INSERT DATA", &self.insert));
            }
            parts.join(" ;\n")
        }
    }

    /// Apply to a local graph and return the number of `WHERE` solutions
    /// (1 for an unconditional patch)
    pub fn apply(&self, graph: &mut Graph) -> usize {
        let solutions = self.solutions(graph);

        let mut removals = Vec::new();
        let mut additions = Vec::new();
        for bindings in &solutions {
            removals.extend(self.delete.iter().filter_map(|p| p.instantiate(bindings)));
            additions.extend(self.insert.iter().filter_map(|p| p.instantiate(bindings)));
        }

        for triple in &removals {
            graph.remove(triple);
        }
        graph.extend(additions);

        solutions.len()
    }

    fn solutions(&self, graph: &Graph) -> Vec<Bindings> {
        let mut solutions = vec![Bindings::new()];
        for pattern in &self.conditions {
            let mut next = Vec::new();
            for bindings in &solutions {
                for triple in graph.iter() {
                    let mut candidate = bindings.clone();
                    if unify(&pattern.subject, &triple.subject, &mut candidate)
                        && unify(&pattern.predicate, &triple.predicate, &mut candidate)
                        && unify(&pattern.object, &triple.object, &mut candidate)
                    {
                        next.push(candidate);
                    }
                }
            }
            solutions = next;
            if solutions.is_empty() {
                break;
            }
        }
        solutions
    }
}

fn block(keyword: &str, patterns: &[TriplePattern]) -> String {
    let body: Vec<String> = patterns.iter().map(|p| format!("  {}", p)).collect();
    format!("{} {{\n{}\n}}", keyword, body.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rdf::vocab::rdf;

    fn cell(label: &str) -> Term {
        Term::blank(label)
    }

    fn relink(new_cell: &Term) -> Patch {
        let end = PatternTerm::var("end");
        let nil = Term::iri(rdf::NIL);
        Patch::conditional(
            vec![TriplePattern::new(end.clone(), rdf::REST, nil.clone())],
            vec![
                TriplePattern::new(end.clone(), rdf::REST, new_cell.clone()),
                TriplePattern::new(new_cell.clone(), rdf::REST, nil.clone()),
            ],
            vec![TriplePattern::new(end, rdf::REST, nil)],
        )
    }

    #[test]
    fn test_insert_data_rendering() {
        let patch = Patch::insert_data(vec![Triple::new(
            Term::iri("https://alice.example/profile/card#me"),
            "http://www.w3.org/ns/pim/space#preferencesFile",
            Term::iri("https://alice.example/profile/preferences.ttl"),
        )]);
        assert_eq!(
            patch.to_sparql(),
            "INSERT DATA {\n  <https://alice.example/profile/card#me> \
             <http://www.w3.org/ns/pim/space#preferencesFile> \
             <https://alice.example/profile/preferences.ttl> .\n}"
        );
    }

    #[test]
    fn test_conditional_rendering() {
        let sparql = relink(&cell("c2")).to_sparql();
        assert!(sparql.starts_with("DELETE {\n  ?end <http://www.w3.org/1999/02/22-rdf-syntax-ns#rest>"));
        assert!(sparql.contains("INSERT {\n  ?end <http://www.w3.org/1999/02/22-rdf-syntax-ns#rest> _:c2 ."));
        assert!(sparql.contains(
            "WHERE {\n  ?end <http://www.w3.org/1999/02/22-rdf-syntax-ns#rest> \
             <http://www.w3.org/1999/02/22-rdf-syntax-ns#nil> .\n}"
        ));
    }

    #[test]
    fn test_replace_data_rendering() {
        let old = Triple::new(Term::iri("urn:a"), "urn:p", Term::iri("urn:old"));
        let new = Triple::new(Term::iri("urn:a"), "urn:p", Term::iri("urn:new"));
        assert_eq!(
            Patch::replace_data(vec![old], vec![new]).to_sparql(),
            "DELETE DATA {\n  <urn:a> <urn:p> <urn:old> .\n} ;\nINSERT DATA {\n  <urn:a> <urn:p> <urn:new> .\n}"
        );
    }

    #[test]
    fn test_relink_moves_the_tail() {
        let nil = Term::iri(rdf::NIL);
        let mut graph = Graph::new();
        graph.insert(Triple::new(cell("c1"), rdf::REST, nil.clone()));

        assert_eq!(relink(&cell("c2")).apply(&mut graph), 1);
        assert_eq!(graph.value(&cell("c1"), rdf::REST), Some(&cell("c2")));
        assert_eq!(graph.value(&cell("c2"), rdf::REST), Some(&nil));
        assert_eq!(graph.subjects(rdf::REST, &nil).count(), 1);
    }

    #[test]
    fn test_unmatched_conditions_change_nothing() {
        let mut graph = Graph::new();
        graph.insert(Triple::new(cell("c1"), rdf::FIRST, Term::string("x")));
        let before = graph.clone();

        assert_eq!(relink(&cell("c2")).apply(&mut graph), 0);
        assert_eq!(graph, before);
    }
}

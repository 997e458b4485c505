// pod-core/src/rdf/turtle.rs
use oxiri::Iri;
use rio_api::model;
use rio_api::parser::TriplesParser;
use rio_turtle::{TurtleError, TurtleParser};

use super::graph::{Graph, Literal, Term, Triple};
use super::vocab::xsd;
use super::RdfError;

/// Parse a Turtle document, resolving relative IRIs against `base`
pub fn parse_turtle(body: &str, base: &str) -> Result<Graph, RdfError> {
    let base_iri = match Iri::parse(base.to_string()) {
        Ok(iri) => Some(iri),
        Err(e) => {
            tracing::debug!("Ignoring unusable base IRI {}: {}", base, e);
            None
        }
    };

    let mut graph = Graph::new();
    let mut parser = TurtleParser::new(body.as_bytes(), base_iri);
    parser
        .parse_all(&mut |t: model::Triple<'_>| -> Result<(), TurtleError> {
            let subject = subject_term(&t.subject);
            let object = object_term(&t.object);
            if let (Some(subject), Some(object)) = (subject, object) {
                graph.insert(Triple {
                    subject,
                    predicate: Term::iri(t.predicate.iri),
                    object,
                });
            }
            Ok(())
        })
        .map_err(|e| RdfError::Syntax(e.to_string()))?;

    Ok(graph)
}

fn subject_term(subject: &model::Subject<'_>) -> Option<Term> {
    match subject {
        model::Subject::NamedNode(node) => Some(Term::iri(node.iri)),
        model::Subject::BlankNode(node) => Some(Term::blank(node.id)),
        // RDF-star statements never appear in the documents we manage
        #[allow(unreachable_patterns)]
        _ => None,
    }
}

fn object_term(object: &model::Term<'_>) -> Option<Term> {
    match object {
        model::Term::NamedNode(node) => Some(Term::iri(node.iri)),
        model::Term::BlankNode(node) => Some(Term::blank(node.id)),
        model::Term::Literal(literal) => literal_term(literal),
        #[allow(unreachable_patterns)]
        _ => None,
    }
}

fn literal_term(literal: &model::Literal<'_>) -> Option<Term> {
    match literal {
        model::Literal::Simple { value } => Some(Term::typed(*value, xsd::STRING)),
        model::Literal::LanguageTaggedString { value, language } => {
            Some(Term::lang_string(*value, *language))
        }
        model::Literal::Typed { value, datatype } => Some(Term::Literal(Literal {
            value: value.to_string(),
            datatype: datatype.iri.to_string(),
            language: None,
        })),
        #[allow(unreachable_patterns)]
        _ => None,
    }
}

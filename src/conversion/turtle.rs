//! Turtle and N-Triples codecs
//!
//! Thin bridges between the oxrdf quad model and the rio parser/formatter
//! toolkit. The codec functions are shared with the file and SPARQL
//! accessors, which persist and exchange Turtle.

use super::{RepresentationConverter, INTERNAL_QUADS, APPLICATION_N_TRIPLES, TEXT_TURTLE};
use crate::error::{StoreError, StoreResult};
use crate::model::Representation;
use async_trait::async_trait;
use oxrdf::{BlankNode, GraphName, Literal, NamedNode, Quad, Subject, Term};
use rio_api::formatter::TriplesFormatter;
use rio_api::parser::TriplesParser;
use rio_turtle::{NTriplesFormatter, TurtleFormatter, TurtleParser};
use std::io::{BufReader, Cursor};

/// Parse a Turtle document into default-graph quads.
///
/// `base` resolves relative IRIs; pass the resource identifier when parsing
/// client payloads.
pub(crate) fn parse_turtle(input: &str, base: Option<&str>) -> StoreResult<Vec<Quad>> {
    let base_iri = match base {
        Some(iri) => Some(
            oxiri::Iri::parse(iri.to_string())
                .map_err(|e| StoreError::InvalidInput(format!("invalid base IRI {}: {}", iri, e)))?,
        ),
        None => None,
    };

    let cursor = Cursor::new(input);
    let mut reader = BufReader::new(cursor);
    let mut parser = TurtleParser::new(&mut reader, base_iri);

    let mut quads = Vec::new();
    let res: Result<(), rio_turtle::TurtleError> = parser.parse_all(&mut |t| {
        let subject = convert_subject(t.subject)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        let predicate = NamedNode::new(t.predicate.iri)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        let object = convert_object(t.object)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;

        quads.push(Quad::new(subject, predicate, object, GraphName::DefaultGraph));
        Ok(())
    });

    match res {
        Ok(_) => Ok(quads),
        Err(e) => Err(StoreError::InvalidInput(format!("turtle parse error: {}", e))),
    }
}

/// Serialize quads to Turtle. Graph names are dropped; callers only hand
/// default-graph quads to this codec.
pub(crate) fn serialize_turtle(quads: &[Quad]) -> StoreResult<String> {
    let mut output = Vec::new();
    let mut formatter = TurtleFormatter::new(&mut output);
    for quad in quads {
        formatter
            .format(&rio_triple(quad)?)
            .map_err(|e| StoreError::Backend(format!("turtle serialization: {}", e)))?;
    }
    formatter
        .finish()
        .map_err(|e| StoreError::Backend(format!("turtle serialization: {}", e)))?;

    String::from_utf8(output).map_err(|e| StoreError::Backend(e.to_string()))
}

/// Serialize quads to N-Triples
pub(crate) fn serialize_ntriples(quads: &[Quad]) -> StoreResult<String> {
    let mut output = Vec::new();
    let mut formatter = NTriplesFormatter::new(&mut output);
    for quad in quads {
        formatter
            .format(&rio_triple(quad)?)
            .map_err(|e| StoreError::Backend(format!("n-triples serialization: {}", e)))?;
    }
    formatter
        .finish()
        .map_err(|e| StoreError::Backend(format!("n-triples serialization: {}", e)))?;

    String::from_utf8(output).map_err(|e| StoreError::Backend(e.to_string()))
}

fn rio_triple(quad: &Quad) -> StoreResult<rio_api::model::Triple<'_>> {
    let subject = match &quad.subject {
        Subject::NamedNode(n) => {
            rio_api::model::Subject::NamedNode(rio_api::model::NamedNode { iri: n.as_str() })
        }
        Subject::BlankNode(b) => {
            rio_api::model::Subject::BlankNode(rio_api::model::BlankNode { id: b.as_str() })
        }
        #[allow(unreachable_patterns)]
        _ => {
            return Err(StoreError::Backend(
                "RDF-star subjects are not supported".to_string(),
            ))
        }
    };

    let predicate = rio_api::model::NamedNode {
        iri: quad.predicate.as_str(),
    };

    let object = match &quad.object {
        Term::NamedNode(n) => {
            rio_api::model::Term::NamedNode(rio_api::model::NamedNode { iri: n.as_str() })
        }
        Term::BlankNode(b) => {
            rio_api::model::Term::BlankNode(rio_api::model::BlankNode { id: b.as_str() })
        }
        Term::Literal(l) => {
            if let Some(language) = l.language() {
                rio_api::model::Term::Literal(rio_api::model::Literal::LanguageTaggedString {
                    value: l.value(),
                    language,
                })
            } else if l.datatype().as_str() == "http://www.w3.org/2001/XMLSchema#string" {
                rio_api::model::Term::Literal(rio_api::model::Literal::Simple { value: l.value() })
            } else {
                rio_api::model::Term::Literal(rio_api::model::Literal::Typed {
                    value: l.value(),
                    datatype: rio_api::model::NamedNode {
                        iri: l.datatype().as_str(),
                    },
                })
            }
        }
        #[allow(unreachable_patterns)]
        _ => {
            return Err(StoreError::Backend(
                "RDF-star objects are not supported".to_string(),
            ))
        }
    };

    Ok(rio_api::model::Triple {
        subject,
        predicate,
        object,
    })
}

fn convert_subject(s: rio_api::model::Subject) -> StoreResult<Subject> {
    match s {
        rio_api::model::Subject::NamedNode(n) => NamedNode::new(n.iri)
            .map(Subject::NamedNode)
            .map_err(|e| StoreError::InvalidInput(e.to_string())),
        rio_api::model::Subject::BlankNode(b) => BlankNode::new(b.id)
            .map(Subject::BlankNode)
            .map_err(|e| StoreError::InvalidInput(e.to_string())),
        _ => Err(StoreError::InvalidInput(
            "unsupported subject term".to_string(),
        )),
    }
}

fn convert_object(o: rio_api::model::Term) -> StoreResult<Term> {
    match o {
        rio_api::model::Term::NamedNode(n) => NamedNode::new(n.iri)
            .map(Term::NamedNode)
            .map_err(|e| StoreError::InvalidInput(e.to_string())),
        rio_api::model::Term::BlankNode(b) => BlankNode::new(b.id)
            .map(Term::BlankNode)
            .map_err(|e| StoreError::InvalidInput(e.to_string())),
        rio_api::model::Term::Literal(l) => match l {
            rio_api::model::Literal::Simple { value } => {
                Ok(Term::Literal(Literal::new_simple_literal(value)))
            }
            rio_api::model::Literal::LanguageTaggedString { value, language } => {
                Literal::new_language_tagged_literal(value, language)
                    .map(Term::Literal)
                    .map_err(|e| StoreError::InvalidInput(e.to_string()))
            }
            rio_api::model::Literal::Typed { value, datatype } => {
                let dt = NamedNode::new(datatype.iri)
                    .map_err(|e| StoreError::InvalidInput(e.to_string()))?;
                Ok(Term::Literal(Literal::new_typed_literal(value, dt)))
            }
        },
        _ => Err(StoreError::InvalidInput(
            "unsupported object term".to_string(),
        )),
    }
}

/// `text/turtle` → `internal/quads`
pub struct TurtleToQuadsConverter;

#[async_trait]
impl RepresentationConverter for TurtleToQuadsConverter {
    fn supports(&self, source: &str, target: &str) -> bool {
        source == TEXT_TURTLE && target == INTERNAL_QUADS
    }

    async fn convert(&self, mut representation: Representation) -> StoreResult<Representation> {
        let base = representation.metadata.identifier().as_str().to_string();
        let bytes = representation.data.consume()?.into_bytes().await?;
        let text = std::str::from_utf8(&bytes)
            .map_err(|e| StoreError::InvalidInput(format!("turtle payload is not UTF-8: {}", e)))?;

        let quads = parse_turtle(text, Some(&base))?;
        let mut metadata = representation.metadata;
        metadata.set_content_type(INTERNAL_QUADS);
        Ok(Representation::quads(metadata, quads))
    }
}

/// `internal/quads` → `text/turtle`
pub struct QuadsToTurtleConverter;

#[async_trait]
impl RepresentationConverter for QuadsToTurtleConverter {
    fn supports(&self, source: &str, target: &str) -> bool {
        source == INTERNAL_QUADS && target == TEXT_TURTLE
    }

    async fn convert(&self, mut representation: Representation) -> StoreResult<Representation> {
        let quads = representation.data.consume()?.into_quads()?;
        let text = serialize_turtle(&quads)?;

        let mut metadata = representation.metadata;
        metadata.set_content_type(TEXT_TURTLE);
        Ok(Representation::from_bytes(metadata, text.into_bytes()))
    }
}

/// `internal/quads` → `application/n-triples`
pub struct QuadsToNTriplesConverter;

#[async_trait]
impl RepresentationConverter for QuadsToNTriplesConverter {
    fn supports(&self, source: &str, target: &str) -> bool {
        source == INTERNAL_QUADS && target == APPLICATION_N_TRIPLES
    }

    async fn convert(&self, mut representation: Representation) -> StoreResult<Representation> {
        let quads = representation.data.consume()?.into_quads()?;
        let text = serialize_ntriples(&quads)?;

        let mut metadata = representation.metadata;
        metadata.set_content_type(APPLICATION_N_TRIPLES);
        Ok(Representation::from_bytes(metadata, text.into_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RepresentationMetadata, ResourceIdentifier};

    #[test]
    fn test_turtle_roundtrip() {
        let input = r#"<http://example.org/a> <http://example.org/b> "c" ."#;
        let quads = parse_turtle(input, None).unwrap();
        assert_eq!(quads.len(), 1);

        let output = serialize_turtle(&quads).unwrap();
        assert!(output.contains("http://example.org/a"));
        assert!(output.contains("\"c\""));
    }

    #[test]
    fn test_parse_resolves_relative_iris() {
        let input = r#"<> <http://example.org/b> <other> ."#;
        let quads = parse_turtle(input, Some("http://x/doc")).unwrap();

        match &quads[0].subject {
            Subject::NamedNode(n) => assert_eq!(n.as_str(), "http://x/doc"),
            other => panic!("unexpected subject {:?}", other),
        }
    }

    #[test]
    fn test_parse_error_is_client_error() {
        let err = parse_turtle("this is not turtle", None).unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[tokio::test]
    async fn test_converter_pair() {
        let id = ResourceIdentifier::new("http://x/doc");
        let mut metadata = RepresentationMetadata::new(&id);
        metadata.set_content_type(TEXT_TURTLE);
        let rep = Representation::from_bytes(
            metadata,
            br#"<http://x/doc> <http://example.org/b> "v" ."#.to_vec(),
        );

        let quads_rep = TurtleToQuadsConverter.convert(rep).await.unwrap();
        assert_eq!(
            quads_rep.metadata.content_type().as_deref(),
            Some(INTERNAL_QUADS)
        );

        let mut back = QuadsToTurtleConverter.convert(quads_rep).await.unwrap();
        let bytes = back.data.consume().unwrap().into_bytes().await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("http://x/doc"));
    }
}

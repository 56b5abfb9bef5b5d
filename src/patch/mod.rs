//! SPARQL Update patches
//!
//! Parses a SPARQL 1.1 Update document and applies its algebra to an
//! in-memory quad set. Supported operations: `INSERT DATA`, `DELETE DATA`,
//! and `DELETE`/`INSERT ... WHERE` over a basic graph pattern. Application
//! is all-or-nothing from the caller's point of view: the patch operates on
//! a scratch copy that only replaces the resource after full success.

use crate::error::{StoreError, StoreResult};
use oxrdf::{BlankNode, GraphName, NamedNode, Quad, Subject, Term};
use spargebra::algebra::GraphPattern;
use spargebra::GraphUpdateOperation;
use spargebra::term::{
    GroundQuadPattern, GroundSubject, GroundTerm, GroundTermPattern, NamedNodePattern,
    QuadPattern, TermPattern, TriplePattern,
};
use std::collections::HashMap;

/// A parsed SPARQL Update patch
#[derive(Debug, Clone)]
pub struct SparqlUpdatePatch {
    text: String,
    update: spargebra::Update,
}

type Binding = HashMap<String, Term>;

impl SparqlUpdatePatch {
    /// Parse an `application/sparql-update` document.
    ///
    /// Syntax errors are client errors, never server faults.
    pub fn parse(text: &str) -> StoreResult<Self> {
        let update = spargebra::Update::parse(text, None)
            .map_err(|e| StoreError::InvalidInput(format!("invalid SPARQL update: {}", e)))?;
        Ok(Self {
            text: text.to_string(),
            update,
        })
    }

    /// The original update document
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Whether every operation only inserts ground data. Such a patch may
    /// create its target when it does not exist yet.
    pub fn is_insert_only(&self) -> bool {
        self.update
            .operations
            .iter()
            .all(|op| matches!(op, GraphUpdateOperation::InsertData { .. }))
    }

    /// Apply all operations to a quad set, in document order
    pub fn apply(&self, quads: &mut Vec<Quad>) -> StoreResult<()> {
        for operation in &self.update.operations {
            match operation {
                GraphUpdateOperation::InsertData { data } => {
                    for quad in data {
                        require_default_graph(&quad.graph_name)?;
                        let quad = Quad::new(
                            quad.subject.clone(),
                            quad.predicate.clone(),
                            quad.object.clone(),
                            GraphName::DefaultGraph,
                        );
                        if !quads.contains(&quad) {
                            quads.push(quad);
                        }
                    }
                }
                GraphUpdateOperation::DeleteData { data } => {
                    // DELETE DATA does not tolerate missing triples
                    for ground in data {
                        require_default_graph(&ground.graph_name)?;
                        let quad = ground_quad(ground)?;
                        let before = quads.len();
                        quads.retain(|q| q != &quad);
                        if quads.len() == before {
                            return Err(StoreError::conflict(
                                quad.subject.to_string(),
                                "patch deletes a triple that does not exist",
                            ));
                        }
                    }
                }
                GraphUpdateOperation::DeleteInsert {
                    delete,
                    insert,
                    pattern,
                    ..
                } => {
                    let bindings = solve_pattern(quads, pattern)?;
                    for binding in &bindings {
                        for template in delete {
                            let quad = instantiate_ground_pattern(template, binding)?;
                            quads.retain(|q| q != &quad);
                        }
                    }
                    for binding in &bindings {
                        for template in insert {
                            let quad = instantiate_pattern(template, binding)?;
                            if !quads.contains(&quad) {
                                quads.push(quad);
                            }
                        }
                    }
                }
                _ => {
                    return Err(StoreError::InvalidInput(
                        "only INSERT DATA, DELETE DATA and DELETE/INSERT WHERE are supported"
                            .to_string(),
                    ))
                }
            }
        }
        Ok(())
    }
}

fn require_default_graph(graph: &spargebra::term::GraphName) -> StoreResult<()> {
    if *graph == spargebra::term::GraphName::DefaultGraph {
        Ok(())
    } else {
        Err(StoreError::InvalidInput(format!(
            "patches may only touch the default graph, found {}",
            graph
        )))
    }
}

fn ground_quad(ground: &spargebra::term::GroundQuad) -> StoreResult<Quad> {
    let subject = match &ground.subject {
        GroundSubject::NamedNode(n) => Subject::NamedNode(n.clone()),
        #[allow(unreachable_patterns)]
        _ => {
            return Err(StoreError::InvalidInput(
                "RDF-star subjects are not supported in patches".to_string(),
            ))
        }
    };
    let object = match &ground.object {
        GroundTerm::NamedNode(n) => Term::NamedNode(n.clone()),
        GroundTerm::Literal(l) => Term::Literal(l.clone()),
        #[allow(unreachable_patterns)]
        _ => {
            return Err(StoreError::InvalidInput(
                "RDF-star objects are not supported in patches".to_string(),
            ))
        }
    };
    Ok(Quad::new(
        subject,
        ground.predicate.clone(),
        object,
        GraphName::DefaultGraph,
    ))
}

/// Solve a WHERE clause against the quad set. Only basic graph patterns
/// are supported; anything richer is rejected as unsupported algebra.
fn solve_pattern(quads: &[Quad], pattern: &GraphPattern) -> StoreResult<Vec<Binding>> {
    let GraphPattern::Bgp { patterns } = pattern else {
        return Err(StoreError::InvalidInput(
            "only basic graph patterns are supported in WHERE clauses".to_string(),
        ));
    };

    let mut bindings: Vec<Binding> = vec![HashMap::new()];
    for triple_pattern in patterns {
        let mut extended = Vec::new();
        for binding in &bindings {
            for quad in quads {
                if let Some(next) = match_triple(binding, triple_pattern, quad) {
                    extended.push(next);
                }
            }
        }
        bindings = extended;
        if bindings.is_empty() {
            break;
        }
    }
    Ok(bindings)
}

fn match_triple(binding: &Binding, pattern: &TriplePattern, quad: &Quad) -> Option<Binding> {
    let mut next = binding.clone();

    let subject_term = match &quad.subject {
        Subject::NamedNode(n) => Term::NamedNode(n.clone()),
        Subject::BlankNode(b) => Term::BlankNode(b.clone()),
        #[allow(unreachable_patterns)]
        _ => return None,
    };
    match_term(&mut next, &pattern.subject, &subject_term)?;

    match &pattern.predicate {
        NamedNodePattern::NamedNode(n) => {
            if n != &quad.predicate {
                return None;
            }
        }
        NamedNodePattern::Variable(v) => {
            bind(&mut next, v.as_str(), &Term::NamedNode(quad.predicate.clone()))?;
        }
    }

    match_term(&mut next, &pattern.object, &quad.object)?;
    Some(next)
}

fn match_term(binding: &mut Binding, pattern: &TermPattern, term: &Term) -> Option<()> {
    match pattern {
        TermPattern::NamedNode(n) => match term {
            Term::NamedNode(other) if other == n => Some(()),
            _ => None,
        },
        TermPattern::Literal(l) => match term {
            Term::Literal(other) if other == l => Some(()),
            _ => None,
        },
        // Blank nodes in a WHERE clause scope like variables
        TermPattern::BlankNode(b) => bind(binding, &format!("_:{}", b.as_str()), term),
        TermPattern::Variable(v) => bind(binding, v.as_str(), term),
        #[allow(unreachable_patterns)]
        _ => None,
    }
}

fn bind(binding: &mut Binding, key: &str, term: &Term) -> Option<()> {
    match binding.get(key) {
        Some(existing) if existing == term => Some(()),
        Some(_) => None,
        None => {
            binding.insert(key.to_string(), term.clone());
            Some(())
        }
    }
}

fn instantiate_ground_pattern(
    template: &GroundQuadPattern,
    binding: &Binding,
) -> StoreResult<Quad> {
    graph_pattern_is_default(&template.graph_name)?;
    let subject = match resolve_ground_term(&template.subject, binding)? {
        Term::NamedNode(n) => Subject::NamedNode(n),
        Term::BlankNode(b) => Subject::BlankNode(b),
        other => {
            return Err(StoreError::InvalidInput(format!(
                "{} cannot be a subject",
                other
            )))
        }
    };
    let predicate = resolve_named(&template.predicate, binding)?;
    let object = resolve_ground_term(&template.object, binding)?;
    Ok(Quad::new(subject, predicate, object, GraphName::DefaultGraph))
}

fn instantiate_pattern(template: &QuadPattern, binding: &Binding) -> StoreResult<Quad> {
    graph_pattern_is_default(&template.graph_name)?;
    let subject = match resolve_term(&template.subject, binding)? {
        Term::NamedNode(n) => Subject::NamedNode(n),
        Term::BlankNode(b) => Subject::BlankNode(b),
        other => {
            return Err(StoreError::InvalidInput(format!(
                "{} cannot be a subject",
                other
            )))
        }
    };
    let predicate = resolve_named(&template.predicate, binding)?;
    let object = resolve_term(&template.object, binding)?;
    Ok(Quad::new(subject, predicate, object, GraphName::DefaultGraph))
}

fn graph_pattern_is_default(pattern: &spargebra::term::GraphNamePattern) -> StoreResult<()> {
    match pattern {
        spargebra::term::GraphNamePattern::DefaultGraph => Ok(()),
        _ => Err(StoreError::InvalidInput(
            "patches may only touch the default graph".to_string(),
        )),
    }
}

fn resolve_term(pattern: &TermPattern, binding: &Binding) -> StoreResult<Term> {
    match pattern {
        TermPattern::NamedNode(n) => Ok(Term::NamedNode(n.clone())),
        TermPattern::Literal(l) => Ok(Term::Literal(l.clone())),
        // A blank node in an INSERT template mints a fresh node per binding
        TermPattern::BlankNode(_) => Ok(Term::BlankNode(BlankNode::default())),
        TermPattern::Variable(v) => lookup(binding, v.as_str()),
        #[allow(unreachable_patterns)]
        _ => Err(StoreError::InvalidInput(
            "RDF-star terms are not supported in patches".to_string(),
        )),
    }
}

fn resolve_ground_term(pattern: &GroundTermPattern, binding: &Binding) -> StoreResult<Term> {
    match pattern {
        GroundTermPattern::NamedNode(n) => Ok(Term::NamedNode(n.clone())),
        GroundTermPattern::Literal(l) => Ok(Term::Literal(l.clone())),
        GroundTermPattern::Variable(v) => lookup(binding, v.as_str()),
        #[allow(unreachable_patterns)]
        _ => Err(StoreError::InvalidInput(
            "RDF-star terms are not supported in patches".to_string(),
        )),
    }
}

fn resolve_named(pattern: &NamedNodePattern, binding: &Binding) -> StoreResult<NamedNode> {
    match pattern {
        NamedNodePattern::NamedNode(n) => Ok(n.clone()),
        NamedNodePattern::Variable(v) => match lookup(binding, v.as_str())? {
            Term::NamedNode(n) => Ok(n),
            other => Err(StoreError::InvalidInput(format!(
                "{} cannot be a predicate",
                other
            ))),
        },
    }
}

fn lookup(binding: &Binding, key: &str) -> StoreResult<Term> {
    binding.get(key).cloned().ok_or_else(|| {
        StoreError::InvalidInput(format!("unbound variable ?{} in update template", key))
    })
}

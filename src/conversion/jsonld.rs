//! JSON-LD serialization (expanded form)

use super::{RepresentationConverter, APPLICATION_LD_JSON, INTERNAL_QUADS};
use crate::error::{StoreError, StoreResult};
use crate::model::Representation;
use async_trait::async_trait;
use oxrdf::{Quad, Subject, Term};
use serde_json::{json, Value};
use std::collections::HashMap;

/// `internal/quads` → `application/ld+json`, emitting the expanded form.
///
/// Parsing JSON-LD back into quads would need a full expansion/compaction
/// processor; only the outbound direction is offered here.
pub struct QuadsToJsonLdConverter;

fn serialize(quads: &[Quad]) -> StoreResult<String> {
    // Group objects by subject, then by predicate
    let mut map: HashMap<String, HashMap<String, Vec<Value>>> = HashMap::new();

    for quad in quads {
        let s_key = match &quad.subject {
            Subject::NamedNode(n) => n.as_str().to_string(),
            Subject::BlankNode(b) => format!("_:{}", b.as_str()),
            #[allow(unreachable_patterns)]
            _ => {
                return Err(StoreError::Backend(
                    "RDF-star subjects are not supported".to_string(),
                ))
            }
        };

        let p_key = quad.predicate.as_str().to_string();

        let o_val = match &quad.object {
            Term::NamedNode(n) => json!({ "@id": n.as_str() }),
            Term::BlankNode(b) => json!({ "@id": format!("_:{}", b.as_str()) }),
            Term::Literal(l) => {
                if let Some(lang) = l.language() {
                    json!({ "@value": l.value(), "@language": lang })
                } else if l.datatype().as_str() == "http://www.w3.org/2001/XMLSchema#string" {
                    json!({ "@value": l.value() })
                } else {
                    json!({ "@value": l.value(), "@type": l.datatype().as_str() })
                }
            }
            #[allow(unreachable_patterns)]
            _ => {
                return Err(StoreError::Backend(
                    "RDF-star objects are not supported".to_string(),
                ))
            }
        };

        map.entry(s_key).or_default().entry(p_key).or_default().push(o_val);
    }

    let mut output = Vec::new();
    for (subject, props) in map {
        let mut node = json!({ "@id": subject });
        for (pred, objs) in props {
            node.as_object_mut().unwrap().insert(pred, json!(objs));
        }
        output.push(node);
    }

    serde_json::to_string_pretty(&output).map_err(|e| StoreError::Backend(e.to_string()))
}

#[async_trait]
impl RepresentationConverter for QuadsToJsonLdConverter {
    fn supports(&self, source: &str, target: &str) -> bool {
        source == INTERNAL_QUADS && target == APPLICATION_LD_JSON
    }

    async fn convert(&self, mut representation: Representation) -> StoreResult<Representation> {
        let quads = representation.data.consume()?.into_quads()?;
        let text = serialize(&quads)?;

        let mut metadata = representation.metadata;
        metadata.set_content_type(APPLICATION_LD_JSON);
        Ok(Representation::from_bytes(metadata, text.into_bytes()))
    }
}

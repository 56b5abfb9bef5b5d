//! SPARQL data accessor
//!
//! Every resource's data lives in a named graph equal to its own IRI and
//! its metadata in a second graph `meta:<iri>`. A container's containment
//! triples live in the parent's data graph, so overwriting a child never
//! disturbs the parent's listing. Each write or delete is submitted as one
//! SPARQL Update request; partial application is the endpoint's own
//! transactional responsibility.

use super::{persistable_quads, DataAccessor};
use crate::conversion::turtle::parse_turtle;
use crate::conversion::INTERNAL_QUADS;
use crate::error::{StoreError, StoreResult};
use crate::model::vocab;
use crate::model::{DataPayload, Representation, RepresentationMetadata, ResourceIdentifier};
use async_trait::async_trait;
use oxrdf::{GraphName, NamedNode, Quad, Term};
use std::time::Duration;
use tracing::{debug, info};

/// Data accessor over a SPARQL 1.1 endpoint
pub struct SparqlDataAccessor {
    endpoint: String,
    base_url: ResourceIdentifier,
    client: reqwest::Client,
}

fn iri(value: &str) -> String {
    format!("<{}>", value)
}

/// The metadata graph paired with a resource graph
fn meta_graph(identifier: &ResourceIdentifier) -> String {
    format!("meta:{}", identifier)
}

/// Render quads as a triple block for INSERT DATA
fn triple_block(quads: &[Quad]) -> String {
    quads
        .iter()
        .map(|q| format!("{} {} {} .", q.subject, q.predicate, q.object))
        .collect::<Vec<_>>()
        .join("\n")
}

impl SparqlDataAccessor {
    /// Create an accessor for a base IRI against an endpoint URL
    pub fn new(endpoint: impl Into<String>, base_url: impl Into<String>) -> StoreResult<Self> {
        let mut base = base_url.into();
        if !base.ends_with('/') {
            base.push('/');
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            endpoint: endpoint.into(),
            base_url: ResourceIdentifier::new(base),
            client,
        })
    }

    fn is_root(&self, identifier: &ResourceIdentifier) -> bool {
        identifier == &self.base_url
    }

    fn check_in_base(&self, identifier: &ResourceIdentifier) -> StoreResult<()> {
        if identifier.relative_to(&self.base_url).is_none() {
            return Err(StoreError::NotFound(identifier.to_string()));
        }
        Ok(())
    }

    // Query and update builders, kept separate so the wire contract is
    // testable without an endpoint.

    fn graph_construct(graph: &str) -> String {
        format!(
            "CONSTRUCT {{ ?s ?p ?o }} WHERE {{ GRAPH {} {{ ?s ?p ?o }} }}",
            iri(graph)
        )
    }

    fn container_metadata_construct(identifier: &ResourceIdentifier) -> String {
        format!(
            "CONSTRUCT {{ ?s ?p ?o }} WHERE {{ {{ GRAPH {} {{ ?s ?p ?o }} }} UNION {{ GRAPH {} {{ ?s ?p ?o }} }} }}",
            iri(identifier.as_str()),
            iri(&meta_graph(identifier))
        )
    }

    fn exists_ask(identifier: &ResourceIdentifier) -> String {
        let mut clauses = vec![
            format!("{{ GRAPH {} {{ ?s ?p ?o }} }}", iri(identifier.as_str())),
            format!("{{ GRAPH {} {{ ?s ?p ?o }} }}", iri(&meta_graph(identifier))),
        ];
        if let Some(parent) = identifier.parent() {
            clauses.push(format!(
                "{{ GRAPH {} {{ {} {} {} }} }}",
                iri(parent.as_str()),
                iri(parent.as_str()),
                iri(vocab::ldp::CONTAINS.as_str()),
                iri(identifier.as_str()),
            ));
        }
        format!("ASK {{ {} }}", clauses.join(" UNION "))
    }

    fn children_construct(identifier: &ResourceIdentifier) -> String {
        format!(
            "CONSTRUCT {{ {id} {contains} ?child }} WHERE {{ GRAPH {id} {{ {id} {contains} ?child }} }}",
            id = iri(identifier.as_str()),
            contains = iri(vocab::ldp::CONTAINS.as_str()),
        )
    }

    fn write_document_update(
        identifier: &ResourceIdentifier,
        parent: &ResourceIdentifier,
        data: &[Quad],
        metadata: &[Quad],
    ) -> String {
        format!(
            "DELETE WHERE {{ GRAPH {meta} {{ ?s ?p ?o }} }};\n\
             DELETE WHERE {{ GRAPH {id} {{ ?s ?p ?o }} }};\n\
             INSERT DATA {{\n\
             GRAPH {parent} {{ {parent} {contains} {id} . }}\n\
             GRAPH {id} {{\n{data}\n}}\n\
             GRAPH {meta} {{\n{metadata}\n}}\n\
             }}",
            id = iri(identifier.as_str()),
            meta = iri(&meta_graph(identifier)),
            parent = iri(parent.as_str()),
            contains = iri(vocab::ldp::CONTAINS.as_str()),
            data = triple_block(data),
            metadata = triple_block(metadata),
        )
    }

    fn write_container_update(
        identifier: &ResourceIdentifier,
        parent: Option<&ResourceIdentifier>,
        metadata: &[Quad],
    ) -> String {
        let containment = parent
            .map(|parent| {
                format!(
                    "GRAPH {parent} {{ {parent} {contains} {id} . }}\n",
                    parent = iri(parent.as_str()),
                    contains = iri(vocab::ldp::CONTAINS.as_str()),
                    id = iri(identifier.as_str()),
                )
            })
            .unwrap_or_default();

        format!(
            "DELETE WHERE {{ GRAPH {meta} {{ ?s ?p ?o }} }};\n\
             INSERT DATA {{\n\
             {containment}GRAPH {meta} {{\n{metadata}\n}}\n\
             }}",
            meta = iri(&meta_graph(identifier)),
            containment = containment,
            metadata = triple_block(metadata),
        )
    }

    fn delete_resource_update(
        identifier: &ResourceIdentifier,
        parent: Option<&ResourceIdentifier>,
    ) -> String {
        let mut update = format!(
            "DELETE WHERE {{ GRAPH {meta} {{ ?s ?p ?o }} }};\n\
             DELETE WHERE {{ GRAPH {id} {{ ?s ?p ?o }} }}",
            meta = iri(&meta_graph(identifier)),
            id = iri(identifier.as_str()),
        );
        if let Some(parent) = parent {
            update.push_str(&format!(
                ";\nDELETE DATA {{ GRAPH {parent} {{ {parent} {contains} {id} . }} }}",
                parent = iri(parent.as_str()),
                contains = iri(vocab::ldp::CONTAINS.as_str()),
                id = iri(identifier.as_str()),
            ));
        }
        update
    }

    // Wire plumbing

    async fn construct(&self, query: &str) -> StoreResult<Vec<Quad>> {
        debug!("SPARQL query: {}", query);
        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/sparql-query")
            .header(reqwest::header::ACCEPT, "text/turtle")
            .body(query.to_string())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::Backend(format!(
                "SPARQL endpoint returned {} for query",
                response.status()
            )));
        }
        let text = response.text().await?;
        parse_turtle(&text, None)
    }

    async fn ask(&self, query: &str) -> StoreResult<bool> {
        debug!("SPARQL ask: {}", query);
        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/sparql-query")
            .header(reqwest::header::ACCEPT, "application/sparql-results+json")
            .body(query.to_string())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::Backend(format!(
                "SPARQL endpoint returned {} for ask",
                response.status()
            )));
        }
        let body: serde_json::Value = response.json().await?;
        body.get("boolean")
            .and_then(|v| v.as_bool())
            .ok_or_else(|| StoreError::Backend("malformed ASK response".to_string()))
    }

    async fn update(&self, update: &str) -> StoreResult<()> {
        debug!("SPARQL update: {}", update);
        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/sparql-update")
            .body(update.to_string())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::Backend(format!(
                "SPARQL endpoint returned {} for update",
                response.status()
            )));
        }
        Ok(())
    }

    async fn exists(&self, identifier: &ResourceIdentifier) -> StoreResult<bool> {
        self.ask(&Self::exists_ask(identifier)).await
    }

    /// Reject anything outside the RDF default graph; named graphs are
    /// reserved for this backend's own bookkeeping
    fn require_default_graph(quads: &[Quad]) -> StoreResult<()> {
        if quads.iter().any(|q| q.graph_name != GraphName::DefaultGraph) {
            return Err(StoreError::UnsupportedMediaType(
                "only default-graph triples can be stored".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl DataAccessor for SparqlDataAccessor {
    fn can_handle(&self, representation: &Representation) -> StoreResult<()> {
        if representation.binary {
            Err(StoreError::UnsupportedMediaType(
                "the SPARQL backend only stores RDF quads".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    async fn get_data(&self, identifier: &ResourceIdentifier) -> StoreResult<DataPayload> {
        self.check_in_base(identifier)?;
        if identifier.is_container() {
            return Err(StoreError::NotFound(identifier.to_string()));
        }

        let quads = self
            .construct(&Self::graph_construct(identifier.as_str()))
            .await?;
        if quads.is_empty() && !self.exists(identifier).await? {
            return Err(StoreError::NotFound(identifier.to_string()));
        }
        Ok(DataPayload::Quads(quads))
    }

    async fn get_metadata(
        &self,
        identifier: &ResourceIdentifier,
    ) -> StoreResult<RepresentationMetadata> {
        self.check_in_base(identifier)?;

        if !identifier.is_container() {
            let quads = self
                .construct(&Self::graph_construct(&meta_graph(identifier)))
                .await?;
            if quads.is_empty() && !self.exists(identifier).await? {
                return Err(StoreError::NotFound(identifier.to_string()));
            }
            let mut metadata = RepresentationMetadata::with_quads(identifier, quads);
            metadata.add(vocab::rdf::TYPE.clone(), vocab::ldp::RESOURCE.clone());
            metadata.set_content_type(INTERNAL_QUADS);
            return Ok(metadata);
        }

        let quads = self
            .construct(&Self::container_metadata_construct(identifier))
            .await?;
        // The root exists by definition: synthesize it when nothing has
        // been persisted yet. Anything else without triples is absent.
        if quads.is_empty() && !self.is_root(identifier) {
            return Err(StoreError::NotFound(identifier.to_string()));
        }

        let mut metadata = RepresentationMetadata::with_quads(identifier, quads);
        super::add_container_types(&mut metadata);
        metadata.set_content_type(INTERNAL_QUADS);

        let children: Vec<ResourceIdentifier> = metadata
            .values(&vocab::ldp::CONTAINS)
            .iter()
            .filter_map(|term| match term {
                Term::NamedNode(n) => Some(ResourceIdentifier::new(n.as_str())),
                _ => None,
            })
            .collect();
        for child in children {
            let child_node = NamedNode::new_unchecked(child.as_str());
            metadata.add_quad(
                child_node.clone(),
                vocab::rdf::TYPE.clone(),
                vocab::ldp::RESOURCE.clone(),
            );
            if child.is_container() {
                metadata.add_quad(
                    child_node,
                    vocab::rdf::TYPE.clone(),
                    vocab::ldp::CONTAINER.clone(),
                );
            }
        }
        Ok(metadata)
    }

    async fn get_children(
        &self,
        identifier: &ResourceIdentifier,
    ) -> StoreResult<Vec<ResourceIdentifier>> {
        self.check_in_base(identifier)?;
        if !identifier.is_container() {
            return Ok(Vec::new());
        }

        let quads = self.construct(&Self::children_construct(identifier)).await?;
        Ok(quads
            .iter()
            .filter_map(|q| match &q.object {
                Term::NamedNode(n) => Some(ResourceIdentifier::new(n.as_str())),
                _ => None,
            })
            .collect())
    }

    async fn write_document(
        &self,
        identifier: &ResourceIdentifier,
        data: DataPayload,
        metadata: &RepresentationMetadata,
    ) -> StoreResult<()> {
        self.check_in_base(identifier)?;
        if identifier.is_container() {
            return Err(StoreError::InvalidInput(format!(
                "{} is a container identifier, expected a document",
                identifier
            )));
        }
        let parent = identifier.parent().ok_or_else(|| {
            StoreError::InvalidInput(format!("{} has no parent container", identifier))
        })?;

        let quads = match data {
            DataPayload::Quads(quads) => quads,
            DataPayload::Binary(_) => {
                return Err(StoreError::UnsupportedMediaType(
                    "the SPARQL backend only stores RDF quads".to_string(),
                ))
            }
        };
        Self::require_default_graph(&quads)?;
        let meta_quads = persistable_quads(metadata);
        Self::require_default_graph(&meta_quads)?;

        self.update(&Self::write_document_update(
            identifier, &parent, &quads, &meta_quads,
        ))
        .await?;
        info!("Wrote document {} ({} triples)", identifier, quads.len());
        Ok(())
    }

    async fn write_container(
        &self,
        identifier: &ResourceIdentifier,
        metadata: &RepresentationMetadata,
    ) -> StoreResult<()> {
        self.check_in_base(identifier)?;
        if !identifier.is_container() {
            return Err(StoreError::InvalidInput(format!(
                "{} is a document identifier, expected a container",
                identifier
            )));
        }

        let meta_quads = persistable_quads(metadata);
        Self::require_default_graph(&meta_quads)?;

        let parent = if self.is_root(identifier) {
            None
        } else {
            identifier.parent()
        };

        self.update(&Self::write_container_update(
            identifier,
            parent.as_ref(),
            &meta_quads,
        ))
        .await?;
        debug!("Wrote container {}", identifier);
        Ok(())
    }

    async fn delete_resource(&self, identifier: &ResourceIdentifier) -> StoreResult<()> {
        self.check_in_base(identifier)?;
        if !self.exists(identifier).await? && !self.is_root(identifier) {
            return Err(StoreError::NotFound(identifier.to_string()));
        }

        let parent = if self.is_root(identifier) {
            None
        } else {
            identifier.parent()
        };

        self.update(&Self::delete_resource_update(identifier, parent.as_ref()))
            .await?;
        info!("Deleted {}", identifier);
        Ok(())
    }
}

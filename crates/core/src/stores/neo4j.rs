use crate::extractor::digest_bytes;
use crate::graph::GraphDocument;
use crate::models::{Chunk, ScoredChunk};
use crate::traits::GraphStore;
use crate::ServiceError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::collections::BTreeMap;

pub const VECTOR_INDEX_NAME: &str = "document_embeddings";
const BASE_ENTITY_LABEL: &str = "__Entity__";

pub struct Neo4jStore {
    endpoint: String,
    database: String,
    username: String,
    password: String,
    client: Client,
}

impl Neo4jStore {
    pub fn new(
        endpoint: impl Into<String>,
        database: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: http_endpoint(&endpoint.into()),
            database: database.into(),
            username: username.into(),
            password: password.into(),
            client: Client::new(),
        }
    }

    fn tx_url(&self) -> String {
        format!("{}/db/{}/tx/commit", self.endpoint, self.database)
    }

    async fn commit(&self, statements: Vec<Value>) -> Result<Value, ServiceError> {
        let response = self
            .client
            .post(self.tx_url())
            .basic_auth(&self.username, Some(&self.password))
            .json(&json!({ "statements": statements }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ServiceError::backend("neo4j", response.status().to_string()));
        }

        let body: Value = response.json().await?;
        check_errors(&body)?;
        Ok(body)
    }
}

#[async_trait]
impl GraphStore for Neo4jStore {
    async fn verify_connectivity(&self) -> Result<(), ServiceError> {
        self.commit(vec![json!({ "statement": "MATCH (n) RETURN n LIMIT 1" })])
            .await?;
        tracing::info!(endpoint = %self.endpoint, database = %self.database, "connected to neo4j");
        Ok(())
    }

    async fn ensure_vector_index(&self, dimensions: usize) -> Result<(), ServiceError> {
        let statement = format!(
            "CREATE VECTOR INDEX {VECTOR_INDEX_NAME} IF NOT EXISTS \
             FOR (d:Document) ON (d.embedding) \
             OPTIONS {{indexConfig: {{`vector.dimensions`: {dimensions}, `vector.similarity_function`: 'cosine'}}}}"
        );
        self.commit(vec![json!({ "statement": statement })]).await?;
        Ok(())
    }

    async fn add_graph_documents(
        &self,
        documents: &[GraphDocument],
        embeddings: &[Vec<f32>],
    ) -> Result<(), ServiceError> {
        if documents.is_empty() {
            return Ok(());
        }
        if documents.len() != embeddings.len() {
            return Err(ServiceError::Request(format!(
                "embedding count {} doesn't match document count {}",
                embeddings.len(),
                documents.len()
            )));
        }

        self.commit(graph_statements(documents, embeddings)).await?;
        Ok(())
    }

    async fn similarity_search(
        &self,
        query_vector: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredChunk>, ServiceError> {
        let query = format!(
            "CALL db.index.vector.queryNodes('{VECTOR_INDEX_NAME}', $k, $vector) \
             YIELD node, score \
             RETURN node.chunk_index AS chunk_index, node.start AS start, \
                    coalesce(node.text, '') AS text, score"
        );

        let body = self
            .commit(vec![json!({
                "statement": query,
                "parameters": { "k": k, "vector": query_vector }
            })])
            .await?;

        let mut hits = Vec::new();
        for row in extract_rows(&body) {
            if let Some(values) = row.as_array() {
                if values.len() >= 4 {
                    let index = values.first().and_then(Value::as_u64).unwrap_or_default();
                    let start = values.get(1).and_then(Value::as_u64).unwrap_or_default();
                    let text = values.get(2).and_then(Value::as_str).unwrap_or_default();
                    let score = values.get(3).and_then(Value::as_f64).unwrap_or(0.0);
                    hits.push(ScoredChunk {
                        chunk: Chunk {
                            index: index as usize,
                            start: start as usize,
                            text: text.to_string(),
                        },
                        score: score as f32,
                    });
                }
            }
        }

        Ok(hits)
    }
}

/// Maps driver URIs (`neo4j://`, `bolt+s://`, ...) onto the HTTP API of the
/// same host. The default Bolt port becomes the default HTTP(S) port.
pub fn http_endpoint(uri: &str) -> String {
    let uri = uri.trim().trim_end_matches('/');
    let (scheme, rest) = uri.split_once("://").unwrap_or(("http", uri));

    let secure = match scheme.to_ascii_lowercase().as_str() {
        "http" | "neo4j" | "bolt" => false,
        "https" | "neo4j+s" | "neo4j+ssc" | "bolt+s" | "bolt+ssc" => true,
        _ => return uri.to_string(),
    };

    let authority = rest.split('/').next().unwrap_or(rest);
    let path = &rest[authority.len()..];
    let authority = match authority.rsplit_once(':') {
        Some((host, "7687")) if secure => format!("{host}:7473"),
        Some((host, "7687")) => format!("{host}:7474"),
        _ => authority.to_string(),
    };

    let scheme = if secure { "https" } else { "http" };
    format!("{scheme}://{authority}{path}")
}

fn document_node_id(chunk: &Chunk) -> String {
    digest_bytes(format!("{}:{}:{}", chunk.index, chunk.start, chunk.text).as_bytes())
}

/// Cypher cannot parameterise labels or relationship types, so they are
/// reduced to `[A-Za-z0-9_]` before being spliced into statements.
pub fn sanitize_label(raw: &str) -> String {
    let cleaned = raw
        .trim()
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '_' })
        .collect::<String>();
    let cleaned = cleaned.trim_matches('_').to_string();

    match cleaned.chars().next() {
        None => "Entity".to_string(),
        Some(first) if first.is_ascii_digit() => format!("_{cleaned}"),
        Some(_) => cleaned,
    }
}

pub fn sanitize_relationship_type(raw: &str) -> String {
    let label = sanitize_label(raw);
    if label == "Entity" && raw.trim().is_empty() {
        "RELATED_TO".to_string()
    } else {
        label.to_ascii_uppercase()
    }
}

/// One statement for the source documents, one per entity label and one per
/// relationship type, all sent in a single transaction.
pub fn graph_statements(documents: &[GraphDocument], embeddings: &[Vec<f32>]) -> Vec<Value> {
    let mut document_rows = Vec::new();
    let mut nodes_by_label: BTreeMap<String, Vec<Value>> = BTreeMap::new();
    let mut relationships_by_type: BTreeMap<String, Vec<Value>> = BTreeMap::new();

    for (document, embedding) in documents.iter().zip(embeddings) {
        let doc_id = document_node_id(&document.source);
        document_rows.push(json!({
            "id": doc_id,
            "text": document.source.text,
            "chunk_index": document.source.index,
            "start": document.source.start,
            "embedding": embedding,
        }));

        for node in &document.nodes {
            nodes_by_label
                .entry(sanitize_label(&node.kind))
                .or_default()
                .push(json!({ "id": node.id, "doc_id": doc_id }));
        }

        for relationship in &document.relationships {
            relationships_by_type
                .entry(sanitize_relationship_type(&relationship.kind))
                .or_default()
                .push(json!({ "source": relationship.source, "target": relationship.target }));
        }
    }

    let mut statements = vec![json!({
        "statement": r#"
            UNWIND $rows AS row
            MERGE (d:Document {id: row.id})
            SET d.text = row.text,
                d.chunk_index = row.chunk_index,
                d.start = row.start,
                d.embedding = row.embedding
        "#,
        "parameters": { "rows": document_rows }
    })];

    for (label, rows) in nodes_by_label {
        statements.push(json!({
            "statement": format!(
                "UNWIND $rows AS row \
                 MERGE (n:{BASE_ENTITY_LABEL}:`{label}` {{id: row.id}}) \
                 WITH n, row \
                 MATCH (d:Document {{id: row.doc_id}}) \
                 MERGE (d)-[:MENTIONS]->(n)"
            ),
            "parameters": { "rows": rows }
        }));
    }

    for (kind, rows) in relationships_by_type {
        statements.push(json!({
            "statement": format!(
                "UNWIND $rows AS row \
                 MATCH (s:{BASE_ENTITY_LABEL} {{id: row.source}}) \
                 MATCH (t:{BASE_ENTITY_LABEL} {{id: row.target}}) \
                 MERGE (s)-[:`{kind}`]->(t)"
            ),
            "parameters": { "rows": rows }
        }));
    }

    statements
}

/// The transaction endpoint answers 200 even when a statement fails.
fn check_errors(body: &Value) -> Result<(), ServiceError> {
    let errors = body
        .pointer("/errors")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    match errors.first() {
        None => Ok(()),
        Some(error) => {
            let code = error.pointer("/code").and_then(Value::as_str).unwrap_or("unknown");
            let message = error.pointer("/message").and_then(Value::as_str).unwrap_or_default();
            Err(ServiceError::backend("neo4j", format!("{code}: {message}")))
        }
    }
}

fn extract_rows(payload: &Value) -> Vec<&Value> {
    let data = payload.pointer("/results").and_then(Value::as_array);
    match data {
        Some(results) => results
            .iter()
            .filter_map(|result| result.pointer("/data").and_then(Value::as_array))
            .flat_map(|result_rows| {
                result_rows.iter().filter_map(|row_entry| {
                    row_entry
                        .pointer("/row")
                        .or(Some(row_entry))
                        .filter(|candidate| candidate.is_array())
                })
            })
            .collect(),
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphNode, GraphRelationship};

    fn document() -> GraphDocument {
        GraphDocument {
            source: Chunk {
                index: 0,
                start: 0,
                text: "Bob works for Acme in Denver.".to_string(),
            },
            nodes: vec![
                GraphNode {
                    id: "Bob".to_string(),
                    kind: "Person".to_string(),
                },
                GraphNode {
                    id: "Acme".to_string(),
                    kind: "Organization".to_string(),
                },
                GraphNode {
                    id: "Denver".to_string(),
                    kind: "Organization".to_string(),
                },
            ],
            relationships: vec![GraphRelationship {
                source: "Bob".to_string(),
                target: "Acme".to_string(),
                kind: "works for".to_string(),
            }],
        }
    }

    #[test]
    fn driver_uris_map_to_http_api() {
        assert_eq!(
            http_endpoint("neo4j+s://3f57e783.databases.neo4j.io"),
            "https://3f57e783.databases.neo4j.io"
        );
        assert_eq!(http_endpoint("bolt://localhost:7687"), "http://localhost:7474");
        assert_eq!(http_endpoint("bolt+s://graph.internal:7687"), "https://graph.internal:7473");
        assert_eq!(http_endpoint("http://localhost:7474/"), "http://localhost:7474");
        assert_eq!(http_endpoint("localhost:7474"), "http://localhost:7474");

        let store = Neo4jStore::new("neo4j://db.example.com", "neo4j", "neo4j", "secret");
        assert_eq!(store.tx_url(), "http://db.example.com/db/neo4j/tx/commit");
    }

    #[test]
    fn labels_are_sanitized_for_cypher() {
        assert_eq!(sanitize_label("Organization"), "Organization");
        assert_eq!(sanitize_label("Legal Entity`) DETACH DELETE n //"), "Legal_Entity___DETACH_DELETE_n");
        assert_eq!(sanitize_label("  "), "Entity");
        assert_eq!(sanitize_label("3D Model"), "_3D_Model");
        assert_eq!(sanitize_relationship_type("works for"), "WORKS_FOR");
        assert_eq!(sanitize_relationship_type(""), "RELATED_TO");
    }

    #[test]
    fn statements_group_nodes_by_label() {
        let statements = graph_statements(&[document()], &[vec![0.5, 0.5]]);

        // documents, Organization, Person, WORKS_FOR
        assert_eq!(statements.len(), 4);
        assert_eq!(
            statements[0].pointer("/parameters/rows/0/embedding"),
            Some(&json!([0.5, 0.5]))
        );

        let organization = statements[1]["statement"].as_str().unwrap();
        assert!(organization.contains("MERGE (n:__Entity__:`Organization` {id: row.id})"));
        assert_eq!(
            statements[1]["parameters"]["rows"].as_array().map(Vec::len),
            Some(2)
        );

        let relationship = statements[3]["statement"].as_str().unwrap();
        assert!(relationship.contains("MERGE (s)-[:`WORKS_FOR`]->(t)"));
    }

    #[test]
    fn errors_in_body_fail_the_commit() {
        let ok = json!({"results": [], "errors": []});
        assert!(check_errors(&ok).is_ok());

        let failed = json!({
            "results": [],
            "errors": [{"code": "Neo.ClientError.Statement.SyntaxError", "message": "Invalid input"}]
        });
        let error = check_errors(&failed).unwrap_err().to_string();
        assert!(error.contains("Neo.ClientError.Statement.SyntaxError"));
    }

    #[test]
    fn rows_are_read_from_results() {
        let body = json!({
            "results": [{
                "columns": ["chunk_index", "start", "text", "score"],
                "data": [
                    {"row": [2, 1800, "Acme is in Denver.", 0.91], "meta": []},
                    {"row": [0, 0, "Bob works for Acme.", 0.72], "meta": []}
                ]
            }],
            "errors": []
        });
        let rows = extract_rows(&body);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][2], "Acme is in Denver.");
    }
}

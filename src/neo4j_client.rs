use crate::config::AppConfig;
use anyhow::Result;
use neo4rs::{query, Graph};
use tracing::info;
use url::Url;

pub const CHUNK_VECTOR_INDEX: &str = "chunkEmbeddingIndex";

pub async fn connect_from_config(cfg: &AppConfig) -> Result<Graph> {
    let url = Url::parse(&cfg.neo4j_uri)?;
    let host = url.host_str().unwrap_or("localhost");
    let port = url.port().unwrap_or(7687);
    let addr = format!("{host}:{port}");

    info!("Conectando a Neo4j en {addr}...");
    let graph = Graph::new(&addr, &cfg.neo4j_user, &cfg.neo4j_password).await?;
    info!("Conexión a Neo4j OK");
    Ok(graph)
}

/// Asegura el esquema de los registros `:Chunk`: `id` único (clave del
/// upsert) e índice vectorial sobre `embedding`.
pub async fn ensure_schema(graph: &Graph, dimension: usize) -> Result<()> {
    graph
        .run(query(
            "CREATE CONSTRAINT chunk_id IF NOT EXISTS
             FOR (c:Chunk)
             REQUIRE c.id IS UNIQUE",
        ))
        .await?;

    // ¿Ya existe el índice? Usamos la sintaxis moderna SHOW VECTOR INDEXES.
    let mut cursor = graph
        .execute(
            query("SHOW VECTOR INDEXES YIELD name WHERE name = $name RETURN name")
                .param("name", CHUNK_VECTOR_INDEX),
        )
        .await?;

    if cursor.next().await?.is_some() {
        info!("Índice vectorial '{CHUNK_VECTOR_INDEX}' ya existe.");
        return Ok(());
    }

    let cypher = format!(
        "\
CREATE VECTOR INDEX {CHUNK_VECTOR_INDEX} IF NOT EXISTS
FOR (c:Chunk)
ON (c.embedding)
OPTIONS {{
  indexConfig: {{
    `vector.dimensions`: {dimension},
    `vector.similarity_function`: 'cosine'
  }}
}}"
    );

    graph.run(query(&cypher)).await?;
    info!("Índice vectorial '{CHUNK_VECTOR_INDEX}' creado ({dimension} dimensiones).");

    Ok(())
}

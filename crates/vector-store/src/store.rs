use crate::error::{Result, VectorStoreError};
use crate::types::{calculate_importance, Chunk, ChunkKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

pub const EMBEDDINGS_BIN_FILE: &str = "embeddings.bin";
pub const EMBEDDINGS_JSON_FILE: &str = "embeddings.json";

/// JSON sidecar carrying chunk metadata and content, parallel to the binary
/// vector file.
#[derive(Debug, Serialize, Deserialize)]
struct Sidecar {
    #[serde(default)]
    model: String,
    dimension: usize,
    #[serde(default)]
    total_chunks: usize,
    embeddings: Vec<SidecarChunk>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SidecarChunk {
    id: String,
    chunk_type: ChunkKind,
    content: String,
    metadata: SidecarMetadata,
}

#[derive(Debug, Serialize, Deserialize)]
struct SidecarMetadata {
    file_path: String,
    #[serde(default)]
    language: String,
    line_start: usize,
    line_end: usize,
    #[serde(default)]
    name: String,
    #[serde(default)]
    complexity: usize,
}

/// Read-only store of chunk vectors with their sidecar metadata.
pub struct VectorStore {
    chunks: Vec<Chunk>,
    vectors: Vec<Vec<f32>>,
    dimension: usize,
    by_id: HashMap<String, usize>,
}

impl VectorStore {
    /// Load and cross-validate both artifacts from the session directory.
    ///
    /// `expected_dimension` comes from configuration; any disagreement with
    /// the on-disk header is non-recoverable for the session.
    pub fn load(session_dir: &Path, expected_dimension: usize) -> Result<Self> {
        let bin_path = session_dir.join(EMBEDDINGS_BIN_FILE);
        if !bin_path.exists() {
            return Err(VectorStoreError::Missing(bin_path));
        }
        let data = std::fs::read(&bin_path)?;
        let (count, dimension, mut vectors) = parse_binary(&data)?;

        if dimension != expected_dimension {
            return Err(VectorStoreError::DimensionMismatch {
                expected: expected_dimension,
                actual: dimension,
            });
        }

        let sidecar_path = session_dir.join(EMBEDDINGS_JSON_FILE);
        if !sidecar_path.exists() {
            return Err(VectorStoreError::Missing(sidecar_path));
        }
        let sidecar: Sidecar = serde_json::from_slice(&std::fs::read(&sidecar_path)?)?;

        if sidecar.dimension != dimension {
            return Err(VectorStoreError::Corrupt(format!(
                "sidecar declares dimension {}, binary has {}",
                sidecar.dimension, dimension
            )));
        }
        if sidecar.embeddings.len() != count {
            return Err(VectorStoreError::Corrupt(format!(
                "sidecar has {} chunks, binary has {} vectors",
                sidecar.embeddings.len(),
                count
            )));
        }

        let mut repaired = 0usize;
        for vector in &mut vectors {
            if normalize_if_needed(vector) {
                repaired += 1;
            }
        }
        if repaired > 0 {
            log::warn!("Normalized {repaired} denormalized vectors while loading the store");
        }

        let chunks: Vec<Chunk> = sidecar.embeddings.into_iter().map(into_chunk).collect();

        let mut by_id = HashMap::with_capacity(chunks.len());
        for (idx, chunk) in chunks.iter().enumerate() {
            if by_id.insert(chunk.id.clone(), idx).is_some() {
                return Err(VectorStoreError::Corrupt(format!(
                    "duplicate chunk id '{}' in sidecar",
                    chunk.id
                )));
            }
        }

        log::info!("Loaded vector store: {count} chunks, dimension {dimension}");

        Ok(Self {
            chunks,
            vectors,
            dimension,
            by_id,
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn chunk_by_id(&self, id: &str) -> Option<&Chunk> {
        self.by_id.get(id).map(|&idx| &self.chunks[idx])
    }

    /// Similarity search against every stored vector.
    ///
    /// Stored vectors are normalized on load, so cosine similarity reduces to
    /// a dot product. Results at or above `threshold` are returned best-first,
    /// capped at `top_k`.
    pub fn search(&self, query: &[f32], top_k: usize, threshold: f32) -> Vec<(&Chunk, f32)> {
        let mut scored: Vec<(&Chunk, f32)> = self
            .vectors
            .iter()
            .zip(&self.chunks)
            .filter_map(|(vector, chunk)| {
                let score = dot(query, vector);
                (score >= threshold).then_some((chunk, score))
            })
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        scored
    }
}

/// Load the chunk list from the sidecar alone.
///
/// Used when `embeddings.bin` is absent: retrieval degrades to keyword-only
/// but the chunk corpus itself must still be available.
pub fn load_chunks_only(session_dir: &Path) -> Result<Vec<Chunk>> {
    let sidecar_path = session_dir.join(EMBEDDINGS_JSON_FILE);
    if !sidecar_path.exists() {
        return Err(VectorStoreError::Missing(sidecar_path));
    }
    let sidecar: Sidecar = serde_json::from_slice(&std::fs::read(&sidecar_path)?)?;
    Ok(sidecar.embeddings.into_iter().map(into_chunk).collect())
}

/// Binary layout: `count:u32 | dimension:u32 | f32 * count * dimension`, all
/// little-endian, row-major. The file size must match the header exactly.
fn parse_binary(data: &[u8]) -> Result<(usize, usize, Vec<Vec<f32>>)> {
    if data.len() < 8 {
        return Err(VectorStoreError::Corrupt(
            "binary file too short for header".into(),
        ));
    }

    let count = u32::from_le_bytes(data[0..4].try_into().unwrap()) as usize;
    let dimension = u32::from_le_bytes(data[4..8].try_into().unwrap()) as usize;

    let expected_len = 8 + count * dimension * 4;
    if data.len() != expected_len {
        return Err(VectorStoreError::Corrupt(format!(
            "file size {} does not match header (expected {expected_len} for {count} x {dimension})",
            data.len()
        )));
    }

    let mut vectors = Vec::with_capacity(count);
    let mut offset = 8;
    for _ in 0..count {
        let mut vector = Vec::with_capacity(dimension);
        for _ in 0..dimension {
            let bits = u32::from_le_bytes(data[offset..offset + 4].try_into().unwrap());
            vector.push(f32::from_bits(bits));
            offset += 4;
        }
        vectors.push(vector);
    }

    Ok((count, dimension, vectors))
}

/// Returns true when the vector had to be re-normalized.
fn normalize_if_needed(vector: &mut [f32]) -> bool {
    let norm_sq: f32 = vector.iter().map(|v| v * v).sum();
    if (norm_sq - 1.0).abs() <= 1e-4 {
        return false;
    }
    let norm = norm_sq.sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
    true
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn into_chunk(raw: SidecarChunk) -> Chunk {
    let name = (!raw.metadata.name.is_empty()).then(|| raw.metadata.name.clone());
    let symbols = extract_symbols(&raw.content, name.as_deref());
    let tokens = raw.content.len() / 4;
    let complexity = (raw.metadata.complexity > 0).then_some(raw.metadata.complexity);

    Chunk {
        importance: calculate_importance(raw.chunk_type, complexity),
        id: raw.id,
        kind: raw.chunk_type,
        file: raw.metadata.file_path,
        start_line: raw.metadata.line_start,
        end_line: raw.metadata.line_end,
        content: raw.content,
        language: raw.metadata.language,
        name,
        complexity,
        symbols,
        tokens,
    }
}

/// Chunk content is a structured summary; member symbols are listed as
/// `- name (...)` bullet lines.
fn extract_symbols(content: &str, name: Option<&str>) -> Vec<String> {
    let mut symbols = Vec::new();
    if let Some(name) = name {
        symbols.push(name.to_string());
    }

    for line in content.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("- ") {
            let symbol = rest.split(" (").next().unwrap_or("").trim();
            if !symbol.is_empty() && symbol != "..." && !symbols.iter().any(|s| s == symbol) {
                symbols.push(symbol.to_string());
            }
        }
    }

    symbols
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_binary(dir: &Path, vectors: &[Vec<f32>]) {
        let dimension = vectors.first().map_or(0, Vec::len);
        let mut data = Vec::new();
        data.extend_from_slice(&(vectors.len() as u32).to_le_bytes());
        data.extend_from_slice(&(dimension as u32).to_le_bytes());
        for vector in vectors {
            for value in vector {
                data.extend_from_slice(&value.to_le_bytes());
            }
        }
        std::fs::write(dir.join(EMBEDDINGS_BIN_FILE), data).unwrap();
    }

    fn write_sidecar(dir: &Path, dimension: usize, ids: &[&str]) {
        let embeddings: Vec<serde_json::Value> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| {
                serde_json::json!({
                    "id": id,
                    "chunk_type": "function",
                    "content": format!("def f{i}():\n    pass"),
                    "metadata": {
                        "file_path": format!("src/m{i}.py"),
                        "language": "python",
                        "line_start": 1,
                        "line_end": 5,
                        "name": format!("f{i}"),
                        "complexity": 1
                    }
                })
            })
            .collect();
        let sidecar = serde_json::json!({
            "model": "test-model",
            "dimension": dimension,
            "total_chunks": ids.len(),
            "embeddings": embeddings,
        });
        std::fs::write(
            dir.join(EMBEDDINGS_JSON_FILE),
            serde_json::to_vec(&sidecar).unwrap(),
        )
        .unwrap();
    }

    #[test]
    fn load_validates_and_searches() {
        let dir = TempDir::new().unwrap();
        write_binary(dir.path(), &[vec![1.0, 0.0], vec![0.0, 1.0]]);
        write_sidecar(dir.path(), 2, &["c1", "c2"]);

        let store = VectorStore::load(dir.path(), 2).unwrap();
        assert_eq!(store.len(), 2);

        let results = store.search(&[1.0, 0.0], 10, 0.5);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0.id, "c1");
        assert!((results[0].1 - 1.0).abs() < 1e-6);
    }

    #[test]
    fn size_mismatch_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let mut data = Vec::new();
        data.extend_from_slice(&2u32.to_le_bytes());
        data.extend_from_slice(&2u32.to_le_bytes());
        data.extend_from_slice(&1.0f32.to_le_bytes()); // one float short of 2x2
        std::fs::write(dir.path().join(EMBEDDINGS_BIN_FILE), data).unwrap();
        write_sidecar(dir.path(), 2, &["c1", "c2"]);

        assert!(matches!(
            VectorStore::load(dir.path(), 2),
            Err(VectorStoreError::Corrupt(_))
        ));
    }

    #[test]
    fn dimension_mismatch_against_config() {
        let dir = TempDir::new().unwrap();
        write_binary(dir.path(), &[vec![1.0, 0.0]]);
        write_sidecar(dir.path(), 2, &["c1"]);

        assert!(matches!(
            VectorStore::load(dir.path(), 384),
            Err(VectorStoreError::DimensionMismatch {
                expected: 384,
                actual: 2
            })
        ));
    }

    #[test]
    fn sidecar_count_mismatch_is_corrupt() {
        let dir = TempDir::new().unwrap();
        write_binary(dir.path(), &[vec![1.0, 0.0], vec![0.0, 1.0]]);
        write_sidecar(dir.path(), 2, &["c1"]);

        assert!(matches!(
            VectorStore::load(dir.path(), 2),
            Err(VectorStoreError::Corrupt(_))
        ));
    }

    #[test]
    fn missing_binary_reports_missing() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            VectorStore::load(dir.path(), 2),
            Err(VectorStoreError::Missing(_))
        ));
    }

    #[test]
    fn denormalized_vectors_are_repaired_on_load() {
        let dir = TempDir::new().unwrap();
        write_binary(dir.path(), &[vec![3.0, 4.0]]);
        write_sidecar(dir.path(), 2, &["c1"]);

        let store = VectorStore::load(dir.path(), 2).unwrap();
        let results = store.search(&[0.6, 0.8], 1, 0.0);
        assert!((results[0].1 - 1.0).abs() < 1e-5);
    }

    #[test]
    fn chunk_invariants_hold() {
        let dir = TempDir::new().unwrap();
        write_binary(dir.path(), &[vec![1.0, 0.0]]);
        write_sidecar(dir.path(), 2, &["c1"]);

        let store = VectorStore::load(dir.path(), 2).unwrap();
        for chunk in store.chunks() {
            assert!(chunk.start_line <= chunk.end_line);
            assert!((0.0..=1.0).contains(&chunk.importance));
        }
        assert_eq!(store.chunk_by_id("c1").unwrap().name_str(), "f0");
    }

    #[test]
    fn symbols_come_from_name_and_bullet_lines() {
        let symbols = extract_symbols(
            "File summary\n- authenticate_user (3 calls)\n- hash_password (1 call)\n- ...\n",
            Some("auth"),
        );
        assert_eq!(symbols, vec!["auth", "authenticate_user", "hash_password"]);
    }
}

use crate::error::{Result, VectorStoreError};
use serde::Deserialize;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::time::{timeout, Duration};

const EMBED_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the external query-embedder binary.
///
/// The binary protocol is preferred: stdout carries
/// `dimension:u32 | f32 * dimension`, little-endian. When that frame cannot
/// be parsed the client retries once with `-f json`.
pub struct QueryEmbedder {
    binary_path: PathBuf,
    model: String,
}

#[derive(Deserialize)]
struct JsonEmbedding {
    dimension: usize,
    embedding: Vec<f32>,
}

impl QueryEmbedder {
    pub fn new(binary_path: impl Into<PathBuf>, model: impl Into<String>) -> Self {
        Self {
            binary_path: binary_path.into(),
            model: model.into(),
        }
    }

    /// Embed a query, blocking until the subprocess completes or times out.
    pub async fn embed(&self, query: &str) -> Result<Vec<f32>> {
        let stdout = self.run(query, "binary").await?;
        match parse_binary_frame(&stdout) {
            Ok(vector) => Ok(vector),
            Err(binary_err) => {
                log::warn!("Binary embed frame unusable ({binary_err}); retrying as JSON");
                let stdout = self.run(query, "json").await?;
                parse_json_frame(&stdout)
            }
        }
    }

    async fn run(&self, query: &str, format: &str) -> Result<Vec<u8>> {
        let child = tokio::process::Command::new(&self.binary_path)
            .arg("query")
            .arg("-q")
            .arg(query)
            .arg("-m")
            .arg(&self.model)
            .arg("-f")
            .arg(format)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                VectorStoreError::Embedder(format!(
                    "failed to spawn {}: {e}",
                    self.binary_path.display()
                ))
            })?;

        let output = timeout(EMBED_TIMEOUT, child.wait_with_output())
            .await
            .map_err(|_| VectorStoreError::Embedder("embedder timed out".into()))??;

        if !output.status.success() {
            return Err(VectorStoreError::Embedder(format!(
                "embedder exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(output.stdout)
    }
}

/// `dimension:u32 | f32 * dimension`, little-endian; total size must be
/// exactly `4 + dimension * 4`.
fn parse_binary_frame(data: &[u8]) -> Result<Vec<f32>> {
    if data.len() < 4 {
        return Err(VectorStoreError::EmbedderProtocol(
            "frame too short for dimension header".into(),
        ));
    }

    let dimension = u32::from_le_bytes(data[0..4].try_into().unwrap()) as usize;
    let expected = 4 + dimension * 4;
    if data.len() != expected {
        return Err(VectorStoreError::EmbedderProtocol(format!(
            "frame size {} does not match dimension {dimension} (expected {expected})",
            data.len()
        )));
    }

    let mut vector = Vec::with_capacity(dimension);
    let mut offset = 4;
    for _ in 0..dimension {
        let bits = u32::from_le_bytes(data[offset..offset + 4].try_into().unwrap());
        vector.push(f32::from_bits(bits));
        offset += 4;
    }
    Ok(vector)
}

fn parse_json_frame(data: &[u8]) -> Result<Vec<f32>> {
    let parsed: JsonEmbedding = serde_json::from_slice(data)?;
    if parsed.embedding.len() != parsed.dimension {
        return Err(VectorStoreError::EmbedderProtocol(format!(
            "JSON frame declares dimension {} but carries {} values",
            parsed.dimension,
            parsed.embedding.len()
        )));
    }
    Ok(parsed.embedding)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binary_frame(values: &[f32]) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&(values.len() as u32).to_le_bytes());
        for value in values {
            data.extend_from_slice(&value.to_le_bytes());
        }
        data
    }

    #[test]
    fn binary_frame_round_trips() {
        let frame = binary_frame(&[0.25, -1.5, 3.0]);
        let parsed = parse_binary_frame(&frame).unwrap();
        assert_eq!(parsed, vec![0.25, -1.5, 3.0]);
    }

    #[test]
    fn short_binary_frame_is_protocol_error() {
        let mut frame = binary_frame(&[1.0, 2.0]);
        frame.truncate(frame.len() - 1);
        assert!(matches!(
            parse_binary_frame(&frame),
            Err(VectorStoreError::EmbedderProtocol(_))
        ));
    }

    #[test]
    fn json_frame_parses_documented_shape() {
        let data = serde_json::json!({
            "query": "who calls main",
            "model": "test",
            "dimension": 2,
            "embedding": [0.5, 0.5]
        });
        let parsed = parse_json_frame(&serde_json::to_vec(&data).unwrap()).unwrap();
        assert_eq!(parsed, vec![0.5, 0.5]);
    }

    #[test]
    fn json_frame_dimension_mismatch_rejected() {
        let data = serde_json::json!({
            "query": "q", "model": "m", "dimension": 3, "embedding": [0.5, 0.5]
        });
        assert!(parse_json_frame(&serde_json::to_vec(&data).unwrap()).is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn embedding_a_fixed_text_twice_is_byte_identical() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::TempDir::new().unwrap();
        let script = dir.path().join("fake_embed");
        // Emits a fixed 3-dim binary frame: [1.0, 0.0, 0.0].
        std::fs::write(
            &script,
            "#!/bin/sh\nprintf '\\003\\000\\000\\000'\nprintf '\\000\\000\\200\\077'\nprintf '\\000\\000\\000\\000\\000\\000\\000\\000'\n",
        )
        .unwrap();
        let mut perms = std::fs::metadata(&script).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&script, perms).unwrap();

        let embedder = QueryEmbedder::new(&script, "test-model");
        let first = embedder.embed("fixed text").await.unwrap();
        let second = embedder.embed("fixed text").await.unwrap();

        assert_eq!(first, vec![1.0, 0.0, 0.0]);
        assert_eq!(first, second);
    }
}

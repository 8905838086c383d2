use crate::classifier::extract_keywords;
use crate::error::{QueryError, Result};
use eulix_kb::CallGraph;
use eulix_vector_store::{
    load_chunks_only, Chunk, ContextChunk, ContextWindow, QueryEmbedder, VectorStore,
    VectorStoreError,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

const SYSTEM_PROMPT_TOKENS: i64 = 150;
const SAFETY_BUFFER_TOKENS: i64 = 200;
const RESPONSE_RESERVE_TOKENS: i64 = 2000;
const BUDGET_FILL_RATIO: f64 = 0.85;
const CHUNK_HEADER_TOKENS: usize = 20;
const MERGE_MAX_LINE_GAP: usize = 5;
const GRAPH_EXPANSION_CANDIDATES: usize = 20;
const HOT_FILE_MIN_CHUNKS: usize = 3;
const HOT_FILE_MIN_CANDIDATES: usize = 20;

/// Verb prefixes that make a plain lowercase token a symbol candidate.
const SYMBOL_VERB_PREFIXES: &[&str] = &[
    "get", "set", "create", "delete", "remove", "update", "handle", "init", "download", "upload",
    "process", "add", "build", "setup",
];

#[derive(Debug, Clone)]
pub struct ContextConfig {
    /// The model's total token window (`llm.max_tokens`).
    pub max_tokens: usize,
    /// Minimum cosine similarity for semantic candidates.
    pub semantic_threshold: f32,
    /// Score bump for chunks in hot files when no call graph is loaded.
    pub hot_file_boost: f64,
    /// Candidate cap for the merged multi-strategy pool.
    pub top_k: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_tokens: 8192,
            semantic_threshold: 0.5,
            hot_file_boost: 0.2,
            top_k: 100,
        }
    }
}

/// Which retrieval strategies produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Exact,
    Keyword,
    Semantic,
    ExactKeyword,
    ExactSemantic,
    KeywordSemantic,
    /// Pulled in by call-graph expansion from another candidate.
    Graph,
}

impl MatchKind {
    pub fn is_exact(self) -> bool {
        matches!(
            self,
            MatchKind::Exact | MatchKind::ExactKeyword | MatchKind::ExactSemantic
        )
    }
}

#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f64,
    pub distance: usize,
    pub from_id: Option<String>,
    pub match_kind: MatchKind,
    pub match_details: String,
}

/// Assembles the smallest maximally relevant chunk set under a token budget.
pub struct ContextBuilder {
    chunks: Vec<Chunk>,
    store: Option<VectorStore>,
    embedder: Option<QueryEmbedder>,
    call_graph: Option<Arc<CallGraph>>,
    config: ContextConfig,
}

impl ContextBuilder {
    /// Open the retrieval artifacts under the session directory.
    ///
    /// A missing binary vector file degrades to keyword-only retrieval; a
    /// corrupt or dimension-mismatched one is fatal for the session.
    pub fn open(
        session_dir: &Path,
        config: ContextConfig,
        embedding_dimension: usize,
        embedder: Option<QueryEmbedder>,
        call_graph: Option<Arc<CallGraph>>,
    ) -> Result<Self> {
        let (store, chunks) = match VectorStore::load(session_dir, embedding_dimension) {
            Ok(store) => (Some(store), Vec::new()),
            Err(VectorStoreError::Missing(path)) => {
                log::warn!(
                    "Vector store missing at {}; semantic search disabled",
                    path.display()
                );
                (None, load_chunks_only(session_dir)?)
            }
            Err(e) => return Err(e.into()),
        };

        let call_graph = call_graph.filter(|g| !g.is_empty());
        let embedder = if store.is_some() { embedder } else { None };

        Ok(Self {
            chunks,
            store,
            embedder,
            call_graph,
            config,
        })
    }

    #[cfg(test)]
    pub(crate) fn with_chunks(
        chunks: Vec<Chunk>,
        config: ContextConfig,
        call_graph: Option<Arc<CallGraph>>,
    ) -> Self {
        Self {
            chunks,
            store: None,
            embedder: None,
            call_graph,
            config,
        }
    }

    fn chunks(&self) -> &[Chunk] {
        match &self.store {
            Some(store) => store.chunks(),
            None => &self.chunks,
        }
    }

    pub fn has_semantic_search(&self) -> bool {
        self.store.is_some() && self.embedder.is_some()
    }

    /// Token budget left for context after the fixed reserves.
    pub fn token_budget(&self, query: &str) -> Result<usize> {
        let available = self.config.max_tokens as i64
            - (query.len() / 4) as i64
            - SYSTEM_PROMPT_TOKENS
            - SAFETY_BUFFER_TOKENS
            - RESPONSE_RESERVE_TOKENS;
        if available <= 0 {
            return Err(QueryError::BudgetExhausted { available });
        }
        Ok((available as f64 * BUDGET_FILL_RATIO) as usize)
    }

    /// Run the full retrieval pipeline for one query.
    pub async fn build_context(&self, query: &str) -> Result<ContextWindow> {
        let budget = self.token_budget(query)?;

        let candidates = self.multi_strategy_search(query, self.config.top_k).await;

        let scored = if self.call_graph.is_some() {
            self.expand_with_graph(candidates)
        } else {
            self.boost_hot_files(candidates)
        };

        let selected = select_chunks(scored, budget);
        Ok(assemble(selected))
    }

    /// Merge exact, keyword and semantic candidates into one scored pool.
    async fn multi_strategy_search(&self, query: &str, top_k: usize) -> Vec<ScoredChunk> {
        let mut pool: HashMap<String, ScoredChunk> = HashMap::new();

        for candidate in self.exact_symbol_search(query) {
            pool.insert(candidate.chunk.id.clone(), candidate);
        }

        for mut candidate in self.keyword_search(query, top_k) {
            match pool.get_mut(&candidate.chunk.id) {
                Some(existing) => {
                    existing.score = existing.score.max(candidate.score) + 2.0;
                    existing.match_kind = MatchKind::ExactKeyword;
                }
                None => {
                    candidate.match_kind = MatchKind::Keyword;
                    pool.insert(candidate.chunk.id.clone(), candidate);
                }
            }
        }

        if let (Some(store), Some(embedder)) = (&self.store, &self.embedder) {
            match embedder.embed(query).await {
                Ok(query_vector) => {
                    let semantic =
                        store.search(&query_vector, top_k, self.config.semantic_threshold);
                    for (chunk, similarity) in semantic {
                        let similarity = similarity as f64;
                        match pool.get_mut(&chunk.id) {
                            Some(existing) => {
                                existing.score += 0.5 * similarity;
                                existing.match_kind = match existing.match_kind {
                                    MatchKind::Exact => MatchKind::ExactSemantic,
                                    MatchKind::Keyword => MatchKind::KeywordSemantic,
                                    other => other,
                                };
                            }
                            None => {
                                pool.insert(
                                    chunk.id.clone(),
                                    ScoredChunk {
                                        chunk: chunk.clone(),
                                        score: similarity,
                                        distance: 0,
                                        from_id: None,
                                        match_kind: MatchKind::Semantic,
                                        match_details: format!("similarity={similarity:.2}"),
                                    },
                                );
                            }
                        }
                    }
                }
                Err(e) => log::warn!("Query embedding failed, skipping semantic search: {e}"),
            }
        }

        let mut result: Vec<ScoredChunk> = pool.into_values().collect();
        sort_candidates(&mut result);
        result.truncate(top_k);
        result
    }

    /// Case-insensitive equality against chunk names (100) and chunk symbols
    /// (90).
    fn exact_symbol_search(&self, query: &str) -> Vec<ScoredChunk> {
        let potential: Vec<String> = extract_potential_symbols(query)
            .into_iter()
            .map(|s| s.to_lowercase())
            .collect();
        if potential.is_empty() {
            return Vec::new();
        }

        let mut scored = Vec::new();
        for chunk in self.chunks() {
            let name_lower = chunk.name_str().to_lowercase();
            if !name_lower.is_empty() && potential.iter().any(|p| *p == name_lower) {
                scored.push(ScoredChunk {
                    chunk: chunk.clone(),
                    score: 100.0,
                    distance: 0,
                    from_id: None,
                    match_kind: MatchKind::Exact,
                    match_details: format!("Exact match: {}", chunk.name_str()),
                });
                continue;
            }

            if let Some(symbol) = chunk
                .symbols
                .iter()
                .find(|s| potential.iter().any(|p| *p == s.to_lowercase()))
            {
                scored.push(ScoredChunk {
                    chunk: chunk.clone(),
                    score: 90.0,
                    distance: 0,
                    from_id: None,
                    match_kind: MatchKind::Exact,
                    match_details: format!("Symbol match: {symbol}"),
                });
            }
        }
        scored
    }

    /// Accumulative keyword scoring over names, symbols, content and paths.
    fn keyword_search(&self, query: &str, top_k: usize) -> Vec<ScoredChunk> {
        let query_lower = query.to_lowercase();
        let keywords = extract_keywords(&query_lower);
        let potential: Vec<String> = extract_potential_symbols(query)
            .into_iter()
            .map(|s| s.to_lowercase())
            .collect();

        let mut scored = Vec::new();
        for chunk in self.chunks() {
            let mut score = 0.0f64;
            let mut details = Vec::new();
            let name_lower = chunk.name_str().to_lowercase();
            let content_lower = chunk.content.to_lowercase();
            let file_lower = chunk.file.to_lowercase();

            for symbol in &potential {
                if !name_lower.is_empty() && name_lower == *symbol {
                    score += 20.0;
                    details.push(format!("name={}", chunk.name_str()));
                    break;
                }
                if !name_lower.is_empty() && name_lower.contains(symbol.as_str()) {
                    score += 10.0;
                    details.push(format!("name~{symbol}"));
                }
            }

            for chunk_symbol in &chunk.symbols {
                let symbol_lower = chunk_symbol.to_lowercase();
                for query_symbol in &potential {
                    if symbol_lower == *query_symbol {
                        score += 15.0;
                        details.push(format!("symbol={chunk_symbol}"));
                        break;
                    }
                    if symbol_lower.contains(query_symbol.as_str()) {
                        score += 7.0;
                    }
                }
                for keyword in &keywords {
                    if symbol_lower == *keyword {
                        score += 10.0;
                    } else if symbol_lower.contains(keyword.as_str()) {
                        score += 5.0;
                    }
                }
            }

            for keyword in &keywords {
                if content_lower.contains(keyword.as_str()) {
                    score += 2.0;
                    details.push(format!("keyword={keyword}"));
                }
                if file_lower.contains(keyword.as_str()) {
                    score += 1.0;
                }
            }

            score += match chunk.kind {
                eulix_vector_store::ChunkKind::Function => 1.0,
                eulix_vector_store::ChunkKind::Class => 0.8,
                eulix_vector_store::ChunkKind::Method => 0.6,
                _ => 0.0,
            };

            if score > 0.0 {
                scored.push(ScoredChunk {
                    chunk: chunk.clone(),
                    score,
                    distance: 0,
                    from_id: None,
                    match_kind: MatchKind::Keyword,
                    match_details: details.join(", "),
                });
            }
        }

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        scored
    }

    /// One-hop neighbours of the strongest candidates inherit 0.9x their
    /// source's score, their own neighbours 0.6x; farther hops are dropped.
    fn expand_with_graph(&self, candidates: Vec<ScoredChunk>) -> Vec<ScoredChunk> {
        let Some(graph) = &self.call_graph else {
            return candidates;
        };

        let mut expanded: HashMap<String, ScoredChunk> = candidates
            .iter()
            .map(|c| (c.chunk.id.clone(), c.clone()))
            .collect();

        for candidate in candidates.iter().take(GRAPH_EXPANSION_CANDIDATES) {
            for symbol in &candidate.chunk.symbols {
                let Some(node) = graph.function(symbol) else {
                    continue;
                };
                for target in node.calls.iter().chain(&node.called_by) {
                    self.absorb_neighbor(
                        &mut expanded,
                        candidate,
                        target,
                        candidate.score * 0.9,
                        1,
                    );
                    if let Some(next) = graph.function(target) {
                        for far in next.calls.iter().chain(&next.called_by) {
                            self.absorb_neighbor(
                                &mut expanded,
                                candidate,
                                far,
                                candidate.score * 0.6,
                                2,
                            );
                        }
                    }
                }
            }
        }

        let mut result: Vec<ScoredChunk> = expanded.into_values().collect();
        sort_candidates(&mut result);
        result
    }

    fn absorb_neighbor(
        &self,
        expanded: &mut HashMap<String, ScoredChunk>,
        source: &ScoredChunk,
        target: &str,
        score: f64,
        distance: usize,
    ) {
        let Some(chunk) = self
            .chunks()
            .iter()
            .find(|c| c.symbols.iter().any(|s| s == target))
        else {
            return;
        };

        match expanded.get(&chunk.id) {
            Some(existing) if existing.score >= score => {}
            _ => {
                expanded.insert(
                    chunk.id.clone(),
                    ScoredChunk {
                        chunk: chunk.clone(),
                        score,
                        distance,
                        from_id: Some(source.chunk.id.clone()),
                        match_kind: MatchKind::Graph,
                        match_details: format!("via {target}"),
                    },
                );
            }
        }
    }

    /// Fallback locality signal when no call graph exists: files contributing
    /// several candidates get a small boost.
    fn boost_hot_files(&self, mut candidates: Vec<ScoredChunk>) -> Vec<ScoredChunk> {
        if candidates.len() < HOT_FILE_MIN_CANDIDATES {
            return candidates;
        }

        let mut per_file: HashMap<&str, usize> = HashMap::new();
        for candidate in &candidates {
            *per_file.entry(candidate.chunk.file.as_str()).or_default() += 1;
        }
        let hot: Vec<String> = per_file
            .into_iter()
            .filter(|(_, count)| *count >= HOT_FILE_MIN_CHUNKS)
            .map(|(file, _)| file.to_string())
            .collect();

        for candidate in &mut candidates {
            if hot.iter().any(|f| *f == candidate.chunk.file) {
                candidate.score += self.config.hot_file_boost;
            }
        }

        sort_candidates(&mut candidates);
        candidates
    }
}

/// Exact-matched candidates rank strictly above everything else; within a
/// tier, higher score first.
fn sort_candidates(candidates: &mut [ScoredChunk]) {
    candidates.sort_by(|a, b| {
        b.match_kind
            .is_exact()
            .cmp(&a.match_kind.is_exact())
            .then_with(|| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal))
    });
}

/// Greedy budgeted selection with adjacent-chunk merging.
fn select_chunks(scored: Vec<ScoredChunk>, budget: usize) -> Vec<Chunk> {
    let mut selected: Vec<Chunk> = Vec::new();
    let mut current_tokens = 0usize;

    for candidate in scored {
        let cost = candidate.chunk.tokens + CHUNK_HEADER_TOKENS;
        if current_tokens + cost > budget {
            continue;
        }

        if let Some(last) = selected.last_mut() {
            if can_merge(last, &candidate.chunk) {
                *last = merge_chunks(last, &candidate.chunk);
                current_tokens += cost - CHUNK_HEADER_TOKENS;
                continue;
            }
        }

        selected.push(candidate.chunk);
        current_tokens += cost;
    }

    selected
}

fn can_merge(a: &Chunk, b: &Chunk) -> bool {
    if a.file != b.file {
        return false;
    }
    let gap = if a.end_line < b.start_line {
        b.start_line - a.end_line
    } else if b.end_line < a.start_line {
        a.start_line - b.end_line
    } else {
        0
    };
    gap <= MERGE_MAX_LINE_GAP
}

fn merge_chunks(a: &Chunk, b: &Chunk) -> Chunk {
    let content = if b.start_line > a.end_line {
        format!("{}\n{}", a.content, b.content)
    } else if a.start_line > b.end_line {
        format!("{}\n{}", b.content, a.content)
    } else {
        a.content.clone()
    };

    let mut symbols = a.symbols.clone();
    for symbol in &b.symbols {
        if !symbols.contains(symbol) {
            symbols.push(symbol.clone());
        }
    }

    Chunk {
        id: a.id.clone(),
        kind: a.kind,
        file: a.file.clone(),
        start_line: a.start_line.min(b.start_line),
        end_line: a.end_line.max(b.end_line),
        content,
        language: a.language.clone(),
        name: a.name.clone(),
        complexity: a.complexity,
        symbols,
        importance: a.importance.max(b.importance),
        tokens: a.tokens + b.tokens,
    }
}

fn assemble(chunks: Vec<Chunk>) -> ContextWindow {
    let mut total_tokens = 0usize;
    let mut sources: Vec<String> = Vec::new();
    let mut context_chunks = Vec::with_capacity(chunks.len());

    for chunk in chunks {
        total_tokens += chunk.tokens + CHUNK_HEADER_TOKENS;
        if !sources.contains(&chunk.file) {
            sources.push(chunk.file.clone());
        }
        context_chunks.push(ContextChunk {
            file: chunk.file,
            start_line: chunk.start_line,
            end_line: chunk.end_line,
            content: chunk.content,
            importance: chunk.importance,
        });
    }

    ContextWindow {
        chunks: context_chunks,
        total_tokens,
        sources,
    }
}

/// Tokens that plausibly name code: snake_case, mixed case, or a known verb
/// prefix.
fn extract_potential_symbols(query: &str) -> Vec<String> {
    let mut symbols = Vec::new();
    for word in query.split_whitespace() {
        let word = word.trim_matches(|c: char| ".,!?;:'\"()[]{}".contains(c));
        if word.len() <= 2 {
            continue;
        }

        let has_underscore = word.contains('_');
        let has_upper = word.chars().any(|c| c.is_ascii_uppercase());
        if has_underscore || has_upper {
            symbols.push(word.to_string());
            continue;
        }

        let lower = word.to_lowercase();
        if SYMBOL_VERB_PREFIXES.iter().any(|p| lower.starts_with(p)) {
            symbols.push(word.to_string());
        }
    }
    symbols
}

use crate::classifier::{Classification, Classifier, Intent};
use crate::context::{ContextBuilder, ContextConfig};
use crate::error::{QueryError, Result};
use crate::fuzzy::fuzzy_suggestions;
use crate::prompts;
use eulix_cache::Manager as CacheManager;
use eulix_kb::{load_call_graph, load_kb_index, CallGraph, KbIndex};
use eulix_llm::Client as LlmClient;
use eulix_vector_store::QueryEmbedder;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct RouterOptions {
    pub context: ContextConfig,
    pub embedding_dimension: usize,
    pub embedder_binary: PathBuf,
    pub embedder_model: String,
    /// Maximum depth of the transitive dependency walk.
    pub transitive_depth: usize,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            context: ContextConfig::default(),
            embedding_dimension: 384,
            embedder_binary: PathBuf::from("eulix_embed"),
            embedder_model: "BAAI/bge-small-en-v1.5".to_string(),
            transitive_depth: 2,
        }
    }
}

/// Dispatches classified queries to intent handlers.
///
/// Location, Usage and Dependency are answered from the KB artifacts alone
/// and never raise for "not found"; every other intent builds a context
/// window and consults the model endpoint. The context builder is opened
/// lazily so KB-only sessions work without retrieval artifacts.
pub struct Router {
    session_dir: PathBuf,
    opts: RouterOptions,
    classifier: Classifier,
    kb_index: Arc<KbIndex>,
    call_graph: Arc<CallGraph>,
    llm: Arc<LlmClient>,
    cache: Option<Arc<CacheManager>>,
    context_builder: Option<ContextBuilder>,
    current_checksum: String,
}

impl Router {
    pub fn new(
        session_dir: impl Into<PathBuf>,
        opts: RouterOptions,
        llm: Arc<LlmClient>,
        cache: Option<Arc<CacheManager>>,
    ) -> Result<Self> {
        let session_dir = session_dir.into();
        let kb_index = Arc::new(load_kb_index(&session_dir)?);
        let call_graph = Arc::new(load_call_graph(&session_dir)?);
        let classifier = Classifier::new(&kb_index);

        Ok(Self {
            session_dir,
            opts,
            classifier,
            kb_index,
            call_graph,
            llm,
            cache,
            context_builder: None,
            current_checksum: String::new(),
        })
    }

    pub fn set_current_checksum(&mut self, checksum: impl Into<String>) {
        self.current_checksum = checksum.into();
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Answer one question: cache lookup, classification, dispatch, and (for
    /// model-backed answers) cache write-back.
    pub async fn query(&mut self, query: &str) -> Result<String> {
        if let Some(cache) = &self.cache {
            if !self.current_checksum.is_empty() {
                if let Some(hit) = cache.get(query, &self.current_checksum).await {
                    log::debug!("Answering from cache");
                    return Ok(hit);
                }
            }
        }

        let classification = match self.classifier.classify(query) {
            Ok(classification) => classification,
            Err(QueryError::EmptyQuery) => {
                return Ok("Please ask a non-empty question.".to_string())
            }
            Err(e) => return Err(e),
        };
        log::debug!(
            "Intent {} at {:.2} ({})",
            classification.intent,
            classification.confidence,
            classification.reasoning
        );

        let (response, used_llm) = match classification.intent {
            Intent::Location => (self.handle_location(query, &classification), false),
            Intent::Usage => (self.handle_usage(query, &classification), false),
            Intent::Dependency => (self.handle_dependency(query, &classification), false),
            intent => self.handle_with_llm(intent, query, &classification).await?,
        };

        if used_llm {
            if let Some(cache) = &self.cache {
                if !self.current_checksum.is_empty() {
                    if let Err(e) = cache
                        .set(query, &response, &self.current_checksum)
                        .await
                    {
                        log::warn!("Cache write failed (answer still returned): {e}");
                    }
                }
            }
        }

        Ok(response)
    }

    fn ensure_context_builder(&mut self) -> Result<()> {
        if self.context_builder.is_none() {
            let embedder = QueryEmbedder::new(
                self.opts.embedder_binary.clone(),
                self.opts.embedder_model.clone(),
            );
            let builder = ContextBuilder::open(
                &self.session_dir,
                self.opts.context.clone(),
                self.opts.embedding_dimension,
                Some(embedder),
                Some(self.call_graph.clone()),
            )?;
            self.context_builder = Some(builder);
        }
        Ok(())
    }

    fn handle_location(&self, query: &str, class: &Classification) -> String {
        let Some(entity) = self.entity_from(query, class) else {
            return "Could not identify function or class name in query".to_string();
        };

        let mut results = Vec::new();
        if let Some(locations) = self.kb_index.functions_by_name.get(&entity) {
            results.push(format!("Function '{entity}' found at:"));
            results.extend(locations.iter().cloned());
        }
        if let Some(locations) = self.kb_index.types_by_name.get(&entity) {
            results.push(format!("Type '{entity}' found at:"));
            results.extend(locations.iter().cloned());
        }

        if results.is_empty() {
            let suggestions = fuzzy_suggestions(&entity, &self.kb_index);
            if suggestions.is_empty() {
                return format!("Function or class '{entity}' not found in the codebase");
            }
            results.push(format!("No exact match for '{entity}'. Did you mean:"));
            results.extend(suggestions);
        }

        results.join("\n")
    }

    fn handle_usage(&self, query: &str, class: &Classification) -> String {
        let Some(entity) = self.entity_from(query, class) else {
            return "Could not identify function or class name in query".to_string();
        };

        let mut results = Vec::new();

        if let Some(node) = self.call_graph.function(&entity) {
            results.push(format!("Usage Analysis for '{entity}':"));
            results.push(format!("Location: {}", node.location));
            results.push(String::new());

            if !node.calls.is_empty() {
                results.push("Calls:".to_string());
                results.extend(node.calls.iter().map(|callee| format!("  -> {callee}")));
                results.push(String::new());
            }

            if node.called_by.is_empty() {
                results.push(
                    "Not called by any other function (possibly unused or entry point)"
                        .to_string(),
                );
            } else {
                results.push("Called by:".to_string());
                results.extend(node.called_by.iter().map(|caller| format!("  <- {caller}")));
            }
        } else if let Some(node) = self.call_graph.type_node(&entity) {
            results.push(format!("Type Analysis for '{entity}':"));
            results.push(format!("Location: {}", node.location));
            results.push(String::new());
            if !node.methods.is_empty() {
                results.push("Methods:".to_string());
                results.extend(node.methods.iter().map(|method| format!("  {method}")));
            }
        } else if let Some(callers) = self.kb_index.functions_calling.get(&entity) {
            results.push(format!("Functions calling '{entity}':"));
            results.extend(callers.iter().map(|caller| format!("  <- {caller}")));
        } else {
            return format!("No usage information found for '{entity}'");
        }

        results.join("\n")
    }

    fn handle_dependency(&self, query: &str, class: &Classification) -> String {
        let Some(entity) = self.entity_from(query, class) else {
            return "Could not identify entity for dependency analysis".to_string();
        };

        let mut results = vec![format!("Dependency Analysis for '{entity}':")];

        let Some(node) = self.call_graph.function(&entity) else {
            results.push("\nNo dependency information found".to_string());
            return results.join("\n");
        };

        if !node.calls.is_empty() {
            results.push("\nDirect Dependencies (functions it calls):".to_string());
            results.extend(node.calls.iter().map(|dep| format!("  -> {dep}")));
        }
        if !node.called_by.is_empty() {
            results.push("\nDependent Functions (functions that call it):".to_string());
            results.extend(node.called_by.iter().map(|caller| format!("  <- {caller}")));
        }

        let transitive = self
            .call_graph
            .transitive_callees(&entity, self.opts.transitive_depth);
        if !transitive.is_empty() {
            results.push("\nTransitive Dependencies:".to_string());
            results.extend(transitive.iter().map(|dep| format!("  => {dep}")));
        }

        results.join("\n")
    }

    async fn handle_with_llm(
        &mut self,
        intent: Intent,
        query: &str,
        class: &Classification,
    ) -> Result<(String, bool)> {
        if intent == Intent::Comparison && class.symbols.len() < 2 {
            return Ok((
                "Comparison requires at least two entities. Please specify which functions/types to compare."
                    .to_string(),
                false,
            ));
        }

        self.ensure_context_builder()?;
        let builder = self
            .context_builder
            .as_ref()
            .expect("context builder just ensured");
        let context = match builder.build_context(query).await {
            Ok(context) => context,
            // No room for a context window: fall back to an index answer
            // when the query named something we can at least locate.
            Err(QueryError::BudgetExhausted { .. }) if !class.symbols.is_empty() => {
                let locations = self.handle_location(query, class);
                return Ok((
                    format!(
                        "The model's token window is too small to assemble code context.\n\
                         Known locations instead:\n{locations}"
                    ),
                    false,
                ));
            }
            Err(e) => return Err(e),
        };

        let prompt = match intent {
            Intent::Implementation => {
                let mut relevant_files = Vec::new();
                for symbol in &class.symbols {
                    if let Some(locations) = self.kb_index.functions_by_name.get(symbol) {
                        relevant_files.extend(locations.iter().cloned());
                    }
                    if let Some(locations) = self.kb_index.types_by_name.get(symbol) {
                        relevant_files.extend(locations.iter().cloned());
                    }
                }
                prompts::implementation(query, &class.symbols, &relevant_files)
            }
            Intent::Architecture => {
                prompts::architecture(query, &self.architecture_info(&class.symbols))
            }
            Intent::Debug => prompts::debug(query, &class.symbols),
            Intent::Comparison => prompts::comparison(query, &class.symbols),
            Intent::Refactoring => prompts::refactoring(query, &class.symbols),
            Intent::Performance => prompts::performance(query, &class.symbols),
            Intent::DataFlow => {
                prompts::data_flow(query, &self.call_flow_info(&class.symbols), &class.symbols)
            }
            Intent::Security => prompts::security(query, &class.symbols),
            Intent::Documentation => prompts::documentation(query, &class.symbols),
            Intent::Example => prompts::example(query, &class.symbols),
            Intent::Testing => prompts::testing(query, &class.symbols),
            _ => prompts::understanding(query, class),
        };

        let response = self.llm.query(&context, &prompt).await?;
        Ok((response, true))
    }

    fn architecture_info(&self, symbols: &[String]) -> String {
        let mut info = String::new();
        for symbol in symbols {
            if let Some(node) = self.call_graph.function(symbol) {
                info.push_str(&format!("\n{symbol}:\nLocation: {}\n", node.location));
                if !node.calls.is_empty() {
                    info.push_str(&format!("Calls: [{}]\n", node.calls.join(", ")));
                }
                if !node.called_by.is_empty() {
                    info.push_str(&format!("Called by: [{}]\n", node.called_by.join(", ")));
                }
            }
        }
        info
    }

    fn call_flow_info(&self, symbols: &[String]) -> String {
        let mut info = String::new();
        for symbol in symbols {
            if let Some(node) = self.call_graph.function(symbol) {
                info.push_str(&format!("\n{symbol} -> [{}]", node.calls.join(", ")));
            }
        }
        info
    }

    fn entity_from(&self, query: &str, class: &Classification) -> Option<String> {
        if let Some(symbol) = class.symbols.first() {
            return Some(symbol.clone());
        }
        extract_entity_name(query)
    }
}

/// Last-resort entity extraction when the classifier validated nothing:
/// the first token that looks like an identifier, else the first
/// non-stopword.
fn extract_entity_name(query: &str) -> Option<String> {
    const STOP_WORDS: &[&str] = &[
        "where", "is", "the", "function", "class", "method", "type", "find", "locate", "what",
        "does", "do", "who", "calls", "uses", "used", "a", "an", "this", "that", "how", "can",
        "will", "should",
    ];

    let words: Vec<&str> = query
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric() && c != '_'))
        .filter(|w| !w.is_empty())
        .collect();

    for word in &words {
        if STOP_WORDS.contains(&word.to_lowercase().as_str()) {
            continue;
        }
        if is_likely_symbol(word) {
            return Some(word.to_string());
        }
    }

    words
        .iter()
        .find(|w| !STOP_WORDS.contains(&w.to_lowercase().as_str()))
        .map(|w| w.to_string())
}

fn is_likely_symbol(word: &str) -> bool {
    if word.contains('_') {
        return true;
    }
    let mut chars = word.chars();
    match chars.next() {
        Some(first) if first.is_ascii_uppercase() => chars.any(|c| c.is_ascii_lowercase()),
        _ => false,
    }
}

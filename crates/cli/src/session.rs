use crate::config::Config;
use anyhow::{bail, Context};
use eulix_cache::{CacheOptions, FastOptions, Manager as CacheManager};
use eulix_checksum::{ChangeAction, Checksum, Detector, Thresholds};
use eulix_llm::{Client as LlmClient, LlmOptions};
use eulix_query::{ContextConfig, Router, RouterOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const SESSION_DIR: &str = ".eulix";
pub const EMBEDDER_BINARY: &str = "eulix_embed";

/// Result of comparing the tree against the last analysis.
pub struct Freshness {
    pub current: Checksum,
    pub stored: Option<Checksum>,
    pub fraction: f64,
    pub action: ChangeAction,
}

/// A ready-to-query session: artifacts validated, cache connected, router
/// wired up with the current tree checksum.
pub struct Session {
    pub router: Router,
    pub cache: Option<Arc<CacheManager>>,
    pub checksum: Checksum,
}

pub fn project_root(config: &Config) -> PathBuf {
    PathBuf::from(&config.project.path)
}

pub fn session_dir(config: &Config) -> PathBuf {
    project_root(config).join(SESSION_DIR)
}

/// Hash the tree and grade the drift against the stored record.
pub fn check_freshness(config: &Config) -> anyhow::Result<Freshness> {
    let root = project_root(config);
    let dir = session_dir(config);
    if !dir.exists() {
        bail!(
            "Eulix is not initialized for this project\n\
             Hint: run `eulix analyze` to build the knowledge base and embeddings"
        );
    }

    let detector = Detector::new(&root)?;
    let current = detector.calculate().context("failed to hash source tree")?;
    let stored = detector
        .load(&dir)
        .context("failed to read stored checksum")?;

    // A missing record means analysis never completed: treat as full change.
    let fraction = stored
        .as_ref()
        .map(|s| Detector::compare(s, &current))
        .unwrap_or(1.0);
    let action = ChangeAction::for_fraction(
        fraction,
        Thresholds {
            change: config.checksum.change_threshold,
            force_reanalyze: config.checksum.force_reanalyze_threshold,
        },
    );

    Ok(Freshness {
        current,
        stored,
        fraction,
        action,
    })
}

/// Build the cache manager from config; `Ok(None)` when caching is disabled.
pub async fn connect_cache(config: &Config) -> anyhow::Result<Option<Arc<CacheManager>>> {
    let root = project_root(config);
    let opts = CacheOptions {
        fast: config.cache.redis.enabled.then(|| FastOptions {
            url: config.cache.redis.url.clone(),
            ttl_hours: config.cache.redis.ttl_hours,
        }),
        durable_path: config
            .cache
            .sql
            .enabled
            .then(|| resolve_dsn(&root, &config.cache.sql.dsn)),
    };

    Ok(CacheManager::connect(opts).await?.map(Arc::new))
}

fn resolve_dsn(root: &Path, dsn: &str) -> PathBuf {
    let path = PathBuf::from(dsn);
    if path.is_absolute() {
        path
    } else {
        root.join(path)
    }
}

/// Gate on tree drift, then wire the full pipeline.
pub async fn start(config: &Config, assume_yes: bool) -> anyhow::Result<Session> {
    let freshness = check_freshness(config)?;
    match freshness.action {
        ChangeAction::Reuse => {}
        ChangeAction::Warn => {
            if !assume_yes && !confirm_continue(freshness.fraction)? {
                bail!("Aborted: re-run after `eulix analyze` to refresh the knowledge base");
            }
            log::warn!(
                "Proceeding with {:.0}% of files changed since the last analysis",
                freshness.fraction * 100.0
            );
        }
        ChangeAction::Refuse => {
            bail!(
                "Source tree changed too much since the last analysis ({:.0}% of files)\n\
                 Hint: run `eulix analyze` to rebuild the knowledge base and embeddings",
                freshness.fraction * 100.0
            );
        }
    }

    let cache = connect_cache(config).await?;

    let llm = Arc::new(LlmClient::new(LlmOptions {
        local: config.llm.local,
        provider: config.llm.provider.clone(),
        model: config.llm.model.clone(),
        api_key: config.llm.api_key.clone(),
        max_tokens: config.llm.max_tokens,
        temperature: config.llm.temperature,
        base_url: config.llm.base_url.clone(),
    })?);

    let opts = RouterOptions {
        context: ContextConfig {
            max_tokens: config.llm.max_tokens,
            semantic_threshold: config.context.semantic_threshold,
            hot_file_boost: config.context.hot_file_boost,
            top_k: 100,
        },
        embedding_dimension: config.embeddings.dimension,
        embedder_binary: project_root(config).join(EMBEDDER_BINARY),
        embedder_model: config.embeddings.model.clone(),
        transitive_depth: 2,
    };

    let mut router = Router::new(session_dir(config), opts, llm, cache.clone())?;
    router.set_current_checksum(freshness.current.hash.clone());

    Ok(Session {
        router,
        cache,
        checksum: freshness.current,
    })
}

fn confirm_continue(fraction: f64) -> anyhow::Result<bool> {
    print!(
        "{:.0}% of source files changed since the last analysis. Continue anyway? [y/N] ",
        fraction * 100.0
    );
    std::io::stdout().flush()?;

    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    let answer = answer.trim().to_lowercase();
    Ok(answer == "y" || answer == "yes")
}

//! CLI subcommand handlers and the composition root.

use crate::output;
use crate::{Commands, ConfigAction};
use quill_core::config::{QuillConfig, config_sources, load_config};
use quill_core::embeddings::{Embedder, create_embedder};
use quill_core::index::{Indexer, SqliteChunkStore, TantivyLexicalIndex};
use quill_core::pipeline::{AnswerPipeline, AnswerRequest};
use quill_core::providers::build_generator;
use quill_core::retrieval::{
    FusionConfig, FusionEngine, HybridRetriever, KeywordSearcher, MetadataFilter, SemanticSearcher,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Handle a CLI subcommand.
pub async fn handle_command(command: Commands, workspace: &Path) -> anyhow::Result<()> {
    match command {
        Commands::Ask {
            question,
            top_k,
            min_similarity,
            semantic_only,
            source_type,
            topic,
            json,
        } => {
            let mut request = AnswerRequest::new(question)
                .filter(build_filter(source_type.as_deref(), topic.as_deref()));
            request.top_k = top_k;
            request.min_similarity = min_similarity;
            if semantic_only {
                request = request.hybrid(false);
            }
            handle_ask(&request, json, workspace).await
        }
        Commands::Index { path, batch_size } => handle_index(&path, batch_size, workspace).await,
        Commands::Config { action } => handle_config(action, workspace),
    }
}

/// Load configuration for `workspace` and report suspicious settings.
pub(crate) fn load(workspace: &Path) -> anyhow::Result<QuillConfig> {
    let config = load_config(Some(workspace), None)
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
    config.require_fields()?;
    for warning in config.validate() {
        warn!("{}", warning);
    }
    Ok(config)
}

/// Open both indexes for the configured embedder.
fn open_indexes(
    config: &QuillConfig,
    workspace: &Path,
) -> anyhow::Result<(Arc<dyn Embedder>, SqliteChunkStore, TantivyLexicalIndex)> {
    let index = config.index.rooted_at(workspace);
    let embedder = create_embedder(&config.embedding)?;
    let store = SqliteChunkStore::open(&index.chunks_db_path(), &embedder.model_id())?;
    let lexical = TantivyLexicalIndex::open(&index.lexical_index_path())?;
    Ok((embedder, store, lexical))
}

/// Wire configuration into a ready pipeline.
pub(crate) async fn build_pipeline(
    config: &QuillConfig,
    workspace: &Path,
) -> anyhow::Result<AnswerPipeline> {
    let (embedder, store, lexical) = open_indexes(config, workspace)?;

    let chunks = store.count().await?;
    if chunks == 0 {
        warn!(
            path = %store.path().display(),
            "Index is empty; load chunks with `quill index <chunks.jsonl>`"
        );
    }
    info!(chunks, embedder = %embedder.model_id(), "Opened index");

    let store = Arc::new(store);
    let retriever = HybridRetriever::new(
        SemanticSearcher::new(embedder, store.clone()),
        KeywordSearcher::new(Arc::new(lexical), store),
        FusionEngine::new(FusionConfig::from(&config.retrieval)),
    )
    .with_over_retrieval(config.retrieval.over_retrieval_factor)
    .with_hybrid(config.retrieval.hybrid);

    let generator = build_generator(&config.generation)?;
    info!(providers = ?generator.provider_chain(), "Inference providers ready");

    Ok(AnswerPipeline::new(retriever, generator).with_defaults(&config.retrieval))
}

/// `--source-type` and `--topic` combined with AND.
pub(crate) fn build_filter(source_type: Option<&str>, topic: Option<&str>) -> Option<MetadataFilter> {
    let mut filters = Vec::new();
    if let Some(source_type) = source_type {
        filters.push(MetadataFilter::equals("source_type", source_type));
    }
    if let Some(topic) = topic {
        filters.push(MetadataFilter::contains("topic_categories", topic));
    }
    MetadataFilter::all_of(filters)
}

async fn handle_ask(request: &AnswerRequest, json: bool, workspace: &Path) -> anyhow::Result<()> {
    let config = load(workspace)?;
    let pipeline = build_pipeline(&config, workspace).await?;
    let result = pipeline.answer_with(request).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print!("{}", output::render_result(&result, true));
    }
    Ok(())
}

async fn handle_index(path: &Path, batch_size: usize, workspace: &Path) -> anyhow::Result<()> {
    let config = load(workspace)?;
    let (embedder, store, lexical) = open_indexes(&config, workspace)?;
    let model = embedder.model_id();

    let indexer = Indexer::new(embedder, store.clone(), lexical).with_batch_size(batch_size);
    let report = indexer.index_jsonl(path).await?;
    let total = store.count().await?;

    println!(
        "Indexed {} chunk(s) from {} ({} skipped). Store now holds {} chunk(s) embedded with {}.",
        report.indexed,
        path.display(),
        report.skipped,
        total,
        model
    );
    Ok(())
}

fn handle_config(action: ConfigAction, workspace: &Path) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load(workspace)?;
            let toml_str = toml::to_string_pretty(&config)?;
            println!("{}", toml_str);
            Ok(())
        }
        ConfigAction::Path => {
            for (path, exists) in config_sources(Some(workspace)) {
                let marker = if exists { "found" } else { "missing" };
                println!("config  {:<8} {}", marker, path.display());
            }
            let config = load(workspace)?;
            let index = config.index.rooted_at(workspace);
            println!("chunks  {:<8} {}", "", index.chunks_db_path().display());
            println!("lexical {:<8} {}", "", index.lexical_index_path().display());
            Ok(())
        }
    }
}

//! Code implementing the "search *" sub commands.

use std::{io::BufRead, path::PathBuf, time::Instant};

use clap::Parser;
use thousands::Separable;

use crate::{
    common::{
        io::{open_read_maybe_gz, read_json_maybe_gz, write_json_maybe_gz},
        trace_rss_now, GenomeRelease,
    },
    search::{
        dataset::{DatasetKey, DatasetType, SampleType},
        schema::{
            data::SampleRecord,
            query::{Gene, SearchSpec},
        },
        store::in_memory::InMemoryStore,
        SearchConfig, SearchEngine,
    },
};

/// Store and engine limits shared by the sub commands.
#[derive(clap::Args, Debug, Clone)]
pub struct EngineArgs {
    /// Genome release to assume.
    #[arg(long, value_enum)]
    pub genome_release: GenomeRelease,
    /// Path to the store snapshot JSON file, may be gzip-compressed.
    #[arg(long, required = true)]
    pub path_store: String,
    /// Maximal number of results of a single query pass.
    #[arg(long, default_value_t = 10_000)]
    pub max_variants: usize,
    /// Phenotype prioritization ranks above this value are ignored for sorting.
    #[arg(long, default_value_t = 100)]
    pub max_prioritized_gene_rank: i32,
}

impl From<&EngineArgs> for SearchConfig {
    fn from(value: &EngineArgs) -> Self {
        Self {
            max_variants: value.max_variants,
            max_prioritized_gene_rank: value.max_prioritized_gene_rank,
        }
    }
}

/// Load the store snapshot.
fn load_store(args: &EngineArgs) -> Result<InMemoryStore, anyhow::Error> {
    tracing::info!("Loading store...");
    let before_loading = Instant::now();
    let store = InMemoryStore::load(std::path::Path::new(&args.path_store))?;
    tracing::info!("...done loading store in {:?}", before_loading.elapsed());
    trace_rss_now();
    Ok(store)
}

/// Load the sample records from a JSON array.
fn load_samples(path: &str) -> Result<Vec<SampleRecord>, anyhow::Error> {
    let samples: Vec<SampleRecord> = read_json_maybe_gz(path)?;
    tracing::info!(
        "loaded {} sample records",
        samples.len().separate_with_commas()
    );
    Ok(samples)
}

/// Command line arguments for `search run` sub command.
#[derive(Parser, Debug)]
#[command(author, version, about = "Run variant search", long_about = None)]
pub struct RunArgs {
    #[command(flatten)]
    pub engine: EngineArgs,
    /// Path to the sample records JSON file.
    #[arg(long, required = true)]
    pub path_samples: String,
    /// Path to the search specification JSON file.
    #[arg(long, required = true)]
    pub path_query: String,
    /// Path to the output JSON file.
    #[arg(long, required = true)]
    pub path_output: PathBuf,
    /// The page of results to write, starting at 1.
    #[arg(long, default_value_t = 1)]
    pub page: usize,
    /// Number of results per page.
    #[arg(long, default_value_t = 100)]
    pub num_results: usize,
    /// Name of the sort order, defaults to genomic position.
    #[arg(long)]
    pub sort: Option<String>,
}

/// Main entry point for `search run` sub command.
pub fn run(args_common: &crate::common::Args, args: &RunArgs) -> Result<(), anyhow::Error> {
    let before_anything = Instant::now();
    tracing::info!("args_common = {:?}", &args_common);
    tracing::info!("args = {:?}", &args);

    let store = load_store(&args.engine)?;
    let samples = load_samples(&args.path_samples)?;
    let spec: SearchSpec = read_json_maybe_gz(&args.path_query)?;
    tracing::debug!("query = {}", &serde_json::to_string(&spec)?);

    let engine = SearchEngine::new(
        &store,
        &store,
        &store,
        args.engine.genome_release,
        SearchConfig::from(&args.engine),
    );
    let results = engine.search(
        &samples,
        &spec,
        args.page,
        args.num_results,
        args.sort.as_deref(),
    )?;
    write_json_maybe_gz(&args.path_output, &results)?;

    tracing::info!(
        "All of `search run` completed in {:?}",
        before_anything.elapsed()
    );
    Ok(())
}

/// Command line arguments for `search lookup` sub command.
#[derive(Parser, Debug)]
#[command(author, version, about = "Look up a single variant", long_about = None)]
pub struct LookupArgs {
    #[command(flatten)]
    pub engine: EngineArgs,
    /// Identifier of the variant, `chrom-pos-ref-alt` for short variants.
    #[arg(long, required = true)]
    pub variant_id: String,
    /// Dataset type of the variant.
    #[arg(long, default_value = "SNV_INDEL")]
    pub dataset_type: DatasetType,
    /// Sample type, required for structural variants.
    #[arg(long, value_enum)]
    pub sample_type: Option<SampleType>,
    /// Optional path to sample records, restricts the lookup to their families.
    #[arg(long)]
    pub path_samples: Option<String>,
    /// Path to the output JSON file.
    #[arg(long, required = true)]
    pub path_output: PathBuf,
}

/// Main entry point for `search lookup` sub command.
pub fn run_lookup(args_common: &crate::common::Args, args: &LookupArgs) -> Result<(), anyhow::Error> {
    let before_anything = Instant::now();
    tracing::info!("args_common = {:?}", &args_common);
    tracing::info!("args = {:?}", &args);

    let store = load_store(&args.engine)?;
    let engine = SearchEngine::new(
        &store,
        &store,
        &store,
        args.engine.genome_release,
        SearchConfig::from(&args.engine),
    );
    if let Some(path_samples) = args.path_samples.as_ref() {
        let samples = load_samples(path_samples)?;
        let result = engine.variant_by_id(&args.variant_id, &samples, args.dataset_type)?;
        write_json_maybe_gz(&args.path_output, &result)?;
    } else {
        let result = engine.lookup(&args.variant_id, args.dataset_type, args.sample_type)?;
        write_json_maybe_gz(&args.path_output, &result)?;
    }

    tracing::info!(
        "All of `search lookup` completed in {:?}",
        before_anything.elapsed()
    );
    Ok(())
}

/// Command line arguments for `search gene-lookup` sub command.
#[derive(Parser, Debug)]
#[command(author, version, about = "Look up the variants in a gene", long_about = None)]
pub struct GeneLookupArgs {
    #[command(flatten)]
    pub engine: EngineArgs,
    /// Identifier of the gene.
    #[arg(long, required = true)]
    pub gene_id: String,
    /// Optional path to a search specification JSON file with annotation filters.
    #[arg(long)]
    pub path_query: Option<String>,
    /// Path to the output JSON file.
    #[arg(long, required = true)]
    pub path_output: PathBuf,
}

/// Main entry point for `search gene-lookup` sub command.
pub fn run_gene_lookup(
    args_common: &crate::common::Args,
    args: &GeneLookupArgs,
) -> Result<(), anyhow::Error> {
    let before_anything = Instant::now();
    tracing::info!("args_common = {:?}", &args_common);
    tracing::info!("args = {:?}", &args);

    let store = load_store(&args.engine)?;
    let spec: SearchSpec = match args.path_query.as_ref() {
        Some(path_query) => read_json_maybe_gz(path_query)?,
        None => SearchSpec::default(),
    };
    let engine = SearchEngine::new(
        &store,
        &store,
        &store,
        args.engine.genome_release,
        SearchConfig::from(&args.engine),
    );
    let gene = Gene {
        gene_id: args.gene_id.clone(),
        ..Default::default()
    };
    let results = engine.gene_lookup(&gene, &spec)?;
    tracing::info!(
        "found {} variants in {}",
        results.len().separate_with_commas(),
        &args.gene_id
    );
    write_json_maybe_gz(&args.path_output, &results)?;

    tracing::info!(
        "All of `search gene-lookup` completed in {:?}",
        before_anything.elapsed()
    );
    Ok(())
}

/// Command line arguments for `search key-lookup` sub command.
#[derive(Parser, Debug)]
#[command(author, version, about = "Translate variant identifiers to keys", long_about = None)]
pub struct KeyLookupArgs {
    #[command(flatten)]
    pub engine: EngineArgs,
    /// Dataset key, e.g., `SNV_INDEL` or `SV_WGS`.
    #[arg(long, default_value = "SNV_INDEL")]
    pub dataset_key: DatasetKey,
    /// Path to a text file with one variant identifier per line.
    #[arg(long, required = true)]
    pub path_variant_ids: String,
    /// Write identifiers by key instead of keys by identifier.
    #[arg(long, default_value_t = false)]
    pub reverse: bool,
    /// Path to the output JSON file.
    #[arg(long, required = true)]
    pub path_output: PathBuf,
}

/// Main entry point for `search key-lookup` sub command.
pub fn run_key_lookup(
    args_common: &crate::common::Args,
    args: &KeyLookupArgs,
) -> Result<(), anyhow::Error> {
    let before_anything = Instant::now();
    tracing::info!("args_common = {:?}", &args_common);
    tracing::info!("args = {:?}", &args);

    let store = load_store(&args.engine)?;
    let mut variant_ids = Vec::new();
    for line in open_read_maybe_gz(&args.path_variant_ids)?.lines() {
        let line = line?;
        let line = line.trim();
        if !line.is_empty() {
            variant_ids.push(line.to_owned());
        }
    }
    let engine = SearchEngine::new(
        &store,
        &store,
        &store,
        args.engine.genome_release,
        SearchConfig::from(&args.engine),
    );
    let lookup = engine.key_lookup(args.dataset_key, &variant_ids, args.reverse)?;
    tracing::info!(
        "translated {} of {} variant identifiers",
        lookup.len().separate_with_commas(),
        variant_ids.len().separate_with_commas()
    );
    write_json_maybe_gz(&args.path_output, &lookup)?;

    tracing::info!(
        "All of `search key-lookup` completed in {:?}",
        before_anything.elapsed()
    );
    Ok(())
}

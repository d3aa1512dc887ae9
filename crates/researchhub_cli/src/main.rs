//! Operator CLI for the research registry.
//!
//! # Responsibility
//! - Open every configured backend, run one command, print the result.
//! - Keep all domain behavior in `researchhub_core`.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::{debug, warn};
use researchhub_core::db::open_db_with;
use researchhub_core::model::split_list;
use researchhub_core::repo::graph_repo::GraphStore;
use researchhub_core::service::lookup_service::LookupSource;
use researchhub_core::{
    init_logging, DocumentStore, NewProject, NewResearcher, RankingMetric, ResearchDirectory,
    SqliteCache, SqliteDocumentStore, SqliteGraphStore, StackConfig, SystemClock, WriteTargets,
};
use rusqlite::Connection;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "researchhub", version, about = "Research collaboration registry")]
struct Cli {
    /// Stack configuration file
    #[arg(long, short, default_value = "researchhub.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List researchers on every primary backend
    Researchers,
    /// List projects on every primary backend
    Projects,
    /// List publications on every primary backend
    Publications,
    /// Add a researcher
    AddResearcher {
        name: String,
        #[arg(long, default_value = "")]
        department: String,
        /// Comma-separated research interests
        #[arg(long, default_value = "")]
        interests: String,
        /// Backend to write to; repeat for several. Defaults to all.
        #[arg(long = "target")]
        targets: Vec<String>,
    },
    /// Add a project and any missing publications
    AddProject {
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        /// Comma-separated participant names
        #[arg(long, default_value = "")]
        participants: String,
        /// Comma-separated publication titles
        #[arg(long, default_value = "")]
        publications: String,
        #[arg(long = "target")]
        targets: Vec<String>,
    },
    /// Show rankings from the relationship graph
    Analytics {
        #[arg(long, value_enum, default_value_t = MetricArg::Projects)]
        metric: MetricArg,
        #[arg(long, default_value_t = 5)]
        limit: u32,
        /// Rank co-author pairs instead of researchers
        #[arg(long)]
        pairs: bool,
    },
    /// Show one researcher and their projects
    Researcher {
        name: String,
        /// Only read the cached snapshot
        #[arg(long)]
        cached: bool,
    },
    /// Show one project and its participants' relationships
    Project { title: String },
    /// List every co-author and teammate relationship in the graph
    Relationships,
    /// List a project's members as recorded in the graph
    Members { title: String },
    /// Re-derive the graph from the first primary backend
    RebuildGraph,
    /// Copy records missing on a backend from the first primary backend
    Reconcile { target: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum MetricArg {
    Projects,
    Publications,
    Collaborators,
}

impl From<MetricArg> for RankingMetric {
    fn from(value: MetricArg) -> Self {
        match value {
            MetricArg::Projects => RankingMetric::Projects,
            MetricArg::Publications => RankingMetric::Publications,
            MetricArg::Collaborators => RankingMetric::Collaborators,
        }
    }
}

struct Connections {
    primaries: Vec<(String, Connection)>,
    cache: Connection,
    graph: Connection,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = StackConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    if let Some(logging) = &config.logging {
        init_logging(logging).context("starting logging")?;
    }

    let connections = open_connections(&config)?;
    let documents = connections
        .primaries
        .iter()
        .map(|(name, conn)| SqliteDocumentStore::try_new(name.as_str(), conn))
        .collect::<Result<Vec<_>, _>>()?;
    let cache = SqliteCache::try_new(
        config.cache.name.as_str(),
        &connections.cache,
        Arc::new(SystemClock),
    )?;
    match cache.purge_expired() {
        Ok(removed) => debug!("event=cache_purge module=cli status=ok removed={removed}"),
        Err(err) => warn!("event=cache_purge module=cli status=error error={err}"),
    }
    let graph = SqliteGraphStore::try_new(config.graph.name.as_str(), &connections.graph)?;

    let primaries: Vec<&dyn DocumentStore> = documents
        .iter()
        .map(|store| store as &dyn DocumentStore)
        .collect();
    let directory = ResearchDirectory::new(&cache, primaries, &graph, config.cache_settings())?;

    run(&directory, &graph, cli.command)
}

fn open_connections(config: &StackConfig) -> Result<Connections> {
    let options = config.open_options();
    let mut primaries = Vec::with_capacity(config.primary.len());
    for backend in &config.primary {
        let conn = open_db_with(&backend.path, options)
            .with_context(|| format!("opening primary backend `{}`", backend.name))?;
        primaries.push((backend.name.clone(), conn));
    }
    let cache = open_db_with(&config.cache.path, options)
        .with_context(|| format!("opening cache backend `{}`", config.cache.name))?;
    let graph = open_db_with(&config.graph.path, options)
        .with_context(|| format!("opening graph backend `{}`", config.graph.name))?;
    Ok(Connections {
        primaries,
        cache,
        graph,
    })
}

fn run(directory: &ResearchDirectory<'_>, graph: &dyn GraphStore, command: Command) -> Result<()> {
    match command {
        Command::Researchers => {
            for listing in directory.list_researchers()? {
                println!("[{}] {} researcher(s)", listing.backend, listing.items.len());
                for researcher in listing.items {
                    println!(
                        "  {} | {} | {}",
                        researcher.name,
                        researcher.department,
                        researcher.interests.join(", ")
                    );
                }
            }
        }
        Command::Projects => {
            for listing in directory.list_projects()? {
                println!("[{}] {} project(s)", listing.backend, listing.items.len());
                for project in listing.items {
                    println!(
                        "  {} | participants: {} | publications: {}",
                        project.title,
                        project.participants.join(", "),
                        project.publications.join(", ")
                    );
                }
            }
        }
        Command::Publications => {
            for listing in directory.list_publications()? {
                println!("[{}] {} publication(s)", listing.backend, listing.items.len());
                for publication in listing.items {
                    println!(
                        "  {} | authors: {} | project: {}",
                        publication.title,
                        publication.authors.join(", "),
                        publication.project.as_deref().unwrap_or("-")
                    );
                }
            }
        }
        Command::AddResearcher {
            name,
            department,
            interests,
            targets,
        } => {
            let outcome = directory.add_researcher(
                NewResearcher {
                    name,
                    department,
                    interests: split_list(&interests),
                },
                &write_targets(targets),
            )?;
            println!(
                "added researcher {} ({}) to {}",
                outcome.record.name,
                outcome.record.id,
                outcome.report.succeeded.join(", ")
            );
        }
        Command::AddProject {
            title,
            description,
            participants,
            publications,
            targets,
        } => {
            let outcome = directory.add_project(
                NewProject {
                    title,
                    description,
                    participants: split_list(&participants),
                    publications: split_list(&publications),
                },
                &write_targets(targets),
            )?;
            println!(
                "added project {} ({}) to {}",
                outcome.record.title,
                outcome.record.id,
                outcome.report.succeeded.join(", ")
            );
        }
        Command::Analytics {
            metric,
            limit,
            pairs,
        } => {
            if pairs {
                for (rank, pair) in directory.top_collaboration_pairs(limit)?.iter().enumerate() {
                    println!(
                        "{:>2}. {} & {}: {} shared publication(s)",
                        rank + 1,
                        pair.first,
                        pair.second,
                        pair.shared_publications
                    );
                }
            } else {
                let metric = RankingMetric::from(metric);
                for (rank, row) in directory.top_researchers(metric, limit)?.iter().enumerate() {
                    println!(
                        "{:>2}. {}: {} {}",
                        rank + 1,
                        row.name,
                        row.count,
                        metric.as_str()
                    );
                }
            }
        }
        Command::Researcher { name, cached: true } => match directory.lookup().cached(&name)? {
            None => println!("no cached researcher named {name}"),
            Some(researcher) => {
                println!("{} ({})", researcher.name, researcher.id);
                println!("  department: {}", researcher.department);
                println!("  interests: {}", researcher.interests.join(", "));
            }
        },
        Command::Researcher { name, cached: false } => match directory.researcher_profile(&name)? {
            None => println!("no researcher named {name}"),
            Some(profile) => {
                let source = match &profile.source {
                    LookupSource::Cache => "cache".to_string(),
                    LookupSource::Primary { backend } => backend.clone(),
                    LookupSource::NotFound => "-".to_string(),
                };
                println!("{} ({})", profile.researcher.name, profile.researcher.id);
                println!("  department: {}", profile.researcher.department);
                println!("  interests: {}", profile.researcher.interests.join(", "));
                println!("  projects: {}", profile.projects.join(", "));
                println!("  source: {source}");
            }
        },
        Command::Project { title } => match directory.project_profile(&title)? {
            None => println!("no project titled {title}"),
            Some(profile) => {
                println!("{} [{}]", profile.project.title, profile.backend);
                println!("  description: {}", profile.project.description);
                println!("  participants: {}", profile.project.participants.join(", "));
                for (kind, members) in &profile.relationships {
                    let members: Vec<&str> = members.iter().map(String::as_str).collect();
                    println!("  {kind}: {}", members.join(", "));
                }
            }
        },
        Command::Relationships => {
            let relationships = directory.peer_relationships()?;
            println!("{} relationship(s)", relationships.len());
            for relationship in relationships {
                println!(
                    "  {} -[{}]-> {}",
                    relationship.from, relationship.kind, relationship.to
                );
            }
        }
        Command::Members { title } => {
            let members = directory.project_members(&title)?;
            if members.is_empty() {
                println!("no members of {title} in the graph");
            } else {
                println!("{title}: {}", members.join(", "));
            }
        }
        Command::RebuildGraph => {
            let summary = directory.rebuild_graph()?;
            let counts = graph.counts()?;
            println!(
                "rebuilt graph from {} researcher(s), {} project(s), {} publication(s): {} node(s), {} edge(s)",
                summary.researchers,
                summary.projects,
                summary.publications,
                counts.nodes,
                counts.edges
            );
        }
        Command::Reconcile { target } => {
            let summary = directory.reconcile(&target)?;
            println!(
                "copied {} researcher(s), {} project(s), {} publication(s) to {target}",
                summary.researchers, summary.projects, summary.publications
            );
        }
    }
    Ok(())
}

fn write_targets(targets: Vec<String>) -> WriteTargets {
    if targets.is_empty() {
        WriteTargets::All
    } else {
        WriteTargets::Only(targets)
    }
}

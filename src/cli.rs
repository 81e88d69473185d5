use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::model::DistanceMetric;

#[derive(Parser, Debug)]
#[command(
    name = "bookrag",
    version,
    about = "Retrieval and validation tooling for the book content vector index"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Query(QueryArgs),
    Status(StatusArgs),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum DistanceMetricArg {
    Cosine,
    Euclidean,
    Dot,
}

impl DistanceMetricArg {
    pub fn to_metric(self) -> DistanceMetric {
        match self {
            Self::Cosine => DistanceMetric::Cosine,
            Self::Euclidean => DistanceMetric::Euclidean,
            Self::Dot => DistanceMetric::Dot,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    /// Free-text query; all words are joined into one query string
    #[arg(value_name = "WORDS")]
    pub query: Vec<String>,

    #[arg(long)]
    pub top_k: Option<usize>,

    #[arg(long)]
    pub score_threshold: Option<f32>,

    #[arg(long)]
    pub source_url: Option<String>,

    #[arg(long)]
    pub section: Option<String>,

    #[arg(long, value_enum, default_value_t = DistanceMetricArg::Cosine)]
    pub metric: DistanceMetricArg,

    #[arg(long, default_value_t = false)]
    pub with_vectors: bool,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value_t = 3)]
    pub samples: usize,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

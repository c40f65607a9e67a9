use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start mm as a service.
    Daemon {},

    /// Run a query through the full pipeline: embed, retrieve, decide
    Query {
        /// Free-text query
        query: String,
    },

    /// Rank memories against a query, without a display decision
    Search {
        /// Free-text query
        query: String,

        /// How many candidates to return.
        /// Defaults to the configured search depth.
        #[clap(short, long)]
        k: Option<usize>,
    },

    /// Re-embed every memory and rewrite the vector cache
    BuildIndex {},

    /// Print collection and model statistics
    Stats {},

    /// List memories whose location contains the given text
    Location {
        /// Location substring, case-insensitive
        location: String,
    },

    /// Show which intent categories a query triggers
    Analyze {
        /// Free-text query
        query: String,
    },
}

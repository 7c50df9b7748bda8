use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Ingest documents into a vector index and answer questions grounded in them.
///
/// Settings come from the environment (and `.env`); see `quarry config`.
#[derive(Parser, Debug)]
#[command(name = "quarry", version, about = "Retrieval-augmented answers over your documents")]
pub struct CliArgs {
    /// Configuration profile: keys are read as {PROFILE}_{KEY} before {KEY}
    #[arg(long, env = "QUARRY_PROFILE")]
    pub profile: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Chunk, embed and index a text file
    Ingest {
        /// File to ingest (UTF-8; invalid bytes are replaced)
        file: PathBuf,

        /// Document id (default: a new UUID)
        #[arg(long)]
        id: Option<String>,
    },

    /// Print the passages most similar to a query
    Retrieve {
        query: String,

        /// Number of passages (default: RETRIEVAL_TOP_K)
        #[arg(short, long)]
        k: Option<usize>,
    },

    /// Answer a question from the indexed passages
    Ask { query: String },

    /// Remove every chunk of a document
    Delete { document_id: String },

    /// Print the resolved configuration with secrets redacted
    Config,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn arguments_are_well_formed() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn parses_retrieve_with_k() {
        let args = CliArgs::try_parse_from(["quarry", "retrieve", "what is granite?", "-k", "3"])
            .unwrap();
        match args.command {
            Command::Retrieve { query, k } => {
                assert_eq!(query, "what is granite?");
                assert_eq!(k, Some(3));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_ingest_with_id() {
        let args =
            CliArgs::try_parse_from(["quarry", "ingest", "notes.txt", "--id", "notes"]).unwrap();
        match args.command {
            Command::Ingest { file, id } => {
                assert_eq!(file, PathBuf::from("notes.txt"));
                assert_eq!(id.as_deref(), Some("notes"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}

//! CLI module for ecomap.
//!
//! Subcommands:
//! - `graph`: Build a graph and write it as JSON
//! - `stats`: Summarize the dataset
//! - `project`: Show one project
//! - `serve`: Run the HTTP API

mod graph;
mod project;
mod serve;
mod stats;

use clap::{Parser, Subcommand};
use color_eyre::Result;

pub use graph::GraphCommand;
pub use serve::router;

use crate::config::Config;
use crate::context::Context;

/// ecomap - project ecosystem graphs
#[derive(Parser)]
#[command(name = "ecomap")]
#[command(about = "Reconciles project-relations data into renderable graphs")]
#[command(version)]
pub struct App {
    /// Run in verbose mode
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Build the graph for a mode and print it as JSON
    Graph(GraphCommand),

    /// Print dataset statistics
    Stats {
        /// Bypass the snapshot TTL
        #[arg(long)]
        refresh: bool,
    },

    /// Show a single project
    Project {
        /// Project id
        id: String,
    },

    /// Run the HTTP API
    Serve {
        /// Host address to bind to (defaults to server.host)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (defaults to server.port)
        #[arg(long)]
        port: Option<u16>,
    },
}

impl App {
    /// Run the CLI application.
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Graph(ref cmd) => self.run_graph(cmd).await,
            Command::Stats { refresh } => self.run_stats(refresh).await,
            Command::Project { ref id } => self.run_project(id).await,
            Command::Serve { ref host, port } => self.run_serve(host.as_deref(), port).await,
        }
    }

    fn context(&self) -> Result<Context> {
        let config = Config::load()?;
        Ok(Context::from_config(config)?)
    }
}

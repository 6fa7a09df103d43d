//! Graph command handler.

use std::path::PathBuf;

use clap::Args;
use color_eyre::Result;

use crate::models::{GraphMode, GraphRequest};
use crate::services::GraphService;

use super::App;

/// Build a graph and write it as JSON.
#[derive(Args, Debug)]
pub struct GraphCommand {
    /// stack_integration, affiliation or funding_received
    #[arg(short, long, default_value = "stack_integration")]
    pub mode: String,

    /// Keep only projects in this category
    #[arg(short, long)]
    pub category: Option<String>,

    /// Maximum number of edges (defaults to graph.default_limit)
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Bypass the snapshot TTL
    #[arg(long)]
    pub refresh: bool,

    /// Write to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl GraphCommand {
    pub fn request(&self) -> Result<GraphRequest> {
        let mode: GraphMode = self.mode.parse()?;
        let mut request = GraphRequest::new(mode);
        request.category = self.category.clone();
        request.limit = self.limit;
        Ok(request)
    }
}

impl App {
    /// Run the graph command.
    pub async fn run_graph(&self, cmd: &GraphCommand) -> Result<()> {
        let request = cmd.request()?;
        let ctx = self.context()?;
        let graph = ctx.resolve::<GraphService>().graph(&request, cmd.refresh).await;

        tracing::info!(
            mode = %graph.meta.mode,
            nodes = graph.meta.counts.nodes,
            links = graph.meta.counts.links,
            "Graph ready"
        );

        let json = serde_json::to_string_pretty(&graph)?;
        match &cmd.output {
            Some(path) => {
                tokio::fs::write(path, json).await?;
                tracing::info!("Wrote {}", path.display());
            }
            None => println!("{}", json),
        }
        Ok(())
    }
}

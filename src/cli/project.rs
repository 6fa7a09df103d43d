//! Project command handler.

use color_eyre::Result;

use crate::services::GraphService;

use super::App;

impl App {
    /// Run the project command.
    pub async fn run_project(&self, id: &str) -> Result<()> {
        let ctx = self.context()?;
        let details = ctx.resolve::<GraphService>().project(id).await?;
        println!("{}", serde_json::to_string_pretty(&details)?);
        Ok(())
    }
}

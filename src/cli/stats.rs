//! Stats command handler.

use color_eyre::Result;

use crate::services::StatsService;

use super::App;

impl App {
    /// Run the stats command.
    pub async fn run_stats(&self, refresh: bool) -> Result<()> {
        let ctx = self.context()?;
        let stats = ctx.resolve::<StatsService>().summarize(refresh).await;
        println!("{}", serde_json::to_string_pretty(&stats)?);
        Ok(())
    }
}

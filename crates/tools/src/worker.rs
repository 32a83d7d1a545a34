use sv_domain::error::Result;
use sv_domain::tool::ToolDefinition;

/// A tool the supervisor can hand a natural-language query to.
#[async_trait::async_trait]
pub trait WorkerTool: Send + Sync {
    fn definition(&self) -> &ToolDefinition;

    /// Label used when a failure is rendered back to the model.
    fn label(&self) -> &str {
        &self.definition().name
    }

    async fn call(&self, query: &str) -> Result<String>;

    /// Release connections held by the tool. Called once at shutdown.
    async fn close(&self) {}
}

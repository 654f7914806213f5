//! Query command - retrieve grounded context for a bot

use crate::error::Result;
use crate::search::ContextSearcher;
use tracing::info;

/// Fetch grounded context for a query, scoped to one bot
pub async fn cmd_query(
    searcher: &ContextSearcher,
    query: &str,
    bot_id: &str,
) -> Result<Option<String>> {
    info!("Querying context for bot '{}'", bot_id);
    searcher.search_context(query, bot_id).await
}

/// Print query results to the console
pub fn print_query_result(bot_id: &str, context: &Option<String>) {
    match context {
        Some(text) => {
            println!("\n🔎 Context for bot '{}'\n", bot_id);
            println!("{}", text);
        }
        None => {
            println!("No relevant context found for bot '{}'.", bot_id);
        }
    }
}

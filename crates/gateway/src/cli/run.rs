//! `supervisor run`: one-shot turn through the session router.
//!
//! Streams the reply to stdout and exits. Useful for scripting and for
//! poking a session without a listener.

use std::io::Write;
use std::sync::Arc;

use futures_util::StreamExt;

use sv_domain::config::Config;
use sv_domain::message::{CallHints, InboundMessage};
use sv_domain::stream::ResponseChunk;
use sv_sessions::collect_reply;

use crate::bootstrap;
use crate::runtime::{RoutedReply, SessionRouter};

pub async fn run(
    config: Arc<Config>,
    message: String,
    session: Option<String>,
    json_output: bool,
) -> anyhow::Result<()> {
    let rt = bootstrap::build_runtime(config.clone())?;
    let router = SessionRouter::from_config(rt.table.clone(), &config.sessions);
    let hints = CallHints {
        context_id: session,
        task_id: None,
    };

    let routed = router
        .respond_stream(InboundMessage::from(message), &hints)
        .await?;
    let session_id = routed.session_id;

    let mut exit_code = 0;
    if json_output {
        match collect_reply(routed.stream).await {
            Ok(reply) => {
                let out = RoutedReply { session_id, reply };
                println!("{}", serde_json::to_string_pretty(&out)?);
            }
            Err(e) => {
                eprintln!("error: {e}");
                exit_code = 1;
            }
        }
    } else {
        eprintln!("\x1b[2m[session: {session_id}]\x1b[0m");
        let mut stream = routed.stream;
        while let Some(chunk) = stream.next().await {
            match chunk {
                ResponseChunk::Delta { text } => {
                    print!("{text}");
                    std::io::stdout().flush().ok();
                }
                ResponseChunk::ToolCall { tool_name, .. } => {
                    eprintln!("\x1b[2m[tool: {tool_name}]\x1b[0m");
                }
                ResponseChunk::ToolResult { .. } => {}
                ResponseChunk::Final { .. } => println!(),
                ResponseChunk::Error { message } => {
                    eprintln!("error: {message}");
                    exit_code = 1;
                }
            }
        }
    }

    rt.tools.shutdown().await;
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}

//! Editor bridge - newline-delimited JSON requests on stdin, replies on stdout.
//!
//! Each request line looks like
//! `{"id": 1, "command": "ask", "text": "...", "context": "..."}`
//! and gets exactly one reply line `{"id": 1, "ok": true, "response": "..."}`.

use lumen_assistant::{Assistant, AssistantConfig};
use lumen_supervisor::ReadinessChecker;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use super::assistant_report;
use super::ollama::supervisor_for;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
enum BridgeCommand {
    Ask,
    Explain,
    Status,
    EnsureRunning,
}

#[derive(Debug, Deserialize)]
struct BridgeRequest {
    #[serde(default)]
    id: Value,
    command: BridgeCommand,
    #[serde(default)]
    text: String,
    #[serde(default)]
    context: Option<String>,
    #[serde(default)]
    language: Option<String>,
}

#[derive(Debug, Serialize, PartialEq)]
pub(crate) struct BridgeResponse {
    id: Value,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl BridgeResponse {
    fn success(id: Value, response: String) -> Self {
        Self {
            id,
            ok: true,
            response: Some(response),
            error: None,
        }
    }

    fn failure(id: Value, error: impl ToString) -> Self {
        Self {
            id,
            ok: false,
            response: None,
            error: Some(error.to_string()),
        }
    }
}

/// Answer one request line.
pub(crate) async fn handle_line(
    assistant: &Assistant,
    checker: &dyn ReadinessChecker,
    line: &str,
) -> BridgeResponse {
    let request: BridgeRequest = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(e) => {
            // Salvage the id so the editor can match the failure.
            let id = serde_json::from_str::<Value>(line)
                .ok()
                .and_then(|v| v.get("id").cloned())
                .unwrap_or(Value::Null);
            return BridgeResponse::failure(id, format!("invalid request: {}", e));
        }
    };

    debug!("Bridge request {}: {:?}", request.id, request.command);

    let id = request.id;
    let result = match request.command {
        BridgeCommand::Ask => assistant
            .ask(&request.text, request.context.as_deref())
            .await
            .map_err(|e| e.to_string()),
        BridgeCommand::Explain => assistant
            .explain(&request.text, request.language.as_deref())
            .await
            .map_err(|e| e.to_string()),
        BridgeCommand::Status => Ok(if checker.is_ready().await {
            "ready".to_string()
        } else {
            checker.instructions().to_string()
        }),
        BridgeCommand::EnsureRunning => assistant
            .prepare(checker)
            .await
            .map(|()| "ready".to_string())
            .map_err(|e| e.to_string()),
    };

    match result {
        Ok(response) => BridgeResponse::success(id, response),
        Err(error) => BridgeResponse::failure(id, error),
    }
}

pub(crate) async fn run(config: AssistantConfig) -> miette::Result<()> {
    let assistant = Assistant::new(config).map_err(assistant_report)?;
    let supervisor = supervisor_for(assistant.config());

    if let Err(e) = assistant.prepare(&supervisor).await {
        warn!("{}", e);
    }

    info!("Editor bridge ready ({:?} backend)", assistant.backend());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| miette::miette!("Failed to read from editor: {}", e))?
    {
        if line.trim().is_empty() {
            continue;
        }

        let response = handle_line(&assistant, &supervisor, &line).await;
        let mut out = serde_json::to_string(&response)
            .map_err(|e| miette::miette!("Failed to encode reply: {}", e))?;
        out.push('\n');

        stdout
            .write_all(out.as_bytes())
            .await
            .map_err(|e| miette::miette!("Failed to write to editor: {}", e))?;
        stdout
            .flush()
            .await
            .map_err(|e| miette::miette!("Failed to write to editor: {}", e))?;
    }

    info!("Editor closed the bridge");
    supervisor.detach();
    Ok(())
}

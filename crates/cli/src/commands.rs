//! Subcommand bodies. Each returns `Ok(())` on success or the §6 exit
//! code to propagate, so `main` stays a thin dispatcher.

use tagengine_api::wire::IntrospectionResponse;
use tagengine_api::{Engine, EngineError, WorkspaceId};

use crate::exit_code;

fn error_to_code(e: &EngineError) -> u8 {
    match e {
        EngineError::NotFound { .. } => exit_code::NOT_FOUND,
        EngineError::InvalidQuery { .. } => exit_code::INVALID_ARGS,
        EngineError::Corrupt { .. } => exit_code::CORRUPT,
        EngineError::Unavailable { .. } => exit_code::IO_ERROR,
        EngineError::Cancelled | EngineError::DeadlineExceeded => exit_code::IO_ERROR,
    }
}

/// `engine purge --workspace W`.
pub fn purge(engine: &Engine, workspace: &str) -> Result<(), u8> {
    engine.purge(&WorkspaceId::new(workspace)).map_err(|e| {
        eprintln!("error: purge failed: {e}");
        error_to_code(&e)
    })
}

/// `engine stats --workspace W` — prints JSON of `introspect`.
pub fn stats(engine: &Engine, workspace: &str) -> Result<(), u8> {
    let ws = WorkspaceId::new(workspace);
    let handle = engine.open_workspace(ws).map_err(|e| {
        eprintln!("error: {e}");
        error_to_code(&e)
    })?;
    let report = handle.introspect().map_err(|e| {
        eprintln!("error: stats failed: {e}");
        error_to_code(&e)
    })?;
    let response = IntrospectionResponse::from(report);
    match serde_json::to_string_pretty(&response) {
        Ok(json) => {
            println!("{json}");
            Ok(())
        }
        Err(e) => {
            eprintln!("error: failed to serialize stats: {e}");
            Err(exit_code::IO_ERROR)
        }
    }
}

/// `engine rebuild-index --workspace W`.
pub fn rebuild_index(engine: &Engine, workspace: &str) -> Result<(), u8> {
    let ws = WorkspaceId::new(workspace);
    let handle = engine.open_workspace(ws).map_err(|e| {
        eprintln!("error: {e}");
        error_to_code(&e)
    })?;
    handle.rebuild_index().map_err(|e| {
        eprintln!("error: rebuild-index failed: {e}");
        error_to_code(&e)
    })
}

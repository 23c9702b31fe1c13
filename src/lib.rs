//! Reading coordinator for the Kindsight accessibility extension.
//!
//! The crate is split along the three cooperating components of reader mode:
//! - `coordinator`: the long-lived owner of playback state and utterance tickets.
//! - `page`: per-document text extraction, chunking and highlight planning.
//! - `control`: the popup remote control, a passive mirror of coordinator state.
//!
//! `runtime` hosts the coordinator on a tokio task and `host` bridges it to the
//! browser over the native-messaging stdio channel.

pub mod config;
pub mod control;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod host;
pub mod messenger;
pub mod page;
pub mod protocol;
pub mod runtime;
pub mod scheduler;

use std::fs;
use std::path::Path;
use ts_rs::TS;

fn export_single_type<T: TS + 'static>(out_dir: &Path) -> Result<(), String> {
    T::export_all_to(out_dir).map_err(|err| err.to_string())
}

/// Write TypeScript bindings for every wire type into `out_dir`, replacing
/// previously generated `.ts` files.
pub fn export_ts_bindings(out_dir: &Path) -> Result<(), String> {
    fs::create_dir_all(out_dir)
        .map_err(|err| format!("Failed to create {}: {err}", out_dir.display()))?;

    for entry in fs::read_dir(out_dir)
        .map_err(|err| format!("Failed to list {}: {err}", out_dir.display()))?
    {
        let entry = entry.map_err(|err| format!("Failed to read entry: {err}"))?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) == Some("ts") {
            fs::remove_file(&path)
                .map_err(|err| format!("Failed to remove {}: {err}", path.display()))?;
        }
    }

    export_single_type::<protocol::TabId>(out_dir)?;
    export_single_type::<protocol::TicketId>(out_dir)?;
    export_single_type::<protocol::Command>(out_dir)?;
    export_single_type::<protocol::Reply>(out_dir)?;
    export_single_type::<protocol::Notification>(out_dir)?;
    export_single_type::<protocol::Target>(out_dir)?;
    export_single_type::<protocol::EngineEvent>(out_dir)?;
    export_single_type::<protocol::EngineEventKind>(out_dir)?;
    export_single_type::<engine::UtteranceRequest>(out_dir)?;
    export_single_type::<host::EngineOp>(out_dir)?;
    export_single_type::<host::HostInbound>(out_dir)?;
    export_single_type::<host::HostOutbound>(out_dir)?;
    export_single_type::<control::PageRequest>(out_dir)?;

    let index_content = r#"export type { TabId } from "./TabId";
export type { TicketId } from "./TicketId";
export type { Command } from "./Command";
export type { Reply } from "./Reply";
export type { Notification } from "./Notification";
export type { Target } from "./Target";
export type { EngineEvent } from "./EngineEvent";
export type { EngineEventKind } from "./EngineEventKind";
export type { UtteranceRequest } from "./UtteranceRequest";
export type { EngineOp } from "./EngineOp";
export type { HostInbound } from "./HostInbound";
export type { HostOutbound } from "./HostOutbound";
export type { PageRequest } from "./PageRequest";
"#;

    fs::write(out_dir.join("index.ts"), index_content).map_err(|err| {
        format!(
            "Failed to write {}: {err}",
            out_dir.join("index.ts").display()
        )
    })?;

    Ok(())
}

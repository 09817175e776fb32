// Nitpicker - Gallery Browser & Downloader for Mobile
// Copyright (C) 2025 Nitpicker contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! JNI bridge for Android
//!
//! Kotlin calls these functions with a JSON string and gets a JSON string
//! back. The host calls `nativeInit` once with its [`CoreConfig`]; every
//! other call names the database it targets through `db_path`.
//!
//! # Response Format
//! ```json
//! { "success": true, "data": { ... } }
//! ```
//! or
//! ```json
//! { "success": false, "error": "Error message" }
//! ```
//!
//! Panics are caught here and reported as errors so they never unwind into
//! the JVM.

use crate::api::models::FileInfo;
use crate::config::CoreConfig;
use crate::download::{DownloadOrchestrator, DownloadProgress};
use crate::error::{NitpickerError, Result};
use jni::objects::{JClass, JString};
use jni::sys::jstring;
use jni::JNIEnv;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use tokio::runtime::Runtime;
use tokio::sync::Mutex;

lazy_static::lazy_static! {
    static ref RUNTIME: std::io::Result<Runtime> = Runtime::new();

    // database path -> orchestrator
    static ref ORCHESTRATORS: Mutex<HashMap<String, DownloadOrchestrator>> =
        Mutex::new(HashMap::new());
}

fn runtime() -> Result<&'static Runtime> {
    RUNTIME
        .as_ref()
        .map_err(|e| NitpickerError::internal(format!("Tokio runtime unavailable: {}", e)))
}

async fn orchestrator_for(db_path: &str) -> Result<DownloadOrchestrator> {
    ORCHESTRATORS
        .lock()
        .await
        .get(db_path)
        .cloned()
        .ok_or_else(|| {
            NitpickerError::InvalidState(format!("nativeInit was not called for {}", db_path))
        })
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn jstring_to_string(env: &mut JNIEnv, jstr: JString) -> Result<String> {
    env.get_string(&jstr)
        .map(|s| s.into())
        .map_err(|e| NitpickerError::InvalidInput(format!("JNI string conversion failed: {}", e)))
}

fn success_response<T: Serialize>(data: T) -> String {
    serde_json::json!({
        "success": true,
        "data": data
    })
    .to_string()
}

fn error_response(error: &str) -> String {
    serde_json::json!({
        "success": false,
        "error": error
    })
    .to_string()
}

fn catch_panic<F>(f: F) -> String
where
    F: FnOnce() -> String,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(panic_err) => {
            let panic_msg = if let Some(s) = panic_err.downcast_ref::<String>() {
                s.clone()
            } else if let Some(s) = panic_err.downcast_ref::<&str>() {
                s.to_string()
            } else {
                "Unknown panic occurred".to_string()
            };
            error_response(&format!("Rust panic: {}", panic_msg))
        }
    }
}

/// Parse params, run `call` on the shared runtime and wrap the outcome
fn respond<P, T, F>(env: &mut JNIEnv, params_json: JString, call: F) -> jstring
where
    P: DeserializeOwned,
    T: Serialize,
    F: FnOnce(P) -> Result<T>,
{
    let params = jstring_to_string(env, params_json);

    let response = catch_panic(move || {
        let outcome = params.and_then(|raw| {
            let params: P = serde_json::from_str(&raw)
                .map_err(|e| NitpickerError::InvalidInput(format!("Invalid JSON: {}", e)))?;
            call(params)
        });
        match outcome {
            Ok(data) => success_response(data),
            Err(e) => error_response(&e.user_message()),
        }
    });

    match env.new_string(response) {
        Ok(output) => output.into_raw(),
        Err(e) => {
            tracing::error!("Could not create Java string: {}", e);
            std::ptr::null_mut()
        }
    }
}

#[derive(Deserialize)]
struct DbParams {
    db_path: String,
}

#[derive(Deserialize)]
struct TaskParams {
    db_path: String,
    task_id: String,
}

#[derive(Deserialize)]
struct EnqueueParams {
    db_path: String,
    album_title: String,
    files: Vec<FileInfo>,
}

// ============================================================================
// DOWNLOADS
// ============================================================================

/// Open (or reuse) the orchestrator for a config and recover interrupted work
///
/// # Arguments (JSON string)
/// A [`CoreConfig`]; missing fields take their defaults.
///
/// # Returns (JSON)
/// ```json
/// { "success": true, "data": { "db_path": "...", "tasks": 12 } }
/// ```
#[no_mangle]
pub extern "C" fn Java_com_d3intran_nitpicker_core_NativeCore_nativeInit(
    mut env: JNIEnv,
    _class: JClass,
    config_json: JString,
) -> jstring {
    respond(&mut env, config_json, |config: CoreConfig| {
        crate::logging::init(None);
        config.validate()?;
        let db_path = config.database_path.to_string_lossy().into_owned();

        runtime()?.block_on(async {
            let mut orchestrators = ORCHESTRATORS.lock().await;
            let orchestrator = match orchestrators.get(&db_path) {
                Some(existing) => existing.clone(),
                None => {
                    let started = DownloadOrchestrator::start(&config).await?;
                    orchestrators.insert(db_path.clone(), started.clone());
                    started
                }
            };
            let tasks = orchestrator.store().snapshot().len();

            Ok(serde_json::json!({
                "db_path": db_path,
                "tasks": tasks,
            }))
        })
    })
}

/// Queue files of one album
///
/// # Arguments (JSON string)
/// ```json
/// {
///   "db_path": "...",
///   "album_title": "Holiday",
///   "files": [{ "file_name": "a.jpg", "file_type": "jpg", "file_size": "1 MB",
///               "thumbnail_url": "https://...", "page_url": "https://..." }]
/// }
/// ```
///
/// # Returns (JSON)
/// ```json
/// { "success": true, "data": { "task_ids": ["..."] } }
/// ```
#[no_mangle]
pub extern "C" fn Java_com_d3intran_nitpicker_core_NativeCore_nativeEnqueue(
    mut env: JNIEnv,
    _class: JClass,
    params_json: JString,
) -> jstring {
    respond(&mut env, params_json, |params: EnqueueParams| {
        runtime()?.block_on(async {
            let orchestrator = orchestrator_for(&params.db_path).await?;
            let task_ids = orchestrator
                .enqueue(&params.files, &params.album_title)
                .await?;
            Ok(serde_json::json!({ "task_ids": task_ids }))
        })
    })
}

/// Cancel one task: `{ "db_path": "...", "task_id": "..." }`
#[no_mangle]
pub extern "C" fn Java_com_d3intran_nitpicker_core_NativeCore_nativeCancel(
    mut env: JNIEnv,
    _class: JClass,
    params_json: JString,
) -> jstring {
    respond(&mut env, params_json, |params: TaskParams| {
        runtime()?.block_on(async {
            let orchestrator = orchestrator_for(&params.db_path).await?;
            orchestrator.cancel(&params.task_id).await
        })
    })
}

/// Retry a failed task: `{ "db_path": "...", "task_id": "..." }`
#[no_mangle]
pub extern "C" fn Java_com_d3intran_nitpicker_core_NativeCore_nativeRetry(
    mut env: JNIEnv,
    _class: JClass,
    params_json: JString,
) -> jstring {
    respond(&mut env, params_json, |params: TaskParams| {
        runtime()?.block_on(async {
            let orchestrator = orchestrator_for(&params.db_path).await?;
            orchestrator.retry_download(&params.task_id).await
        })
    })
}

/// Remove completed and cancelled rows
///
/// # Returns (JSON)
/// ```json
/// { "success": true, "data": { "removed": 3 } }
/// ```
#[no_mangle]
pub extern "C" fn Java_com_d3intran_nitpicker_core_NativeCore_nativeDeleteFinished(
    mut env: JNIEnv,
    _class: JClass,
    params_json: JString,
) -> jstring {
    respond(&mut env, params_json, |params: DbParams| {
        runtime()?.block_on(async {
            let orchestrator = orchestrator_for(&params.db_path).await?;
            let removed = orchestrator.delete_completed_and_cancelled().await?;
            Ok(serde_json::json!({ "removed": removed }))
        })
    })
}

/// Current progress of every task, newest first
#[no_mangle]
pub extern "C" fn Java_com_d3intran_nitpicker_core_NativeCore_nativeGetProgress(
    mut env: JNIEnv,
    _class: JClass,
    params_json: JString,
) -> jstring {
    respond(&mut env, params_json, |params: DbParams| {
        runtime()?.block_on(async {
            let orchestrator = orchestrator_for(&params.db_path).await?;
            let tasks: Vec<DownloadProgress> = orchestrator.progress().current();
            Ok(serde_json::json!({ "tasks": tasks }))
        })
    })
}

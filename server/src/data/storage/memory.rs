//! In-process storage zone and CDN
//!
//! Emulates the Bunny storage semantics closely enough to run the whole
//! stack without network access: JSON directory listings, `/`-terminated
//! directory markers, recursive directory delete and 404 for missing paths.
//! Directories exist implicitly while any key lives under them.
//!
//! Two knobs make eventual consistency reproducible:
//! - visibility lag: after a PUT or DELETE, the next `n` HEADs on that path
//!   still report the previous state
//! - faults: a request matching `(method, path)` gets a canned response or a
//!   network error, either every time or once

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};

use super::error::StorageError;
use super::paths::is_dir_path;
use super::transport::{CdnTransport, ObjectHeaders, RawResponse, StorageTransport};
use super::types::ListingEntry;
use crate::utils::time::format_storage_timestamp;

const DEFAULT_ZONE: &str = "memory";

/// Injected response for a matching request
#[derive(Debug, Clone)]
pub enum Fault {
    /// Respond with this status and an empty body
    Status(StatusCode),
    /// Respond with this status and body
    Respond(StatusCode, Vec<u8>),
    /// Fail as if the connection dropped
    Network,
}

#[derive(Debug, Clone)]
struct FaultRule {
    method: Method,
    path: String,
    fault: Fault,
    once: bool,
}

#[derive(Debug, Clone)]
struct StoredObject {
    body: Vec<u8>,
    content_type: Option<String>,
    cache_control: Option<String>,
    created: DateTime<Utc>,
    changed: DateTime<Utc>,
    guid: String,
}

#[derive(Debug, Default)]
struct MemoryState {
    objects: BTreeMap<String, StoredObject>,
    /// Stale HEAD answers still owed per path: (remaining, existed before)
    stale: HashMap<String, (usize, bool)>,
    faults: Vec<FaultRule>,
    requests: Vec<(Method, String)>,
    next_guid: u64,
}

impl MemoryState {
    fn dir_exists(&self, dir: &str) -> bool {
        dir.is_empty()
            || self
                .objects
                .range(dir.to_string()..)
                .next()
                .is_some_and(|(key, _)| key.starts_with(dir))
    }

    fn exists(&self, path: &str) -> bool {
        if is_dir_path(path) {
            self.dir_exists(path)
        } else {
            self.objects.contains_key(path)
        }
    }

    fn take_fault(&mut self, method: &Method, path: &str) -> Option<Fault> {
        let idx = self
            .faults
            .iter()
            .position(|r| r.method == *method && r.path == path)?;
        let fault = self.faults[idx].fault.clone();
        if self.faults[idx].once {
            self.faults.remove(idx);
        }
        Some(fault)
    }

    fn mark_stale(&mut self, path: &str, lag: usize, existed: bool) {
        if lag > 0 {
            self.stale.insert(path.to_string(), (lag, existed));
        }
    }

    fn listing(&self, zone: &str, dir: &str) -> Vec<ListingEntry> {
        let mut dirs = BTreeSet::new();
        let mut entries = Vec::new();

        for (key, object) in self.objects.range(dir.to_string()..) {
            let Some(rest) = key.strip_prefix(dir) else {
                break;
            };
            if rest.is_empty() {
                continue;
            }
            match rest.split_once('/') {
                Some((child, _)) => {
                    dirs.insert(child.to_string());
                }
                None => entries.push(ListingEntry {
                    object_name: rest.to_string(),
                    is_directory: false,
                    length: object.body.len() as u64,
                    last_changed: Some(format_storage_timestamp(&object.changed)),
                    date_created: Some(format_storage_timestamp(&object.created)),
                    guid: Some(object.guid.clone()),
                    path: Some(format!("/{}/{}", zone, dir)),
                    content_type: object.content_type.clone(),
                    storage_zone_name: Some(zone.to_string()),
                }),
            }
        }

        let dir_entries = dirs.into_iter().map(|child| {
            let marker = self.objects.get(&format!("{}{}/", dir, child));
            ListingEntry {
                object_name: child,
                is_directory: true,
                length: 0,
                last_changed: marker.map(|m| format_storage_timestamp(&m.changed)),
                date_created: marker.map(|m| format_storage_timestamp(&m.created)),
                guid: marker.map(|m| m.guid.clone()),
                path: Some(format!("/{}/{}", zone, dir)),
                content_type: None,
                storage_zone_name: Some(zone.to_string()),
            }
        });

        dir_entries.chain(entries).collect()
    }
}

fn fault_response(path: &str, fault: Fault) -> Result<RawResponse, StorageError> {
    match fault {
        Fault::Status(status) => Ok(RawResponse::new(status, Vec::new())),
        Fault::Respond(status, body) => Ok(RawResponse::new(status, body)),
        Fault::Network => Err(StorageError::Network(format!(
            "connection reset while requesting {}",
            path
        ))),
    }
}

/// In-memory storage zone
#[derive(Debug)]
pub struct MemoryStorage {
    zone: String,
    visibility_lag: usize,
    state: Mutex<MemoryState>,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            zone: DEFAULT_ZONE.to_string(),
            visibility_lag: 0,
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// Report the previous state for the next `lag` HEADs after each write
    pub fn with_visibility_lag(mut self, lag: usize) -> Self {
        self.visibility_lag = lag;
        self
    }

    /// Seed an object directly, bypassing faults and the request log
    pub fn insert(&self, path: &str, body: impl Into<Vec<u8>>) {
        let mut state = self.state.lock();
        let object = Self::new_object(&mut state, body.into(), &ObjectHeaders::default());
        state.objects.insert(path.to_string(), object);
    }

    /// Whether a file or directory is present, ignoring visibility lag
    pub fn contains(&self, path: &str) -> bool {
        self.state.lock().exists(path)
    }

    /// Stored bytes of a file
    pub fn object_body(&self, path: &str) -> Option<Vec<u8>> {
        self.state.lock().objects.get(path).map(|o| o.body.clone())
    }

    /// Headers stored with a file on upload
    pub fn object_headers(&self, path: &str) -> Option<ObjectHeaders> {
        self.state.lock().objects.get(path).map(|o| ObjectHeaders {
            content_type: o.content_type.clone(),
            cache_control: o.cache_control.clone(),
        })
    }

    /// Every stored key, files and directory markers, in order
    pub fn keys(&self) -> Vec<String> {
        self.state.lock().objects.keys().cloned().collect()
    }

    /// Inject a fault for every matching request
    pub fn fail_on(&self, method: Method, path: &str, fault: Fault) {
        self.add_fault(method, path, fault, false);
    }

    /// Inject a fault for the next matching request only
    pub fn fail_once(&self, method: Method, path: &str, fault: Fault) {
        self.add_fault(method, path, fault, true);
    }

    pub fn clear_faults(&self) {
        self.state.lock().faults.clear();
    }

    /// Requests seen so far
    pub fn requests(&self) -> Vec<(Method, String)> {
        self.state.lock().requests.clone()
    }

    /// Number of requests seen for `(method, path)`
    pub fn count(&self, method: &Method, path: &str) -> usize {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|(m, p)| m == method && p == path)
            .count()
    }

    fn add_fault(&self, method: Method, path: &str, fault: Fault, once: bool) {
        self.state.lock().faults.push(FaultRule {
            method,
            path: path.to_string(),
            fault,
            once,
        });
    }

    fn new_object(state: &mut MemoryState, body: Vec<u8>, headers: &ObjectHeaders) -> StoredObject {
        state.next_guid += 1;
        let now = Utc::now();
        StoredObject {
            body,
            content_type: headers.content_type.clone(),
            cache_control: headers.cache_control.clone(),
            created: now,
            changed: now,
            guid: format!("mem-{:08x}", state.next_guid),
        }
    }

    /// Log the request and return the injected fault, if any
    fn begin(&self, state: &mut MemoryState, method: Method, path: &str) -> Option<Fault> {
        let fault = state.take_fault(&method, path);
        tracing::trace!(backend = "memory", method = %method, path, faulted = fault.is_some(), "Storage request");
        state.requests.push((method, path.to_string()));
        fault
    }
}

#[async_trait]
impl StorageTransport for MemoryStorage {
    async fn get(&self, path: &str) -> Result<RawResponse, StorageError> {
        let mut state = self.state.lock();
        if let Some(fault) = self.begin(&mut state, Method::GET, path) {
            return fault_response(path, fault);
        }

        if is_dir_path(path) {
            if !state.dir_exists(path) {
                return Ok(RawResponse::new(StatusCode::NOT_FOUND, Vec::new()));
            }
            let listing = state.listing(&self.zone, path);
            let body = serde_json::to_vec(&listing)
                .map_err(|e| StorageError::Network(format!("listing encode failed: {}", e)))?;
            return Ok(RawResponse::new(StatusCode::OK, body));
        }

        match state.objects.get(path) {
            Some(object) => {
                let mut response = RawResponse::new(StatusCode::OK, object.body.clone());
                if let Some(content_type) = &object.content_type
                    && let Ok(value) = HeaderValue::from_str(content_type)
                {
                    response
                        .headers
                        .insert(reqwest::header::CONTENT_TYPE, value);
                }
                Ok(response)
            }
            None => Ok(RawResponse::new(
                StatusCode::NOT_FOUND,
                b"Object Not Found".to_vec(),
            )),
        }
    }

    async fn put(
        &self,
        path: &str,
        body: Vec<u8>,
        headers: &ObjectHeaders,
    ) -> Result<RawResponse, StorageError> {
        let mut state = self.state.lock();
        if let Some(fault) = self.begin(&mut state, Method::PUT, path) {
            return fault_response(path, fault);
        }
        if path.is_empty() || path.contains("//") {
            return Ok(RawResponse::new(
                StatusCode::BAD_REQUEST,
                format!("Invalid path: {:?}", path).into_bytes(),
            ));
        }

        let existed = state.exists(path);
        let mut object = Self::new_object(&mut state, body, headers);
        if let Some(previous) = state.objects.get(path) {
            object.created = previous.created;
            object.guid = previous.guid.clone();
        }
        state.objects.insert(path.to_string(), object);
        state.mark_stale(path, self.visibility_lag, existed);
        Ok(RawResponse::new(StatusCode::CREATED, Vec::new()))
    }

    async fn delete(&self, path: &str) -> Result<RawResponse, StorageError> {
        let mut state = self.state.lock();
        if let Some(fault) = self.begin(&mut state, Method::DELETE, path) {
            return fault_response(path, fault);
        }
        if !state.exists(path) || path.is_empty() {
            return Ok(RawResponse::new(
                StatusCode::NOT_FOUND,
                b"Object Not Found".to_vec(),
            ));
        }

        if is_dir_path(path) {
            state.objects.retain(|key, _| !key.starts_with(path));
        } else {
            state.objects.remove(path);
        }
        state.mark_stale(path, self.visibility_lag, true);
        Ok(RawResponse::new(StatusCode::OK, Vec::new()))
    }

    async fn head(&self, path: &str) -> Result<RawResponse, StorageError> {
        let mut state = self.state.lock();
        if let Some(fault) = self.begin(&mut state, Method::HEAD, path) {
            return fault_response(path, fault);
        }

        let stale = match state.stale.get_mut(path) {
            Some((remaining, existed)) if *remaining > 0 => {
                *remaining -= 1;
                Some(*existed)
            }
            _ => None,
        };
        let visible = stale.unwrap_or_else(|| state.exists(path));

        let status = if visible {
            StatusCode::OK
        } else {
            StatusCode::NOT_FOUND
        };
        Ok(RawResponse::new(status, Vec::new()))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

fn edge_headers(name: &'static str, value: &'static str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(name, HeaderValue::from_static(value));
    headers
}

/// In-memory CDN edge and purge API
#[derive(Debug, Default)]
pub struct MemoryCdn {
    state: Mutex<MemoryCdnState>,
}

#[derive(Debug, Default)]
struct MemoryCdnState {
    edge: HashMap<String, HeaderMap>,
    purges: Vec<(String, Vec<String>)>,
    purge_status: Option<StatusCode>,
}

impl MemoryCdn {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the headers the edge returns for a public URL
    pub fn set_edge_headers(&self, url: &str, headers: &[(&str, &str)]) {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                map.insert(name, value);
            }
        }
        self.state.lock().edge.insert(url.to_string(), map);
    }

    /// Status returned by subsequent purge calls (default 200)
    pub fn set_purge_status(&self, status: StatusCode) {
        self.state.lock().purge_status = Some(status);
    }

    /// Purge calls seen so far: (pull zone id, paths)
    pub fn purges(&self) -> Vec<(String, Vec<String>)> {
        self.state.lock().purges.clone()
    }
}

#[async_trait]
impl CdnTransport for MemoryCdn {
    async fn head(&self, url: &str) -> Result<RawResponse, StorageError> {
        let mut state = self.state.lock();
        match state.edge.get(url) {
            Some(headers) => {
                let mut response = RawResponse::new(StatusCode::OK, Vec::new());
                response.headers = headers.clone();
                Ok(response)
            }
            None => {
                // Unknown URLs are pulled from origin: a miss now, a hit afterwards
                state
                    .edge
                    .insert(url.to_string(), edge_headers("x-cache", "HIT"));
                let mut response = RawResponse::new(StatusCode::OK, Vec::new());
                response.headers = edge_headers("x-cache", "MISS");
                Ok(response)
            }
        }
    }

    async fn purge(
        &self,
        pull_zone_id: &str,
        paths: &[String],
    ) -> Result<RawResponse, StorageError> {
        let mut state = self.state.lock();
        state
            .purges
            .push((pull_zone_id.to_string(), paths.to_vec()));
        let status = state.purge_status.unwrap_or(StatusCode::OK);
        if status.is_success() {
            state
                .edge
                .retain(|url, _| !paths.iter().any(|p| url.ends_with(p.as_str())));
        }
        Ok(RawResponse::new(status, Vec::new()))
    }
}

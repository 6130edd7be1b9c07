//! JSON-file backed store.
//!
//! The file holds one flat object of `path → value`. An operator can flip the
//! session flag by editing it while the agent runs. Writes go through a temp
//! file and a rename so a concurrent reader never sees a partial document.

use bin_remote_protocol::{Channel, Completion, RemoteError, RemoteValue, RequestId};
use fs_err as fs;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::{payload_for, PendingRequest, RemoteStore, RequestQueue};
use crate::error::{AgentError, Result};

type Document = BTreeMap<String, Value>;

#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    pending: RequestQueue,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            pending: RequestQueue::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads a value straight from disk, bypassing the request queue.
    pub fn read_value(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.load()?.remove(key))
    }

    fn load(&self) -> Result<Document> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Document::new())
            }
            Err(err) => return Err(AgentError::io("reading remote store", err)),
        };
        if data.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(Document::new());
        }
        serde_json::from_slice(&data).map_err(|err| AgentError::json("parsing remote store", err))
    }

    fn save(&self, document: &Document) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|err| AgentError::io("creating remote store dir", err))?;
        }

        let payload = serde_json::to_vec_pretty(document)
            .map_err(|err| AgentError::json("serializing remote store", err))?;
        let tmp_path = self.path.with_extension("tmp");
        fs::write(&tmp_path, payload)
            .map_err(|err| AgentError::io("writing remote store", err))?;
        fs::rename(&tmp_path, &self.path)
            .map_err(|err| AgentError::io("committing remote store", err))?;
        Ok(())
    }

    fn execute(&self, request: &PendingRequest) -> Result<String> {
        match request {
            PendingRequest::Get { path, .. } => Ok(payload_for(self.load()?.get(path))),
            PendingRequest::Set { path, value, .. } => {
                let mut document = self.load()?;
                document.insert(path.clone(), value.encode());
                self.save(&document)?;
                Ok(value.to_string())
            }
        }
    }
}

impl RemoteStore for FileStore {
    fn get(&mut self, path: &str, channel: Channel) -> RequestId {
        self.pending.push(PendingRequest::Get {
            path: path.to_string(),
            channel,
        })
    }

    fn set(&mut self, path: &str, value: RemoteValue, channel: Channel) -> RequestId {
        self.pending.push(PendingRequest::Set {
            path: path.to_string(),
            value,
            channel,
        })
    }

    fn service(&mut self) -> Vec<Completion> {
        self.pending
            .drain()
            .into_iter()
            .map(|(id, request)| match self.execute(&request) {
                Ok(payload) => Completion::ok(id, request.channel(), request.path(), payload),
                Err(err) => Completion::failed(
                    id,
                    request.channel(),
                    request.path(),
                    RemoteError::new(err.code(), err.to_string()),
                ),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_operator_written_flag() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("remote.json");
        fs::write(&path, r#"{"/BinsData/u/isSessionStarted": "true"}"#).expect("seed");

        let mut store = FileStore::new(&path);
        store.get("/BinsData/u/isSessionStarted", Channel::FlagPoll);
        let completions = store.service();
        assert_eq!(completions[0].result, Ok("true".to_string()));
    }

    #[test]
    fn missing_file_reads_null_and_set_creates_it() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("nested").join("remote.json");
        let mut store = FileStore::new(&path);

        store.get("/k", Channel::FlagPoll);
        store.set("/count", RemoteValue::Count(3), Channel::CounterWrite);
        let completions = store.service();

        assert_eq!(completions[0].result, Ok("null".to_string()));
        assert_eq!(completions[1].result, Ok("3".to_string()));
        assert_eq!(
            store.read_value("/count").expect("read"),
            Some(serde_json::json!(3))
        );
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn corrupt_file_fails_the_request() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("remote.json");
        fs::write(&path, "{not json").expect("seed");

        let mut store = FileStore::new(&path);
        store.set("/flag", RemoteValue::Flag(false), Channel::FlagWrite);
        let completions = store.service();

        let err = completions[0].result.clone().expect_err("corrupt store");
        assert_eq!(err.code, "invalid_json");
        assert_eq!(completions[0].channel, Channel::FlagWrite);
    }

    #[test]
    fn writes_preserve_other_keys() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("remote.json");
        fs::write(&path, r#"{"/flag": "true"}"#).expect("seed");

        let mut store = FileStore::new(&path);
        store.set("/count", RemoteValue::Count(1), Channel::CounterWrite);
        store.service();

        assert_eq!(
            store.read_value("/flag").expect("read"),
            Some(Value::String("true".into()))
        );
    }
}
